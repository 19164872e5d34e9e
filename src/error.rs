use std::path::PathBuf;
use thiserror::Error;

/// 会中止整个同步过程的错误
#[derive(Debug, Error)]
pub enum SyncError {
    #[error("unsupported source location: {0} (expected http://, https://, file: or a local path)")]
    UnsupportedSource(String),

    #[error("{url} answered with non-retryable status {status}")]
    FatalStatus { url: String, status: u16 },

    #[error("repository index declares no primary package listing")]
    MissingPrimary,

    #[error("repository index declares more than one primary listing: {0} and {1}")]
    AmbiguousPrimary(String, String),

    #[error("primary listing {0} is not available locally")]
    PrimaryUnavailable(PathBuf),

    #[error("malformed metadata in {file}: {reason}")]
    Metadata { file: String, reason: String },

    #[error("xml error in {file}: {source}")]
    Xml {
        file: String,
        #[source]
        source: quick_xml::Error,
    },

    #[error("i/o error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error(transparent)]
    Http(#[from] reqwest::Error),

    #[error(transparent)]
    Url(#[from] url::ParseError),
}

impl SyncError {
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        SyncError::Io {
            path: path.into(),
            source,
        }
    }

    pub fn xml(file: impl Into<String>, source: impl Into<quick_xml::Error>) -> Self {
        SyncError::Xml {
            file: file.into(),
            source: source.into(),
        }
    }

    pub fn metadata(file: impl Into<String>, reason: impl Into<String>) -> Self {
        SyncError::Metadata {
            file: file.into(),
            reason: reason.into(),
        }
    }
}

/// 单个文件传输的结果分类
#[derive(Debug, Error)]
pub enum TransferError {
    /// 暂时性错误，可以重试
    #[error("{0}")]
    Retryable(String),

    /// 文件失败但同步继续
    #[error("{0}")]
    Failed(String),

    #[error(transparent)]
    Fatal(#[from] SyncError),
}

pub type Result<T, E = SyncError> = std::result::Result<T, E>;
