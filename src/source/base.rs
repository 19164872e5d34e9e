use async_trait::async_trait;
use log::info;
use std::fmt;
use std::path::{Path, PathBuf};
use url::Url;

use crate::config::Config;
use crate::error::{Result, SyncError, TransferError};
use crate::source::http::HttpSource;
use crate::source::local::LocalSource;

/// 上游仓库的位置，启动时解析一次
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SourceLocation {
    RemoteHttp(Url),
    LocalPath(PathBuf),
}

impl SourceLocation {
    pub fn parse(raw: &str) -> Result<Self> {
        let lower = raw.trim().to_ascii_lowercase();

        if lower.starts_with("http://") || lower.starts_with("https://") {
            let mut url = Url::parse(raw.trim())?;
            // 作为目录使用，否则 join 会替换掉最后一段路径
            if !url.path().ends_with('/') {
                let path = format!("{}/", url.path());
                url.set_path(&path);
            }
            return Ok(SourceLocation::RemoteHttp(url));
        }

        if lower.starts_with("file:") {
            let url = Url::parse(raw.trim())?;
            return url
                .to_file_path()
                .map(SourceLocation::LocalPath)
                .map_err(|_| SyncError::UnsupportedSource(raw.to_string()));
        }

        if raw.contains("://") || raw.trim().is_empty() {
            return Err(SyncError::UnsupportedSource(raw.to_string()));
        }

        Ok(SourceLocation::LocalPath(PathBuf::from(raw)))
    }
}

impl fmt::Display for SourceLocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SourceLocation::RemoteHttp(url) => write!(f, "{}", url),
            SourceLocation::LocalPath(path) => write!(f, "{}", path.display()),
        }
    }
}

#[async_trait]
pub trait Source: Send + Sync {
    /// 将 `relative_path` 的内容写入 `dest`，返回写入的字节数。
    ///
    /// `attempts` 是暂时性错误的总尝试次数；实现不得返回
    /// [`TransferError::Retryable`]，重试用尽后应返回 [`TransferError::Failed`]。
    async fn transfer(
        &self,
        relative_path: &str,
        dest: &Path,
        attempts: u32,
    ) -> Result<u64, TransferError>;
}

pub fn get_source(location: &SourceLocation, config: &Config) -> Result<Box<dyn Source>> {
    match location {
        SourceLocation::RemoteHttp(url) => {
            let source = HttpSource::new(url.clone(), config.request_timeout, config.retry_delay)?;
            info!("Using HTTP source {}", url);
            Ok(Box::new(source))
        }
        SourceLocation::LocalPath(path) => {
            info!("Using local source {}", path.display());
            Ok(Box::new(LocalSource::new(path.clone())))
        }
    }
}
