use std::fmt;

use bytesize::ByteSize;

/// 仓库中需要存在的一个文件
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RepoEntry {
    pub relative_path: String,
    /// `None` 表示大小未知，只检查文件是否存在
    pub expected_size: Option<u64>,
}

impl RepoEntry {
    pub fn new(relative_path: impl Into<String>, expected_size: Option<u64>) -> Self {
        Self {
            relative_path: relative_path.into(),
            expected_size,
        }
    }

    pub fn unknown_size(relative_path: impl Into<String>) -> Self {
        Self::new(relative_path, None)
    }
}

/// primary 列表中的一个软件包
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PackageRecord {
    pub relative_path: String,
    pub arch: String,
    pub size: Option<u64>,
}

impl From<PackageRecord> for RepoEntry {
    fn from(record: PackageRecord) -> Self {
        RepoEntry::new(record.relative_path, record.size)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FetchOutcome {
    AlreadyPresent,
    Fetched(u64),
    /// 每次运行都会重新下载的仓库头文件
    Refreshed(u64),
    Failed(String),
}

impl fmt::Display for FetchOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FetchOutcome::AlreadyPresent => write!(f, "exists"),
            FetchOutcome::Fetched(_) => write!(f, "downloaded"),
            FetchOutcome::Refreshed(_) => write!(f, "refreshed"),
            FetchOutcome::Failed(reason) => write!(f, "FAILED: {}", reason),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunCounters {
    pub new_files: usize,
    /// 重新下载的仓库头文件，不计入 `new_files`
    pub refreshed_files: usize,
    pub failed_files: usize,
    pub bytes_transferred: u64,
    pub deleted_files: usize,
    pub deleted_bytes: u64,
}

impl RunCounters {
    pub fn record(&mut self, outcome: &FetchOutcome) {
        match outcome {
            FetchOutcome::AlreadyPresent => {}
            FetchOutcome::Fetched(bytes) => {
                self.new_files += 1;
                self.bytes_transferred += bytes;
            }
            FetchOutcome::Refreshed(bytes) => {
                self.refreshed_files += 1;
                self.bytes_transferred += bytes;
            }
            FetchOutcome::Failed(_) => {
                self.failed_files += 1;
            }
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PruneCounter {
    pub count: usize,
    pub size: u64,
}

/// 进度行中显示的文件大小
pub fn display_size(size: Option<u64>) -> String {
    match size {
        Some(bytes) => ByteSize::b(bytes).to_string_as(true),
        None => "unknown size".to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn counters_track_new_and_failed_files() {
        let mut counters = RunCounters::default();
        counters.record(&FetchOutcome::AlreadyPresent);
        counters.record(&FetchOutcome::Fetched(1000));
        counters.record(&FetchOutcome::Refreshed(50));
        counters.record(&FetchOutcome::Failed("gone".into()));

        assert_eq!(counters.new_files, 1);
        assert_eq!(counters.refreshed_files, 1);
        assert_eq!(counters.failed_files, 1);
        assert_eq!(counters.bytes_transferred, 1050);
    }

    #[test]
    fn package_record_keeps_declared_size() {
        let record = PackageRecord {
            relative_path: "pkgs/a-1.0.x86_64.rpm".into(),
            arch: "x86_64".into(),
            size: Some(1000),
        };
        let entry = RepoEntry::from(record);
        assert_eq!(entry, RepoEntry::new("pkgs/a-1.0.x86_64.rpm", Some(1000)));
    }
}
