use log::{debug, error, info, warn};
use std::path::{Component, Path, PathBuf};
use tokio::fs;

use crate::error::{Result, TransferError};
use crate::ledger::Ledger;
use crate::source::Source;
use crate::types::{display_size, FetchOutcome, RepoEntry};

/// 控制单个文件的获取方式
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FetchPolicy {
    /// 即使本地已存在也重新下载
    pub refresh: bool,
    /// 只尝试一次，任何错误都只记为失败
    pub optional: bool,
}

impl FetchPolicy {
    pub const REQUIRED: FetchPolicy = FetchPolicy {
        refresh: false,
        optional: false,
    };
    pub const HEAD: FetchPolicy = FetchPolicy {
        refresh: true,
        optional: false,
    };
    pub const OPTIONAL_HEAD: FetchPolicy = FetchPolicy {
        refresh: true,
        optional: true,
    };
}

pub struct Fetcher {
    destination: PathBuf,
    /// 离线模式下为 `None`，只检查文件是否存在
    source: Option<Box<dyn Source>>,
    retries: u32,
    verbose: bool,
}

impl Fetcher {
    pub fn new(
        destination: PathBuf,
        source: Option<Box<dyn Source>>,
        retries: u32,
        verbose: bool,
    ) -> Self {
        Self {
            destination,
            source,
            retries,
            verbose,
        }
    }

    pub fn destination(&self) -> &Path {
        &self.destination
    }

    /// 确保 `destination/relative_path` 存在且大小符合预期，必要时从源获取。
    ///
    /// 除了被拒绝的不安全路径，所有结果（包括失败）都会登记到 `ledger`，
    /// 这样失败的文件不会在清理阶段被当作多余文件删除。
    /// 只有致命错误才会返回 `Err`。
    pub async fn ensure(
        &self,
        entry: &RepoEntry,
        policy: FetchPolicy,
        ledger: &mut Ledger,
    ) -> Result<FetchOutcome> {
        let relative_path = entry.relative_path.as_str();
        if !is_safe_relative(relative_path) {
            let outcome = FetchOutcome::Failed("path escapes the destination".to_string());
            self.report(entry, &outcome);
            return Ok(outcome);
        }

        let local_path = self.destination.join(relative_path);
        let outcome = match &self.source {
            Some(source) => self.fetch(source.as_ref(), entry, policy, &local_path).await?,
            None => account(&local_path).await,
        };

        ledger.add(relative_path);
        self.report(entry, &outcome);
        Ok(outcome)
    }

    async fn fetch(
        &self,
        source: &dyn Source,
        entry: &RepoEntry,
        policy: FetchPolicy,
        local_path: &Path,
    ) -> Result<FetchOutcome> {
        if !policy.refresh && is_up_to_date(local_path, entry.expected_size).await {
            return Ok(FetchOutcome::AlreadyPresent);
        }

        if let Some(parent) = local_path.parent() {
            if let Err(e) = fs::create_dir_all(parent).await {
                return Ok(FetchOutcome::Failed(format!(
                    "cannot create {}: {}",
                    parent.display(),
                    e
                )));
            }
        }

        let attempts = if policy.optional { 1 } else { self.retries };
        match source.transfer(&entry.relative_path, local_path, attempts).await {
            Ok(bytes) => {
                if let Some(expected) = entry.expected_size {
                    if bytes != expected {
                        warn!(
                            "{}: received {} bytes, repository declares {}",
                            entry.relative_path, bytes, expected
                        );
                    }
                }
                Ok(if policy.refresh {
                    FetchOutcome::Refreshed(bytes)
                } else {
                    FetchOutcome::Fetched(bytes)
                })
            }
            Err(TransferError::Fatal(e)) if policy.optional => Ok(FetchOutcome::Failed(e.to_string())),
            Err(TransferError::Fatal(e)) => Err(e),
            Err(TransferError::Retryable(reason)) | Err(TransferError::Failed(reason)) => {
                Ok(FetchOutcome::Failed(reason))
            }
        }
    }

    fn report(&self, entry: &RepoEntry, outcome: &FetchOutcome) {
        let size = display_size(entry.expected_size);
        match outcome {
            FetchOutcome::AlreadyPresent if self.verbose => {
                info!("{} ({}) {}", entry.relative_path, size, outcome)
            }
            FetchOutcome::AlreadyPresent => debug!("{} ({}) {}", entry.relative_path, size, outcome),
            FetchOutcome::Fetched(_) | FetchOutcome::Refreshed(_) => {
                info!("{} ({}) {}", entry.relative_path, size, outcome)
            }
            FetchOutcome::Failed(_) => error!("{} ({}) {}", entry.relative_path, size, outcome),
        }
    }
}

async fn is_up_to_date(local_path: &Path, expected_size: Option<u64>) -> bool {
    match fs::metadata(local_path).await {
        Ok(metadata) => {
            metadata.is_file() && expected_size.map_or(true, |size| metadata.len() == size)
        }
        Err(_) => false,
    }
}

async fn account(local_path: &Path) -> FetchOutcome {
    match fs::metadata(local_path).await {
        Ok(metadata) if metadata.is_file() => FetchOutcome::AlreadyPresent,
        _ => FetchOutcome::Failed("missing from the clone".to_string()),
    }
}

fn is_safe_relative(relative_path: &str) -> bool {
    !relative_path.is_empty()
        && Path::new(relative_path)
            .components()
            .all(|component| matches!(component, Component::Normal(_)))
}
