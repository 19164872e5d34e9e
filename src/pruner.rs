use colored::Colorize;
use log::{debug, error, info};
use std::io::ErrorKind;
use std::path::Path;
use tokio::fs;

use crate::error::{Result, SyncError};
use crate::ledger::Ledger;
use crate::types::PruneCounter;

/// 删除登记过的目录中不在 `ledger` 里的文件。
///
/// 只遍历 `ledger` 中记录的目录（每个目录不递归），
/// 目标目录中其他位置的内容不会被触碰。
pub async fn prune(destination: &Path, ledger: &Ledger, dry_run: bool) -> Result<PruneCounter> {
    let mut counter = PruneCounter::default();

    for dir in ledger.touched_dirs() {
        let dir_path = if dir.is_empty() {
            destination.to_path_buf()
        } else {
            destination.join(dir)
        };

        let mut entries = match fs::read_dir(&dir_path).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                debug!("{} does not exist, nothing to clean", dir_path.display());
                continue;
            }
            Err(e) => {
                error!("Cannot read {}: {}", dir_path.display(), e);
                continue;
            }
        };

        while let Some(entry) = entries
            .next_entry()
            .await
            .map_err(|e| SyncError::io(&dir_path, e))?
        {
            let is_file = match entry.file_type().await {
                Ok(file_type) => file_type.is_file(),
                Err(e) => {
                    error!("Cannot stat {}: {}", entry.path().display(), e);
                    continue;
                }
            };
            if !is_file {
                continue;
            }

            let name = entry.file_name();
            let relative = if dir.is_empty() {
                name.to_string_lossy().into_owned()
            } else {
                format!("{}/{}", dir, name.to_string_lossy())
            };
            if ledger.contains(&relative) {
                continue;
            }

            let size = entry.metadata().await.map(|m| m.len()).unwrap_or(0);
            if dry_run {
                info!("{}", format!("{} would be deleted", relative).dimmed());
            } else {
                if let Err(e) = fs::remove_file(entry.path()).await {
                    error!("Cannot delete {}: {}", relative, e);
                    continue;
                }
                info!("{}", format!("{} deleted", relative).dimmed());
            }
            counter.count += 1;
            counter.size += size;
        }
    }

    Ok(counter)
}
