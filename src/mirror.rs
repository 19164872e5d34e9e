use bytesize::ByteSize;
use colored::Colorize;
use indicatif::{ProgressBar, ProgressStyle};
use log::{info, warn};
use std::path::Path;
use std::time::Duration;

use crate::config::Config;
use crate::error::{Result, SyncError};
use crate::fetcher::{FetchPolicy, Fetcher};
use crate::ledger::Ledger;
use crate::logger::MULTI_PROGRESS;
use crate::primary;
use crate::pruner;
use crate::repomd;
use crate::source::get_source;
use crate::types::{FetchOutcome, RepoEntry, RunCounters};

/// 一次同步运行：索引 → primary 列表 → 软件包 → 清理
pub struct Mirror {
    config: Config,
    fetcher: Fetcher,
    ledger: Ledger,
    counters: RunCounters,
    progress: Option<ProgressBar>,
}

impl Mirror {
    pub fn new(config: Config) -> Result<Self> {
        let source = match &config.source {
            Some(location) => Some(get_source(location, &config)?),
            None => None,
        };
        let fetcher = Fetcher::new(
            config.destination.clone(),
            source,
            config.retries,
            config.verbose,
        );

        // 离线模式没有逐文件的下载输出，用一个计数器显示进度
        let progress = config.source.is_none().then(|| {
            let bar = MULTI_PROGRESS.add(ProgressBar::new_spinner());
            bar.set_style(
                ProgressStyle::with_template("{spinner} {msg}")
                    .unwrap_or_else(|_| ProgressStyle::default_spinner()),
            );
            bar.enable_steady_tick(Duration::from_millis(120));
            bar
        });

        Ok(Self {
            config,
            fetcher,
            ledger: Ledger::new(),
            counters: RunCounters::default(),
            progress,
        })
    }

    pub fn destination(&self) -> &Path {
        self.fetcher.destination()
    }

    pub fn ledger(&self) -> &Ledger {
        &self.ledger
    }

    pub fn counters(&self) -> &RunCounters {
        &self.counters
    }

    /// 获取一个文件、登记它并累计计数。只有致命错误才返回 `Err`。
    pub(crate) async fn fetch(&mut self, entry: &RepoEntry, policy: FetchPolicy) -> Result<FetchOutcome> {
        let outcome = self.fetcher.ensure(entry, policy, &mut self.ledger).await?;
        self.counters.record(&outcome);
        if let Some(bar) = &self.progress {
            bar.set_message(format!("Accounting files in the repo... {}", self.ledger.len()));
        }
        Ok(outcome)
    }

    pub async fn run(&mut self) -> Result<RunCounters> {
        self.announce();

        let index = repomd::load_index(self).await?;
        let primary_path = self.destination().join(&index.primary_listing);
        if !primary_path.is_file() {
            return Err(SyncError::PrimaryUnavailable(primary_path));
        }
        self.sync_packages(&primary_path).await?;

        if let Some(bar) = self.progress.take() {
            bar.finish_and_clear();
        }

        if self.config.clean {
            info!("---");
            info!("--- Cleaning old files in {}", self.destination().display());
            info!("---");
            let pruned =
                pruner::prune(self.fetcher.destination(), &self.ledger, self.config.dry_run).await?;
            self.counters.deleted_files = pruned.count;
            self.counters.deleted_bytes = pruned.size;
        }

        self.report();
        Ok(self.counters.clone())
    }

    async fn sync_packages(&mut self, primary_path: &Path) -> Result<()> {
        let mut skipped = 0usize;

        for record in primary::open_listing(primary_path)? {
            let record = record?;
            if !self.config.accepts_arch(&record.arch) {
                skipped += 1;
                continue;
            }
            self.fetch(&RepoEntry::from(record), FetchPolicy::REQUIRED).await?;
        }

        if skipped > 0 {
            info!("{} packages skipped by the architecture filter", skipped);
        }
        Ok(())
    }

    fn announce(&self) {
        info!("---");
        match &self.config.source {
            Some(source) => {
                let arches = if self.config.arches.is_empty() {
                    "all".to_string()
                } else {
                    self.config.arches.iter().cloned().collect::<Vec<_>>().join(", ")
                };
                info!("--- Cloning {} archs {}", source, arches);
                info!("--- to {}", self.destination().display());
            }
            None => info!("--- Cleaning old files in RPM repo {}", self.destination().display()),
        }
        info!("---");
    }

    fn report(&self) {
        let counters = &self.counters;
        info!("---");
        match &self.config.source {
            Some(source) => {
                info!("--- Repository {} clone finished", source);
                info!("---");
                info!(
                    "{} new files have been downloaded, {} metadata files refreshed, {} transferred",
                    counters.new_files.to_string().green(),
                    counters.refreshed_files,
                    ByteSize::b(counters.bytes_transferred).to_string_as(true)
                );
                if counters.failed_files > 0 {
                    warn!(
                        "{}",
                        format!(
                            "{} files failed to download, run again to retry them",
                            counters.failed_files
                        )
                        .yellow()
                    );
                }
            }
            None => {
                info!("{} files accounted in the repo", self.ledger.len());
                if counters.failed_files > 0 {
                    warn!(
                        "{}",
                        format!("{} declared files are missing from the clone", counters.failed_files)
                            .yellow()
                    );
                }
            }
        }

        if self.config.clean {
            let verb = if self.config.dry_run { "would be" } else { "have been" };
            info!(
                "{} old files {} deleted ({})",
                counters.deleted_files,
                verb,
                ByteSize::b(counters.deleted_bytes).to_string_as(true)
            );
        }
    }
}
