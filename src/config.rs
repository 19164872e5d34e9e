use clap::Parser;
use std::collections::BTreeSet;
use std::path::PathBuf;
use std::time::Duration;

use crate::constants::{DEFAULT_REQUEST_TIMEOUT_SECONDS, DEFAULT_RETRIES, DEFAULT_RETRY_DELAY_SECONDS};
use crate::error::Result;
use crate::source::SourceLocation;

/// Clones repositories in RPM-MD format, optionally restricted to some architectures.
#[derive(Debug, Parser)]
#[command(name = "rrepo-mirror", version)]
pub struct MirrorArgs {
    /// Source http(s) url or local path of the RPM repo root dir having /repodata/repomd.xml
    #[arg(value_name = "SOURCE_URL")]
    pub source_url: String,

    /// Destination path where all files and metadata are downloaded, created if missing
    #[arg(value_name = "DESTINATION_DIR")]
    pub destination_dir: PathBuf,

    /// Architecture to download packages for, may be given multiple times
    #[arg(long = "arch", value_name = "NAME")]
    pub arches: Vec<String>,

    /// Don't delete old files that are not in the repo
    #[arg(long)]
    pub noclean: bool,

    /// Only report the files that would be deleted
    #[arg(long)]
    pub dry_run: bool,

    /// Log files that are already present
    #[arg(short, long)]
    pub verbose: bool,

    /// Append the output to FILE as well
    #[arg(long = "log", value_name = "FILE")]
    pub log_file: Option<PathBuf>,

    /// Attempts per file on transient network errors
    #[arg(long, env = "RRMIRROR_RETRIES", default_value_t = DEFAULT_RETRIES)]
    pub retries: u32,

    /// Seconds to wait between attempts
    #[arg(long, env = "RRMIRROR_RETRY_DELAY", default_value_t = DEFAULT_RETRY_DELAY_SECONDS)]
    pub retry_delay: u64,

    /// Whole-request timeout in seconds, 0 for no limit
    #[arg(long, env = "RRMIRROR_TIMEOUT", default_value_t = DEFAULT_REQUEST_TIMEOUT_SECONDS)]
    pub timeout: u64,
}

/// Deletes files from a local repository clone that are not listed in the repo.
#[derive(Debug, Parser)]
#[command(name = "rrepo-clean", version)]
pub struct CleanArgs {
    /// Path where a repository was cloned
    #[arg(value_name = "BASEDIR")]
    pub basedir: PathBuf,

    /// Only report the files that would be deleted
    #[arg(long)]
    pub dry_run: bool,

    #[arg(short, long)]
    pub verbose: bool,

    #[arg(long = "log", value_name = "FILE")]
    pub log_file: Option<PathBuf>,
}

#[derive(Debug, Clone)]
pub struct Config {
    /// `None` 表示离线模式：只登记克隆目录中已有的文件
    pub source: Option<SourceLocation>,
    pub destination: PathBuf,
    /// 为空时接受所有架构
    pub arches: BTreeSet<String>,
    pub clean: bool,
    pub dry_run: bool,
    pub verbose: bool,
    pub retries: u32,
    pub retry_delay: Duration,
    /// `None` 时只限制连接和单个数据块的等待时间
    pub request_timeout: Option<Duration>,
}

impl Config {
    pub fn new(source: SourceLocation, destination: impl Into<PathBuf>) -> Self {
        Self {
            source: Some(source),
            ..Self::offline(destination)
        }
    }

    pub fn offline(destination: impl Into<PathBuf>) -> Self {
        Self {
            source: None,
            destination: destination.into(),
            arches: BTreeSet::new(),
            clean: true,
            dry_run: false,
            verbose: false,
            retries: DEFAULT_RETRIES,
            retry_delay: Duration::from_secs(DEFAULT_RETRY_DELAY_SECONDS),
            request_timeout: request_timeout(DEFAULT_REQUEST_TIMEOUT_SECONDS),
        }
    }

    pub fn accepts_arch(&self, arch: &str) -> bool {
        self.arches.is_empty() || self.arches.contains(arch)
    }
}

fn request_timeout(seconds: u64) -> Option<Duration> {
    (seconds > 0).then(|| Duration::from_secs(seconds))
}

impl TryFrom<MirrorArgs> for Config {
    type Error = crate::error::SyncError;

    fn try_from(args: MirrorArgs) -> Result<Self> {
        let source = SourceLocation::parse(&args.source_url)?;
        Ok(Config {
            arches: args.arches.into_iter().collect(),
            clean: !args.noclean,
            dry_run: args.dry_run,
            verbose: args.verbose,
            retries: args.retries.max(1),
            retry_delay: Duration::from_secs(args.retry_delay),
            request_timeout: request_timeout(args.timeout),
            ..Config::new(source, args.destination_dir)
        })
    }
}

impl From<CleanArgs> for Config {
    fn from(args: CleanArgs) -> Self {
        Config {
            dry_run: args.dry_run,
            verbose: args.verbose,
            ..Config::offline(args.basedir)
        }
    }
}
