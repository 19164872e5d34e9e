//! Mirrors RPM-MD (YUM/DNF) repositories into a local directory tree.
//!
//! A run reads `repodata/repomd.xml`, fetches every declared metadata file,
//! streams the primary package listing and fetches the packages it lists,
//! then deletes files in the touched directories that the repository no
//! longer declares.

pub mod config;
pub mod constants;
pub mod error;
pub mod fetcher;
pub mod ledger;
pub mod logger;
pub mod mirror;
pub mod primary;
pub mod pruner;
pub mod repomd;
pub mod source;
pub mod types;

pub use config::Config;
pub use error::{SyncError, TransferError};
pub use mirror::Mirror;
pub use source::SourceLocation;
pub use types::{FetchOutcome, RepoEntry, RunCounters};
