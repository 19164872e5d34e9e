use async_trait::async_trait;
use std::path::{Path, PathBuf};
use tokio::fs;

use crate::error::TransferError;
use crate::source::base::Source;

/// 从本地目录复制文件。本地文件系统错误不视为暂时性错误，不重试。
pub struct LocalSource {
    root: PathBuf,
}

impl LocalSource {
    pub fn new(root: PathBuf) -> Self {
        Self { root }
    }
}

#[async_trait]
impl Source for LocalSource {
    async fn transfer(
        &self,
        relative_path: &str,
        dest: &Path,
        _attempts: u32,
    ) -> Result<u64, TransferError> {
        let source_path = self.root.join(relative_path);
        fs::copy(&source_path, dest)
            .await
            .map_err(|e| TransferError::Failed(format!("cannot copy {}: {}", source_path.display(), e)))
    }
}
