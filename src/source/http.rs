use async_trait::async_trait;
use futures::StreamExt;
use log::{debug, warn};
use reqwest::Client;
use std::path::Path;
use std::time::Duration;
use tokio::fs;
use tokio::io::{AsyncWriteExt, BufWriter};
use tokio::time::{sleep, timeout};
use url::Url;

use crate::constants::{
    CHUNK_SIZE, DEFAULT_CONNECT_TIMEOUT, DEFAULT_STALL_TIMEOUT, RETRYABLE_STATUSES,
};
use crate::error::{Result, SyncError, TransferError};
use crate::source::base::Source;

/// 通过一个复用的HTTP连接池下载文件
pub struct HttpSource {
    client: Client,
    base_url: Url,
    retry_delay: Duration,
    /// 响应体两个数据块之间的最长等待时间
    stall_timeout: Duration,
}

impl HttpSource {
    /// `request_timeout` 限制整个请求（包括响应体）的时长，`None` 表示不限制。
    /// 无论是否设置，连接超时和数据块停滞检测始终生效。
    pub fn new(
        base_url: Url,
        request_timeout: Option<Duration>,
        retry_delay: Duration,
    ) -> Result<Self> {
        let mut builder = Client::builder()
            .connect_timeout(DEFAULT_CONNECT_TIMEOUT)
            .user_agent(concat!("rrepo-mirror/", env!("CARGO_PKG_VERSION")));
        if let Some(request_timeout) = request_timeout {
            builder = builder.timeout(request_timeout);
        }

        Ok(Self {
            client: builder.build()?,
            base_url,
            retry_delay,
            stall_timeout: DEFAULT_STALL_TIMEOUT,
        })
    }

    pub fn with_stall_timeout(mut self, stall_timeout: Duration) -> Self {
        self.stall_timeout = stall_timeout;
        self
    }

    async fn download_once(&self, url: &Url, dest: &Path) -> Result<u64, TransferError> {
        let response = self
            .client
            .get(url.clone())
            .send()
            .await
            .map_err(|e| TransferError::Retryable(format!("request failed: {}", e)))?;

        let status = response.status();
        if !status.is_success() {
            if RETRYABLE_STATUSES.contains(&status.as_u16()) {
                return Err(TransferError::Retryable(format!("HTTP {}", status)));
            }
            return Err(TransferError::Fatal(SyncError::FatalStatus {
                url: url.to_string(),
                status: status.as_u16(),
            }));
        }

        let file = fs::File::create(dest).await.map_err(|e| {
            TransferError::Failed(format!("cannot create {}: {}", dest.display(), e))
        })?;
        let mut writer = BufWriter::with_capacity(CHUNK_SIZE, file);
        let mut stream = response.bytes_stream();
        let mut written = 0u64;

        loop {
            let chunk = match timeout(self.stall_timeout, stream.next()).await {
                Ok(Some(chunk)) => chunk,
                Ok(None) => break,
                Err(_) => {
                    return Err(TransferError::Retryable(format!(
                        "transfer stalled for {}s",
                        self.stall_timeout.as_secs_f32()
                    )))
                }
            };
            let chunk = chunk
                .map_err(|e| TransferError::Retryable(format!("transfer interrupted: {}", e)))?;
            writer.write_all(&chunk).await.map_err(|e| {
                TransferError::Failed(format!("cannot write {}: {}", dest.display(), e))
            })?;
            written += chunk.len() as u64;
        }

        writer.flush().await.map_err(|e| {
            TransferError::Failed(format!("cannot write {}: {}", dest.display(), e))
        })?;

        Ok(written)
    }
}

#[async_trait]
impl Source for HttpSource {
    async fn transfer(
        &self,
        relative_path: &str,
        dest: &Path,
        attempts: u32,
    ) -> Result<u64, TransferError> {
        let url = self
            .base_url
            .join(relative_path)
            .map_err(|e| TransferError::Failed(format!("invalid path {}: {}", relative_path, e)))?;
        let attempts = attempts.max(1);
        let mut last_error = String::new();

        for attempt in 1..=attempts {
            debug!("GET {} (attempt {}/{})", url, attempt, attempts);
            match self.download_once(&url, dest).await {
                Ok(bytes) => return Ok(bytes),
                Err(TransferError::Retryable(reason)) => {
                    warn!("{} attempt {}/{}: {}", relative_path, attempt, attempts, reason);
                    last_error = reason;
                    if attempt < attempts {
                        sleep(self.retry_delay).await;
                    }
                }
                Err(e) => return Err(e),
            }
        }

        Err(TransferError::Failed(format!(
            "gave up after {} attempts: {}",
            attempts, last_error
        )))
    }
}
