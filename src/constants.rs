use std::time::Duration;

pub const DEFAULT_RETRIES: u32 = 3;
pub const DEFAULT_RETRY_DELAY_SECONDS: u64 = 20;
pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(10);
/// 0 表示不限制整个请求的时长
pub const DEFAULT_REQUEST_TIMEOUT_SECONDS: u64 = 0;
/// 两个数据块之间允许的最长间隔
pub const DEFAULT_STALL_TIMEOUT: Duration = Duration::from_secs(60);

/// 写入目标文件时的缓冲块大小
pub const CHUNK_SIZE: usize = 1024 * 1024;

/// 可重试的HTTP状态码，其余非2xx状态视为致命错误
pub const RETRYABLE_STATUSES: [u16; 6] = [404, 429, 500, 502, 503, 504];

pub const REPOMD_PATH: &str = "repodata/repomd.xml";
pub const REPOMD_SIGNATURE_PATH: &str = "repodata/repomd.xml.asc";
pub const REPOMD_KEY_PATH: &str = "repodata/repomd.xml.key";

pub const PRIMARY_TYPE: &str = "primary";
pub const PRIMARY_SUFFIXES: [&str; 2] = ["primary.xml.gz", "primary.xml.zst"];
