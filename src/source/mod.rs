mod base;
mod http;
mod local;

pub use base::{get_source, Source, SourceLocation};
pub use http::HttpSource;
pub use local::LocalSource;
