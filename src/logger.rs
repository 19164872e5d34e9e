use anyhow::{anyhow, Result};
use chrono::Local;
use env_logger::fmt::Color;
use indicatif::MultiProgress;
use log::{Level, LevelFilter};
use std::fs::create_dir_all;
use std::io::{self, Write};
use std::path::Path;
use tracing_appender::non_blocking::WorkerGuard;

// 全局MultiProgress实例，写日志时先隐藏进度条
lazy_static::lazy_static! {
    pub static ref MULTI_PROGRESS: MultiProgress = MultiProgress::new();
}

/// 持有日志文件的后台写入线程，drop 时刷新剩余内容
pub struct LoggerGuard {
    _file: Option<WorkerGuard>,
}

// 同时写入标准输出和日志文件
struct DualWriter {
    console: io::Stdout,
    file: Option<Box<dyn Write + Send>>,
}

impl Write for DualWriter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let console = &mut self.console;
        let file = &mut self.file;
        MULTI_PROGRESS.suspend(|| {
            let console_result = console.write(buf);
            if let Some(file) = file.as_mut() {
                let _ = file.write_all(buf);
            }
            console_result
        })
    }

    fn flush(&mut self) -> io::Result<()> {
        let _ = self.console.flush();
        if let Some(file) = self.file.as_mut() {
            let _ = file.flush();
        }
        Ok(())
    }
}

/// 初始化日志：控制台输出，另外可以追加写入 `log_file`。
///
/// 默认级别为 info，`verbose` 时本crate为 debug，`RUST_LOG` 可以覆盖。
pub fn init_logger(verbose: bool, log_file: Option<&Path>) -> Result<LoggerGuard> {
    let (file, guard) = match log_file {
        Some(path) => {
            let file_name = path
                .file_name()
                .ok_or_else(|| anyhow!("invalid log file {}", path.display()))?;
            let dir = match path.parent() {
                Some(parent) if !parent.as_os_str().is_empty() => parent,
                _ => Path::new("."),
            };
            create_dir_all(dir)?;

            // 不滚动的 appender 以追加方式打开文件
            let appender = tracing_appender::rolling::never(dir, file_name);
            let (non_blocking, guard) = tracing_appender::non_blocking(appender);
            // 日志文件中不写入颜色控制符
            colored::control::set_override(false);
            (Some(Box::new(non_blocking) as Box<dyn Write + Send>), Some(guard))
        }
        None => (None, None),
    };

    let writer = DualWriter {
        console: io::stdout(),
        file,
    };

    let mut builder = env_logger::Builder::new();
    builder
        .format(|buf, record| {
            let mut style = buf.style();
            let level_color = match record.level() {
                Level::Error => Color::Red,
                Level::Warn => Color::Yellow,
                Level::Info => Color::Green,
                Level::Debug => Color::Blue,
                Level::Trace => Color::Cyan,
            };
            style.set_color(level_color);

            let timestamp = Local::now().format("%Y-%m-%d %H:%M:%S");
            let level_str = style.value(format!("{:<5}", record.level()));

            writeln!(buf, "[{} {}] {}", timestamp, level_str, record.args())
        })
        .filter_level(LevelFilter::Info);

    if verbose {
        builder.filter_module("rrepo_mirror", LevelFilter::Debug);
    }

    builder
        .parse_env("RUST_LOG")
        .target(env_logger::Target::Pipe(Box::new(writer)))
        .try_init()?;

    Ok(LoggerGuard { _file: guard })
}
