use anyhow::Result;
use clap::Parser;
use dotenv::dotenv;
use log::{error, info};
use rrepo_mirror::config::{Config, MirrorArgs};
use rrepo_mirror::logger::init_logger;
use rrepo_mirror::Mirror;

async fn run(args: MirrorArgs) -> Result<()> {
    let config = Config::try_from(args)?;
    let mut mirror = Mirror::new(config)?;
    mirror.run().await?;
    Ok(())
}

#[tokio::main(flavor = "current_thread")]
async fn main() {
    // 加载 .env 中的 RRMIRROR_* 默认值
    dotenv().ok();
    let args = MirrorArgs::parse();

    let guard = match init_logger(args.verbose, args.log_file.as_deref()) {
        Ok(guard) => guard,
        Err(e) => {
            eprintln!("Cannot initialize logging: {:#}", e);
            std::process::exit(1);
        }
    };

    info!("rrepo-mirror {}", env!("CARGO_PKG_VERSION"));

    let code = match run(args).await {
        Ok(()) => 0,
        Err(e) => {
            error!("{:#}", e);
            1
        }
    };

    // 退出前刷新日志文件
    drop(guard);
    std::process::exit(code);
}
