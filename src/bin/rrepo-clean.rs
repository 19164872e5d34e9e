use anyhow::Result;
use clap::Parser;
use dotenv::dotenv;
use log::{error, info};
use rrepo_mirror::config::{CleanArgs, Config};
use rrepo_mirror::logger::init_logger;
use rrepo_mirror::Mirror;

async fn run(args: CleanArgs) -> Result<()> {
    let mut mirror = Mirror::new(Config::from(args))?;
    mirror.run().await?;
    Ok(())
}

#[tokio::main(flavor = "current_thread")]
async fn main() {
    dotenv().ok();
    let args = CleanArgs::parse();

    let guard = match init_logger(args.verbose, args.log_file.as_deref()) {
        Ok(guard) => guard,
        Err(e) => {
            eprintln!("Cannot initialize logging: {:#}", e);
            std::process::exit(1);
        }
    };

    info!("rrepo-clean {}", env!("CARGO_PKG_VERSION"));

    let code = match run(args).await {
        Ok(()) => 0,
        Err(e) => {
            error!("{:#}", e);
            1
        }
    };

    drop(guard);
    std::process::exit(code);
}
