use std::sync::Arc;

use clap::Parser;
use smn_dirserve::{
    sys_config::core::{CliArgs, ServerConfig, parse_addr},
    sys_server::core::run_server,
};

#[tokio::main]
async fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args = CliArgs::parse();
    let (addr, config) = match parse_addr(&args.addr)
        .and_then(|addr| ServerConfig::from_args(&args).map(|config| (addr, config)))
    {
        Ok(v) => v,
        Err(e) => {
            eprintln!("{e}");
            std::process::exit(1);
        }
    };

    log::info!("serving {} on {}", args.root, args.addr);
    if let Err(e) = run_server(addr, Arc::new(config)).await {
        log::error!("{e}");
        std::process::exit(1);
    }
}
