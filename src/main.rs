use anyhow::{Context, Result};
use clap::Parser;
use tracing::Level;

use kikusui_control::cli::{self, Cli};
use kikusui_control::config;
use kikusui_control::{Endpoint, PowerSupply};

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    let argv = cli::normalize_args(std::env::args())?;
    let args = Cli::parse_from(argv);

    let level = match args.verbose {
        0 => Level::WARN,
        1 => Level::INFO,
        2 => Level::DEBUG,
        _ => Level::TRACE,
    };
    tracing_subscriber::fmt()
        .with_max_level(level)
        .with_writer(std::io::stderr)
        .init();

    let ip = config::resolve_ip(args.ipaddr.as_deref())?;
    let endpoint = Endpoint::new(ip);

    let mut inst = PowerSupply::connect_with_timeout(&endpoint, args.io_timeout())
        .await
        .with_context(|| format!("cannot reach instrument at {endpoint}"))?;

    let mut stdout = std::io::stdout().lock();
    cli::dispatch(&args.command, &mut inst, &mut stdout).await?;

    inst.close().await?;
    Ok(())
}
