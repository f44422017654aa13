mod cli;

use anyhow::Result;
use clap::Parser;
use cli::Cli;
use log::info;
use std::process::ExitCode;

#[tokio::main]
async fn main() -> Result<ExitCode> {
    env_logger::init();

    let cli = Cli::parse();
    info!("Starting perfwatch - Performance Regression Detector");
    let code = cli.execute().await?;

    Ok(code)
}
