use std::process::ExitCode;

use clap::Parser;

mod api;
mod app;
mod attendance;
mod config;
mod log;
mod payment;
mod render;

#[tokio::main]
async fn main() -> color_eyre::Result<ExitCode> {
    dotenvy::dotenv().ok();
    let config = config::Config::parse();
    log::setup(&config)?;
    app::run(config).await
}
