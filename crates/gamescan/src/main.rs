use std::process::ExitCode;

use anyhow::Result;
use clap::Parser;

use crate::cli::{App, Commands};
use crate::env::GameEnv;

mod cli;
mod env;
mod logging;
mod ui;

#[tokio::main]
async fn main() -> ExitCode {
    let app = App::parse();
    match run(app).await {
        Ok(code) => code,
        Err(e) => {
            eprintln!("error: {e:#}");
            ExitCode::FAILURE
        }
    }
}

async fn run(app: App) -> Result<ExitCode> {
    let env = GameEnv::new(&app)?;
    let (directive, force) = env.log_filter();
    logging::init(&directive, force)?;

    match app.cmd {
        Commands::Scan(arg) => cli::scan(&env, arg).await,
        Commands::Repair => cli::repair(&env).await,
        Commands::Fetch(arg) => cli::fetch(&env, arg).await,
    }
}
