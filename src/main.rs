//! Entry point for the termpilot binary.
//!
//! Parses arguments, resolves configuration, starts file logging and hands
//! control to [`App`].

use anyhow::Result;
use clap::Parser;

use termpilot::app::{self, App, Args};
use termpilot::utils;

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    let config = args.config()?;

    // keep the guard alive so buffered log lines are flushed on exit
    let _log_guard = utils::logger::init_logging(&config.log_dir());
    app::configure_color(&args);

    let mut app = App::new(&config, &args);
    app.run(&args).await
}
