//! Lansend CLI - LocalSend-compatible local network file transfer
//!
//! Lansend finds devices on the local network through multicast
//! announcements and exchanges files with them over the LocalSend v2 HTTP
//! protocol.
//!
//! ## Quick Start
//!
//! ```bash
//! # Receive files (announces itself and accepts every offer)
//! lansend serve
//!
//! # Send a file (on another device)
//! lansend send 192.168.1.20 ./report.txt
//! ```

#![allow(clippy::doc_markdown)]
#![allow(clippy::uninlined_format_args)]

use anyhow::Result;
use clap::Parser;

mod commands;
pub mod ui;

use commands::{Cli, Command};

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    init_logging(cli.verbose);

    match cli.command {
        Command::Serve(args) => commands::serve::run(args).await,
        Command::Send(args) => commands::send::run(args).await,
        Command::Scan(args) => commands::scan::run(args).await,
        Command::Info(args) => commands::info::run(args).await,
        Command::Config(args) => commands::config::run(args),
    }
}

fn init_logging(verbose: bool) {
    use tracing_subscriber::{fmt, prelude::*, EnvFilter};

    let default = if verbose {
        "warn,lansend=debug,lansend_core=debug,tower_http=debug"
    } else {
        "warn,lansend=info,lansend_core=info"
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));

    tracing_subscriber::registry()
        .with(fmt::layer().with_target(false).without_time())
        .with(filter)
        .init();
}
