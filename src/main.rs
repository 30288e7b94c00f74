// Copyright (c) 2025 Ronan LE MEILLAT, SCTG Development
// This file is part of the simpleplc project and is licensed under the
// SCTG Development Non-Commercial License v1.0 (see LICENSE.md for details).

// Main entry point for the SimplePLC simulator

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Result;
use clap::Parser;
use log::{error, info};

use simpleplc::config::Config;
use simpleplc::daemon::Daemon;

/// SimplePLC - Combined Modbus and OPC UA Server
#[derive(Debug, Parser)]
#[command(author, version, about, long_about = None)]
pub struct Args {
    /// Path to the INI configuration file
    #[arg(default_value = "settings.ini")]
    config: PathBuf,

    /// Enable verbose logging (debug level)
    #[arg(short = 'v', long = "verbose")]
    verbose: bool,

    /// Disable all logging output
    #[arg(short = 'q', long = "quiet")]
    quiet: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let log_level = if args.quiet {
        log::LevelFilter::Off
    } else if args.verbose {
        log::LevelFilter::Debug
    } else {
        log::LevelFilter::Info
    };

    env_logger::Builder::from_default_env()
        .filter_level(log_level)
        .init();

    info!("SimplePLC - Combined Modbus and OPC UA Server");
    info!("------------------------------------------------");

    let config = Arc::new(Config::from_file(&args.config));

    let mut daemon = Daemon::new();
    if let Err(err) = daemon.launch(Arc::clone(&config)).await {
        // Bring-up failure: exit code 1 through the Result return.
        error!("[Main] Startup failed: {err:#}");
        return Err(err);
    }

    wait_for_shutdown().await?;

    info!("Shutting down...");
    daemon.shutdown();
    daemon.join().await?;

    info!("Shutdown complete");
    Ok(())
}

/// Block until SIGINT (Ctrl+C) or, on Unix, SIGTERM.
async fn wait_for_shutdown() -> Result<()> {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};
        let mut sigterm = signal(SignalKind::terminate())?;
        tokio::select! {
            result = tokio::signal::ctrl_c() => result?,
            _ = sigterm.recv() => {}
        }
    }
    #[cfg(not(unix))]
    tokio::signal::ctrl_c().await?;
    Ok(())
}
