// Copyright (c) 2025 Ronan LE MEILLAT, SCTG Development
// This file is part of the simpleplc project and is licensed under the
// SCTG Development Non-Commercial License v1.0 (see LICENSE.md for details).

//! # Daemon Module
//!
//! The daemon module wires the simulator components together and manages
//! their lifecycle: the register bank, the scan engine, the Modbus TCP
//! slave, the OPC UA server and the statistics reporter.
//!
//! ## Usage
//!
//! ```no_run
//! use simpleplc::{config::Config, daemon::launch_daemon::Daemon};
//! use std::path::Path;
//! use std::sync::Arc;
//!
//! async fn run() -> anyhow::Result<()> {
//!     let config = Arc::new(Config::from_file(Path::new("settings.ini")));
//!
//!     // Create and launch daemon
//!     let mut daemon = Daemon::new();
//!     daemon.launch(config).await?;
//!
//!     // Wait for shutdown signal (e.g., Ctrl+C)
//!     tokio::signal::ctrl_c().await?;
//!
//!     // Clean shutdown
//!     daemon.shutdown();
//!     daemon.join().await?;
//!
//!     Ok(())
//! }
//! ```

pub mod launch_daemon;

pub use launch_daemon::Daemon;
