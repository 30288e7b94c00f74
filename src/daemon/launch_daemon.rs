// Copyright (c) 2025 Ronan LE MEILLAT, SCTG Development
// This file is part of the simpleplc project and is licensed under the
// SCTG Development Non-Commercial License v1.0 (see LICENSE.md for details).

//! Daemon orchestrating the simulator components
//!
//! The daemon is the unique owner of the register bank and wires the
//! three front-ends around it in order: scan engine, Modbus slave,
//! OPC UA server. Shutdown is cooperative — a shared `AtomicBool` is
//! cleared and every loop observes it at its next suspension point — and
//! proceeds in reverse: OPC UA first, then the scan engine, while the
//! Modbus task winds down on the flag. The final connection statistics
//! are emitted before the tasks are joined.
//!
//! ### Thread Safety
//!
//! The `running` flag is wrapped in an `Arc` and shared with every task
//! so a single store reaches all of them. The configuration is immutable
//! after load and shared the same way.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use log::{error, info, warn};
use tokio::task::JoinHandle;
use tokio::time;

use crate::bank::RegisterBank;
use crate::config::{default_tags, Config};
use crate::modbus::{self, ConnectionRegistry, DeviceIdentity};
use crate::opc_ua::PlcOpcUaServer;
use crate::scan::ScanEngine;

/// How often the statistics reporter wakes up to observe the shutdown
/// flag; the table itself is emitted once per minute.
const REPORTER_TICK: Duration = Duration::from_millis(100);
const TICKS_PER_REPORT: u32 = 600;

/// Represents the daemon task manager that coordinates the simulator
/// services.
///
/// ### Fields
///
/// * `tasks` - Handles of the spawned tasks, joined on shutdown
/// * `running` - Atomic flag shared between tasks to coordinate shutdown
/// * `bank` - The register bank, created at launch from `mapping_size`
/// * `connections` - Modbus connection registry for the statistics table
pub struct Daemon {
    tasks: Vec<JoinHandle<Result<()>>>,
    running: Arc<AtomicBool>,
    bank: Option<Arc<RegisterBank>>,
    connections: Arc<ConnectionRegistry>,
    scan_engine: Option<ScanEngine>,
    opcua_server: Option<PlcOpcUaServer>,
    config: Arc<Config>,
}

impl Default for Daemon {
    fn default() -> Self {
        Self::new()
    }
}

impl Daemon {
    /// Create a new daemon instance ready to be launched.
    pub fn new() -> Self {
        Daemon {
            tasks: Vec::new(),
            running: Arc::new(AtomicBool::new(true)),
            bank: None,
            connections: Arc::new(ConnectionRegistry::new()),
            scan_engine: None,
            opcua_server: None,
            config: Arc::new(Config::default()),
        }
    }

    /// Launch all services against the provided configuration.
    ///
    /// The register bank is created first, then the scan engine, the
    /// Modbus slave and the OPC UA server in that order. Any failure is a
    /// bring-up failure: the caller logs it and exits with code 1.
    pub async fn launch(&mut self, config: Arc<Config>) -> Result<()> {
        self.config = config;

        let bank = Arc::new(RegisterBank::new(self.config.modbus.mapping_size));
        info!(
            "[Main] Register bank created ({} elements per space)",
            bank.mapping_size()
        );
        self.bank = Some(Arc::clone(&bank));

        self.start_scan_engine(&bank)?;
        self.start_modbus_server(&bank).await?;
        self.start_opcua_server(&bank)?;
        self.start_statistics_reporter();

        Ok(())
    }

    /// The register bank, available once launched.
    pub fn bank(&self) -> Option<Arc<RegisterBank>> {
        self.bank.clone()
    }

    fn start_scan_engine(&mut self, bank: &Arc<RegisterBank>) -> Result<()> {
        info!("[Main] Starting scan engine...");
        let engine = ScanEngine::start(Arc::clone(bank), &self.config.device)?;
        self.scan_engine = Some(engine);
        Ok(())
    }

    /// Launch the Modbus slave.
    ///
    /// The listener is bound here, synchronously, so a bind failure
    /// aborts startup instead of surfacing later from inside the task.
    async fn start_modbus_server(&mut self, bank: &Arc<RegisterBank>) -> Result<()> {
        info!("[Main] Starting Modbus server...");
        let listener = modbus::server::bind(&self.config.modbus).await?;

        let identity = Arc::new(DeviceIdentity::from_config(&self.config.device));
        let task = tokio::spawn(modbus::server::serve(
            listener,
            Arc::clone(bank),
            identity,
            Arc::clone(&self.connections),
            self.config.modbus.max_connections,
            Arc::clone(&self.running),
        ));
        self.tasks.push(task);
        Ok(())
    }

    /// Construct the OPC UA server, add the configured (or default) tags
    /// and start its event loop.
    fn start_opcua_server(&mut self, bank: &Arc<RegisterBank>) -> Result<()> {
        info!("[Main] Starting OPC UA server...");
        let mut server =
            PlcOpcUaServer::new(&self.config.opcua, &self.config.device, Arc::clone(bank));

        if self.config.tags.is_empty() {
            info!("[Main] No tags defined in configuration, using defaults...");
            for tag in default_tags() {
                server.add_tag(tag);
            }
        } else {
            info!(
                "[Main] Adding {} tags from configuration...",
                self.config.tags.len()
            );
            for tag in self.config.tags.clone() {
                server.add_tag(tag);
            }
        }

        server.start()?;
        self.opcua_server = Some(server);
        Ok(())
    }

    /// Periodic Modbus statistics, once per minute of wall clock. The
    /// short tick keeps shutdown observation under 100 ms.
    fn start_statistics_reporter(&mut self) {
        let running = Arc::clone(&self.running);
        let registry = Arc::clone(&self.connections);
        let task = tokio::spawn(async move {
            let mut ticks = 0u32;
            while running.load(Ordering::SeqCst) {
                time::sleep(REPORTER_TICK).await;
                ticks += 1;
                if ticks >= TICKS_PER_REPORT {
                    ticks = 0;
                    info!(
                        "\n=== Modbus Server Statistics ===\n{}",
                        registry.statistics_table()
                    );
                }
            }
            Ok(())
        });
        self.tasks.push(task);
    }

    /// Signal all tasks to terminate. This only flips the flag; call
    /// [`join`](Self::join) afterwards to wait for completion.
    pub fn shutdown(&self) {
        info!("Shutting down daemon tasks");
        self.running.store(false, Ordering::SeqCst);
    }

    /// Stop the components and wait for every task to finish.
    ///
    /// Shutdown order is the reverse of startup: the OPC UA server is
    /// stopped and joined first, then the scan engine; the Modbus serve
    /// task exits on the cleared flag and is awaited with a timeout. The
    /// final statistics table is emitted before the join.
    pub async fn join(mut self) -> Result<()> {
        if let Some(mut opcua) = self.opcua_server.take() {
            opcua.stop();
        }
        if let Some(mut scan) = self.scan_engine.take() {
            info!("[Main] Stopping scan engine");
            scan.stop();
        }

        info!(
            "\n=== Final Modbus Server Statistics ===\n{}",
            self.connections.statistics_table()
        );

        for task in self.tasks {
            match time::timeout(Duration::from_secs(5), task).await {
                Ok(result) => match result {
                    Ok(Ok(())) => {}
                    Ok(Err(e)) => error!("Task failed: {e:#}"),
                    Err(e) => error!("Task panicked: {e}"),
                },
                Err(_) => {
                    warn!("Task did not complete within timeout period, may be hung");
                }
            }
        }
        Ok(())
    }
}
