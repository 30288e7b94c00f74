// Copyright (c) 2025 Ronan LE MEILLAT, SCTG Development
// This file is part of the simpleplc project and is licensed under the
// SCTG Development Non-Commercial License v1.0 (see LICENSE.md for details).

//! Scan engine: cyclic execution of the Lua scan program
//!
//! A dedicated OS thread owns the embedded Lua interpreter and invokes
//! the program's global `cycle()` every scan interval (default 1000 ms,
//! `[Device] scan_interval_ms`). The sequence per tick:
//!
//! 1. Service a pending SPACE keypress by reloading the program — the new
//!    interpreter is fully constructed before it replaces the old one, so
//!    a broken file keeps the previous logic running.
//! 2. Take the bank lock with the one second ceiling as a liveness gate;
//!    on timeout the cycle is skipped and logged.
//! 3. Release the lock, then invoke `cycle()`. The script reaches the
//!    registers exclusively through the `modbus.*` accessors, each of
//!    which takes the lock itself; running the script outside the lock
//!    keeps long cycles from starving the protocol front-ends.
//! 4. A script error is logged with its traceback and the loop continues;
//!    a missing `cycle` terminates the loop.
//!
//! The interpreter never leaves this thread, including across reloads.
//! A missing program file refuses to start the engine; the orchestrator
//! treats that as a bring-up failure.

pub mod bindings;
pub mod script;
pub mod terminal;

use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use anyhow::{bail, Context, Result};
use log::{error, info, warn};

use crate::bank::{RegisterBank, LOCK_TIMEOUT};
use crate::config::DeviceConfig;

use script::{CycleOutcome, ScriptHost};
use terminal::TerminalGuard;

/// Handle to the running scan thread.
pub struct ScanEngine {
    thread: Option<thread::JoinHandle<()>>,
    running: Arc<AtomicBool>,
    reload: Arc<AtomicBool>,
}

impl ScanEngine {
    /// Spawn the scan thread for the configured program.
    ///
    /// ### Errors
    ///
    /// Fails when the program file does not exist — a simulator without
    /// its logic is considered misconfigured — or when the thread cannot
    /// be spawned.
    pub fn start(bank: Arc<RegisterBank>, device: &DeviceConfig) -> Result<Self> {
        let script_path = device.run_script.clone();
        if !script_path.is_file() {
            bail!("scan program not found: {}", script_path.display());
        }
        let interval = Duration::from_millis(device.scan_interval_ms.max(1));

        let running = Arc::new(AtomicBool::new(true));
        let reload = Arc::new(AtomicBool::new(false));
        let running_flag = Arc::clone(&running);
        let reload_flag = Arc::clone(&reload);
        let thread = thread::Builder::new()
            .name("scan-engine".to_string())
            .spawn(move || scan_loop(bank, script_path, interval, running_flag, reload_flag))
            .context("failed to spawn the scan thread")?;

        Ok(Self {
            thread: Some(thread),
            running,
            reload,
        })
    }

    /// Request a reload of the program file at the next tick boundary —
    /// the same path the SPACE keypress takes.
    pub fn reload(&self) {
        self.reload.store(true, Ordering::SeqCst);
    }

    /// Signal the loop and join the thread. Idempotent.
    pub fn stop(&mut self) {
        self.running.store(false, Ordering::SeqCst);
        if let Some(thread) = self.thread.take() {
            if thread.join().is_err() {
                error!("[PLC] Scan thread panicked");
            }
        }
    }
}

impl Drop for ScanEngine {
    fn drop(&mut self) {
        self.stop();
    }
}

fn scan_loop(
    bank: Arc<RegisterBank>,
    script_path: PathBuf,
    interval: Duration,
    running: Arc<AtomicBool>,
    reload: Arc<AtomicBool>,
) {
    info!("[PLC] Scan thread starting (interval {interval:?})");
    // Restored on every exit path, including panics unwinding the loop.
    let terminal = TerminalGuard::new();

    let mut host = match ScriptHost::load(&bank, &script_path) {
        Ok(host) => {
            info!("[PLC] Loaded scan program {}", script_path.display());
            host
        }
        Err(err) => {
            error!("[PLC] Failed to load scan program: {err:#}");
            return;
        }
    };

    let mut next_tick = Instant::now() + interval;
    while running.load(Ordering::SeqCst) {
        if terminal.reload_requested() || reload.swap(false, Ordering::SeqCst) {
            info!("[PLC] Reloading scan program {}", script_path.display());
            match ScriptHost::load(&bank, &script_path) {
                Ok(new_host) => {
                    host = new_host;
                    info!("[PLC] Scan program reloaded");
                }
                Err(err) => {
                    error!("[PLC] Reload failed, keeping previous program: {err:#}");
                }
            }
        }

        // Liveness gate: a wedged front-end must not hang the cycle. The
        // guard is released before cycle() runs; the accessors lock on
        // their own.
        match bank.try_lock_for(LOCK_TIMEOUT) {
            Some(guard) => drop(guard),
            None => {
                warn!("[PLC] Bank lock not acquired within {LOCK_TIMEOUT:?}, skipping cycle");
                sleep_until_next_tick(&running, &mut next_tick, interval);
                continue;
            }
        }

        match host.run_cycle() {
            CycleOutcome::Completed => {}
            CycleOutcome::MissingEntryPoint => {
                error!("[PLC] cycle() not found in scan program, stopping scan loop");
                break;
            }
            CycleOutcome::Failed(err) => {
                error!("[PLC] Scan cycle error: {err}");
            }
        }

        sleep_until_next_tick(&running, &mut next_tick, interval);
    }

    drop(terminal);
    info!("[PLC] Scan thread stopped");
}

/// Monotonic sleep to the next tick boundary in slices of at most 100 ms
/// so a stop request is observed promptly. A tick that overran schedules
/// the next one relative to now instead of accumulating debt.
fn sleep_until_next_tick(running: &AtomicBool, next_tick: &mut Instant, interval: Duration) {
    loop {
        if !running.load(Ordering::SeqCst) {
            return;
        }
        let now = Instant::now();
        if now >= *next_tick {
            *next_tick += interval;
            if *next_tick <= now {
                *next_tick = now + interval;
            }
            return;
        }
        let remaining = *next_tick - now;
        thread::sleep(remaining.min(Duration::from_millis(100)));
    }
}
