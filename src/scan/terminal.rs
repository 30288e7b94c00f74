// Copyright (c) 2025 Ronan LE MEILLAT, SCTG Development
// This file is part of the simpleplc project and is licensed under the
// SCTG Development Non-Commercial License v1.0 (see LICENSE.md for details).

//! Raw-mode terminal handling for the hot-reload keypress
//!
//! While the scan thread runs, stdin is switched to non-canonical, no-echo
//! mode so a single SPACE triggers a script reload without a newline. The
//! guard restores the terminal on drop, which covers every exit path of
//! the scan loop. On a non-interactive stdin raw mode is unavailable; the
//! guard degrades to a no-op and the engine simply runs without the
//! reload key.

use std::time::Duration;

use crossterm::event::{self, Event, KeyCode, KeyEventKind};
use crossterm::terminal::{disable_raw_mode, enable_raw_mode};
use log::{debug, warn};

/// Scoped raw-mode acquisition bound to the scan thread's lifetime.
pub struct TerminalGuard {
    raw: bool,
}

impl TerminalGuard {
    pub fn new() -> Self {
        match enable_raw_mode() {
            Ok(()) => {
                debug!("[PLC] Terminal in raw mode; press SPACE to reload the scan program");
                Self { raw: true }
            }
            Err(err) => {
                warn!("[PLC] Raw terminal mode unavailable ({err}); hot reload disabled");
                Self { raw: false }
            }
        }
    }

    /// Drain pending keystrokes; true when a SPACE was seen.
    pub fn reload_requested(&self) -> bool {
        if !self.raw {
            return false;
        }
        let mut requested = false;
        while event::poll(Duration::from_millis(0)).unwrap_or(false) {
            match event::read() {
                Ok(Event::Key(key))
                    if key.code == KeyCode::Char(' ') && key.kind != KeyEventKind::Release =>
                {
                    requested = true;
                }
                Ok(_) => {}
                Err(err) => {
                    warn!("[PLC] Terminal read error: {err}");
                    break;
                }
            }
        }
        requested
    }
}

impl Default for TerminalGuard {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for TerminalGuard {
    fn drop(&mut self) {
        if self.raw {
            if let Err(err) = disable_raw_mode() {
                warn!("[PLC] Failed to restore terminal mode: {err}");
            }
        }
    }
}
