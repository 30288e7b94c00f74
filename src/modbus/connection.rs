// Copyright (c) 2025 Ronan LE MEILLAT, SCTG Development
// This file is part of the simpleplc project and is licensed under the
// SCTG Development Non-Commercial License v1.0 (see LICENSE.md for details).

//! Client connection tracking and statistics
//!
//! The Modbus front-end keeps a small registry of accepted clients: when
//! each connected, when it was last heard from and how many requests it
//! issued, plus running totals. A [`ConnectionHandle`] is handed to the
//! per-client service and unregisters itself when the service (and with it
//! the connection) is dropped, so the active table never leaks closed
//! sockets.

use std::collections::HashMap;
use std::fmt::Write as _;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Instant;

use chrono::{DateTime, Local};
use log::info;
use parking_lot::Mutex;

/// Per-connection bookkeeping.
#[derive(Debug)]
pub struct ConnectionStats {
    peer: SocketAddr,
    created_at: DateTime<Local>,
    created_instant: Instant,
    last_activity: Mutex<Instant>,
    requests: AtomicU64,
}

impl ConnectionStats {
    fn new(peer: SocketAddr) -> Self {
        let now = Instant::now();
        Self {
            peer,
            created_at: Local::now(),
            created_instant: now,
            last_activity: Mutex::new(now),
            requests: AtomicU64::new(0),
        }
    }

    pub fn peer(&self) -> SocketAddr {
        self.peer
    }

    pub fn created_at(&self) -> DateTime<Local> {
        self.created_at
    }

    pub fn request_count(&self) -> u64 {
        self.requests.load(Ordering::Relaxed)
    }

    fn note_request(&self) {
        *self.last_activity.lock() = Instant::now();
        self.requests.fetch_add(1, Ordering::Relaxed);
    }
}

/// Registry shared by the accept loop, the per-client services and the
/// statistics reporter.
#[derive(Debug)]
pub struct ConnectionRegistry {
    started_at: Instant,
    total_connections: AtomicU64,
    total_requests: AtomicU64,
    active: Mutex<HashMap<SocketAddr, Arc<ConnectionStats>>>,
}

impl ConnectionRegistry {
    pub fn new() -> Self {
        Self {
            started_at: Instant::now(),
            total_connections: AtomicU64::new(0),
            total_requests: AtomicU64::new(0),
            active: Mutex::new(HashMap::new()),
        }
    }

    /// Number of currently connected clients.
    pub fn active_connections(&self) -> usize {
        self.active.lock().len()
    }

    pub fn total_connections(&self) -> u64 {
        self.total_connections.load(Ordering::Relaxed)
    }

    pub fn total_requests(&self) -> u64 {
        self.total_requests.load(Ordering::Relaxed)
    }

    /// Track a newly accepted client. The returned handle unregisters the
    /// connection when dropped.
    pub fn register(self: &Arc<Self>, peer: SocketAddr) -> ConnectionHandle {
        let stats = Arc::new(ConnectionStats::new(peer));
        self.active.lock().insert(peer, Arc::clone(&stats));
        self.total_connections.fetch_add(1, Ordering::Relaxed);
        ConnectionHandle {
            registry: Arc::clone(self),
            stats,
        }
    }

    /// Formatted statistics table, emitted once per minute and on
    /// shutdown.
    pub fn statistics_table(&self) -> String {
        let active = self.active.lock();
        let mut out = String::new();
        let _ = writeln!(out, "Server Statistics:");
        let _ = writeln!(out, "  Uptime: {} seconds", self.started_at.elapsed().as_secs());
        let _ = writeln!(out, "  Total connections: {}", self.total_connections());
        let _ = writeln!(out, "  Active connections: {}", active.len());
        let _ = writeln!(out, "  Total requests: {}", self.total_requests());

        if !active.is_empty() {
            let _ = writeln!(out);
            let _ = writeln!(out, "Active Connections:");
            let _ = writeln!(out, "  Peer                  | Connected at        | Duration (s) | Requests");
            let _ = writeln!(out, "  ----------------------+---------------------+--------------+---------");
            for stats in active.values() {
                let _ = writeln!(
                    out,
                    "  {:<21} | {} | {:>12} | {:>8}",
                    stats.peer(),
                    stats.created_at().format("%Y-%m-%d %H:%M:%S"),
                    stats.created_instant.elapsed().as_secs(),
                    stats.request_count(),
                );
            }
        }
        out
    }

    fn unregister(&self, peer: SocketAddr) {
        if self.active.lock().remove(&peer).is_some() {
            info!("[Modbus] Connection closed from {peer}");
        }
    }
}

impl Default for ConnectionRegistry {
    fn default() -> Self {
        Self::new()
    }
}

/// Handle owned by one client's service instance.
pub struct ConnectionHandle {
    registry: Arc<ConnectionRegistry>,
    stats: Arc<ConnectionStats>,
}

impl ConnectionHandle {
    /// Record one received request on the connection and on the totals.
    pub fn note_request(&self) {
        self.stats.note_request();
        self.registry.total_requests.fetch_add(1, Ordering::Relaxed);
    }
}

impl Drop for ConnectionHandle {
    fn drop(&mut self) {
        self.registry.unregister(self.stats.peer());
    }
}
