// Copyright (c) 2025 Ronan LE MEILLAT, SCTG Development
// This file is part of the simpleplc project and is licensed under the
// SCTG Development Non-Commercial License v1.0 (see LICENSE.md for details).

//! Modbus TCP listener and accept loop
//!
//! Binds the configured endpoint and serves accepted clients with one
//! [`PlcModbusService`](super::service::PlcModbusService) each. The accept
//! path enforces the connection limit and applies the socket options the
//! simulator relies on for responsive masters: Nagle off, immediate close
//! on linger, keepalive probing for dead peers.

use std::io;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use log::{error, info, warn};
use tokio::net::{TcpListener, TcpStream};
use tokio::time;
use tokio_modbus::server::tcp::{accept_tcp_connection, Server};

use crate::bank::RegisterBank;
use crate::config::ModbusServerConfig;

use super::connection::ConnectionRegistry;
use super::identity::DeviceIdentity;
use super::service::PlcModbusService;

/// Bind the listener. A failure here is a bring-up failure: the caller
/// aborts startup and the process exits with a non-zero code.
pub async fn bind(config: &ModbusServerConfig) -> Result<TcpListener> {
    let addr: SocketAddr = format!("{}:{}", config.listen, config.port)
        .parse()
        .with_context(|| format!("invalid Modbus listen address {}:{}", config.listen, config.port))?;
    let listener = TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind Modbus listener on {addr}"))?;
    info!(
        "[Modbus] Server listening on {}:{} (max connections: {})",
        config.listen, config.port, config.max_connections
    );
    Ok(listener)
}

/// Serve Modbus clients until `running` is cleared.
///
/// Accepted connections beyond `max_connections` are rejected before a
/// service is attached. The serve task is aborted once the running flag
/// drops; a 5 second grace period bounds the wait for it to wind down.
pub async fn serve(
    listener: TcpListener,
    bank: Arc<RegisterBank>,
    identity: Arc<DeviceIdentity>,
    registry: Arc<ConnectionRegistry>,
    max_connections: usize,
    running: Arc<AtomicBool>,
) -> Result<()> {
    let server = Server::new(listener);

    let accept_registry = Arc::clone(&registry);
    let on_connected = move |stream: TcpStream, socket_addr: SocketAddr| {
        let bank = Arc::clone(&bank);
        let identity = Arc::clone(&identity);
        let registry = Arc::clone(&accept_registry);

        async move {
            if registry.active_connections() >= max_connections {
                warn!(
                    "[Modbus] Rejecting connection from {socket_addr}: limit of {max_connections} reached"
                );
                return Ok(None);
            }
            if let Err(err) = configure_client_socket(&stream) {
                error!("[Modbus] Failed to configure client socket for {socket_addr}: {err}");
                return Ok(None);
            }

            info!("[Modbus] New client connection accepted from {socket_addr}");
            let accepted = accept_tcp_connection(stream, socket_addr, move |peer| {
                Ok(Some(PlcModbusService::new(
                    Arc::clone(&bank),
                    Arc::clone(&identity),
                    registry.register(peer),
                )))
            });
            accepted
        }
    };

    let on_process_error = |err| {
        error!("[Modbus] Connection error: {err}");
    };

    // Run the accept loop in its own task so this one can watch the
    // shutdown flag.
    let server_handle = tokio::spawn(async move {
        if let Err(e) = server.serve(&on_connected, on_process_error).await {
            error!("[Modbus] Server error: {e}");
        }
    });

    while running.load(Ordering::SeqCst) {
        time::sleep(Duration::from_millis(100)).await;
    }

    info!("[Modbus] Shutting down Modbus server...");
    server_handle.abort();
    match time::timeout(Duration::from_secs(5), server_handle).await {
        Ok(_) => info!("[Modbus] Server shut down"),
        Err(_) => warn!("[Modbus] Server shutdown timed out, forcing termination"),
    }

    Ok(())
}

/// Socket options applied to every accepted client: disable Nagle for
/// request/reply latency, linger(0) so closes are immediate, keepalive to
/// reap dead masters.
fn configure_client_socket(stream: &TcpStream) -> io::Result<()> {
    stream.set_nodelay(true)?;
    stream.set_linger(Some(Duration::from_secs(0)))?;
    let sock = socket2::SockRef::from(stream);
    sock.set_keepalive(true)?;
    Ok(())
}
