// Copyright (c) 2025 Ronan LE MEILLAT, SCTG Development
// This file is part of the simpleplc project and is licensed under the
// SCTG Development Non-Commercial License v1.0 (see LICENSE.md for details).

//! Integration tests for the Modbus TCP slave
//!
//! These tests bind a real listener on an ephemeral port, run the serve
//! loop and talk to it with the `tokio-modbus` client (and, for the
//! custom identification frame, a raw TCP socket so the reply can be
//! checked byte for byte).

use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::time::{sleep, timeout};
use tokio_modbus::client::{tcp::connect, Reader, Writer};
use tokio_modbus::prelude::*;

use simpleplc::bank::{BitSpace, RegisterBank, WordSpace};
use simpleplc::config::ModbusServerConfig;
use simpleplc::modbus::{self, ConnectionRegistry, DeviceIdentity};

struct TestServer {
    addr: SocketAddr,
    bank: Arc<RegisterBank>,
    registry: Arc<ConnectionRegistry>,
    running: Arc<AtomicBool>,
}

impl Drop for TestServer {
    fn drop(&mut self) {
        self.running.store(false, Ordering::SeqCst);
    }
}

async fn start_test_server(mapping_size: u16, max_connections: usize) -> Result<TestServer> {
    let _ = env_logger::builder().is_test(true).try_init();

    let config = ModbusServerConfig {
        listen: "127.0.0.1".to_string(),
        port: 0,
        max_connections,
        mapping_size,
    };
    let listener = modbus::server::bind(&config).await?;
    let addr = listener.local_addr()?;

    let bank = Arc::new(RegisterBank::new(mapping_size));
    let identity = Arc::new(DeviceIdentity {
        slave_name: "SimplePLC".to_string(),
        device_id_string: "SimplePLC Modbus Simulator".to_string(),
        slave_id: 1,
        run_indicator: 1,
    });
    let registry = Arc::new(ConnectionRegistry::new());
    let running = Arc::new(AtomicBool::new(true));

    tokio::spawn(modbus::server::serve(
        listener,
        Arc::clone(&bank),
        identity,
        Arc::clone(&registry),
        max_connections,
        Arc::clone(&running),
    ));

    Ok(TestServer {
        addr,
        bank,
        registry,
        running,
    })
}

#[tokio::test]
async fn holding_register_write_is_read_back_over_tcp() -> Result<()> {
    let server = start_test_server(255, 5).await?;
    let mut ctx = connect(server.addr).await?;

    let written = ctx.write_single_register(0, 42).await?;
    assert!(written.is_ok());

    let values = ctx.read_holding_registers(0, 1).await?;
    assert_eq!(values.unwrap(), vec![42]);

    // The write also reached the shared bank.
    assert_eq!(
        server.bank.lock().read_word(WordSpace::Holding, 0).unwrap(),
        42
    );
    Ok(())
}

#[tokio::test]
async fn coil_writes_round_trip_and_discrete_inputs_stay_untouched() -> Result<()> {
    let server = start_test_server(255, 5).await?;
    let mut ctx = connect(server.addr).await?;

    ctx.write_single_coil(0, true).await?.unwrap();
    let coils = ctx.read_coils(0, 1).await?.unwrap();
    assert_eq!(coils, vec![true]);

    let inputs = ctx.read_discrete_inputs(0, 1).await?.unwrap();
    assert_eq!(inputs, vec![false]);
    Ok(())
}

#[tokio::test]
async fn overrange_write_returns_illegal_data_address() -> Result<()> {
    // mapping_size 255: address 0x0100 must be rejected with exception
    // code 0x02 (the client surfaces it as IllegalDataAddress).
    let server = start_test_server(255, 5).await?;
    let mut ctx = connect(server.addr).await?;

    let result = ctx.write_single_register(0x0100, 1).await?;
    assert_eq!(result.unwrap_err(), ExceptionCode::IllegalDataAddress);

    let result = ctx.read_holding_registers(0x00FF, 2).await?;
    assert_eq!(result.unwrap_err(), ExceptionCode::IllegalDataAddress);
    Ok(())
}

#[tokio::test]
async fn report_slave_id_frame_matches_the_documented_layout() -> Result<()> {
    let server = start_test_server(255, 5).await?;
    let mut stream = TcpStream::connect(server.addr).await?;

    // Report Slave ID request: MBAP (TID 1, PID 0, LEN 2, unit 1) + 0x11.
    stream
        .write_all(&[0x00, 0x01, 0x00, 0x00, 0x00, 0x02, 0x01, 0x11])
        .await?;

    // "SimplePLC" is 9 bytes, so LEN = 0x000E and the ADU is 20 bytes.
    let mut frame = [0u8; 20];
    timeout(Duration::from_secs(2), stream.read_exact(&mut frame)).await??;

    assert_eq!(&frame[0..4], &[0x00, 0x01, 0x00, 0x00]);
    assert_eq!(&frame[4..6], &[0x00, 0x0E]);
    assert_eq!(frame[6], 0x01);
    assert_eq!(frame[7], 0x11);
    assert_eq!(frame[8], 0x0B);
    assert_eq!(
        &frame[9..20],
        &[0x01, 0x01, 0x53, 0x69, 0x6d, 0x70, 0x6c, 0x65, 0x50, 0x4c, 0x43]
    );
    Ok(())
}

#[tokio::test]
async fn read_device_identification_frame_carries_the_vendor_string() -> Result<()> {
    let server = start_test_server(255, 5).await?;
    let mut stream = TcpStream::connect(server.addr).await?;

    // 0x2B request with MEI type 0x0E, ReadDevId basic, object 0.
    stream
        .write_all(&[0x00, 0x02, 0x00, 0x00, 0x00, 0x05, 0x01, 0x2B, 0x0E, 0x01, 0x00])
        .await?;

    let vendor = b"SimplePLC Modbus Simulator";
    let adu_len = 6 + 2 + 8 + vendor.len();
    let mut frame = vec![0u8; adu_len];
    timeout(Duration::from_secs(2), stream.read_exact(&mut frame)).await??;

    assert_eq!(frame[7], 0x2B);
    assert_eq!(
        &frame[8..15],
        &[0x0E, 0x01, 0x01, 0x00, 0x00, 0x01, 0x00]
    );
    assert_eq!(frame[15] as usize, vendor.len());
    assert_eq!(&frame[16..], vendor);
    Ok(())
}

#[tokio::test]
async fn connection_limit_closes_excess_clients() -> Result<()> {
    let server = start_test_server(255, 2).await?;

    let _first = TcpStream::connect(server.addr).await?;
    let _second = TcpStream::connect(server.addr).await?;
    // Let the accept loop register both before the third arrives.
    sleep(Duration::from_millis(200)).await;
    assert_eq!(server.registry.active_connections(), 2);

    let mut third = TcpStream::connect(server.addr).await?;
    let mut buf = [0u8; 1];
    let n = timeout(Duration::from_secs(2), third.read(&mut buf)).await??;
    assert_eq!(n, 0, "excess connection should be closed without data");
    assert_eq!(server.registry.active_connections(), 2);
    Ok(())
}

#[tokio::test]
async fn statistics_track_connections_and_requests() -> Result<()> {
    let server = start_test_server(255, 5).await?;
    let mut ctx = connect(server.addr).await?;
    ctx.read_coils(0, 1).await?.unwrap();
    ctx.read_coils(0, 1).await?.unwrap();

    sleep(Duration::from_millis(100)).await;
    assert_eq!(server.registry.total_connections(), 1);
    assert_eq!(server.registry.total_requests(), 2);

    let table = server.registry.statistics_table();
    assert!(table.contains("Total connections: 1"));
    assert!(table.contains("Total requests: 2"));
    Ok(())
}

#[tokio::test]
async fn shutdown_stops_serving_within_the_grace_period() -> Result<()> {
    let server = start_test_server(255, 5).await?;
    let mut ctx = connect(server.addr).await?;
    ctx.write_single_coil(0, true).await?.unwrap();
    assert!(server.bank.lock().read_bit(BitSpace::Coil, 0).unwrap());

    server.running.store(false, Ordering::SeqCst);
    sleep(Duration::from_millis(300)).await;

    // New connections are refused once the serve loop is gone.
    assert!(TcpStream::connect(server.addr).await.is_err());
    Ok(())
}
