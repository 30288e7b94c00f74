// Copyright (c) 2025 Ronan LE MEILLAT, SCTG Development
// This file is part of the simpleplc project and is licensed under the
// SCTG Development Non-Commercial License v1.0 (see LICENSE.md for details).

//! Modbus TCP slave front-end
//!
//! Serves the register bank to Modbus masters: standard reads and writes
//! (FC 0x01–0x06, 0x0F, 0x10), the custom Report Slave ID (0x11) and Read
//! Device Identification (0x2B/0x0E) responses, per-connection statistics
//! and the accept-side connection limit.

pub mod connection;
pub mod identity;
pub mod server;
pub mod service;

pub use connection::{ConnectionHandle, ConnectionRegistry};
pub use identity::DeviceIdentity;
pub use service::PlcModbusService;
