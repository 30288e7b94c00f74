// Copyright (c) 2025 Ronan LE MEILLAT, SCTG Development
// This file is part of the simpleplc project and is licensed under the
// SCTG Development Non-Commercial License v1.0 (see LICENSE.md for details).

//! OPC UA front-end
//!
//! Mirrors named tags onto register bank addresses: each tag becomes a
//! variable node whose value is refreshed from the bank every 100 ms and
//! whose writes (for writable kinds) land back in the bank.

pub mod server;
pub mod tags;

pub use server::{PlcOpcUaServer, PUBLISH_INTERVAL_MS};
pub use tags::{TagValue, TagWriteError};
