// Copyright (c) 2025 Ronan LE MEILLAT, SCTG Development
// This file is part of the simpleplc project and is licensed under the
// SCTG Development Non-Commercial License v1.0 (see LICENSE.md for details).

//! SimplePLC — a soft-PLC simulator
//!
//! The simulator owns a bank of industrial I/O registers (coils, discrete
//! inputs, holding registers, input registers) and exposes it concurrently
//! through a Modbus TCP slave and an OPC UA server, while a user-supplied
//! Lua scan program mutates the registers on a fixed cadence.
//!
//! ## Components
//!
//! * [`bank`] — the shared register bank and its locking discipline
//! * [`scan`] — the Lua scan engine with terminal hot-reload
//! * [`modbus`] — the Modbus TCP slave front-end
//! * [`opc_ua`] — the OPC UA front-end mirroring tagged addresses
//! * [`daemon`] — the orchestrator wiring everything together
//! * [`config`] — the INI-backed configuration

pub mod bank;
pub mod config;
pub mod daemon;
pub mod modbus;
pub mod opc_ua;
pub mod scan;
