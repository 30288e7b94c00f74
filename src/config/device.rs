// Copyright (c) 2025 Ronan LE MEILLAT, SCTG Development
// This file is part of the simpleplc project and is licensed under the
// SCTG Development Non-Commercial License v1.0 (see LICENSE.md for details).

//! Device identity and scan program configuration
//!
//! This section seeds the custom Modbus identification responses (Report
//! Slave ID and Read Device Identification), names the OPC UA tag folder,
//! and points at the Lua scan program driven by the scan engine.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// Configuration for the simulated device identity and its scan program.
///
/// Only `slave_id` appears on the wire in regular traffic; the remaining
/// identity fields seed the 0x11 / 0x2B identification responses and the
/// OPC UA display names.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeviceConfig {
    /// Human-readable slave name, reported by Report Slave ID (0x11) and
    /// used for the OPC UA tag folder. Truncated at 240 bytes on the wire.
    pub slave_name: String,

    /// Vendor string reported by Read Device Identification (0x2B/0x0E).
    /// Truncated at 235 bytes on the wire.
    pub device_identification: String,

    /// Modbus unit identifier of the simulated slave.
    pub slave_id: u8,

    /// Run indicator byte of the Report Slave ID response (0x00 = stopped,
    /// 0xFF = running by convention; any value is passed through).
    pub run_indicator: u8,

    /// Path to the Lua scan program loaded by the scan engine.
    pub run_script: PathBuf,

    /// Interval between two invocations of the script's `cycle()` entry
    /// point, in milliseconds.
    pub scan_interval_ms: u64,
}

impl Default for DeviceConfig {
    fn default() -> Self {
        Self {
            slave_name: "SimplePLC".to_string(),
            device_identification: "SimplePLC Modbus Simulator".to_string(),
            slave_id: 1,
            run_indicator: 1,
            run_script: PathBuf::from("active.plc"),
            scan_interval_ms: 1000,
        }
    }
}
