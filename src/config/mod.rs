// Copyright (c) 2025 Ronan LE MEILLAT, SCTG Development
// This file is part of the simpleplc project and is licensed under the
// SCTG Development Non-Commercial License v1.0 (see LICENSE.md for details).

//! Configuration management for the soft-PLC simulator
//!
//! The configuration is backed by a small INI file (default
//! `settings.ini`) with four recognized sections:
//!
//! - `[Device]`: identity of the simulated slave and its scan program
//! - `[ModbusServer]`: Modbus TCP binding, connection limit, mapping size
//! - `[OPCUA]`: OPC UA binding and application description
//! - `[Tags]`: free-form `name,address,type` lines mapping OPC UA nodes
//!   onto register addresses
//!
//! Loading is deliberately forgiving: a missing file or an unparseable
//! numeric field is logged and the built-in default is retained, so the
//! simulator always comes up. The parsed value is immutable afterwards —
//! the orchestrator constructs it once and passes it by reference to the
//! components that need it.
//!
//! ## Usage
//!
//! ```no_run
//! use simpleplc::config::Config;
//! use std::path::Path;
//!
//! let config = Config::from_file(Path::new("settings.ini"));
//! println!("Modbus port: {}", config.modbus.port);
//! ```

pub mod device;
pub mod ini;
pub mod modbus;
pub mod opcua;
pub mod tags;

use std::fmt::Display;
use std::path::Path;
use std::str::FromStr;

use log::{error, info, warn};
use serde::{Deserialize, Serialize};

// Re-export all types for public API
pub use device::DeviceConfig;
pub use ini::IniDocument;
pub use modbus::ModbusServerConfig;
pub use opcua::OpcUaConfig;
pub use tags::{default_tags, TagConfig, TagKind};

/// Root configuration structure for the simulator.
///
/// Every section falls back to its `Default` when absent from the file,
/// allowing a minimal (or missing) configuration to run with the standard
/// settings.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Identity of the simulated device and its scan program.
    pub device: DeviceConfig,

    /// Modbus TCP slave settings.
    pub modbus: ModbusServerConfig,

    /// OPC UA server settings.
    pub opcua: OpcUaConfig,

    /// Configured tags. May be empty; the orchestrator seeds the built-in
    /// defaults in that case.
    pub tags: Vec<TagConfig>,
}

impl Config {
    /// Load the configuration from `path`.
    ///
    /// A missing or unreadable file is a configuration error, not a fatal
    /// one: it is logged and the defaults are returned, matching the
    /// behavior of the original settings loader.
    pub fn from_file(path: &Path) -> Self {
        match std::fs::read_to_string(path) {
            Ok(text) => {
                info!("[Config] Using configuration from: {}", path.display());
                Self::from_ini_str(&text)
            }
            Err(err) => {
                warn!(
                    "[Config] Could not open {}: {err}. Using defaults.",
                    path.display()
                );
                Self::default()
            }
        }
    }

    /// Parse a configuration from INI text. Unrecognized sections and keys
    /// are ignored; unparseable numeric fields keep their defaults.
    pub fn from_ini_str(text: &str) -> Self {
        let doc = IniDocument::parse(text);
        let mut config = Self::default();

        if let Some(section) = doc.section("Device") {
            if let Some(value) = section.get("slave_name") {
                config.device.slave_name = value.to_string();
            }
            if let Some(value) = section.get("device_identification") {
                config.device.device_identification = value.to_string();
            }
            if let Some(value) = section.get("run_script") {
                config.device.run_script = value.into();
            }
            parse_field(section.get("slave_id"), "Device.slave_id", &mut config.device.slave_id);
            parse_field(
                section.get("run_indicator"),
                "Device.run_indicator",
                &mut config.device.run_indicator,
            );
            parse_field(
                section.get("scan_interval_ms"),
                "Device.scan_interval_ms",
                &mut config.device.scan_interval_ms,
            );
        }

        if let Some(section) = doc.section("ModbusServer") {
            if let Some(value) = section.get("listen") {
                config.modbus.listen = value.to_string();
            }
            parse_field(section.get("port"), "ModbusServer.port", &mut config.modbus.port);
            parse_field(
                section.get("max_connections"),
                "ModbusServer.max_connections",
                &mut config.modbus.max_connections,
            );
            parse_field(
                section.get("mapping_size"),
                "ModbusServer.mapping_size",
                &mut config.modbus.mapping_size,
            );
        }

        if let Some(section) = doc.section("OPCUA") {
            if let Some(value) = section.get("listen") {
                config.opcua.listen = value.to_string();
            }
            if let Some(value) = section.get("server_name") {
                config.opcua.server_name = value.to_string();
            }
            if let Some(value) = section.get("application_uri") {
                config.opcua.application_uri = value.to_string();
            }
            parse_field(section.get("port"), "OPCUA.port", &mut config.opcua.port);
        }

        if let Some(section) = doc.section("Tags") {
            for line in section.raw_lines() {
                if let Some(tag) = TagConfig::from_line(line) {
                    if config.tags.iter().any(|t| t.name == tag.name) {
                        warn!("[Config] Duplicate tag name ignored: {}", tag.name);
                        continue;
                    }
                    config.tags.push(tag);
                }
            }
        }

        config
    }
}

/// Overwrite `target` with the parsed `value` when present and valid; log
/// and keep the current value otherwise.
fn parse_field<T>(value: Option<&str>, field: &str, target: &mut T)
where
    T: FromStr + Display,
{
    let Some(value) = value else { return };
    match value.parse::<T>() {
        Ok(parsed) => *target = parsed,
        Err(_) => error!("[Config] Invalid value for {field}: {value:?} (keeping {target})"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_the_documented_settings() {
        let config = Config::default();
        assert_eq!(config.modbus.listen, "0.0.0.0");
        assert_eq!(config.modbus.port, 502);
        assert_eq!(config.modbus.max_connections, 5);
        assert_eq!(config.modbus.mapping_size, 255);
        assert_eq!(config.opcua.port, 4840);
        assert_eq!(config.device.scan_interval_ms, 1000);
        assert_eq!(config.device.run_script, std::path::PathBuf::from("active.plc"));
        assert!(config.tags.is_empty());
    }

    #[test]
    fn parses_a_complete_file() {
        let config = Config::from_ini_str(
            "[Device]\n\
             slave_name = SimplePLC\n\
             device_identification = ACME SimplePLC v2\n\
             slave_id = 17\n\
             run_indicator = 255\n\
             run_script = logic/main.plc\n\
             scan_interval_ms = 100\n\
             \n\
             [ModbusServer]\n\
             listen = 127.0.0.1\n\
             port = 1502\n\
             max_connections = 8\n\
             mapping_size = 1000\n\
             \n\
             [OPCUA]\n\
             listen = 127.0.0.1\n\
             port = 14840\n\
             server_name = Test Server\n\
             application_uri = urn:test:server\n\
             \n\
             [Tags]\n\
             Conveyor1_Running,0,0\n\
             Temperature1,5,3\n",
        );
        assert_eq!(config.device.slave_id, 17);
        assert_eq!(config.device.run_indicator, 255);
        assert_eq!(config.device.scan_interval_ms, 100);
        assert_eq!(config.modbus.port, 1502);
        assert_eq!(config.modbus.max_connections, 8);
        assert_eq!(config.modbus.mapping_size, 1000);
        assert_eq!(config.opcua.endpoint_url(), "opc.tcp://127.0.0.1:14840");
        assert_eq!(config.tags.len(), 2);
        assert_eq!(config.tags[1].kind, TagKind::InputRegister);
        assert_eq!(config.tags[1].address, 5);
    }

    #[test]
    fn invalid_numeric_fields_keep_defaults() {
        let config = Config::from_ini_str(
            "[ModbusServer]\n\
             port = not_a_port\n\
             mapping_size = 300\n",
        );
        assert_eq!(config.modbus.port, 502);
        assert_eq!(config.modbus.mapping_size, 300);
    }

    #[test]
    fn duplicate_tag_names_are_dropped() {
        let config = Config::from_ini_str(
            "[Tags]\n\
             Pump,0,0\n\
             Pump,1,2\n",
        );
        assert_eq!(config.tags.len(), 1);
        assert_eq!(config.tags[0].kind, TagKind::Coil);
    }

    #[test]
    fn missing_file_falls_back_to_defaults() {
        let config = Config::from_file(std::path::Path::new("/nonexistent/settings.ini"));
        assert_eq!(config.modbus.port, 502);
    }
}
