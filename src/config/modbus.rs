// Copyright (c) 2025 Ronan LE MEILLAT, SCTG Development
// This file is part of the simpleplc project and is licensed under the
// SCTG Development Non-Commercial License v1.0 (see LICENSE.md for details).

//! Modbus TCP slave configuration
//!
//! This module defines the structure for configuring the Modbus TCP
//! front-end of the simulator, including network binding parameters, the
//! connection limit and the register mapping size.

use serde::{Deserialize, Serialize};

/// Configuration for the Modbus TCP slave.
///
/// # Example
///
/// ```
/// use simpleplc::config::ModbusServerConfig;
///
/// let modbus_config = ModbusServerConfig {
///     listen: "127.0.0.1".to_string(),
///     port: 1502,
///     ..ModbusServerConfig::default()
/// };
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModbusServerConfig {
    /// The network address the slave binds to.
    ///
    /// Default is `0.0.0.0` (all IPv4 interfaces).
    pub listen: String,

    /// The TCP port the slave listens on.
    ///
    /// Default is 502, the standard Modbus TCP port (requires elevated
    /// privileges on most systems).
    pub port: u16,

    /// Maximum number of simultaneously connected clients. Further
    /// connection attempts are accepted and immediately closed.
    pub max_connections: usize,

    /// Number of elements in each of the four register spaces. Applies
    /// uniformly to coils, discrete inputs, holding and input registers.
    pub mapping_size: u16,
}

impl Default for ModbusServerConfig {
    fn default() -> Self {
        Self {
            listen: "0.0.0.0".to_string(),
            port: 502,
            max_connections: 5,
            mapping_size: 255,
        }
    }
}
