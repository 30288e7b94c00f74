// Copyright (c) 2025 Ronan LE MEILLAT, SCTG Development
// This file is part of the simpleplc project and is licensed under the
// SCTG Development Non-Commercial License v1.0 (see LICENSE.md for details).

//! OPC UA server configuration

use serde::{Deserialize, Serialize};

/// Configuration for the OPC UA front-end.
///
/// The server publishes the configured tags as variable nodes and accepts
/// anonymous sessions only; no security policy is negotiated.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OpcUaConfig {
    /// The network address the server binds to.
    pub listen: String,

    /// The TCP port the server listens on. Default is 4840, the standard
    /// OPC UA binary port.
    pub port: u16,

    /// Application name advertised in the server's application description.
    pub server_name: String,

    /// Application URI advertised in the server's application description.
    pub application_uri: String,
}

impl OpcUaConfig {
    /// Endpoint URL used for logging, `opc.tcp://<listen>:<port>`.
    pub fn endpoint_url(&self) -> String {
        format!("opc.tcp://{}:{}", self.listen, self.port)
    }
}

impl Default for OpcUaConfig {
    fn default() -> Self {
        Self {
            listen: "0.0.0.0".to_string(),
            port: 4840,
            server_name: "SimplePLC OPC UA Server".to_string(),
            application_uri: "urn:simpleplc:server".to_string(),
        }
    }
}
