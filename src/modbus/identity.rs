// Copyright (c) 2025 Ronan LE MEILLAT, SCTG Development
// This file is part of the simpleplc project and is licensed under the
// SCTG Development Non-Commercial License v1.0 (see LICENSE.md for details).

//! Custom Modbus identification responses
//!
//! Two function codes fall outside the standard read/write set and are
//! answered with hand-assembled payloads:
//!
//! - **0x11 Report Slave ID**: run indicator plus the configured slave
//!   name, the classic "who are you" poll of Modbus serial masters.
//! - **0x2B/0x0E Read Device Identification**: the basic-category MEI
//!   transport carrying a single `VendorName` object.
//!
//! The payloads defined here start at the byte following the function
//! code; the TCP codec prepends the MBAP header and the function code and
//! sends the whole ADU in one write.

use crate::config::DeviceConfig;

/// Function code of the Report Slave ID request.
pub const FC_REPORT_SLAVE_ID: u8 = 0x11;
/// Function code of the Modbus Encapsulated Interface transport.
pub const FC_ENCAPSULATED_INTERFACE: u8 = 0x2B;
/// MEI type for Read Device Identification.
pub const MEI_READ_DEVICE_ID: u8 = 0x0E;

/// Slave names longer than this are truncated on the wire.
const MAX_SLAVE_NAME_LEN: usize = 240;
/// Device identification strings longer than this are truncated.
const MAX_DEVICE_ID_LEN: usize = 235;

/// Immutable identity of the simulated slave, taken from `[Device]`.
///
/// Only `slave_id` appears in regular traffic; the strings seed the
/// identification responses above.
#[derive(Debug, Clone)]
pub struct DeviceIdentity {
    pub slave_name: String,
    pub device_id_string: String,
    pub slave_id: u8,
    pub run_indicator: u8,
}

impl DeviceIdentity {
    pub fn from_config(config: &DeviceConfig) -> Self {
        Self {
            slave_name: config.slave_name.clone(),
            device_id_string: config.device_identification.clone(),
            slave_id: config.slave_id,
            run_indicator: config.run_indicator,
        }
    }

    /// Payload of the 0x11 response, after the function code:
    ///
    /// ```text
    /// byte 0   : payload length = 2 + len(slave_name)
    /// byte 1   : slave id
    /// byte 2   : run indicator
    /// byte 3.. : slave name (ASCII, truncated at 240 bytes)
    /// ```
    pub fn report_slave_id_payload(&self) -> Vec<u8> {
        let name = truncated(self.slave_name.as_bytes(), MAX_SLAVE_NAME_LEN);
        let mut payload = Vec::with_capacity(3 + name.len());
        payload.push((2 + name.len()) as u8);
        payload.push(self.slave_id);
        payload.push(self.run_indicator);
        payload.extend_from_slice(name);
        payload
    }

    /// Payload of the 0x2B/0x0E response, after the function code:
    ///
    /// ```text
    /// byte 0   : 0x0E  MEI type
    /// byte 1   : 0x01  ReadDevIdCode (basic)
    /// byte 2   : 0x01  conformity level
    /// byte 3   : 0x00  more follows = false
    /// byte 4   : 0x00  next object id
    /// byte 5   : 0x01  number of objects
    /// byte 6   : 0x00  object id (VendorName)
    /// byte 7   : object length (truncated at 235)
    /// byte 8.. : device identification string
    /// ```
    pub fn read_device_id_payload(&self) -> Vec<u8> {
        let vendor = truncated(self.device_id_string.as_bytes(), MAX_DEVICE_ID_LEN);
        let mut payload = Vec::with_capacity(8 + vendor.len());
        payload.extend_from_slice(&[MEI_READ_DEVICE_ID, 0x01, 0x01, 0x00, 0x00, 0x01, 0x00]);
        payload.push(vendor.len() as u8);
        payload.extend_from_slice(vendor);
        payload
    }
}

fn truncated(bytes: &[u8], max: usize) -> &[u8] {
    &bytes[..bytes.len().min(max)]
}

#[cfg(test)]
mod tests {
    use super::*;

    fn identity(name: &str, vendor: &str) -> DeviceIdentity {
        DeviceIdentity {
            slave_name: name.to_string(),
            device_id_string: vendor.to_string(),
            slave_id: 1,
            run_indicator: 1,
        }
    }

    #[test]
    fn report_slave_id_layout_matches_the_wire_format() {
        let payload = identity("SimplePLC", "x").report_slave_id_payload();
        // length byte, slave id, run indicator, then the ASCII name
        assert_eq!(payload[0], 2 + 9);
        assert_eq!(
            payload[1..],
            [0x01, 0x01, 0x53, 0x69, 0x6d, 0x70, 0x6c, 0x65, 0x50, 0x4c, 0x43]
        );
        // MBAP length field emitted by the codec: unit id + function code
        // + payload. For "SimplePLC" that is 0x000E.
        assert_eq!(2 + payload.len(), 0x0E);
    }

    #[test]
    fn slave_name_is_truncated_at_240_bytes() {
        let long = "n".repeat(241);
        let payload = identity(&long, "x").report_slave_id_payload();
        assert_eq!(payload.len(), 3 + 240);
        assert_eq!(payload[0], (2 + 240) as u8);

        let exact = "n".repeat(240);
        let payload = identity(&exact, "x").report_slave_id_payload();
        assert_eq!(payload.len(), 3 + 240);
    }

    #[test]
    fn device_identification_layout_matches_the_wire_format() {
        let payload = identity("s", "ACME PLC").read_device_id_payload();
        assert_eq!(payload[..7], [0x0E, 0x01, 0x01, 0x00, 0x00, 0x01, 0x00]);
        assert_eq!(payload[7], 8);
        assert_eq!(&payload[8..], b"ACME PLC");
    }

    #[test]
    fn device_identification_is_truncated_at_235_bytes() {
        let long = "v".repeat(236);
        let payload = identity("s", &long).read_device_id_payload();
        assert_eq!(payload[7], 235);
        assert_eq!(payload.len(), 8 + 235);
    }
}
