// Copyright (c) 2025 Ronan LE MEILLAT, SCTG Development
// This file is part of the simpleplc project and is licensed under the
// SCTG Development Non-Commercial License v1.0 (see LICENSE.md for details).

//! OPC UA tag declarations
//!
//! A tag maps a named OPC UA variable node onto one register bank address.
//! Tags are declared in the `[Tags]` section of the configuration, one
//! `name,address,type` triple per line, with the numeric type codes of the
//! original settings format (0 = coil, 1 = discrete input, 2 = holding
//! register, 3 = input register).

use log::error;
use serde::{Deserialize, Serialize};

/// Register kind a tag is bound to.
///
/// The kind decides both the OPC UA data type (Boolean for bits, UInt16
/// for registers) and the write-eligibility: only coils and holding
/// registers may be written by external clients.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TagKind {
    Coil,
    DiscreteInput,
    HoldingRegister,
    InputRegister,
}

impl TagKind {
    /// Numeric code used in the `[Tags]` configuration lines.
    pub fn from_code(code: u8) -> Option<Self> {
        match code {
            0 => Some(TagKind::Coil),
            1 => Some(TagKind::DiscreteInput),
            2 => Some(TagKind::HoldingRegister),
            3 => Some(TagKind::InputRegister),
            _ => None,
        }
    }

    /// True for bit-valued kinds (Boolean OPC UA variables).
    pub fn is_bit(self) -> bool {
        matches!(self, TagKind::Coil | TagKind::DiscreteInput)
    }

    /// True when external clients may write the mapped register.
    pub fn is_client_writable(self) -> bool {
        matches!(self, TagKind::Coil | TagKind::HoldingRegister)
    }
}

/// One configured tag: `(name, address, kind)`. Names are unique; the
/// first declaration wins on duplicates.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TagConfig {
    pub name: String,
    pub address: u16,
    pub kind: TagKind,
}

impl TagConfig {
    /// Parse one `name,address,type` line. Returns `None` (after logging)
    /// when a field is missing or does not parse.
    pub fn from_line(line: &str) -> Option<Self> {
        let mut fields = line.split(',').map(str::trim);
        let (Some(name), Some(address), Some(kind)) =
            (fields.next(), fields.next(), fields.next())
        else {
            error!("[Config] Malformed tag line (expected name,address,type): {line}");
            return None;
        };
        if name.is_empty() {
            error!("[Config] Tag line with empty name: {line}");
            return None;
        }
        let address: u16 = match address.parse() {
            Ok(addr) => addr,
            Err(_) => {
                error!("[Config] Invalid tag address for {name}: {address}");
                return None;
            }
        };
        let kind = match kind.parse::<u8>().ok().and_then(TagKind::from_code) {
            Some(kind) => kind,
            None => {
                error!("[Config] Invalid tag type for {name}: {kind}");
                return None;
            }
        };
        Some(Self {
            name: name.to_string(),
            address,
            kind,
        })
    }
}

/// The four built-in tags used when the `[Tags]` section is empty.
pub fn default_tags() -> Vec<TagConfig> {
    vec![
        TagConfig {
            name: "Conveyor1_Running".to_string(),
            address: 0,
            kind: TagKind::Coil,
        },
        TagConfig {
            name: "Sensor1_Active".to_string(),
            address: 0,
            kind: TagKind::DiscreteInput,
        },
        TagConfig {
            name: "Speed_Setpoint".to_string(),
            address: 0,
            kind: TagKind::HoldingRegister,
        },
        TagConfig {
            name: "Temperature1".to_string(),
            address: 0,
            kind: TagKind::InputRegister,
        },
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_a_tag_line_with_spaces() {
        let tag = TagConfig::from_line(" Speed_Setpoint , 10 , 2 ").unwrap();
        assert_eq!(tag.name, "Speed_Setpoint");
        assert_eq!(tag.address, 10);
        assert_eq!(tag.kind, TagKind::HoldingRegister);
    }

    #[test]
    fn rejects_bad_address_and_unknown_type() {
        assert!(TagConfig::from_line("T1,notanumber,0").is_none());
        assert!(TagConfig::from_line("T1,0,9").is_none());
        assert!(TagConfig::from_line("T1,0").is_none());
    }

    #[test]
    fn write_eligibility_follows_kind() {
        assert!(TagKind::Coil.is_client_writable());
        assert!(TagKind::HoldingRegister.is_client_writable());
        assert!(!TagKind::DiscreteInput.is_client_writable());
        assert!(!TagKind::InputRegister.is_client_writable());
    }
}
