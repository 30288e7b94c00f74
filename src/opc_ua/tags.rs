// Copyright (c) 2025 Ronan LE MEILLAT, SCTG Development
// This file is part of the simpleplc project and is licensed under the
// SCTG Development Non-Commercial License v1.0 (see LICENSE.md for details).

//! Tag-to-bank value mapping
//!
//! A tag binds one OPC UA variable node to one register address. The
//! functions here perform the actual bank access for both directions —
//! the periodic snapshot (bank to node) and client writes (node to bank)
//! — and enforce the write-eligibility rule: only Coil and
//! HoldingRegister tags may be written from outside; a write to any other
//! kind leaves the bank unchanged.

use thiserror::Error;

use crate::bank::{BankError, BitSpace, RegisterTable, WordSpace};
use crate::config::{TagConfig, TagKind};

/// A value read from or destined for a tagged register.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TagValue {
    Bit(bool),
    Word(u16),
}

/// Rejection reasons for an external tag write.
#[derive(Debug, Error)]
pub enum TagWriteError {
    #[error("tag {0} is read-only")]
    NotWritable(String),
    #[error("value type does not match tag {0}")]
    TypeMismatch(String),
    #[error(transparent)]
    Bank(#[from] BankError),
}

/// Read the register a tag is mapped to. Used by the periodic snapshot.
pub fn read_tag(table: &RegisterTable, tag: &TagConfig) -> Result<TagValue, BankError> {
    match tag.kind {
        TagKind::Coil => table.read_bit(BitSpace::Coil, tag.address).map(TagValue::Bit),
        TagKind::DiscreteInput => table
            .read_bit(BitSpace::DiscreteInput, tag.address)
            .map(TagValue::Bit),
        TagKind::HoldingRegister => table
            .read_word(WordSpace::Holding, tag.address)
            .map(TagValue::Word),
        TagKind::InputRegister => table
            .read_word(WordSpace::Input, tag.address)
            .map(TagValue::Word),
    }
}

/// Apply an external write to the register a tag is mapped to.
pub fn write_tag(
    table: &mut RegisterTable,
    tag: &TagConfig,
    value: TagValue,
) -> Result<(), TagWriteError> {
    if !tag.kind.is_client_writable() {
        return Err(TagWriteError::NotWritable(tag.name.clone()));
    }
    match (tag.kind, value) {
        (TagKind::Coil, TagValue::Bit(bit)) => {
            table.write_bit(BitSpace::Coil, tag.address, bit)?;
            Ok(())
        }
        (TagKind::HoldingRegister, TagValue::Word(word)) => {
            table.write_word(WordSpace::Holding, tag.address, word)?;
            Ok(())
        }
        _ => Err(TagWriteError::TypeMismatch(tag.name.clone())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bank::RegisterBank;
    use crate::config::TagKind;

    fn tag(name: &str, address: u16, kind: TagKind) -> TagConfig {
        TagConfig {
            name: name.to_string(),
            address,
            kind,
        }
    }

    #[test]
    fn coil_tag_write_is_visible_to_the_bank() {
        let bank = RegisterBank::new(16);
        let mut table = bank.lock();
        let coil = tag("Conveyor1_Running", 0, TagKind::Coil);
        write_tag(&mut table, &coil, TagValue::Bit(true)).unwrap();
        assert!(table.read_bit(BitSpace::Coil, 0).unwrap());
        assert_eq!(read_tag(&table, &coil).unwrap(), TagValue::Bit(true));
    }

    #[test]
    fn holding_register_tag_round_trips() {
        let bank = RegisterBank::new(16);
        let mut table = bank.lock();
        let setpoint = tag("Speed_Setpoint", 0, TagKind::HoldingRegister);
        write_tag(&mut table, &setpoint, TagValue::Word(42)).unwrap();
        assert_eq!(table.read_word(WordSpace::Holding, 0).unwrap(), 42);
    }

    #[test]
    fn read_only_kinds_reject_writes_and_leave_the_bank_unchanged() {
        let bank = RegisterBank::new(16);
        let mut table = bank.lock();

        let sensor = tag("Sensor1_Active", 0, TagKind::DiscreteInput);
        assert!(matches!(
            write_tag(&mut table, &sensor, TagValue::Bit(true)),
            Err(TagWriteError::NotWritable(_))
        ));
        assert!(!table.read_bit(BitSpace::DiscreteInput, 0).unwrap());

        let temperature = tag("Temperature1", 0, TagKind::InputRegister);
        assert!(matches!(
            write_tag(&mut table, &temperature, TagValue::Word(99)),
            Err(TagWriteError::NotWritable(_))
        ));
        assert_eq!(table.read_word(WordSpace::Input, 0).unwrap(), 0);
    }

    #[test]
    fn mismatched_value_types_are_rejected() {
        let bank = RegisterBank::new(16);
        let mut table = bank.lock();
        let coil = tag("Conveyor1_Running", 0, TagKind::Coil);
        assert!(matches!(
            write_tag(&mut table, &coil, TagValue::Word(1)),
            Err(TagWriteError::TypeMismatch(_))
        ));
    }

    #[test]
    fn out_of_range_tag_addresses_surface_bank_errors() {
        let bank = RegisterBank::new(16);
        let mut table = bank.lock();
        let wild = tag("Wild", 99, TagKind::HoldingRegister);
        assert!(read_tag(&table, &wild).is_err());
        assert!(matches!(
            write_tag(&mut table, &wild, TagValue::Word(1)),
            Err(TagWriteError::Bank(_))
        ));
    }
}
