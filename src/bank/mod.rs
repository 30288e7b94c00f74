// Copyright (c) 2025 Ronan LE MEILLAT, SCTG Development
// This file is part of the simpleplc project and is licensed under the
// SCTG Development Non-Commercial License v1.0 (see LICENSE.md for details).

//! Shared register bank for the soft-PLC simulator
//!
//! The bank owns the four Modbus address spaces and is the single piece of
//! state shared between the protocol front-ends and the scan engine:
//!
//! | Space | Element | Externally writable |
//! |-------|---------|---------------------|
//! | Coils | bit | yes (FC 5/15, OPC UA) |
//! | Discrete Inputs | bit | no (scan program only) |
//! | Holding Registers | 16-bit unsigned | yes (FC 6/16, OPC UA) |
//! | Input Registers | 16-bit unsigned | no (scan program only) |
//!
//! All four spaces share one coarse-grained mutex. Protocol handlers take
//! the blocking [`RegisterBank::lock`] and hold it across the whole reply
//! generation for a request, which keeps a read-modify-reply sequence
//! atomic with respect to every other writer. The scan engine's accessors
//! use [`RegisterBank::try_lock_for`] with a one second ceiling so a stuck
//! front-end can never wedge the scan cycle.
//!
//! ### Thread Safety
//!
//! `RegisterBank` is `Send + Sync` and is shared as an `Arc` between the
//! Modbus service, the OPC UA polling action and the scan thread. The
//! orchestrator is the unique owner and joins every component before the
//! bank is dropped.

use std::fmt;
use std::time::Duration;

use parking_lot::{Mutex, MutexGuard};
use thiserror::Error;

/// Ceiling for the scan engine's timed lock acquisition.
pub const LOCK_TIMEOUT: Duration = Duration::from_secs(1);

/// Single-bit address spaces.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BitSpace {
    /// Coils (0x references): externally writable bits.
    Coil,
    /// Discrete inputs (1x references): bits owned by the scan program.
    DiscreteInput,
}

/// 16-bit address spaces.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum WordSpace {
    /// Holding registers (4x references): externally writable words.
    Holding,
    /// Input registers (3x references): words owned by the scan program.
    Input,
}

/// Errors produced by bank accessors.
///
/// Out-of-range addresses are rejected, never wrapped; the Modbus service
/// maps this to an ILLEGAL DATA ADDRESS exception response.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum BankError {
    /// The address (or the end of the requested range) falls outside the
    /// space configured at bank creation.
    #[error("address {addr} (count {count}) out of range for {space} of size {size}")]
    OutOfRange {
        space: &'static str,
        addr: u16,
        count: u16,
        size: u16,
    },
    /// The timed lock acquisition gave up after [`LOCK_TIMEOUT`].
    #[error("register bank lock not acquired within {LOCK_TIMEOUT:?}")]
    LockTimeout,
}

/// The four register tables. Only reachable through a bank lock guard.
#[derive(Debug)]
pub struct RegisterTable {
    coils: Vec<bool>,
    discrete_inputs: Vec<bool>,
    holding_registers: Vec<u16>,
    input_registers: Vec<u16>,
}

impl RegisterTable {
    fn new(mapping_size: u16) -> Self {
        let n = usize::from(mapping_size);
        Self {
            coils: vec![false; n],
            discrete_inputs: vec![false; n],
            holding_registers: vec![0; n],
            input_registers: vec![0; n],
        }
    }

    fn bits(&self, space: BitSpace) -> &[bool] {
        match space {
            BitSpace::Coil => &self.coils,
            BitSpace::DiscreteInput => &self.discrete_inputs,
        }
    }

    fn bits_mut(&mut self, space: BitSpace) -> &mut [bool] {
        match space {
            BitSpace::Coil => &mut self.coils,
            BitSpace::DiscreteInput => &mut self.discrete_inputs,
        }
    }

    fn words(&self, space: WordSpace) -> &[u16] {
        match space {
            WordSpace::Holding => &self.holding_registers,
            WordSpace::Input => &self.input_registers,
        }
    }

    fn words_mut(&mut self, space: WordSpace) -> &mut [u16] {
        match space {
            WordSpace::Holding => &mut self.holding_registers,
            WordSpace::Input => &mut self.input_registers,
        }
    }

    fn check_range(len: usize, space: &'static str, addr: u16, count: u16) -> Result<(), BankError> {
        let end = usize::from(addr) + usize::from(count);
        if count == 0 || end > len {
            return Err(BankError::OutOfRange {
                space,
                addr,
                count,
                size: len as u16,
            });
        }
        Ok(())
    }

    /// Read a single bit.
    pub fn read_bit(&self, space: BitSpace, addr: u16) -> Result<bool, BankError> {
        let table = self.bits(space);
        Self::check_range(table.len(), space_name_bit(space), addr, 1)?;
        Ok(table[usize::from(addr)])
    }

    /// Write a single bit.
    ///
    /// Writing `DiscreteInput` is reserved to the scan engine binding; the
    /// protocol front-ends only ever call this with [`BitSpace::Coil`].
    pub fn write_bit(&mut self, space: BitSpace, addr: u16, value: bool) -> Result<(), BankError> {
        let table = self.bits_mut(space);
        Self::check_range(table.len(), space_name_bit(space), addr, 1)?;
        table[usize::from(addr)] = value;
        Ok(())
    }

    /// Read a single 16-bit register.
    pub fn read_word(&self, space: WordSpace, addr: u16) -> Result<u16, BankError> {
        let table = self.words(space);
        Self::check_range(table.len(), space_name_word(space), addr, 1)?;
        Ok(table[usize::from(addr)])
    }

    /// Write a single 16-bit register.
    ///
    /// Writing `Input` is reserved to the scan engine binding.
    pub fn write_word(&mut self, space: WordSpace, addr: u16, value: u16) -> Result<(), BankError> {
        let table = self.words_mut(space);
        Self::check_range(table.len(), space_name_word(space), addr, 1)?;
        table[usize::from(addr)] = value;
        Ok(())
    }

    /// Read a contiguous range of bits (FC 0x01 / 0x02).
    ///
    /// The whole range is validated up front so a reply never mixes valid
    /// and rejected addresses.
    pub fn read_bits(&self, space: BitSpace, addr: u16, count: u16) -> Result<Vec<bool>, BankError> {
        let table = self.bits(space);
        Self::check_range(table.len(), space_name_bit(space), addr, count)?;
        let start = usize::from(addr);
        Ok(table[start..start + usize::from(count)].to_vec())
    }

    /// Read a contiguous range of words (FC 0x03 / 0x04).
    pub fn read_words(&self, space: WordSpace, addr: u16, count: u16) -> Result<Vec<u16>, BankError> {
        let table = self.words(space);
        Self::check_range(table.len(), space_name_word(space), addr, count)?;
        let start = usize::from(addr);
        Ok(table[start..start + usize::from(count)].to_vec())
    }

    /// Write a contiguous range of bits (FC 0x0F).
    pub fn write_bits(&mut self, space: BitSpace, addr: u16, values: &[bool]) -> Result<(), BankError> {
        let table = self.bits_mut(space);
        Self::check_range(table.len(), space_name_bit(space), addr, values.len() as u16)?;
        let start = usize::from(addr);
        table[start..start + values.len()].copy_from_slice(values);
        Ok(())
    }

    /// Write a contiguous range of words (FC 0x10).
    pub fn write_words(&mut self, space: WordSpace, addr: u16, values: &[u16]) -> Result<(), BankError> {
        let table = self.words_mut(space);
        Self::check_range(table.len(), space_name_word(space), addr, values.len() as u16)?;
        let start = usize::from(addr);
        table[start..start + values.len()].copy_from_slice(values);
        Ok(())
    }
}

fn space_name_bit(space: BitSpace) -> &'static str {
    match space {
        BitSpace::Coil => "coils",
        BitSpace::DiscreteInput => "discrete inputs",
    }
}

fn space_name_word(space: WordSpace) -> &'static str {
    match space {
        WordSpace::Holding => "holding registers",
        WordSpace::Input => "input registers",
    }
}

/// The shared register bank.
///
/// Created once by the orchestrator with the configured `mapping_size`
/// (applied uniformly to all four spaces) and handed to the front-ends as
/// an `Arc`. Contents are zero-initialized and never persisted.
pub struct RegisterBank {
    registers: Mutex<RegisterTable>,
    mapping_size: u16,
}

impl RegisterBank {
    /// Create a bank with `mapping_size` elements in each address space.
    pub fn new(mapping_size: u16) -> Self {
        Self {
            registers: Mutex::new(RegisterTable::new(mapping_size)),
            mapping_size,
        }
    }

    /// Number of elements in each address space.
    pub fn mapping_size(&self) -> u16 {
        self.mapping_size
    }

    /// Blocking acquisition, used by the protocol front-ends.
    ///
    /// The guard is held across the entire reply generation for a single
    /// client request so that the values read and the write acknowledged
    /// by a reply are a consistent snapshot.
    pub fn lock(&self) -> MutexGuard<'_, RegisterTable> {
        self.registers.lock()
    }

    /// Timed acquisition with the [`LOCK_TIMEOUT`] ceiling, used by the
    /// scan engine so that a cycle is skipped instead of blocked forever.
    pub fn try_lock_for(&self, timeout: Duration) -> Option<MutexGuard<'_, RegisterTable>> {
        self.registers.try_lock_for(timeout)
    }
}

impl fmt::Debug for RegisterBank {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RegisterBank")
            .field("mapping_size", &self.mapping_size)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn spaces_are_zero_initialized() {
        let bank = RegisterBank::new(16);
        let table = bank.lock();
        assert_eq!(table.read_bits(BitSpace::Coil, 0, 16).unwrap(), vec![false; 16]);
        assert_eq!(table.read_bits(BitSpace::DiscreteInput, 0, 16).unwrap(), vec![false; 16]);
        assert_eq!(table.read_words(WordSpace::Holding, 0, 16).unwrap(), vec![0; 16]);
        assert_eq!(table.read_words(WordSpace::Input, 0, 16).unwrap(), vec![0; 16]);
    }

    #[test]
    fn word_write_read_round_trip() {
        let bank = RegisterBank::new(255);
        let mut table = bank.lock();
        table.write_word(WordSpace::Holding, 42, 0xBEEF).unwrap();
        assert_eq!(table.read_word(WordSpace::Holding, 42).unwrap(), 0xBEEF);
        // The other word space is untouched.
        assert_eq!(table.read_word(WordSpace::Input, 42).unwrap(), 0);
    }

    #[test]
    fn bit_spaces_are_independent() {
        let bank = RegisterBank::new(8);
        let mut table = bank.lock();
        table.write_bit(BitSpace::Coil, 3, true).unwrap();
        assert!(table.read_bit(BitSpace::Coil, 3).unwrap());
        assert!(!table.read_bit(BitSpace::DiscreteInput, 3).unwrap());
    }

    #[test]
    fn last_address_is_valid_one_past_is_not() {
        let bank = RegisterBank::new(255);
        let mut table = bank.lock();
        table.write_word(WordSpace::Holding, 254, 7).unwrap();
        assert_eq!(table.read_word(WordSpace::Holding, 254).unwrap(), 7);
        assert!(matches!(
            table.write_word(WordSpace::Holding, 255, 7),
            Err(BankError::OutOfRange { addr: 255, .. })
        ));
        assert!(matches!(
            table.write_bit(BitSpace::Coil, 255, true),
            Err(BankError::OutOfRange { addr: 255, .. })
        ));
    }

    #[test]
    fn range_reads_reject_overrun_and_zero_count() {
        let bank = RegisterBank::new(10);
        let table = bank.lock();
        assert!(table.read_words(WordSpace::Input, 5, 5).is_ok());
        assert!(table.read_words(WordSpace::Input, 5, 6).is_err());
        assert!(table.read_bits(BitSpace::Coil, 0, 0).is_err());
    }

    #[test]
    fn range_write_is_all_or_nothing() {
        let bank = RegisterBank::new(4);
        let mut table = bank.lock();
        let err = table.write_words(WordSpace::Holding, 2, &[1, 2, 3]);
        assert!(err.is_err());
        // Nothing was committed.
        assert_eq!(table.read_words(WordSpace::Holding, 0, 4).unwrap(), vec![0; 4]);
    }

    #[test]
    fn timed_acquire_times_out_while_held() {
        let bank = std::sync::Arc::new(RegisterBank::new(4));
        let guard = bank.lock();
        let contender = std::sync::Arc::clone(&bank);
        let handle = std::thread::spawn(move || {
            contender.try_lock_for(Duration::from_millis(50)).is_none()
        });
        assert!(handle.join().unwrap());
        drop(guard);
        assert!(bank.try_lock_for(Duration::from_millis(50)).is_some());
    }
}
