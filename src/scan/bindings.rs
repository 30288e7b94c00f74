// Copyright (c) 2025 Ronan LE MEILLAT, SCTG Development
// This file is part of the simpleplc project and is licensed under the
// SCTG Development Non-Commercial License v1.0 (see LICENSE.md for details).

//! Lua register-access API for scan programs
//!
//! Installs one global table named `modbus` whose members read and write
//! the register bank:
//!
//! | Function | Returns |
//! |----------|---------|
//! | `readCoil(addr)` | boolean, or `nil` on out-of-range/timeout |
//! | `writeCoil(addr, bool)` | boolean success |
//! | `readDiscreteInput(addr)` | boolean or `nil` |
//! | `writeDiscreteInput(addr, bool)` | boolean success |
//! | `readHoldingRegister(addr)` | integer or `nil` |
//! | `writeHoldingRegister(addr, value)` | boolean success |
//! | `readInputRegister(addr)` | integer or `nil` |
//! | `writeInputRegister(addr, value)` | boolean success |
//!
//! `writeDiscreteInput` and `writeInputRegister` are the only way those
//! two spaces are ever mutated; the protocol front-ends treat them as
//! read-only.
//!
//! Every accessor takes the bank lock with the one second ceiling and
//! reports a timeout as `nil`/`false`, so a congested front-end degrades a
//! cycle instead of hanging it.
//!
//! The global `print` is replaced by a host-side logger that prefixes
//! every line with `[LUA]` and flushes per call, keeping scan programs
//! debuggable in real time.

use std::io::Write as _;
use std::sync::Arc;

use log::{info, warn};
use mlua::{Lua, Value, Variadic};

use crate::bank::{BitSpace, RegisterBank, WordSpace, LOCK_TIMEOUT};

/// Install the `modbus` table and the `print` replacement into `lua`.
pub fn install(lua: &Lua, bank: &Arc<RegisterBank>) -> mlua::Result<()> {
    let modbus = lua.create_table()?;

    let b = Arc::clone(bank);
    modbus.set(
        "readCoil",
        lua.create_function(move |_, addr: i64| Ok(read_bit(&b, BitSpace::Coil, "readCoil", addr)))?,
    )?;

    let b = Arc::clone(bank);
    modbus.set(
        "writeCoil",
        lua.create_function(move |_, (addr, value): (i64, bool)| {
            Ok(write_bit(&b, BitSpace::Coil, "writeCoil", addr, value))
        })?,
    )?;

    let b = Arc::clone(bank);
    modbus.set(
        "readDiscreteInput",
        lua.create_function(move |_, addr: i64| {
            Ok(read_bit(&b, BitSpace::DiscreteInput, "readDiscreteInput", addr))
        })?,
    )?;

    let b = Arc::clone(bank);
    modbus.set(
        "writeDiscreteInput",
        lua.create_function(move |_, (addr, value): (i64, bool)| {
            Ok(write_bit(&b, BitSpace::DiscreteInput, "writeDiscreteInput", addr, value))
        })?,
    )?;

    let b = Arc::clone(bank);
    modbus.set(
        "readHoldingRegister",
        lua.create_function(move |_, addr: i64| {
            Ok(read_word(&b, WordSpace::Holding, "readHoldingRegister", addr))
        })?,
    )?;

    let b = Arc::clone(bank);
    modbus.set(
        "writeHoldingRegister",
        lua.create_function(move |_, (addr, value): (i64, i64)| {
            Ok(write_word(&b, WordSpace::Holding, "writeHoldingRegister", addr, value))
        })?,
    )?;

    let b = Arc::clone(bank);
    modbus.set(
        "readInputRegister",
        lua.create_function(move |_, addr: i64| {
            Ok(read_word(&b, WordSpace::Input, "readInputRegister", addr))
        })?,
    )?;

    let b = Arc::clone(bank);
    modbus.set(
        "writeInputRegister",
        lua.create_function(move |_, (addr, value): (i64, i64)| {
            Ok(write_word(&b, WordSpace::Input, "writeInputRegister", addr, value))
        })?,
    )?;

    lua.globals().set("modbus", modbus)?;

    let print = lua.create_function(|lua, args: Variadic<Value>| {
        let mut line = String::new();
        for (i, value) in args.iter().enumerate() {
            if i > 0 {
                line.push('\t');
            }
            match lua.coerce_string(value.clone())? {
                Some(s) => line.push_str(&s.to_string_lossy()),
                None => line.push_str(value.type_name()),
            }
        }
        info!("[LUA] {line}");
        let _ = std::io::stderr().flush();
        Ok(())
    })?;
    lua.globals().set("print", print)?;

    Ok(())
}

fn checked_addr(bank: &RegisterBank, what: &str, addr: i64) -> Option<u16> {
    if (0..i64::from(bank.mapping_size())).contains(&addr) {
        Some(addr as u16)
    } else {
        warn!("[PLC] {what}({addr}) out of range (mapping size {})", bank.mapping_size());
        None
    }
}

fn checked_word(what: &str, value: i64) -> Option<u16> {
    match u16::try_from(value) {
        Ok(v) => Some(v),
        Err(_) => {
            warn!("[PLC] {what}: value {value} does not fit a 16-bit register");
            None
        }
    }
}

fn read_bit(bank: &RegisterBank, space: BitSpace, what: &str, addr: i64) -> Option<bool> {
    let addr = checked_addr(bank, what, addr)?;
    let Some(table) = bank.try_lock_for(LOCK_TIMEOUT) else {
        warn!("[PLC] {what}({addr}): bank lock timed out");
        return None;
    };
    table.read_bit(space, addr).ok()
}

fn write_bit(bank: &RegisterBank, space: BitSpace, what: &str, addr: i64, value: bool) -> bool {
    let Some(addr) = checked_addr(bank, what, addr) else {
        return false;
    };
    let Some(mut table) = bank.try_lock_for(LOCK_TIMEOUT) else {
        warn!("[PLC] {what}({addr}): bank lock timed out");
        return false;
    };
    table.write_bit(space, addr, value).is_ok()
}

fn read_word(bank: &RegisterBank, space: WordSpace, what: &str, addr: i64) -> Option<u16> {
    let addr = checked_addr(bank, what, addr)?;
    let Some(table) = bank.try_lock_for(LOCK_TIMEOUT) else {
        warn!("[PLC] {what}({addr}): bank lock timed out");
        return None;
    };
    table.read_word(space, addr).ok()
}

fn write_word(bank: &RegisterBank, space: WordSpace, what: &str, addr: i64, value: i64) -> bool {
    let Some(addr) = checked_addr(bank, what, addr) else {
        return false;
    };
    let Some(value) = checked_word(what, value) else {
        return false;
    };
    let Some(mut table) = bank.try_lock_for(LOCK_TIMEOUT) else {
        warn!("[PLC] {what}({addr}): bank lock timed out");
        return false;
    };
    table.write_word(space, addr, value).is_ok()
}
