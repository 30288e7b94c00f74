// Copyright (c) 2025 Ronan LE MEILLAT, SCTG Development
// This file is part of the simpleplc project and is licensed under the
// SCTG Development Non-Commercial License v1.0 (see LICENSE.md for details).

//! Lua interpreter state for one loaded scan program
//!
//! A [`ScriptHost`] owns a fresh `mlua::Lua` with the register API
//! installed and the program file executed. Hot reload builds a complete
//! new host first and only then swaps it in, so a broken file never
//! destroys a working interpreter.

use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result};
use mlua::{Lua, Value};

use crate::bank::RegisterBank;

use super::bindings;

/// Result of one `cycle()` invocation.
#[derive(Debug)]
pub enum CycleOutcome {
    /// `cycle()` ran to completion.
    Completed,
    /// No callable global named `cycle` exists; the scan loop terminates.
    MissingEntryPoint,
    /// The script raised; the error carries the Lua traceback.
    Failed(mlua::Error),
}

/// One loaded scan program and its interpreter state.
pub struct ScriptHost {
    lua: Lua,
}

impl ScriptHost {
    /// Create a fresh interpreter, install the `modbus` bindings and run
    /// the program file once so its globals (including `cycle`) exist.
    pub fn load(bank: &Arc<RegisterBank>, script_path: &Path) -> Result<Self> {
        let source = std::fs::read_to_string(script_path)
            .with_context(|| format!("failed to read scan program {}", script_path.display()))?;

        let lua = Lua::new();
        bindings::install(&lua, bank)
            .map_err(|e| anyhow::anyhow!("{e}"))
            .context("failed to install the register access bindings")?;
        lua.load(&source)
            .set_name(script_path.display().to_string())
            .exec()
            .map_err(|e| anyhow::anyhow!("{e}"))
            .with_context(|| format!("failed to execute scan program {}", script_path.display()))?;

        Ok(Self { lua })
    }

    /// Invoke the global `cycle` entry point with zero arguments.
    pub fn run_cycle(&self) -> CycleOutcome {
        let cycle: Value = match self.lua.globals().get("cycle") {
            Ok(value) => value,
            Err(err) => return CycleOutcome::Failed(err),
        };
        let Value::Function(cycle) = cycle else {
            return CycleOutcome::MissingEntryPoint;
        };
        let result: mlua::Result<()> = cycle.call(());
        match result {
            Ok(()) => CycleOutcome::Completed,
            Err(err) => CycleOutcome::Failed(err),
        }
    }
}
