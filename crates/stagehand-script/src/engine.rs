//! The full-featured [`ScriptBinding`]: Rune plus Lua behind one type.

use serde_json::Value;

use stagehand_events::{LogSeverity, ScriptBinding, ScriptError};

use crate::lua_backend::LuaBackend;
use crate::rune_backend::RuneBackend;

/// Script binding that executes both supported languages in-process.
///
/// Both runtimes are constructed eagerly so a broken installation surfaces
/// when the embedder starts, not on the first scripted callback. Diagnostics
/// route to `tracing` the same way [`stagehand_events::TracingBinding`] does.
pub struct ScriptEngine {
    rune: RuneBackend,
    lua: LuaBackend,
}

impl ScriptEngine {
    /// Builds both runtimes.
    pub fn new() -> Result<ScriptEngine, ScriptError> {
        Ok(ScriptEngine {
            rune: RuneBackend::new()?,
            lua: LuaBackend::new(),
        })
    }
}

impl std::fmt::Debug for ScriptEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ScriptEngine").finish_non_exhaustive()
    }
}

impl ScriptBinding for ScriptEngine {
    fn run_rune(&self, source: &str) -> Result<Value, ScriptError> {
        self.rune.eval(source)
    }

    fn run_lua(&self, source: &str) -> Result<Value, ScriptError> {
        self.lua.eval(source)
    }

    fn log(&self, severity: LogSeverity, message: &str) {
        match severity {
            LogSeverity::Info => tracing::info!("{message}"),
            LogSeverity::Warning => tracing::warn!("{message}"),
            LogSeverity::Error => tracing::error!("{message}"),
        }
    }
}
