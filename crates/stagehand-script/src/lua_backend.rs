//! Lua runtime backed by a vendored Lua 5.4 interpreter.

use mlua::{Lua, LuaSerdeExt};
use serde_json::Value as JsonValue;

use stagehand_events::{ScriptError, ScriptLanguage};

pub(crate) struct LuaBackend {
    lua: Lua,
}

impl LuaBackend {
    pub(crate) fn new() -> LuaBackend {
        LuaBackend { lua: Lua::new() }
    }

    pub(crate) fn eval(&self, source: &str) -> Result<JsonValue, ScriptError> {
        let value = self
            .lua
            .load(source)
            .eval::<mlua::Value>()
            .map_err(|e| match e {
                mlua::Error::SyntaxError { message, .. } => ScriptError::Compile {
                    language: ScriptLanguage::Lua,
                    message,
                },
                other => ScriptError::Runtime {
                    language: ScriptLanguage::Lua,
                    message: other.to_string(),
                },
            })?;

        self.lua
            .from_value(value)
            .map_err(|e| ScriptError::Runtime {
                language: ScriptLanguage::Lua,
                message: format!("result conversion failed: {e}"),
            })
    }
}
