//! Fixtures for exercising the scheduler without a real script runtime.
//!
//! Used by this crate's tests and by downstream crates that need to observe
//! the diagnostic channel.

use std::cell::RefCell;
use std::collections::HashMap;

use serde_json::Value;

use crate::binding::{LogSeverity, ScriptBinding};
use crate::callback::ScriptLanguage;
use crate::error::ScriptError;

/// Binding that records every log line and script execution.
///
/// Scripts reply with canned values set through [`reply_with`]; unknown
/// sources reply with `null`, and sources marked with [`fail_with`] fail
/// with a runtime error.
///
/// [`reply_with`]: RecordingBinding::reply_with
/// [`fail_with`]: RecordingBinding::fail_with
#[derive(Default)]
pub struct RecordingBinding {
    logs: RefCell<Vec<(LogSeverity, String)>>,
    executed: RefCell<Vec<(ScriptLanguage, String)>>,
    replies: RefCell<HashMap<String, Value>>,
    failures: RefCell<HashMap<String, String>>,
}

impl RecordingBinding {
    /// Fresh binding with no canned replies.
    pub fn new() -> RecordingBinding {
        RecordingBinding::default()
    }

    /// Sets the value returned when `source` is executed.
    pub fn reply_with(&self, source: &str, value: Value) {
        self.replies.borrow_mut().insert(source.to_string(), value);
    }

    /// Makes executions of `source` fail with a runtime error.
    pub fn fail_with(&self, source: &str, message: &str) {
        self.failures
            .borrow_mut()
            .insert(source.to_string(), message.to_string());
    }

    /// Every log line seen so far.
    pub fn logs(&self) -> Vec<(LogSeverity, String)> {
        self.logs.borrow().clone()
    }

    /// True when some log line contains `needle`.
    pub fn logged(&self, needle: &str) -> bool {
        self.logs
            .borrow()
            .iter()
            .any(|(_, line)| line.contains(needle))
    }

    /// Every script executed so far, in execution order.
    pub fn executed(&self) -> Vec<(ScriptLanguage, String)> {
        self.executed.borrow().clone()
    }

    fn execute(&self, language: ScriptLanguage, source: &str) -> Result<Value, ScriptError> {
        self.executed
            .borrow_mut()
            .push((language, source.to_string()));
        if let Some(message) = self.failures.borrow().get(source) {
            return Err(ScriptError::Runtime {
                language,
                message: message.clone(),
            });
        }
        Ok(self
            .replies
            .borrow()
            .get(source)
            .cloned()
            .unwrap_or(Value::Null))
    }
}

impl ScriptBinding for RecordingBinding {
    fn run_rune(&self, source: &str) -> Result<Value, ScriptError> {
        self.execute(ScriptLanguage::Rune, source)
    }

    fn run_lua(&self, source: &str) -> Result<Value, ScriptError> {
        self.execute(ScriptLanguage::Lua, source)
    }

    fn log(&self, severity: LogSeverity, message: &str) {
        self.logs.borrow_mut().push((severity, message.to_string()));
    }
}
