//! Pluggable boundary for script execution and diagnostic routing.

use serde_json::Value;

use crate::callback::ScriptLanguage;
use crate::error::ScriptError;

/// Severity of a diagnostic emitted by the scheduler.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LogSeverity {
    /// Informational, nothing went wrong.
    Info,
    /// Something was ignored or skipped.
    Warning,
    /// An operation failed.
    Error,
}

/// Where the scheduler sends scripted callbacks and its own diagnostics.
///
/// Embedders supply one binding at scheduler construction. The scheduler
/// itself never links a scripting runtime; bindings that carry one run the
/// snippet and hand back the resulting value as JSON, which the trigger
/// protocols interpret as a vote when it is a boolean.
pub trait ScriptBinding {
    /// Runs a Rune snippet, returning its value as JSON.
    fn run_rune(&self, source: &str) -> Result<Value, ScriptError>;

    /// Runs a Lua snippet, returning its value as JSON.
    fn run_lua(&self, source: &str) -> Result<Value, ScriptError>;

    /// Emits one diagnostic line.
    fn log(&self, severity: LogSeverity, message: &str);

    /// Dispatches a snippet to the runtime for its language.
    fn run(&self, language: ScriptLanguage, source: &str) -> Result<Value, ScriptError> {
        match language {
            ScriptLanguage::Rune => self.run_rune(source),
            ScriptLanguage::Lua => self.run_lua(source),
        }
    }
}

/// Default binding for embeddings without a scripting runtime.
///
/// Diagnostics go to `tracing`; every script reports
/// [`ScriptError::Unsupported`].
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingBinding;

impl ScriptBinding for TracingBinding {
    fn run_rune(&self, _source: &str) -> Result<Value, ScriptError> {
        Err(ScriptError::Unsupported(ScriptLanguage::Rune))
    }

    fn run_lua(&self, _source: &str) -> Result<Value, ScriptError> {
        Err(ScriptError::Unsupported(ScriptLanguage::Lua))
    }

    fn log(&self, severity: LogSeverity, message: &str) {
        match severity {
            LogSeverity::Info => tracing::info!("{message}"),
            LogSeverity::Warning => tracing::warn!("{message}"),
            LogSeverity::Error => tracing::error!("{message}"),
        }
    }
}
