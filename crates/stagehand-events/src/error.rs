//! Error types shared across the event subsystem.

use thiserror::Error;

use crate::callback::ScriptLanguage;

/// Failure while running a scripted callback.
///
/// Engine diagnostics arrive pre-rendered as strings so this crate stays
/// free of any particular runtime's types.
#[derive(Error, Debug)]
pub enum ScriptError {
    /// The active binding has no runtime for the requested language.
    #[error("no {0} runtime is available in this binding")]
    Unsupported(ScriptLanguage),

    /// The snippet failed to compile.
    #[error("{language} compilation failed: {message}")]
    Compile {
        /// Language the snippet was written in.
        language: ScriptLanguage,
        /// Rendered engine diagnostics.
        message: String,
    },

    /// The snippet compiled but failed while running.
    #[error("{language} execution failed: {message}")]
    Runtime {
        /// Language the snippet was written in.
        language: ScriptLanguage,
        /// Rendered engine failure.
        message: String,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn messages_name_the_language() {
        let err = ScriptError::Unsupported(ScriptLanguage::Lua);
        assert_eq!(err.to_string(), "no lua runtime is available in this binding");

        let err = ScriptError::Compile {
            language: ScriptLanguage::Rune,
            message: "unexpected token".to_string(),
        };
        assert!(err.to_string().starts_with("rune compilation failed"));
    }
}
