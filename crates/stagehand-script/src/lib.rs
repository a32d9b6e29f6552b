//! Embedded script runtimes for stagehand callbacks.
//!
//! [`ScriptEngine`] is the batteries-included [`ScriptBinding`]
//! implementation: it hosts a Rune virtual machine and a vendored Lua 5.4
//! interpreter and hands either one to the scheduler behind a single type.
//! Snippet results come back as `serde_json::Value` so the trigger protocols
//! can read boolean votes without knowing which language produced them.
//!
//! ```no_run
//! use std::rc::Rc;
//! use stagehand_events::EventScheduler;
//! use stagehand_script::ScriptEngine;
//!
//! # fn main() -> Result<(), stagehand_events::ScriptError> {
//! let engine = Rc::new(ScriptEngine::new()?);
//! let scheduler = EventScheduler::new(engine);
//! # Ok(()) }
//! ```
//!
//! [`ScriptBinding`]: stagehand_events::ScriptBinding

#![warn(missing_docs)]
#![warn(clippy::all)]
#![deny(unsafe_code)]

mod engine;
mod lua_backend;
mod rune_backend;

pub use engine::ScriptEngine;
