//! Event scheduling and callback multiplexing for bridge plugins.
//!
//! Independent plugin components register weighted, named callbacks against
//! a catalog of lifecycle and scene events; the scheduler multiplexes them
//! onto however the events are actually produced. Features:
//!
//! - **Packed ids**: every callback id embeds its event, category and
//!   sequence, so routing needs no registry lookups
//! - **Deterministic ordering**: lower weight fires first, equal weights in
//!   registration order
//! - **Three trigger protocols**: fire-and-forget, AND-aggregate checks and
//!   OR-aggregate filters, none of which short-circuit
//! - **Re-entrancy safe**: callbacks may register and unregister callbacks,
//!   including themselves, mid-trigger
//! - **Pluggable scripting**: callbacks may be Rune or Lua source, run
//!   through whatever [`ScriptBinding`] the embedder supplies
//!
//! # Architecture
//!
//! ```text
//!   clients                EventScheduler                  adapters
//!      |                        |                              |
//!      |  register_callback     |   on_callback_created        |
//!      +----------------------->|----------------------------->|
//!      |                        |                              | 0 -> 1:
//!      |                        |                         native subscribe
//!      |                        |   trigger / trigger_check    |
//!      |   callbacks fire  <----|<-----------------------------+
//!      |   in weight order      |        (from native events)  |
//! ```
//!
//! The scheduler is single-threaded by contract; it lives on the host main
//! thread and every callback runs synchronously inside the trigger call.

#![warn(missing_docs)]
#![warn(clippy::all)]
#![deny(unsafe_code)]

pub mod binding;
pub mod callback;
pub mod dispatcher;
pub mod error;
pub mod handler;
pub mod ids;
pub mod scheduler;
pub mod test_support;

pub use binding::{LogSeverity, ScriptBinding, TracingBinding};
pub use callback::{Callback, CallbackInfo, CallbackPayload, ScriptLanguage, UserData};
pub use dispatcher::{EventDispatcher, EventInfo};
pub use error::ScriptError;
pub use handler::CustomEventHandler;
pub use ids::{
    extract_category, extract_event_id, extract_sequence, make_callback_id, CallbackId,
    EventCategory, EventId, DEFAULT_WEIGHT, PLUGIN_WEIGHT_BAND, SEQUENCE_MASK,
};
pub use scheduler::EventScheduler;
