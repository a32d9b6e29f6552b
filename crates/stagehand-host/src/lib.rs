//! Host application boundary for the stagehand event subsystem.
//!
//! The host appears to the rest of the bridge only as a notification
//! service. This crate supplies:
//!
//! - [`HostNotifier`]: the trait a real embedding implements over the host
//!   SDK, one subscription primitive per native argument shape
//! - [`HostEventHandler`]: the adapter that registers the logical host
//!   event catalog and refcounts callbacks onto native subscriptions
//! - [`HostEventManager`]: the shape-checked registration facade clients
//!   actually use
//! - [`test_support::SimulatedHost`]: an in-memory host for tests and demos
//!
//! ```text
//!   HostEventManager          EventScheduler           HostEventHandler
//!        |  shape check            |                         |
//!        +------------------------>| on_callback_created     |
//!        |                         +------------------------>|
//!        |                         |                   0 -> 1: subscribe
//!        |                         |                         v
//!        |                         |                   HostNotifier
//!        |                         |  trigger_with(binder)   |
//!        |                         |<------------------------+
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![deny(unsafe_code)]

pub mod adapter;
pub mod host;
pub mod manager;
pub mod shapes;
pub mod test_support;

pub use adapter::HostEventHandler;
pub use host::{
    FileRef, HostError, HostNotifier, NativeHandle, NodeChange, NodeHandle, PlugRef,
    SessionMoment, TimeSample,
};
pub use manager::HostEventManager;
pub use shapes::{
    CallbackShape, ConnectionFn, FileCheckFn, FileFn, NodeFn, RenameFn, TimeFn,
};
