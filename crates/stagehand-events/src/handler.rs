//! Hook contract for category owners that multiplex native subscriptions.

use crate::ids::CallbackId;

/// Receives lifecycle hooks for every callback registered under one
/// category.
///
/// Adapters that mirror scheduler events onto expensive native notification
/// primitives implement this to keep a per-event reference count: the first
/// callback registered against an event acquires the native subscription,
/// the last one removed releases it. Hooks fire after a callback is inserted
/// and after it is removed, including removals forced by event
/// unregistration or scheduler teardown, so counts always unwind.
///
/// The scheduler holds handlers weakly. A dropped adapter simply stops
/// receiving hooks.
pub trait CustomEventHandler {
    /// Short label used in diagnostics.
    fn category_label(&self) -> &'static str;

    /// A callback was registered under this handler's category.
    fn on_callback_created(&self, id: CallbackId);

    /// A callback was removed from this handler's category.
    fn on_callback_destroyed(&self, id: CallbackId);
}
