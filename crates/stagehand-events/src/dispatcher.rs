//! Per-event callback storage and ordering.

use serde::Serialize;
use tracing::trace;

use crate::callback::{Callback, CallbackPayload, UserData};
use crate::ids::{make_callback_id, CallbackId, EventCategory, EventId, SEQUENCE_MASK};

/// Owns the weight-ordered callback list for one named event.
///
/// The list is kept sorted by non-decreasing weight at all times; callbacks
/// with equal weight stay in registration order. Dispatch never walks the
/// live list directly, it works off a point-in-time snapshot taken by the
/// scheduler.
#[derive(Clone)]
pub struct EventDispatcher {
    id: EventId,
    name: String,
    category: EventCategory,
    parent: CallbackId,
    next_sequence: u64,
    callbacks: Vec<Callback>,
}

impl EventDispatcher {
    pub(crate) fn new(
        id: EventId,
        name: impl Into<String>,
        category: EventCategory,
        parent: CallbackId,
    ) -> EventDispatcher {
        EventDispatcher {
            id,
            name: name.into(),
            category,
            parent,
            next_sequence: 1,
            callbacks: Vec::new(),
        }
    }

    /// Event id.
    pub fn id(&self) -> EventId {
        self.id
    }

    /// Registered name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Owning category.
    pub fn category(&self) -> EventCategory {
        self.category
    }

    /// Callback that spawned this event, or [`CallbackId::INVALID`] for
    /// top-level events.
    pub fn parent_callback(&self) -> CallbackId {
        self.parent
    }

    /// Registers a callback and returns its packed id.
    ///
    /// Returns [`CallbackId::INVALID`] once the per-event sequence space is
    /// exhausted. Sequences are never reused, so a stale id can never alias
    /// a newer registration.
    pub fn insert(
        &mut self,
        tag: &str,
        payload: CallbackPayload,
        weight: u32,
        user_data: Option<UserData>,
    ) -> CallbackId {
        let sequence = self.next_sequence;
        if sequence > SEQUENCE_MASK {
            return CallbackId::INVALID;
        }
        self.next_sequence += 1;

        let id = make_callback_id(sequence, self.category, self.id);
        self.callbacks
            .push(Callback::new(id, tag, weight, user_data, payload));
        // sort_by_key is stable, so equal weights keep registration order
        self.callbacks.sort_by_key(Callback::weight);

        trace!(event = %self.name, callback = id.raw(), weight, "callback registered");
        id
    }

    /// Removes a callback by id. Returns false when the id is not present.
    pub fn remove(&mut self, id: CallbackId) -> bool {
        let before = self.callbacks.len();
        self.callbacks.retain(|c| c.id() != id);
        let removed = self.callbacks.len() != before;
        if removed {
            trace!(event = %self.name, callback = id.raw(), "callback removed");
        }
        removed
    }

    /// Looks up a live callback by id.
    pub fn find(&self, id: CallbackId) -> Option<&Callback> {
        self.callbacks.iter().find(|c| c.id() == id)
    }

    /// True while the id refers to a live callback.
    pub fn contains(&self, id: CallbackId) -> bool {
        self.find(id).is_some()
    }

    /// Number of live callbacks.
    pub fn len(&self) -> usize {
        self.callbacks.len()
    }

    /// True when no callbacks are registered.
    pub fn is_empty(&self) -> bool {
        self.callbacks.is_empty()
    }

    /// Read-only view of the callbacks in dispatch order.
    pub fn callbacks(&self) -> &[Callback] {
        &self.callbacks
    }

    /// Point-in-time copy of the dispatch list. Payloads are
    /// reference-counted, so this clones handles, not bodies.
    pub(crate) fn snapshot(&self) -> Vec<Callback> {
        self.callbacks.clone()
    }

    /// Ids of every live callback, collected before teardown.
    pub(crate) fn ids(&self) -> Vec<CallbackId> {
        self.callbacks.iter().map(Callback::id).collect()
    }

    /// Diagnostic snapshot of this event.
    pub fn info(&self) -> EventInfo {
        EventInfo {
            id: self.id,
            name: self.name.clone(),
            category: self.category,
            parent: self.parent.is_valid().then_some(self.parent),
            callback_count: self.callbacks.len(),
        }
    }
}

/// Serializable snapshot of one event, for diagnostics.
#[derive(Debug, Clone, Serialize)]
pub struct EventInfo {
    /// Event id.
    pub id: EventId,
    /// Registered name.
    pub name: String,
    /// Owning category.
    pub category: EventCategory,
    /// Parent callback, absent for top-level events.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub parent: Option<CallbackId>,
    /// Number of live callbacks.
    pub callback_count: usize,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ids::{extract_category, extract_event_id, extract_sequence};
    use std::rc::Rc;

    fn dispatcher() -> EventDispatcher {
        EventDispatcher::new(
            EventId(4),
            "NodeAdded",
            EventCategory::Host,
            CallbackId::INVALID,
        )
    }

    fn noop() -> CallbackPayload {
        CallbackPayload::Basic(Rc::new(|_| {}))
    }

    #[test]
    fn callbacks_sort_by_weight() {
        let mut d = dispatcher();
        d.insert("third", noop(), 30, None);
        d.insert("first", noop(), 10, None);
        d.insert("second", noop(), 20, None);

        let tags: Vec<&str> = d.callbacks().iter().map(Callback::tag).collect();
        assert_eq!(tags, vec!["first", "second", "third"]);
    }

    #[test]
    fn equal_weights_keep_registration_order() {
        let mut d = dispatcher();
        d.insert("a", noop(), 10, None);
        d.insert("b", noop(), 10, None);
        d.insert("c", noop(), 5, None);
        d.insert("d", noop(), 10, None);

        let tags: Vec<&str> = d.callbacks().iter().map(Callback::tag).collect();
        assert_eq!(tags, vec!["c", "a", "b", "d"]);
    }

    #[test]
    fn issued_ids_embed_event_and_category() {
        let mut d = dispatcher();
        let id = d.insert("x", noop(), 1, None);
        assert_eq!(extract_event_id(id), EventId(4));
        assert_eq!(extract_category(id), EventCategory::Host);
        assert_eq!(extract_sequence(id), 1);
    }

    #[test]
    fn remove_reports_whether_anything_went_away() {
        let mut d = dispatcher();
        let id = d.insert("x", noop(), 1, None);
        assert!(d.contains(id));
        assert!(d.remove(id));
        assert!(!d.contains(id));
        assert!(!d.remove(id));
        assert!(d.is_empty());
    }

    #[test]
    fn sequences_are_never_reused() {
        let mut d = dispatcher();
        let first = d.insert("x", noop(), 1, None);
        assert!(d.remove(first));
        let second = d.insert("x", noop(), 1, None);
        assert_ne!(first, second);
        assert!(extract_sequence(second) > extract_sequence(first));
    }

    #[test]
    fn exhausted_sequence_space_yields_the_invalid_id() {
        let mut d = dispatcher();
        d.next_sequence = SEQUENCE_MASK + 1;
        assert_eq!(d.insert("x", noop(), 1, None), CallbackId::INVALID);
        assert!(d.is_empty());
    }

    #[test]
    fn info_counts_live_callbacks() {
        let mut d = dispatcher();
        d.insert("a", noop(), 1, None);
        d.insert("b", noop(), 2, None);
        let info = d.info();
        assert_eq!(info.name, "NodeAdded");
        assert_eq!(info.callback_count, 2);
        assert!(info.parent.is_none());
    }
}
