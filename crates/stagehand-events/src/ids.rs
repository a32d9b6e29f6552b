//! Packed identifiers for events and callbacks.
//!
//! Every callback id embeds the id of the event it was registered against,
//! the event's category, and a per-event sequence number:
//!
//! ```text
//! bit 63         48 47       40 39                                      0
//!     +------------+-----------+-----------------------------------------+
//!     |  event id  | category  |  sequence                               |
//!     +------------+-----------+-----------------------------------------+
//! ```
//!
//! Extraction is pure arithmetic on the id value, so routing an
//! unregistration to the owning dispatcher never touches registry state and
//! keeps working after the callback, or the whole event, is gone.

use serde::{Deserialize, Serialize};

/// Identifier of a registered event. Zero is never a live event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct EventId(pub u16);

impl EventId {
    /// Sentinel returned when event registration fails.
    pub const INVALID: EventId = EventId(0);

    /// True for anything other than the invalid sentinel.
    pub fn is_valid(self) -> bool {
        self.0 != 0
    }

    /// Raw numeric value.
    pub fn raw(self) -> u16 {
        self.0
    }
}

/// Identifier of a registered callback. Zero is never a live callback.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct CallbackId(pub u64);

impl CallbackId {
    /// Sentinel returned when callback registration fails.
    pub const INVALID: CallbackId = CallbackId(0);

    /// True for anything other than the invalid sentinel.
    pub fn is_valid(self) -> bool {
        self.0 != 0
    }

    /// Raw numeric value.
    pub fn raw(self) -> u64 {
        self.0
    }
}

/// Which part of the system owns an event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(u8)]
pub enum EventCategory {
    /// Decoded from an out-of-range raw value.
    Unknown = 0,
    /// Events created at runtime by clients.
    Custom = 1,
    /// Events raised by schema translators.
    Schema = 2,
    /// Events mirroring native host application notifications.
    Host = 3,
    /// Events owned by external plugins.
    Plugin = 4,
}

impl EventCategory {
    /// Decodes a raw category byte. Out-of-range values map to `Unknown`
    /// rather than failing, since ids may outlive the code that minted them.
    pub fn from_raw(raw: u8) -> EventCategory {
        match raw {
            1 => EventCategory::Custom,
            2 => EventCategory::Schema,
            3 => EventCategory::Host,
            4 => EventCategory::Plugin,
            _ => EventCategory::Unknown,
        }
    }
}

const EVENT_SHIFT: u32 = 48;
const CATEGORY_SHIFT: u32 = 40;
const SEQUENCE_BITS: u32 = 40;

/// Low bits of a callback id holding the per-event sequence number.
pub const SEQUENCE_MASK: u64 = (1 << SEQUENCE_BITS) - 1;

/// Weight used when a client does not care about ordering.
pub const DEFAULT_WEIGHT: u32 = 1_000;

/// Weights at or above this value are reserved for bridge-internal callbacks
/// that must run after general-purpose client callbacks.
pub const PLUGIN_WEIGHT_BAND: u32 = 0x0010_0000;

/// Packs an event id, category and sequence number into a callback id.
///
/// The sequence is truncated to its low 40 bits; the scheduler never issues
/// sequences that large.
pub fn make_callback_id(sequence: u64, category: EventCategory, event: EventId) -> CallbackId {
    CallbackId(
        (u64::from(event.0) << EVENT_SHIFT)
            | ((category as u64) << CATEGORY_SHIFT)
            | (sequence & SEQUENCE_MASK),
    )
}

/// Recovers the owning event id from a callback id.
pub fn extract_event_id(id: CallbackId) -> EventId {
    EventId((id.0 >> EVENT_SHIFT) as u16)
}

/// Recovers the category from a callback id.
pub fn extract_category(id: CallbackId) -> EventCategory {
    EventCategory::from_raw((id.0 >> CATEGORY_SHIFT) as u8)
}

/// Recovers the per-event sequence number from a callback id.
pub fn extract_sequence(id: CallbackId) -> u64 {
    id.0 & SEQUENCE_MASK
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn invalid_sentinels_are_zero() {
        assert_eq!(EventId::INVALID.raw(), 0);
        assert_eq!(CallbackId::INVALID.raw(), 0);
        assert!(!EventId::INVALID.is_valid());
        assert!(!CallbackId::INVALID.is_valid());
        assert!(EventId(1).is_valid());
        assert!(CallbackId(1).is_valid());
    }

    #[test]
    fn fields_land_in_disjoint_bit_ranges() {
        let id = make_callback_id(7, EventCategory::Host, EventId(3));
        assert_eq!(extract_event_id(id), EventId(3));
        assert_eq!(extract_category(id), EventCategory::Host);
        assert_eq!(extract_sequence(id), 7);
    }

    #[test]
    fn extraction_works_at_the_field_extremes() {
        let id = make_callback_id(SEQUENCE_MASK, EventCategory::Plugin, EventId(u16::MAX));
        assert_eq!(extract_event_id(id), EventId(u16::MAX));
        assert_eq!(extract_category(id), EventCategory::Plugin);
        assert_eq!(extract_sequence(id), SEQUENCE_MASK);
    }

    #[test]
    fn oversized_sequences_are_truncated() {
        let id = make_callback_id(SEQUENCE_MASK + 5, EventCategory::Custom, EventId(1));
        assert_eq!(extract_sequence(id), 4);
        assert_eq!(extract_event_id(id), EventId(1));
    }

    #[test]
    fn out_of_range_categories_decode_as_unknown() {
        assert_eq!(EventCategory::from_raw(0), EventCategory::Unknown);
        assert_eq!(EventCategory::from_raw(5), EventCategory::Unknown);
        assert_eq!(EventCategory::from_raw(200), EventCategory::Unknown);
        assert_eq!(EventCategory::from_raw(3), EventCategory::Host);
    }

    proptest! {
        #[test]
        fn round_trips_every_in_range_triple(
            sequence in 0u64..=SEQUENCE_MASK,
            raw_category in 0u8..=4,
            event in 0u16..=u16::MAX,
        ) {
            let category = EventCategory::from_raw(raw_category);
            let id = make_callback_id(sequence, category, EventId(event));
            prop_assert_eq!(extract_event_id(id), EventId(event));
            prop_assert_eq!(extract_category(id), category);
            prop_assert_eq!(extract_sequence(id), sequence);
        }
    }
}
