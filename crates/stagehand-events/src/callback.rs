//! Callback records and their payload forms.

use std::any::Any;
use std::fmt;
use std::rc::Rc;

use serde::Serialize;

use crate::ids::CallbackId;

/// Opaque client state handed back on every invocation.
pub type UserData = Rc<dyn Any>;

/// Languages a scripted callback may be written in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ScriptLanguage {
    /// Rune snippet, run through the binding's Rune runtime.
    Rune,
    /// Lua snippet, run through the binding's Lua runtime.
    Lua,
}

impl fmt::Display for ScriptLanguage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ScriptLanguage::Rune => f.write_str("rune"),
            ScriptLanguage::Lua => f.write_str("lua"),
        }
    }
}

/// What runs when a callback fires.
#[derive(Clone)]
pub enum CallbackPayload {
    /// Plain notification with no host arguments.
    Basic(Rc<dyn Fn(Option<&dyn Any>)>),
    /// Boolean vote consumed by the check and filter protocols.
    Decision(Rc<dyn Fn(Option<&dyn Any>) -> bool>),
    /// Adapter-defined argument shape. Only the owning adapter's binder
    /// knows the concrete type behind the `Any`.
    Shaped(Rc<dyn Any>),
    /// Source text run through the scheduler's script binding.
    Script {
        /// Runtime the snippet targets.
        language: ScriptLanguage,
        /// The snippet itself.
        source: String,
    },
}

impl CallbackPayload {
    /// Short label for logs and info records.
    pub fn kind(&self) -> &'static str {
        match self {
            CallbackPayload::Basic(_) => "basic",
            CallbackPayload::Decision(_) => "decision",
            CallbackPayload::Shaped(_) => "shaped",
            CallbackPayload::Script { .. } => "script",
        }
    }
}

impl fmt::Debug for CallbackPayload {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CallbackPayload::Script { language, .. } => write!(f, "Script({language})"),
            other => f.write_str(other.kind()),
        }
    }
}

/// One client registration against an event.
///
/// Owned exclusively by the event's dispatcher. Everything handed out to
/// clients is either the id or a cloned snapshot; the payload itself is
/// reference-counted, so snapshots are cheap.
#[derive(Clone)]
pub struct Callback {
    id: CallbackId,
    tag: String,
    weight: u32,
    user_data: Option<UserData>,
    payload: CallbackPayload,
}

impl Callback {
    pub(crate) fn new(
        id: CallbackId,
        tag: impl Into<String>,
        weight: u32,
        user_data: Option<UserData>,
        payload: CallbackPayload,
    ) -> Callback {
        Callback {
            id,
            tag: tag.into(),
            weight,
            user_data,
            payload,
        }
    }

    /// Packed id of this callback.
    pub fn id(&self) -> CallbackId {
        self.id
    }

    /// Human-readable tag identifying who registered the callback.
    pub fn tag(&self) -> &str {
        &self.tag
    }

    /// Dispatch weight. Lower weights fire earlier.
    pub fn weight(&self) -> u32 {
        self.weight
    }

    /// Client state passed back on every invocation.
    pub fn user_data(&self) -> Option<&dyn Any> {
        self.user_data.as_deref()
    }

    /// The payload this callback runs.
    pub fn payload(&self) -> &CallbackPayload {
        &self.payload
    }

    /// Downcasts a shaped payload to the adapter's wrapper type.
    pub fn shaped<T: 'static>(&self) -> Option<&T> {
        match &self.payload {
            CallbackPayload::Shaped(any) => any.downcast_ref::<T>(),
            _ => None,
        }
    }

    /// True when the payload is script source rather than native code.
    pub fn is_script(&self) -> bool {
        matches!(self.payload, CallbackPayload::Script { .. })
    }
}

impl fmt::Debug for Callback {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Callback")
            .field("id", &self.id.raw())
            .field("tag", &self.tag)
            .field("weight", &self.weight)
            .field("payload", &self.payload)
            .finish()
    }
}

/// Serializable snapshot of one callback, for diagnostics.
#[derive(Debug, Clone, Serialize)]
pub struct CallbackInfo {
    /// Packed callback id.
    pub id: CallbackId,
    /// Client-supplied tag.
    pub tag: String,
    /// Dispatch weight.
    pub weight: u32,
    /// Payload form: `basic`, `decision`, `shaped` or `script`.
    pub kind: &'static str,
    /// Script language, present only for scripted callbacks.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub language: Option<ScriptLanguage>,
}

impl From<&Callback> for CallbackInfo {
    fn from(callback: &Callback) -> CallbackInfo {
        let language = match callback.payload() {
            CallbackPayload::Script { language, .. } => Some(*language),
            _ => None,
        };
        CallbackInfo {
            id: callback.id(),
            tag: callback.tag().to_string(),
            weight: callback.weight(),
            kind: callback.payload().kind(),
            language,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ids::{make_callback_id, EventCategory, EventId};

    fn sample_id() -> CallbackId {
        make_callback_id(1, EventCategory::Custom, EventId(1))
    }

    #[test]
    fn user_data_is_handed_back_by_reference() {
        let data: UserData = Rc::new(42u32);
        let callback = Callback::new(
            sample_id(),
            "with-data",
            10,
            Some(data),
            CallbackPayload::Basic(Rc::new(|_| {})),
        );
        let value = callback
            .user_data()
            .and_then(|d| d.downcast_ref::<u32>())
            .copied();
        assert_eq!(value, Some(42));
    }

    #[test]
    fn shaped_downcast_requires_the_right_type() {
        struct Wrapper(#[allow(dead_code)] u8);
        let callback = Callback::new(
            sample_id(),
            "shaped",
            10,
            None,
            CallbackPayload::Shaped(Rc::new(Wrapper(7))),
        );
        assert!(callback.shaped::<Wrapper>().is_some());
        assert!(callback.shaped::<String>().is_none());
    }

    #[test]
    fn info_reflects_the_payload_kind() {
        let callback = Callback::new(
            sample_id(),
            "lua-hook",
            5,
            None,
            CallbackPayload::Script {
                language: ScriptLanguage::Lua,
                source: "return true".to_string(),
            },
        );
        assert!(callback.is_script());
        let info = CallbackInfo::from(&callback);
        assert_eq!(info.kind, "script");
        assert_eq!(info.language, Some(ScriptLanguage::Lua));
        assert_eq!(info.tag, "lua-hook");

        let json = serde_json::to_value(&info).unwrap();
        assert_eq!(json["language"], "lua");
    }
}
