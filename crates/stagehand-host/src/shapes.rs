//! Argument shapes for host-bridged callbacks.
//!
//! Each shaped payload is a nameable newtype over the matching closure,
//! stored type-erased inside [`CallbackPayload::Shaped`]. The adapter's
//! binder closures and the facade agree on these wrapper types through
//! downcasts, so a mismatch is caught at registration rather than at fire
//! time.
//!
//! [`CallbackPayload::Shaped`]: stagehand_events::CallbackPayload::Shaped

use std::any::Any;
use std::fmt;

use serde::Serialize;

use crate::host::{FileRef, NodeHandle, PlugRef, TimeSample};

/// Argument shape a host event delivers to its callbacks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum CallbackShape {
    /// No arguments.
    Basic,
    /// No arguments, boolean vote.
    Check,
    /// The file being processed.
    File,
    /// The file being processed, boolean vote.
    FileCheck,
    /// The node entering or leaving the scene graph.
    Node,
    /// The node plus its previous name.
    Rename,
    /// Source plug, destination plug and a made/broken flag.
    Connection,
    /// The new timeline position.
    Time,
}

impl fmt::Display for CallbackShape {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            CallbackShape::Basic => "basic",
            CallbackShape::Check => "check",
            CallbackShape::File => "file",
            CallbackShape::FileCheck => "file-check",
            CallbackShape::Node => "node",
            CallbackShape::Rename => "rename",
            CallbackShape::Connection => "connection",
            CallbackShape::Time => "time",
        };
        f.write_str(label)
    }
}

/// File-shaped callback body.
pub struct FileFn(pub Box<dyn Fn(&FileRef, Option<&dyn Any>)>);

/// Vetoable file-shaped callback body.
pub struct FileCheckFn(pub Box<dyn Fn(&FileRef, Option<&dyn Any>) -> bool>);

/// Node-shaped callback body.
pub struct NodeFn(pub Box<dyn Fn(&NodeHandle, Option<&dyn Any>)>);

/// Rename-shaped callback body; the string is the node's previous name.
pub struct RenameFn(pub Box<dyn Fn(&NodeHandle, &str, Option<&dyn Any>)>);

/// Connection-shaped callback body; the flag is true when the connection
/// was made.
pub struct ConnectionFn(pub Box<dyn Fn(&PlugRef, &PlugRef, bool, Option<&dyn Any>)>);

/// Time-shaped callback body.
pub struct TimeFn(pub Box<dyn Fn(TimeSample, Option<&dyn Any>)>);
