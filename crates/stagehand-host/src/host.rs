//! Types and traits at the host application boundary.
//!
//! Everything here is deliberately opaque: the bridge needs identity and
//! display, never host semantics. Real embeddings implement
//! [`HostNotifier`] over the host SDK; tests use the simulated host.

use serde::Serialize;
use thiserror::Error;

/// Opaque handle to a node in the host scene graph.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct NodeHandle(pub u64);

/// A file the host is opening, saving, importing or exporting.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FileRef {
    /// Path as reported by the host.
    pub path: String,
    /// File format tag, for example `usd` or the host's native format.
    pub format: String,
}

impl FileRef {
    /// Builds a reference from anything string-like.
    pub fn new(path: impl Into<String>, format: impl Into<String>) -> FileRef {
        FileRef {
            path: path.into(),
            format: format.into(),
        }
    }
}

/// One end of a dependency-graph connection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PlugRef {
    /// Node owning the plug.
    pub node: NodeHandle,
    /// Attribute name on that node.
    pub attribute: String,
}

impl PlugRef {
    /// Builds a plug reference.
    pub fn new(node: NodeHandle, attribute: impl Into<String>) -> PlugRef {
        PlugRef {
            node,
            attribute: attribute.into(),
        }
    }
}

/// A point on the host timeline, in host time units.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct TimeSample(pub f64);

/// Receipt for one native subscription. Required to unsubscribe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct NativeHandle(pub u64);

/// Application lifecycle moments the host can report.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum SessionMoment {
    /// A new empty scene is about to be created.
    BeforeNew,
    /// A new empty scene was created.
    AfterNew,
    /// A scene file is about to be opened.
    BeforeOpen,
    /// A scene file finished opening.
    AfterOpen,
    /// The scene is about to be saved.
    BeforeSave,
    /// The scene was saved.
    AfterSave,
    /// A file is about to be imported into the scene.
    BeforeImport,
    /// A file import finished.
    AfterImport,
    /// A selection is about to be exported.
    BeforeExport,
    /// An export finished.
    AfterExport,
    /// The host application finished starting up.
    AppStarted,
    /// The host application is quitting.
    AppQuit,
}

/// Scene-graph node lifecycle changes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum NodeChange {
    /// A node entered the scene graph.
    Added,
    /// A node left the scene graph.
    Removed,
}

/// Failure reported by the host notification layer.
#[derive(Error, Debug)]
pub enum HostError {
    /// The host build lacks this notification primitive.
    #[error("host does not support this notification primitive")]
    UnsupportedPrimitive,

    /// The handle does not match a live subscription.
    #[error("unknown native subscription handle {0}")]
    UnknownHandle(u64),

    /// The host cannot register subscriptions right now.
    #[error("host notification service unavailable: {0}")]
    Unavailable(String),
}

/// The host's notification service, one subscription primitive per native
/// argument shape.
///
/// Subscribing is expensive on real hosts, so the adapter layer refcounts
/// and holds each primitive at most once per logical event. Implementations
/// must return a distinct [`NativeHandle`] per subscription and accept it
/// back in [`unsubscribe`](Self::unsubscribe).
pub trait HostNotifier {
    /// Notification with no arguments at `moment`.
    fn subscribe_session(
        &self,
        moment: SessionMoment,
        callback: Box<dyn Fn()>,
    ) -> Result<NativeHandle, HostError>;

    /// Vetoable notification at `moment`; a false return aborts the
    /// operation.
    fn subscribe_session_check(
        &self,
        moment: SessionMoment,
        callback: Box<dyn Fn() -> bool>,
    ) -> Result<NativeHandle, HostError>;

    /// File notification at `moment`.
    fn subscribe_file(
        &self,
        moment: SessionMoment,
        callback: Box<dyn Fn(&FileRef)>,
    ) -> Result<NativeHandle, HostError>;

    /// Vetoable file notification at `moment`.
    fn subscribe_file_check(
        &self,
        moment: SessionMoment,
        callback: Box<dyn Fn(&FileRef) -> bool>,
    ) -> Result<NativeHandle, HostError>;

    /// Node lifecycle notification for `change`.
    fn subscribe_node(
        &self,
        change: NodeChange,
        callback: Box<dyn Fn(&NodeHandle)>,
    ) -> Result<NativeHandle, HostError>;

    /// Node rename notification; the string argument is the previous name.
    fn subscribe_rename(
        &self,
        callback: Box<dyn Fn(&NodeHandle, &str)>,
    ) -> Result<NativeHandle, HostError>;

    /// Connection made or broken between two plugs; the flag is true when
    /// the connection was made.
    fn subscribe_connection(
        &self,
        callback: Box<dyn Fn(&PlugRef, &PlugRef, bool)>,
    ) -> Result<NativeHandle, HostError>;

    /// Timeline position change notification.
    fn subscribe_time(
        &self,
        callback: Box<dyn Fn(TimeSample)>,
    ) -> Result<NativeHandle, HostError>;

    /// Releases a subscription previously returned by a subscribe call.
    fn unsubscribe(&self, handle: NativeHandle) -> Result<(), HostError>;
}
