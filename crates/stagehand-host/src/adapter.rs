//! Bridges scheduler events onto native host subscriptions.

use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

use tracing::{debug, error, warn};

use stagehand_events::{
    extract_event_id, CallbackId, CustomEventHandler, EventCategory, EventId, EventScheduler,
};

use crate::host::{HostError, HostNotifier, NativeHandle, NodeChange, SessionMoment};
use crate::shapes::{
    CallbackShape, ConnectionFn, FileCheckFn, FileFn, NodeFn, RenameFn, TimeFn,
};

/// Which native primitive backs a logical event.
#[derive(Debug, Clone, Copy)]
enum Primitive {
    Session(SessionMoment),
    SessionCheck(SessionMoment),
    File(SessionMoment),
    FileCheck(SessionMoment),
    Node(NodeChange),
    Rename,
    Connection,
    Time,
}

impl Primitive {
    fn shape(self) -> CallbackShape {
        match self {
            Primitive::Session(_) => CallbackShape::Basic,
            Primitive::SessionCheck(_) => CallbackShape::Check,
            Primitive::File(_) => CallbackShape::File,
            Primitive::FileCheck(_) => CallbackShape::FileCheck,
            Primitive::Node(_) => CallbackShape::Node,
            Primitive::Rename => CallbackShape::Rename,
            Primitive::Connection => CallbackShape::Connection,
            Primitive::Time => CallbackShape::Time,
        }
    }
}

// The fixed catalog of logical host events. BeforeSave and BeforeSaveCheck
// share a moment on purpose: hosts raise both an observer and a veto
// notification around a save.
const CATALOG: &[(&str, Primitive)] = &[
    ("BeforeNew", Primitive::Session(SessionMoment::BeforeNew)),
    ("AfterNew", Primitive::Session(SessionMoment::AfterNew)),
    ("BeforeOpenCheck", Primitive::FileCheck(SessionMoment::BeforeOpen)),
    ("AfterOpen", Primitive::File(SessionMoment::AfterOpen)),
    ("BeforeSave", Primitive::Session(SessionMoment::BeforeSave)),
    ("BeforeSaveCheck", Primitive::SessionCheck(SessionMoment::BeforeSave)),
    ("AfterSave", Primitive::File(SessionMoment::AfterSave)),
    ("BeforeImport", Primitive::Session(SessionMoment::BeforeImport)),
    ("AfterImport", Primitive::Session(SessionMoment::AfterImport)),
    ("BeforeExport", Primitive::Session(SessionMoment::BeforeExport)),
    ("AfterExport", Primitive::Session(SessionMoment::AfterExport)),
    ("HostInitialized", Primitive::Session(SessionMoment::AppStarted)),
    ("HostExiting", Primitive::Session(SessionMoment::AppQuit)),
    ("NodeAdded", Primitive::Node(NodeChange::Added)),
    ("NodeRemoved", Primitive::Node(NodeChange::Removed)),
    ("NodeRenamed", Primitive::Rename),
    ("ConnectionChanged", Primitive::Connection),
    ("TimeChanged", Primitive::Time),
];

struct EventRecord {
    primitive: Primitive,
    ref_count: usize,
    handle: Option<NativeHandle>,
}

/// Multiplexes scheduler callbacks onto native host subscriptions.
///
/// Construction registers the full logical event catalog with the scheduler
/// under [`EventCategory::Host`]. No native subscription exists until the
/// first callback arrives on an event; removing the last callback releases
/// it again. The transitions are guarded, so duplicate or out-of-order
/// lifecycle hooks can never double-subscribe or double-release.
pub struct HostEventHandler {
    scheduler: EventScheduler,
    notifier: Rc<dyn HostNotifier>,
    records: RefCell<HashMap<EventId, EventRecord>>,
}

impl HostEventHandler {
    /// Registers the host event catalog and returns the adapter, already
    /// installed as the scheduler's handler for the host category.
    pub fn new(scheduler: &EventScheduler, notifier: Rc<dyn HostNotifier>) -> Rc<HostEventHandler> {
        let mut records = HashMap::with_capacity(CATALOG.len());
        for (name, primitive) in CATALOG {
            let id = scheduler.register_event(name, EventCategory::Host);
            if !id.is_valid() {
                error!(event = name, "could not register host event");
                continue;
            }
            records.insert(
                id,
                EventRecord {
                    primitive: *primitive,
                    ref_count: 0,
                    handle: None,
                },
            );
        }
        let handler = Rc::new(HostEventHandler {
            scheduler: scheduler.clone(),
            notifier,
            records: RefCell::new(records),
        });
        scheduler.register_handler(EventCategory::Host, &handler);
        handler
    }

    /// Shape of the arguments `event` delivers, when it is one of the
    /// catalog events this adapter owns.
    pub fn declared_shape(&self, event: EventId) -> Option<CallbackShape> {
        self.records
            .borrow()
            .get(&event)
            .map(|record| record.primitive.shape())
    }

    /// Number of native subscriptions currently held.
    pub fn live_subscriptions(&self) -> usize {
        self.records
            .borrow()
            .values()
            .filter(|record| record.handle.is_some())
            .count()
    }

    // 0 -> 1 transition: acquire the native subscription for `event`.
    fn subscribe(&self, event: EventId) {
        let primitive = {
            let records = self.records.borrow();
            let Some(record) = records.get(&event) else {
                return;
            };
            if record.handle.is_some() {
                return;
            }
            record.primitive
        };
        match self.attach(event, primitive) {
            Ok(handle) => {
                debug!(event = event.raw(), handle = handle.0, "native subscription acquired");
                if let Some(record) = self.records.borrow_mut().get_mut(&event) {
                    record.handle = Some(handle);
                }
            }
            Err(err) => {
                // worst case this event never fires; the refcount stays
                // intact so a later registration retries
                error!(event = event.raw(), %err, "native subscription failed");
            }
        }
    }

    // Builds the binder closure for the event's shape and hands it to the
    // notifier. Binders do nothing but repackage native arguments into
    // trigger calls.
    fn attach(&self, event: EventId, primitive: Primitive) -> Result<NativeHandle, HostError> {
        let scheduler = self.scheduler.clone();
        match primitive {
            Primitive::Session(moment) => self
                .notifier
                .subscribe_session(moment, Box::new(move || scheduler.trigger(event))),
            Primitive::SessionCheck(moment) => self.notifier.subscribe_session_check(
                moment,
                Box::new(move || scheduler.trigger_check(event)),
            ),
            Primitive::File(moment) => self.notifier.subscribe_file(
                moment,
                Box::new(move |file| {
                    scheduler.trigger_with(event, |callback| match callback.shaped::<FileFn>() {
                        Some(FileFn(f)) => f(file, callback.user_data()),
                        None => warn!(tag = callback.tag(), "callback does not match the file shape"),
                    });
                }),
            ),
            Primitive::FileCheck(moment) => self.notifier.subscribe_file_check(
                moment,
                Box::new(move |file| {
                    scheduler.trigger_check_with(event, |callback| {
                        match callback.shaped::<FileCheckFn>() {
                            Some(FileCheckFn(f)) => f(file, callback.user_data()),
                            None => {
                                warn!(tag = callback.tag(), "callback does not match the file-check shape");
                                true
                            }
                        }
                    })
                }),
            ),
            Primitive::Node(change) => self.notifier.subscribe_node(
                change,
                Box::new(move |node| {
                    scheduler.trigger_with(event, |callback| match callback.shaped::<NodeFn>() {
                        Some(NodeFn(f)) => f(node, callback.user_data()),
                        None => warn!(tag = callback.tag(), "callback does not match the node shape"),
                    });
                }),
            ),
            Primitive::Rename => self.notifier.subscribe_rename(Box::new(move |node, previous| {
                scheduler.trigger_with(event, |callback| match callback.shaped::<RenameFn>() {
                    Some(RenameFn(f)) => f(node, previous, callback.user_data()),
                    None => warn!(tag = callback.tag(), "callback does not match the rename shape"),
                });
            })),
            Primitive::Connection => {
                self.notifier
                    .subscribe_connection(Box::new(move |source, destination, made| {
                        scheduler.trigger_with(event, |callback| {
                            match callback.shaped::<ConnectionFn>() {
                                Some(ConnectionFn(f)) => {
                                    f(source, destination, made, callback.user_data())
                                }
                                None => warn!(
                                    tag = callback.tag(),
                                    "callback does not match the connection shape"
                                ),
                            }
                        });
                    }))
            }
            Primitive::Time => self.notifier.subscribe_time(Box::new(move |time| {
                scheduler.trigger_with(event, |callback| match callback.shaped::<TimeFn>() {
                    Some(TimeFn(f)) => f(time, callback.user_data()),
                    None => warn!(tag = callback.tag(), "callback does not match the time shape"),
                });
            })),
        }
    }

    // 1 -> 0 transition: release the native subscription for `event`.
    fn release(&self, event: EventId) {
        let handle = {
            let mut records = self.records.borrow_mut();
            let Some(record) = records.get_mut(&event) else {
                return;
            };
            record.handle.take()
        };
        let Some(handle) = handle else {
            return;
        };
        debug!(event = event.raw(), handle = handle.0, "native subscription released");
        if let Err(err) = self.notifier.unsubscribe(handle) {
            error!(event = event.raw(), %err, "native unsubscribe failed");
        }
    }
}

impl CustomEventHandler for HostEventHandler {
    fn category_label(&self) -> &'static str {
        "host"
    }

    fn on_callback_created(&self, id: CallbackId) {
        let event = extract_event_id(id);
        let needs_subscribe = {
            let mut records = self.records.borrow_mut();
            let Some(record) = records.get_mut(&event) else {
                return;
            };
            record.ref_count += 1;
            // handle presence is the real guard; a failed acquire gets
            // retried by the next registration
            record.handle.is_none()
        };
        if needs_subscribe {
            self.subscribe(event);
        }
    }

    fn on_callback_destroyed(&self, id: CallbackId) {
        let event = extract_event_id(id);
        let needs_release = {
            let mut records = self.records.borrow_mut();
            let Some(record) = records.get_mut(&event) else {
                return;
            };
            record.ref_count = record.ref_count.saturating_sub(1);
            record.ref_count == 0 && record.handle.is_some()
        };
        if needs_release {
            self.release(event);
        }
    }
}

impl Drop for HostEventHandler {
    fn drop(&mut self) {
        let held: Vec<(EventId, NativeHandle)> = self
            .records
            .borrow_mut()
            .iter_mut()
            .filter_map(|(event, record)| record.handle.take().map(|handle| (*event, handle)))
            .collect();
        for (event, handle) in held {
            debug!(event = event.raw(), handle = handle.0, "releasing subscription at teardown");
            if let Err(err) = self.notifier.unsubscribe(handle) {
                error!(event = event.raw(), %err, "native unsubscribe failed during teardown");
            }
        }
    }
}
