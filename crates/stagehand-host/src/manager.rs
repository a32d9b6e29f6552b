//! Typed registration facade over the scheduler and the host adapter.

use std::any::Any;
use std::rc::Rc;

use stagehand_events::{
    CallbackId, CallbackPayload, EventScheduler, LogSeverity, ScriptLanguage, UserData,
};

use crate::adapter::HostEventHandler;
use crate::host::{FileRef, NodeHandle, PlugRef, TimeSample};
use crate::shapes::{
    CallbackShape, ConnectionFn, FileCheckFn, FileFn, NodeFn, RenameFn, TimeFn,
};

/// Shape-checked registration surface for host events.
///
/// Each `register_*` method accepts exactly the closure signature its shape
/// delivers, so a file callback can never end up attached to a node event.
/// A mismatch logs through the scheduler's binding and returns
/// [`CallbackId::INVALID`] with nothing registered.
pub struct HostEventManager {
    scheduler: EventScheduler,
    adapter: Rc<HostEventHandler>,
}

impl HostEventManager {
    /// Builds the facade over an already-installed adapter.
    pub fn new(scheduler: &EventScheduler, adapter: Rc<HostEventHandler>) -> HostEventManager {
        HostEventManager {
            scheduler: scheduler.clone(),
            adapter,
        }
    }

    /// Registers a no-argument callback.
    pub fn register_basic<F>(
        &self,
        event: &str,
        tag: &str,
        weight: u32,
        user_data: Option<UserData>,
        f: F,
    ) -> CallbackId
    where
        F: Fn(Option<&dyn Any>) + 'static,
    {
        self.register_checked(
            event,
            tag,
            CallbackShape::Basic,
            CallbackPayload::Basic(Rc::new(f)),
            weight,
            user_data,
        )
    }

    /// Registers a no-argument vetoing callback.
    pub fn register_check<F>(
        &self,
        event: &str,
        tag: &str,
        weight: u32,
        user_data: Option<UserData>,
        f: F,
    ) -> CallbackId
    where
        F: Fn(Option<&dyn Any>) -> bool + 'static,
    {
        self.register_checked(
            event,
            tag,
            CallbackShape::Check,
            CallbackPayload::Decision(Rc::new(f)),
            weight,
            user_data,
        )
    }

    /// Registers a file callback.
    pub fn register_file<F>(
        &self,
        event: &str,
        tag: &str,
        weight: u32,
        user_data: Option<UserData>,
        f: F,
    ) -> CallbackId
    where
        F: Fn(&FileRef, Option<&dyn Any>) + 'static,
    {
        self.register_checked(
            event,
            tag,
            CallbackShape::File,
            CallbackPayload::Shaped(Rc::new(FileFn(Box::new(f)))),
            weight,
            user_data,
        )
    }

    /// Registers a vetoing file callback.
    pub fn register_file_check<F>(
        &self,
        event: &str,
        tag: &str,
        weight: u32,
        user_data: Option<UserData>,
        f: F,
    ) -> CallbackId
    where
        F: Fn(&FileRef, Option<&dyn Any>) -> bool + 'static,
    {
        self.register_checked(
            event,
            tag,
            CallbackShape::FileCheck,
            CallbackPayload::Shaped(Rc::new(FileCheckFn(Box::new(f)))),
            weight,
            user_data,
        )
    }

    /// Registers a node lifecycle callback.
    pub fn register_node<F>(
        &self,
        event: &str,
        tag: &str,
        weight: u32,
        user_data: Option<UserData>,
        f: F,
    ) -> CallbackId
    where
        F: Fn(&NodeHandle, Option<&dyn Any>) + 'static,
    {
        self.register_checked(
            event,
            tag,
            CallbackShape::Node,
            CallbackPayload::Shaped(Rc::new(NodeFn(Box::new(f)))),
            weight,
            user_data,
        )
    }

    /// Registers a rename callback; it receives the node and its previous
    /// name.
    pub fn register_rename<F>(
        &self,
        event: &str,
        tag: &str,
        weight: u32,
        user_data: Option<UserData>,
        f: F,
    ) -> CallbackId
    where
        F: Fn(&NodeHandle, &str, Option<&dyn Any>) + 'static,
    {
        self.register_checked(
            event,
            tag,
            CallbackShape::Rename,
            CallbackPayload::Shaped(Rc::new(RenameFn(Box::new(f)))),
            weight,
            user_data,
        )
    }

    /// Registers a connection-change callback.
    pub fn register_connection<F>(
        &self,
        event: &str,
        tag: &str,
        weight: u32,
        user_data: Option<UserData>,
        f: F,
    ) -> CallbackId
    where
        F: Fn(&PlugRef, &PlugRef, bool, Option<&dyn Any>) + 'static,
    {
        self.register_checked(
            event,
            tag,
            CallbackShape::Connection,
            CallbackPayload::Shaped(Rc::new(ConnectionFn(Box::new(f)))),
            weight,
            user_data,
        )
    }

    /// Registers a timeline callback.
    pub fn register_time<F>(
        &self,
        event: &str,
        tag: &str,
        weight: u32,
        user_data: Option<UserData>,
        f: F,
    ) -> CallbackId
    where
        F: Fn(TimeSample, Option<&dyn Any>) + 'static,
    {
        self.register_checked(
            event,
            tag,
            CallbackShape::Time,
            CallbackPayload::Shaped(Rc::new(TimeFn(Box::new(f)))),
            weight,
            user_data,
        )
    }

    /// Registers a scripted callback. Scripts fit any event shape; native
    /// arguments are not forwarded into the snippet.
    pub fn register_script(
        &self,
        event: &str,
        tag: &str,
        weight: u32,
        language: ScriptLanguage,
        source: &str,
    ) -> CallbackId {
        self.scheduler.register_callback_by_name(
            event,
            tag,
            CallbackPayload::Script {
                language,
                source: source.to_string(),
            },
            weight,
            None,
        )
    }

    /// Unregisters any callback previously returned by this facade.
    pub fn unregister(&self, id: CallbackId) -> bool {
        self.scheduler.unregister_callback(id)
    }

    fn register_checked(
        &self,
        event_name: &str,
        tag: &str,
        shape: CallbackShape,
        payload: CallbackPayload,
        weight: u32,
        user_data: Option<UserData>,
    ) -> CallbackId {
        let event = self.scheduler.event_id(event_name);
        if !event.is_valid() {
            self.reject(tag, event_name, "no such event");
            return CallbackId::INVALID;
        }
        match self.adapter.declared_shape(event) {
            Some(declared) if declared == shape => {
                self.scheduler
                    .register_callback(event, tag, payload, weight, user_data)
            }
            Some(declared) => {
                self.reject(
                    tag,
                    event_name,
                    &format!("event delivers {declared} arguments, callback expects {shape}"),
                );
                CallbackId::INVALID
            }
            None => {
                self.reject(tag, event_name, "not a host event");
                CallbackId::INVALID
            }
        }
    }

    fn reject(&self, tag: &str, event_name: &str, reason: &str) {
        self.scheduler.binding().log(
            LogSeverity::Error,
            &format!("cannot register '{tag}' on '{event_name}': {reason}"),
        );
    }
}
