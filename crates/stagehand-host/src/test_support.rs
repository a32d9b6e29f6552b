//! In-memory host used by tests and the demo example.

use std::cell::{Cell, RefCell};
use std::collections::HashMap;
use std::rc::Rc;

use crate::host::{
    FileRef, HostError, HostNotifier, NativeHandle, NodeChange, NodeHandle, PlugRef,
    SessionMoment, TimeSample,
};

enum Subscription {
    Session(SessionMoment, Rc<dyn Fn()>),
    SessionCheck(SessionMoment, Rc<dyn Fn() -> bool>),
    File(SessionMoment, Rc<dyn Fn(&FileRef)>),
    FileCheck(SessionMoment, Rc<dyn Fn(&FileRef) -> bool>),
    Node(NodeChange, Rc<dyn Fn(&NodeHandle)>),
    Rename(Rc<dyn Fn(&NodeHandle, &str)>),
    Connection(Rc<dyn Fn(&PlugRef, &PlugRef, bool)>),
    Time(Rc<dyn Fn(TimeSample)>),
}

/// Scriptable stand-in for a real host's notification service.
///
/// Subscriptions live in plain tables and the `emit_*` drivers call them
/// the way the host main loop would. Emission snapshots the matching
/// callbacks first, so a callback that unsubscribes mid-emit cannot
/// invalidate the iteration.
#[derive(Default)]
pub struct SimulatedHost {
    next_handle: Cell<u64>,
    subscriptions: RefCell<HashMap<u64, Subscription>>,
}

impl SimulatedHost {
    /// Fresh host with no subscriptions.
    pub fn new() -> SimulatedHost {
        SimulatedHost::default()
    }

    /// Number of live subscriptions.
    pub fn subscription_count(&self) -> usize {
        self.subscriptions.borrow().len()
    }

    /// True when `handle` refers to a live subscription.
    pub fn is_subscribed(&self, handle: NativeHandle) -> bool {
        self.subscriptions.borrow().contains_key(&handle.0)
    }

    /// Fires every session subscription registered for `moment`.
    pub fn emit_session(&self, moment: SessionMoment) {
        let callbacks: Vec<Rc<dyn Fn()>> = self
            .subscriptions
            .borrow()
            .values()
            .filter_map(|s| match s {
                Subscription::Session(m, f) if *m == moment => Some(Rc::clone(f)),
                _ => None,
            })
            .collect();
        for f in callbacks {
            f();
        }
    }

    /// Fires the session-check subscriptions for `moment`, combining their
    /// votes the way the host would: any veto aborts.
    pub fn emit_session_checks(&self, moment: SessionMoment) -> bool {
        let callbacks: Vec<Rc<dyn Fn() -> bool>> = self
            .subscriptions
            .borrow()
            .values()
            .filter_map(|s| match s {
                Subscription::SessionCheck(m, f) if *m == moment => Some(Rc::clone(f)),
                _ => None,
            })
            .collect();
        let mut verdict = true;
        for f in callbacks {
            verdict &= f();
        }
        verdict
    }

    /// Fires every file subscription registered for `moment`.
    pub fn emit_file(&self, moment: SessionMoment, file: &FileRef) {
        let callbacks: Vec<Rc<dyn Fn(&FileRef)>> = self
            .subscriptions
            .borrow()
            .values()
            .filter_map(|s| match s {
                Subscription::File(m, f) if *m == moment => Some(Rc::clone(f)),
                _ => None,
            })
            .collect();
        for f in callbacks {
            f(file);
        }
    }

    /// Fires the file-check subscriptions for `moment`; any veto aborts.
    pub fn emit_file_checks(&self, moment: SessionMoment, file: &FileRef) -> bool {
        let callbacks: Vec<Rc<dyn Fn(&FileRef) -> bool>> = self
            .subscriptions
            .borrow()
            .values()
            .filter_map(|s| match s {
                Subscription::FileCheck(m, f) if *m == moment => Some(Rc::clone(f)),
                _ => None,
            })
            .collect();
        let mut verdict = true;
        for f in callbacks {
            verdict &= f(file);
        }
        verdict
    }

    /// Fires every node subscription registered for `change`.
    pub fn emit_node(&self, change: NodeChange, node: &NodeHandle) {
        let callbacks: Vec<Rc<dyn Fn(&NodeHandle)>> = self
            .subscriptions
            .borrow()
            .values()
            .filter_map(|s| match s {
                Subscription::Node(c, f) if *c == change => Some(Rc::clone(f)),
                _ => None,
            })
            .collect();
        for f in callbacks {
            f(node);
        }
    }

    /// Fires every rename subscription.
    pub fn emit_rename(&self, node: &NodeHandle, previous: &str) {
        let callbacks: Vec<Rc<dyn Fn(&NodeHandle, &str)>> = self
            .subscriptions
            .borrow()
            .values()
            .filter_map(|s| match s {
                Subscription::Rename(f) => Some(Rc::clone(f)),
                _ => None,
            })
            .collect();
        for f in callbacks {
            f(node, previous);
        }
    }

    /// Fires every connection subscription.
    pub fn emit_connection(&self, source: &PlugRef, destination: &PlugRef, made: bool) {
        let callbacks: Vec<Rc<dyn Fn(&PlugRef, &PlugRef, bool)>> = self
            .subscriptions
            .borrow()
            .values()
            .filter_map(|s| match s {
                Subscription::Connection(f) => Some(Rc::clone(f)),
                _ => None,
            })
            .collect();
        for f in callbacks {
            f(source, destination, made);
        }
    }

    /// Fires every time subscription.
    pub fn emit_time(&self, time: TimeSample) {
        let callbacks: Vec<Rc<dyn Fn(TimeSample)>> = self
            .subscriptions
            .borrow()
            .values()
            .filter_map(|s| match s {
                Subscription::Time(f) => Some(Rc::clone(f)),
                _ => None,
            })
            .collect();
        for f in callbacks {
            f(time);
        }
    }

    fn store(&self, subscription: Subscription) -> Result<NativeHandle, HostError> {
        let handle = self.next_handle.get() + 1;
        self.next_handle.set(handle);
        self.subscriptions.borrow_mut().insert(handle, subscription);
        Ok(NativeHandle(handle))
    }
}

impl HostNotifier for SimulatedHost {
    fn subscribe_session(
        &self,
        moment: SessionMoment,
        callback: Box<dyn Fn()>,
    ) -> Result<NativeHandle, HostError> {
        self.store(Subscription::Session(moment, Rc::from(callback)))
    }

    fn subscribe_session_check(
        &self,
        moment: SessionMoment,
        callback: Box<dyn Fn() -> bool>,
    ) -> Result<NativeHandle, HostError> {
        self.store(Subscription::SessionCheck(moment, Rc::from(callback)))
    }

    fn subscribe_file(
        &self,
        moment: SessionMoment,
        callback: Box<dyn Fn(&FileRef)>,
    ) -> Result<NativeHandle, HostError> {
        self.store(Subscription::File(moment, Rc::from(callback)))
    }

    fn subscribe_file_check(
        &self,
        moment: SessionMoment,
        callback: Box<dyn Fn(&FileRef) -> bool>,
    ) -> Result<NativeHandle, HostError> {
        self.store(Subscription::FileCheck(moment, Rc::from(callback)))
    }

    fn subscribe_node(
        &self,
        change: NodeChange,
        callback: Box<dyn Fn(&NodeHandle)>,
    ) -> Result<NativeHandle, HostError> {
        self.store(Subscription::Node(change, Rc::from(callback)))
    }

    fn subscribe_rename(
        &self,
        callback: Box<dyn Fn(&NodeHandle, &str)>,
    ) -> Result<NativeHandle, HostError> {
        self.store(Subscription::Rename(Rc::from(callback)))
    }

    fn subscribe_connection(
        &self,
        callback: Box<dyn Fn(&PlugRef, &PlugRef, bool)>,
    ) -> Result<NativeHandle, HostError> {
        self.store(Subscription::Connection(Rc::from(callback)))
    }

    fn subscribe_time(
        &self,
        callback: Box<dyn Fn(TimeSample)>,
    ) -> Result<NativeHandle, HostError> {
        self.store(Subscription::Time(Rc::from(callback)))
    }

    fn unsubscribe(&self, handle: NativeHandle) -> Result<(), HostError> {
        match self.subscriptions.borrow_mut().remove(&handle.0) {
            Some(_) => Ok(()),
            None => Err(HostError::UnknownHandle(handle.0)),
        }
    }
}
