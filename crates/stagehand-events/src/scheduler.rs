//! Process-wide event registry and the trigger protocols.

use std::cell::RefCell;
use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::rc::{Rc, Weak};

use serde_json::Value;
use tracing::debug;

use crate::binding::{LogSeverity, ScriptBinding, TracingBinding};
use crate::callback::{Callback, CallbackInfo, CallbackPayload, ScriptLanguage, UserData};
use crate::dispatcher::{EventDispatcher, EventInfo};
use crate::handler::CustomEventHandler;
use crate::ids::{extract_event_id, CallbackId, EventCategory, EventId};

struct SchedulerState {
    events: BTreeMap<EventId, EventDispatcher>,
    handlers: HashMap<EventCategory, Weak<dyn CustomEventHandler>>,
    binding: Rc<dyn ScriptBinding>,
}

impl SchedulerState {
    // Lowest unused id starting at 1. Freed slots are reused; None only when
    // all 65535 slots are occupied.
    fn free_id(&self) -> Option<EventId> {
        let mut candidate: u16 = 1;
        for &id in self.events.keys() {
            if id.raw() == candidate {
                candidate = candidate.checked_add(1)?;
            } else if id.raw() > candidate {
                break;
            }
        }
        Some(EventId(candidate))
    }
}

/// Cheap-to-clone handle onto the single event registry.
///
/// The registry is single-threaded by contract: it lives on the host main
/// thread and callbacks run synchronously inside the trigger call. Interior
/// mutability makes re-entrant registration from inside a callback body
/// safe; no borrow is ever held across a callback invocation.
///
/// Registration failures follow a sentinel protocol rather than `Result`:
/// registering against something unknown returns the invalid id,
/// unregistering returns `false`, and each failure also emits one line
/// through the binding's log channel.
#[derive(Clone)]
pub struct EventScheduler {
    state: Rc<RefCell<SchedulerState>>,
}

impl EventScheduler {
    /// Creates a scheduler that routes scripts and diagnostics through
    /// `binding`.
    pub fn new(binding: Rc<dyn ScriptBinding>) -> EventScheduler {
        EventScheduler {
            state: Rc::new(RefCell::new(SchedulerState {
                events: BTreeMap::new(),
                handlers: HashMap::new(),
                binding,
            })),
        }
    }

    /// Creates a scheduler with the default tracing-only binding.
    pub fn with_default_binding() -> EventScheduler {
        EventScheduler::new(Rc::new(TracingBinding))
    }

    /// The binding scripts and diagnostics are routed through.
    pub fn binding(&self) -> Rc<dyn ScriptBinding> {
        Rc::clone(&self.state.borrow().binding)
    }

    // -- Event registration --

    /// Registers a named event and returns its id.
    ///
    /// Registration is idempotent: an event already registered under the
    /// same name and category keeps its id. The same name under a different
    /// category is a distinct event. Returns [`EventId::INVALID`] only when
    /// the id space is exhausted.
    pub fn register_event(&self, name: &str, category: EventCategory) -> EventId {
        self.register_event_with_parent(name, category, CallbackId::INVALID)
    }

    /// Registers a named event owned by the callback that spawned it.
    ///
    /// The parent association is bookkeeping only; the child event is not
    /// torn down when the parent callback goes away.
    pub fn register_event_with_parent(
        &self,
        name: &str,
        category: EventCategory,
        parent: CallbackId,
    ) -> EventId {
        let mut state = self.state.borrow_mut();
        if let Some(existing) = state
            .events
            .values()
            .find(|d| d.name() == name && d.category() == category)
        {
            return existing.id();
        }
        let Some(id) = state.free_id() else {
            let binding = Rc::clone(&state.binding);
            drop(state);
            binding.log(
                LogSeverity::Error,
                &format!("cannot register event '{name}': event id space exhausted"),
            );
            return EventId::INVALID;
        };
        state
            .events
            .insert(id, EventDispatcher::new(id, name, category, parent));
        debug!(event = name, id = id.raw(), ?category, "event registered");
        id
    }

    /// Unregisters an event, forcibly detaching any callbacks still attached
    /// to it. The category handler is notified per detached callback so
    /// native subscriptions unwind before the event record disappears.
    pub fn unregister_event(&self, event: EventId) -> bool {
        let removed = self.state.borrow_mut().events.remove(&event);
        let Some(dispatcher) = removed else {
            self.log_warning(format!(
                "cannot unregister event {}: unknown event id",
                event.raw()
            ));
            return false;
        };
        debug!(event = dispatcher.name(), id = event.raw(), "event unregistered");
        for id in dispatcher.ids() {
            self.notify_destroyed(dispatcher.category(), id);
        }
        true
    }

    /// Forcibly unregisters every event, detaching all callbacks and
    /// notifying category handlers so adapters release their native
    /// subscriptions. Used at file-new and plugin-unload boundaries.
    pub fn clear(&self) {
        let drained: Vec<EventDispatcher> = {
            let mut state = self.state.borrow_mut();
            std::mem::take(&mut state.events).into_values().collect()
        };
        for dispatcher in &drained {
            for id in dispatcher.ids() {
                self.notify_destroyed(dispatcher.category(), id);
            }
        }
        if !drained.is_empty() {
            debug!(events = drained.len(), "scheduler cleared");
        }
    }

    // -- Lookups --

    /// Resolves an event name to its id, or [`EventId::INVALID`] when no
    /// event has that name. If the same name exists under more than one
    /// category the lowest event id wins.
    pub fn event_id(&self, name: &str) -> EventId {
        self.state
            .borrow()
            .events
            .values()
            .find(|d| d.name() == name)
            .map(EventDispatcher::id)
            .unwrap_or(EventId::INVALID)
    }

    /// Diagnostic snapshot of one event.
    pub fn event_info(&self, event: EventId) -> Option<EventInfo> {
        self.state
            .borrow()
            .events
            .get(&event)
            .map(EventDispatcher::info)
    }

    /// Diagnostic snapshots of every registered event, in id order.
    pub fn registered_events(&self) -> Vec<EventInfo> {
        self.state
            .borrow()
            .events
            .values()
            .map(EventDispatcher::info)
            .collect()
    }

    /// Diagnostic snapshot of one callback.
    pub fn callback_info(&self, id: CallbackId) -> Option<CallbackInfo> {
        let state = self.state.borrow();
        let dispatcher = state.events.get(&extract_event_id(id))?;
        dispatcher.find(id).map(CallbackInfo::from)
    }

    /// Diagnostic snapshots of an event's callbacks, in dispatch order.
    pub fn callbacks_for(&self, event: EventId) -> Vec<CallbackInfo> {
        self.state
            .borrow()
            .events
            .get(&event)
            .map(|d| d.callbacks().iter().map(CallbackInfo::from).collect())
            .unwrap_or_default()
    }

    // -- Callback registration --

    /// Registers a callback against an event.
    ///
    /// Lower weights fire earlier; equal weights fire in registration
    /// order. On success the category's handler, if one is installed,
    /// receives [`CustomEventHandler::on_callback_created`]. Returns
    /// [`CallbackId::INVALID`] when the event id is unknown.
    pub fn register_callback(
        &self,
        event: EventId,
        tag: &str,
        payload: CallbackPayload,
        weight: u32,
        user_data: Option<UserData>,
    ) -> CallbackId {
        let (id, category) = {
            let mut state = self.state.borrow_mut();
            let Some(dispatcher) = state.events.get_mut(&event) else {
                drop(state);
                self.log_error(format!(
                    "cannot register callback '{tag}': unknown event id {}",
                    event.raw()
                ));
                return CallbackId::INVALID;
            };
            let category = dispatcher.category();
            (dispatcher.insert(tag, payload, weight, user_data), category)
        };
        if !id.is_valid() {
            self.log_error(format!(
                "cannot register callback '{tag}': sequence space exhausted on event {}",
                event.raw()
            ));
            return CallbackId::INVALID;
        }
        if let Some(handler) = self.handler_for(category) {
            handler.on_callback_created(id);
        }
        id
    }

    /// Registers a callback against an event looked up by name.
    pub fn register_callback_by_name(
        &self,
        name: &str,
        tag: &str,
        payload: CallbackPayload,
        weight: u32,
        user_data: Option<UserData>,
    ) -> CallbackId {
        let event = self.event_id(name);
        if !event.is_valid() {
            self.log_error(format!(
                "cannot register callback '{tag}': no event named '{name}'"
            ));
            return CallbackId::INVALID;
        }
        self.register_callback(event, tag, payload, weight, user_data)
    }

    /// Unregisters a callback by id. Returns false when the id is stale or
    /// was never issued; unregistering twice is harmless. On success the
    /// category's handler receives
    /// [`CustomEventHandler::on_callback_destroyed`].
    pub fn unregister_callback(&self, id: CallbackId) -> bool {
        let event = extract_event_id(id);
        let category = {
            let mut state = self.state.borrow_mut();
            let Some(dispatcher) = state.events.get_mut(&event) else {
                drop(state);
                self.log_warning(format!(
                    "cannot unregister callback {}: unknown event id {}",
                    id.raw(),
                    event.raw()
                ));
                return false;
            };
            if !dispatcher.remove(id) {
                drop(state);
                self.log_warning(format!(
                    "cannot unregister callback {}: not registered",
                    id.raw()
                ));
                return false;
            }
            dispatcher.category()
        };
        self.notify_destroyed(category, id);
        true
    }

    // -- Category handlers --

    /// Installs the handler notified for every callback registered under
    /// `category`. At most one handler per category; the newest wins. The
    /// scheduler holds the handler weakly, so the owning adapter controls
    /// its lifetime.
    pub fn register_handler<H>(&self, category: EventCategory, handler: &Rc<H>)
    where
        H: CustomEventHandler + 'static,
    {
        debug!(?category, handler = handler.category_label(), "handler registered");
        let weak: Weak<dyn CustomEventHandler> = Rc::<H>::downgrade(handler);
        self.state.borrow_mut().handlers.insert(category, weak);
    }

    /// Removes the handler for `category`. Returns false when none was
    /// installed.
    pub fn unregister_handler(&self, category: EventCategory) -> bool {
        self.state.borrow_mut().handlers.remove(&category).is_some()
    }

    // -- Trigger protocols --

    /// Fires an event, invoking every live callback in weight order.
    ///
    /// Shaped callbacks cannot run without their adapter's binder and are
    /// skipped with a warning; adapter code fires through
    /// [`trigger_with`](Self::trigger_with) instead.
    pub fn trigger(&self, event: EventId) {
        self.trigger_with(event, |callback| {
            self.log_warning(format!(
                "callback '{}' on event {} needs a binder and was skipped",
                callback.tag(),
                event.raw()
            ));
        });
    }

    /// Fires an event, handing shaped callbacks to `binder`.
    ///
    /// The callback list is snapshotted up front and each entry is
    /// re-checked for liveness just before it runs: a callback unregistered
    /// from inside a callback body is not invoked later in the same
    /// trigger, and one registered mid-trigger first fires on the next
    /// trigger.
    pub fn trigger_with<F>(&self, event: EventId, mut binder: F)
    where
        F: FnMut(&Callback),
    {
        let Some(snapshot) = self.snapshot(event) else {
            self.log_warning(format!("cannot trigger unknown event id {}", event.raw()));
            return;
        };
        for callback in &snapshot {
            if !self.is_live(callback.id()) {
                continue;
            }
            match callback.payload() {
                CallbackPayload::Basic(f) => f(callback.user_data()),
                CallbackPayload::Decision(f) => {
                    f(callback.user_data());
                }
                CallbackPayload::Shaped(_) => binder(callback),
                CallbackPayload::Script { language, source } => {
                    self.run_script(callback, *language, source);
                }
            }
        }
    }

    /// Fires an event whose callbacks vote on whether an operation may
    /// proceed. The result is the conjunction of every vote, seeded true.
    ///
    /// A veto never short-circuits: callbacks after the vetoing one still
    /// observe the event, matching hosts whose own check callbacks all run.
    pub fn trigger_check(&self, event: EventId) -> bool {
        self.trigger_check_with(event, |callback| {
            self.log_warning(format!(
                "callback '{}' on event {} needs a binder and was skipped",
                callback.tag(),
                event.raw()
            ));
            true
        })
    }

    /// Check protocol with a binder for shaped callbacks. The binder
    /// returns the shaped callback's vote.
    pub fn trigger_check_with<F>(&self, event: EventId, mut binder: F) -> bool
    where
        F: FnMut(&Callback) -> bool,
    {
        let Some(snapshot) = self.snapshot(event) else {
            self.log_warning(format!("cannot trigger unknown event id {}", event.raw()));
            return true;
        };
        let mut verdict = true;
        for callback in &snapshot {
            if !self.is_live(callback.id()) {
                continue;
            }
            let vote = match callback.payload() {
                CallbackPayload::Basic(f) => {
                    f(callback.user_data());
                    true
                }
                CallbackPayload::Decision(f) => f(callback.user_data()),
                CallbackPayload::Shaped(_) => binder(callback),
                CallbackPayload::Script { language, source } => self
                    .run_script(callback, *language, source)
                    .unwrap_or(true),
            };
            verdict &= vote;
        }
        verdict
    }

    /// Fires an event whose callbacks claim interest in something. The
    /// result is the disjunction of every vote, seeded false, and every
    /// callback runs even after the first claim.
    pub fn trigger_filter(&self, event: EventId) -> bool {
        self.trigger_filter_with(event, |callback| {
            self.log_warning(format!(
                "callback '{}' on event {} needs a binder and was skipped",
                callback.tag(),
                event.raw()
            ));
            false
        })
    }

    /// Filter protocol with a binder for shaped callbacks. The binder
    /// returns the shaped callback's vote.
    pub fn trigger_filter_with<F>(&self, event: EventId, mut binder: F) -> bool
    where
        F: FnMut(&Callback) -> bool,
    {
        let Some(snapshot) = self.snapshot(event) else {
            self.log_warning(format!("cannot trigger unknown event id {}", event.raw()));
            return false;
        };
        let mut verdict = false;
        for callback in &snapshot {
            if !self.is_live(callback.id()) {
                continue;
            }
            let vote = match callback.payload() {
                CallbackPayload::Basic(f) => {
                    f(callback.user_data());
                    false
                }
                CallbackPayload::Decision(f) => f(callback.user_data()),
                CallbackPayload::Shaped(_) => binder(callback),
                CallbackPayload::Script { language, source } => self
                    .run_script(callback, *language, source)
                    .unwrap_or(false),
            };
            verdict |= vote;
        }
        verdict
    }

    // -- Internals --

    fn snapshot(&self, event: EventId) -> Option<Vec<Callback>> {
        self.state
            .borrow()
            .events
            .get(&event)
            .map(EventDispatcher::snapshot)
    }

    fn is_live(&self, id: CallbackId) -> bool {
        self.state
            .borrow()
            .events
            .get(&extract_event_id(id))
            .is_some_and(|d| d.contains(id))
    }

    // Runs a scripted callback, logging failures. Some(vote) only when the
    // script produced a JSON boolean; anything else is the protocol's
    // business to default.
    fn run_script(
        &self,
        callback: &Callback,
        language: ScriptLanguage,
        source: &str,
    ) -> Option<bool> {
        let binding = self.binding();
        match binding.run(language, source) {
            Ok(Value::Bool(vote)) => Some(vote),
            Ok(_) => None,
            Err(err) => {
                binding.log(
                    LogSeverity::Error,
                    &format!("script callback '{}' failed: {err}", callback.tag()),
                );
                None
            }
        }
    }

    fn handler_for(&self, category: EventCategory) -> Option<Rc<dyn CustomEventHandler>> {
        self.state
            .borrow()
            .handlers
            .get(&category)
            .and_then(Weak::upgrade)
    }

    fn notify_destroyed(&self, category: EventCategory, id: CallbackId) {
        if let Some(handler) = self.handler_for(category) {
            handler.on_callback_destroyed(id);
        }
    }

    fn log_warning(&self, message: String) {
        self.binding().log(LogSeverity::Warning, &message);
    }

    fn log_error(&self, message: String) {
        self.binding().log(LogSeverity::Error, &message);
    }
}

impl fmt::Debug for EventScheduler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.state.borrow();
        f.debug_struct("EventScheduler")
            .field("events", &state.events.len())
            .field("handlers", &state.handlers.len())
            .finish()
    }
}
