//! End-to-end scheduler behavior: ordering, trigger protocols, re-entrancy
//! and teardown.

use std::cell::RefCell;
use std::rc::Rc;

use serde_json::json;

use stagehand_events::test_support::RecordingBinding;
use stagehand_events::{
    make_callback_id, CallbackId, CallbackPayload, EventCategory, EventId, EventScheduler,
    ScriptLanguage, UserData, DEFAULT_WEIGHT, PLUGIN_WEIGHT_BAND,
};

fn scheduler_with_recorder() -> (EventScheduler, Rc<RecordingBinding>) {
    let binding = Rc::new(RecordingBinding::new());
    (EventScheduler::new(binding.clone()), binding)
}

fn tracer(order: &Rc<RefCell<Vec<&'static str>>>, label: &'static str) -> CallbackPayload {
    let order = order.clone();
    CallbackPayload::Basic(Rc::new(move |_| order.borrow_mut().push(label)))
}

fn lua(source: &str) -> CallbackPayload {
    CallbackPayload::Script {
        language: ScriptLanguage::Lua,
        source: source.to_string(),
    }
}

// -- Ordering --

#[test]
fn callbacks_fire_in_weight_order_regardless_of_registration_order() {
    let (scheduler, _) = scheduler_with_recorder();
    let event = scheduler.register_event("PreStageLoad", EventCategory::Custom);
    let order = Rc::new(RefCell::new(Vec::new()));

    // bridge-internal work sorts after every client weight
    scheduler.register_callback(
        event,
        "internal",
        tracer(&order, "internal"),
        PLUGIN_WEIGHT_BAND,
        None,
    );
    scheduler.register_callback(event, "last", tracer(&order, "last"), 33, None);
    scheduler.register_callback(event, "middle", tracer(&order, "middle"), 22, None);
    scheduler.register_callback(event, "first", tracer(&order, "first"), 11, None);

    scheduler.trigger(event);
    assert_eq!(*order.borrow(), vec!["first", "middle", "last", "internal"]);
}

#[test]
fn equal_weights_fire_in_registration_order() {
    let (scheduler, _) = scheduler_with_recorder();
    let event = scheduler.register_event("PostStageLoad", EventCategory::Custom);
    let order = Rc::new(RefCell::new(Vec::new()));

    scheduler.register_callback(event, "a", tracer(&order, "a"), DEFAULT_WEIGHT, None);
    scheduler.register_callback(event, "b", tracer(&order, "b"), DEFAULT_WEIGHT, None);
    scheduler.register_callback(event, "c", tracer(&order, "c"), DEFAULT_WEIGHT, None);

    scheduler.trigger(event);
    scheduler.trigger(event);
    assert_eq!(*order.borrow(), vec!["a", "b", "c", "a", "b", "c"]);
}

// -- Check and filter protocols --

#[test]
fn check_is_a_conjunction_and_never_short_circuits() {
    let (scheduler, _) = scheduler_with_recorder();
    let event = scheduler.register_event("BeforeSaveCheck", EventCategory::Custom);
    let invoked = Rc::new(RefCell::new(0u32));

    let decision = |vote: bool| {
        let invoked = invoked.clone();
        CallbackPayload::Decision(Rc::new(move |_| {
            *invoked.borrow_mut() += 1;
            vote
        }))
    };
    scheduler.register_callback(event, "yes-1", decision(true), 1, None);
    scheduler.register_callback(event, "veto", decision(false), 2, None);
    scheduler.register_callback(event, "yes-2", decision(true), 3, None);

    assert!(!scheduler.trigger_check(event));
    // the callback after the veto still ran
    assert_eq!(*invoked.borrow(), 3);
}

#[test]
fn filter_is_a_disjunction_and_every_callback_runs() {
    let (scheduler, _) = scheduler_with_recorder();
    let event = scheduler.register_event("WantsRedraw", EventCategory::Custom);
    let invoked = Rc::new(RefCell::new(0u32));

    let decision = |vote: bool| {
        let invoked = invoked.clone();
        CallbackPayload::Decision(Rc::new(move |_| {
            *invoked.borrow_mut() += 1;
            vote
        }))
    };
    scheduler.register_callback(event, "no-1", decision(false), 1, None);
    scheduler.register_callback(event, "no-2", decision(false), 2, None);
    scheduler.register_callback(event, "claim", decision(true), 3, None);

    assert!(scheduler.trigger_filter(event));
    assert_eq!(*invoked.borrow(), 3);
}

#[test]
fn empty_events_yield_the_protocol_seeds() {
    let (scheduler, _) = scheduler_with_recorder();
    let event = scheduler.register_event("Quiet", EventCategory::Custom);
    assert!(scheduler.trigger_check(event));
    assert!(!scheduler.trigger_filter(event));
}

// -- Re-entrancy --

#[test]
fn a_callback_can_unregister_itself_mid_trigger() {
    let (scheduler, _) = scheduler_with_recorder();
    let event = scheduler.register_event("NodeAdded", EventCategory::Custom);
    let order = Rc::new(RefCell::new(Vec::new()));

    let slot: Rc<RefCell<CallbackId>> = Rc::new(RefCell::new(CallbackId::INVALID));
    let once_id = {
        let scheduler2 = scheduler.clone();
        let slot = slot.clone();
        let order = order.clone();
        let payload = CallbackPayload::Basic(Rc::new(move |_| {
            order.borrow_mut().push("once");
            assert!(scheduler2.unregister_callback(*slot.borrow()));
        }));
        scheduler.register_callback(event, "once", payload, 1, None)
    };
    *slot.borrow_mut() = once_id;
    scheduler.register_callback(event, "steady", tracer(&order, "steady"), 2, None);

    scheduler.trigger(event);
    scheduler.trigger(event);
    assert_eq!(*order.borrow(), vec!["once", "steady", "steady"]);
}

#[test]
fn unregistering_a_peer_mid_trigger_suppresses_it() {
    let (scheduler, _) = scheduler_with_recorder();
    let event = scheduler.register_event("NodeRemoved", EventCategory::Custom);
    let order = Rc::new(RefCell::new(Vec::new()));

    let victim_id = Rc::new(RefCell::new(CallbackId::INVALID));
    {
        let scheduler2 = scheduler.clone();
        let victim_id = victim_id.clone();
        let order = order.clone();
        let payload = CallbackPayload::Basic(Rc::new(move |_| {
            order.borrow_mut().push("killer");
            assert!(scheduler2.unregister_callback(*victim_id.borrow()));
        }));
        scheduler.register_callback(event, "killer", payload, 1, None);
    }
    *victim_id.borrow_mut() =
        scheduler.register_callback(event, "victim", tracer(&order, "victim"), 2, None);

    scheduler.trigger(event);
    assert_eq!(*order.borrow(), vec!["killer"]);
}

#[test]
fn registrations_made_mid_trigger_first_fire_on_the_next_trigger() {
    let (scheduler, _) = scheduler_with_recorder();
    let event = scheduler.register_event("TimeChanged", EventCategory::Custom);
    let order: Rc<RefCell<Vec<&'static str>>> = Rc::new(RefCell::new(Vec::new()));
    let planted = Rc::new(RefCell::new(false));

    {
        let scheduler2 = scheduler.clone();
        let order = order.clone();
        let planted = planted.clone();
        let payload = CallbackPayload::Basic(Rc::new(move |_| {
            order.borrow_mut().push("planter");
            if !*planted.borrow() {
                *planted.borrow_mut() = true;
                let order = order.clone();
                scheduler2.register_callback(
                    event,
                    "seedling",
                    CallbackPayload::Basic(Rc::new(move |_| order.borrow_mut().push("seedling"))),
                    // would sort before the planter if it ran this trigger
                    1,
                    None,
                );
            }
        }));
        scheduler.register_callback(event, "planter", payload, 5, None);
    }

    scheduler.trigger(event);
    assert_eq!(*order.borrow(), vec!["planter"]);

    scheduler.trigger(event);
    assert_eq!(*order.borrow(), vec!["planter", "seedling", "planter"]);
}

// -- Sentinel protocol --

#[test]
fn unknown_names_register_nothing() {
    let (scheduler, binding) = scheduler_with_recorder();
    let id = scheduler.register_callback_by_name(
        "NoSuchEvent",
        "hopeful",
        CallbackPayload::Basic(Rc::new(|_| {})),
        DEFAULT_WEIGHT,
        None,
    );
    assert_eq!(id, CallbackId::INVALID);
    assert!(binding.logged("NoSuchEvent"));
    assert!(scheduler.registered_events().is_empty());
}

#[test]
fn unregistration_is_idempotent() {
    let (scheduler, binding) = scheduler_with_recorder();
    let event = scheduler.register_event("AfterSave", EventCategory::Custom);
    let id = scheduler.register_callback(
        event,
        "only-once",
        CallbackPayload::Basic(Rc::new(|_| {})),
        DEFAULT_WEIGHT,
        None,
    );

    assert!(scheduler.unregister_callback(id));
    assert!(!scheduler.unregister_callback(id));
    assert!(binding.logged("not registered"));

    // an id that was never issued unwinds the same way
    let synthetic = make_callback_id(999, EventCategory::Host, EventId(77));
    assert!(!scheduler.unregister_callback(synthetic));
}

// -- User data --

#[test]
fn user_data_rides_along_with_the_invocation() {
    let (scheduler, _) = scheduler_with_recorder();
    let event = scheduler.register_event("AfterOpen", EventCategory::Custom);
    let seen = Rc::new(RefCell::new(0u32));

    let seen2 = seen.clone();
    let payload = CallbackPayload::Basic(Rc::new(move |data| {
        let value = data.and_then(|d| d.downcast_ref::<u32>()).copied();
        *seen2.borrow_mut() = value.unwrap_or(0);
    }));
    let data: UserData = Rc::new(42u32);
    scheduler.register_callback(event, "stateful", payload, DEFAULT_WEIGHT, Some(data));

    scheduler.trigger(event);
    assert_eq!(*seen.borrow(), 42);
}

// -- Scripted callbacks --

#[test]
fn script_callbacks_run_through_the_binding() {
    let (scheduler, binding) = scheduler_with_recorder();
    let event = scheduler.register_event("AfterOpen", EventCategory::Custom);
    scheduler.register_callback(
        event,
        "lua-hook",
        lua("log_open()"),
        DEFAULT_WEIGHT,
        None,
    );

    scheduler.trigger(event);
    assert_eq!(
        binding.executed(),
        vec![(ScriptLanguage::Lua, "log_open()".to_string())]
    );
}

#[test]
fn script_votes_feed_the_check_protocol() {
    let (scheduler, binding) = scheduler_with_recorder();
    binding.reply_with("return allowed", json!(false));

    let event = scheduler.register_event("BeforeOpenCheck", EventCategory::Custom);
    scheduler.register_callback(event, "lua-veto", lua("return allowed"), 1, None);
    assert!(!scheduler.trigger_check(event));

    binding.reply_with("return allowed", json!(true));
    assert!(scheduler.trigger_check(event));
}

#[test]
fn non_boolean_script_results_are_neutral() {
    let (scheduler, binding) = scheduler_with_recorder();
    binding.reply_with("tally()", json!(17));

    let event = scheduler.register_event("BeforeSaveCheck", EventCategory::Custom);
    scheduler.register_callback(event, "lua-count", lua("tally()"), 1, None);
    assert!(scheduler.trigger_check(event));
    assert!(!scheduler.trigger_filter(event));
}

#[test]
fn failing_scripts_are_isolated_and_neutral() {
    let (scheduler, binding) = scheduler_with_recorder();
    binding.fail_with("boom()", "no such function");

    let event = scheduler.register_event("BeforeSaveCheck", EventCategory::Custom);
    scheduler.register_callback(event, "broken", lua("boom()"), 1, None);
    let veto = CallbackPayload::Decision(Rc::new(|_| false));
    scheduler.register_callback(event, "veto", veto, 2, None);

    // the failure neither vetoes nor masks the real veto
    assert!(!scheduler.trigger_check(event));
    assert!(binding.logged("broken"));

    let alone = scheduler.register_event("BeforeExportCheck", EventCategory::Custom);
    scheduler.register_callback(alone, "broken-too", lua("boom()"), 1, None);
    assert!(scheduler.trigger_check(alone));
}

// -- Introspection --

#[test]
fn info_snapshots_describe_the_registry() {
    let (scheduler, _) = scheduler_with_recorder();
    let open = scheduler.register_event("AfterOpen", EventCategory::Host);
    let save = scheduler.register_event("AfterSave", EventCategory::Host);
    scheduler.register_callback(open, "relay", lua("relay()"), 7, None);

    let events = scheduler.registered_events();
    assert_eq!(events.len(), 2);
    assert_eq!(events[0].name, "AfterOpen");
    assert_eq!(events[0].callback_count, 1);
    assert_eq!(events[1].name, "AfterSave");
    assert_eq!(events[1].callback_count, 0);

    let callbacks = scheduler.callbacks_for(open);
    assert_eq!(callbacks.len(), 1);
    assert_eq!(callbacks[0].tag, "relay");
    assert_eq!(callbacks[0].weight, 7);
    assert_eq!(callbacks[0].kind, "script");

    let info = scheduler.callback_info(callbacks[0].id).unwrap();
    assert_eq!(info.tag, "relay");
    assert!(scheduler.callbacks_for(save).is_empty());

    // the records serialize for the plugin's diagnostic command
    let rendered = serde_json::to_string(&events).unwrap();
    assert!(rendered.contains("AfterOpen"));
}
