//! Walks a full bridge session against the simulated host: registrations,
//! a vetoed save, scene edits and teardown, then prints the registry as the
//! plugin's diagnostic command would.
//!
//! Run with: `cargo run --example bridge_session`

use std::rc::Rc;

use stagehand_events::EventScheduler;
use stagehand_host::test_support::SimulatedHost;
use stagehand_host::{
    FileRef, HostEventHandler, HostEventManager, NodeChange, NodeHandle, SessionMoment,
    TimeSample,
};

fn main() {
    tracing_subscriber::fmt()
        .with_max_level(tracing::Level::DEBUG)
        .init();

    let scheduler = EventScheduler::with_default_binding();
    let host = Rc::new(SimulatedHost::new());
    let adapter = HostEventHandler::new(&scheduler, host.clone());
    let manager = HostEventManager::new(&scheduler, adapter.clone());

    manager.register_file("AfterOpen", "layer-scan", 10, None, |file, _| {
        println!("scanning layers of {}", file.path);
    });
    manager.register_node("NodeAdded", "proxy-mirror", 20, None, |node, _| {
        println!("mirroring node {} into the stage", node.0);
    });
    manager.register_time("TimeChanged", "playback-sync", 20, None, |time, _| {
        println!("syncing playback to frame {}", time.0);
    });
    let dirty_guard =
        manager.register_check("BeforeSaveCheck", "dirty-layer-guard", 5, None, |_| {
            println!("refusing save: session layer has unsaved edits");
            false
        });

    println!("-- opening a shot --");
    host.emit_file(
        SessionMoment::AfterOpen,
        &FileRef::new("/shots/sq100/shot.usda", "usd"),
    );
    host.emit_node(NodeChange::Added, &NodeHandle(12));
    host.emit_time(TimeSample(101.0));

    println!("-- saving (vetoed) --");
    let allowed = host.emit_session_checks(SessionMoment::BeforeSave);
    println!("save allowed: {allowed}");

    manager.unregister(dirty_guard);
    println!("-- saving (guard removed) --");
    let allowed = host.emit_session_checks(SessionMoment::BeforeSave);
    println!("save allowed: {allowed}");

    println!("-- registry --");
    let events = scheduler.registered_events();
    println!(
        "{}",
        serde_json::to_string_pretty(&events).expect("registry snapshots serialize")
    );
    println!("native subscriptions held: {}", host.subscription_count());

    scheduler.clear();
    println!("after clear: {}", host.subscription_count());
}
