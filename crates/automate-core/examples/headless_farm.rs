//! Headless farm: kegs and a charcoal kiln around one shared chest.
//!
//! Runs a day of ticks, advancing the machines as a host game would, and
//! prints the chest contents and the diagnostic overlay at the end.
//!
//! Run with: `RUST_LOG=automate_core=debug cargo run -p automate-core --example headless_farm`

use automate_core::config::AutomateConfig;
use automate_core::container::Container;
use automate_core::engine::Engine;
use automate_core::event::{AutomationEvent, EventKind};
use automate_core::processor::PassReport;
use automate_core::sim::SimContext;
use automate_core::test_utils::*;
use automate_core::tile::{TileArea, TilePos};
use std::cell::Cell;
use std::rc::Rc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

fn main() {
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer())
        .with(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let config = AutomateConfig {
        automation_interval: 10,
        connectors: vec!["Wood Path".into()],
        ..AutomateConfig::default()
    };
    let mut engine = Engine::new(config, test_registry()).expect("valid config");

    // --- Layout ---
    //
    //   K K K P P P C
    //   [shed ]     F
    //
    // K = keg, P = path, C = charcoal kiln, F = fish pond

    for x in 0..3 {
        engine
            .add_machine("Farm", TileArea::new(x, 0, 1, 1), Box::new(RecipeMachine::keg()))
            .expect("free tile");
    }
    let shed = engine
        .add_container(
            "Farm",
            TileArea::new(0, 1, 3, 1),
            Box::new(chest_with("shed", 12, &[stack(GRAPE, 20), stack(WOOD, 25)])),
        )
        .expect("free tile");
    for x in [3, 4, 5] {
        engine
            .add_object("Farm", TileArea::new(x, 0, 1, 1), "Wood Path")
            .expect("free tile");
    }
    engine
        .add_machine(
            "Farm",
            TileArea::new(6, 0, 1, 1),
            Box::new(RecipeMachine::charcoal_kiln()),
        )
        .expect("free tile");
    engine
        .add_machine(
            "Farm",
            TileArea::new(6, 1, 1, 1),
            Box::new(SourceMachine::new("FishPond").with_output(stack(FISH, 4))),
        )
        .expect("free tile");

    let collected = Rc::new(Cell::new(0u64));
    let counter = Rc::clone(&collected);
    engine.on_passive(
        EventKind::OutputCollected,
        Box::new(move |event: &AutomationEvent| {
            if let AutomationEvent::OutputCollected { items, .. } = event {
                counter.set(counter.get() + items.quantity as u64);
            }
        }),
    );

    // --- Run ---

    for tick in 0..600 {
        let report = engine.update(&SimContext::all(tick));
        if report.processed && report.passes != PassReport::default() {
            println!(
                "tick {tick:>3}: collected {} item(s), fed {} machine(s)",
                report.passes.items_collected, report.passes.inputs_accepted
            );
        }
        for id in engine.world().machine_ids() {
            if let Some(machine) = engine.world_mut().machine_as_mut::<RecipeMachine>(id) {
                machine.advance(1);
            }
        }
    }

    // --- Results ---

    let registry = engine.registry();
    println!("\nshed contents:");
    if let Some(chest) = engine.world().container(shed) {
        for (kind, count) in chest.contents() {
            let name = registry
                .get_item(kind.item_type)
                .map(|def| def.name.as_str())
                .unwrap_or("?");
            println!("  {name:<8} {count}");
        }
    }
    println!("total collected: {}", collected.get());

    println!("\noverlay (0 none, 1 empty, 2 processing, 3 done):");
    let codes = engine.machine_states(&"Farm".into(), TileArea::new(0, 0, 7, 2));
    for y in 0..2 {
        let row: String = (0..7)
            .map(|x| {
                codes
                    .get(&TilePos::new(x, y))
                    .map(|c| char::from(b'0' + c))
                    .unwrap_or('.')
            })
            .collect();
        println!("  {row}");
    }
}
