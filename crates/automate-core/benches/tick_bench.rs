//! Criterion benchmarks for the automation engine.
//!
//! Benchmark groups:
//! - `farm`: 20 rows of kegs around shared chests, steady-state ticks
//! - `rebuild`: full network rebuild of a 64x64 layout after invalidation

use automate_core::config::AutomateConfig;
use automate_core::container::Chest;
use automate_core::engine::Engine;
use automate_core::sim::SimContext;
use automate_core::test_utils::*;
use automate_core::tile::TileArea;
use criterion::{Criterion, criterion_group, criterion_main};

fn every_tick() -> AutomateConfig {
    AutomateConfig {
        automation_interval: 1,
        ..AutomateConfig::default()
    }
}

/// Rows of kegs, each row above a long chest, separated by empty rows so
/// every pair is its own network.
fn build_farm(rows: i32, kegs_per_row: i32) -> Engine {
    let mut engine = Engine::new(every_tick(), test_registry()).expect("valid config");
    for row in 0..rows {
        let y = row * 3;
        for x in 0..kegs_per_row {
            engine
                .add_machine("Farm", TileArea::new(x, y, 1, 1), Box::new(RecipeMachine::keg()))
                .expect("free tile");
        }
        engine
            .add_container(
                "Farm",
                TileArea::new(0, y + 1, kegs_per_row as u32, 1),
                Box::new(chest_with("row", 36, &[stack(GRAPE, 999), stack(GRAPE, 999)])),
            )
            .expect("free tile");
    }
    engine
}

/// A dense grid alternating machines and chests with scattered gaps.
fn build_grid(size: i32) -> Engine {
    let mut engine = Engine::new(every_tick(), test_registry()).expect("valid config");
    for y in 0..size {
        for x in 0..size {
            let area = TileArea::new(x, y, 1, 1);
            match (x * 7 + y * 13) % 5 {
                0 => {}
                1 | 2 => {
                    engine
                        .add_container("Farm", area, Box::new(Chest::new("c", 9)))
                        .expect("free tile");
                }
                _ => {
                    engine
                        .add_machine("Farm", area, Box::new(SourceMachine::new("Pond")))
                        .expect("free tile");
                }
            }
        }
    }
    engine
}

fn advance_all(engine: &mut Engine) {
    for id in engine.world().machine_ids() {
        if let Some(keg) = engine.world_mut().machine_as_mut::<RecipeMachine>(id) {
            keg.advance(1);
        }
    }
}

fn bench_farm(c: &mut Criterion) {
    let mut group = c.benchmark_group("farm");
    group.sample_size(50);

    let mut engine = build_farm(20, 25);
    engine.update(&SimContext::all(0));
    let mut tick = 1;

    group.bench_function("500_kegs_20_networks", |b| {
        b.iter(|| {
            advance_all(&mut engine);
            engine.update(&SimContext::all(tick));
            tick += 1;
        })
    });
    group.finish();
}

fn bench_rebuild(c: &mut Criterion) {
    let mut group = c.benchmark_group("rebuild");
    group.sample_size(20);

    let mut engine = build_grid(64);
    let mut tick = 0;

    group.bench_function("64x64_grid", |b| {
        b.iter(|| {
            engine.invalidate_location("Farm");
            engine.update(&SimContext::all(tick));
            tick += 1;
        })
    });
    group.finish();
}

criterion_group!(benches, bench_farm, bench_rebuild);
criterion_main!(benches);
