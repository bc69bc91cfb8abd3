use std::time::Instant;

use rand::rngs::SmallRng;
use rand::{Rng, SeedableRng};
use serde::Serialize;
use tracing::{info, warn, Level};

use shardsim::alloc::{self, AllocationResult, Strategy};
use shardsim::config::SimConfig;
use shardsim::interest::{self, CostModel};
use shardsim::optimizer::FocusOptimizer;
use shardsim::world::{self, MapBounds, World};

/// Per-strategy entry of the JSON run report
#[derive(Serialize)]
struct StrategyReport {
    strategy: &'static str,
    total_forwards: u64,
    forwards_by_server: Vec<u64>,
    player_counts: Vec<u32>,
    loads: Vec<f32>,
    feasible: bool,
    elapsed_ms: u128,
    #[serde(skip_serializing_if = "Option::is_none")]
    focus_trials: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    focus_extended: Option<bool>,
}

fn main() -> anyhow::Result<()> {
    // Load .env file if present
    dotenvy::dotenv().ok();

    // Initialize logging
    tracing_subscriber::fmt()
        .with_max_level(Level::INFO)
        .with_target(false)
        .init();

    info!("shardsim v{}", env!("CARGO_PKG_VERSION"));

    // Load configuration
    let config = SimConfig::load_or_default();
    config.validate()?;
    info!(
        "Configuration loaded: {} players, {} servers, map {}x{}, capacity {}, k={}, tries={}",
        config.player_count,
        config.server_count,
        config.map_size_x,
        config.map_size_y,
        config.server_capacity,
        config.viewable_players,
        config.number_of_tries
    );

    let root_seed = config.seed.unwrap_or_else(|| rand::thread_rng().gen());
    info!("Root seed: {}", root_seed);

    // One scattered population shared by every strategy
    let bounds = MapBounds::new(config.map_size_x, config.map_size_y);
    let mut rng = SmallRng::seed_from_u64(root_seed);
    let players = world::scatter_players(config.player_count, bounds, &mut rng);
    let mut snapshot = World::new(players, config.server_count, config.server_capacity, bounds);

    let player_index = snapshot.build_player_index();
    interest::compute_neighbors(&mut snapshot, &player_index, config.viewable_players);

    let cost = CostModel::new(config.server_capacity, config.forward_weight)?;
    let mut reports = Vec::new();

    for strategy in [Strategy::Hashing, Strategy::FixedPartition, Strategy::Grid] {
        let started = Instant::now();
        let mut trial_world = snapshot.clone();
        alloc::allocate(&mut trial_world, strategy, config.capacity_policy, &mut rng);
        let result = interest::evaluate(&mut trial_world, &cost, root_seed)?;
        let elapsed = started.elapsed();

        log_result(strategy.name(), &result, &trial_world);
        reports.push(StrategyReport {
            strategy: strategy.name(),
            total_forwards: result.total_forwards,
            forwards_by_server: result.forwards_by_server.clone(),
            player_counts: trial_world.servers.iter().map(|s| s.player_count).collect(),
            loads: result.loads.clone(),
            feasible: result.feasible,
            elapsed_ms: elapsed.as_millis(),
            focus_trials: None,
            focus_extended: None,
        });
    }

    // Focus runs its full bounded search
    let started = Instant::now();
    let (focus_world, outcome) = FocusOptimizer::new(&config, cost, root_seed).run(&snapshot)?;
    let elapsed = started.elapsed();

    log_result("focus", &outcome.best.result, &focus_world);
    info!(
        "Focus search: {} trials in {:.3}s{}",
        outcome.trials.len(),
        outcome.total_elapsed.as_secs_f64(),
        if outcome.extended { " (budget extended)" } else { "" }
    );
    reports.push(StrategyReport {
        strategy: "focus",
        total_forwards: outcome.best.result.total_forwards,
        forwards_by_server: outcome.best.result.forwards_by_server.clone(),
        player_counts: outcome.best.player_counts.clone(),
        loads: outcome.best.result.loads.clone(),
        feasible: outcome.best.result.feasible,
        elapsed_ms: elapsed.as_millis(),
        focus_trials: Some(outcome.trials.len() as u32),
        focus_extended: Some(outcome.extended),
    });

    println!("{}", serde_json::to_string_pretty(&reports)?);
    Ok(())
}

fn log_result(name: &str, result: &AllocationResult, world: &World) {
    if !result.feasible {
        warn!("{}: unviable partitioning", name);
    }
    info!("{}: {} total forwards", name, result.total_forwards);
    info!("{}: server loads {:?}", name, result.loads);
    info!(
        "{}: player counts {:?}",
        name,
        world.servers.iter().map(|s| s.player_count).collect::<Vec<_>>()
    );
}
