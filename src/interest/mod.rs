//! Interest evaluation
//!
//! Given a complete allocation, computes each player's neighbor set, the
//! per-server interest groups (foreign neighbor ids a server must receive
//! forwarded updates for), forward counts, and the load-factor feasibility
//! check.

pub mod bloom;

pub use self::bloom::InterestGroup;

use rustc_hash::FxHashSet;
use smallvec::SmallVec;

use crate::alloc::AllocationResult;
use crate::world::{PlayerId, ServerId, SpatialIndex, World};

/// Load-factor ceiling per server; any server above it makes the
/// partitioning infeasible
pub const LOAD_LIMIT: f32 = 100.0;

/// Cost model errors
#[derive(Debug, Clone, thiserror::Error)]
pub enum CostModelError {
    #[error("server capacity must be at least 1")]
    ZeroCapacity,
    #[error("forward weight must be in (0, 1], got {0}")]
    InvalidForwardWeight(f32),
}

/// Evaluation errors
#[derive(Debug, Clone, thiserror::Error)]
pub enum EvalError {
    #[error("player {0} has no server assignment")]
    UnassignedPlayer(PlayerId),
}

/// Per-server cost model: hosting cost per player and forwarding cost per
/// interest entry
#[derive(Debug, Clone, Copy)]
pub struct CostModel {
    own_cost: f32,
    forward_cost: f32,
}

impl CostModel {
    /// Construction fails fast on values that would divide by zero
    pub fn new(server_capacity: u32, forward_weight: f32) -> Result<Self, CostModelError> {
        if server_capacity == 0 {
            return Err(CostModelError::ZeroCapacity);
        }
        if forward_weight <= 0.0 || forward_weight > 1.0 {
            return Err(CostModelError::InvalidForwardWeight(forward_weight));
        }
        let own_cost = LOAD_LIMIT / server_capacity as f32;
        Ok(Self {
            own_cost,
            forward_cost: own_cost / forward_weight,
        })
    }

    #[inline]
    pub fn own_cost(&self) -> f32 {
        self.own_cost
    }

    #[inline]
    pub fn forward_cost(&self) -> f32 {
        self.forward_cost
    }
}

/// Compute and store each player's k nearest neighbors, nearest first
///
/// Asking for more neighbors than exist is a normal boundary, not a fault:
/// players simply end up with fewer than k.
pub fn compute_neighbors(world: &mut World, index: &SpatialIndex, k: usize) {
    for player in &mut world.players {
        player.neighbors =
            SmallVec::from_vec(index.k_nearest_excluding(player.position, k, player.id));
    }
}

/// Extract the complete assignment, indexed by player id
fn assignment_of(world: &World) -> Result<Vec<ServerId>, EvalError> {
    let mut assignment = vec![0 as ServerId; world.players.len()];
    for player in &world.players {
        let server = player.server.ok_or(EvalError::UnassignedPlayer(player.id))?;
        assignment[player.id as usize] = server;
    }
    Ok(assignment)
}

/// Derive a per-server filter seed from the evaluation seed
fn group_seed(seed: u64, server_id: usize) -> [u8; 32] {
    let mixed = seed ^ 0x9E37_79B9_7F4A_7C15u64.wrapping_mul(server_id as u64 + 1);
    let mut out = [0u8; 32];
    for (i, chunk) in out.chunks_exact_mut(8).enumerate() {
        chunk.copy_from_slice(&mixed.rotate_left((i as u32) * 16).to_le_bytes());
    }
    out
}

/// Build one interest group per server
///
/// For every player, each neighbor hosted on a *different* server is
/// recorded in the player's server's group. Group sizing follows the
/// reference: capacity `player_count^2` at a 0.1 false-positive rate -
/// membership only needs to be cheap and approximately right.
pub fn build_interest_groups(
    world: &World,
    assignment: &[ServerId],
    seed: u64,
) -> Vec<InterestGroup> {
    let expected = world.players.len() * world.players.len();
    let mut groups: Vec<InterestGroup> = (0..world.servers.len())
        .map(|server_id| InterestGroup::with_capacity(expected, &group_seed(seed, server_id)))
        .collect();

    for player in &world.players {
        let own = assignment[player.id as usize];
        for &neighbor in &player.neighbors {
            if assignment[neighbor as usize] != own {
                groups[own as usize].insert(neighbor);
            }
        }
    }
    groups
}

/// Per-server forward counts and their total
pub fn forward_counts(groups: &[InterestGroup]) -> (u64, Vec<u64>) {
    let by_server: Vec<u64> = groups.iter().map(|group| group.count()).collect();
    (by_server.iter().sum(), by_server)
}

/// Update per-server load factors and report overall feasibility
///
/// `load = player_count * own_cost + forwards * forward_cost`; a run is
/// feasible when every server stays at or under [`LOAD_LIMIT`].
pub fn load_factors(world: &mut World, cost: &CostModel, forwards_by_server: &[u64]) -> bool {
    let mut feasible = true;
    for server in &mut world.servers {
        server.load = server.player_count as f32 * cost.own_cost()
            + forwards_by_server[server.id as usize] as f32 * cost.forward_cost();
        if server.load > LOAD_LIMIT {
            feasible = false;
        }
    }
    feasible
}

/// Evaluate a complete allocation with the probabilistic interest groups
pub fn evaluate(world: &mut World, cost: &CostModel, seed: u64) -> Result<AllocationResult, EvalError> {
    let assignment = assignment_of(world)?;
    let groups = build_interest_groups(world, &assignment, seed);
    let (total_forwards, forwards_by_server) = forward_counts(&groups);
    let feasible = load_factors(world, cost, &forwards_by_server);
    let loads = world.servers.iter().map(|s| s.load).collect();

    Ok(AllocationResult {
        assignment,
        total_forwards,
        forwards_by_server,
        loads,
        feasible,
    })
}

/// Evaluate with precise set membership instead of the probabilistic groups
///
/// The exact sets never miss a distinct id, so these totals bound the
/// probabilistic ones from above; useful as a validation oracle.
pub fn evaluate_exact(world: &mut World, cost: &CostModel) -> Result<AllocationResult, EvalError> {
    let assignment = assignment_of(world)?;
    let mut sets: Vec<FxHashSet<PlayerId>> = vec![FxHashSet::default(); world.servers.len()];
    for player in &world.players {
        let own = assignment[player.id as usize];
        for &neighbor in &player.neighbors {
            if assignment[neighbor as usize] != own {
                sets[own as usize].insert(neighbor);
            }
        }
    }

    let forwards_by_server: Vec<u64> = sets.iter().map(|set| set.len() as u64).collect();
    let total_forwards = forwards_by_server.iter().sum();
    let feasible = load_factors(world, cost, &forwards_by_server);
    let loads = world.servers.iter().map(|s| s.load).collect();

    Ok(AllocationResult {
        assignment,
        total_forwards,
        forwards_by_server,
        loads,
        feasible,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::alloc::{self, Strategy};
    use crate::config::CapacityPolicy;
    use crate::util::vec2::Vec2;
    use crate::world::{self, MapBounds, Player};
    use rand::rngs::SmallRng;
    use rand::SeedableRng;

    fn line_world(count: usize, server_count: usize, capacity: u32) -> World {
        let players = (0..count)
            .map(|i| Player::new(i as u32, Vec2::new(i as f32 * 10.0, 50.0)))
            .collect();
        World::new(players, server_count, capacity, MapBounds::new(1000.0, 100.0))
    }

    #[test]
    fn test_cost_model_values() {
        let cost = CostModel::new(100, 0.5).unwrap();
        assert!((cost.own_cost() - 1.0).abs() < 1e-6);
        assert!((cost.forward_cost() - 2.0).abs() < 1e-6);
    }

    #[test]
    fn test_cost_model_rejects_invalid() {
        assert!(matches!(CostModel::new(0, 0.5), Err(CostModelError::ZeroCapacity)));
        assert!(matches!(
            CostModel::new(10, 0.0),
            Err(CostModelError::InvalidForwardWeight(_))
        ));
        assert!(matches!(
            CostModel::new(10, 1.5),
            Err(CostModelError::InvalidForwardWeight(_))
        ));
    }

    #[test]
    fn test_compute_neighbors_excludes_self_and_orders() {
        let mut world = line_world(4, 2, 10);
        let index = world.build_player_index();
        compute_neighbors(&mut world, &index, 2);

        assert_eq!(world.players[0].neighbors.as_slice(), &[1, 2]);
        assert_eq!(world.players[1].neighbors.as_slice(), &[0, 2]);
        assert_eq!(world.players[3].neighbors.as_slice(), &[2, 1]);
    }

    #[test]
    fn test_neighbor_boundary_returns_fewer() {
        // k larger than the population is a normal boundary case
        let mut world = line_world(3, 2, 10);
        let index = world.build_player_index();
        compute_neighbors(&mut world, &index, 10);

        for player in &world.players {
            assert_eq!(player.neighbors.len(), 2);
        }
    }

    #[test]
    fn test_forwards_sum_invariant() {
        let mut world = line_world(6, 2, 10);
        let index = world.build_player_index();
        compute_neighbors(&mut world, &index, 3);
        let mut rng = SmallRng::seed_from_u64(0);
        alloc::allocate(&mut world, Strategy::Hashing, CapacityPolicy::Unchecked, &mut rng);

        let cost = CostModel::new(10, 0.5).unwrap();
        let result = evaluate(&mut world, &cost, 42).unwrap();

        assert_eq!(
            result.forwards_by_server.iter().sum::<u64>(),
            result.total_forwards
        );
        assert_eq!(result.forwards_by_server.len(), 2);
        assert_eq!(result.assignment.len(), 6);
    }

    #[test]
    fn test_only_foreign_neighbors_are_forwarded() {
        // Everyone on one server: no neighbor is foreign, so zero forwards
        let mut world = line_world(5, 1, 10);
        let index = world.build_player_index();
        compute_neighbors(&mut world, &index, 2);
        for player in &mut world.players {
            player.server = Some(0);
        }
        world.servers[0].player_count = 5;

        let cost = CostModel::new(10, 0.5).unwrap();
        let result = evaluate(&mut world, &cost, 0).unwrap();
        assert_eq!(result.total_forwards, 0);
    }

    #[test]
    fn test_probabilistic_never_exceeds_exact() {
        let bounds = MapBounds::new(1920.0, 1080.0);
        let mut rng = SmallRng::seed_from_u64(21);
        let players = world::scatter_players(300, bounds, &mut rng);
        let mut world = World::new(players, 4, 100, bounds);
        let index = world.build_player_index();
        compute_neighbors(&mut world, &index, 12);
        alloc::allocate(&mut world, Strategy::Grid, CapacityPolicy::Unchecked, &mut rng);

        let cost = CostModel::new(100, 0.5).unwrap();
        let approx = evaluate(&mut world.clone(), &cost, 7).unwrap();
        let exact = evaluate_exact(&mut world, &cost).unwrap();

        assert!(
            approx.total_forwards <= exact.total_forwards,
            "approximate count {} must not exceed exact count {}",
            approx.total_forwards,
            exact.total_forwards
        );
        for (a, e) in approx.forwards_by_server.iter().zip(exact.forwards_by_server.iter()) {
            assert!(a <= e);
        }
    }

    #[test]
    fn test_overload_flips_feasibility() {
        // Capacity 1 with several players stacked on one server: hosting
        // cost alone exceeds the limit
        let mut world = line_world(4, 2, 1);
        let index = world.build_player_index();
        compute_neighbors(&mut world, &index, 1);
        for player in &mut world.players {
            player.server = Some(0);
        }
        world.servers[0].player_count = 4;

        let cost = CostModel::new(1, 1.0).unwrap();
        let result = evaluate(&mut world, &cost, 0).unwrap();
        assert!(!result.feasible);
        assert!(world.servers[0].load > LOAD_LIMIT);
    }

    #[test]
    fn test_feasible_when_under_limit() {
        let mut world = line_world(4, 2, 100);
        let index = world.build_player_index();
        compute_neighbors(&mut world, &index, 1);
        let mut rng = SmallRng::seed_from_u64(0);
        alloc::allocate(&mut world, Strategy::Hashing, CapacityPolicy::Unchecked, &mut rng);

        let cost = CostModel::new(100, 0.5).unwrap();
        let result = evaluate(&mut world, &cost, 0).unwrap();
        assert!(result.feasible);
    }

    #[test]
    fn test_evaluate_rejects_incomplete_assignment() {
        let mut world = line_world(3, 2, 10);
        world.players[1].server = Some(0);

        let cost = CostModel::new(10, 0.5).unwrap();
        assert!(matches!(
            evaluate(&mut world, &cost, 0),
            Err(EvalError::UnassignedPlayer(_))
        ));
    }
}
