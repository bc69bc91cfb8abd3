//! Focus allocation
//!
//! The only capacity-aware, spatially adaptive strategy. Each pass drops one
//! candidate "focus point" per server near a randomly chosen player, rebuilds
//! the server spatial index from those points, and sends every player to its
//! nearest focus server. Capacity is enforced strictly at assignment time;
//! a full server (or an empty server index) falls back to the least-loaded
//! server.

use rand::rngs::SmallRng;
use rand::seq::SliceRandom;
use rand::Rng;
use tracing::debug;

use crate::util::vec2::Vec2;
use crate::world::{MapBounds, Player, ServerId, SpatialIndex, World};

use super::capacity::{self, AssignOutcome};

/// Minimum jitter added to a focus point per axis, world units
const FOCUS_JITTER_MIN: f32 = 5.0;
/// Maximum jitter added to a focus point per axis, world units
const FOCUS_JITTER_MAX: f32 = 10.0;

/// Pick one candidate focus point per server: a randomly chosen player's
/// position nudged by a small jitter and clamped to the map
pub fn pick_focus_points(
    players: &[Player],
    server_count: usize,
    bounds: MapBounds,
    rng: &mut SmallRng,
) -> Vec<Vec2> {
    (0..server_count)
        .map(|_| {
            let base = players.choose(rng).map(|p| p.position).unwrap_or(Vec2::ZERO);
            let jitter = Vec2::new(
                rng.gen_range(FOCUS_JITTER_MIN..FOCUS_JITTER_MAX),
                rng.gen_range(FOCUS_JITTER_MIN..FOCUS_JITTER_MAX),
            );
            bounds.clamp(base + jitter)
        })
        .collect()
}

/// Assign every player to its nearest focus server through the strict
/// capacity gate
pub fn assign_players(world: &mut World, server_index: &SpatialIndex) {
    let World {
        players, servers, ..
    } = world;

    for player in players.iter_mut() {
        match server_index.nearest(player.position) {
            // Degenerate: no candidate server reachable, a normal
            // "no choice" outcome
            None => {
                capacity::reassign_to_least_loaded(player, servers);
            }
            Some(server_id) => {
                match capacity::try_assign(player, &mut servers[server_id as usize]) {
                    AssignOutcome::Assigned(_) => {}
                    AssignOutcome::Overflow => {
                        capacity::reassign_to_least_loaded(player, servers);
                    }
                }
            }
        }
        debug!("Player {} allocated to server {:?}", player.id, player.server);
    }
}

/// One full focus pass: choose focus points, rebuild the server index,
/// assign all players
pub fn allocate(world: &mut World, rng: &mut SmallRng) {
    let points = pick_focus_points(&world.players, world.servers.len(), world.bounds, rng);
    for (server, &point) in world.servers.iter_mut().zip(points.iter()) {
        server.position = Some(point);
    }

    let mut server_index = SpatialIndex::with_expected(world.bounds, world.servers.len());
    for (i, &point) in points.iter().enumerate() {
        server_index.insert(i as ServerId, point);
    }

    assign_players(world, &server_index);
}
