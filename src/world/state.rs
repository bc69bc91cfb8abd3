//! Simulation state: players, servers, and the run snapshot
//!
//! Fixed-shape records with typed ids; the allocation strategies and the
//! evaluator mutate `server`, `player_count`, `position`, and `load`, and
//! the optimizer clears them between trials via [`World::reset_allocations`].

use smallvec::SmallVec;

use crate::util::vec2::Vec2;
use crate::world::spatial::SpatialIndex;
use crate::world::MapBounds;

/// Unique player identifier, dense in `0..player_count`
pub type PlayerId = u32;

/// Unique server identifier, dense in `0..server_count`
pub type ServerId = u32;

/// A player in the world snapshot
#[derive(Debug, Clone, PartialEq)]
pub struct Player {
    pub id: PlayerId,
    /// Position in world space, fixed for the lifetime of a run
    pub position: Vec2,
    /// Hosting server, set during allocation and cleared between trials
    pub server: Option<ServerId>,
    /// Nearest other players, nearest first, excluding this player
    pub neighbors: SmallVec<[PlayerId; 16]>,
}

impl Player {
    pub fn new(id: PlayerId, position: Vec2) -> Self {
        Self {
            id,
            position,
            server: None,
            neighbors: SmallVec::new(),
        }
    }
}

/// A server process hosting a slice of the player population
#[derive(Debug, Clone, PartialEq)]
pub struct Server {
    pub id: ServerId,
    /// Authoritative occupancy counter
    pub player_count: u32,
    pub capacity: u32,
    /// Focus point, set only by the focus strategy
    pub position: Option<Vec2>,
    /// Load factor from the last evaluation
    pub load: f32,
}

impl Server {
    pub fn new(id: ServerId, capacity: u32) -> Self {
        Self {
            id,
            player_count: 0,
            capacity,
            position: None,
            load: 0.0,
        }
    }

    #[inline]
    pub fn is_full(&self) -> bool {
        self.player_count >= self.capacity
    }
}

/// The full mutable state of one simulation run
#[derive(Debug, Clone, PartialEq)]
pub struct World {
    pub players: Vec<Player>,
    pub servers: Vec<Server>,
    pub bounds: MapBounds,
}

impl World {
    pub fn new(players: Vec<Player>, server_count: usize, server_capacity: u32, bounds: MapBounds) -> Self {
        let servers = (0..server_count)
            .map(|id| Server::new(id as ServerId, server_capacity))
            .collect();
        Self {
            players,
            servers,
            bounds,
        }
    }

    /// Clear every per-trial field back to the unallocated baseline
    ///
    /// Idempotent; the focus search calls this between trials so no
    /// assignment or occupancy state leaks from one trial into the next.
    pub fn reset_allocations(&mut self) {
        for player in &mut self.players {
            player.server = None;
        }
        for server in &mut self.servers {
            server.player_count = 0;
            server.position = None;
            server.load = 0.0;
        }
    }

    /// Build the player position index for neighbor queries
    pub fn build_player_index(&self) -> SpatialIndex {
        let mut index = SpatialIndex::with_expected(self.bounds, self.players.len());
        for player in &self.players {
            index.insert(player.id, player.position);
        }
        index
    }

    /// Restore a recorded assignment (and optional focus points) onto this
    /// world, recomputing occupancy counts from scratch
    pub fn apply_assignment(&mut self, assignment: &[ServerId], focus_points: Option<&[Vec2]>) {
        self.reset_allocations();
        for (player, &server_id) in self.players.iter_mut().zip(assignment.iter()) {
            player.server = Some(server_id);
            self.servers[server_id as usize].player_count += 1;
        }
        if let Some(points) = focus_points {
            for (server, &point) in self.servers.iter_mut().zip(points.iter()) {
                server.position = Some(point);
            }
        }
    }

    /// Occupancy recomputed from player assignments (invariant checking)
    pub fn counts_from_assignments(&self) -> Vec<u32> {
        let mut counts = vec![0u32; self.servers.len()];
        for player in &self.players {
            if let Some(server_id) = player.server {
                counts[server_id as usize] += 1;
            }
        }
        counts
    }
}
