//! Capacity outcomes and the least-loaded fallback
//!
//! Placement on a full server is an ordinary outcome value, not an error:
//! strategies match on [`AssignOutcome`] and fall back explicitly.

use crate::world::{Player, Server, ServerId};

/// Result of attempting to place a player on a specific server
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AssignOutcome {
    /// Player was placed on the server
    Assigned(ServerId),
    /// Server is at capacity; caller must fall back
    Overflow,
}

/// Try to place a player on a specific server, rejecting when full
pub fn try_assign(player: &mut Player, server: &mut Server) -> AssignOutcome {
    if server.is_full() {
        return AssignOutcome::Overflow;
    }
    server.player_count += 1;
    player.server = Some(server.id);
    AssignOutcome::Assigned(server.id)
}

/// Last-resort placement: the first server with the strictly smallest
/// occupancy in id order
///
/// Does not itself check capacity - when every server is full this pushes
/// one over, and the overflow surfaces through the load feasibility check
/// rather than being absorbed here.
pub fn reassign_to_least_loaded(player: &mut Player, servers: &mut [Server]) -> ServerId {
    debug_assert!(!servers.is_empty(), "world must have at least one server");
    let mut best = 0usize;
    for (i, server) in servers.iter().enumerate() {
        if server.player_count < servers[best].player_count {
            best = i;
        }
    }
    servers[best].player_count += 1;
    player.server = Some(servers[best].id);
    servers[best].id
}
