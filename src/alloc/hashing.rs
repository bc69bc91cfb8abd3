//! Id-modulo allocation
//!
//! `server = player_id mod server_count`. Uses no spatial information; the
//! point of the strategy is a deterministic O(N) baseline for the evaluator.

use tracing::debug;

use crate::config::CapacityPolicy;
use crate::world::{ServerId, World};

pub fn allocate(world: &mut World, policy: CapacityPolicy) {
    let World {
        players, servers, ..
    } = world;
    let server_count = servers.len();

    for player in players.iter_mut() {
        let preferred = (player.id as usize % server_count) as ServerId;
        super::place_with_policy(player, servers, preferred, policy);
        debug!("Player {} allocated to server {:?}", player.id, player.server);
    }
}
