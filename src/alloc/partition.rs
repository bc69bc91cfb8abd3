//! Fixed partition allocation
//!
//! Splits the map into `server_count` contiguous x-bands of equal width and
//! assigns each player to the band containing it. There is no y-axis split;
//! a cut point itself belongs to the band above it.

use tracing::debug;

use crate::config::CapacityPolicy;
use crate::world::{ServerId, World};

/// The `server_count - 1` evenly spaced cut points across the map width
pub fn cut_points(server_count: usize, map_width: f32) -> Vec<f32> {
    let band_width = map_width / server_count as f32;
    (1..server_count).map(|i| i as f32 * band_width).collect()
}

/// Band lookup: leftmost band is server 0, band i captures
/// `cut[i-1] <= x < cut[i]`, and everything at or beyond the last cut goes
/// to the last server
fn band_for(x: f32, cuts: &[f32]) -> ServerId {
    if cuts.is_empty() {
        return 0;
    }
    if x < cuts[0] {
        return 0;
    }
    for i in 1..cuts.len() {
        if x < cuts[i] {
            return i as ServerId;
        }
    }
    cuts.len() as ServerId
}

pub fn allocate(world: &mut World, policy: CapacityPolicy) {
    let cuts = cut_points(world.servers.len(), world.bounds.width);
    let World {
        players, servers, ..
    } = world;

    for player in players.iter_mut() {
        let preferred = band_for(player.position.x, &cuts);
        super::place_with_policy(player, servers, preferred, policy);
        debug!(
            "Player {} allocated to server {:?} at x={}",
            player.id, player.server, player.position.x
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::util::vec2::Vec2;
    use crate::world::{MapBounds, Player};

    fn world_at_xs(xs: &[f32], server_count: usize) -> World {
        let players = xs
            .iter()
            .enumerate()
            .map(|(i, &x)| Player::new(i as u32, Vec2::new(x, 50.0)))
            .collect();
        World::new(players, server_count, 100, MapBounds::new(100.0, 100.0))
    }

    #[test]
    fn test_two_servers_single_cut() {
        // Map width 100, 2 servers -> one cut at x=50; the boundary itself
        // belongs to the upper band
        assert_eq!(cut_points(2, 100.0), vec![50.0]);

        let mut world = world_at_xs(&[30.0, 70.0, 50.0], 2);
        allocate(&mut world, CapacityPolicy::Unchecked);

        let assignment: Vec<_> = world.players.iter().map(|p| p.server.unwrap()).collect();
        assert_eq!(assignment, vec![0, 1, 1]);
    }

    #[test]
    fn test_middle_bands() {
        // 4 servers -> cuts at 25, 50, 75
        let mut world = world_at_xs(&[10.0, 25.0, 40.0, 60.0, 75.0, 99.0], 4);
        allocate(&mut world, CapacityPolicy::Unchecked);

        let assignment: Vec<_> = world.players.iter().map(|p| p.server.unwrap()).collect();
        assert_eq!(assignment, vec![0, 1, 1, 2, 3, 3]);
    }

    #[test]
    fn test_single_server_takes_everything() {
        let mut world = world_at_xs(&[0.0, 50.0, 100.0], 1);
        allocate(&mut world, CapacityPolicy::Unchecked);

        assert!(world.players.iter().all(|p| p.server == Some(0)));
        assert_eq!(world.servers[0].player_count, 3);
    }

    #[test]
    fn test_counts_match_bands() {
        let mut world = world_at_xs(&[5.0, 10.0, 55.0, 95.0], 2);
        allocate(&mut world, CapacityPolicy::Unchecked);
        assert_eq!(world.servers[0].player_count, 2);
        assert_eq!(world.servers[1].player_count, 2);
    }
}
