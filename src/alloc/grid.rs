//! Grid allocation
//!
//! Partitions the map into a `ceil(sqrt(S)) x ceil(sqrt(S))` grid of equal
//! cells and numbers them row-major; when the grid has more cells than
//! servers, the excess cells share the last server id. A player lands in the
//! first enumerated cell whose rectangle contains it (bounds inclusive).

use tracing::debug;

use crate::config::CapacityPolicy;
use crate::util::vec2::Vec2;
use crate::world::{MapBounds, ServerId, World};

use super::capacity;

/// One grid cell and the server that owns it
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GridCell {
    pub min: Vec2,
    pub max: Vec2,
    pub server: ServerId,
}

impl GridCell {
    #[inline]
    fn contains(&self, position: Vec2) -> bool {
        position.x >= self.min.x
            && position.x <= self.max.x
            && position.y >= self.min.y
            && position.y <= self.max.y
    }
}

/// Build the row-major cell list for a server count
pub fn build_cells(server_count: usize, bounds: MapBounds) -> Vec<GridCell> {
    let dim = (server_count as f32).sqrt().ceil() as usize;
    let cell_width = bounds.width / dim as f32;
    let cell_height = bounds.height / dim as f32;

    let mut cells = Vec::with_capacity(dim * dim);
    for row in 0..dim {
        for col in 0..dim {
            let index = cells.len();
            cells.push(GridCell {
                min: Vec2::new(col as f32 * cell_width, row as f32 * cell_height),
                max: Vec2::new((col + 1) as f32 * cell_width, (row + 1) as f32 * cell_height),
                server: index.min(server_count - 1) as ServerId,
            });
        }
    }
    cells
}

pub fn allocate(world: &mut World, policy: CapacityPolicy) {
    let cells = build_cells(world.servers.len(), world.bounds);
    let World {
        players, servers, ..
    } = world;

    for player in players.iter_mut() {
        match cells.iter().find(|cell| cell.contains(player.position)) {
            Some(cell) => {
                super::place_with_policy(player, servers, cell.server, policy);
            }
            None => {
                // Position outside every cell (degenerate input): spatially
                // undeterminable, resolved like any other blocked placement
                capacity::reassign_to_least_loaded(player, servers);
            }
        }
        debug!("Player {} allocated to server {:?}", player.id, player.server);
    }
}
