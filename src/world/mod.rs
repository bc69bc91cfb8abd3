//! World snapshot: map bounds, player population, spatial indexing
//!
//! A simulation run works on one immutable scatter of player positions;
//! everything the strategies mutate (assignments, occupancy counts, focus
//! positions) lives alongside it in [`state::World`] and is cleared between
//! trials.

pub mod spatial;
pub mod state;

pub use self::spatial::SpatialIndex;
pub use self::state::{Player, PlayerId, Server, ServerId, World};

use rand::rngs::SmallRng;
use rand::Rng;
use serde::Serialize;

use crate::util::vec2::Vec2;

/// Shape parameter of the Weibull scatter used for player positions
const SCATTER_SHAPE: f32 = 3.0;

/// Map rectangle anchored at the origin
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct MapBounds {
    pub width: f32,
    pub height: f32,
}

impl MapBounds {
    pub fn new(width: f32, height: f32) -> Self {
        Self { width, height }
    }

    #[inline]
    pub fn contains(&self, position: Vec2) -> bool {
        position.x >= 0.0 && position.x <= self.width && position.y >= 0.0 && position.y <= self.height
    }

    #[inline]
    pub fn clamp(&self, position: Vec2) -> Vec2 {
        position.clamp_to(Vec2::new(self.width, self.height))
    }
}

/// Generate a Weibull-distributed player scatter over the map
///
/// Samples each axis independently, normalizes by the per-axis maximum so
/// the scatter spans the whole rectangle, then scales to the map size. The
/// rest of the simulator treats the result as an opaque set of positions and
/// makes no uniformity assumptions.
pub fn scatter_players(count: usize, bounds: MapBounds, rng: &mut SmallRng) -> Vec<Player> {
    let mut xs = Vec::with_capacity(count);
    let mut ys = Vec::with_capacity(count);
    for _ in 0..count {
        xs.push(weibull_sample(rng));
        ys.push(weibull_sample(rng));
    }

    let x_max = xs.iter().copied().fold(f32::EPSILON, f32::max);
    let y_max = ys.iter().copied().fold(f32::EPSILON, f32::max);

    xs.iter()
        .zip(ys.iter())
        .enumerate()
        .map(|(i, (&x, &y))| {
            let position = Vec2::new(bounds.width * x / x_max, bounds.height * y / y_max);
            Player::new(i as PlayerId, position)
        })
        .collect()
}

/// One Weibull draw via inverse-transform sampling
#[inline]
fn weibull_sample(rng: &mut SmallRng) -> f32 {
    let u: f32 = rng.gen_range(0.0..1.0);
    (-(1.0 - u).ln()).powf(1.0 / SCATTER_SHAPE)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;

    #[test]
    fn test_bounds_contains_and_clamp() {
        let bounds = MapBounds::new(100.0, 50.0);
        assert!(bounds.contains(Vec2::new(0.0, 0.0)));
        assert!(bounds.contains(Vec2::new(100.0, 50.0)));
        assert!(!bounds.contains(Vec2::new(100.1, 10.0)));
        assert_eq!(bounds.clamp(Vec2::new(120.0, -3.0)), Vec2::new(100.0, 0.0));
    }

    #[test]
    fn test_scatter_stays_in_bounds() {
        let bounds = MapBounds::new(1920.0, 1080.0);
        let mut rng = SmallRng::seed_from_u64(7);
        let players = scatter_players(500, bounds, &mut rng);

        assert_eq!(players.len(), 500);
        for player in &players {
            assert!(bounds.contains(player.position), "player {} out of bounds", player.id);
        }
    }

    #[test]
    fn test_scatter_ids_are_dense() {
        let bounds = MapBounds::new(100.0, 100.0);
        let mut rng = SmallRng::seed_from_u64(7);
        let players = scatter_players(10, bounds, &mut rng);
        for (i, player) in players.iter().enumerate() {
            assert_eq!(player.id, i as PlayerId);
        }
    }

    #[test]
    fn test_scatter_deterministic_with_seed() {
        let bounds = MapBounds::new(1920.0, 1080.0);
        let a = scatter_players(100, bounds, &mut SmallRng::seed_from_u64(42));
        let b = scatter_players(100, bounds, &mut SmallRng::seed_from_u64(42));
        assert_eq!(a, b);
    }

    #[test]
    fn test_scatter_spans_both_axes() {
        // Per-axis normalization means the extreme sample lands on the edge
        let bounds = MapBounds::new(200.0, 80.0);
        let mut rng = SmallRng::seed_from_u64(3);
        let players = scatter_players(50, bounds, &mut rng);

        let x_max = players.iter().map(|p| p.position.x).fold(0.0, f32::max);
        let y_max = players.iter().map(|p| p.position.y).fold(0.0, f32::max);
        assert!((x_max - 200.0).abs() < 1e-3);
        assert!((y_max - 80.0).abs() < 1e-3);
    }
}
