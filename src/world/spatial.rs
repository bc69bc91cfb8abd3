//! Spatial hash index for nearest-neighbor queries
//!
//! Buckets entity positions into a uniform cell grid and answers k-nearest
//! queries by expanding rings of cells around the query point. Ties are
//! broken by insertion order (a monotonic sequence number) so a fixed
//! insertion sequence always yields the same query results.
//!
//! Both the player index and the per-trial server index are instances of
//! this type; the server index is rebuilt every focus trial via `clear`.

use hashbrown::HashMap;

use crate::util::vec2::Vec2;
use crate::world::MapBounds;

/// Grid cell key - (x, y) cell coordinates
type CellKey = (i32, i32);

/// Initial capacity for cell vectors
const CELL_INITIAL_CAPACITY: usize = 8;

#[derive(Debug, Clone, Copy)]
struct Entry {
    id: u32,
    position: Vec2,
    seq: u64,
}

/// Spatial hash index over entity ids
pub struct SpatialIndex {
    /// Cell size in world units
    cell_size: f32,
    /// Inverse cell size for fast position-to-cell conversion
    inv_cell_size: f32,
    /// Map from cell key to entries in that cell
    cells: HashMap<CellKey, Vec<Entry>>,
    /// Number of entries currently indexed
    len: usize,
    /// Insertion sequence counter, used for deterministic tie-breaks
    next_seq: u64,
    /// Bounding box of occupied cells; grows on insert, reset on clear
    occupied: Option<(CellKey, CellKey)>,
}

impl SpatialIndex {
    /// Create an index with the given cell size
    pub fn new(cell_size: f32) -> Self {
        let cell_size = cell_size.max(f32::EPSILON);
        Self {
            cell_size,
            inv_cell_size: 1.0 / cell_size,
            cells: HashMap::new(),
            len: 0,
            next_seq: 0,
            occupied: None,
        }
    }

    /// Create an index sized so cells hold a handful of entries at the
    /// expected population density
    pub fn with_expected(bounds: MapBounds, expected: usize) -> Self {
        let area = bounds.width * bounds.height;
        let cell_size = (area / expected.max(1) as f32).sqrt().max(1.0);
        Self::new(cell_size)
    }

    #[inline]
    fn position_to_cell(&self, position: Vec2) -> CellKey {
        (
            (position.x * self.inv_cell_size).floor() as i32,
            (position.y * self.inv_cell_size).floor() as i32,
        )
    }

    /// Insert an entity at a position
    pub fn insert(&mut self, id: u32, position: Vec2) {
        let key = self.position_to_cell(position);
        let seq = self.next_seq;
        self.next_seq += 1;
        self.cells
            .entry(key)
            .or_insert_with(|| Vec::with_capacity(CELL_INITIAL_CAPACITY))
            .push(Entry { id, position, seq });
        self.len += 1;

        self.occupied = Some(match self.occupied {
            None => (key, key),
            Some((min, max)) => (
                (min.0.min(key.0), min.1.min(key.1)),
                (max.0.max(key.0), max.1.max(key.1)),
            ),
        });
    }

    /// Remove an entity previously inserted at this position
    /// Returns true if the entity was found and removed
    pub fn remove(&mut self, id: u32, position: Vec2) -> bool {
        let key = self.position_to_cell(position);
        if let Some(cell) = self.cells.get_mut(&key) {
            if let Some(idx) = cell.iter().position(|entry| entry.id == id) {
                cell.swap_remove(idx);
                self.len -= 1;
                // Occupied box is not shrunk; it only bounds the ring search
                return true;
            }
        }
        false
    }

    /// Drop all entries, keeping cell allocations for cheap rebuilds
    pub fn clear(&mut self) {
        for cell in self.cells.values_mut() {
            cell.clear();
        }
        self.len = 0;
        self.next_seq = 0;
        self.occupied = None;
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// The single nearest entity, or `None` when the index is empty
    pub fn nearest(&self, position: Vec2) -> Option<u32> {
        self.k_nearest_inner(position, 1, None).into_iter().next()
    }

    /// Up to k entity ids, nearest first; empty when the index is empty
    pub fn k_nearest(&self, position: Vec2, k: usize) -> Vec<u32> {
        self.k_nearest_inner(position, k, None)
    }

    /// Up to k entity ids, nearest first, skipping the querying entity's own
    /// id so a player never lists itself as its neighbor
    pub fn k_nearest_excluding(&self, position: Vec2, k: usize, exclude: u32) -> Vec<u32> {
        self.k_nearest_inner(position, k, Some(exclude))
    }

    fn k_nearest_inner(&self, position: Vec2, k: usize, exclude: Option<u32>) -> Vec<u32> {
        if k == 0 || self.len == 0 {
            return Vec::new();
        }
        let Some((occ_min, occ_max)) = self.occupied else {
            return Vec::new();
        };

        let (cx, cy) = self.position_to_cell(position);
        // Once the ring passes the occupied box every entry has been seen
        let max_ring = (cx - occ_min.0)
            .abs()
            .max((occ_max.0 - cx).abs())
            .max((cy - occ_min.1).abs())
            .max((occ_max.1 - cy).abs());

        let mut candidates: Vec<(f32, u64, u32)> = Vec::new();
        let mut ring: i32 = 0;
        loop {
            self.collect_ring(cx, cy, ring, position, exclude, &mut candidates);

            if candidates.len() >= k {
                candidates.sort_unstable_by(|a, b| {
                    a.0.partial_cmp(&b.0)
                        .unwrap_or(std::cmp::Ordering::Equal)
                        .then(a.1.cmp(&b.1))
                });
                // Entries beyond this ring are at least ring * cell_size away
                let frontier = ring as f32 * self.cell_size;
                if candidates[k - 1].0 <= frontier * frontier {
                    break;
                }
            }
            if ring >= max_ring {
                break;
            }
            ring += 1;
        }

        candidates.sort_unstable_by(|a, b| {
            a.0.partial_cmp(&b.0)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then(a.1.cmp(&b.1))
        });
        candidates.truncate(k);
        candidates.into_iter().map(|(_, _, id)| id).collect()
    }

    /// Gather candidates from the cells at Chebyshev distance `ring`
    fn collect_ring(
        &self,
        cx: i32,
        cy: i32,
        ring: i32,
        position: Vec2,
        exclude: Option<u32>,
        candidates: &mut Vec<(f32, u64, u32)>,
    ) {
        let mut visit = |key: CellKey| {
            if let Some(cell) = self.cells.get(&key) {
                for entry in cell {
                    if exclude == Some(entry.id) {
                        continue;
                    }
                    let dist_sq = entry.position.distance_sq_to(position);
                    candidates.push((dist_sq, entry.seq, entry.id));
                }
            }
        };

        if ring == 0 {
            visit((cx, cy));
            return;
        }
        for x in (cx - ring)..=(cx + ring) {
            visit((x, cy - ring));
            visit((x, cy + ring));
        }
        for y in (cy - ring + 1)..(cy + ring) {
            visit((cx - ring, y));
            visit((cx + ring, y));
        }
    }
}
