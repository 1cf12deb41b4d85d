//! Broad-phase spatial hash grid.
//!
//! Entities are bucketed into square cells keyed by `floor(coord / cell)`.
//! An entity is inserted into every cell its bounding square overlaps, and
//! queries scan the covered cells plus a one-cell margin, so any entity
//! whose circle can touch the query circle is returned. False positives are
//! expected; the narrow phase filters them.
//!
//! A bounded grid clamps every cell range to its bounds. Clamping is
//! monotone, so boxes that overlap still share a cell after clamping, and the
//! work per entity stays bounded however large its radius.

use std::collections::HashMap;

use crate::components::EntityId;
use crate::math::Vec2;

type CellKey = (i32, i32);

/// Uniform hash grid rebuilt every tick.
#[derive(Debug, Clone)]
pub struct SpatialHashGrid {
    cell_size: f32,
    cells: HashMap<CellKey, Vec<EntityId>>,
    entries: usize,
    bounds: Option<(CellKey, CellKey)>,
}

impl SpatialHashGrid {
    /// Empty grid with the given cell edge length.
    #[must_use]
    pub fn new(cell_size: f32) -> Self {
        let cell_size = if cell_size.is_finite() && cell_size > 0.0 {
            cell_size
        } else {
            100.0
        };
        Self {
            cell_size,
            cells: HashMap::new(),
            entries: 0,
            bounds: None,
        }
    }

    /// Grid whose cell ranges are clamped to the rectangle `min..=max`.
    #[must_use]
    pub fn with_bounds(cell_size: f32, min: Vec2, max: Vec2) -> Self {
        let mut grid = Self::new(cell_size);
        if min.is_finite() && max.is_finite() && min.x <= max.x && min.y <= max.y {
            grid.bounds = Some((grid.key(min), grid.key(max)));
        }
        grid
    }

    /// Cell edge length.
    #[must_use]
    pub const fn cell_size(&self) -> f32 {
        self.cell_size
    }

    fn cell_coord(&self, v: f32) -> i32 {
        (v / self.cell_size).floor() as i32
    }

    fn key(&self, pos: Vec2) -> CellKey {
        (self.cell_coord(pos.x), self.cell_coord(pos.y))
    }

    fn clamp_range(&self, min: CellKey, max: CellKey) -> (CellKey, CellKey) {
        match self.bounds {
            Some((lo, hi)) => (
                (min.0.clamp(lo.0, hi.0), min.1.clamp(lo.1, hi.1)),
                (max.0.clamp(lo.0, hi.0), max.1.clamp(lo.1, hi.1)),
            ),
            None => (min, max),
        }
    }

    /// Remove every entry, keeping allocated buckets.
    pub fn clear(&mut self) {
        for bucket in self.cells.values_mut() {
            bucket.clear();
        }
        self.entries = 0;
    }

    /// Insert an entity into every cell its bounding square overlaps.
    pub fn insert(&mut self, id: EntityId, pos: Vec2, radius: f32) {
        if !pos.is_finite() {
            return;
        }
        let radius = radius.max(0.0);
        let ((min_x, min_y), (max_x, max_y)) = self.clamp_range(
            self.key(pos - Vec2::new(radius, radius)),
            self.key(pos + Vec2::new(radius, radius)),
        );
        for cx in min_x..=max_x {
            for cy in min_y..=max_y {
                self.cells.entry((cx, cy)).or_default().push(id);
                self.entries += 1;
            }
        }
    }

    /// Rebuild from `(id, position, radius)` triples.
    pub fn rebuild(&mut self, items: impl IntoIterator<Item = (EntityId, Vec2, f32)>) {
        self.clear();
        for (id, pos, radius) in items {
            self.insert(id, pos, radius);
        }
    }

    /// Candidate ids near a circle, deduplicated and ascending.
    ///
    /// `exclude` is omitted from the result (usually the querying entity).
    #[must_use]
    pub fn query(&self, pos: Vec2, radius: f32, exclude: Option<EntityId>) -> Vec<EntityId> {
        if !pos.is_finite() {
            return Vec::new();
        }
        let radius = radius.max(0.0);
        let (min_x, min_y) = self.key(pos - Vec2::new(radius, radius));
        let (max_x, max_y) = self.key(pos + Vec2::new(radius, radius));
        let ((min_x, min_y), (max_x, max_y)) = self.clamp_range(
            (min_x.saturating_sub(1), min_y.saturating_sub(1)),
            (max_x.saturating_add(1), max_y.saturating_add(1)),
        );

        let span = (i64::from(max_x) - i64::from(min_x) + 1)
            * (i64::from(max_y) - i64::from(min_y) + 1);

        let mut out = Vec::new();
        if span > self.cells.len() as i64 {
            // Query covers more cells than exist; walk the buckets instead.
            for (&(cx, cy), bucket) in &self.cells {
                if cx >= min_x && cx <= max_x && cy >= min_y && cy <= max_y {
                    out.extend_from_slice(bucket);
                }
            }
        } else {
            for cx in min_x..=max_x {
                for cy in min_y..=max_y {
                    if let Some(bucket) = self.cells.get(&(cx, cy)) {
                        out.extend_from_slice(bucket);
                    }
                }
            }
        }
        out.sort_unstable();
        out.dedup();
        if let Some(skip) = exclude {
            out.retain(|&id| id != skip);
        }
        out
    }

    /// Number of non-empty cells.
    #[must_use]
    pub fn occupied_cells(&self) -> usize {
        self.cells.values().filter(|b| !b.is_empty()).count()
    }

    /// Total cell entries (an entity spanning four cells counts four times).
    #[must_use]
    pub const fn entry_count(&self) -> usize {
        self.entries
    }
}
