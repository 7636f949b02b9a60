// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Polyframe Inc.

//! Graded mesh-size field

use crate::geometry::BoundingBox;
use ahash::AHashMap;
use nalgebra::Point3;

/// A single size restriction: the mesh size at `point` must not exceed `h`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SizeRestriction {
    pub point: Point3<f64>,
    pub h: f64,
}

/// Target mesh size field.
///
/// The size at a point is the smallest restriction grown linearly with
/// distance by `grading`, capped by the global `max_h`. Restrictions at
/// (numerically) the same position are merged keeping the smaller size.
///
/// Restrictions are bucketed in a uniform hash grid. A query visits cells in
/// growing shells around the query point and stops once no farther cell can
/// beat the current minimum.
#[derive(Debug, Clone)]
pub struct LocalH {
    max_h: f64,
    grading: f64,
    quantum: f64,
    cell_size: f64,
    bounding_box: BoundingBox,
    restrictions: Vec<SizeRestriction>,
    index: AHashMap<[i64; 3], usize>,
    cells: AHashMap<[i64; 3], Cell>,
    /// Occupied cell range, inclusive
    extent: Option<([i64; 3], [i64; 3])>,
    min_h: f64,
}

/// Restrictions falling into one grid cell
#[derive(Debug, Clone)]
struct Cell {
    members: Vec<usize>,
    min_h: f64,
}

/// Cells along the bounding box diagonal
const CELLS_PER_DIAMETER: f64 = 32.0;

impl LocalH {
    pub fn new(bounding_box: BoundingBox, max_h: f64, grading: f64) -> Self {
        let diameter = if bounding_box.is_empty() {
            0.0
        } else {
            bounding_box.diameter()
        };
        let quantum = diameter.max(1.0) * 1e-9;
        let cell_size = if diameter.is_finite() && diameter > 0.0 {
            diameter / CELLS_PER_DIAMETER
        } else {
            1.0
        };
        Self {
            max_h,
            grading: grading.max(0.0),
            quantum,
            cell_size,
            bounding_box,
            restrictions: Vec::new(),
            index: AHashMap::new(),
            cells: AHashMap::new(),
            extent: None,
            min_h: f64::INFINITY,
        }
    }

    /// Same bounds and parameters, no restrictions
    pub fn empty_like(&self) -> Self {
        Self::new(self.bounding_box, self.max_h, self.grading)
    }

    pub fn max_h(&self) -> f64 {
        self.max_h
    }

    pub fn grading(&self) -> f64 {
        self.grading
    }

    pub fn bounding_box(&self) -> &BoundingBox {
        &self.bounding_box
    }

    pub fn restrictions(&self) -> &[SizeRestriction] {
        &self.restrictions
    }

    pub fn len(&self) -> usize {
        self.restrictions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.restrictions.is_empty()
    }

    /// Edge length of the lookup grid cells
    pub fn cell_size(&self) -> f64 {
        self.cell_size
    }

    /// Restrict the size at `point` to at most `h`.
    pub fn restrict(&mut self, point: &Point3<f64>, h: f64) {
        if !(h > 0.0) || h >= self.max_h {
            return;
        }

        let key = self.key(point);
        let (i, added) = match self.index.get(&key) {
            Some(&i) => {
                let existing = &mut self.restrictions[i];
                existing.h = existing.h.min(h);
                (i, false)
            }
            None => {
                let i = self.restrictions.len();
                self.index.insert(key, i);
                self.restrictions.push(SizeRestriction { point: *point, h });
                (i, true)
            }
        };

        let SizeRestriction { point, h } = self.restrictions[i];
        let cell_key = self.cell_of(&point);
        let cell = self.cells.entry(cell_key).or_insert_with(|| Cell {
            members: Vec::new(),
            min_h: f64::INFINITY,
        });
        if added {
            cell.members.push(i);
        }
        cell.min_h = cell.min_h.min(h);
        self.min_h = self.min_h.min(h);

        self.extent = Some(match self.extent {
            None => (cell_key, cell_key),
            Some((lo, hi)) => (
                [0usize, 1, 2].map(|a| lo[a].min(cell_key[a])),
                [0usize, 1, 2].map(|a| hi[a].max(cell_key[a])),
            ),
        });
    }

    /// Restrict along the segment `p1..p2` with samples spaced by `h`.
    pub fn restrict_line(&mut self, p1: &Point3<f64>, p2: &Point3<f64>, h: f64) {
        if !(h > 0.0) {
            return;
        }
        let steps = ((p2 - p1).norm() / h).ceil().max(1.0) as usize;
        for i in 0..=steps {
            let s = i as f64 / steps as f64;
            self.restrict(&(p1 + (p2 - p1) * s), h);
        }
    }

    /// Target size at `point`
    pub fn get_h(&self, point: &Point3<f64>) -> f64 {
        let Some((lo, hi)) = self.extent else {
            return self.max_h;
        };
        if self.grading == 0.0 {
            return self.min_h.min(self.max_h);
        }

        let center = self.cell_of(point);
        // offsets to the occupied range along each axis
        let below = [0usize, 1, 2].map(|a| lo[a] - center[a]);
        let above = [0usize, 1, 2].map(|a| hi[a] - center[a]);
        let first = (0..3usize)
            .map(|a| below[a].max(-above[a]).max(0))
            .max()
            .unwrap_or(0);
        let reach = (0..3usize)
            .map(|a| below[a].abs().max(above[a].abs()))
            .max()
            .unwrap_or(0);

        let mut best = self.max_h;
        for k in first..=reach {
            // every cell in shell k is at least (k - 1) cells away
            if k > 0 && self.min_h + self.grading * (k - 1) as f64 * self.cell_size >= best {
                break;
            }
            let span = |a: usize| below[a].max(-k)..=above[a].min(k);
            for dx in span(0) {
                for dy in span(1) {
                    for dz in span(2) {
                        if dx.abs().max(dy.abs()).max(dz.abs()) != k {
                            continue;
                        }
                        let key = [center[0] + dx, center[1] + dy, center[2] + dz];
                        let Some(cell) = self.cells.get(&key) else {
                            continue;
                        };
                        if cell.min_h + self.grading * self.cell_distance(point, &key) >= best {
                            continue;
                        }
                        for &i in &cell.members {
                            let r = &self.restrictions[i];
                            best = best.min(r.h + self.grading * (point - r.point).norm());
                        }
                    }
                }
            }
        }
        best
    }

    /// Lower the global ceiling; existing restrictions above it become inert.
    pub fn set_max_h(&mut self, max_h: f64) {
        self.max_h = max_h;
    }

    /// Fold all restrictions of `other` into this field.
    pub fn merge(&mut self, other: &LocalH) {
        for r in &other.restrictions {
            self.restrict(&r.point, r.h);
        }
    }

    fn key(&self, point: &Point3<f64>) -> [i64; 3] {
        [
            (point.x / self.quantum).round() as i64,
            (point.y / self.quantum).round() as i64,
            (point.z / self.quantum).round() as i64,
        ]
    }

    fn cell_of(&self, point: &Point3<f64>) -> [i64; 3] {
        [
            (point.x / self.cell_size).floor() as i64,
            (point.y / self.cell_size).floor() as i64,
            (point.z / self.cell_size).floor() as i64,
        ]
    }

    /// Distance from `point` to the closed box of cell `key`
    fn cell_distance(&self, point: &Point3<f64>, key: &[i64; 3]) -> f64 {
        let gap = |x: f64, k: i64| {
            let lo = k as f64 * self.cell_size;
            let hi = lo + self.cell_size;
            (lo - x).max(x - hi).max(0.0)
        };
        let d = [gap(point.x, key[0]), gap(point.y, key[1]), gap(point.z, key[2])];
        (d[0] * d[0] + d[1] * d[1] + d[2] * d[2]).sqrt()
    }
}

impl Default for LocalH {
    fn default() -> Self {
        Self::new(BoundingBox::empty(), f64::INFINITY, 0.3)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn unit_field() -> LocalH {
        let bbox = BoundingBox::new(Point3::origin(), Point3::new(1.0, 1.0, 1.0));
        LocalH::new(bbox, 1.0, 0.5)
    }

    #[test]
    fn test_unrestricted_field_returns_max_h() {
        let field = unit_field();
        assert_eq!(field.get_h(&Point3::new(0.3, 0.3, 0.3)), 1.0);
    }

    #[test]
    fn test_restriction_is_graded() {
        let mut field = unit_field();
        field.restrict(&Point3::origin(), 0.1);
        assert_relative_eq!(field.get_h(&Point3::origin()), 0.1);
        assert_relative_eq!(field.get_h(&Point3::new(0.4, 0.0, 0.0)), 0.3);
        assert_relative_eq!(field.get_h(&Point3::new(10.0, 0.0, 0.0)), 1.0);
    }

    #[test]
    fn test_duplicate_restrictions_keep_minimum() {
        let mut field = unit_field();
        field.restrict(&Point3::new(0.5, 0.5, 0.0), 0.2);
        field.restrict(&Point3::new(0.5, 0.5, 0.0), 0.4);
        field.restrict(&Point3::new(0.5, 0.5, 0.0), 0.1);
        assert_eq!(field.len(), 1);
        assert_relative_eq!(field.restrictions()[0].h, 0.1);
    }

    #[test]
    fn test_restrictions_at_or_above_max_h_are_ignored() {
        let mut field = unit_field();
        field.restrict(&Point3::origin(), 1.0);
        field.restrict(&Point3::origin(), f64::INFINITY);
        field.restrict(&Point3::origin(), f64::NAN);
        assert!(field.is_empty());
    }

    #[test]
    fn test_merge() {
        let mut a = unit_field();
        let mut b = a.empty_like();
        b.restrict_line(&Point3::origin(), &Point3::new(1.0, 0.0, 0.0), 0.25);
        a.merge(&b);
        assert_eq!(a.len(), 5);
        assert_relative_eq!(a.get_h(&Point3::new(0.5, 0.0, 0.0)), 0.25);
    }

    /// Deterministic scatter of points over `[-1, 2]^3`
    fn scatter(n: usize, seed: u64) -> Vec<Point3<f64>> {
        let mut state = seed;
        let mut next = || {
            state = state
                .wrapping_mul(6364136223846793005)
                .wrapping_add(1442695040888963407);
            (state >> 11) as f64 / (1u64 << 53) as f64 * 3.0 - 1.0
        };
        (0..n).map(|_| Point3::new(next(), next(), next())).collect()
    }

    fn full_scan(field: &LocalH, point: &Point3<f64>) -> f64 {
        field
            .restrictions()
            .iter()
            .map(|r| r.h + field.grading() * (point - r.point).norm())
            .fold(field.max_h(), f64::min)
    }

    #[test]
    fn test_grid_lookup_matches_full_scan() {
        let mut field = unit_field();
        for (k, p) in scatter(2000, 7).iter().enumerate() {
            field.restrict(p, 0.01 + 0.2 * (k % 13) as f64 / 13.0);
        }
        for q in scatter(500, 11) {
            assert_relative_eq!(field.get_h(&q), full_scan(&field, &q), epsilon = 1e-12);
        }
        // far outside every occupied cell
        let far = Point3::new(40.0, -30.0, 5.0);
        assert_relative_eq!(field.get_h(&far), full_scan(&field, &far), epsilon = 1e-12);
    }

    #[test]
    fn test_lowered_restriction_updates_lookup() {
        let mut field = unit_field();
        field.restrict(&Point3::new(0.9, 0.9, 0.9), 0.5);
        field.restrict(&Point3::new(0.1, 0.1, 0.1), 0.6);
        field.restrict(&Point3::new(0.1, 0.1, 0.1), 0.05);
        assert_eq!(field.len(), 2);
        assert_relative_eq!(field.get_h(&Point3::new(0.1, 0.1, 0.1)), 0.05);
        assert_relative_eq!(field.get_h(&Point3::new(0.9, 0.9, 0.9)), 0.5);
    }

    #[test]
    fn test_zero_grading_uses_global_minimum() {
        let bbox = BoundingBox::new(Point3::origin(), Point3::new(1.0, 1.0, 1.0));
        let mut field = LocalH::new(bbox, 1.0, 0.0);
        field.restrict(&Point3::origin(), 0.2);
        field.restrict(&Point3::new(1.0, 1.0, 1.0), 0.4);
        assert_relative_eq!(field.get_h(&Point3::new(1.0, 1.0, 1.0)), 0.2);
    }

    #[test]
    fn test_unbounded_field_uses_unit_cells() {
        let mut field = LocalH::default();
        assert_eq!(field.cell_size(), 1.0);
        field.restrict(&Point3::new(100.0, 0.0, 0.0), 2.0);
        assert_relative_eq!(field.get_h(&Point3::new(0.0, 0.0, 0.0)), 2.0 + 0.3 * 100.0);
    }
}
