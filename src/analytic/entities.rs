// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Polyframe Inc.

//! Vertex, edge and face adapters over analytic curves and surfaces

use super::curve::Curve;
use super::description::PatchDescription;
use crate::error::{GeomResult, GeometryError};
use crate::geometry::{
    BoundingBox, EdgePointGeomInfo, GeometryEdge, GeometryFace, GeometryVertex, PointGeomInfo,
};
use ahash::RandomState;
use nalgebra::{Matrix2, Point3, Vector2};
use std::hash::Hash;

const PROJECTION_MAX_ITERATIONS: usize = 50;
const PROJECTION_TOLERANCE: f64 = 1e-12;
const BBOX_SAMPLES: usize = 16;

/// Stable hash of an entity key. Fixed seeds keep identities reproducible
/// across geometry instances.
pub(crate) fn entity_hash(key: impl Hash) -> u64 {
    RandomState::with_seeds(0x6d65, 0x7368, 0x6765, 0x6f6d).hash_one(key)
}

/// Grid cell of `p` at resolution `quantum`
pub(crate) fn quantize(p: &Point3<f64>, quantum: f64) -> [i64; 3] {
    [p.x, p.y, p.z].map(|c| (c / quantum).round() as i64)
}

#[derive(Debug, Clone)]
pub struct AnalyticVertex {
    point: Point3<f64>,
    hash: u64,
}

impl AnalyticVertex {
    pub fn new(point: Point3<f64>, quantum: f64) -> Self {
        Self {
            point,
            hash: entity_hash(("vertex", quantize(&point, quantum))),
        }
    }
}

impl GeometryVertex for AnalyticVertex {
    fn point(&self) -> Point3<f64> {
        self.point
    }

    fn hash_key(&self) -> u64 {
        self.hash
    }
}

/// A curve between two vertices, possibly traversed against its global
/// direction. Reversed copies map `t` to `1 - t` and swap endpoints but
/// keep the hash.
#[derive(Debug, Clone)]
pub struct AnalyticEdge {
    curve: Curve,
    start: usize,
    end: usize,
    forward: bool,
    hash: u64,
}

impl AnalyticEdge {
    pub fn new(curve: Curve, start: usize, end: usize, hash: u64) -> Self {
        Self {
            curve,
            start,
            end,
            forward: true,
            hash,
        }
    }

    pub fn reversed(&self) -> Self {
        Self {
            curve: self.curve,
            start: self.end,
            end: self.start,
            forward: !self.forward,
            hash: self.hash,
        }
    }

    pub fn curve(&self) -> &Curve {
        &self.curve
    }

    /// Parameter of the global curve at local parameter `t`
    pub fn curve_param(&self, t: f64) -> f64 {
        if self.forward {
            t
        } else {
            1.0 - t
        }
    }
}

impl GeometryEdge for AnalyticEdge {
    fn start_vertex(&self) -> usize {
        self.start
    }

    fn end_vertex(&self) -> usize {
        self.end
    }

    fn length(&self) -> f64 {
        self.curve.length()
    }

    fn point(&self, t: f64) -> Point3<f64> {
        self.curve.point(self.curve_param(t))
    }

    fn calc_step(&self, t: f64, sag: f64) -> f64 {
        (t + self.curve.step_size(sag)).min(1.0)
    }

    fn oriented_like_global(&self) -> bool {
        self.forward
    }

    fn hash_key(&self) -> u64 {
        self.hash
    }
}

/// A rectangular patch of a surface bounded by one four-edge loop
#[derive(Debug, Clone)]
pub struct AnalyticFace {
    index: usize,
    patch: PatchDescription,
    boundary: Vec<AnalyticEdge>,
    bounding_box: BoundingBox,
}

impl AnalyticFace {
    /// `patch.surface` must already be normalized
    pub fn new(index: usize, patch: PatchDescription, boundary: Vec<AnalyticEdge>) -> Self {
        let bounding_box = sampled_bounding_box(&patch);
        Self {
            index,
            patch,
            boundary,
            bounding_box,
        }
    }

    pub fn patch(&self) -> &PatchDescription {
        &self.patch
    }

    /// Closed-form parameters of `p`, with periodic `u` moved into the patch
    pub fn params_of(&self, p: &Point3<f64>) -> (f64, f64) {
        let surface = &self.patch.surface;
        let (u, v) = surface.inverse(p);
        let mid = 0.5 * (self.patch.u_range[0] + self.patch.u_range[1]);
        (surface.unwrap_u(u, mid), v)
    }
}

impl GeometryFace for AnalyticFace {
    fn n_boundaries(&self) -> usize {
        1
    }

    fn boundary(&self, index: usize) -> Vec<Box<dyn GeometryEdge>> {
        if index != 0 {
            return Vec::new();
        }
        self.boundary
            .iter()
            .map(|e| Box::new(e.clone()) as Box<dyn GeometryEdge>)
            .collect()
    }

    fn name(&self) -> String {
        self.patch
            .name
            .clone()
            .unwrap_or_else(|| format!("face{}", self.index))
    }

    /// Gauss-Newton minimization of `|S(u, v) - p|` from the parameters in
    /// `gi`.
    fn project_point_gi(&self, p: &mut Point3<f64>, gi: &mut PointGeomInfo) -> GeomResult<()> {
        let surface = &self.patch.surface;
        let target = *p;
        let seed_distance = (surface.evaluate(gi.u, gi.v) - target).norm();
        let scale = 1.0 + target.coords.norm();

        let (mut u, mut v) = (gi.u, gi.v);
        let mut converged = false;
        for _ in 0..PROJECTION_MAX_ITERATIONS {
            let residual = surface.evaluate(u, v) - target;
            let (su, sv) = surface.derivatives(u, v);

            let normal_matrix = Matrix2::new(su.dot(&su), su.dot(&sv), su.dot(&sv), sv.dot(&sv));
            let gradient = Vector2::new(-su.dot(&residual), -sv.dot(&residual));
            // vanishing or parallel tangents
            let (a, b) = (normal_matrix[(0, 0)], normal_matrix[(1, 1)]);
            let singular = a.min(b) <= f64::EPSILON * scale * scale
                || normal_matrix.determinant() <= 1e-12 * a * b;
            let inverse = match normal_matrix.try_inverse() {
                Some(inverse) if !singular => inverse,
                _ => return Err(GeometryError::projection(self.index, "singular Jacobian")),
            };
            let delta = inverse * gradient;

            (u, v) = surface.clamp_params(u + delta.x, v + delta.y);
            if delta.norm() * (su.norm() + sv.norm()) < PROJECTION_TOLERANCE * scale {
                converged = true;
                break;
            }
        }
        if !converged {
            return Err(GeometryError::projection(
                self.index,
                format!("no convergence in {PROJECTION_MAX_ITERATIONS} iterations"),
            ));
        }

        let projected = surface.evaluate(u, v);
        if (projected - target).norm() > seed_distance + PROJECTION_TOLERANCE * scale {
            return Err(GeometryError::projection(
                self.index,
                "result is farther than the seed",
            ));
        }

        *p = projected;
        gi.u = u;
        gi.v = v;
        Ok(())
    }

    fn point(&self, gi: &PointGeomInfo) -> Point3<f64> {
        self.patch.surface.evaluate(gi.u, gi.v)
    }

    fn calc_edge_point_gi(&self, edge: &dyn GeometryEdge, t: f64, egi: &mut EdgePointGeomInfo) {
        let (u, v) = self.params_of(&edge.point(t));
        egi.u = u;
        egi.v = v;
    }

    fn bounding_box(&self) -> BoundingBox {
        self.bounding_box
    }

    fn curvature(&self, _gi: &PointGeomInfo) -> f64 {
        self.patch.surface.curvature()
    }

    fn seed_triangles(&self) -> Vec<[PointGeomInfo; 3]> {
        let [u0, u1] = self.patch.u_range;
        let [v0, v1] = self.patch.v_range;
        let (nu, nv) = self.patch.surface.seed_cells(self.patch.u_range, self.patch.v_range);

        let gi = |i: usize, j: usize| {
            PointGeomInfo::new(
                self.index,
                u0 + (u1 - u0) * i as f64 / nu as f64,
                v0 + (v1 - v0) * j as f64 / nv as f64,
            )
        };
        let mut triangles = Vec::with_capacity(2 * nu * nv);
        for i in 0..nu {
            for j in 0..nv {
                triangles.push([gi(i, j), gi(i + 1, j), gi(i + 1, j + 1)]);
                triangles.push([gi(i, j), gi(i + 1, j + 1), gi(i, j + 1)]);
            }
        }
        triangles
    }
}

/// Bounding box of a sample grid, padded by the largest sag a grid cell can
/// hide at the surface curvature.
fn sampled_bounding_box(patch: &PatchDescription) -> BoundingBox {
    let [u0, u1] = patch.u_range;
    let [v0, v1] = patch.v_range;
    let n = BBOX_SAMPLES;

    let mut samples = Vec::with_capacity((n + 1) * (n + 1));
    for i in 0..=n {
        for j in 0..=n {
            let u = u0 + (u1 - u0) * i as f64 / n as f64;
            let v = v0 + (v1 - v0) * j as f64 / n as f64;
            samples.push(patch.surface.evaluate(u, v));
        }
    }

    let mut spacing: f64 = 0.0;
    for i in 0..=n {
        for j in 0..=n {
            let p = samples[i * (n + 1) + j];
            if i < n {
                spacing = spacing.max((samples[(i + 1) * (n + 1) + j] - p).norm());
            }
            if j < n {
                spacing = spacing.max((samples[i * (n + 1) + j + 1] - p).norm());
            }
        }
    }

    let mut bbox = BoundingBox::from_points(samples.iter());
    bbox.increase(patch.surface.curvature() * spacing * spacing / 8.0);
    bbox
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analytic::surface::Surface;
    use approx::assert_relative_eq;
    use std::f64::consts::PI;

    fn sphere_face() -> AnalyticFace {
        let surface = Surface::Sphere {
            center: Point3::origin(),
            radius: 2.0,
        };
        AnalyticFace::new(
            0,
            PatchDescription::new(surface, [0.0, PI], [-0.5, 0.5]),
            Vec::new(),
        )
    }

    #[test]
    fn test_projection_recovers_surface_point() {
        let face = sphere_face();
        let expected = PointGeomInfo::new(0, 1.2, 0.3);
        let on_surface = face.point(&expected);

        // lift off the surface and start from a nearby seed
        let mut p = on_surface + on_surface.coords * 0.1;
        let mut gi = PointGeomInfo::new(0, 1.1, 0.25);
        face.project_point_gi(&mut p, &mut gi).unwrap();

        assert_relative_eq!(gi.u, expected.u, epsilon = 1e-9);
        assert_relative_eq!(gi.v, expected.v, epsilon = 1e-9);
        assert_relative_eq!(p, on_surface, epsilon = 1e-9);
    }

    #[test]
    fn test_projection_from_pole_seed_fails() {
        let face = sphere_face();
        let mut p = Point3::new(0.0, 0.0, 2.5);
        let mut gi = PointGeomInfo::new(0, 1.0, std::f64::consts::FRAC_PI_2);
        let err = face.project_point_gi(&mut p, &mut gi).unwrap_err();
        assert!(err.is_recoverable());
        assert_eq!(p, Point3::new(0.0, 0.0, 2.5));
        assert_eq!(gi.u, 1.0);
    }

    #[test]
    fn test_reversed_edge_keeps_identity() {
        let curve = Curve::Line {
            start: Point3::origin(),
            end: Point3::new(2.0, 0.0, 0.0),
        };
        let edge = AnalyticEdge::new(curve, 0, 1, 7);
        let back = edge.reversed();

        assert_eq!(back.hash_key(), edge.hash_key());
        assert!(!back.oriented_like_global());
        assert_eq!((back.start_vertex(), back.end_vertex()), (1, 0));
        assert_relative_eq!(back.point(0.25), edge.point(0.75));
    }

    #[test]
    fn test_bounding_box_covers_bulge() {
        let face = sphere_face();
        let bbox = face.bounding_box();
        // equator point at u = π/2 is the extreme in +y
        assert!(bbox.contains(&Point3::new(0.0, 2.0, 0.0), 0.0));
        assert!(bbox.max.y < 2.1);
    }

    #[test]
    fn test_seed_triangles_cover_patch() {
        let face = sphere_face();
        let seeds = face.seed_triangles();
        // π wide in u at π/4 per cell, 1 rad in v
        assert_eq!(seeds.len(), 2 * 4 * 2);
        let area: f64 = seeds
            .iter()
            .map(|[a, b, c]| 0.5 * ((b.u - a.u) * (c.v - a.v) - (c.u - a.u) * (b.v - a.v)))
            .sum();
        assert_relative_eq!(area, PI * 1.0, epsilon = 1e-12);
    }

    #[test]
    fn test_hash_is_stable() {
        let a = AnalyticVertex::new(Point3::new(1.0, 2.0, 3.0), 1e-7);
        let b = AnalyticVertex::new(Point3::new(1.0, 2.0, 3.0 + 1e-12), 1e-7);
        assert_eq!(a.hash_key(), b.hash_key());
        assert_eq!(a.hash_key(), a.hash_key());
    }
}
