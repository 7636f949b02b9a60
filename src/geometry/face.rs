// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Polyframe Inc.

//! Geometric faces and curvature-adaptive size restriction

use super::{BoundingBox, EdgePointGeomInfo, GeometryEdge, PointGeomInfo};
use crate::error::{GeomResult, GeometryError};
use crate::mesh::{Mesh, MeshingParameters};
use nalgebra::Point3;

/// Curvature below this is treated as flat
const FLAT_CURVATURE: f64 = 1e-12;

/// A trimmed surface bounded by closed loops of oriented edges.
pub trait GeometryFace: Send + Sync {
    fn n_boundaries(&self) -> usize;

    /// Edges of boundary loop `index`, in traversal order. Each edge's end
    /// vertex is the next edge's start vertex; the last wraps to the first.
    fn boundary(&self, index: usize) -> Vec<Box<dyn GeometryEdge>>;

    fn name(&self) -> String {
        "default".to_string()
    }

    /// Project `p` onto the face starting from the parametrization in `gi`.
    ///
    /// Fast when `p` is close to the point described by `gi`. On success both
    /// `p` and `gi` are updated in place.
    fn project_point_gi(&self, _p: &mut Point3<f64>, _gi: &mut PointGeomInfo) -> GeomResult<()> {
        Err(GeometryError::not_implemented(
            "project_point_gi",
            self.type_name(),
        ))
    }

    /// Exact evaluation at a cached parametrization
    fn point(&self, gi: &PointGeomInfo) -> Point3<f64>;

    /// Fill the face parameters of a point at curve parameter `t` on one of
    /// this face's boundary edges.
    fn calc_edge_point_gi(&self, edge: &dyn GeometryEdge, t: f64, egi: &mut EdgePointGeomInfo);

    fn bounding_box(&self) -> BoundingBox;

    /// Largest absolute principal curvature at `gi`
    fn curvature(&self, gi: &PointGeomInfo) -> f64;

    /// Coarse triangulation of the face's local parameter domain used to
    /// start size restriction.
    fn seed_triangles(&self) -> Vec<[PointGeomInfo; 3]>;

    /// Register curvature- and sag-driven size targets for this face.
    fn restrict_h(&self, mesh: &mut Mesh, mparam: &MeshingParameters) -> RestrictStats {
        let mut stats = RestrictStats::default();
        for [gi0, gi1, gi2] in self.seed_triangles() {
            stats.absorb(&restrict_h_trig(
                self,
                mesh,
                &gi0,
                &gi1,
                &gi2,
                mparam,
                0,
                mparam.min_h,
            ));
        }
        stats
    }

    fn type_name(&self) -> &'static str {
        std::any::type_name::<Self>()
    }
}

/// Summary of one size-restriction run
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RestrictStats {
    /// Triangles that registered a size
    pub leaves: usize,
    /// Triangles that were split in four
    pub subdivisions: usize,
    /// Deepest recursion level reached
    pub deepest: u32,
    pub min_size: f64,
    pub max_size: f64,
}

impl RestrictStats {
    fn leaf(depth: u32, size: f64) -> Self {
        Self {
            leaves: 1,
            subdivisions: 0,
            deepest: depth,
            min_size: size,
            max_size: size,
        }
    }

    pub fn absorb(&mut self, other: &RestrictStats) {
        self.leaves += other.leaves;
        self.subdivisions += other.subdivisions;
        self.deepest = self.deepest.max(other.deepest);
        self.min_size = self.min_size.min(other.min_size);
        self.max_size = self.max_size.max(other.max_size);
    }
}

impl Default for RestrictStats {
    fn default() -> Self {
        Self {
            leaves: 0,
            subdivisions: 0,
            deepest: 0,
            min_size: f64::INFINITY,
            max_size: f64::NEG_INFINITY,
        }
    }
}

/// Restrict the mesh size over the face triangle spanned by three samples.
///
/// The flat triangle's sag is estimated from the corner curvature and from
/// the measured distance between the surface and the triangle at the
/// parametric edge midpoints and centroid. While the sag exceeds
/// `mparam.sag` (or `depth < min_depth`) and `depth < max_depth`, the
/// triangle is split at its parametric edge midpoints. Leaves register
/// `max(h, h_sag)` clamped to `[min_h, max_h]`, where `h_sag` is the chord
/// length whose sag at the local curvature equals the tolerance.
///
/// Never fails; recursion is bounded by `max_depth`.
#[allow(clippy::too_many_arguments)]
pub fn restrict_h_trig<F: GeometryFace + ?Sized>(
    face: &F,
    mesh: &mut Mesh,
    gi0: &PointGeomInfo,
    gi1: &PointGeomInfo,
    gi2: &PointGeomInfo,
    mparam: &MeshingParameters,
    depth: u32,
    h: f64,
) -> RestrictStats {
    let gis = [*gi0, *gi1, *gi2];
    let corners = gis.map(|gi| face.point(&gi));

    let longest = (corners[1] - corners[0])
        .norm()
        .max((corners[2] - corners[1]).norm())
        .max((corners[0] - corners[2]).norm());

    let curvature = gis
        .iter()
        .map(|gi| face.curvature(gi).abs())
        .fold(0.0, f64::max);

    let mut deviation: f64 = 0.0;
    for (i, j) in [(0, 1), (1, 2), (2, 0)] {
        let on_surface = face.point(&gis[i].midpoint(&gis[j]));
        let on_chord = nalgebra::center(&corners[i], &corners[j]);
        deviation = deviation.max((on_surface - on_chord).norm());
    }
    let centroid_gi = PointGeomInfo::centroid(gi0, gi1, gi2);
    let centroid = face.point(&centroid_gi);
    let flat_centroid = Point3::from((corners[0].coords + corners[1].coords + corners[2].coords) / 3.0);
    deviation = deviation.max((centroid - flat_centroid).norm());

    // curvature implied by the measured deviation over the longest chord
    let kappa = if longest > f64::EPSILON {
        curvature.max(8.0 * deviation / (longest * longest))
    } else {
        curvature
    };
    let sag_estimate = kappa * longest * longest / 8.0;
    let h_sag = if kappa > FLAT_CURVATURE {
        (8.0 * mparam.sag / kappa).sqrt()
    } else {
        f64::INFINITY
    };

    let refine = depth < mparam.min_depth || (sag_estimate > mparam.sag && depth < mparam.max_depth);
    if refine {
        let m01 = gi0.midpoint(gi1);
        let m12 = gi1.midpoint(gi2);
        let m20 = gi2.midpoint(gi0);

        let mut stats = RestrictStats {
            subdivisions: 1,
            ..RestrictStats::default()
        };
        for [a, b, c] in [[*gi0, m01, m20], [m01, *gi1, m12], [m20, m12, *gi2], [m01, m12, m20]] {
            stats.absorb(&restrict_h_trig(face, mesh, &a, &b, &c, mparam, depth + 1, h));
        }
        return stats;
    }

    let size = mparam.clamp_h(h.max(h_sag));
    for p in corners.iter().chain(std::iter::once(&centroid)) {
        mesh.restrict_local_h(p, size);
    }
    RestrictStats::leaf(depth, size)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mesh::LocalH;
    use approx::assert_relative_eq;

    /// z = 0 over [0,1]^2
    struct FlatSquare;

    impl GeometryFace for FlatSquare {
        fn n_boundaries(&self) -> usize {
            0
        }
        fn boundary(&self, _index: usize) -> Vec<Box<dyn GeometryEdge>> {
            Vec::new()
        }
        fn point(&self, gi: &PointGeomInfo) -> Point3<f64> {
            Point3::new(gi.u, gi.v, 0.0)
        }
        fn calc_edge_point_gi(&self, edge: &dyn GeometryEdge, t: f64, egi: &mut EdgePointGeomInfo) {
            let p = edge.point(t);
            egi.dist = t;
            egi.u = p.x;
            egi.v = p.y;
        }
        fn bounding_box(&self) -> BoundingBox {
            BoundingBox::new(Point3::origin(), Point3::new(1.0, 1.0, 0.0))
        }
        fn curvature(&self, _gi: &PointGeomInfo) -> f64 {
            0.0
        }
        fn seed_triangles(&self) -> Vec<[PointGeomInfo; 3]> {
            let c = |u, v| PointGeomInfo::new(0, u, v);
            vec![
                [c(0.0, 0.0), c(1.0, 0.0), c(1.0, 1.0)],
                [c(0.0, 0.0), c(1.0, 1.0), c(0.0, 1.0)],
            ]
        }
    }

    /// Flat geometry that claims enormous curvature everywhere
    struct Crumpled;

    impl GeometryFace for Crumpled {
        fn n_boundaries(&self) -> usize {
            0
        }
        fn boundary(&self, _index: usize) -> Vec<Box<dyn GeometryEdge>> {
            Vec::new()
        }
        fn point(&self, gi: &PointGeomInfo) -> Point3<f64> {
            Point3::new(gi.u, gi.v, 0.0)
        }
        fn calc_edge_point_gi(&self, _edge: &dyn GeometryEdge, t: f64, egi: &mut EdgePointGeomInfo) {
            egi.dist = t;
        }
        fn bounding_box(&self) -> BoundingBox {
            BoundingBox::new(Point3::origin(), Point3::new(1.0, 1.0, 0.0))
        }
        fn curvature(&self, _gi: &PointGeomInfo) -> f64 {
            1e9
        }
        fn seed_triangles(&self) -> Vec<[PointGeomInfo; 3]> {
            vec![[
                PointGeomInfo::new(0, 0.0, 0.0),
                PointGeomInfo::new(0, 1.0, 0.0),
                PointGeomInfo::new(0, 0.0, 1.0),
            ]]
        }
    }

    fn unit_mesh(max_h: f64) -> Mesh {
        let bbox = BoundingBox::new(Point3::origin(), Point3::new(1.0, 1.0, 1.0));
        Mesh::with_local_h(LocalH::new(bbox, max_h, 0.3))
    }

    #[test]
    fn test_flat_square_gets_max_h_without_subdivision() {
        let mparam = MeshingParameters::default().with_sag(0.01).with_max_h(1.0);
        let mut mesh = unit_mesh(1.0);

        let stats = FlatSquare.restrict_h(&mut mesh, &mparam);

        assert_eq!(stats.subdivisions, 0);
        assert_eq!(stats.deepest, 0);
        assert_eq!(stats.leaves, 2);
        assert_eq!(stats.min_size, 1.0);
        assert_eq!(stats.max_size, 1.0);
        for p in [Point3::new(0.0, 0.0, 0.0), Point3::new(0.5, 0.5, 0.0), Point3::new(1.0, 0.2, 0.0)] {
            assert_eq!(mesh.get_h(&p), 1.0);
        }
    }

    #[test]
    fn test_recursion_is_bounded_and_sizes_clamped() {
        let mparam = MeshingParameters::default()
            .with_depth(0, 3)
            .with_min_h(0.05)
            .with_max_h(1.0);
        let mut mesh = unit_mesh(1.0);

        let stats = Crumpled.restrict_h(&mut mesh, &mparam);

        assert_eq!(stats.deepest, 3);
        assert_eq!(stats.leaves, 64);
        assert_eq!(stats.subdivisions, 1 + 4 + 16);
        assert_relative_eq!(stats.min_size, 0.05);
        assert!(stats.max_size <= 1.0);
    }

    #[test]
    fn test_min_depth_forces_subdivision() {
        let mparam = MeshingParameters::default().with_depth(2, 5).with_max_h(1.0);
        let mut mesh = unit_mesh(1.0);

        let stats = FlatSquare.restrict_h(&mut mesh, &mparam);

        assert_eq!(stats.deepest, 2);
        assert_eq!(stats.leaves, 2 * 16);
        assert_eq!(stats.max_size, 1.0);
    }

    #[test]
    fn test_caller_h_is_a_lower_bound() {
        let mparam = MeshingParameters::default().with_depth(0, 0).with_max_h(1.0);
        let mut mesh = unit_mesh(1.0);
        let [a, b, c] = Crumpled.seed_triangles()[0];

        let stats = restrict_h_trig(&Crumpled, &mut mesh, &a, &b, &c, &mparam, 0, 0.4);

        assert_eq!(stats.leaves, 1);
        assert_relative_eq!(stats.min_size, 0.4);
    }

    #[test]
    fn test_default_projection_is_not_implemented() {
        let mut p = Point3::new(0.2, 0.3, 0.1);
        let mut gi = PointGeomInfo::default();
        let err = FlatSquare.project_point_gi(&mut p, &mut gi).unwrap_err();
        assert!(matches!(err, GeometryError::NotImplemented { .. }));
        assert!(err.to_string().contains("FlatSquare"));
    }

    #[test]
    fn test_default_name() {
        assert_eq!(FlatSquare.name(), "default");
    }
}
