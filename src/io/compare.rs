// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Polyframe Inc.

//! Mesh comparison utilities for round-trip testing

use crate::mesh::Mesh;
use serde::{Deserialize, Serialize};

/// Result of mesh comparison
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MeshComparison {
    pub point_count_match: bool,
    pub segment_count_match: bool,
    pub element_count_match: bool,
    pub bbox_match: bool,
    pub area_match: bool,
    pub area_diff: f64,
    pub tolerance: f64,
    pub passed: bool,
}

/// Compare two meshes for equivalence
pub fn compare_meshes(mesh_a: &Mesh, mesh_b: &Mesh, tolerance: f64) -> MeshComparison {
    let mut comparison = MeshComparison {
        tolerance,
        ..MeshComparison::default()
    };

    comparison.point_count_match = mesh_a.point_count() == mesh_b.point_count();
    comparison.segment_count_match = mesh_a.segment_count() == mesh_b.segment_count();
    comparison.element_count_match =
        mesh_a.surface_element_count() == mesh_b.surface_element_count();

    comparison.bbox_match = mesh_a
        .bounding_box()
        .approx_eq(&mesh_b.bounding_box(), tolerance);

    comparison.area_diff = (mesh_a.surface_area() - mesh_b.surface_area()).abs();
    comparison.area_match = comparison.area_diff <= tolerance;

    comparison.passed = comparison.point_count_match
        && comparison.segment_count_match
        && comparison.element_count_match
        && comparison.bbox_match
        && comparison.area_match;

    comparison
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::PointGeomInfo;
    use crate::mesh::{Element2d, MeshPoint, PointType};
    use nalgebra::Point3;

    fn square(size: f64) -> Mesh {
        let mut mesh = Mesh::new();
        for p in [[0.0, 0.0], [size, 0.0], [size, size], [0.0, size]] {
            mesh.add_point(MeshPoint::new(Point3::new(p[0], p[1], 0.0), PointType::Fixed));
        }
        let gi = [PointGeomInfo::default(); 3];
        mesh.add_surface_element(Element2d::new([0, 1, 2], 0, gi));
        mesh.add_surface_element(Element2d::new([0, 2, 3], 0, gi));
        mesh
    }

    #[test]
    fn test_compare_identical_meshes() {
        let comparison = compare_meshes(&square(1.0), &square(1.0), 1e-9);
        assert!(comparison.passed);
        assert_eq!(comparison.area_diff, 0.0);
    }

    #[test]
    fn test_compare_different_sizes() {
        let comparison = compare_meshes(&square(1.0), &square(2.0), 1e-9);
        assert!(comparison.element_count_match);
        assert!(!comparison.bbox_match);
        assert!(!comparison.passed);
        assert!((comparison.area_diff - 3.0).abs() < 1e-12);
    }
}
