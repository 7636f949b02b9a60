// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Polyframe Inc.

//! Mesh sink filled by the meshing pipeline

mod local_h;
mod params;
mod pipeline;
mod refinement;

pub use local_h::{LocalH, SizeRestriction};
pub use params::MeshingParameters;
pub use pipeline::PipelineStage;
pub use refinement::Refinement;

use crate::error::{GeomResult, GeometryError};
use crate::geometry::{BoundingBox, EdgePointGeomInfo, PointGeomInfo};
use nalgebra::{Point3, Vector3};
use serde::{Deserialize, Serialize};

/// Kind of geometry a mesh was generated from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum GeomType {
    #[default]
    NoGeom,
    Analytic,
}

/// Where a mesh point lives on the geometry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PointType {
    /// Placed at a geometry vertex
    Fixed,
    /// Interior of a geometry edge
    Edge,
    /// Interior of a face
    Surface,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct MeshPoint {
    pub position: Point3<f64>,
    pub point_type: PointType,
}

impl MeshPoint {
    pub fn new(position: Point3<f64>, point_type: PointType) -> Self {
        Self {
            position,
            point_type,
        }
    }
}

/// Boundary segment on a geometry edge, oriented along the global edge
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct Segment {
    pub points: [usize; 2],
    pub edgenr: usize,
    pub epgeominfo: [EdgePointGeomInfo; 2],
}

/// Surface triangle with per-corner face parametrization
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct Element2d {
    pub points: [usize; 3],
    pub face: usize,
    pub geominfo: [PointGeomInfo; 3],
}

impl Element2d {
    pub fn new(points: [usize; 3], face: usize, geominfo: [PointGeomInfo; 3]) -> Self {
        Self {
            points,
            face,
            geominfo,
        }
    }

    /// Corner slot of a mesh point, if it belongs to this element
    pub fn corner_of(&self, point: usize) -> Option<usize> {
        self.points.iter().position(|&p| p == point)
    }
}

/// Surface mesh with its size field and pipeline progress
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Mesh {
    pub points: Vec<MeshPoint>,
    pub segments: Vec<Segment>,
    pub surface_elements: Vec<Element2d>,
    pub geom_type: GeomType,
    #[serde(skip)]
    local_h: LocalH,
    completed_stage: Option<PipelineStage>,
}

impl Mesh {
    pub fn new() -> Self {
        Self::default()
    }

    /// Scratch mesh sharing only a size field, used for per-face restriction
    pub fn with_local_h(local_h: LocalH) -> Self {
        Self {
            local_h,
            ..Self::default()
        }
    }

    /// Add a point and return its index
    pub fn add_point(&mut self, point: MeshPoint) -> usize {
        let index = self.points.len();
        self.points.push(point);
        index
    }

    pub fn add_segment(&mut self, segment: Segment) -> usize {
        let index = self.segments.len();
        self.segments.push(segment);
        index
    }

    pub fn add_surface_element(&mut self, element: Element2d) -> usize {
        let index = self.surface_elements.len();
        self.surface_elements.push(element);
        index
    }

    pub fn point(&self, index: usize) -> &Point3<f64> {
        &self.points[index].position
    }

    pub fn point_count(&self) -> usize {
        self.points.len()
    }

    pub fn segment_count(&self) -> usize {
        self.segments.len()
    }

    pub fn surface_element_count(&self) -> usize {
        self.surface_elements.len()
    }

    pub fn local_h(&self) -> &LocalH {
        &self.local_h
    }

    pub fn local_h_mut(&mut self) -> &mut LocalH {
        &mut self.local_h
    }

    pub fn into_local_h(self) -> LocalH {
        self.local_h
    }

    pub fn set_local_h(&mut self, local_h: LocalH) {
        self.local_h = local_h;
    }

    pub fn restrict_local_h(&mut self, point: &Point3<f64>, h: f64) {
        self.local_h.restrict(point, h);
    }

    pub fn get_h(&self, point: &Point3<f64>) -> f64 {
        self.local_h.get_h(point)
    }

    pub fn completed_stage(&self) -> Option<PipelineStage> {
        self.completed_stage
    }

    /// Check that `stage` may run next on this mesh
    pub fn check_stage(&self, stage: PipelineStage) -> GeomResult<()> {
        if self.completed_stage == stage.previous() {
            Ok(())
        } else {
            Err(GeometryError::StageOrder {
                requested: stage,
                completed: self.completed_stage,
            })
        }
    }

    pub(crate) fn mark_stage_complete(&mut self, stage: PipelineStage) {
        self.completed_stage = Some(stage);
    }

    /// Segments of one geometry edge, ordered along the edge parameter
    pub fn segments_of_edge(&self, edgenr: usize) -> Vec<Segment> {
        let mut segs: Vec<Segment> = self
            .segments
            .iter()
            .filter(|s| s.edgenr == edgenr)
            .copied()
            .collect();
        segs.sort_by(|a, b| a.epgeominfo[0].dist.total_cmp(&b.epgeominfo[0].dist));
        segs
    }

    pub fn elements_of_face(&self, face: usize) -> impl Iterator<Item = &Element2d> + '_ {
        self.surface_elements.iter().filter(move |el| el.face == face)
    }

    /// Unnormalized geometric normal of a surface element
    pub fn element_normal(&self, element: &Element2d) -> Vector3<f64> {
        let [a, b, c] = element.points.map(|i| self.points[i].position);
        (b - a).cross(&(c - a))
    }

    pub fn element_area(&self, element: &Element2d) -> f64 {
        0.5 * self.element_normal(element).norm()
    }

    pub fn surface_area(&self) -> f64 {
        self.surface_elements
            .iter()
            .map(|el| self.element_area(el))
            .sum()
    }

    /// Longest edge of a surface element
    pub fn element_longest_edge(&self, element: &Element2d) -> f64 {
        let [a, b, c] = element.points.map(|i| self.points[i].position);
        (b - a).norm().max((c - b).norm()).max((a - c).norm())
    }

    /// Compute bounding box
    pub fn bounding_box(&self) -> BoundingBox {
        BoundingBox::from_points(self.points.iter().map(|p| &p.position))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn triangle_mesh() -> Mesh {
        let mut mesh = Mesh::new();
        let a = mesh.add_point(MeshPoint::new(Point3::new(0.0, 0.0, 0.0), PointType::Fixed));
        let b = mesh.add_point(MeshPoint::new(Point3::new(1.0, 0.0, 0.0), PointType::Fixed));
        let c = mesh.add_point(MeshPoint::new(Point3::new(0.0, 1.0, 0.0), PointType::Fixed));
        mesh.add_surface_element(Element2d::new([a, b, c], 0, [PointGeomInfo::default(); 3]));
        mesh
    }

    #[test]
    fn test_element_measures() {
        let mesh = triangle_mesh();
        let el = mesh.surface_elements[0];
        assert!((mesh.surface_area() - 0.5).abs() < 1e-12);
        assert!((mesh.element_longest_edge(&el) - 2f64.sqrt()).abs() < 1e-12);
        assert!(mesh.element_normal(&el).z > 0.0);
        assert_eq!(el.corner_of(2), Some(2));
        assert_eq!(el.corner_of(7), None);
    }

    #[test]
    fn test_stage_order_is_strict() {
        let mut mesh = Mesh::new();
        assert!(mesh.check_stage(PipelineStage::Analyse).is_ok());
        assert!(matches!(
            mesh.check_stage(PipelineStage::MeshSurface),
            Err(GeometryError::StageOrder { completed: None, .. })
        ));

        mesh.mark_stage_complete(PipelineStage::Analyse);
        assert!(mesh.check_stage(PipelineStage::FindEdges).is_ok());
        assert!(mesh.check_stage(PipelineStage::Analyse).is_err());
    }

    #[test]
    fn test_segments_of_edge_sorted() {
        let mut mesh = Mesh::new();
        for (t0, t1) in [(0.5, 1.0), (0.0, 0.5)] {
            mesh.add_segment(Segment {
                points: [0, 1],
                edgenr: 3,
                epgeominfo: [EdgePointGeomInfo::new(3, t0), EdgePointGeomInfo::new(3, t1)],
            });
        }
        let segs = mesh.segments_of_edge(3);
        assert_eq!(segs[0].epgeominfo[0].dist, 0.0);
        assert!(mesh.segments_of_edge(1).is_empty());
    }

    #[test]
    fn test_json_roundtrip_keeps_stage() {
        let mut mesh = triangle_mesh();
        mesh.mark_stage_complete(PipelineStage::MeshSurface);
        let json = serde_json::to_string(&mesh).unwrap();
        let back: Mesh = serde_json::from_str(&json).unwrap();
        assert_eq!(back.point_count(), 3);
        assert_eq!(back.completed_stage(), Some(PipelineStage::MeshSurface));
    }
}
