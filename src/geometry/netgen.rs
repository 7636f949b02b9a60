// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Polyframe Inc.

//! Geometry aggregate and meshing pipeline driver

use super::stages;
use super::{
    Archive, BoundingBox, EdgePointGeomInfo, GeometryEdge, GeometryFace, GeometryVertex,
    PointGeomInfo,
};
use crate::error::{GeomResult, GeometryError};
use crate::mesh::{GeomType, Mesh, MeshingParameters, PipelineStage, Refinement};
use ahash::AHashSet;
use nalgebra::{Point3, Vector3};
use std::io::Write;
use std::path::Path;

/// Vertex, edge and face collections owned by one geometry.
///
/// Indices into these arrays are the canonical identifiers used by the
/// mesh. The collections are immutable once built; only the
/// [`Refinement`] helper may be reconfigured.
pub struct GeometryStore {
    vertices: Vec<Box<dyn GeometryVertex>>,
    edges: Vec<Box<dyn GeometryEdge>>,
    faces: Vec<Box<dyn GeometryFace>>,
    bounding_box: BoundingBox,
    refinement: Refinement,
}

impl GeometryStore {
    /// Build a store, checking the topological invariants.
    pub fn new(
        vertices: Vec<Box<dyn GeometryVertex>>,
        edges: Vec<Box<dyn GeometryEdge>>,
        faces: Vec<Box<dyn GeometryFace>>,
    ) -> GeomResult<Self> {
        let mut vertex_hashes = AHashSet::new();
        for (i, vertex) in vertices.iter().enumerate() {
            if !vertex_hashes.insert(vertex.hash_key()) {
                return Err(GeometryError::InvalidTopology(format!(
                    "vertex {i} repeats hash {:#x}",
                    vertex.hash_key()
                )));
            }
        }

        let mut edge_hashes = AHashSet::new();
        for (i, edge) in edges.iter().enumerate() {
            if edge.start_vertex() >= vertices.len() || edge.end_vertex() >= vertices.len() {
                return Err(GeometryError::InvalidTopology(format!(
                    "edge {i} references vertices ({}, {}) but only {} exist",
                    edge.start_vertex(),
                    edge.end_vertex(),
                    vertices.len()
                )));
            }
            if !edge_hashes.insert(edge.hash_key()) {
                return Err(GeometryError::InvalidTopology(format!(
                    "edge {i} repeats hash {:#x}",
                    edge.hash_key()
                )));
            }
        }

        for (f, face) in faces.iter().enumerate() {
            for b in 0..face.n_boundaries() {
                let ring = face.boundary(b);
                for (k, edge) in ring.iter().enumerate() {
                    if !edge_hashes.contains(&edge.hash_key()) {
                        return Err(GeometryError::InvalidTopology(format!(
                            "face {f} loop {b} uses unregistered edge {:#x}",
                            edge.hash_key()
                        )));
                    }
                    let next = &ring[(k + 1) % ring.len()];
                    if edge.end_vertex() != next.start_vertex() {
                        return Err(GeometryError::InvalidTopology(format!(
                            "face {f} loop {b} is open after edge {k}"
                        )));
                    }
                }
            }
        }

        let mut bounding_box = BoundingBox::empty();
        for vertex in &vertices {
            bounding_box.expand_to_include(&vertex.point());
        }
        for face in &faces {
            bounding_box.merge(&face.bounding_box());
        }

        Ok(Self {
            vertices,
            edges,
            faces,
            bounding_box,
            refinement: Refinement::default(),
        })
    }

    /// Geometry without any entities
    pub fn empty() -> Self {
        Self {
            vertices: Vec::new(),
            edges: Vec::new(),
            faces: Vec::new(),
            bounding_box: BoundingBox::empty(),
            refinement: Refinement::default(),
        }
    }

    pub fn vertices(&self) -> &[Box<dyn GeometryVertex>] {
        &self.vertices
    }

    pub fn edges(&self) -> &[Box<dyn GeometryEdge>] {
        &self.edges
    }

    pub fn faces(&self) -> &[Box<dyn GeometryFace>] {
        &self.faces
    }

    pub fn bounding_box(&self) -> &BoundingBox {
        &self.bounding_box
    }

    pub fn refinement(&self) -> &Refinement {
        &self.refinement
    }

    pub fn refinement_mut(&mut self) -> &mut Refinement {
        &mut self.refinement
    }
}

/// An exact geometry the meshing pipeline runs against.
///
/// Kernel adapters embed a [`GeometryStore`] and override the operations
/// their kernel supports. The provided defaults are either flat-geometry
/// fallbacks or fail with [`GeometryError::NotImplemented`].
#[allow(clippy::too_many_arguments)]
pub trait NetgenGeometry: Send + Sync {
    fn store(&self) -> &GeometryStore;

    fn store_mut(&mut self) -> &mut GeometryStore;

    fn vertices(&self) -> &[Box<dyn GeometryVertex>] {
        self.store().vertices()
    }

    fn edges(&self) -> &[Box<dyn GeometryEdge>] {
        self.store().edges()
    }

    fn faces(&self) -> &[Box<dyn GeometryFace>] {
        self.store().faces()
    }

    fn bounding_box(&self) -> &BoundingBox {
        self.store().bounding_box()
    }

    fn refinement(&self) -> &Refinement {
        self.store().refinement()
    }

    /// Configure refinement before the pipeline runs
    fn refinement_mut(&mut self) -> &mut Refinement {
        self.store_mut().refinement_mut()
    }

    fn geom_type(&self) -> GeomType {
        GeomType::NoGeom
    }

    /// Run the stages between `perf_steps_start` and `perf_steps_end`.
    fn generate_mesh(&self, mesh: &mut Mesh, mparam: &MeshingParameters) -> GeomResult<()> {
        if mparam.perf_steps_start == PipelineStage::Analyse {
            mesh.geom_type = self.geom_type();
        }
        for stage in PipelineStage::range(mparam.perf_steps_start, mparam.perf_steps_end) {
            self.run_stage(mesh, mparam, stage)?;
        }
        Ok(())
    }

    /// Run one stage, enforcing the linear stage order on `mesh`.
    fn run_stage(
        &self,
        mesh: &mut Mesh,
        mparam: &MeshingParameters,
        stage: PipelineStage,
    ) -> GeomResult<()> {
        mesh.check_stage(stage)?;
        match stage {
            PipelineStage::Analyse => self.analyse(mesh, mparam)?,
            PipelineStage::FindEdges => self.find_edges(mesh, mparam)?,
            PipelineStage::MeshSurface => self.mesh_surface(mesh, mparam)?,
            PipelineStage::OptimizeSurface => self.optimize_surface(mesh, mparam)?,
            PipelineStage::FinalizeMesh => self.finalize_mesh(mesh)?,
        }
        mesh.mark_stage_complete(stage);
        Ok(())
    }

    fn analyse(&self, mesh: &mut Mesh, mparam: &MeshingParameters) -> GeomResult<()> {
        stages::analyse(self, mesh, mparam)
    }

    fn find_edges(&self, mesh: &mut Mesh, mparam: &MeshingParameters) -> GeomResult<()> {
        stages::find_edges(self, mesh, mparam)
    }

    fn mesh_surface(&self, mesh: &mut Mesh, mparam: &MeshingParameters) -> GeomResult<()> {
        stages::mesh_surface(self, mesh, mparam)
    }

    fn optimize_surface(&self, mesh: &mut Mesh, mparam: &MeshingParameters) -> GeomResult<()> {
        stages::optimize_surface(self, mesh, mparam)
    }

    fn finalize_mesh(&self, _mesh: &mut Mesh) -> GeomResult<()> {
        Ok(())
    }

    fn project_point(&self, _surfind: usize, _p: &mut Point3<f64>) {}

    fn project_point_edge(
        &self,
        _surfind: usize,
        _surfind2: usize,
        _p: &mut Point3<f64>,
        _egi: Option<&mut EdgePointGeomInfo>,
    ) {
    }

    fn calc_point_geom_info(&self, _surfind: usize, _p: &Point3<f64>) -> Option<PointGeomInfo> {
        None
    }

    fn project_point_gi(
        &self,
        _surfind: usize,
        _p: &mut Point3<f64>,
        _gi: &mut PointGeomInfo,
    ) -> GeomResult<()> {
        Err(GeometryError::not_implemented(
            "project_point_gi",
            self.type_name(),
        ))
    }

    fn normal(&self, _surfind: usize, _p: &Point3<f64>, _gi: Option<&PointGeomInfo>) -> Vector3<f64> {
        Vector3::new(0.0, 0.0, 1.0)
    }

    /// Point at fraction `secpoint` between two surface points.
    ///
    /// The default interpolates linearly in space and carries the first
    /// endpoint's geometry info over unchanged.
    fn point_between(
        &self,
        p1: &Point3<f64>,
        p2: &Point3<f64>,
        secpoint: f64,
        _surfi: usize,
        gi1: &PointGeomInfo,
        _gi2: &PointGeomInfo,
    ) -> (Point3<f64>, PointGeomInfo) {
        (p1 + (p2 - p1) * secpoint, *gi1)
    }

    /// Point at fraction `secpoint` between two edge points; linear by
    /// default, like [`point_between`](Self::point_between).
    fn point_between_edge(
        &self,
        p1: &Point3<f64>,
        p2: &Point3<f64>,
        secpoint: f64,
        _surfi1: usize,
        _surfi2: usize,
        ap1: &EdgePointGeomInfo,
        _ap2: &EdgePointGeomInfo,
    ) -> (Point3<f64>, EdgePointGeomInfo) {
        (p1 + (p2 - p1) * secpoint, *ap1)
    }

    fn tangent(
        &self,
        _p: &Point3<f64>,
        _surfi1: usize,
        _surfi2: usize,
        _egi: &EdgePointGeomInfo,
    ) -> GeomResult<Vector3<f64>> {
        Err(GeometryError::not_implemented("tangent", self.type_name()))
    }

    /// Index of the registered edge with the same hash as `edge`.
    fn edge_index(&self, edge: &dyn GeometryEdge) -> GeomResult<usize> {
        let hash = edge.hash_key();
        self.edges()
            .iter()
            .position(|e| e.hash_key() == hash)
            .ok_or(GeometryError::EdgeNotFound { hash })
    }

    fn save(&self, _path: &Path) -> GeomResult<()> {
        Err(GeometryError::not_implemented("save", self.type_name()))
    }

    /// Append the geometry to a mesh file; kernels without support write nothing.
    fn save_to_mesh_file(&self, _out: &mut dyn Write) -> GeomResult<()> {
        Ok(())
    }

    fn do_archive(&mut self, _archive: &mut dyn Archive) -> GeomResult<()> {
        Err(GeometryError::not_implemented("do_archive", self.type_name()))
    }

    fn type_name(&self) -> &'static str {
        std::any::type_name::<Self>()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Corner(u64, Point3<f64>);

    impl GeometryVertex for Corner {
        fn point(&self) -> Point3<f64> {
            self.1
        }
        fn hash_key(&self) -> u64 {
            self.0
        }
    }

    /// Straight edge between two vertex indices, identified by `hash`
    #[derive(Clone, Copy)]
    struct Link {
        start: usize,
        end: usize,
        hash: u64,
    }

    impl GeometryEdge for Link {
        fn start_vertex(&self) -> usize {
            self.start
        }
        fn end_vertex(&self) -> usize {
            self.end
        }
        fn length(&self) -> f64 {
            1.0
        }
        fn point(&self, t: f64) -> Point3<f64> {
            Point3::new(t, 0.0, 0.0)
        }
        fn calc_step(&self, _t: f64, _sag: f64) -> f64 {
            1.0
        }
        fn oriented_like_global(&self) -> bool {
            true
        }
        fn hash_key(&self) -> u64 {
            self.hash
        }
    }

    struct Ring(Vec<Link>);

    impl GeometryFace for Ring {
        fn n_boundaries(&self) -> usize {
            1
        }
        fn boundary(&self, _index: usize) -> Vec<Box<dyn GeometryEdge>> {
            self.0.iter().map(|l| Box::new(*l) as Box<dyn GeometryEdge>).collect()
        }
        fn point(&self, gi: &PointGeomInfo) -> Point3<f64> {
            Point3::new(gi.u, gi.v, 0.0)
        }
        fn calc_edge_point_gi(&self, _edge: &dyn GeometryEdge, _t: f64, _egi: &mut EdgePointGeomInfo) {}
        fn bounding_box(&self) -> BoundingBox {
            BoundingBox::empty()
        }
        fn curvature(&self, _gi: &PointGeomInfo) -> f64 {
            0.0
        }
        fn seed_triangles(&self) -> Vec<[PointGeomInfo; 3]> {
            Vec::new()
        }
    }

    fn link(start: usize, end: usize, hash: u64) -> Link {
        Link { start, end, hash }
    }

    fn corners() -> Vec<Box<dyn GeometryVertex>> {
        vec![
            Box::new(Corner(1, Point3::new(0.0, 0.0, 0.0))),
            Box::new(Corner(2, Point3::new(1.0, 0.0, 0.0))),
            Box::new(Corner(3, Point3::new(0.0, 1.0, 0.0))),
        ]
    }

    fn triangle_edges() -> Vec<Link> {
        vec![link(0, 1, 10), link(1, 2, 11), link(2, 0, 12)]
    }

    fn build(
        vertices: Vec<Box<dyn GeometryVertex>>,
        edges: &[Link],
        ring: Vec<Link>,
    ) -> GeomResult<GeometryStore> {
        let edges = edges.iter().map(|l| Box::new(*l) as Box<dyn GeometryEdge>).collect();
        GeometryStore::new(vertices, edges, vec![Box::new(Ring(ring))])
    }

    fn topology_message(result: GeomResult<GeometryStore>) -> String {
        match result {
            Err(GeometryError::InvalidTopology(message)) => message,
            Err(other) => panic!("expected InvalidTopology, got {other:?}"),
            Ok(_) => panic!("expected InvalidTopology, got a store"),
        }
    }

    #[test]
    fn test_closed_triangle_is_accepted() {
        let store = build(corners(), &triangle_edges(), triangle_edges()).unwrap();
        assert_eq!(store.vertices().len(), 3);
        assert_eq!(store.edges().len(), 3);
        assert_eq!(store.bounding_box().max, Point3::new(1.0, 1.0, 0.0));
    }

    #[test]
    fn test_repeated_vertex_hash_is_rejected() {
        let mut vertices = corners();
        vertices[2] = Box::new(Corner(1, Point3::new(0.0, 1.0, 0.0)));
        let message = topology_message(build(vertices, &triangle_edges(), triangle_edges()));
        assert!(message.contains("vertex 2 repeats hash"), "{message}");
    }

    #[test]
    fn test_edge_past_vertex_array_is_rejected() {
        let mut edges = triangle_edges();
        edges[1] = link(1, 3, 11);
        let message = topology_message(build(corners(), &edges, triangle_edges()));
        assert!(message.contains("edge 1 references vertices (1, 3)"), "{message}");
    }

    #[test]
    fn test_repeated_edge_hash_is_rejected() {
        let mut edges = triangle_edges();
        edges[2].hash = 10;
        let message = topology_message(build(corners(), &edges, triangle_edges()));
        assert!(message.contains("edge 2 repeats hash"), "{message}");
    }

    #[test]
    fn test_loop_with_unregistered_edge_is_rejected() {
        let mut ring = triangle_edges();
        ring[1].hash = 99;
        let message = topology_message(build(corners(), &triangle_edges(), ring));
        assert!(message.contains("face 0 loop 0 uses unregistered edge 0x63"), "{message}");
    }

    #[test]
    fn test_open_loop_is_rejected() {
        let edges = triangle_edges();
        // 0 -> 1, then 2 -> 0: the loop breaks after the first edge
        let ring = vec![edges[0], edges[2]];
        let message = topology_message(build(corners(), &edges, ring));
        assert!(message.contains("face 0 loop 0 is open after edge 0"), "{message}");
    }
}
