// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Polyframe Inc.

//! Meshgeom
//!
//! A geometry abstraction layer for mesh generation. Kernel adapters expose
//! vertices, edges and faces through a small set of traits; the meshing
//! pipeline uses them to build a curvature-adaptive size field, divide
//! edges, triangulate faces and keep every new point on the exact geometry.

pub mod analytic;
pub mod error;
pub mod geometry;
pub mod io;
pub mod mesh;

pub use analytic::{AnalyticGeometry, AnalyticRegister, GeometryDescription};
pub use error::{GeomResult, GeometryError};
pub use geometry::{
    GeometryEdge, GeometryFace, GeometryRegister, GeometryRegisterArray, GeometryStore,
    GeometryVertex, NetgenGeometry, PointGeomInfo,
};
pub use mesh::{Mesh, MeshingParameters, PipelineStage};

use std::path::Path;

/// Registry holding every loader shipped with the crate
pub fn builtin_registry() -> GeometryRegisterArray {
    let mut registry = GeometryRegisterArray::new();
    registry.register(Box::new(AnalyticRegister));
    registry
}

/// Load a geometry file and run the full meshing pipeline on it
pub fn mesh_file(
    path: impl AsRef<Path>,
    mparam: &MeshingParameters,
) -> GeomResult<(Box<dyn NetgenGeometry>, Mesh)> {
    let geo = builtin_registry().load(path.as_ref())?;
    let mut mesh = Mesh::new();
    geo.generate_mesh(&mut mesh, mparam)?;
    Ok((geo, mesh))
}
