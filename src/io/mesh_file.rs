// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Polyframe Inc.

//! Mesh files: a header line, the mesh as one JSON line, then an optional
//! geometry section written by the geometry itself.

use crate::error::{GeomResult, GeometryError};
use crate::geometry::{GeometryRegisterArray, NetgenGeometry};
use crate::mesh::Mesh;
use std::fs::File;
use std::io::{BufRead, BufReader, BufWriter, Read, Write};
use std::path::Path;
use std::sync::Arc;

pub const MESH_FILE_HEADER: &str = "meshgeom-mesh 1";

pub fn write_mesh_file(
    mesh: &Mesh,
    geometry: Option<&dyn NetgenGeometry>,
    out: &mut dyn Write,
) -> GeomResult<()> {
    writeln!(out, "{MESH_FILE_HEADER}")?;
    serde_json::to_writer(&mut *out, mesh)?;
    writeln!(out)?;
    if let Some(geo) = geometry {
        geo.save_to_mesh_file(out)?;
    }
    Ok(())
}

/// Read a mesh and hand the rest of the file to the registry's loaders
pub fn read_mesh_file(
    input: &mut dyn Read,
    registry: &GeometryRegisterArray,
) -> GeomResult<(Mesh, Option<Arc<dyn NetgenGeometry>>)> {
    let mut reader = BufReader::new(input);

    let mut header = String::new();
    reader.read_line(&mut header)?;
    if header.trim() != MESH_FILE_HEADER {
        return Err(GeometryError::Archive(format!(
            "unexpected mesh file header '{}'",
            header.trim()
        )));
    }

    let mut body = String::new();
    reader.read_line(&mut body)?;
    let mesh: Mesh = serde_json::from_str(&body)?;

    let geometry = registry.load_from_mesh_file(&mut reader)?;
    Ok((mesh, geometry))
}

pub fn save_mesh(
    mesh: &Mesh,
    geometry: Option<&dyn NetgenGeometry>,
    path: &Path,
) -> GeomResult<()> {
    let mut writer = BufWriter::new(File::create(path)?);
    write_mesh_file(mesh, geometry, &mut writer)?;
    writer.flush()?;
    Ok(())
}

pub fn load_mesh(
    path: &Path,
    registry: &GeometryRegisterArray,
) -> GeomResult<(Mesh, Option<Arc<dyn NetgenGeometry>>)> {
    read_mesh_file(&mut File::open(path)?, registry)
}
