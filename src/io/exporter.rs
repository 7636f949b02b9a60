// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Polyframe Inc.

//! Mesh exporters for various formats

use crate::mesh::Mesh;
use anyhow::{Context, Result};
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

/// Output format for surface meshes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExportFormat {
    Json,
    Stl,
}

impl ExportFormat {
    pub fn from_name(s: &str) -> Option<Self> {
        match s.to_ascii_lowercase().as_str() {
            "json" => Some(ExportFormat::Json),
            "stl" => Some(ExportFormat::Stl),
            _ => None,
        }
    }

    /// Guess the format from a file extension
    pub fn from_path(path: &Path) -> Option<Self> {
        Self::from_name(path.extension()?.to_str()?)
    }
}

pub fn export(mesh: &Mesh, path: &Path, format: ExportFormat) -> Result<()> {
    match format {
        ExportFormat::Json => export_json(mesh, path),
        ExportFormat::Stl => export_stl(mesh, path),
    }
}

/// Export surface elements to binary STL
pub fn export_stl(mesh: &Mesh, path: &Path) -> Result<()> {
    use stl_io::{Normal, Triangle as StlTriangle, Vertex as StlVertex};

    let vertex = |i: usize| {
        let p = mesh.point(i);
        StlVertex::new([p.x as f32, p.y as f32, p.z as f32])
    };

    let triangles: Vec<StlTriangle> = mesh
        .surface_elements
        .iter()
        .map(|el| {
            let normal = mesh.element_normal(el).try_normalize(0.0).unwrap_or_default();
            StlTriangle {
                normal: Normal::new([normal.x as f32, normal.y as f32, normal.z as f32]),
                vertices: el.points.map(&vertex),
            }
        })
        .collect();

    let mut file = File::create(path).context("Failed to create STL file")?;
    stl_io::write_stl(&mut file, triangles.iter()).context("Failed to write STL file")?;

    Ok(())
}

/// Export the whole mesh, segments and parametrizations included, as JSON
pub fn export_json(mesh: &Mesh, path: &Path) -> Result<()> {
    let file = File::create(path).context("Failed to create JSON file")?;
    let mut writer = BufWriter::new(file);
    serde_json::to_writer_pretty(&mut writer, mesh).context("Failed to write JSON mesh")?;
    writer.flush()?;
    Ok(())
}
