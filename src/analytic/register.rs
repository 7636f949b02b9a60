// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Polyframe Inc.

use super::description::GeometryDescription;
use super::geometry::{AnalyticGeometry, MESH_FILE_SECTION};
use crate::geometry::{GeometryRegister, NetgenGeometry};
use std::io::BufRead;
use std::path::Path;
use tracing::warn;

/// Loader for JSON geometry descriptions
#[derive(Debug, Default, Clone, Copy)]
pub struct AnalyticRegister;

impl GeometryRegister for AnalyticRegister {
    fn name(&self) -> &str {
        "analytic"
    }

    fn load(&self, path: &Path) -> Option<Box<dyn NetgenGeometry>> {
        if path.extension()? != "json" {
            return None;
        }
        match AnalyticGeometry::from_file(path) {
            Ok(geo) => Some(Box::new(geo)),
            Err(e) => {
                warn!("{} is not an analytic geometry: {}", path.display(), e);
                None
            }
        }
    }

    fn load_from_mesh_file(&self, input: &mut dyn BufRead) -> Option<Box<dyn NetgenGeometry>> {
        let mut lines = input.lines();
        lines.by_ref().map_while(Result::ok).find(|l| l.trim() == MESH_FILE_SECTION)?;
        let payload = lines.next()?.ok()?;

        let description: GeometryDescription = match serde_json::from_str(&payload) {
            Ok(description) => description,
            Err(e) => {
                warn!("Malformed {} section: {}", MESH_FILE_SECTION, e);
                return None;
            }
        };
        match AnalyticGeometry::from_description(description) {
            Ok(geo) => Some(Box::new(geo)),
            Err(e) => {
                warn!("Invalid geometry in mesh file: {}", e);
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use nalgebra::Vector3;
    use tempfile::tempdir;

    #[test]
    fn test_load_json_file() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("box.json");
        let desc = GeometryDescription::cuboid(Vector3::new(1.0, 2.0, 3.0));
        std::fs::write(&path, serde_json::to_string(&desc).unwrap()).unwrap();

        let geo = AnalyticRegister.load(&path).unwrap();
        assert_eq!(geo.faces().len(), 6);

        assert!(AnalyticRegister.load(&dir.path().join("box.step")).is_none());
        std::fs::write(dir.path().join("bad.json"), "{}").unwrap();
        assert!(AnalyticRegister.load(&dir.path().join("bad.json")).is_none());
    }

    #[test]
    fn test_mesh_file_section() {
        let geo = AnalyticGeometry::from_description(GeometryDescription::tube(1.0, 1.0)).unwrap();
        let mut buffer = b"mesh data\n".to_vec();
        geo.save_to_mesh_file(&mut buffer).unwrap();

        let mut input: &[u8] = &buffer;
        let loaded = AnalyticRegister.load_from_mesh_file(&mut input).unwrap();
        assert_eq!(loaded.edges().len(), 6);

        let mut input: &[u8] = b"mesh data\nother_geometry\n{}\n";
        assert!(AnalyticRegister.load_from_mesh_file(&mut input).is_none());
    }
}
