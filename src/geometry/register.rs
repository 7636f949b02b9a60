// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Polyframe Inc.

//! Loader registry for geometry file formats

use super::NetgenGeometry;
use crate::error::{GeomResult, GeometryError};
use std::io::{BufRead, Read};
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, info};

/// A loader for one geometry format.
///
/// Loaders answer `None` for inputs they do not recognise so the registry
/// can try the next one.
pub trait GeometryRegister: Send + Sync {
    fn name(&self) -> &str;

    fn load(&self, path: &Path) -> Option<Box<dyn NetgenGeometry>>;

    /// Read a geometry section embedded in a mesh file
    fn load_from_mesh_file(&self, _input: &mut dyn BufRead) -> Option<Box<dyn NetgenGeometry>> {
        None
    }
}

/// Ordered collection of loaders, tried in registration order.
#[derive(Default)]
pub struct GeometryRegisterArray {
    registers: Vec<Box<dyn GeometryRegister>>,
}

impl GeometryRegisterArray {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, register: Box<dyn GeometryRegister>) -> &mut Self {
        debug!("Registered geometry loader '{}'", register.name());
        self.registers.push(register);
        self
    }

    pub fn len(&self) -> usize {
        self.registers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.registers.is_empty()
    }

    pub fn names(&self) -> Vec<&str> {
        self.registers.iter().map(|r| r.name()).collect()
    }

    /// Load `path` with the first loader that accepts it.
    pub fn load(&self, path: &Path) -> GeomResult<Box<dyn NetgenGeometry>> {
        for register in &self.registers {
            if let Some(geo) = register.load(path) {
                info!("Loaded {} with '{}'", path.display(), register.name());
                return Ok(geo);
            }
        }
        Err(GeometryError::NoLoader {
            source_name: path.display().to_string(),
        })
    }

    /// Offer the remainder of a mesh file to each loader in turn.
    ///
    /// Every loader sees the stream from the same position. Returns
    /// `Ok(None)` when no loader recognises the section.
    pub fn load_from_mesh_file(
        &self,
        input: &mut dyn Read,
    ) -> GeomResult<Option<Arc<dyn NetgenGeometry>>> {
        let mut buffer = Vec::new();
        input.read_to_end(&mut buffer)?;

        for register in &self.registers {
            let mut cursor: &[u8] = &buffer;
            if let Some(geo) = register.load_from_mesh_file(&mut cursor) {
                debug!("Mesh file geometry read by '{}'", register.name());
                return Ok(Some(Arc::from(geo)));
            }
        }
        Ok(None)
    }
}
