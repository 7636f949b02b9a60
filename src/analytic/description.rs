// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Polyframe Inc.

//! Serializable description of an analytic geometry

use super::surface::Surface;
use crate::error::GeomResult;
use nalgebra::{Point3, Vector3};
use serde::{Deserialize, Serialize};
use std::f64::consts::PI;
use std::path::Path;

fn default_tolerance() -> f64 {
    1e-7
}

/// Rectangular parameter patch on one surface.
///
/// The boundary loop runs bottom (`v = v0`), right (`u = u1`), top
/// (`v = v1`) then left (`u = u0`), counter-clockwise in parameter space,
/// so the face normal is `dS/du x dS/dv`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PatchDescription {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    pub surface: Surface,
    pub u_range: [f64; 2],
    pub v_range: [f64; 2],
}

impl PatchDescription {
    pub fn new(surface: Surface, u_range: [f64; 2], v_range: [f64; 2]) -> Self {
        Self {
            name: None,
            surface,
            u_range,
            v_range,
        }
    }

    pub fn named(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }
}

/// A set of patches; corners and edges shared by several patches are
/// identified by position within `tolerance`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GeometryDescription {
    #[serde(default)]
    pub name: String,
    #[serde(default = "default_tolerance")]
    pub tolerance: f64,
    pub patches: Vec<PatchDescription>,
}

impl GeometryDescription {
    pub fn new(name: impl Into<String>, patches: Vec<PatchDescription>) -> Self {
        Self {
            name: name.into(),
            tolerance: default_tolerance(),
            patches,
        }
    }

    pub fn from_file(path: impl AsRef<Path>) -> GeomResult<Self> {
        let content = std::fs::read_to_string(path)?;
        Ok(serde_json::from_str(&content)?)
    }

    /// Axis-aligned box with one corner at the origin and outward normals
    pub fn cuboid(size: Vector3<f64>) -> Self {
        let (sx, sy, sz) = (size.x, size.y, size.z);
        let plane = |origin: Point3<f64>, u_dir: Vector3<f64>, v_dir: Vector3<f64>| Surface::Plane {
            origin,
            u_dir,
            v_dir,
        };
        let (x, y, z) = (Vector3::x(), Vector3::y(), Vector3::z());
        let o = Point3::origin();

        Self::new(
            "cuboid",
            vec![
                PatchDescription::new(plane(o, y, x), [0.0, sy], [0.0, sx]).named("bottom"),
                PatchDescription::new(plane(Point3::new(0.0, 0.0, sz), x, y), [0.0, sx], [0.0, sy])
                    .named("top"),
                PatchDescription::new(plane(o, x, z), [0.0, sx], [0.0, sz]).named("front"),
                PatchDescription::new(plane(Point3::new(0.0, sy, 0.0), z, x), [0.0, sz], [0.0, sx])
                    .named("back"),
                PatchDescription::new(plane(o, z, y), [0.0, sz], [0.0, sy]).named("left"),
                PatchDescription::new(plane(Point3::new(sx, 0.0, 0.0), y, z), [0.0, sy], [0.0, sz])
                    .named("right"),
            ],
        )
    }

    /// Open cylindrical tube around the z axis, split into two half shells
    pub fn tube(radius: f64, height: f64) -> Self {
        let surface = Surface::Cylinder {
            origin: Point3::origin(),
            axis: Vector3::z(),
            ref_dir: Vector3::x(),
            radius,
        };
        Self::new(
            "tube",
            vec![
                PatchDescription::new(surface, [0.0, PI], [0.0, height]).named("front"),
                PatchDescription::new(surface, [PI, 2.0 * PI], [0.0, height]).named("back"),
            ],
        )
    }

    /// Spherical zone between two latitudes, split into four quarters
    pub fn sphere_band(radius: f64, v0: f64, v1: f64) -> Self {
        let surface = Surface::Sphere {
            center: Point3::origin(),
            radius,
        };
        let patches = (0..4)
            .map(|k| {
                let u0 = k as f64 * PI / 2.0;
                PatchDescription::new(surface, [u0, u0 + PI / 2.0], [v0, v1])
                    .named(format!("quarter{k}"))
            })
            .collect();
        Self::new("sphere_band", patches)
    }
}
