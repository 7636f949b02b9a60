// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Polyframe Inc.

//! Cached local parametrizations attached to mesh points

use serde::{Deserialize, Serialize};

/// Local parametrization of a point on a face.
///
/// `trignum` is the face index; `u`, `v` are the face's local parameters.
/// These are transient annotations: they make repeated evaluation and
/// projection near the same point cheap and own nothing.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PointGeomInfo {
    pub trignum: usize,
    pub u: f64,
    pub v: f64,
}

impl PointGeomInfo {
    pub fn new(trignum: usize, u: f64, v: f64) -> Self {
        Self { trignum, u, v }
    }

    /// Parametric midpoint of two samples on the same face
    pub fn midpoint(&self, other: &PointGeomInfo) -> Self {
        self.lerp(other, 0.5)
    }

    pub fn lerp(&self, other: &PointGeomInfo, t: f64) -> Self {
        Self {
            trignum: self.trignum,
            u: self.u + t * (other.u - self.u),
            v: self.v + t * (other.v - self.v),
        }
    }

    /// Parametric centroid of three samples on the same face
    pub fn centroid(a: &PointGeomInfo, b: &PointGeomInfo, c: &PointGeomInfo) -> Self {
        Self {
            trignum: a.trignum,
            u: (a.u + b.u + c.u) / 3.0,
            v: (a.v + b.v + c.v) / 3.0,
        }
    }
}

impl Default for PointGeomInfo {
    fn default() -> Self {
        Self::new(0, 0.0, 0.0)
    }
}

/// Local parametrization of a point on an edge.
///
/// `edgenr` is the global edge index, `dist` the curve parameter, and
/// `u`, `v` the parameters on the face the info was computed for.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct EdgePointGeomInfo {
    pub edgenr: usize,
    pub body: usize,
    pub dist: f64,
    pub u: f64,
    pub v: f64,
}

impl EdgePointGeomInfo {
    pub fn new(edgenr: usize, dist: f64) -> Self {
        Self {
            edgenr,
            body: 0,
            dist,
            u: 0.0,
            v: 0.0,
        }
    }

    /// Face parametrization carried by this edge point
    pub fn to_point_geom_info(&self, face: usize) -> PointGeomInfo {
        PointGeomInfo::new(face, self.u, self.v)
    }
}

impl Default for EdgePointGeomInfo {
    fn default() -> Self {
        Self::new(0, 0.0)
    }
}
