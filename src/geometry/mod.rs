// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Polyframe Inc.

//! Geometry module - kernel-independent entity traits and the meshing
//! pipeline driver

mod archive;
mod bbox;
mod edge;
mod face;
mod geominfo;
mod netgen;
mod register;
pub mod stages;
mod vertex;

pub use archive::{Archive, JsonArchive};
pub use bbox::BoundingBox;
pub use edge::{chord_deviation, GeometryEdge};
pub use face::{restrict_h_trig, GeometryFace, RestrictStats};
pub use geominfo::{EdgePointGeomInfo, PointGeomInfo};
pub use netgen::{GeometryStore, NetgenGeometry};
pub use register::{GeometryRegister, GeometryRegisterArray};
pub use stages::divide_edge;
pub use vertex::{same_vertex, GeometryVertex};
