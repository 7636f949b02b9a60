// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Polyframe Inc.

//! Analytic geometry kernel
//!
//! Rectangular patches of planes, cylinders and spheres with line and arc
//! boundary curves. Everything is closed-form, so the kernel serves as the
//! reference implementation of the geometry traits and drives the meshing
//! pipeline end to end.

mod curve;
mod description;
mod entities;
mod geometry;
mod register;
mod surface;

pub use curve::Curve;
pub use description::{GeometryDescription, PatchDescription};
pub use entities::{AnalyticEdge, AnalyticFace, AnalyticVertex};
pub use geometry::{AnalyticGeometry, MESH_FILE_SECTION};
pub use register::AnalyticRegister;
pub use surface::Surface;
