// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Polyframe Inc.

//! I/O module - mesh files, exporting and comparison

mod compare;
mod exporter;
mod mesh_file;

pub use compare::{compare_meshes, MeshComparison};
pub use exporter::{export, export_json, export_stl, ExportFormat};
pub use mesh_file::{
    load_mesh, read_mesh_file, save_mesh, write_mesh_file, MESH_FILE_HEADER,
};
