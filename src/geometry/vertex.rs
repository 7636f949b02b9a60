// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Polyframe Inc.

//! Geometric vertices

use nalgebra::Point3;

/// A 0-dimensional geometric entity.
///
/// Equality across the system is defined by [`hash_key`](Self::hash_key),
/// never by reference identity: adapters may wrap or copy kernel objects.
pub trait GeometryVertex: Send + Sync {
    fn point(&self) -> Point3<f64>;

    /// Identity derived from the underlying kernel object, stable for the
    /// lifetime of the owning geometry.
    fn hash_key(&self) -> u64;
}

/// Whether two vertices denote the same topological entity
pub fn same_vertex(a: &dyn GeometryVertex, b: &dyn GeometryVertex) -> bool {
    a.hash_key() == b.hash_key()
}
