// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Polyframe Inc.

//! Error types for geometry queries and the meshing pipeline

use crate::mesh::PipelineStage;
use thiserror::Error;

/// Errors raised at the geometry-kernel boundary.
#[derive(Debug, Error)]
pub enum GeometryError {
    /// A kernel adapter did not override an operation the base only stubs.
    #[error("{operation} not implemented for {type_name}")]
    NotImplemented {
        operation: &'static str,
        type_name: &'static str,
    },

    /// No edge with this hash is registered with the geometry.
    #[error("Couldn't find edge index for hash {hash:#x}")]
    EdgeNotFound { hash: u64 },

    /// A face index outside the geometry's face array.
    #[error("Face {index} does not exist, geometry has {count} faces")]
    FaceNotFound { index: usize, count: usize },

    /// Projection onto a face did not converge to a valid parametrization.
    #[error("Projection onto face {face} failed: {reason}")]
    ProjectionFailed { face: usize, reason: String },

    /// Every registered loader declined the input.
    #[error("No registered geometry loader accepted {source_name}")]
    NoLoader { source_name: String },

    /// Vertex/edge/face collections violate a topological invariant.
    #[error("Invalid topology: {0}")]
    InvalidTopology(String),

    /// A pipeline stage was requested out of order.
    #[error("Stage {requested:?} cannot run after {completed:?}")]
    StageOrder {
        requested: PipelineStage,
        completed: Option<PipelineStage>,
    },

    /// An archive was read that lacks an expected entry.
    #[error("Archive error: {0}")]
    Archive(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl GeometryError {
    /// Shorthand for the `NotImplemented` kind.
    pub fn not_implemented(operation: &'static str, type_name: &'static str) -> Self {
        GeometryError::NotImplemented {
            operation,
            type_name,
        }
    }

    pub fn projection(face: usize, reason: impl Into<String>) -> Self {
        GeometryError::ProjectionFailed {
            face,
            reason: reason.into(),
        }
    }

    /// Whether a meshing stage may handle this error locally and carry on.
    ///
    /// Only per-point projection failures are recoverable; identity and
    /// configuration errors must reach the pipeline driver.
    pub fn is_recoverable(&self) -> bool {
        matches!(self, GeometryError::ProjectionFailed { .. })
    }
}

/// Result type for geometry operations.
pub type GeomResult<T> = std::result::Result<T, GeometryError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = GeometryError::not_implemented("tangent", "my_kernel::Geo");
        assert_eq!(format!("{err}"), "tangent not implemented for my_kernel::Geo");

        let err = GeometryError::EdgeNotFound { hash: 255 };
        assert!(format!("{err}").contains("0xff"));
    }

    #[test]
    fn test_recoverable_kinds() {
        assert!(GeometryError::projection(3, "diverged").is_recoverable());
        assert!(!GeometryError::EdgeNotFound { hash: 1 }.is_recoverable());
        assert!(!GeometryError::not_implemented("x", "y").is_recoverable());
    }
}
