// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Polyframe Inc.

//! Meshing pipeline stages

use serde::{Deserialize, Serialize};

/// Stages of the surface meshing pipeline, in execution order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PipelineStage {
    Analyse,
    FindEdges,
    MeshSurface,
    OptimizeSurface,
    FinalizeMesh,
}

impl PipelineStage {
    pub const ALL: [PipelineStage; 5] = [
        PipelineStage::Analyse,
        PipelineStage::FindEdges,
        PipelineStage::MeshSurface,
        PipelineStage::OptimizeSurface,
        PipelineStage::FinalizeMesh,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            PipelineStage::Analyse => "analyse",
            PipelineStage::FindEdges => "find_edges",
            PipelineStage::MeshSurface => "mesh_surface",
            PipelineStage::OptimizeSurface => "optimize_surface",
            PipelineStage::FinalizeMesh => "finalize_mesh",
        }
    }

    pub fn from_name(s: &str) -> Option<Self> {
        let s = s.to_lowercase();
        Self::ALL.into_iter().find(|stage| stage.as_str() == s)
    }

    /// The stage that must have completed before this one may run
    pub fn previous(&self) -> Option<PipelineStage> {
        let i = *self as usize;
        i.checked_sub(1).map(|p| Self::ALL[p])
    }

    pub fn next(&self) -> Option<PipelineStage> {
        Self::ALL.get(*self as usize + 1).copied()
    }

    /// Stages from `start` to `end` inclusive
    pub fn range(start: PipelineStage, end: PipelineStage) -> impl Iterator<Item = PipelineStage> {
        Self::ALL
            .into_iter()
            .filter(move |stage| *stage >= start && *stage <= end)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_linear_order() {
        assert_eq!(PipelineStage::Analyse.previous(), None);
        assert_eq!(PipelineStage::MeshSurface.previous(), Some(PipelineStage::FindEdges));
        assert_eq!(PipelineStage::FinalizeMesh.next(), None);
        assert_eq!(PipelineStage::Analyse.next(), Some(PipelineStage::FindEdges));
    }

    #[test]
    fn test_range() {
        let stages: Vec<_> =
            PipelineStage::range(PipelineStage::FindEdges, PipelineStage::OptimizeSurface).collect();
        assert_eq!(
            stages,
            vec![
                PipelineStage::FindEdges,
                PipelineStage::MeshSurface,
                PipelineStage::OptimizeSurface
            ]
        );
    }

    #[test]
    fn test_from_name() {
        assert_eq!(PipelineStage::from_name("MESH_SURFACE"), Some(PipelineStage::MeshSurface));
        assert_eq!(PipelineStage::from_name("mesh_volume"), None);
    }
}
