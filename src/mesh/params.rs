// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Polyframe Inc.

//! Meshing parameters

use super::PipelineStage;
use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Read-only configuration consumed by the meshing pipeline.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MeshingParameters {
    /// Global upper bound on element size
    pub max_h: f64,
    /// Lower bound on element size from curvature refinement
    pub min_h: f64,
    /// Maximum chordal deviation from the exact geometry
    pub sag: f64,
    /// Size-restriction recursion always subdivides down to this depth
    pub min_depth: u32,
    /// Size-restriction recursion never subdivides past this depth
    pub max_depth: u32,
    /// Growth rate of the size field away from a restriction
    pub grading: f64,
    /// Minimum number of segments on every edge
    pub segments_per_edge: f64,
    /// Smoothing passes in surface optimization
    pub optsteps_2d: u32,
    /// First pipeline stage run by `generate_mesh`
    pub perf_steps_start: PipelineStage,
    /// Last pipeline stage run by `generate_mesh`
    pub perf_steps_end: PipelineStage,
    /// Run per-face size restriction on the rayon pool
    pub parallel: bool,
}

impl Default for MeshingParameters {
    fn default() -> Self {
        Self {
            max_h: 1000.0,
            min_h: 0.0,
            sag: 0.01,
            min_depth: 0,
            max_depth: 10,
            grading: 0.3,
            segments_per_edge: 1.0,
            optsteps_2d: 3,
            perf_steps_start: PipelineStage::Analyse,
            perf_steps_end: PipelineStage::FinalizeMesh,
            parallel: true,
        }
    }
}

impl MeshingParameters {
    pub fn new() -> Self {
        Self::default()
    }

    /// Load parameters from a TOML file
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let content = std::fs::read_to_string(path.as_ref())
            .with_context(|| format!("Failed to read meshing parameters: {:?}", path.as_ref()))?;
        let params: MeshingParameters = toml::from_str(&content)
            .with_context(|| format!("Failed to parse meshing parameters: {:?}", path.as_ref()))?;
        params.validate()?;
        Ok(params)
    }

    /// Load `meshing.toml` if present, then apply environment overrides
    pub fn load() -> Result<Self> {
        let mut params = if PathBuf::from("meshing.toml").exists() {
            Self::from_file("meshing.toml")?
        } else {
            Self::default()
        };

        if let Ok(maxh) = std::env::var("MESHGEOM_MAXH") {
            params.max_h = maxh.parse().context("MESHGEOM_MAXH is not a number")?;
        }
        if let Ok(minh) = std::env::var("MESHGEOM_MINH") {
            params.min_h = minh.parse().context("MESHGEOM_MINH is not a number")?;
        }
        if let Ok(sag) = std::env::var("MESHGEOM_SAG") {
            params.sag = sag.parse().context("MESHGEOM_SAG is not a number")?;
        }
        if let Ok(grading) = std::env::var("MESHGEOM_GRADING") {
            params.grading = grading.parse().context("MESHGEOM_GRADING is not a number")?;
        }

        params.validate()?;
        Ok(params)
    }

    /// Save parameters to a TOML file
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let content = toml::to_string_pretty(self).context("Failed to serialize meshing parameters")?;
        std::fs::write(path.as_ref(), content)
            .with_context(|| format!("Failed to write meshing parameters: {:?}", path.as_ref()))?;
        Ok(())
    }

    pub fn validate(&self) -> Result<()> {
        if !(self.max_h > 0.0) {
            bail!("max_h must be positive, got {}", self.max_h);
        }
        if !(self.min_h >= 0.0) || self.min_h > self.max_h {
            bail!("min_h must lie in [0, max_h], got {}", self.min_h);
        }
        if !(self.sag > 0.0) {
            bail!("sag must be positive, got {}", self.sag);
        }
        if self.min_depth > self.max_depth {
            bail!(
                "min_depth ({}) exceeds max_depth ({})",
                self.min_depth,
                self.max_depth
            );
        }
        if !(self.grading >= 0.0) {
            bail!("grading must be non-negative, got {}", self.grading);
        }
        if !(self.segments_per_edge > 0.0) {
            bail!("segments_per_edge must be positive, got {}", self.segments_per_edge);
        }
        if self.perf_steps_start > self.perf_steps_end {
            bail!(
                "perf_steps_start ({}) is after perf_steps_end ({})",
                self.perf_steps_start.as_str(),
                self.perf_steps_end.as_str()
            );
        }
        Ok(())
    }

    /// Clamp a size into `[min_h, max_h]`
    pub fn clamp_h(&self, h: f64) -> f64 {
        h.max(self.min_h).min(self.max_h)
    }

    pub fn with_max_h(mut self, max_h: f64) -> Self {
        self.max_h = max_h;
        self
    }

    pub fn with_min_h(mut self, min_h: f64) -> Self {
        self.min_h = min_h;
        self
    }

    pub fn with_sag(mut self, sag: f64) -> Self {
        self.sag = sag;
        self
    }

    pub fn with_depth(mut self, min_depth: u32, max_depth: u32) -> Self {
        self.min_depth = min_depth;
        self.max_depth = max_depth;
        self
    }

    pub fn with_grading(mut self, grading: f64) -> Self {
        self.grading = grading;
        self
    }

    pub fn with_stages(mut self, start: PipelineStage, end: PipelineStage) -> Self {
        self.perf_steps_start = start;
        self.perf_steps_end = end;
        self
    }

    pub fn with_parallel(mut self, parallel: bool) -> Self {
        self.parallel = parallel;
        self
    }
}
