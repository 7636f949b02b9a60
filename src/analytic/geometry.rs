// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Polyframe Inc.

//! Analytic geometry: patches of closed-form surfaces meshed through the
//! generic pipeline

use super::curve::Curve;
use super::description::{GeometryDescription, PatchDescription};
use super::entities::{entity_hash, quantize, AnalyticEdge, AnalyticFace, AnalyticVertex};
use crate::error::{GeomResult, GeometryError};
use crate::geometry::{
    Archive, EdgePointGeomInfo, GeometryEdge, GeometryFace, GeometryStore, GeometryVertex,
    NetgenGeometry, PointGeomInfo,
};
use crate::mesh::GeomType;
use nalgebra::{Point3, Vector3};
use serde_json::Value;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;
use tracing::debug;

/// Line introducing the geometry section of a mesh file
pub const MESH_FILE_SECTION: &str = "analytic_geometry";

/// Alternating projections used to land on the intersection of two faces
const EDGE_PROJECTION_ROUNDS: usize = 8;

pub struct AnalyticGeometry {
    store: GeometryStore,
    description: GeometryDescription,
    curves: Vec<Curve>,
    faces: Vec<AnalyticFace>,
}

impl std::fmt::Debug for AnalyticGeometry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AnalyticGeometry")
            .field("name", &self.description.name)
            .field("vertices", &self.store.vertices().len())
            .field("edges", &self.curves.len())
            .field("faces", &self.faces.len())
            .finish()
    }
}

/// Collects shared vertices and edges while patches are added
struct Builder {
    tolerance: f64,
    vertices: Vec<AnalyticVertex>,
    edges: Vec<AnalyticEdge>,
}

impl Builder {
    fn vertex(&mut self, p: Point3<f64>) -> usize {
        if let Some(i) = self
            .vertices
            .iter()
            .position(|v| (v.point() - p).norm() <= self.tolerance)
        {
            return i;
        }
        self.vertices.push(AnalyticVertex::new(p, self.tolerance));
        self.vertices.len() - 1
    }

    fn close(&self, a: &Point3<f64>, b: &Point3<f64>) -> bool {
        (a - b).norm() <= self.tolerance
    }

    /// Registered edge running along `curve`, oriented like `curve`
    fn edge(&mut self, curve: Curve) -> GeomResult<AnalyticEdge> {
        let a = self.vertex(curve.point(0.0));
        let b = self.vertex(curve.point(1.0));
        if a == b {
            return Err(GeometryError::InvalidTopology(format!(
                "closed or degenerate edge at {:?}",
                curve.point(0.0)
            )));
        }

        let mid = curve.point(0.5);
        let quarter = curve.point(0.25);
        for edge in &self.edges {
            let global = edge.curve();
            if !self.close(&global.point(0.5), &mid) {
                continue;
            }
            if (edge.start_vertex(), edge.end_vertex()) == (a, b)
                && self.close(&global.point(0.25), &quarter)
            {
                return Ok(edge.clone());
            }
            if (edge.start_vertex(), edge.end_vertex()) == (b, a)
                && self.close(&global.point(0.75), &quarter)
            {
                return Ok(edge.reversed());
            }
        }

        let (ha, hb) = (self.vertices[a].hash_key(), self.vertices[b].hash_key());
        let key = ("edge", ha.min(hb), ha.max(hb), quantize(&mid, self.tolerance));
        let edge = AnalyticEdge::new(curve, a, b, entity_hash(key));
        self.edges.push(edge.clone());
        Ok(edge)
    }
}

impl AnalyticGeometry {
    /// Build the topology of a description: shared corners and edges are
    /// merged, every patch gets a closed bottom-right-top-left loop.
    pub fn from_description(description: GeometryDescription) -> GeomResult<Self> {
        if !(description.tolerance > 0.0) {
            return Err(GeometryError::InvalidTopology(format!(
                "tolerance {} must be positive",
                description.tolerance
            )));
        }

        let mut builder = Builder {
            tolerance: description.tolerance,
            vertices: Vec::new(),
            edges: Vec::new(),
        };
        let mut faces = Vec::with_capacity(description.patches.len());

        for (index, patch) in description.patches.iter().enumerate() {
            let surface = patch.surface.normalized()?;
            surface.validate_range(patch.u_range, patch.v_range)?;
            let [u0, u1] = patch.u_range;
            let [v0, v1] = patch.v_range;

            let sides = [
                surface.iso_v(v0, u0, u1),
                surface.iso_u(u1, v0, v1),
                surface.iso_v(v1, u1, u0),
                surface.iso_u(u0, v1, v0),
            ];
            let mut boundary = Vec::with_capacity(4);
            for curve in sides {
                boundary.push(builder.edge(curve)?);
            }

            let normalized = PatchDescription {
                surface,
                ..patch.clone()
            };
            faces.push(AnalyticFace::new(index, normalized, boundary));
        }

        let curves = builder.edges.iter().map(|e| *e.curve()).collect();
        let store = GeometryStore::new(
            builder
                .vertices
                .into_iter()
                .map(|v| Box::new(v) as Box<dyn GeometryVertex>)
                .collect(),
            builder
                .edges
                .into_iter()
                .map(|e| Box::new(e) as Box<dyn GeometryEdge>)
                .collect(),
            faces
                .iter()
                .map(|f| Box::new(f.clone()) as Box<dyn GeometryFace>)
                .collect(),
        )?;

        debug!(
            "Built analytic geometry '{}': {} vertices, {} edges, {} faces",
            description.name,
            store.vertices().len(),
            store.edges().len(),
            store.faces().len()
        );

        Ok(Self {
            store,
            description,
            curves,
            faces,
        })
    }

    pub fn from_file(path: impl AsRef<Path>) -> GeomResult<Self> {
        Self::from_description(GeometryDescription::from_file(path)?)
    }

    pub fn description(&self) -> &GeometryDescription {
        &self.description
    }

    pub fn name(&self) -> &str {
        &self.description.name
    }

    fn face(&self, surfind: usize) -> GeomResult<&AnalyticFace> {
        self.faces.get(surfind).ok_or(GeometryError::FaceNotFound {
            index: surfind,
            count: self.faces.len(),
        })
    }
}

impl NetgenGeometry for AnalyticGeometry {
    fn store(&self) -> &GeometryStore {
        &self.store
    }

    fn store_mut(&mut self) -> &mut GeometryStore {
        &mut self.store
    }

    fn geom_type(&self) -> GeomType {
        GeomType::Analytic
    }

    fn project_point(&self, surfind: usize, p: &mut Point3<f64>) {
        let Some(face) = self.faces.get(surfind) else {
            return;
        };
        let (u, v) = face.params_of(p);
        let (u, v) = face.patch().surface.clamp_params(u, v);
        *p = face.patch().surface.evaluate(u, v);
    }

    fn project_point_edge(
        &self,
        surfind: usize,
        surfind2: usize,
        p: &mut Point3<f64>,
        egi: Option<&mut EdgePointGeomInfo>,
    ) {
        match egi {
            Some(egi) if egi.edgenr < self.curves.len() => {
                let curve = &self.curves[egi.edgenr];
                let t = curve.closest_param(p);
                *p = curve.point(t);
                egi.dist = t;
                if let Some(face) = self.faces.get(surfind) {
                    (egi.u, egi.v) = face.params_of(p);
                }
            }
            _ => {
                for _ in 0..EDGE_PROJECTION_ROUNDS {
                    self.project_point(surfind, p);
                    self.project_point(surfind2, p);
                }
            }
        }
    }

    fn calc_point_geom_info(&self, surfind: usize, p: &Point3<f64>) -> Option<PointGeomInfo> {
        let face = self.faces.get(surfind)?;
        let (u, v) = face.params_of(p);
        Some(PointGeomInfo::new(surfind, u, v))
    }

    fn project_point_gi(
        &self,
        surfind: usize,
        p: &mut Point3<f64>,
        gi: &mut PointGeomInfo,
    ) -> GeomResult<()> {
        self.face(surfind)?.project_point_gi(p, gi)
    }

    fn normal(&self, surfind: usize, p: &Point3<f64>, gi: Option<&PointGeomInfo>) -> Vector3<f64> {
        let Some(face) = self.faces.get(surfind) else {
            return Vector3::z();
        };
        let (u, v) = match gi {
            Some(gi) => (gi.u, gi.v),
            None => face.params_of(p),
        };
        face.patch().surface.normal(u, v)
    }

    /// Midpoint in the face parametrization, evaluated on the surface
    fn point_between(
        &self,
        p1: &Point3<f64>,
        p2: &Point3<f64>,
        secpoint: f64,
        surfi: usize,
        gi1: &PointGeomInfo,
        gi2: &PointGeomInfo,
    ) -> (Point3<f64>, PointGeomInfo) {
        let Some(face) = self.faces.get(surfi) else {
            return (p1 + (p2 - p1) * secpoint, *gi1);
        };
        let gi = gi1.lerp(gi2, secpoint);
        (face.point(&gi), gi)
    }

    /// Point at the interpolated curve parameter, evaluated on the edge
    fn point_between_edge(
        &self,
        p1: &Point3<f64>,
        p2: &Point3<f64>,
        secpoint: f64,
        surfi1: usize,
        _surfi2: usize,
        ap1: &EdgePointGeomInfo,
        ap2: &EdgePointGeomInfo,
    ) -> (Point3<f64>, EdgePointGeomInfo) {
        let Some(curve) = self.curves.get(ap1.edgenr) else {
            return (p1 + (p2 - p1) * secpoint, *ap1);
        };
        let mut egi = *ap1;
        egi.dist = ap1.dist + secpoint * (ap2.dist - ap1.dist);
        let p = curve.point(egi.dist);
        if let Some(face) = self.faces.get(surfi1) {
            (egi.u, egi.v) = face.params_of(&p);
        }
        (p, egi)
    }

    fn tangent(
        &self,
        p: &Point3<f64>,
        surfi1: usize,
        surfi2: usize,
        egi: &EdgePointGeomInfo,
    ) -> GeomResult<Vector3<f64>> {
        if let Some(curve) = self.curves.get(egi.edgenr) {
            if let Some(t) = curve.derivative(egi.dist).try_normalize(f64::EPSILON) {
                return Ok(t);
            }
        }
        self.normal(surfi1, p, None)
            .cross(&self.normal(surfi2, p, None))
            .try_normalize(1e-12)
            .ok_or_else(|| {
                GeometryError::InvalidTopology(format!(
                    "faces {surfi1} and {surfi2} are tangent at {p:?}"
                ))
            })
    }

    fn save(&self, path: &Path) -> GeomResult<()> {
        let mut writer = BufWriter::new(File::create(path)?);
        serde_json::to_writer_pretty(&mut writer, &self.description)?;
        writer.flush()?;
        Ok(())
    }

    fn save_to_mesh_file(&self, out: &mut dyn Write) -> GeomResult<()> {
        writeln!(out, "{MESH_FILE_SECTION}")?;
        serde_json::to_writer(&mut *out, &self.description)?;
        writeln!(out)?;
        Ok(())
    }

    fn do_archive(&mut self, archive: &mut dyn Archive) -> GeomResult<()> {
        if archive.is_output() {
            let mut value = serde_json::to_value(&self.description)?;
            return archive.exchange(MESH_FILE_SECTION, &mut value);
        }

        let mut value = Value::Null;
        archive.exchange(MESH_FILE_SECTION, &mut value)?;
        let refinement = self.refinement().clone();
        *self = Self::from_description(serde_json::from_value(value)?)?;
        *self.refinement_mut() = refinement;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::JsonArchive;
    use approx::assert_relative_eq;

    #[test]
    fn test_cuboid_topology() {
        let geo = AnalyticGeometry::from_description(GeometryDescription::cuboid(Vector3::new(
            1.0, 1.0, 1.0,
        )))
        .unwrap();
        assert_eq!(geo.vertices().len(), 8);
        assert_eq!(geo.edges().len(), 12);
        assert_eq!(geo.faces().len(), 6);
        assert_eq!(geo.geom_type(), GeomType::Analytic);

        // every edge is used once forward and once reversed
        let mut uses = vec![(0, 0); geo.edges().len()];
        for face in geo.faces() {
            for edge in face.boundary(0) {
                let i = geo.edge_index(edge.as_ref()).unwrap();
                if edge.oriented_like_global() {
                    uses[i].0 += 1;
                } else {
                    uses[i].1 += 1;
                }
            }
        }
        assert!(uses.iter().all(|&u| u == (1, 1)), "{uses:?}");
    }

    #[test]
    fn test_tube_shares_seam_edges() {
        let geo = AnalyticGeometry::from_description(GeometryDescription::tube(1.0, 2.0)).unwrap();
        assert_eq!(geo.vertices().len(), 4);
        // two seams plus four half circles
        assert_eq!(geo.edges().len(), 6);
    }

    #[test]
    fn test_full_turn_patch_rejected() {
        let mut desc = GeometryDescription::tube(1.0, 2.0);
        desc.patches[0].u_range = [0.0, std::f64::consts::TAU];
        assert!(matches!(
            AnalyticGeometry::from_description(desc),
            Err(GeometryError::InvalidTopology(_))
        ));
    }

    #[test]
    fn test_point_between_stays_on_sphere() {
        let geo =
            AnalyticGeometry::from_description(GeometryDescription::sphere_band(2.0, -0.5, 0.5))
                .unwrap();
        let gi1 = PointGeomInfo::new(0, 0.1, -0.4);
        let gi2 = PointGeomInfo::new(0, 1.4, 0.4);
        let p1 = geo.faces()[0].point(&gi1);
        let p2 = geo.faces()[0].point(&gi2);

        let (p, gi) = geo.point_between(&p1, &p2, 0.5, 0, &gi1, &gi2);
        assert_relative_eq!(p.coords.norm(), 2.0, epsilon = 1e-12);
        assert_relative_eq!(gi.u, 0.75);
        assert_relative_eq!(geo.normal(0, &p, Some(&gi)), p.coords / 2.0, epsilon = 1e-12);
    }

    #[test]
    fn test_edge_midpoint_and_tangent() {
        let geo = AnalyticGeometry::from_description(GeometryDescription::tube(1.0, 2.0)).unwrap();
        let (edgenr, arc) = geo
            .edges()
            .iter()
            .enumerate()
            .find(|(_, e)| e.length() > 3.0)
            .unwrap();
        let a = EdgePointGeomInfo::new(edgenr, 0.0);
        let b = EdgePointGeomInfo::new(edgenr, 1.0);
        let (p, egi) = geo.point_between_edge(&arc.point(0.0), &arc.point(1.0), 0.5, 0, 1, &a, &b);

        assert_relative_eq!(egi.dist, 0.5);
        assert_relative_eq!(p, arc.point(0.5), epsilon = 1e-12);
        let t = geo.tangent(&p, 0, 1, &egi).unwrap();
        assert_relative_eq!(t.norm(), 1.0, epsilon = 1e-12);
        assert!(t.z.abs() < 1e-12);
    }

    #[test]
    fn test_unknown_face_index_is_an_error() {
        let geo = AnalyticGeometry::from_description(GeometryDescription::tube(1.0, 2.0)).unwrap();
        let start = Point3::new(1.0, 0.0, 1.0);

        let mut p = start;
        let mut gi = PointGeomInfo::new(7, 0.0, 1.0);
        let err = geo.project_point_gi(7, &mut p, &mut gi).unwrap_err();
        assert!(matches!(err, GeometryError::FaceNotFound { index: 7, count: 2 }));
        assert!(!err.is_recoverable());
        assert_eq!(p, start);
        assert!(geo.calc_point_geom_info(7, &p).is_none());

        // infallible queries fall back to the base behavior
        geo.project_point(7, &mut p);
        assert_eq!(p, start);
        assert_eq!(geo.normal(7, &p, None), Vector3::z());
        let end = Point3::new(-1.0, 0.0, 1.0);
        let (mid, mid_gi) = geo.point_between(&start, &end, 0.5, 7, &gi, &gi);
        assert_relative_eq!(mid, Point3::new(0.0, 0.0, 1.0));
        assert_eq!(mid_gi, gi);
    }

    #[test]
    fn test_archive_restores_geometry() {
        let geo = AnalyticGeometry::from_description(GeometryDescription::tube(1.0, 2.0)).unwrap();
        let mut out = JsonArchive::writer();
        let mut original = geo;
        original.do_archive(&mut out).unwrap();

        let mut restored =
            AnalyticGeometry::from_description(GeometryDescription::cuboid(Vector3::new(
                1.0, 1.0, 1.0,
            )))
            .unwrap();
        let mut input = JsonArchive::reader(out.into_json()).unwrap();
        restored.do_archive(&mut input).unwrap();

        assert_eq!(restored.description(), original.description());
        let hashes = |g: &AnalyticGeometry| g.edges().iter().map(|e| e.hash_key()).collect::<Vec<_>>();
        assert_eq!(hashes(&restored), hashes(&original));
    }
}
