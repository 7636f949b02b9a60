// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Polyframe Inc.

//! Surface mesh refinement with exact midpoint placement

use super::{Element2d, Mesh, MeshPoint, PointType, Segment};
use crate::error::GeomResult;
use crate::geometry::{NetgenGeometry, PointGeomInfo};
use ahash::{AHashMap, AHashSet};
use tracing::debug;

type EdgeKey = (usize, usize);

fn edge_key(a: usize, b: usize) -> EdgeKey {
    if a < b {
        (a, b)
    } else {
        (b, a)
    }
}

/// Refinement helper owned by a geometry.
///
/// New points are placed through the geometry's `point_between` and
/// `point_between_edge`, so refined meshes stay on the exact geometry
/// whenever the kernel overrides them.
#[derive(Debug, Clone, PartialEq)]
pub struct Refinement {
    /// Bisection passes per face in size-driven refinement
    pub max_passes: usize,
    /// Edges shorter than this are never split
    pub min_edge_length: f64,
}

impl Default for Refinement {
    fn default() -> Self {
        Self {
            max_passes: 16,
            min_edge_length: 1e-9,
        }
    }
}

impl Refinement {
    pub fn with_max_passes(mut self, max_passes: usize) -> Self {
        self.max_passes = max_passes;
        self
    }

    /// Bisect interior edges of one face until every interior edge is no
    /// longer than the size field at its midpoint. Boundary segments are
    /// left untouched so neighbouring faces stay conforming.
    ///
    /// Returns the number of edges split.
    pub fn refine_face<G: NetgenGeometry + ?Sized>(
        &self,
        geo: &G,
        mesh: &mut Mesh,
        face: usize,
    ) -> GeomResult<usize> {
        let boundary: AHashSet<EdgeKey> = mesh
            .segments
            .iter()
            .map(|s| edge_key(s.points[0], s.points[1]))
            .collect();

        let mut total = 0;
        for pass in 0..self.max_passes {
            // endpoints and their parametrization for every interior edge
            let mut interior: AHashMap<EdgeKey, (PointGeomInfo, PointGeomInfo)> = AHashMap::new();
            let mut marked: AHashSet<EdgeKey> = AHashSet::new();

            for el in mesh.elements_of_face(face) {
                for k in 0..3 {
                    let (a, b) = (el.points[k], el.points[(k + 1) % 3]);
                    let key = edge_key(a, b);
                    if boundary.contains(&key) {
                        continue;
                    }
                    let (gia, gib) = (el.geominfo[k], el.geominfo[(k + 1) % 3]);
                    interior
                        .entry(key)
                        .or_insert(if a < b { (gia, gib) } else { (gib, gia) });

                    let (pa, pb) = (mesh.point(a), mesh.point(b));
                    let len = (pb - pa).norm();
                    if len > self.min_edge_length && len > mesh.get_h(&nalgebra::center(pa, pb)) {
                        marked.insert(key);
                    }
                }
            }
            if marked.is_empty() {
                break;
            }

            // close the marking: an element with any marked edge also splits
            // its longest interior edge
            loop {
                let mut added = false;
                for el in mesh.elements_of_face(face) {
                    let keys = element_keys(el);
                    if !keys.iter().any(|k| marked.contains(k)) {
                        continue;
                    }
                    if let Some(longest) = keys
                        .iter()
                        .filter(|k| !boundary.contains(*k))
                        .max_by(|x, y| key_length(mesh, x).total_cmp(&key_length(mesh, y)))
                    {
                        added |= marked.insert(*longest);
                    }
                }
                if !added {
                    break;
                }
            }

            let mut midpoints: AHashMap<EdgeKey, (usize, PointGeomInfo)> = AHashMap::new();
            let mut keys: Vec<EdgeKey> = marked.iter().copied().collect();
            keys.sort_unstable();
            for key in keys {
                let (gia, gib) = interior[&key];
                let (p, gi) = geo.point_between(
                    mesh.point(key.0),
                    mesh.point(key.1),
                    0.5,
                    face,
                    &gia,
                    &gib,
                );
                let id = mesh.add_point(MeshPoint::new(p, PointType::Surface));
                midpoints.insert(key, (id, gi));
            }

            let old = std::mem::take(&mut mesh.surface_elements);
            let mut refined = Vec::with_capacity(old.len() * 2);
            for el in old {
                if el.face == face {
                    bisect_marked(el, &midpoints, mesh, &mut refined);
                } else {
                    refined.push(el);
                }
            }
            mesh.surface_elements = refined;

            debug!("Face {} pass {}: split {} edges", face, pass, midpoints.len());
            total += midpoints.len();
        }
        Ok(total)
    }

    /// Split every surface element into four and every segment into two.
    pub fn refine_uniform<G: NetgenGeometry + ?Sized>(&self, geo: &G, mesh: &mut Mesh) -> GeomResult<()> {
        let mut faces_of_edge: AHashMap<EdgeKey, Vec<usize>> = AHashMap::new();
        for el in &mesh.surface_elements {
            for key in element_keys(el) {
                faces_of_edge.entry(key).or_default().push(el.face);
            }
        }

        // segments first: their midpoints carry edge parametrization
        let mut segment_mid: AHashMap<EdgeKey, (usize, f64, usize)> = AHashMap::new();
        let old_segments = std::mem::take(&mut mesh.segments);
        for seg in old_segments {
            let key = edge_key(seg.points[0], seg.points[1]);
            let adjacent = faces_of_edge.get(&key).cloned().unwrap_or_default();
            let surf1 = adjacent.first().copied().unwrap_or(0);
            let surf2 = adjacent.get(1).copied().unwrap_or(surf1);

            let (p, egi) = geo.point_between_edge(
                mesh.point(seg.points[0]),
                mesh.point(seg.points[1]),
                0.5,
                surf1,
                surf2,
                &seg.epgeominfo[0],
                &seg.epgeominfo[1],
            );
            let m = mesh.add_point(MeshPoint::new(p, PointType::Edge));
            segment_mid.insert(key, (m, egi.dist, seg.edgenr));

            mesh.segments.push(Segment {
                points: [seg.points[0], m],
                edgenr: seg.edgenr,
                epgeominfo: [seg.epgeominfo[0], egi],
            });
            mesh.segments.push(Segment {
                points: [m, seg.points[1]],
                edgenr: seg.edgenr,
                epgeominfo: [egi, seg.epgeominfo[1]],
            });
        }

        let mut interior_mid: AHashMap<EdgeKey, (usize, PointGeomInfo)> = AHashMap::new();
        let old = std::mem::take(&mut mesh.surface_elements);
        let mut refined = Vec::with_capacity(old.len() * 4);
        for el in old {
            let mut mids = [(0usize, PointGeomInfo::default()); 3];
            for k in 0..3 {
                let (a, b) = (el.points[k], el.points[(k + 1) % 3]);
                let key = edge_key(a, b);
                mids[k] = if let Some(&(m, dist, edgenr)) = segment_mid.get(&key) {
                    let mut egi = crate::geometry::EdgePointGeomInfo::new(edgenr, dist);
                    geo.faces()[el.face].calc_edge_point_gi(geo.edges()[edgenr].as_ref(), dist, &mut egi);
                    (m, egi.to_point_geom_info(el.face))
                } else if let Some(&(m, gi)) = interior_mid.get(&key) {
                    (m, gi)
                } else {
                    let (p, gi) = geo.point_between(
                        mesh.point(a),
                        mesh.point(b),
                        0.5,
                        el.face,
                        &el.geominfo[k],
                        &el.geominfo[(k + 1) % 3],
                    );
                    let m = mesh.add_point(MeshPoint::new(p, PointType::Surface));
                    interior_mid.insert(key, (m, gi));
                    (m, gi)
                };
            }

            let [p0, p1, p2] = el.points;
            let [g0, g1, g2] = el.geominfo;
            let [(m01, h01), (m12, h12), (m20, h20)] = mids;
            refined.push(Element2d::new([p0, m01, m20], el.face, [g0, h01, h20]));
            refined.push(Element2d::new([m01, p1, m12], el.face, [h01, g1, h12]));
            refined.push(Element2d::new([m20, m12, p2], el.face, [h20, h12, g2]));
            refined.push(Element2d::new([m01, m12, m20], el.face, [h01, h12, h20]));
        }
        mesh.surface_elements = refined;

        debug!(
            "Uniform refinement: {} points, {} elements",
            mesh.point_count(),
            mesh.surface_element_count()
        );
        Ok(())
    }
}

fn element_keys(el: &Element2d) -> [EdgeKey; 3] {
    [
        edge_key(el.points[0], el.points[1]),
        edge_key(el.points[1], el.points[2]),
        edge_key(el.points[2], el.points[0]),
    ]
}

fn key_length(mesh: &Mesh, key: &EdgeKey) -> f64 {
    (mesh.point(key.1) - mesh.point(key.0)).norm()
}

/// Recursively bisect `el` at its marked edges, longest first.
fn bisect_marked(
    el: Element2d,
    midpoints: &AHashMap<EdgeKey, (usize, PointGeomInfo)>,
    mesh: &Mesh,
    out: &mut Vec<Element2d>,
) {
    let split = (0..3)
        .filter(|&k| midpoints.contains_key(&edge_key(el.points[k], el.points[(k + 1) % 3])))
        .max_by(|&x, &y| {
            let lx = key_length(mesh, &edge_key(el.points[x], el.points[(x + 1) % 3]));
            let ly = key_length(mesh, &edge_key(el.points[y], el.points[(y + 1) % 3]));
            lx.total_cmp(&ly)
        });

    let Some(k) = split else {
        out.push(el);
        return;
    };

    let (i, j, o) = (k, (k + 1) % 3, (k + 2) % 3);
    let (m, gm) = midpoints[&edge_key(el.points[i], el.points[j])];
    let first = Element2d::new(
        [el.points[i], m, el.points[o]],
        el.face,
        [el.geominfo[i], gm, el.geominfo[o]],
    );
    let second = Element2d::new(
        [m, el.points[j], el.points[o]],
        el.face,
        [gm, el.geominfo[j], el.geominfo[o]],
    );
    bisect_marked(first, midpoints, mesh, out);
    bisect_marked(second, midpoints, mesh, out);
}
