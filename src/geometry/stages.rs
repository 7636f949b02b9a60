// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Polyframe Inc.

//! Default implementations of the meshing pipeline stages

use super::{GeometryEdge, GeometryFace, NetgenGeometry, PointGeomInfo, RestrictStats};
use crate::error::GeomResult;
use crate::geometry::EdgePointGeomInfo;
use crate::mesh::{Element2d, LocalH, Mesh, MeshPoint, MeshingParameters, PointType, Segment};
use ahash::AHashMap;
use nalgebra::Point3;
use rayon::prelude::*;
use tracing::{debug, info, warn};

/// Samples used to integrate the size field along an edge
const DIVIDE_EDGE_SAMPLES: usize = 1000;

/// Upper bound on `calc_step` iterations per edge
const MAX_EDGE_STEPS: usize = 100_000;

/// Populate the mesh-size field from edge sag, `segments_per_edge` and
/// per-face curvature restriction.
pub fn analyse<G: NetgenGeometry + ?Sized>(
    geo: &G,
    mesh: &mut Mesh,
    mparam: &MeshingParameters,
) -> GeomResult<()> {
    let mut bbox = *geo.bounding_box();
    bbox.increase(1e-6 * bbox.diameter().max(1.0));

    let mut local_h = LocalH::new(bbox, mparam.max_h, mparam.grading);
    for edge in geo.edges() {
        restrict_edge_h(edge.as_ref(), &mut local_h, mparam);
    }
    mesh.set_local_h(local_h);

    let mut stats = RestrictStats::default();
    if mparam.parallel && geo.faces().len() > 1 {
        let template = mesh.local_h().empty_like();
        let restricted: Vec<(LocalH, RestrictStats)> = geo
            .faces()
            .par_iter()
            .map(|face| {
                let mut scratch = Mesh::with_local_h(template.clone());
                let face_stats = face.restrict_h(&mut scratch, mparam);
                (scratch.into_local_h(), face_stats)
            })
            .collect();

        for (face_h, face_stats) in &restricted {
            mesh.local_h_mut().merge(face_h);
            stats.absorb(face_stats);
        }
    } else {
        for face in geo.faces() {
            stats.absorb(&face.restrict_h(mesh, mparam));
        }
    }

    info!(
        "Analysed {} faces, {} edges: {} size restrictions, {} leaves, depth {}",
        geo.faces().len(),
        geo.edges().len(),
        mesh.local_h().len(),
        stats.leaves,
        stats.deepest
    );
    Ok(())
}

/// Restrict the size field along one edge from its sag steps and the
/// requested number of segments per edge.
fn restrict_edge_h(edge: &dyn GeometryEdge, local_h: &mut LocalH, mparam: &MeshingParameters) {
    let length = edge.length();
    if length > 0.0 {
        let h_edge = mparam.clamp_h(length / mparam.segments_per_edge);
        let samples = mparam.segments_per_edge.ceil() as usize + 1;
        for p in edge.equidistant_points(samples) {
            local_h.restrict(&p, h_edge);
        }
    }

    let (t0, t1) = edge.param_range();
    let mut t = t0;
    let mut p = edge.point(t);
    let mut steps = 0;
    while t < t1 && steps < MAX_EDGE_STEPS {
        let next = edge.calc_step(t, mparam.sag);
        if !(next > t) {
            warn!("Edge {:#x} stalled at parameter {}", edge.hash_key(), t);
            break;
        }
        let pn = edge.point(next);
        if next < t1 {
            let h = mparam.clamp_h((pn - p).norm());
            local_h.restrict(&p, h);
            local_h.restrict(&pn, h);
        }
        t = next;
        p = pn;
        steps += 1;
    }
}

/// Create one fixed point per geometry vertex and divide every edge into
/// segments following the size field.
pub fn find_edges<G: NetgenGeometry + ?Sized>(
    geo: &G,
    mesh: &mut Mesh,
    mparam: &MeshingParameters,
) -> GeomResult<()> {
    let vertex_points: Vec<usize> = geo
        .vertices()
        .iter()
        .map(|v| mesh.add_point(MeshPoint::new(v.point(), PointType::Fixed)))
        .collect();

    for (edgenr, edge) in geo.edges().iter().enumerate() {
        let min_segments = if edge.start_vertex() == edge.end_vertex() { 3 } else { 1 };
        let params = divide_edge(edge.as_ref(), mesh, mparam, min_segments);

        let mut ids = Vec::with_capacity(params.len());
        ids.push(vertex_points[edge.start_vertex()]);
        for &t in &params[1..params.len() - 1] {
            ids.push(mesh.add_point(MeshPoint::new(edge.point(t), PointType::Edge)));
        }
        ids.push(vertex_points[edge.end_vertex()]);

        for k in 0..params.len() - 1 {
            mesh.add_segment(Segment {
                points: [ids[k], ids[k + 1]],
                edgenr,
                epgeominfo: [
                    EdgePointGeomInfo::new(edgenr, params[k]),
                    EdgePointGeomInfo::new(edgenr, params[k + 1]),
                ],
            });
        }
        debug!("Edge {} divided into {} segments", edgenr, params.len() - 1);
    }

    info!(
        "Found {} edge segments on {} edges",
        mesh.segment_count(),
        geo.edges().len()
    );
    Ok(())
}

/// Curve parameters dividing `edge` into pieces of equal h-measure
/// (`integral of ds / h`), with at least `min_segments` pieces.
pub fn divide_edge(
    edge: &dyn GeometryEdge,
    mesh: &Mesh,
    mparam: &MeshingParameters,
    min_segments: usize,
) -> Vec<f64> {
    let (t0, t1) = edge.param_range();
    let ns = DIVIDE_EDGE_SAMPLES;

    let mut hvalue = vec![0.0; ns + 1];
    let mut prev = edge.point(t0);
    for i in 1..=ns {
        let t = t0 + (t1 - t0) * i as f64 / ns as f64;
        let p = edge.point(t);
        let h = mesh.get_h(&nalgebra::center(&prev, &p)).max(mparam.min_h).max(f64::MIN_POSITIVE);
        hvalue[i] = hvalue[i - 1] + (p - prev).norm() / h;
        prev = p;
    }

    let total = hvalue[ns];
    let nsub = ((total + 0.5).floor() as usize).max(min_segments).max(1);

    let mut params = Vec::with_capacity(nsub + 1);
    params.push(t0);
    let mut j = 0;
    for i in 1..nsub {
        if total <= 0.0 {
            params.push(t0 + (t1 - t0) * i as f64 / nsub as f64);
            continue;
        }
        let target = total * i as f64 / nsub as f64;
        while j < ns - 1 && hvalue[j + 1] < target {
            j += 1;
        }
        let span = hvalue[j + 1] - hvalue[j];
        let frac = if span > 0.0 { (target - hvalue[j]) / span } else { 0.0 };
        let s = (j as f64 + frac) / ns as f64;
        params.push(t0 + (t1 - t0) * s);
    }
    params.push(t1);
    params
}

/// Boundary ring of a face: mesh points in loop order with the face's
/// parametrization at each.
fn boundary_ring<G: NetgenGeometry + ?Sized>(
    geo: &G,
    mesh: &Mesh,
    faceindex: usize,
    loop_index: usize,
) -> GeomResult<Vec<(usize, PointGeomInfo)>> {
    let face = &geo.faces()[faceindex];
    let mut ring = Vec::new();

    for edge in face.boundary(loop_index) {
        let edgenr = geo.edge_index(edge.as_ref())?;
        let global = geo.edges()[edgenr].as_ref();
        let forward = edge.oriented_like_global();

        let mut segs = mesh.segments_of_edge(edgenr);
        if !forward {
            segs.reverse();
        }
        for seg in segs {
            let k = if forward { 0 } else { 1 };
            let mut egi = seg.epgeominfo[k];
            face.calc_edge_point_gi(global, egi.dist, &mut egi);
            ring.push((seg.points[k], egi.to_point_geom_info(faceindex)));
        }
    }
    Ok(ring)
}

/// Fan-triangulate every single-loop face around a projected centre point,
/// then bisect interior edges down to the size field.
pub fn mesh_surface<G: NetgenGeometry + ?Sized>(
    geo: &G,
    mesh: &mut Mesh,
    _mparam: &MeshingParameters,
) -> GeomResult<()> {
    let mut meshed = 0;
    for (faceindex, face) in geo.faces().iter().enumerate() {
        if face.n_boundaries() != 1 {
            warn!(
                "Face {} ({}) has {} boundary loops; the default mesher handles one",
                faceindex,
                face.name(),
                face.n_boundaries()
            );
            continue;
        }

        let ring = boundary_ring(geo, mesh, faceindex, 0)?;
        if ring.len() < 3 {
            warn!("Face {} has a degenerate boundary of {} points", faceindex, ring.len());
            continue;
        }

        let n = ring.len() as f64;
        let centroid = ring
            .iter()
            .fold(Point3::origin(), |acc, (pi, _)| acc + mesh.point(*pi).coords / n);
        let seed = PointGeomInfo::new(
            faceindex,
            ring.iter().map(|(_, gi)| gi.u).sum::<f64>() / n,
            ring.iter().map(|(_, gi)| gi.v).sum::<f64>() / n,
        );

        let mut center = centroid;
        let mut center_gi = seed;
        match face.project_point_gi(&mut center, &mut center_gi) {
            Ok(()) => {}
            Err(e) if e.is_recoverable() => {
                debug!("Centre of face {} not projected ({}); using seed", faceindex, e);
                center_gi = seed;
                center = face.point(&seed);
            }
            Err(e) => return Err(e),
        }
        let c = mesh.add_point(MeshPoint::new(center, PointType::Surface));

        let normal = geo.normal(faceindex, &center, Some(&center_gi));
        let first = mesh.surface_element_count();
        for k in 0..ring.len() {
            let (a, gia) = ring[k];
            let (b, gib) = ring[(k + 1) % ring.len()];
            mesh.add_surface_element(Element2d::new([a, b, c], faceindex, [gia, gib, center_gi]));
        }

        let orientation: f64 = mesh.surface_elements[first..]
            .iter()
            .map(|el| mesh.element_normal(el).dot(&normal))
            .sum();
        if orientation < 0.0 {
            for el in &mut mesh.surface_elements[first..] {
                el.points.swap(0, 1);
                el.geominfo.swap(0, 1);
            }
        }

        let splits = geo.refinement().refine_face(geo, mesh, faceindex)?;
        debug!("Face {} meshed with {} bisections", faceindex, splits);
        meshed += 1;
    }

    info!(
        "Meshed {} of {} faces: {} surface elements",
        meshed,
        geo.faces().len(),
        mesh.surface_element_count()
    );
    Ok(())
}

/// Laplacian smoothing of interior surface points, re-projected onto the
/// geometry after every move.
pub fn optimize_surface<G: NetgenGeometry + ?Sized>(
    geo: &G,
    mesh: &mut Mesh,
    mparam: &MeshingParameters,
) -> GeomResult<()> {
    let mut moved = 0usize;
    let mut rejected = 0usize;

    for (faceindex, face) in geo.faces().iter().enumerate() {
        let mut elements_of_point: AHashMap<usize, Vec<usize>> = AHashMap::new();
        for (ei, el) in mesh.surface_elements.iter().enumerate() {
            if el.face != faceindex {
                continue;
            }
            for &p in &el.points {
                if mesh.points[p].point_type == PointType::Surface {
                    elements_of_point.entry(p).or_default().push(ei);
                }
            }
        }

        let mut interior: Vec<usize> = elements_of_point.keys().copied().collect();
        interior.sort_unstable();

        for _ in 0..mparam.optsteps_2d {
            for &pi in &interior {
                let elems = &elements_of_point[&pi];

                let mut neighbours: Vec<usize> = elems
                    .iter()
                    .flat_map(|&ei| mesh.surface_elements[ei].points)
                    .filter(|&q| q != pi)
                    .collect();
                neighbours.sort_unstable();
                neighbours.dedup();
                if neighbours.is_empty() {
                    continue;
                }

                let n = neighbours.len() as f64;
                let mut p = neighbours
                    .iter()
                    .fold(Point3::origin(), |acc, &q| acc + mesh.point(q).coords / n);

                let first = &mesh.surface_elements[elems[0]];
                let mut gi = first.geominfo[first.corner_of(pi).unwrap_or(0)];

                match face.project_point_gi(&mut p, &mut gi) {
                    Ok(()) => {}
                    Err(e) if e.is_recoverable() => {
                        debug!("Smoothing point {} on face {} skipped: {}", pi, faceindex, e);
                        rejected += 1;
                        continue;
                    }
                    Err(e) => return Err(e),
                }

                if flips_element(mesh, elems, pi, &p) {
                    rejected += 1;
                    continue;
                }

                mesh.points[pi].position = p;
                for &ei in elems {
                    let el = &mut mesh.surface_elements[ei];
                    if let Some(k) = el.corner_of(pi) {
                        el.geominfo[k] = gi;
                    }
                }
                moved += 1;
            }
        }
    }

    info!("Surface smoothing: {} moves, {} rejected", moved, rejected);
    Ok(())
}

/// Whether moving `point` to `candidate` would invert any of `elements`.
fn flips_element(mesh: &Mesh, elements: &[usize], point: usize, candidate: &Point3<f64>) -> bool {
    elements.iter().any(|&ei| {
        let el = &mesh.surface_elements[ei];
        let before = mesh.element_normal(el);
        let [a, b, c] = el
            .points
            .map(|q| if q == point { *candidate } else { *mesh.point(q) });
        let after = (b - a).cross(&(c - a));
        after.dot(&before) <= 0.0
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::BoundingBox;

    struct Segment1d {
        length: f64,
    }

    impl GeometryEdge for Segment1d {
        fn start_vertex(&self) -> usize {
            0
        }
        fn end_vertex(&self) -> usize {
            1
        }
        fn length(&self) -> f64 {
            self.length
        }
        fn point(&self, t: f64) -> Point3<f64> {
            Point3::new(t * self.length, 0.0, 0.0)
        }
        fn calc_step(&self, _t: f64, _sag: f64) -> f64 {
            1.0
        }
        fn oriented_like_global(&self) -> bool {
            true
        }
        fn hash_key(&self) -> u64 {
            1
        }
    }

    fn field(max_h: f64) -> Mesh {
        let bbox = BoundingBox::new(Point3::new(-1.0, -1.0, -1.0), Point3::new(11.0, 1.0, 1.0));
        Mesh::with_local_h(LocalH::new(bbox, max_h, 0.3))
    }

    #[test]
    fn test_divide_edge_uniform_field() {
        let edge = Segment1d { length: 10.0 };
        let params = divide_edge(&edge, &field(1.0), &MeshingParameters::default(), 1);

        assert_eq!(params.len(), 11);
        assert_eq!(params[0], 0.0);
        assert_eq!(params[10], 1.0);
        for (i, t) in params.iter().enumerate() {
            assert!((t - i as f64 / 10.0).abs() < 1e-9);
        }
    }

    #[test]
    fn test_divide_edge_respects_min_segments() {
        let edge = Segment1d { length: 0.1 };
        let params = divide_edge(&edge, &field(1.0), &MeshingParameters::default(), 3);
        assert_eq!(params.len(), 4);
        assert!(params.windows(2).all(|w| w[1] > w[0]));
    }

    #[test]
    fn test_divide_edge_refines_near_restriction() {
        let edge = Segment1d { length: 10.0 };
        let mut mesh = field(1.0);
        mesh.restrict_local_h(&Point3::origin(), 0.1);

        let params = divide_edge(&edge, &mesh, &MeshingParameters::default(), 1);
        assert!(params.len() > 11);
        // first segment is much shorter than the last
        let first = params[1] - params[0];
        let last = params[params.len() - 1] - params[params.len() - 2];
        assert!(first < 0.5 * last);
    }
}
