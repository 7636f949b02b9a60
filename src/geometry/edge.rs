// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Polyframe Inc.

//! Geometric edges

use nalgebra::Point3;

/// A 1-dimensional curve bounded by two vertices.
///
/// Vertices are referenced by index into the owning geometry's vertex
/// array; edges never own them.
pub trait GeometryEdge: Send + Sync {
    fn start_vertex(&self) -> usize;
    fn end_vertex(&self) -> usize;

    fn length(&self) -> f64;

    /// Parameter domain of [`point`](Self::point)
    fn param_range(&self) -> (f64, f64) {
        (0.0, 1.0)
    }

    fn point(&self, t: f64) -> Point3<f64>;

    /// Next parameter after `t` such that the chord from `point(t)` deviates
    /// from the curve by at most `sag`. Clamped to the end of the range.
    fn calc_step(&self, t: f64, sag: f64) -> f64;

    /// Whether this edge's parametrization runs along the global direction.
    fn oriented_like_global(&self) -> bool;

    fn hash_key(&self) -> u64;

    /// `npoints` points along the edge.
    ///
    /// The default spaces interior points uniformly in parameter, not in
    /// arclength; kernels with a better parametrization override it.
    fn equidistant_points(&self, npoints: usize) -> Vec<Point3<f64>> {
        let (t0, t1) = self.param_range();
        match npoints {
            0 => Vec::new(),
            1 => vec![self.point(t0)],
            _ => {
                let mut pts = Vec::with_capacity(npoints);
                pts.push(self.point(t0));
                for i in 1..npoints - 1 {
                    let s = i as f64 / (npoints - 1) as f64;
                    pts.push(self.point(t0 + s * (t1 - t0)));
                }
                pts.push(self.point(t1));
                pts
            }
        }
    }

    fn type_name(&self) -> &'static str {
        std::any::type_name::<Self>()
    }
}

/// Maximum distance between the chord `point(t0)..point(t1)` and the curve,
/// sampled at `samples` interior parameters.
pub fn chord_deviation(edge: &dyn GeometryEdge, t0: f64, t1: f64, samples: usize) -> f64 {
    let a = edge.point(t0);
    let b = edge.point(t1);
    let chord = b - a;
    let len2 = chord.norm_squared();

    (1..=samples)
        .map(|i| {
            let t = t0 + (t1 - t0) * i as f64 / (samples + 1) as f64;
            let p = edge.point(t);
            if len2 < f64::EPSILON {
                return (p - a).norm();
            }
            let s = ((p - a).dot(&chord) / len2).clamp(0.0, 1.0);
            (p - (a + chord * s)).norm()
        })
        .fold(0.0, f64::max)
}
