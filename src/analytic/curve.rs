// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Polyframe Inc.

//! Closed-form curves parametrized over `[0, 1]`

use nalgebra::{Point3, Vector3};
use serde::{Deserialize, Serialize};
use std::f64::consts::TAU;

/// Smallest arc step, in radians
const MIN_ARC_STEP: f64 = 1e-6;

/// Curve with a parametrization proportional to arclength.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Curve {
    Line {
        start: Point3<f64>,
        end: Point3<f64>,
    },
    /// `center + radius * (cos θ x_dir + sin θ y_dir)` for θ from
    /// `start_angle` to `end_angle`
    Arc {
        center: Point3<f64>,
        x_dir: Vector3<f64>,
        y_dir: Vector3<f64>,
        radius: f64,
        start_angle: f64,
        end_angle: f64,
    },
}

impl Curve {
    pub fn point(&self, t: f64) -> Point3<f64> {
        match *self {
            Curve::Line { start, end } => start + (end - start) * t,
            Curve::Arc {
                center,
                x_dir,
                y_dir,
                radius,
                start_angle,
                end_angle,
            } => {
                let theta = start_angle + (end_angle - start_angle) * t;
                center + (x_dir * theta.cos() + y_dir * theta.sin()) * radius
            }
        }
    }

    /// Derivative with respect to `t`
    pub fn derivative(&self, t: f64) -> Vector3<f64> {
        match *self {
            Curve::Line { start, end } => end - start,
            Curve::Arc {
                x_dir,
                y_dir,
                radius,
                start_angle,
                end_angle,
                ..
            } => {
                let sweep = end_angle - start_angle;
                let theta = start_angle + sweep * t;
                (y_dir * theta.cos() - x_dir * theta.sin()) * (radius * sweep)
            }
        }
    }

    pub fn length(&self) -> f64 {
        match *self {
            Curve::Line { start, end } => (end - start).norm(),
            Curve::Arc {
                radius,
                start_angle,
                end_angle,
                ..
            } => radius * (end_angle - start_angle).abs(),
        }
    }

    pub fn curvature(&self) -> f64 {
        match *self {
            Curve::Line { .. } => 0.0,
            Curve::Arc { radius, .. } => 1.0 / radius,
        }
    }

    /// Parameter increment whose chord deviates from the curve by at most
    /// `sag`. Lines are spanned in a single step.
    pub fn step_size(&self, sag: f64) -> f64 {
        match *self {
            Curve::Line { .. } => 1.0,
            Curve::Arc {
                radius,
                start_angle,
                end_angle,
                ..
            } => {
                let sweep = (end_angle - start_angle).abs();
                if sweep <= 0.0 {
                    return 1.0;
                }
                // sagitta of a chord spanning dθ is r (1 - cos(dθ / 2))
                let dtheta = 2.0 * (1.0 - sag.min(radius) / radius).acos();
                (dtheta.max(MIN_ARC_STEP) / sweep).min(1.0)
            }
        }
    }

    /// Parameter in `[0, 1]` of the curve point nearest to `p`
    pub fn closest_param(&self, p: &Point3<f64>) -> f64 {
        match *self {
            Curve::Line { start, end } => {
                let d = end - start;
                let len2 = d.norm_squared();
                if len2 < f64::EPSILON {
                    return 0.0;
                }
                ((p - start).dot(&d) / len2).clamp(0.0, 1.0)
            }
            Curve::Arc {
                center,
                x_dir,
                y_dir,
                start_angle,
                end_angle,
                ..
            } => {
                let sweep = end_angle - start_angle;
                if sweep.abs() < f64::EPSILON {
                    return 0.0;
                }
                let d = p - center;
                let theta = d.dot(&y_dir).atan2(d.dot(&x_dir));
                let mid = 0.5 * (start_angle + end_angle);
                let theta = theta + TAU * ((mid - theta) / TAU).round();
                ((theta - start_angle) / sweep).clamp(0.0, 1.0)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use std::f64::consts::FRAC_PI_2;

    fn quarter_circle() -> Curve {
        Curve::Arc {
            center: Point3::origin(),
            x_dir: Vector3::x(),
            y_dir: Vector3::y(),
            radius: 2.0,
            start_angle: 0.0,
            end_angle: FRAC_PI_2,
        }
    }

    #[test]
    fn test_arc_geometry() {
        let arc = quarter_circle();
        assert_relative_eq!(arc.point(1.0), Point3::new(0.0, 2.0, 0.0), epsilon = 1e-12);
        assert_relative_eq!(arc.length(), std::f64::consts::PI);
        // tangent at the start points along +y with |d/dt| = length
        assert_relative_eq!(arc.derivative(0.0), Vector3::new(0.0, arc.length(), 0.0), epsilon = 1e-12);
    }

    #[test]
    fn test_arc_step_meets_sag() {
        let arc = quarter_circle();
        let sag = 0.01;
        let dt = arc.step_size(sag);
        let chord_mid = nalgebra::center(&arc.point(0.0), &arc.point(dt));
        let deviation = (arc.point(0.5 * dt) - chord_mid).norm();
        assert_relative_eq!(deviation, sag, epsilon = 1e-9);
        // a tolerance larger than the radius still advances
        assert!(arc.step_size(10.0) > 0.0);
        assert_eq!(
            Curve::Line {
                start: Point3::origin(),
                end: Point3::new(1.0, 0.0, 0.0)
            }
            .step_size(sag),
            1.0
        );
    }

    #[test]
    fn test_closest_param() {
        let arc = quarter_circle();
        assert_relative_eq!(arc.closest_param(&Point3::new(3.0, 3.0, 1.0)), 0.5, epsilon = 1e-12);
        assert_eq!(arc.closest_param(&Point3::new(1.0, -5.0, 0.0)), 0.0);

        let line = Curve::Line {
            start: Point3::origin(),
            end: Point3::new(4.0, 0.0, 0.0),
        };
        assert_relative_eq!(line.closest_param(&Point3::new(1.0, 7.0, 0.0)), 0.25);
    }
}
