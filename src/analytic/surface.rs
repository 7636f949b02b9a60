// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Polyframe Inc.

//! Closed-form parametric surfaces

use super::curve::Curve;
use crate::error::{GeomResult, GeometryError};
use nalgebra::{Point3, Vector3};
use serde::{Deserialize, Serialize};
use std::f64::consts::{FRAC_PI_2, PI, TAU};

/// Keeps sphere parameters off the poles, where the parametrization degenerates
const POLE_MARGIN: f64 = 1e-9;

/// Parametric surface `S(u, v)`.
///
/// Cylinder and sphere are periodic in `u` with period `2π`. Sphere `v` is
/// latitude in `(-π/2, π/2)`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Surface {
    /// `origin + u * u_dir + v * v_dir`
    Plane {
        origin: Point3<f64>,
        u_dir: Vector3<f64>,
        v_dir: Vector3<f64>,
    },
    /// `origin + radius * (cos u * ref_dir + sin u * (axis x ref_dir)) + v * axis`
    Cylinder {
        origin: Point3<f64>,
        axis: Vector3<f64>,
        ref_dir: Vector3<f64>,
        radius: f64,
    },
    /// `center + radius * (cos v cos u, cos v sin u, sin v)`
    Sphere { center: Point3<f64>, radius: f64 },
}

impl Surface {
    /// Orthonormalize direction vectors and check the definition.
    pub fn normalized(&self) -> GeomResult<Surface> {
        match *self {
            Surface::Plane {
                origin,
                u_dir,
                v_dir,
            } => {
                let (u_dir, v_dir) = orthonormal_pair(&u_dir, &v_dir, "plane")?;
                Ok(Surface::Plane {
                    origin,
                    u_dir,
                    v_dir,
                })
            }
            Surface::Cylinder {
                origin,
                axis,
                ref_dir,
                radius,
            } => {
                if !(radius > 0.0) {
                    return Err(invalid(format!("cylinder radius {radius} must be positive")));
                }
                let (axis, ref_dir) = orthonormal_pair(&axis, &ref_dir, "cylinder")?;
                Ok(Surface::Cylinder {
                    origin,
                    axis,
                    ref_dir,
                    radius,
                })
            }
            Surface::Sphere { center, radius } => {
                if !(radius > 0.0) {
                    return Err(invalid(format!("sphere radius {radius} must be positive")));
                }
                Ok(Surface::Sphere { center, radius })
            }
        }
    }

    pub fn is_periodic_u(&self) -> bool {
        !matches!(self, Surface::Plane { .. })
    }

    /// Check that a parameter rectangle is usable on this surface
    pub fn validate_range(&self, u_range: [f64; 2], v_range: [f64; 2]) -> GeomResult<()> {
        if !(u_range[1] > u_range[0]) || !(v_range[1] > v_range[0]) {
            return Err(invalid(format!(
                "empty parameter range u {u_range:?} v {v_range:?}"
            )));
        }
        if self.is_periodic_u() && u_range[1] - u_range[0] >= TAU - 1e-9 {
            return Err(invalid(
                "periodic patches must span less than a full turn; split them".to_string(),
            ));
        }
        if let Surface::Sphere { .. } = self {
            if v_range[0] <= -FRAC_PI_2 || v_range[1] >= FRAC_PI_2 {
                return Err(invalid(format!(
                    "sphere latitude range {v_range:?} touches a pole"
                )));
            }
        }
        Ok(())
    }

    pub fn evaluate(&self, u: f64, v: f64) -> Point3<f64> {
        match *self {
            Surface::Plane {
                origin,
                u_dir,
                v_dir,
            } => origin + u_dir * u + v_dir * v,
            Surface::Cylinder {
                origin,
                axis,
                ref_dir,
                radius,
            } => {
                let y_dir = axis.cross(&ref_dir);
                origin + (ref_dir * u.cos() + y_dir * u.sin()) * radius + axis * v
            }
            Surface::Sphere { center, radius } => {
                center + Vector3::new(v.cos() * u.cos(), v.cos() * u.sin(), v.sin()) * radius
            }
        }
    }

    /// First derivatives `(dS/du, dS/dv)`
    pub fn derivatives(&self, u: f64, v: f64) -> (Vector3<f64>, Vector3<f64>) {
        match *self {
            Surface::Plane { u_dir, v_dir, .. } => (u_dir, v_dir),
            Surface::Cylinder {
                axis,
                ref_dir,
                radius,
                ..
            } => {
                let y_dir = axis.cross(&ref_dir);
                ((y_dir * u.cos() - ref_dir * u.sin()) * radius, axis)
            }
            Surface::Sphere { radius, .. } => (
                Vector3::new(-v.cos() * u.sin(), v.cos() * u.cos(), 0.0) * radius,
                Vector3::new(-v.sin() * u.cos(), -v.sin() * u.sin(), v.cos()) * radius,
            ),
        }
    }

    /// Unit normal along `dS/du x dS/dv`
    pub fn normal(&self, u: f64, v: f64) -> Vector3<f64> {
        let (su, sv) = self.derivatives(u, v);
        su.cross(&sv).try_normalize(f64::EPSILON).unwrap_or_else(Vector3::z)
    }

    /// Largest absolute principal curvature
    pub fn curvature(&self) -> f64 {
        match *self {
            Surface::Plane { .. } => 0.0,
            Surface::Cylinder { radius, .. } | Surface::Sphere { radius, .. } => 1.0 / radius,
        }
    }

    /// Closed-form parameters of the surface point nearest to `p`. Periodic
    /// `u` is returned in `(-π, π]`.
    pub fn inverse(&self, p: &Point3<f64>) -> (f64, f64) {
        match *self {
            Surface::Plane {
                origin,
                u_dir,
                v_dir,
            } => {
                let d = p - origin;
                (d.dot(&u_dir), d.dot(&v_dir))
            }
            Surface::Cylinder {
                origin,
                axis,
                ref_dir,
                ..
            } => {
                let d = p - origin;
                let y_dir = axis.cross(&ref_dir);
                (d.dot(&y_dir).atan2(d.dot(&ref_dir)), d.dot(&axis))
            }
            Surface::Sphere { center, .. } => {
                let d = p - center;
                let r = d.norm();
                if r < f64::EPSILON {
                    return (0.0, 0.0);
                }
                (d.y.atan2(d.x), (d.z / r).clamp(-1.0, 1.0).asin())
            }
        }
    }

    /// Shift a periodic `u` by whole turns to the copy nearest `reference`
    pub fn unwrap_u(&self, u: f64, reference: f64) -> f64 {
        if self.is_periodic_u() {
            u + TAU * ((reference - u) / TAU).round()
        } else {
            u
        }
    }

    /// Keep parameters inside the surface's valid domain
    pub fn clamp_params(&self, u: f64, v: f64) -> (f64, f64) {
        match self {
            Surface::Sphere { .. } => {
                let limit = FRAC_PI_2 - POLE_MARGIN;
                (u, v.clamp(-limit, limit))
            }
            _ => (u, v),
        }
    }

    /// Curve of constant `u` running from `v0` to `v1`
    pub fn iso_u(&self, u: f64, v0: f64, v1: f64) -> Curve {
        match *self {
            Surface::Plane { .. } | Surface::Cylinder { .. } => Curve::Line {
                start: self.evaluate(u, v0),
                end: self.evaluate(u, v1),
            },
            Surface::Sphere { center, radius } => Curve::Arc {
                center,
                x_dir: Vector3::new(u.cos(), u.sin(), 0.0),
                y_dir: Vector3::z(),
                radius,
                start_angle: v0,
                end_angle: v1,
            },
        }
    }

    /// Curve of constant `v` running from `u0` to `u1`
    pub fn iso_v(&self, v: f64, u0: f64, u1: f64) -> Curve {
        match *self {
            Surface::Plane { .. } => Curve::Line {
                start: self.evaluate(u0, v),
                end: self.evaluate(u1, v),
            },
            Surface::Cylinder {
                origin,
                axis,
                ref_dir,
                radius,
            } => Curve::Arc {
                center: origin + axis * v,
                x_dir: ref_dir,
                y_dir: axis.cross(&ref_dir),
                radius,
                start_angle: u0,
                end_angle: u1,
            },
            Surface::Sphere { center, radius } => Curve::Arc {
                center: center + Vector3::z() * (radius * v.sin()),
                x_dir: Vector3::x(),
                y_dir: Vector3::y(),
                radius: radius * v.cos(),
                start_angle: u0,
                end_angle: u1,
            },
        }
    }

    /// Seed grid resolution for a parameter rectangle: about `π/4` of turn
    /// per cell in curved directions, a single cell on planes.
    pub fn seed_cells(&self, u_range: [f64; 2], v_range: [f64; 2]) -> (usize, usize) {
        let cells = |span: f64| ((span / (PI / 4.0) - 1e-9).ceil() as usize).max(1);
        match self {
            Surface::Plane { .. } => (1, 1),
            Surface::Cylinder { .. } => (cells(u_range[1] - u_range[0]), 1),
            Surface::Sphere { .. } => (
                cells(u_range[1] - u_range[0]),
                cells(v_range[1] - v_range[0]),
            ),
        }
    }
}

fn invalid(message: String) -> GeometryError {
    GeometryError::InvalidTopology(message)
}

fn orthonormal_pair(
    a: &Vector3<f64>,
    b: &Vector3<f64>,
    what: &str,
) -> GeomResult<(Vector3<f64>, Vector3<f64>)> {
    let a = a
        .try_normalize(f64::EPSILON)
        .ok_or_else(|| invalid(format!("{what} has a zero direction")))?;
    let b = (b - a * a.dot(b))
        .try_normalize(1e-12)
        .ok_or_else(|| invalid(format!("{what} directions are parallel")))?;
    Ok((a, b))
}
