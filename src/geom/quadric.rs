//! Closed-form quadric surfaces sampled on a regular parameter grid.
//!
//! Angles are in degrees. `u` runs around the z axis (`0..thetamax`), `v`
//! along the profile.

use thiserror::Error;

use super::surface::SampleGrid;
use super::{Point3, Vec3};

#[derive(Debug, Clone, PartialEq, Error)]
pub enum QuadricError {
    #[error("{0} must be positive")]
    NonPositive(&'static str),
    #[error("sweep angle must not be zero")]
    ZeroSweep,
    #[error("parametric range {min}..{max} is empty or inverted")]
    EmptyRange { min: f64, max: f64 },
    #[error("tessellation resolution must be at least 1x1")]
    Resolution,
    #[error("tessellation grid {0}x{1} is too large to index")]
    TooLarge(usize, usize),
    #[error("quadric parameters must be finite")]
    NonFinite,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Quadric {
    Sphere { radius: f64, zmin: f64, zmax: f64, thetamax: f64 },
    Cone { height: f64, radius: f64, thetamax: f64 },
    Cylinder { radius: f64, zmin: f64, zmax: f64, thetamax: f64 },
    Hyperboloid { p1: Point3, p2: Point3, thetamax: f64 },
    Paraboloid { rmax: f64, zmin: f64, zmax: f64, thetamax: f64 },
    Disk { height: f64, radius: f64, thetamax: f64 },
    Torus { rmajor: f64, rminor: f64, phimin: f64, phimax: f64, thetamax: f64 },
}

fn positive(value: f64, what: &'static str) -> Result<(), QuadricError> {
    if value > 0.0 {
        Ok(())
    } else {
        Err(QuadricError::NonPositive(what))
    }
}

fn ordered(min: f64, max: f64) -> Result<(), QuadricError> {
    if min < max {
        Ok(())
    } else {
        Err(QuadricError::EmptyRange { min, max })
    }
}

impl Quadric {
    fn thetamax(&self) -> f64 {
        match *self {
            Self::Sphere { thetamax, .. }
            | Self::Cone { thetamax, .. }
            | Self::Cylinder { thetamax, .. }
            | Self::Hyperboloid { thetamax, .. }
            | Self::Paraboloid { thetamax, .. }
            | Self::Disk { thetamax, .. }
            | Self::Torus { thetamax, .. } => thetamax,
        }
    }

    fn scalars(&self) -> Vec<f64> {
        match *self {
            Self::Sphere { radius, zmin, zmax, thetamax }
            | Self::Cylinder { radius, zmin, zmax, thetamax }
            | Self::Paraboloid { rmax: radius, zmin, zmax, thetamax } => {
                vec![radius, zmin, zmax, thetamax]
            }
            Self::Cone { height, radius, thetamax } | Self::Disk { height, radius, thetamax } => {
                vec![height, radius, thetamax]
            }
            Self::Hyperboloid { p1, p2, thetamax } => {
                vec![p1.x, p1.y, p1.z, p2.x, p2.y, p2.z, thetamax]
            }
            Self::Torus { rmajor, rminor, phimin, phimax, thetamax } => {
                vec![rmajor, rminor, phimin, phimax, thetamax]
            }
        }
    }

    /// Rejects arguments that describe no surface.
    pub fn validate(&self) -> Result<(), QuadricError> {
        if self.scalars().iter().any(|v| !v.is_finite()) {
            return Err(QuadricError::NonFinite);
        }
        if self.thetamax() == 0.0 {
            return Err(QuadricError::ZeroSweep);
        }
        match *self {
            Self::Sphere { radius, zmin, zmax, .. } => {
                positive(radius, "sphere radius")?;
                ordered(zmin.max(-radius), zmax.min(radius))
            }
            Self::Cone { radius, height, .. } => {
                positive(radius, "cone radius")?;
                if height == 0.0 {
                    Err(QuadricError::NonPositive("cone height"))
                } else {
                    Ok(())
                }
            }
            Self::Cylinder { radius, zmin, zmax, .. } => {
                positive(radius, "cylinder radius")?;
                ordered(zmin, zmax)
            }
            Self::Hyperboloid { p1, p2, .. } => {
                if (p2 - p1).length() == 0.0 {
                    Err(QuadricError::EmptyRange { min: 0.0, max: 0.0 })
                } else {
                    Ok(())
                }
            }
            Self::Paraboloid { rmax, zmin, zmax, .. } => {
                positive(rmax, "paraboloid radius")?;
                positive(zmax, "paraboloid zmax")?;
                if zmin < 0.0 {
                    return Err(QuadricError::EmptyRange { min: zmin, max: zmax });
                }
                ordered(zmin, zmax)
            }
            Self::Disk { radius, .. } => positive(radius, "disk radius"),
            Self::Torus { rminor, phimin, phimax, rmajor, .. } => {
                positive(rminor, "torus minor radius")?;
                if rmajor < 0.0 {
                    return Err(QuadricError::NonPositive("torus major radius"));
                }
                if phimin == phimax {
                    return Err(QuadricError::EmptyRange { min: phimin, max: phimax });
                }
                Ok(())
            }
        }
    }

    /// Surface point at normalised parameters `u, v ∈ [0, 1]`.
    #[must_use]
    pub fn point_at(&self, u: f64, v: f64) -> Point3 {
        let (s, c) = (u * self.thetamax()).to_radians().sin_cos();
        match *self {
            Self::Sphere { radius, zmin, zmax, .. } => {
                let lo = (zmin / radius).clamp(-1.0, 1.0).asin();
                let hi = (zmax / radius).clamp(-1.0, 1.0).asin();
                let phi = lo + v * (hi - lo);
                let r = radius * phi.cos();
                Point3::new(r * c, r * s, radius * phi.sin())
            }
            Self::Cone { height, radius, .. } => {
                let r = radius * (1.0 - v);
                Point3::new(r * c, r * s, v * height)
            }
            Self::Cylinder { radius, zmin, zmax, .. } => {
                Point3::new(radius * c, radius * s, zmin + v * (zmax - zmin))
            }
            Self::Hyperboloid { p1, p2, .. } => {
                let x = p1.x + v * (p2.x - p1.x);
                let y = p1.y + v * (p2.y - p1.y);
                let z = p1.z + v * (p2.z - p1.z);
                Point3::new(x * c - y * s, x * s + y * c, z)
            }
            Self::Paraboloid { rmax, zmin, zmax, .. } => {
                let z = zmin + v * (zmax - zmin);
                let r = rmax * (z / zmax).max(0.0).sqrt();
                Point3::new(r * c, r * s, z)
            }
            Self::Disk { height, radius, .. } => {
                let r = radius * (1.0 - v);
                Point3::new(r * c, r * s, height)
            }
            Self::Torus { rmajor, rminor, phimin, phimax, .. } => {
                let phi = (phimin + v * (phimax - phimin)).to_radians();
                let r = rmajor + rminor * phi.cos();
                Point3::new(r * c, r * s, rminor * phi.sin())
            }
        }
    }

    /// Unit normal at normalised parameters, oriented as `∂P/∂u × ∂P/∂v`.
    /// `None` only where a hyperboloid profile crosses the axis.
    #[must_use]
    pub fn normal_at(&self, u: f64, v: f64) -> Option<Vec3> {
        let sweep = self.thetamax().signum();
        let (s, c) = (u * self.thetamax()).to_radians().sin_cos();
        let n = match *self {
            Self::Sphere { radius, .. } => self.point_at(u, v).to_vec3() * (1.0 / radius),
            Self::Cylinder { .. } => Vec3::new(c, s, 0.0),
            Self::Cone { height, radius, .. } => Vec3::new(height * c, height * s, radius),
            Self::Disk { .. } => Vec3::Z,
            Self::Paraboloid { rmax, zmax, .. } => {
                let p = self.point_at(u, v);
                Vec3::new(p.x, p.y, -rmax * rmax / (2.0 * zmax))
            }
            Self::Hyperboloid { p1, p2, .. } => {
                let p = self.point_at(u, v);
                let d = p2 - p1;
                let (bx, by) = (d.x * c - d.y * s, d.x * s + d.y * c);
                Vec3::new(p.x * d.z, p.y * d.z, -(p.x * bx + p.y * by))
            }
            Self::Torus { rmajor, rminor, phimin, phimax, .. } => {
                let phi = (phimin + v * (phimax - phimin)).to_radians();
                let ring = rmajor + rminor * phi.cos();
                let side = (phimax - phimin).signum() * if ring < 0.0 { -1.0 } else { 1.0 };
                Vec3::new(phi.cos() * c, phi.cos() * s, phi.sin()) * side
            }
        };
        (n * sweep).normalized()
    }

    /// Validates and samples a `(tu + 1) × (tv + 1)` grid with closed-form
    /// normals.
    pub fn sample(&self, tu: usize, tv: usize) -> Result<SampleGrid, QuadricError> {
        if tu == 0 || tv == 0 {
            return Err(QuadricError::Resolution);
        }
        self.validate()?;
        let mut grid = SampleGrid::parameters(tu, tv).ok_or(QuadricError::TooLarge(tu, tv))?;
        let mut normals = Vec::with_capacity(grid.len());
        for &[u, v] in &grid.params {
            grid.points.push(self.point_at(u, v));
            normals.push(self.normal_at(u, v));
        }
        grid.fill_normals(&normals, Vec3::Z * self.thetamax().signum());
        Ok(grid)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sphere_points_lie_on_radius() {
        let sphere = Quadric::Sphere { radius: 2.0, zmin: -2.0, zmax: 2.0, thetamax: 360.0 };
        let grid = sphere.sample(8, 6).unwrap();
        assert_eq!(grid.points.len(), 9 * 7);
        for p in &grid.points {
            assert!((p.to_vec3().length() - 2.0).abs() < 1e-9);
        }
    }

    #[test]
    fn invalid_arguments_are_rejected() {
        let sphere = Quadric::Sphere { radius: -1.0, zmin: -1.0, zmax: 1.0, thetamax: 360.0 };
        assert_eq!(sphere.validate(), Err(QuadricError::NonPositive("sphere radius")));
        let cylinder = Quadric::Cylinder { radius: 1.0, zmin: 1.0, zmax: 0.0, thetamax: 360.0 };
        assert!(matches!(cylinder.validate(), Err(QuadricError::EmptyRange { .. })));
        let disk = Quadric::Disk { height: 0.0, radius: 1.0, thetamax: 360.0 };
        assert_eq!(disk.sample(0, 4).unwrap_err(), QuadricError::Resolution);
    }

    #[test]
    fn sphere_poles_face_along_the_axis() {
        let sphere = Quadric::Sphere { radius: 2.0, zmin: -2.0, zmax: 2.0, thetamax: 360.0 };
        let grid = sphere.sample(8, 4).unwrap();
        // Row 0 is the south pole, the last row the north pole.
        for n in &grid.normals[..9] {
            assert!((n.z + 1.0).abs() < 1e-12, "{n:?}");
        }
        for n in &grid.normals[grid.len() - 9..] {
            assert!((n.z - 1.0).abs() < 1e-12, "{n:?}");
        }
        for (p, n) in grid.points.iter().zip(&grid.normals) {
            let radial = p.to_vec3() * 0.5;
            assert!((radial - *n).length() < 1e-12, "{p:?} {n:?}");
        }
    }

    #[test]
    fn paraboloid_apex_faces_down() {
        let bowl = Quadric::Paraboloid { rmax: 1.0, zmin: 0.0, zmax: 1.0, thetamax: 360.0 };
        let grid = bowl.sample(6, 3).unwrap();
        assert!(grid.normals[..7].iter().all(|n| (n.z + 1.0).abs() < 1e-12));
    }

    #[test]
    fn reversed_sweep_flips_normals() {
        let forward = Quadric::Cylinder { radius: 1.0, zmin: 0.0, zmax: 1.0, thetamax: 90.0 };
        let backward = Quadric::Cylinder { radius: 1.0, zmin: 0.0, zmax: 1.0, thetamax: -90.0 };
        let n = forward.normal_at(0.0, 0.5).unwrap();
        let m = backward.normal_at(0.0, 0.5).unwrap();
        assert!((n - Vec3::new(1.0, 0.0, 0.0)).length() < 1e-12);
        assert!((m + n).length() < 1e-12);
    }
}
