use serde::Serialize;
use thiserror::Error;

use super::surface::SampleGrid;
use super::{Point3, Vec3};

#[derive(Debug, Clone, PartialEq, Error)]
pub enum PatchError {
    #[error("patch needs {expected} control values, found {found}")]
    ControlCount { expected: usize, found: usize },
    #[error("tessellation resolution must be at least 1x1")]
    Resolution,
    #[error("tessellation grid {0}x{1} is too large to index")]
    TooLarge(usize, usize),
    #[error("element width must be positive")]
    Width,
    #[error("unknown basis \"{0}\"")]
    UnknownBasis(String),
    #[error("basis step must be positive")]
    Step,
}

// ─────────────────────────────────────────────────────────────────────────────
// Basis matrices
// ─────────────────────────────────────────────────────────────────────────────

/// Cubic basis: weights are `[t³, t², t, 1] · matrix`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Basis {
    pub matrix: [[f64; 4]; 4],
    /// Control points to advance between neighbouring patches of a mesh.
    pub step: usize,
}

impl Basis {
    pub const BEZIER: Self = Self {
        matrix: [
            [-1.0, 3.0, -3.0, 1.0],
            [3.0, -6.0, 3.0, 0.0],
            [-3.0, 3.0, 0.0, 0.0],
            [1.0, 0.0, 0.0, 0.0],
        ],
        step: 3,
    };

    pub const B_SPLINE: Self = Self {
        matrix: [
            [-1.0 / 6.0, 3.0 / 6.0, -3.0 / 6.0, 1.0 / 6.0],
            [3.0 / 6.0, -6.0 / 6.0, 3.0 / 6.0, 0.0],
            [-3.0 / 6.0, 0.0, 3.0 / 6.0, 0.0],
            [1.0 / 6.0, 4.0 / 6.0, 1.0 / 6.0, 0.0],
        ],
        step: 1,
    };

    pub const CATMULL_ROM: Self = Self {
        matrix: [
            [-0.5, 1.5, -1.5, 0.5],
            [1.0, -2.5, 2.0, -0.5],
            [-0.5, 0.0, 0.5, 0.0],
            [0.0, 1.0, 0.0, 0.0],
        ],
        step: 1,
    };

    pub const HERMITE: Self = Self {
        matrix: [
            [2.0, 1.0, -2.0, 1.0],
            [-3.0, -2.0, 3.0, -1.0],
            [0.0, 1.0, 0.0, 0.0],
            [1.0, 0.0, 0.0, 0.0],
        ],
        step: 2,
    };

    pub const POWER: Self = Self {
        matrix: [
            [1.0, 0.0, 0.0, 0.0],
            [0.0, 1.0, 0.0, 0.0],
            [0.0, 0.0, 1.0, 0.0],
            [0.0, 0.0, 0.0, 1.0],
        ],
        step: 4,
    };

    /// Predefined basis by name, with its default step.
    pub fn named(name: &str) -> Result<Self, PatchError> {
        match name {
            "bezier" => Ok(Self::BEZIER),
            "b-spline" | "bspline" => Ok(Self::B_SPLINE),
            "catmull-rom" | "catmullrom" => Ok(Self::CATMULL_ROM),
            "hermite" => Ok(Self::HERMITE),
            "power" => Ok(Self::POWER),
            other => Err(PatchError::UnknownBasis(other.to_owned())),
        }
    }

    /// From 16 row-major values.
    #[must_use]
    pub fn from_values(values: &[f32; 16], step: usize) -> Self {
        let mut matrix = [[0.0; 4]; 4];
        for (k, row) in matrix.iter_mut().enumerate() {
            for (j, cell) in row.iter_mut().enumerate() {
                *cell = f64::from(values[k * 4 + j]);
            }
        }
        Self { matrix, step }
    }

    #[must_use]
    pub fn with_step(self, step: usize) -> Self {
        Self { step, ..self }
    }

    /// Weights of the four control values at `t`, and their derivatives.
    #[must_use]
    pub fn weights(&self, t: f64) -> ([f64; 4], [f64; 4]) {
        let powers = [t * t * t, t * t, t, 1.0];
        let slopes = [3.0 * t * t, 2.0 * t, 1.0, 0.0];
        let mut w = [0.0; 4];
        let mut dw = [0.0; 4];
        for j in 0..4 {
            for k in 0..4 {
                w[j] += powers[k] * self.matrix[k][j];
                dw[j] += slopes[k] * self.matrix[k][j];
            }
        }
        (w, dw)
    }
}

impl Default for Basis {
    fn default() -> Self {
        Self::BEZIER
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Bilinear
// ─────────────────────────────────────────────────────────────────────────────

#[inline]
fn lerp(a: f64, b: f64, t: f64) -> f64 {
    a * (1.0 - t) + b * t
}

/// Appends the bilinear blend of four corner elements of `width` values
/// (order: `(0,0) (1,0) (0,1) (1,1)`) at `(u, v)`.
pub fn bilinear_at(corners: &[f64], width: usize, u: f64, v: f64, out: &mut Vec<f64>) {
    for k in 0..width {
        let bottom = lerp(corners[k], corners[width + k], u);
        let top = lerp(corners[2 * width + k], corners[3 * width + k], u);
        out.push(lerp(bottom, top, v));
    }
}

/// Bilinear blend over a `(tu + 1) × (tv + 1)` grid, row-major in u.
/// At `tu = tv = 1` the result is exactly the four corners.
pub fn bilinear_blend(corners: &[f64], width: usize, tu: usize, tv: usize) -> Result<Vec<f64>, PatchError> {
    if width == 0 {
        return Err(PatchError::Width);
    }
    if corners.len() != 4 * width {
        return Err(PatchError::ControlCount {
            expected: 4 * width,
            found: corners.len(),
        });
    }
    if tu == 0 || tv == 0 {
        return Err(PatchError::Resolution);
    }
    let grid = SampleGrid::parameters(tu, tv).ok_or(PatchError::TooLarge(tu, tv))?;
    let mut out = Vec::with_capacity(grid.len() * width);
    for &[u, v] in &grid.params {
        bilinear_at(corners, width, u, v, &mut out);
    }
    Ok(out)
}

/// Positions and normals of a bilinear patch.
pub fn bilinear_grid(corners: &[Point3; 4], tu: usize, tv: usize) -> Result<SampleGrid, PatchError> {
    if tu == 0 || tv == 0 {
        return Err(PatchError::Resolution);
    }
    let [p0, p1, p2, p3] = *corners;
    let mut grid = SampleGrid::parameters(tu, tv).ok_or(PatchError::TooLarge(tu, tv))?;
    let mut partials = Vec::with_capacity(grid.len());
    for &[u, v] in &grid.params {
        let bottom = p0 + (p1 - p0) * u;
        let top = p2 + (p3 - p2) * u;
        grid.points.push(bottom + (top - bottom) * v);
        let du = (p1 - p0) * (1.0 - v) + (p3 - p2) * v;
        partials.push((du, top - bottom));
    }
    let fallback = super::newell_normal(&[p0, p1, p3, p2]).normalized().unwrap_or(Vec3::Z);
    grid.set_normals(&partials, fallback);
    Ok(grid)
}

// ─────────────────────────────────────────────────────────────────────────────
// Bicubic
// ─────────────────────────────────────────────────────────────────────────────

/// Bicubic blend of 16 control elements (4 rows of 4 along u) over a
/// `(tu + 1) × (tv + 1)` grid.
pub fn bicubic_blend(
    control: &[f64],
    width: usize,
    ubasis: &Basis,
    vbasis: &Basis,
    tu: usize,
    tv: usize,
) -> Result<Vec<f64>, PatchError> {
    if width == 0 {
        return Err(PatchError::Width);
    }
    if control.len() != 16 * width {
        return Err(PatchError::ControlCount {
            expected: 16 * width,
            found: control.len(),
        });
    }
    if tu == 0 || tv == 0 {
        return Err(PatchError::Resolution);
    }
    let grid = SampleGrid::parameters(tu, tv).ok_or(PatchError::TooLarge(tu, tv))?;
    let mut out = Vec::with_capacity(grid.len() * width);
    for &[u, v] in &grid.params {
        let (wu, _) = ubasis.weights(u);
        let (wv, _) = vbasis.weights(v);
        for k in 0..width {
            let mut sum = 0.0;
            for (row, wr) in wv.iter().enumerate() {
                for (col, wc) in wu.iter().enumerate() {
                    sum += wr * wc * control[(row * 4 + col) * width + k];
                }
            }
            out.push(sum);
        }
    }
    Ok(out)
}

/// Positions and normals of a bicubic patch from 16 control points.
pub fn bicubic_grid(
    control: &[Point3],
    ubasis: &Basis,
    vbasis: &Basis,
    tu: usize,
    tv: usize,
) -> Result<SampleGrid, PatchError> {
    if control.len() != 16 {
        return Err(PatchError::ControlCount {
            expected: 16,
            found: control.len(),
        });
    }
    if tu == 0 || tv == 0 {
        return Err(PatchError::Resolution);
    }
    let mut grid = SampleGrid::parameters(tu, tv).ok_or(PatchError::TooLarge(tu, tv))?;
    let mut partials = Vec::with_capacity(grid.len());
    for &[u, v] in &grid.params {
        let (wu, dwu) = ubasis.weights(u);
        let (wv, dwv) = vbasis.weights(v);
        let mut p = Vec3::ZERO;
        let mut du = Vec3::ZERO;
        let mut dv = Vec3::ZERO;
        for row in 0..4 {
            for col in 0..4 {
                let c = control[row * 4 + col].to_vec3();
                p = p + c * (wv[row] * wu[col]);
                du = du + c * (wv[row] * dwu[col]);
                dv = dv + c * (dwv[row] * wu[col]);
            }
        }
        grid.points.push(Point3::ORIGIN + p);
        partials.push((du, dv));
    }
    let corners = [control[0], control[3], control[15], control[12]];
    let fallback = super::newell_normal(&corners).normalized().unwrap_or(Vec3::Z);
    grid.set_normals(&partials, fallback);
    Ok(grid)
}
