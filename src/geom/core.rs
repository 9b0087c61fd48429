use std::ops::{Add, Mul, Neg, Sub};

// ─────────────────────────────────────────────────────────────────────────────
// Vec3
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Vec3 {
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

impl Vec3 {
    pub const ZERO: Self = Self::new(0.0, 0.0, 0.0);
    pub const Z: Self = Self::new(0.0, 0.0, 1.0);

    #[must_use]
    pub const fn new(x: f64, y: f64, z: f64) -> Self {
        Self { x, y, z }
    }

    #[must_use]
    pub const fn to_array(self) -> [f64; 3] {
        [self.x, self.y, self.z]
    }

    #[must_use]
    pub fn length(self) -> f64 {
        self.dot(self).sqrt()
    }

    #[must_use]
    pub const fn dot(self, rhs: Self) -> f64 {
        self.x * rhs.x + self.y * rhs.y + self.z * rhs.z
    }

    #[must_use]
    pub const fn cross(self, rhs: Self) -> Self {
        Self {
            x: self.y * rhs.z - self.z * rhs.y,
            y: self.z * rhs.x - self.x * rhs.z,
            z: self.x * rhs.y - self.y * rhs.x,
        }
    }

    /// Unit vector, or `None` for zero-length and non-finite input.
    #[must_use]
    pub fn normalized(self) -> Option<Self> {
        let len = self.length();
        (len.is_finite() && len > 0.0).then(|| self * (1.0 / len))
    }

    /// Index of the component with the largest magnitude.
    #[must_use]
    pub fn dominant_axis(self) -> usize {
        let a = [self.x.abs(), self.y.abs(), self.z.abs()];
        if a[0] >= a[1] && a[0] >= a[2] {
            0
        } else if a[1] >= a[2] {
            1
        } else {
            2
        }
    }
}

impl Add for Vec3 {
    type Output = Self;
    fn add(self, rhs: Self) -> Self {
        Self::new(self.x + rhs.x, self.y + rhs.y, self.z + rhs.z)
    }
}

impl Sub for Vec3 {
    type Output = Self;
    fn sub(self, rhs: Self) -> Self {
        Self::new(self.x - rhs.x, self.y - rhs.y, self.z - rhs.z)
    }
}

impl Mul<f64> for Vec3 {
    type Output = Self;
    fn mul(self, s: f64) -> Self {
        Self::new(self.x * s, self.y * s, self.z * s)
    }
}

impl Neg for Vec3 {
    type Output = Self;
    fn neg(self) -> Self {
        Self::new(-self.x, -self.y, -self.z)
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Point3
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Point3 {
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

impl Point3 {
    pub const ORIGIN: Self = Self::new(0.0, 0.0, 0.0);

    #[must_use]
    pub const fn new(x: f64, y: f64, z: f64) -> Self {
        Self { x, y, z }
    }

    #[must_use]
    pub const fn to_vec3(self) -> Vec3 {
        Vec3::new(self.x, self.y, self.z)
    }

    #[must_use]
    pub fn to_f32(self) -> [f32; 3] {
        [self.x as f32, self.y as f32, self.z as f32]
    }
}

impl Add<Vec3> for Point3 {
    type Output = Self;
    fn add(self, v: Vec3) -> Self {
        Self::new(self.x + v.x, self.y + v.y, self.z + v.z)
    }
}

impl Sub for Point3 {
    type Output = Vec3;
    fn sub(self, rhs: Self) -> Vec3 {
        Vec3::new(self.x - rhs.x, self.y - rhs.y, self.z - rhs.z)
    }
}

/// Newell normal of a closed loop; its length is twice the loop area.
#[must_use]
pub fn newell_normal(points: &[Point3]) -> Vec3 {
    let mut n = Vec3::ZERO;
    for (i, a) in points.iter().enumerate() {
        let b = points[(i + 1) % points.len()];
        n.x += (a.y - b.y) * (a.z + b.z);
        n.y += (a.z - b.z) * (a.x + b.x);
        n.z += (a.x - b.x) * (a.y + b.y);
    }
    n
}

// ─────────────────────────────────────────────────────────────────────────────
// Transform
// ─────────────────────────────────────────────────────────────────────────────

/// 4x4 affine/projective transform acting on column vectors.
///
/// Interface matrices are written for row vectors (`p' = p·M`); use
/// [`Transform::from_row_major`] and [`Transform::to_row_major`] at that
/// boundary. Concatenation follows the interface: the newest transform is
/// applied to points first, so `ctm = ctm.compose(t)`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Transform {
    m: [[f64; 4]; 4],
}

impl Transform {
    #[must_use]
    pub const fn identity() -> Self {
        Self {
            m: [
                [1.0, 0.0, 0.0, 0.0],
                [0.0, 1.0, 0.0, 0.0],
                [0.0, 0.0, 1.0, 0.0],
                [0.0, 0.0, 0.0, 1.0],
            ],
        }
    }

    /// From 16 row-major values in row-vector convention.
    #[must_use]
    pub fn from_row_major(values: &[f32; 16]) -> Self {
        let mut m = [[0.0; 4]; 4];
        for (r, row) in m.iter_mut().enumerate() {
            for (c, cell) in row.iter_mut().enumerate() {
                *cell = f64::from(values[c * 4 + r]);
            }
        }
        Self { m }
    }

    /// Inverse of [`Transform::from_row_major`].
    #[must_use]
    pub fn to_row_major(&self) -> [f32; 16] {
        let mut out = [0.0; 16];
        for (r, row) in self.m.iter().enumerate() {
            for (c, cell) in row.iter().enumerate() {
                out[c * 4 + r] = *cell as f32;
            }
        }
        out
    }

    #[must_use]
    pub const fn translate(v: Vec3) -> Self {
        Self {
            m: [
                [1.0, 0.0, 0.0, v.x],
                [0.0, 1.0, 0.0, v.y],
                [0.0, 0.0, 1.0, v.z],
                [0.0, 0.0, 0.0, 1.0],
            ],
        }
    }

    #[must_use]
    pub const fn scale(sx: f64, sy: f64, sz: f64) -> Self {
        Self {
            m: [
                [sx, 0.0, 0.0, 0.0],
                [0.0, sy, 0.0, 0.0],
                [0.0, 0.0, sz, 0.0],
                [0.0, 0.0, 0.0, 1.0],
            ],
        }
    }

    /// Rotation by `degrees` about `axis` (right-handed about the axis).
    #[must_use]
    pub fn rotate(degrees: f64, axis: Vec3) -> Option<Self> {
        let a = axis.normalized()?;
        let (s, c) = degrees.to_radians().sin_cos();
        let t = 1.0 - c;
        Some(Self {
            m: [
                [t * a.x * a.x + c, t * a.x * a.y - s * a.z, t * a.x * a.z + s * a.y, 0.0],
                [t * a.x * a.y + s * a.z, t * a.y * a.y + c, t * a.y * a.z - s * a.x, 0.0],
                [t * a.x * a.z - s * a.y, t * a.y * a.z + s * a.x, t * a.z * a.z + c, 0.0],
                [0.0, 0.0, 0.0, 1.0],
            ],
        })
    }

    /// Shear along `d2` that turns `d1` by `degrees` towards `d2`.
    /// `None` when the directions are parallel or the angle leaves the
    /// half-plane spanned by them.
    #[must_use]
    pub fn skew(degrees: f64, d1: Vec3, d2: Vec3) -> Option<Self> {
        let d1 = d1.normalized()?;
        let d2 = d2.normalized()?;
        let along = d1.dot(d2);
        let perp_dir = (d1 - d2 * along).normalized()?;
        let perp = d1.dot(perp_dir);
        let start = along.atan2(perp);
        let end = start + degrees.to_radians();
        if end >= std::f64::consts::FRAC_PI_2 || end <= -std::f64::consts::FRAC_PI_2 {
            return None;
        }
        let shear = end.tan() - along / perp;
        let mut m = Self::identity().m;
        let d = d2.to_array();
        let n = perp_dir.to_array();
        for (r, row) in m.iter_mut().take(3).enumerate() {
            for (c, cell) in row.iter_mut().take(3).enumerate() {
                *cell += shear * d[r] * n[c];
            }
        }
        Some(Self { m })
    }

    /// Perspective projection with field of view `fov_degrees` looking down +z.
    #[must_use]
    pub fn perspective(fov_degrees: f64) -> Option<Self> {
        let half = (fov_degrees * 0.5).to_radians().tan();
        if !(half.is_finite() && half > 0.0) {
            return None;
        }
        let f = 1.0 / half;
        Some(Self {
            m: [
                [f, 0.0, 0.0, 0.0],
                [0.0, f, 0.0, 0.0],
                [0.0, 0.0, 1.0, -1.0],
                [0.0, 0.0, 1.0, 0.0],
            ],
        })
    }

    #[must_use]
    pub fn compose(self, other: Self) -> Self {
        let mut m = [[0.0; 4]; 4];
        for (i, row) in m.iter_mut().enumerate() {
            for (j, cell) in row.iter_mut().enumerate() {
                *cell = (0..4).map(|k| self.m[i][k] * other.m[k][j]).sum();
            }
        }
        Self { m }
    }

    #[must_use]
    pub fn apply_point(&self, p: Point3) -> Point3 {
        let m = &self.m;
        let x = m[0][0] * p.x + m[0][1] * p.y + m[0][2] * p.z + m[0][3];
        let y = m[1][0] * p.x + m[1][1] * p.y + m[1][2] * p.z + m[1][3];
        let z = m[2][0] * p.x + m[2][1] * p.y + m[2][2] * p.z + m[2][3];
        let w = m[3][0] * p.x + m[3][1] * p.y + m[3][2] * p.z + m[3][3];
        if w != 0.0 && w != 1.0 {
            Point3::new(x / w, y / w, z / w)
        } else {
            Point3::new(x, y, z)
        }
    }

    /// Determinant of the upper 3x3 block; negative for mirroring transforms.
    #[must_use]
    pub fn handedness(&self) -> f64 {
        let m = &self.m;
        let r0 = Vec3::new(m[0][0], m[0][1], m[0][2]);
        let r1 = Vec3::new(m[1][0], m[1][1], m[1][2]);
        let r2 = Vec3::new(m[2][0], m[2][1], m[2][2]);
        r0.dot(r1.cross(r2))
    }
}

impl Default for Transform {
    fn default() -> Self {
        Self::identity()
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tolerance
// ─────────────────────────────────────────────────────────────────────────────

/// Tolerance used by triangulation and degeneracy checks.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Tolerance {
    pub eps: f64,
}

impl Tolerance {
    pub const DEFAULT: Self = Self { eps: 1e-9 };
    pub const LOOSE: Self = Self { eps: 1e-6 };

    #[must_use]
    pub fn approx_eq_point3(self, a: Point3, b: Point3) -> bool {
        let d = a - b;
        d.dot(d) <= self.eps * self.eps
    }
}

impl Default for Tolerance {
    fn default() -> Self {
        Self::DEFAULT
    }
}
