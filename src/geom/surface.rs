use std::collections::BTreeMap;

use serde::Serialize;

use super::triangulation::{grid_strips, grid_triangles};
use super::{Point3, Vec3};
use crate::scene::{RequestKind, TypeKind, Values};

/// Index buffer layout of a tessellated surface.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum IndexLayout {
    #[default]
    Triangles,
    Strips,
}

impl IndexLayout {
    #[must_use]
    pub fn parse(name: &str) -> Option<Self> {
        match name {
            "triangles" => Some(Self::Triangles),
            "strips" => Some(Self::Strips),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Topology {
    Triangles,
    TriangleStrips,
}

/// A primitive variable carried onto a surface: either one element for the
/// whole surface or one element per output vertex.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SurfaceVar {
    pub kind: TypeKind,
    pub width: usize,
    pub per_vertex: bool,
    pub values: Values,
}

impl SurfaceVar {
    #[must_use]
    pub fn constant(kind: TypeKind, width: usize, values: Values) -> Self {
        Self {
            kind,
            width,
            per_vertex: false,
            values,
        }
    }

    #[must_use]
    pub fn per_vertex(kind: TypeKind, width: usize, values: Vec<f64>) -> Self {
        Self {
            kind,
            width,
            per_vertex: true,
            values: Values::Floats(values.into_iter().map(|v| v as f32).collect()),
        }
    }

    /// Number of elements held.
    #[must_use]
    pub fn count(&self) -> usize {
        if self.width == 0 {
            0
        } else {
            self.values.len() / self.width
        }
    }
}

/// Output unit of the tessellator, handed to the backend.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Surface {
    pub primitive: RequestKind,
    pub topology: Topology,
    pub indices: Vec<u32>,
    /// Strip lengths for [`Topology::TriangleStrips`]; empty otherwise.
    pub strip_lengths: Vec<u32>,
    pub positions: Vec<[f32; 3]>,
    pub normals: Vec<[f32; 3]>,
    pub vars: BTreeMap<String, SurfaceVar>,
    /// Object-to-world transform, row-major in interface convention.
    pub transform: [f32; 16],
    /// Set when the front side is the opposite of the index winding.
    pub reversed: bool,
    pub two_sided: bool,
}

impl Surface {
    #[must_use]
    pub fn new(primitive: RequestKind, positions: Vec<[f32; 3]>, indices: Vec<u32>) -> Self {
        let mut transform = [0.0; 16];
        for i in 0..4 {
            transform[i * 5] = 1.0;
        }
        Self {
            primitive,
            topology: Topology::Triangles,
            indices,
            strip_lengths: Vec::new(),
            positions,
            normals: Vec::new(),
            vars: BTreeMap::new(),
            transform,
            reversed: false,
            two_sided: false,
        }
    }

    #[must_use]
    pub fn vertex_count(&self) -> usize {
        self.positions.len()
    }

    #[must_use]
    pub fn triangle_count(&self) -> usize {
        match self.topology {
            Topology::Triangles => self.indices.len() / 3,
            Topology::TriangleStrips => self
                .strip_lengths
                .iter()
                .map(|&n| (n as usize).saturating_sub(2))
                .sum(),
        }
    }

    #[must_use]
    pub fn var(&self, name: &str) -> Option<&SurfaceVar> {
        self.vars.get(name)
    }

    /// All triangles, with strips unrolled to consistent winding.
    #[must_use]
    pub fn triangles(&self) -> Vec<[u32; 3]> {
        match self.topology {
            Topology::Triangles => self
                .indices
                .chunks_exact(3)
                .map(|t| [t[0], t[1], t[2]])
                .collect(),
            Topology::TriangleStrips => {
                let mut out = Vec::with_capacity(self.triangle_count());
                let mut offset = 0;
                for &len in &self.strip_lengths {
                    let strip = &self.indices[offset..offset + len as usize];
                    for (k, w) in strip.windows(3).enumerate() {
                        out.push(if k % 2 == 0 {
                            [w[0], w[1], w[2]]
                        } else {
                            [w[1], w[0], w[2]]
                        });
                    }
                    offset += len as usize;
                }
                out
            }
        }
    }

    /// Checks buffer sizes against each other.
    pub fn validate(&self) -> Result<(), String> {
        let n = self.positions.len();
        if !self.normals.is_empty() && self.normals.len() != n {
            return Err(format!("{} normals for {n} positions", self.normals.len()));
        }
        if let Some(bad) = self.indices.iter().find(|&&i| i as usize >= n) {
            return Err(format!("index {bad} out of range for {n} positions"));
        }
        match self.topology {
            Topology::Triangles if self.indices.len() % 3 != 0 => {
                return Err("triangle index count is not a multiple of 3".to_owned());
            }
            Topology::TriangleStrips => {
                let total: u32 = self.strip_lengths.iter().sum();
                if total as usize != self.indices.len() {
                    return Err("strip lengths do not cover the index buffer".to_owned());
                }
            }
            Topology::Triangles => {}
        }
        for (name, var) in &self.vars {
            let expected = if var.per_vertex { n } else { 1 };
            if var.count() != expected {
                return Err(format!("variable {name} holds {} elements, expected {expected}", var.count()));
            }
        }
        Ok(())
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Sample grids
// ─────────────────────────────────────────────────────────────────────────────

/// Largest tessellation resolution accepted per parametric direction.
pub const MAX_RESOLUTION: usize = 4096;

/// Sample count of a `(tu + 1) × (tv + 1)` grid, or `None` when the vertex
/// indices would not fit in `u32`.
#[must_use]
pub fn grid_len(tu: usize, tv: usize) -> Option<usize> {
    let len = tu.checked_add(1)?.checked_mul(tv.checked_add(1)?)?;
    u32::try_from(len).ok().map(|_| len)
}

/// Regular `(tu + 1) × (tv + 1)` grid of samples over a parametric domain,
/// row-major in u.
#[derive(Debug, Clone, PartialEq)]
pub struct SampleGrid {
    pub u_count: usize,
    pub v_count: usize,
    pub points: Vec<Point3>,
    pub normals: Vec<Vec3>,
    /// Normalised `(u, v)` of every sample.
    pub params: Vec<[f64; 2]>,
}

impl SampleGrid {
    /// Grid of parameters only; points and normals are filled by the caller.
    /// `None` if the grid is too large to index.
    #[must_use]
    pub fn parameters(tu: usize, tv: usize) -> Option<Self> {
        let len = grid_len(tu, tv)?;
        let (u_count, v_count) = (tu + 1, tv + 1);
        let mut params = Vec::with_capacity(len);
        for j in 0..v_count {
            for i in 0..u_count {
                params.push([i as f64 / tu as f64, j as f64 / tv as f64]);
            }
        }
        Some(Self {
            u_count,
            v_count,
            points: Vec::with_capacity(params.len()),
            normals: Vec::with_capacity(params.len()),
            params,
        })
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.params.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.params.is_empty()
    }

    /// Stores normals from partial derivatives; samples where they vanish
    /// (poles, apexes) take the normal of the nearest valid sample in their
    /// column, or `fallback`.
    pub fn set_normals(&mut self, partials: &[(Vec3, Vec3)], fallback: Vec3) {
        let raw: Vec<Option<Vec3>> = partials
            .iter()
            .map(|(du, dv)| du.cross(*dv).normalized())
            .collect();
        self.fill_normals(&raw, fallback);
    }

    /// Stores unit normals; missing ones are filled the same way as in
    /// [`SampleGrid::set_normals`].
    pub fn fill_normals(&mut self, raw: &[Option<Vec3>], fallback: Vec3) {
        self.normals = (0..raw.len())
            .map(|k| {
                raw[k].unwrap_or_else(|| {
                    let (i, j) = (k % self.u_count, k / self.u_count);
                    (1..self.v_count)
                        .flat_map(|d| [j.checked_sub(d), Some(j + d)])
                        .flatten()
                        .filter(|&row| row < self.v_count)
                        .find_map(|row| raw[row * self.u_count + i])
                        .unwrap_or(fallback)
                })
            })
            .collect();
    }

    /// Builds a surface with the grid's positions and normals.
    #[must_use]
    pub fn to_surface(&self, primitive: RequestKind, layout: IndexLayout) -> Surface {
        let positions = self.points.iter().map(|p| p.to_f32()).collect();
        let mut surface = Surface::new(primitive, positions, Vec::new());
        surface.normals = self.normals.iter().map(|n| Point3::new(n.x, n.y, n.z).to_f32()).collect();
        match layout {
            IndexLayout::Triangles => {
                surface.indices = grid_triangles(self.u_count, self.v_count);
            }
            IndexLayout::Strips => {
                let (indices, lengths) = grid_strips(self.u_count, self.v_count);
                surface.topology = Topology::TriangleStrips;
                surface.indices = indices;
                surface.strip_lengths = lengths;
            }
        }
        surface
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strips_unroll_to_grid_triangles() {
        let mut grid = SampleGrid::parameters(2, 1).unwrap();
        grid.points = grid.params.iter().map(|p| Point3::new(p[0], p[1], 0.0)).collect();
        grid.normals = vec![Vec3::Z; grid.len()];
        let tris = grid.to_surface(RequestKind::Patch, IndexLayout::Triangles);
        let strips = grid.to_surface(RequestKind::Patch, IndexLayout::Strips);
        assert_eq!(tris.triangle_count(), 4);
        assert_eq!(strips.triangle_count(), 4);
        assert!(strips.validate().is_ok());

        let area = |s: &Surface| -> f32 {
            s.triangles()
                .iter()
                .map(|t| {
                    let [a, b, c] = t.map(|i| s.positions[i as usize]);
                    0.5 * ((b[0] - a[0]) * (c[1] - a[1]) - (b[1] - a[1]) * (c[0] - a[0]))
                })
                .sum()
        };
        assert!((area(&tris) - 1.0).abs() < 1e-6);
        assert!((area(&strips) - 1.0).abs() < 1e-6);
    }

    #[test]
    fn oversized_grids_are_refused() {
        assert_eq!(grid_len(2, 1), Some(6));
        assert_eq!(grid_len(usize::MAX, 1), None);
        assert_eq!(grid_len(1 << 20, 1 << 20), None);
        assert!(SampleGrid::parameters(1 << 20, 1 << 20).is_none());
        assert!(grid_len(MAX_RESOLUTION, MAX_RESOLUTION).is_some());
    }

    #[test]
    fn degenerate_normals_borrow_from_column() {
        let mut grid = SampleGrid::parameters(1, 2).unwrap();
        let up = (Vec3::new(1.0, 0.0, 0.0), Vec3::new(0.0, 1.0, 0.0));
        let flat = (Vec3::ZERO, Vec3::new(0.0, 1.0, 0.0));
        grid.set_normals(&[flat, flat, up, up, up, up], Vec3::new(1.0, 0.0, 0.0));
        assert_eq!(grid.normals[0], Vec3::Z);
        assert_eq!(grid.normals[1], Vec3::Z);
    }

    #[test]
    fn validate_rejects_short_vertex_vars() {
        let mut surface = Surface::new(RequestKind::Polygon, vec![[0.0; 3]; 3], vec![0, 1, 2]);
        surface.vars.insert(
            "Cs".into(),
            SurfaceVar::per_vertex(TypeKind::Color, 3, vec![1.0; 6]),
        );
        assert!(surface.validate().is_err());
    }
}
