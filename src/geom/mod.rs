mod core;
pub mod nurbs;
pub mod patch;
pub mod quadric;
mod surface;
mod triangulation;

pub use core::{Point3, Tolerance, Transform, Vec3, newell_normal};
pub use nurbs::{Influence, NuPatch, NurbsAxis, NurbsError, Segment, SegmentGrid, Span};
pub use patch::{Basis, PatchError, bicubic_blend, bicubic_grid, bilinear_at, bilinear_blend, bilinear_grid};
pub use quadric::{Quadric, QuadricError};
pub use surface::{IndexLayout, MAX_RESOLUTION, SampleGrid, Surface, SurfaceVar, Topology, grid_len};
pub use triangulation::{TriangulationError, grid_strips, grid_triangles, triangulate_polygon};

#[cfg(test)]
mod tests;
