//! Aantallen waarden per interpolatieklasse, per primitief.
//!
//! Alle functies zijn zuiver: ze rekenen alleen met de topologie-argumenten
//! van een primitief. Ongeldige topologie wordt vooraf door de aanroeper
//! afgewezen.

use crate::scene::StorageClass;

/// Verwachte aantal elementen per opslagklasse.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ValueCounts {
    pub constant: usize,
    pub uniform: usize,
    pub varying: usize,
    pub vertex: usize,
    pub facevarying: usize,
    pub facevertex: usize,
}

impl ValueCounts {
    #[must_use]
    pub const fn new(
        uniform: usize,
        varying: usize,
        vertex: usize,
        facevarying: usize,
        facevertex: usize,
    ) -> Self {
        Self {
            constant: 1,
            uniform,
            varying,
            vertex,
            facevarying,
            facevertex,
        }
    }

    #[must_use]
    pub const fn get(&self, class: StorageClass) -> usize {
        match class {
            StorageClass::Constant => self.constant,
            StorageClass::Uniform => self.uniform,
            StorageClass::Varying => self.varying,
            StorageClass::Vertex => self.vertex,
            StorageClass::FaceVarying => self.facevarying,
            StorageClass::FaceVertex => self.facevertex,
        }
    }
}

/// Sphere, Cone, Cylinder, Hyperboloid, Paraboloid, Disk en Torus.
#[must_use]
pub const fn quadric() -> ValueCounts {
    ValueCounts::new(1, 4, 4, 4, 4)
}

#[must_use]
pub const fn polygon(nvertices: usize) -> ValueCounts {
    ValueCounts::new(1, nvertices, nvertices, nvertices, nvertices)
}

/// `nverts` bevat het aantal vertices per lus.
#[must_use]
pub fn general_polygon(nverts: &[usize]) -> ValueCounts {
    polygon(nverts.iter().sum())
}

fn max_index_count(verts: &[usize]) -> usize {
    verts.iter().max().map_or(0, |m| m + 1)
}

#[must_use]
pub fn points_polygons(nverts: &[usize], verts: &[usize]) -> ValueCounts {
    let points = max_index_count(verts);
    let corners = nverts.iter().sum();
    ValueCounts::new(nverts.len(), points, points, corners, corners)
}

/// `nloops` per polygoon, `nverts` per lus.
#[must_use]
pub fn points_general_polygons(nloops: &[usize], nverts: &[usize], verts: &[usize]) -> ValueCounts {
    let points = max_index_count(verts);
    let corners = nverts.iter().sum();
    ValueCounts::new(nloops.len(), points, points, corners, corners)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PatchType {
    Bilinear,
    Bicubic,
}

impl PatchType {
    #[must_use]
    pub fn parse(name: &str) -> Option<Self> {
        match name {
            "bilinear" => Some(Self::Bilinear),
            "bicubic" => Some(Self::Bicubic),
            _ => None,
        }
    }

    /// Controlepunten per richting.
    #[must_use]
    pub const fn order(self) -> usize {
        match self {
            Self::Bilinear => 2,
            Self::Bicubic => 4,
        }
    }
}

#[must_use]
pub const fn patch(patch_type: PatchType) -> ValueCounts {
    match patch_type {
        PatchType::Bilinear => ValueCounts::new(1, 4, 4, 4, 4),
        PatchType::Bicubic => ValueCounts::new(1, 4, 16, 4, 16),
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Wrap {
    Periodic,
    NonPeriodic,
}

impl Wrap {
    #[must_use]
    pub fn parse(name: &str) -> Option<Self> {
        match name {
            "periodic" => Some(Self::Periodic),
            "nonperiodic" => Some(Self::NonPeriodic),
            _ => None,
        }
    }
}

/// Eén richting van een patch-mesh.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MeshAxis {
    pub points: usize,
    pub wrap: Wrap,
    pub step: usize,
}

impl MeshAxis {
    /// Aantal patches in deze richting, of `None` als het aantal punten niet
    /// past bij type, wrap en stap.
    #[must_use]
    pub fn patches(&self, patch_type: PatchType) -> Option<usize> {
        let n = self.points;
        match (patch_type, self.wrap) {
            (PatchType::Bilinear, Wrap::NonPeriodic) => (n >= 2).then(|| n - 1),
            (PatchType::Bilinear, Wrap::Periodic) => (n >= 2).then_some(n),
            (PatchType::Bicubic, Wrap::NonPeriodic) => {
                (self.step > 0 && n >= 4 && (n - 4) % self.step == 0)
                    .then(|| (n - 4) / self.step + 1)
            }
            (PatchType::Bicubic, Wrap::Periodic) => {
                (self.step > 0 && n >= 4 && n % self.step == 0).then(|| n / self.step)
            }
        }
    }

    /// Aantal verschillende parameterwaarden (varying) in deze richting.
    #[must_use]
    pub fn varying(&self, patch_type: PatchType) -> Option<usize> {
        let patches = self.patches(patch_type)?;
        Some(match self.wrap {
            Wrap::Periodic => patches,
            Wrap::NonPeriodic => patches + 1,
        })
    }
}

#[must_use]
pub fn patch_mesh(patch_type: PatchType, u: MeshAxis, v: MeshAxis) -> Option<ValueCounts> {
    let patches = u.patches(patch_type)? * v.patches(patch_type)?;
    let varying = u.varying(patch_type)? * v.varying(patch_type)?;
    let per_face = match patch_type {
        PatchType::Bilinear => 4,
        PatchType::Bicubic => 16,
    };
    Some(ValueCounts::new(
        patches,
        varying,
        u.points * v.points,
        patches * 4,
        patches * per_face,
    ))
}

/// Aantal knoopintervallen met lengte groter dan nul.
#[must_use]
pub fn nonzero_spans(npoints: usize, order: usize, knots: &[f32]) -> usize {
    if order == 0 || npoints < order || knots.len() < npoints + order {
        return 0;
    }
    (order - 1..npoints)
        .filter(|&i| knots[i + 1] > knots[i])
        .count()
}

#[must_use]
pub fn nu_patch(
    nu: usize,
    uorder: usize,
    uknot: &[f32],
    nv: usize,
    vorder: usize,
    vknot: &[f32],
) -> ValueCounts {
    let segments = nonzero_spans(nu, uorder, uknot) * nonzero_spans(nv, vorder, vknot);
    let varying = (nu + 2).saturating_sub(uorder) * (nv + 2).saturating_sub(vorder);
    ValueCounts::new(
        segments,
        varying,
        nu * nv,
        segments * 4,
        segments * uorder * vorder,
    )
}

/// `nverts` per vlak, `verts` de vlakindices.
#[must_use]
pub fn subdivision_mesh(nverts: &[usize], verts: &[usize]) -> ValueCounts {
    points_polygons(nverts, verts)
}

#[must_use]
pub const fn points(npoints: usize) -> ValueCounts {
    ValueCounts::new(1, npoints, npoints, npoints, npoints)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CurveType {
    Linear,
    Cubic,
}

impl CurveType {
    #[must_use]
    pub fn parse(name: &str) -> Option<Self> {
        match name {
            "linear" => Some(Self::Linear),
            "cubic" => Some(Self::Cubic),
            _ => None,
        }
    }
}

/// Aantal segmenten en varying-waarden van één curve.
#[must_use]
pub fn curve_segments(
    curve_type: CurveType,
    nvertices: usize,
    wrap: Wrap,
    vstep: usize,
) -> Option<(usize, usize)> {
    match (curve_type, wrap) {
        (CurveType::Linear, Wrap::NonPeriodic) => {
            (nvertices >= 2).then(|| (nvertices - 1, nvertices))
        }
        (CurveType::Linear, Wrap::Periodic) => (nvertices >= 2).then_some((nvertices, nvertices)),
        (CurveType::Cubic, Wrap::NonPeriodic) => (vstep > 0
            && nvertices >= 4
            && (nvertices - 4) % vstep == 0)
            .then(|| {
                let segments = (nvertices - 4) / vstep + 1;
                (segments, segments + 1)
            }),
        (CurveType::Cubic, Wrap::Periodic) => (vstep > 0
            && nvertices >= 4
            && nvertices % vstep == 0)
            .then(|| (nvertices / vstep, nvertices / vstep)),
    }
}

#[must_use]
pub fn curves(
    curve_type: CurveType,
    nvertices: &[usize],
    wrap: Wrap,
    vstep: usize,
) -> Option<ValueCounts> {
    let mut varying = 0;
    for &n in nvertices {
        varying += curve_segments(curve_type, n, wrap, vstep)?.1;
    }
    let vertex = nvertices.iter().sum();
    Some(ValueCounts::new(nvertices.len(), varying, vertex, varying, vertex))
}

#[must_use]
pub const fn blobby(nleaf: usize) -> ValueCounts {
    ValueCounts::new(1, nleaf, nleaf, nleaf, nleaf)
}
