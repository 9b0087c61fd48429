//! Primitieven: positionele argumenten lezen, primitieve variabelen binden
//! en het resultaat tesselleren tot [`Surface`]-waarden.
//!
//! Een primitief met ongeldige argumenten levert een fout en geen enkel
//! oppervlak op.

use std::fmt;

use crate::geom::{
    Basis, IndexLayout, NuPatch, NurbsAxis, NurbsError, PatchError, Point3, Quadric,
    QuadricError, Surface, SurfaceVar, Tolerance, TriangulationError, Vec3, bicubic_blend,
    bicubic_grid, bilinear_at, bilinear_blend, bilinear_grid, newell_normal,
    triangulate_polygon,
};
use crate::scene::{
    Args, BasicType, DeclarationDictionary, ErrorKind, Request, RequestKind, RiError, StorageClass,
    TokenValue, TypeKind,
};
use crate::vars::counts::{self, CurveType, MeshAxis, PatchType, Wrap};
use crate::vars::{BoundVar, FaceSelection, PrimVars};

use super::state::Attributes;

/// Variabelen die de geometrie zelf beschrijven en niet als attribuut
/// meegaan.
const GEOMETRIC: [&str; 5] = ["P", "Pw", "Pz", "N", "Np"];

/// Hoeken van een patch in blendvolgorde: `(0,0) (1,0) (0,1) (1,1)`.
const CORNERS: [(usize, usize); 4] = [(0, 0), (1, 0), (0, 1), (1, 1)];

/// Wat een primitief uit de sessie nodig heeft.
pub struct Context<'a> {
    pub dict: &'a mut DeclarationDictionary,
    pub attributes: &'a Attributes,
    pub layout: IndexLayout,
    pub tolerance: Tolerance,
}

/// Uitkomst van één primitief.
#[derive(Debug)]
pub enum Tessellated {
    Surfaces(Vec<Surface>),
    /// Gevalideerd en gebonden, maar niet getesselleerd.
    Unsupported(PrimVars),
    /// Doorgegeven zonder uitvoer.
    Deferred,
}

/// Foutsoort waarmee een geometriefout gerapporteerd wordt.
trait Classify: fmt::Display {
    fn error_kind(&self) -> ErrorKind;
}

impl Classify for TriangulationError {
    fn error_kind(&self) -> ErrorKind {
        match self {
            Self::LoopMismatch { .. } | Self::NoBridge(_) | Self::NoEar(_) => {
                ErrorKind::Consistency
            }
            Self::TooFewVertices { .. } | Self::NonFinite | Self::Degenerate => ErrorKind::Range,
        }
    }
}

impl Classify for QuadricError {
    fn error_kind(&self) -> ErrorKind {
        match self {
            Self::TooLarge(..) => ErrorKind::OutOfMemory,
            _ => ErrorKind::Range,
        }
    }
}

impl Classify for PatchError {
    fn error_kind(&self) -> ErrorKind {
        match self {
            Self::ControlCount { .. } => ErrorKind::Consistency,
            Self::UnknownBasis(_) => ErrorKind::BadToken,
            Self::Resolution | Self::Width | Self::Step => ErrorKind::Range,
            Self::TooLarge(..) => ErrorKind::OutOfMemory,
        }
    }
}

impl Classify for NurbsError {
    fn error_kind(&self) -> ErrorKind {
        match self {
            Self::KnotCount { .. } | Self::ControlCount { .. } => ErrorKind::Consistency,
            Self::Order { .. }
            | Self::NonMonotonic { .. }
            | Self::Range { .. }
            | Self::Weight(_)
            | Self::Resolution => ErrorKind::Range,
            Self::TooLarge(..) => ErrorKind::OutOfMemory,
        }
    }
}

fn reject<E: Classify>(kind: RequestKind) -> impl Fn(E) -> RiError {
    move |err| RiError::new(err.error_kind(), format!("{}: {err}", kind.name()))
}

fn inconsistent(kind: RequestKind, message: impl fmt::Display) -> RiError {
    RiError::new(ErrorKind::Consistency, format!("{}: {message}", kind.name()))
}

fn unknown_word(kind: RequestKind, what: &str, word: &str) -> RiError {
    RiError::new(ErrorKind::BadToken, format!("{}: unknown {what} \"{word}\"", kind.name()))
}

fn count_arg(kind: RequestKind, args: &mut Args<'_>, what: &str) -> Result<usize, RiError> {
    let value = args.int()?;
    usize::try_from(value).ok().filter(|&n| n > 0).ok_or_else(|| {
        RiError::new(
            ErrorKind::Range,
            format!("{}: {what} must be positive, found {value}", kind.name()),
        )
    })
}

/// Leest, bindt en tesselleert één geometrisch request.
pub fn tessellate(request: &Request, ctx: &mut Context<'_>) -> Result<Tessellated, RiError> {
    let kind = request.kind;
    let args = Args::new(kind, &request.params);
    match kind {
        RequestKind::Polygon => polygon(args, ctx),
        RequestKind::GeneralPolygon => general_polygon(args, ctx),
        RequestKind::PointsPolygons => points_polygons(args, ctx),
        RequestKind::PointsGeneralPolygons => points_general_polygons(args, ctx),
        RequestKind::SubdivisionMesh => subdivision_mesh(args, ctx),
        RequestKind::Patch => patch(args, ctx),
        RequestKind::PatchMesh => patch_mesh(args, ctx),
        RequestKind::NuPatch => nu_patch(args, ctx),
        RequestKind::Sphere
        | RequestKind::Cone
        | RequestKind::Cylinder
        | RequestKind::Hyperboloid
        | RequestKind::Paraboloid
        | RequestKind::Disk
        | RequestKind::Torus => quadric(kind, args, ctx),
        RequestKind::Points => points(args, ctx),
        RequestKind::Curves => curves(args, ctx),
        RequestKind::Blobby => blobby(args, ctx),
        _ => Ok(Tessellated::Deferred),
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Gedeelde hulpfuncties
// ─────────────────────────────────────────────────────────────────────────────

/// Aantal punten volgens de `P`- of `Pw`-parameter, voor primitieven waarvan
/// de topologie niet uit de positionele argumenten volgt.
fn point_count(dict: &mut DeclarationDictionary, list: &[TokenValue<'_>]) -> Option<usize> {
    list.iter().find_map(|pair| {
        let id = dict.resolve(pair.token).ok()?;
        let width = match dict.get(id).name.as_str() {
            "P" => 3,
            "Pw" => 4,
            _ => return None,
        };
        Some(pair.value.len() / width)
    })
}

/// Homogene posities `(wx, wy, wz, w)` uit `P` of `Pw`.
fn homogeneous(kind: RequestKind, vars: &PrimVars) -> Result<Vec<[f64; 4]>, RiError> {
    if let Some(p) = vars.get("P").filter(|v| v.width == 3) {
        return Ok(p
            .floats()
            .chunks_exact(3)
            .map(|c| [c[0], c[1], c[2], 1.0])
            .collect());
    }
    if let Some(pw) = vars.get("Pw").filter(|v| v.width == 4) {
        return Ok(pw
            .floats()
            .chunks_exact(4)
            .map(|c| [c[0], c[1], c[2], c[3]])
            .collect());
    }
    Err(RiError::new(
        ErrorKind::MissingData,
        format!("{}: \"P\" or \"Pw\" is required", kind.name()),
    ))
}

fn positions(kind: RequestKind, vars: &PrimVars) -> Result<Vec<Point3>, RiError> {
    homogeneous(kind, vars)?
        .into_iter()
        .enumerate()
        .map(|(index, [x, y, z, w])| {
            if w == 0.0 {
                return Err(RiError::new(
                    ErrorKind::Range,
                    format!("{}: point {index} has weight zero", kind.name()),
                ));
            }
            Ok(Point3::new(x / w, y / w, z / w))
        })
        .collect()
}

/// Zet de variabelen van één vlak of patch op `surface`. Constante en
/// uniforme waarden gaan ongewijzigd mee; `blend` verdeelt de overige
/// klassen over de vertices van het oppervlak.
fn carry(
    surface: &mut Surface,
    vars: &PrimVars,
    mut blend: impl FnMut(&BoundVar) -> Result<Vec<f64>, RiError>,
) -> Result<(), RiError> {
    for var in vars.iter().filter(|v| !GEOMETRIC.contains(&v.name.as_str())) {
        let carried = match var.class {
            StorageClass::Constant | StorageClass::Uniform => {
                SurfaceVar::constant(var.kind, var.width, var.values.clone())
            }
            _ if var.kind == TypeKind::String => {
                log::debug!("{:?}: skipping interpolated string \"{}\"", surface.primitive, var.name);
                continue;
            }
            _ => SurfaceVar::per_vertex(var.kind, var.width, blend(var)?),
        };
        surface.vars.insert(var.name.clone(), carried);
    }
    Ok(())
}

/// Blendt vier hoekwaarden bilineair en zestien controlewaarden bicubisch.
fn patch_blend(
    kind: RequestKind,
    u_basis: Basis,
    v_basis: Basis,
    tu: usize,
    tv: usize,
) -> impl FnMut(&BoundVar) -> Result<Vec<f64>, RiError> {
    move |var| {
        let values = var.floats();
        let blended = if var.count() == 16 {
            bicubic_blend(&values, var.width, &u_basis, &v_basis, tu, tv)
        } else {
            bilinear_blend(&values, var.width, tu, tv)
        };
        blended.map_err(reject(kind))
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Polygonen
// ─────────────────────────────────────────────────────────────────────────────

/// Eén polygoon uit een primitief.
struct Face<'a> {
    index: usize,
    /// Vertices per lus; de eerste lus is de buitenrand.
    loops: &'a [usize],
    /// Puntindices van alle hoeken, lus na lus.
    corners: &'a [usize],
    /// Eerste hoek binnen het primitief, voor facevarying-waarden.
    offset: usize,
}

fn face_surface(kind: RequestKind, vars: &PrimVars, face: &Face<'_>, tolerance: Tolerance) -> Result<Surface, RiError> {
    let n = face.corners.len();
    let selected = vars.select(&FaceSelection {
        uniform: face.index,
        varying: face.corners,
        vertex: face.corners,
        facevarying: (face.offset, n),
        facevertex: (face.offset, n),
    });
    let points = positions(kind, &selected)?;
    let triangles = triangulate_polygon(&points, face.loops, tolerance).map_err(reject(kind))?;
    let mut surface = Surface::new(
        kind,
        points.iter().map(|p| p.to_f32()).collect(),
        triangles.into_iter().flatten().collect(),
    );
    surface.normals = match (selected.get("N"), selected.get("Np")) {
        (Some(normals), _) if normals.width == 3 => normals
            .floats()
            .chunks_exact(3)
            .map(|c| [c[0] as f32, c[1] as f32, c[2] as f32])
            .collect(),
        (_, Some(normal)) if normal.width == 3 => {
            let c = normal.floats();
            vec![[c[0] as f32, c[1] as f32, c[2] as f32]; n]
        }
        _ => {
            let outer = face.loops.first().copied().unwrap_or(n).min(n);
            let normal = newell_normal(&points[..outer]).normalized().unwrap_or(Vec3::Z);
            vec![normal.to_array().map(|c| c as f32); n]
        }
    };
    carry(&mut surface, &selected, |var| Ok(var.floats()))?;
    Ok(surface)
}

fn polygon(args: Args<'_>, ctx: &mut Context<'_>) -> Result<Tessellated, RiError> {
    let kind = RequestKind::Polygon;
    let list = args.token_list()?;
    let n = point_count(ctx.dict, &list).unwrap_or(0);
    let vars = PrimVars::bind(ctx.dict, &list, &counts::polygon(n))?;
    let corners: Vec<usize> = (0..n).collect();
    let face = Face {
        index: 0,
        loops: &[n],
        corners: &corners,
        offset: 0,
    };
    Ok(Tessellated::Surfaces(vec![face_surface(kind, &vars, &face, ctx.tolerance)?]))
}

fn general_polygon(mut args: Args<'_>, ctx: &mut Context<'_>) -> Result<Tessellated, RiError> {
    let kind = RequestKind::GeneralPolygon;
    let nverts = args.count_array()?;
    let list = args.token_list()?;
    let vars = PrimVars::bind(ctx.dict, &list, &counts::general_polygon(&nverts))?;
    let corners: Vec<usize> = (0..nverts.iter().sum()).collect();
    let face = Face {
        index: 0,
        loops: &nverts,
        corners: &corners,
        offset: 0,
    };
    Ok(Tessellated::Surfaces(vec![face_surface(kind, &vars, &face, ctx.tolerance)?]))
}

/// Eén oppervlak per vlak; elk vlak heeft precies één lus.
fn simple_faces(
    kind: RequestKind,
    vars: &PrimVars,
    nverts: &[usize],
    verts: &[usize],
    tolerance: Tolerance,
) -> Result<Vec<Surface>, RiError> {
    if nverts.iter().sum::<usize>() != verts.len() {
        return Err(inconsistent(
            kind,
            format!("{} vertex indices for {} face corners", verts.len(), nverts.iter().sum::<usize>()),
        ));
    }
    let mut surfaces = Vec::with_capacity(nverts.len());
    let mut offset = 0;
    for (index, n) in nverts.iter().enumerate() {
        let face = Face {
            index,
            loops: std::slice::from_ref(n),
            corners: &verts[offset..offset + n],
            offset,
        };
        surfaces.push(face_surface(kind, vars, &face, tolerance)?);
        offset += n;
    }
    Ok(surfaces)
}

fn points_polygons(mut args: Args<'_>, ctx: &mut Context<'_>) -> Result<Tessellated, RiError> {
    let kind = RequestKind::PointsPolygons;
    let nverts = args.count_array()?;
    let verts = args.count_array()?;
    let list = args.token_list()?;
    let vars = PrimVars::bind(ctx.dict, &list, &counts::points_polygons(&nverts, &verts))?;
    Ok(Tessellated::Surfaces(simple_faces(kind, &vars, &nverts, &verts, ctx.tolerance)?))
}

fn points_general_polygons(mut args: Args<'_>, ctx: &mut Context<'_>) -> Result<Tessellated, RiError> {
    let kind = RequestKind::PointsGeneralPolygons;
    let nloops = args.count_array()?;
    let nverts = args.count_array()?;
    let verts = args.count_array()?;
    let list = args.token_list()?;
    if nloops.iter().sum::<usize>() != nverts.len() {
        return Err(inconsistent(
            kind,
            format!("{} loop sizes for {} loops", nverts.len(), nloops.iter().sum::<usize>()),
        ));
    }
    if nverts.iter().sum::<usize>() != verts.len() {
        return Err(inconsistent(
            kind,
            format!("{} vertex indices for {} loop corners", verts.len(), nverts.iter().sum::<usize>()),
        ));
    }
    let counts = counts::points_general_polygons(&nloops, &nverts, &verts);
    let vars = PrimVars::bind(ctx.dict, &list, &counts)?;
    let mut surfaces = Vec::with_capacity(nloops.len());
    let (mut first_loop, mut offset) = (0, 0);
    for (index, &loops) in nloops.iter().enumerate() {
        let sizes = &nverts[first_loop..first_loop + loops];
        let corners = sizes.iter().sum::<usize>();
        let face = Face {
            index,
            loops: sizes,
            corners: &verts[offset..offset + corners],
            offset,
        };
        surfaces.push(face_surface(kind, &vars, &face, ctx.tolerance)?);
        first_loop += loops;
        offset += corners;
    }
    Ok(Tessellated::Surfaces(surfaces))
}

/// Controleveelvlak van een subdivision mesh; de verfijning zelf wordt niet
/// uitgevoerd.
fn subdivision_mesh(mut args: Args<'_>, ctx: &mut Context<'_>) -> Result<Tessellated, RiError> {
    let kind = RequestKind::SubdivisionMesh;
    let scheme = args.string()?;
    let nverts = args.count_array()?;
    let verts = args.count_array()?;
    // Tags zijn aanwezig als er een array volgt in plaats van een token.
    let has_tags = args
        .peek()
        .is_some_and(|p| p.is_array && (p.is_empty() || p.basic_type() == BasicType::String));
    if has_tags {
        let tags = args.string_array()?;
        let nargs = args.count_array()?;
        let intargs = args.int_array()?;
        let floatargs = args.float_array()?;
        if nargs.len() != tags.len() * 2 {
            return Err(inconsistent(
                kind,
                format!("{} argument counts for {} tags", nargs.len(), tags.len()),
            ));
        }
        let ints: usize = nargs.iter().step_by(2).sum();
        let floats: usize = nargs.iter().skip(1).step_by(2).sum();
        if ints != intargs.len() || floats != floatargs.len() {
            return Err(inconsistent(
                kind,
                format!(
                    "tags need {ints} integer and {floats} float arguments, found {} and {}",
                    intargs.len(),
                    floatargs.len()
                ),
            ));
        }
    }
    let list = args.token_list()?;
    let vars = PrimVars::bind(ctx.dict, &list, &counts::subdivision_mesh(&nverts, &verts))?;
    log::debug!("SubdivisionMesh \"{scheme}\": emitting control hull of {} faces", nverts.len());
    Ok(Tessellated::Surfaces(simple_faces(kind, &vars, &nverts, &verts, ctx.tolerance)?))
}

// ─────────────────────────────────────────────────────────────────────────────
// Quadrics
// ─────────────────────────────────────────────────────────────────────────────

fn quadric(kind: RequestKind, mut args: Args<'_>, ctx: &mut Context<'_>) -> Result<Tessellated, RiError> {
    let shape = match kind {
        RequestKind::Sphere => {
            let [radius, zmin, zmax, thetamax] = args.floats::<4>()?.map(f64::from);
            Quadric::Sphere { radius, zmin, zmax, thetamax }
        }
        RequestKind::Cone => {
            let [height, radius, thetamax] = args.floats::<3>()?.map(f64::from);
            Quadric::Cone { height, radius, thetamax }
        }
        RequestKind::Cylinder => {
            let [radius, zmin, zmax, thetamax] = args.floats::<4>()?.map(f64::from);
            Quadric::Cylinder { radius, zmin, zmax, thetamax }
        }
        RequestKind::Hyperboloid => {
            let v = args.floats::<7>()?.map(f64::from);
            Quadric::Hyperboloid {
                p1: Point3::new(v[0], v[1], v[2]),
                p2: Point3::new(v[3], v[4], v[5]),
                thetamax: v[6],
            }
        }
        RequestKind::Paraboloid => {
            let [rmax, zmin, zmax, thetamax] = args.floats::<4>()?.map(f64::from);
            Quadric::Paraboloid { rmax, zmin, zmax, thetamax }
        }
        RequestKind::Disk => {
            let [height, radius, thetamax] = args.floats::<3>()?.map(f64::from);
            Quadric::Disk { height, radius, thetamax }
        }
        _ => {
            let [rmajor, rminor, phimin, phimax, thetamax] = args.floats::<5>()?.map(f64::from);
            Quadric::Torus { rmajor, rminor, phimin, phimax, thetamax }
        }
    };
    let list = args.token_list()?;
    let vars = PrimVars::bind(ctx.dict, &list, &counts::quadric())?;
    let (tu, tv) = ctx.attributes.tessellation;
    let grid = shape.sample(tu, tv).map_err(reject(kind))?;
    let mut surface = grid.to_surface(kind, ctx.layout);
    carry(&mut surface, &vars, patch_blend(kind, Basis::BEZIER, Basis::BEZIER, tu, tv))?;
    Ok(Tessellated::Surfaces(vec![surface]))
}

// ─────────────────────────────────────────────────────────────────────────────
// Patches
// ─────────────────────────────────────────────────────────────────────────────

fn patch_type(kind: RequestKind, args: &mut Args<'_>) -> Result<PatchType, RiError> {
    let name = args.string()?;
    PatchType::parse(name).ok_or_else(|| unknown_word(kind, "patch type", name))
}

fn wrap(kind: RequestKind, args: &mut Args<'_>) -> Result<Wrap, RiError> {
    let name = args.string()?;
    Wrap::parse(name).ok_or_else(|| unknown_word(kind, "wrap mode", name))
}

/// Oppervlak van één patch uit zijn controlepunten, in rijen langs u.
fn patch_surface(
    kind: RequestKind,
    patch_type: PatchType,
    control: &[Point3],
    selected: &PrimVars,
    ctx: &Context<'_>,
) -> Result<Surface, RiError> {
    let Attributes {
        u_basis,
        v_basis,
        tessellation: (tu, tv),
        ..
    } = *ctx.attributes;
    let grid = match patch_type {
        PatchType::Bilinear => {
            let corners: [Point3; 4] = control.try_into().map_err(|_| {
                inconsistent(kind, format!("bilinear patch needs 4 points, found {}", control.len()))
            })?;
            bilinear_grid(&corners, tu, tv)
        }
        PatchType::Bicubic => bicubic_grid(control, &u_basis, &v_basis, tu, tv),
    }
    .map_err(reject(kind))?;
    let mut surface = grid.to_surface(kind, ctx.layout);
    carry(&mut surface, selected, patch_blend(kind, u_basis, v_basis, tu, tv))?;
    Ok(surface)
}

fn patch(mut args: Args<'_>, ctx: &mut Context<'_>) -> Result<Tessellated, RiError> {
    let kind = RequestKind::Patch;
    let patch_type = patch_type(kind, &mut args)?;
    let list = args.token_list()?;
    let vars = PrimVars::bind(ctx.dict, &list, &counts::patch(patch_type))?;
    let control = positions(kind, &vars)?;
    Ok(Tessellated::Surfaces(vec![patch_surface(kind, patch_type, &control, &vars, ctx)?]))
}

fn patch_mesh(mut args: Args<'_>, ctx: &mut Context<'_>) -> Result<Tessellated, RiError> {
    let kind = RequestKind::PatchMesh;
    let patch_type = patch_type(kind, &mut args)?;
    let nu = count_arg(kind, &mut args, "nu")?;
    let u_wrap = wrap(kind, &mut args)?;
    let nv = count_arg(kind, &mut args, "nv")?;
    let v_wrap = wrap(kind, &mut args)?;
    let list = args.token_list()?;

    let (u_step, v_step) = match patch_type {
        PatchType::Bilinear => (1, 1),
        PatchType::Bicubic => (ctx.attributes.u_basis.step, ctx.attributes.v_basis.step),
    };
    let u = MeshAxis { points: nu, wrap: u_wrap, step: u_step };
    let v = MeshAxis { points: nv, wrap: v_wrap, step: v_step };
    let shape = (u.patches(patch_type), v.patches(patch_type), u.varying(patch_type), v.varying(patch_type));
    let (Some(patches_u), Some(patches_v), Some(varying_u), Some(varying_v)) = shape else {
        return Err(inconsistent(
            kind,
            format!("{nu}x{nv} points do not form whole patches with steps {u_step}x{v_step}"),
        ));
    };
    let counts = counts::patch_mesh(patch_type, u, v)
        .ok_or_else(|| inconsistent(kind, "patch counts are inconsistent"))?;
    let vars = PrimVars::bind(ctx.dict, &list, &counts)?;
    let points = positions(kind, &vars)?;

    let order = patch_type.order();
    let per_face = order * order;
    let mut surfaces = Vec::with_capacity(patches_u * patches_v);
    for j in 0..patches_v {
        for i in 0..patches_u {
            let index = j * patches_u + i;
            let control: Vec<usize> = (0..order)
                .flat_map(|r| (0..order).map(move |c| ((j * v_step + r) % nv) * nu + (i * u_step + c) % nu))
                .collect();
            let corners = CORNERS.map(|(a, b)| ((j + b) % varying_v) * varying_u + (i + a) % varying_u);
            let selected = vars.select(&FaceSelection {
                uniform: index,
                varying: &corners,
                vertex: &control,
                facevarying: (index * 4, 4),
                facevertex: (index * per_face, per_face),
            });
            let control_points: Vec<Point3> = control.iter().map(|&k| points[k]).collect();
            surfaces.push(patch_surface(kind, patch_type, &control_points, &selected, ctx)?);
        }
    }
    Ok(Tessellated::Surfaces(surfaces))
}

fn nurbs_axis(kind: RequestKind, args: &mut Args<'_>, axis: &str) -> Result<NurbsAxis, RiError> {
    let count = count_arg(kind, args, &format!("n{axis}"))?;
    let order = count_arg(kind, args, &format!("{axis}order"))?;
    let knots = args.float_array()?.into_iter().map(f64::from).collect();
    let [min, max] = args.floats::<2>()?.map(f64::from);
    Ok(NurbsAxis { count, order, knots, min, max })
}

fn nu_patch(mut args: Args<'_>, ctx: &mut Context<'_>) -> Result<Tessellated, RiError> {
    let kind = RequestKind::NuPatch;
    let u = nurbs_axis(kind, &mut args, "u")?;
    let v = nurbs_axis(kind, &mut args, "v")?;
    let list = args.token_list()?;
    let knots = |axis: &NurbsAxis| axis.knots.iter().map(|&k| k as f32).collect::<Vec<f32>>();
    let counts = counts::nu_patch(u.count, u.order, &knots(&u), v.count, v.order, &knots(&v));
    let vars = PrimVars::bind(ctx.dict, &list, &counts)?;
    let patch = NuPatch::new(u, v, homogeneous(kind, &vars)?).map_err(reject(kind))?;

    let (nu, p, q) = (patch.u.count, patch.u.order - 1, patch.v.order - 1);
    // Varying-waarden liggen op de knopen `degree..=count`.
    let varying_u = nu - p + 1;
    let per_face = patch.u.order * patch.v.order;
    let (tu, tv) = ctx.attributes.tessellation;
    let mut surfaces = Vec::new();
    for segment in patch.segments() {
        let (ku, kv) = (segment.u.knot - p, segment.v.knot - q);
        let control: Vec<usize> = (0..=q)
            .flat_map(|b| (0..=p).map(move |a| (kv + b) * nu + ku + a))
            .collect();
        let corners = CORNERS.map(|(a, b)| (kv + b) * varying_u + ku + a);
        let selected = vars.select(&FaceSelection {
            uniform: segment.index,
            varying: &corners,
            vertex: &control,
            facevarying: (segment.index * 4, 4),
            facevertex: (segment.index * per_face, per_face),
        });
        let sampled = patch.segment_grid(&segment, tu, tv).map_err(reject(kind))?;
        let mut surface = sampled.grid.to_surface(kind, ctx.layout);
        carry(&mut surface, &selected, |var| {
            let values = var.floats();
            let width = var.width;
            let mut out: Vec<f64> = Vec::with_capacity(sampled.grid.len() * width);
            match var.class {
                StorageClass::Varying | StorageClass::FaceVarying => {
                    for &[s, t] in &sampled.span_params {
                        bilinear_at(&values, width, s, t, &mut out);
                    }
                }
                _ => {
                    for influences in &sampled.influences {
                        for k in 0..width {
                            out.push(
                                influences
                                    .iter()
                                    .map(|i| i.weight * values[i.local * width + k])
                                    .sum::<f64>(),
                            );
                        }
                    }
                }
            }
            Ok(out)
        })?;
        surfaces.push(surface);
    }
    Ok(Tessellated::Surfaces(surfaces))
}

// ─────────────────────────────────────────────────────────────────────────────
// Niet-getesselleerde primitieven
// ─────────────────────────────────────────────────────────────────────────────

fn points(args: Args<'_>, ctx: &mut Context<'_>) -> Result<Tessellated, RiError> {
    let list = args.token_list()?;
    let n = point_count(ctx.dict, &list).unwrap_or(0);
    let vars = PrimVars::bind(ctx.dict, &list, &counts::points(n))?;
    positions(RequestKind::Points, &vars)?;
    Ok(Tessellated::Unsupported(vars))
}

fn curves(mut args: Args<'_>, ctx: &mut Context<'_>) -> Result<Tessellated, RiError> {
    let kind = RequestKind::Curves;
    let name = args.string()?;
    let curve_type = CurveType::parse(name).ok_or_else(|| unknown_word(kind, "curve type", name))?;
    let nvertices = args.count_array()?;
    let wrap = wrap(kind, &mut args)?;
    let list = args.token_list()?;
    let counts = counts::curves(curve_type, &nvertices, wrap, ctx.attributes.v_basis.step)
        .ok_or_else(|| inconsistent(kind, format!("vertex counts {nvertices:?} do not fit {name} curves")))?;
    let vars = PrimVars::bind(ctx.dict, &list, &counts)?;
    positions(kind, &vars)?;
    Ok(Tessellated::Unsupported(vars))
}

fn blobby(mut args: Args<'_>, ctx: &mut Context<'_>) -> Result<Tessellated, RiError> {
    let kind = RequestKind::Blobby;
    let nleaf = args.int()?;
    let nleaf = usize::try_from(nleaf).map_err(|_| {
        RiError::new(ErrorKind::Range, format!("{}: negative leaf count {nleaf}", kind.name()))
    })?;
    let code = args.int_array()?;
    let _floats = args.float_array()?;
    let _strings = args.string_array()?;
    if code.is_empty() && nleaf > 0 {
        return Err(RiError::new(
            ErrorKind::MissingData,
            format!("{}: {nleaf} leaves without code", kind.name()),
        ));
    }
    let list = args.token_list()?;
    let vars = PrimVars::bind(ctx.dict, &list, &counts::blobby(nleaf))?;
    Ok(Tessellated::Unsupported(vars))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geom::Topology;
    use crate::scene::{Parameter, Values};

    fn context<'a>(dict: &'a mut DeclarationDictionary, attributes: &'a Attributes) -> Context<'a> {
        Context {
            dict,
            attributes,
            layout: IndexLayout::Triangles,
            tolerance: Tolerance::DEFAULT,
        }
    }

    fn run(kind: RequestKind, params: Vec<Parameter>, attributes: &Attributes) -> Result<Tessellated, RiError> {
        let mut dict = DeclarationDictionary::with_defaults();
        let mut ctx = context(&mut dict, attributes);
        tessellate(&Request::new(kind, params), &mut ctx)
    }

    fn surfaces(result: Result<Tessellated, RiError>) -> Vec<Surface> {
        match result.unwrap() {
            Tessellated::Surfaces(surfaces) => surfaces,
            other => panic!("expected surfaces, got {other:?}"),
        }
    }

    fn square() -> Vec<f32> {
        vec![0.0, 0.0, 0.0, 1.0, 0.0, 0.0, 1.0, 1.0, 0.0, 0.0, 1.0, 0.0]
    }

    #[test]
    fn polygon_carries_varying_color_per_vertex() {
        let attributes = Attributes::new(3, (4, 4));
        let params = vec![
            Parameter::string("P"),
            Parameter::floats(square()),
            Parameter::string("Cs"),
            Parameter::floats(vec![1.0, 0.0, 0.0, 0.0, 1.0, 0.0, 0.0, 0.0, 1.0, 1.0, 1.0, 1.0]),
        ];
        let out = surfaces(run(RequestKind::Polygon, params, &attributes));
        assert_eq!(out.len(), 1);
        let surface = &out[0];
        assert_eq!(surface.triangle_count(), 2);
        assert_eq!(surface.normals[0], [0.0, 0.0, 1.0]);
        let cs = surface.var("Cs").unwrap();
        assert!(cs.per_vertex);
        assert_eq!(cs.count(), 4);
        assert!(surface.validate().is_ok());
    }

    #[test]
    fn polygon_with_wrong_color_count_is_rejected() {
        let attributes = Attributes::new(3, (4, 4));
        let params = vec![
            Parameter::string("P"),
            Parameter::floats(square()),
            Parameter::string("Cs"),
            Parameter::floats(vec![1.0; 9]),
        ];
        let err = run(RequestKind::Polygon, params, &attributes).unwrap_err();
        assert_eq!(err.kind, ErrorKind::Consistency);
    }

    #[test]
    fn points_polygons_select_uniform_values_per_face() {
        let attributes = Attributes::new(3, (4, 4));
        let mut p = square();
        p.extend([2.0, 0.0, 0.0]);
        let params = vec![
            Parameter::ints(vec![4, 3]),
            Parameter::ints(vec![0, 1, 2, 3, 1, 4, 2]),
            Parameter::string("P"),
            Parameter::floats(p),
            Parameter::string("uniform float id"),
            Parameter::floats(vec![7.0, 9.0]),
        ];
        let out = surfaces(run(RequestKind::PointsPolygons, params, &attributes));
        assert_eq!(out.len(), 2);
        assert_eq!(out[0].triangle_count(), 2);
        assert_eq!(out[1].triangle_count(), 1);
        let id = out[1].var("id").unwrap();
        assert!(!id.per_vertex);
        assert_eq!(id.values, Values::Floats(vec![9.0]));
        assert_eq!(out[1].positions[1], [2.0, 0.0, 0.0]);
    }

    #[test]
    fn general_polygon_with_hole() {
        let attributes = Attributes::new(3, (4, 4));
        let p = vec![
            0.0, 0.0, 0.0, 4.0, 0.0, 0.0, 4.0, 4.0, 0.0, 0.0, 4.0, 0.0, //
            1.0, 1.0, 0.0, 1.0, 3.0, 0.0, 3.0, 3.0, 0.0, 3.0, 1.0, 0.0,
        ];
        let params = vec![Parameter::ints(vec![4, 4]), Parameter::string("P"), Parameter::floats(p)];
        let out = surfaces(run(RequestKind::GeneralPolygon, params, &attributes));
        assert_eq!(out[0].triangle_count(), 8);
    }

    #[test]
    fn sphere_blends_corner_colors() {
        let attributes = Attributes::new(3, (4, 2));
        let params = vec![
            Parameter::floats(vec![1.0, -1.0, 1.0, 360.0]),
            Parameter::string("Cs"),
            Parameter::floats(vec![0.0, 0.0, 0.0, 1.0, 1.0, 1.0, 0.0, 0.0, 0.0, 1.0, 1.0, 1.0]),
        ];
        let out = surfaces(run(RequestKind::Sphere, params, &attributes));
        let surface = &out[0];
        assert_eq!(surface.vertex_count(), 15);
        let Values::Floats(cs) = &surface.var("Cs").unwrap().values else {
            panic!("colors are floats");
        };
        // Second sample of the first row sits at u = 0.25.
        assert!((cs[3] - 0.25).abs() < 1e-6);
    }

    #[test]
    fn invalid_sphere_produces_no_surface() {
        let attributes = Attributes::new(3, (4, 4));
        let err = run(RequestKind::Sphere, vec![Parameter::floats(vec![0.0, -1.0, 1.0, 360.0])], &attributes)
            .unwrap_err();
        assert_eq!(err.kind, ErrorKind::Range);
    }

    #[test]
    fn unindexable_grid_is_out_of_memory() {
        let attributes = Attributes::new(3, (1 << 20, 1 << 20));
        let sphere = vec![Parameter::floats(vec![1.0, -1.0, 1.0, 360.0])];
        let err = run(RequestKind::Sphere, sphere, &attributes).unwrap_err();
        assert_eq!(err.kind, ErrorKind::OutOfMemory);
    }

    #[test]
    fn strips_layout_reaches_quadrics() {
        let attributes = Attributes::new(3, (5, 3));
        let mut dict = DeclarationDictionary::with_defaults();
        let mut ctx = context(&mut dict, &attributes);
        ctx.layout = IndexLayout::Strips;
        let request = Request::new(RequestKind::Cylinder, vec![Parameter::floats(vec![1.0, 0.0, 1.0, 360.0])]);
        let Tessellated::Surfaces(out) = tessellate(&request, &mut ctx).unwrap() else {
            panic!("cylinder tessellates");
        };
        assert_eq!(out[0].topology, Topology::TriangleStrips);
        assert_eq!(out[0].strip_lengths, vec![12, 12, 12]);
    }

    #[test]
    fn bilinear_patch_mesh_splits_into_patches() {
        let attributes = Attributes::new(3, (1, 1));
        let mut p = Vec::new();
        for j in 0..2 {
            for i in 0..3 {
                p.extend([i as f32, j as f32, 0.0]);
            }
        }
        let params = vec![
            Parameter::string("bilinear"),
            Parameter::int(3),
            Parameter::string("nonperiodic"),
            Parameter::int(2),
            Parameter::string("nonperiodic"),
            Parameter::string("P"),
            Parameter::floats(p),
            Parameter::string("uniform float id"),
            Parameter::floats(vec![1.0, 2.0]),
        ];
        let out = surfaces(run(RequestKind::PatchMesh, params, &attributes));
        assert_eq!(out.len(), 2);
        assert_eq!(out[1].positions[0], [1.0, 0.0, 0.0]);
        assert_eq!(out[1].positions[3], [2.0, 1.0, 0.0]);
        assert_eq!(out[1].var("id").unwrap().values, Values::Floats(vec![2.0]));
    }

    #[test]
    fn patch_mesh_rejects_points_that_do_not_fit() {
        let attributes = Attributes::new(3, (2, 2));
        let params = vec![
            Parameter::string("bicubic"),
            Parameter::int(5),
            Parameter::string("nonperiodic"),
            Parameter::int(4),
            Parameter::string("nonperiodic"),
            Parameter::string("P"),
            Parameter::floats(vec![0.0; 60]),
        ];
        let err = run(RequestKind::PatchMesh, params, &attributes).unwrap_err();
        assert_eq!(err.kind, ErrorKind::Consistency);
    }

    #[test]
    fn nu_patch_emits_one_surface_per_segment() {
        let attributes = Attributes::new(3, (2, 2));
        let mut p = Vec::new();
        for j in 0..2 {
            for i in 0..3 {
                p.extend([i as f32, j as f32, 0.0]);
            }
        }
        let params = vec![
            Parameter::int(3),
            Parameter::int(2),
            Parameter::floats(vec![0.0, 0.0, 1.0, 2.0, 2.0]),
            Parameter::float(0.0),
            Parameter::float(2.0),
            Parameter::int(2),
            Parameter::int(2),
            Parameter::floats(vec![0.0, 0.0, 1.0, 1.0]),
            Parameter::float(0.0),
            Parameter::float(1.0),
            Parameter::string("P"),
            Parameter::floats(p),
            Parameter::string("s"),
            Parameter::floats(vec![0.0, 0.5, 1.0, 0.0, 0.5, 1.0]),
        ];
        let out = surfaces(run(RequestKind::NuPatch, params, &attributes));
        assert_eq!(out.len(), 2);
        let Values::Floats(s) = &out[1].var("s").unwrap().values else {
            panic!("s is float");
        };
        assert!((s[0] - 0.5).abs() < 1e-6);
        assert!((s[2] - 1.0).abs() < 1e-6);
        assert!((out[1].positions[2][0] - 2.0).abs() < 1e-6);
    }

    #[test]
    fn curves_are_bound_but_not_tessellated() {
        let attributes = Attributes::new(3, (4, 4));
        let params = vec![
            Parameter::string("linear"),
            Parameter::ints(vec![3]),
            Parameter::string("nonperiodic"),
            Parameter::string("P"),
            Parameter::floats(vec![0.0; 9]),
            Parameter::string("width"),
            Parameter::floats(vec![0.1, 0.1, 0.1]),
        ];
        match run(RequestKind::Curves, params, &attributes).unwrap() {
            Tessellated::Unsupported(vars) => assert!(vars.contains("width")),
            other => panic!("expected unsupported, got {other:?}"),
        }
    }

    #[test]
    fn subdivision_mesh_emits_control_hull() {
        let attributes = Attributes::new(3, (4, 4));
        let params = vec![
            Parameter::string("catmull-clark"),
            Parameter::ints(vec![4]),
            Parameter::ints(vec![0, 1, 2, 3]),
            Parameter::strings(vec!["interpolateboundary".into()]),
            Parameter::ints(vec![0, 0]),
            Parameter::ints(vec![]),
            Parameter::floats(vec![]),
            Parameter::string("P"),
            Parameter::floats(square()),
        ];
        let out = surfaces(run(RequestKind::SubdivisionMesh, params, &attributes));
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].triangle_count(), 2);
    }
}
