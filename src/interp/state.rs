//! Grafische toestand van een sessie: de attributenstapel, de
//! transformatiestapel en benoemde coördinatenstelsels.
//!
//! `AttributeBegin` bewaart attributen én transformatie, `TransformBegin`
//! alleen de transformatie.

use std::collections::HashMap;

use serde::Serialize;

use crate::geom::{Basis, MAX_RESOLUTION, Transform, Vec3};
use crate::scene::{Args, BasicType, DeclarationDictionary, ErrorKind, Request, RequestKind, RiError};

/// Draairichting van een coördinatenstelsel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Handedness {
    Left,
    Right,
}

impl Handedness {
    #[must_use]
    pub const fn flipped(self) -> Self {
        match self {
            Self::Left => Self::Right,
            Self::Right => Self::Left,
        }
    }
}

/// Attributen die met de attributenstapel bewaard en hersteld worden.
#[derive(Debug, Clone, PartialEq)]
pub struct Attributes {
    /// Huidige kleur, `ColorSamples` componenten.
    pub color: Vec<f32>,
    pub opacity: Vec<f32>,
    pub u_basis: Basis,
    pub v_basis: Basis,
    /// Absolute oriëntatie van de voorkant.
    pub orientation: Handedness,
    pub sides: u8,
    /// Roosterresolutie `(u, v)` voor parametrische oppervlakken.
    pub tessellation: (usize, usize),
}

impl Attributes {
    #[must_use]
    pub fn new(color_samples: usize, tessellation: (usize, usize)) -> Self {
        Self {
            color: vec![1.0; color_samples],
            opacity: vec![1.0; color_samples],
            u_basis: Basis::BEZIER,
            v_basis: Basis::BEZIER,
            orientation: Handedness::Left,
            sides: 2,
            tessellation,
        }
    }
}

/// Bewaarde toestand van één open attribuutblok.
#[derive(Debug, Clone)]
struct Frame {
    attributes: Attributes,
    transform: Transform,
    scoped: Vec<(String, Option<Transform>)>,
}

#[derive(Debug, Clone)]
pub struct GraphicsState {
    attributes: Attributes,
    transform: Transform,
    frames: Vec<Frame>,
    transforms: Vec<Transform>,
    coordinate_systems: HashMap<String, Transform>,
    /// Scoped stelsels van het huidige blok, met wat ze verborgen.
    scoped: Vec<(String, Option<Transform>)>,
}

fn range(kind: RequestKind, message: impl std::fmt::Display) -> RiError {
    RiError::new(ErrorKind::Range, format!("{}: {message}", kind.name()))
}

/// Roosterresolutie uit een request-waarde, tussen 1 en [`MAX_RESOLUTION`].
fn resolution(kind: RequestKind, value: f64) -> Result<usize, RiError> {
    if !(value.is_finite() && value >= 1.0) {
        return Err(range(kind, format!("tessellation resolution {value} must be positive")));
    }
    let n = value.round();
    if n > MAX_RESOLUTION as f64 {
        return Err(range(
            kind,
            format!("tessellation resolution {value} exceeds {MAX_RESOLUTION}"),
        ));
    }
    Ok(n as usize)
}

impl GraphicsState {
    #[must_use]
    pub fn new(color_samples: usize, tessellation: (usize, usize)) -> Self {
        Self {
            attributes: Attributes::new(color_samples, tessellation),
            transform: Transform::identity(),
            frames: Vec::new(),
            transforms: Vec::new(),
            coordinate_systems: HashMap::new(),
            scoped: Vec::new(),
        }
    }

    #[must_use]
    pub fn attributes(&self) -> &Attributes {
        &self.attributes
    }

    #[must_use]
    pub fn transform(&self) -> Transform {
        self.transform
    }

    #[must_use]
    pub fn depth(&self) -> usize {
        self.frames.len()
    }

    /// Draairichting van het huidige stelsel; de begintoestand is linkshandig.
    #[must_use]
    pub fn handedness(&self) -> Handedness {
        if self.transform.handedness() < 0.0 {
            Handedness::Right
        } else {
            Handedness::Left
        }
    }

    /// Of de voorkant tegen de indexvolgorde in ligt.
    #[must_use]
    pub fn is_reversed(&self) -> bool {
        self.attributes.orientation != self.handedness()
    }

    #[must_use]
    pub fn coordinate_system(&self, name: &str) -> Option<Transform> {
        self.coordinate_systems.get(name).copied()
    }

    pub fn push_attributes(&mut self) {
        self.frames.push(Frame {
            attributes: self.attributes.clone(),
            transform: self.transform,
            scoped: std::mem::take(&mut self.scoped),
        });
    }

    pub fn pop_attributes(&mut self) -> Result<(), RiError> {
        let frame = self
            .frames
            .pop()
            .ok_or_else(|| RiError::new(ErrorKind::Bug, "attribute stack underflow"))?;
        for (name, hidden) in self.scoped.drain(..).rev() {
            match hidden {
                Some(previous) => self.coordinate_systems.insert(name, previous),
                None => self.coordinate_systems.remove(&name),
            };
        }
        self.attributes = frame.attributes;
        self.transform = frame.transform;
        self.scoped = frame.scoped;
        Ok(())
    }

    pub fn push_transform(&mut self) {
        self.transforms.push(self.transform);
    }

    pub fn pop_transform(&mut self) -> Result<(), RiError> {
        self.transform = self
            .transforms
            .pop()
            .ok_or_else(|| RiError::new(ErrorKind::Bug, "transform stack underflow"))?;
        Ok(())
    }

    /// `WorldBegin`: de huidige transformatie wordt het camerastelsel en de
    /// wereld begint bij de identiteit.
    pub fn begin_world(&mut self) {
        self.push_attributes();
        self.coordinate_systems.insert("camera".to_owned(), self.transform);
        self.transform = Transform::identity();
        self.coordinate_systems.insert("world".to_owned(), self.transform);
    }

    /// Nieuwe kleurbreedte; alle kleuren worden wit.
    pub fn set_color_samples(&mut self, samples: usize) {
        for attributes in self
            .frames
            .iter_mut()
            .map(|f| &mut f.attributes)
            .chain(std::iter::once(&mut self.attributes))
        {
            attributes.color = vec![1.0; samples];
            attributes.opacity = vec![1.0; samples];
        }
    }

    fn concat(&mut self, t: Transform) {
        self.transform = self.transform.compose(t);
    }

    fn define(&mut self, name: &str, scoped: bool) {
        let hidden = self.coordinate_systems.insert(name.to_owned(), self.transform);
        if scoped {
            self.scoped.push((name.to_owned(), hidden));
        }
    }

    /// Voert een request uit de transformatiegroep uit.
    pub fn apply_transform(&mut self, request: &Request) -> Result<(), RiError> {
        let kind = request.kind;
        let mut args = Args::new(kind, &request.params);
        match kind {
            RequestKind::Identity => self.transform = Transform::identity(),
            RequestKind::Transform => {
                self.transform = Transform::from_row_major(&args.floats::<16>()?);
            }
            RequestKind::ConcatTransform => {
                self.concat(Transform::from_row_major(&args.floats::<16>()?));
            }
            RequestKind::Perspective => {
                let fov = args.float()?;
                let t = Transform::perspective(f64::from(fov))
                    .ok_or_else(|| range(kind, format!("field of view {fov} must lie in (0, 180)")))?;
                self.concat(t);
            }
            RequestKind::Translate => {
                let [x, y, z] = args.floats::<3>()?.map(f64::from);
                self.concat(Transform::translate(Vec3::new(x, y, z)));
            }
            RequestKind::Rotate => {
                let [angle, x, y, z] = args.floats::<4>()?.map(f64::from);
                let t = Transform::rotate(angle, Vec3::new(x, y, z))
                    .ok_or_else(|| range(kind, "rotation axis has zero length"))?;
                self.concat(t);
            }
            RequestKind::Scale => {
                let [x, y, z] = args.floats::<3>()?.map(f64::from);
                self.concat(Transform::scale(x, y, z));
            }
            RequestKind::Skew => {
                let v = args.floats::<7>()?.map(f64::from);
                let t = Transform::skew(
                    v[0],
                    Vec3::new(v[1], v[2], v[3]),
                    Vec3::new(v[4], v[5], v[6]),
                )
                .ok_or_else(|| range(kind, format!("cannot skew by {} degrees", v[0])))?;
                self.concat(t);
            }
            RequestKind::CoordinateSystem => self.define(args.string()?, false),
            RequestKind::ScopedCoordinateSystem => self.define(args.string()?, true),
            RequestKind::CoordSysTransform => {
                let name = args.string()?;
                self.transform = self.coordinate_system(name).ok_or_else(|| {
                    RiError::new(
                        ErrorKind::BadHandle,
                        format!("{}: unknown coordinate system \"{name}\"", kind.name()),
                    )
                })?;
            }
            _ => {}
        }
        Ok(())
    }

    /// Voert een attribuut-request uit. Requests zonder effect op de
    /// tessellatie (shaders, lichten, ...) worden genegeerd.
    pub fn apply_attribute(
        &mut self,
        request: &Request,
        dict: &mut DeclarationDictionary,
    ) -> Result<(), RiError> {
        let kind = request.kind;
        let mut args = Args::new(kind, &request.params);
        match kind {
            RequestKind::Color => self.attributes.color = args.float_vec(dict.color_samples())?,
            RequestKind::Opacity => {
                self.attributes.opacity = args.float_vec(dict.color_samples())?;
            }
            RequestKind::Basis => {
                let u_basis = read_basis(kind, &mut args)?;
                let u_step = read_step(kind, &mut args)?;
                let v_basis = read_basis(kind, &mut args)?;
                let v_step = read_step(kind, &mut args)?;
                self.attributes.u_basis = u_basis.with_step(u_step);
                self.attributes.v_basis = v_basis.with_step(v_step);
            }
            RequestKind::Orientation => {
                let name = args.string()?;
                self.attributes.orientation = match name {
                    "outside" => self.handedness(),
                    "inside" => self.handedness().flipped(),
                    "lh" => Handedness::Left,
                    "rh" => Handedness::Right,
                    other => {
                        return Err(RiError::new(
                            ErrorKind::BadToken,
                            format!("{}: unknown orientation \"{other}\"", kind.name()),
                        ));
                    }
                };
            }
            RequestKind::ReverseOrientation => {
                self.attributes.orientation = self.attributes.orientation.flipped();
            }
            RequestKind::Sides => {
                self.attributes.sides = match args.int()? {
                    1 => 1,
                    2 => 2,
                    n => return Err(range(kind, format!("sides must be 1 or 2, found {n}"))),
                };
            }
            RequestKind::Attribute => {
                let name = args.string()?;
                let list = args.token_list()?;
                if name == "tessellation" {
                    let (mut u, mut v) = self.attributes.tessellation;
                    for pair in list {
                        let id = dict.resolve(pair.token)?;
                        let value = pair
                            .value
                            .values
                            .to_floats()
                            .and_then(|values| values.first().copied())
                            .ok_or_else(|| {
                                RiError::new(
                                    ErrorKind::Consistency,
                                    format!("{}: \"{}\" needs a number", kind.name(), pair.token),
                                )
                            })?;
                        let n = resolution(kind, f64::from(value))?;
                        match dict.get(id).name.as_str() {
                            "u" => u = n,
                            "v" => v = n,
                            other => {
                                return Err(RiError::new(
                                    ErrorKind::BadToken,
                                    format!("{}: unknown tessellation parameter \"{other}\"", kind.name()),
                                ));
                            }
                        }
                    }
                    self.attributes.tessellation = (u, v);
                }
            }
            RequestKind::GeometricApproximation => {
                let name = args.string()?;
                let value = args.float()?;
                if name == "tessellation" {
                    let n = resolution(kind, f64::from(value))?;
                    self.attributes.tessellation = (n, n);
                }
            }
            _ => {}
        }
        Ok(())
    }
}

fn read_basis(kind: RequestKind, args: &mut Args<'_>) -> Result<Basis, RiError> {
    if args.peek_type() == Some(BasicType::String) {
        let name = args.string()?;
        return Basis::named(name)
            .map_err(|err| RiError::new(ErrorKind::BadToken, format!("{}: {err}", kind.name())));
    }
    let values = args.float_array()?;
    let matrix: [f32; 16] = values.as_slice().try_into().map_err(|_| {
        RiError::new(
            ErrorKind::Consistency,
            format!("{}: basis matrix needs 16 values, found {}", kind.name(), values.len()),
        )
    })?;
    Ok(Basis::from_values(&matrix, 1))
}

fn read_step(kind: RequestKind, args: &mut Args<'_>) -> Result<usize, RiError> {
    let step = args.int()?;
    usize::try_from(step)
        .ok()
        .filter(|&s| s > 0)
        .ok_or_else(|| range(kind, format!("basis step {step} must be positive")))
}
