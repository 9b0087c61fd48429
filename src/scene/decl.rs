//! Declaraties van primitieve variabelen en het woordenboek dat ze per sessie
//! bewaart.
//!
//! Declaratiesyntax: `"[klasse] type[n]"`, bijvoorbeeld `"varying color"` of
//! `"uniform float[2]"`. Een inline declaratie voegt daar een naam aan toe:
//! `"vertex point Pref"`.

use std::collections::HashMap;

use once_cell::sync::Lazy;
use regex::Regex;
use serde::Serialize;

use super::error::{ErrorKind, RiError};
use super::param::BasicType;

static DECL_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"^\s*(?:(constant|uniform|varying|vertex|facevarying|facevertex)\s+)?(float|integer|int|string|point|vector|normal|hpoint|color|matrix)\s*(?:\[\s*(\d+)\s*\])?\s*(?:\s([A-Za-z_][A-Za-z0-9_.:]*))?\s*$",
    )
    .expect("declaration pattern is valid")
});

/// Interpolatieklasse van een primitieve variabele.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum StorageClass {
    Constant,
    Uniform,
    Varying,
    Vertex,
    FaceVarying,
    FaceVertex,
}

impl StorageClass {
    #[must_use]
    pub fn parse(word: &str) -> Option<Self> {
        match word {
            "constant" => Some(Self::Constant),
            "uniform" => Some(Self::Uniform),
            "varying" => Some(Self::Varying),
            "vertex" => Some(Self::Vertex),
            "facevarying" => Some(Self::FaceVarying),
            "facevertex" => Some(Self::FaceVertex),
            _ => None,
        }
    }

    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Constant => "constant",
            Self::Uniform => "uniform",
            Self::Varying => "varying",
            Self::Vertex => "vertex",
            Self::FaceVarying => "facevarying",
            Self::FaceVertex => "facevertex",
        }
    }
}

/// Type van een primitieve variabele.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum TypeKind {
    Float,
    Integer,
    String,
    Point,
    Vector,
    Normal,
    HPoint,
    Color,
    Matrix,
}

impl TypeKind {
    #[must_use]
    pub fn parse(word: &str) -> Option<Self> {
        match word {
            "float" => Some(Self::Float),
            "integer" | "int" => Some(Self::Integer),
            "string" => Some(Self::String),
            "point" => Some(Self::Point),
            "vector" => Some(Self::Vector),
            "normal" => Some(Self::Normal),
            "hpoint" => Some(Self::HPoint),
            "color" => Some(Self::Color),
            "matrix" => Some(Self::Matrix),
            _ => None,
        }
    }

    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Float => "float",
            Self::Integer => "integer",
            Self::String => "string",
            Self::Point => "point",
            Self::Vector => "vector",
            Self::Normal => "normal",
            Self::HPoint => "hpoint",
            Self::Color => "color",
            Self::Matrix => "matrix",
        }
    }

    #[must_use]
    pub const fn basic_type(self) -> BasicType {
        match self {
            Self::Integer => BasicType::Integer,
            Self::String => BasicType::String,
            _ => BasicType::Float,
        }
    }

    /// Aantal componenten per element; kleuren volgen `ColorSamples`.
    #[must_use]
    pub const fn components(self, color_samples: usize) -> usize {
        match self {
            Self::Float | Self::Integer | Self::String => 1,
            Self::Point | Self::Vector | Self::Normal => 3,
            Self::HPoint => 4,
            Self::Color => color_samples,
            Self::Matrix => 16,
        }
    }
}

/// Naam → (klasse, type, arraygrootte).
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Declaration {
    pub name: String,
    pub class: StorageClass,
    pub kind: TypeKind,
    pub array_size: usize,
    /// Aangemaakt bij eerste gebruik van een inline token.
    pub inline: bool,
}

impl Declaration {
    /// Parseert de declaratietekst van `Declare name "decl"`.
    pub fn parse(name: &str, decl: &str) -> Result<Self, RiError> {
        let name = name.trim();
        if name.is_empty() {
            return Err(RiError::new(ErrorKind::BadToken, "declaration without a name"));
        }
        let parsed = parse_decl(decl)
            .ok_or_else(|| {
                RiError::new(
                    ErrorKind::Syntax,
                    format!("invalid declaration \"{decl}\" for \"{name}\""),
                )
            })?;
        if parsed.name.is_some() {
            return Err(RiError::new(
                ErrorKind::Syntax,
                format!("declaration \"{decl}\" for \"{name}\" carries its own name"),
            ));
        }
        Ok(Self {
            name: name.to_owned(),
            class: parsed.class,
            kind: parsed.kind,
            array_size: parsed.array_size,
            inline: false,
        })
    }

    /// Parseert een inline token als `"varying float foo"`. `None` als het
    /// token geen inline declaratie is.
    #[must_use]
    pub fn parse_inline(token: &str) -> Option<Self> {
        let parsed = parse_decl(token)?;
        Some(Self {
            name: parsed.name?,
            class: parsed.class,
            kind: parsed.kind,
            array_size: parsed.array_size,
            inline: true,
        })
    }

    /// Elementbreedte in waarden.
    #[must_use]
    pub fn width(&self, color_samples: usize) -> usize {
        self.kind.components(color_samples) * self.array_size
    }

    #[must_use]
    pub fn basic_type(&self) -> BasicType {
        self.kind.basic_type()
    }
}

struct ParsedDecl {
    class: StorageClass,
    kind: TypeKind,
    array_size: usize,
    name: Option<String>,
}

fn parse_decl(text: &str) -> Option<ParsedDecl> {
    let caps = DECL_RE.captures(text)?;
    let class = match caps.get(1) {
        Some(m) => StorageClass::parse(m.as_str())?,
        None => StorageClass::Uniform,
    };
    let kind = TypeKind::parse(caps.get(2)?.as_str())?;
    let array_size = match caps.get(3) {
        Some(m) => m.as_str().parse::<usize>().ok().filter(|n| *n > 0)?,
        None => 1,
    };
    Some(ParsedDecl {
        class,
        kind,
        array_size,
        name: caps.get(4).map(|m| m.as_str().to_owned()),
    })
}

/// Index van een declaratie in het woordenboek.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct DeclId(usize);

/// Standaarddeclaraties die bij het starten van een sessie bekend zijn.
const DEFAULT_DECLARATIONS: &[(&str, &str)] = &[
    ("P", "vertex point"),
    ("Pz", "vertex float"),
    ("Pw", "vertex hpoint"),
    ("N", "varying normal"),
    ("Np", "uniform normal"),
    ("Cs", "varying color"),
    ("Os", "varying color"),
    ("s", "varying float"),
    ("t", "varying float"),
    ("st", "varying float[2]"),
    ("width", "varying float"),
    ("constantwidth", "constant float"),
    ("Ka", "uniform float"),
    ("Kd", "uniform float"),
    ("Ks", "uniform float"),
    ("Kr", "uniform float"),
    ("roughness", "uniform float"),
    ("specularcolor", "uniform color"),
    ("intensity", "uniform float"),
    ("lightcolor", "uniform color"),
    ("from", "uniform point"),
    ("to", "uniform point"),
    ("coneangle", "uniform float"),
    ("conedeltaangle", "uniform float"),
    ("beamdistribution", "uniform float"),
    ("amplitude", "uniform float"),
    ("mindistance", "uniform float"),
    ("maxdistance", "uniform float"),
    ("background", "uniform color"),
    ("distance", "uniform float"),
    ("texturename", "uniform string"),
    ("fov", "uniform float"),
    ("name", "uniform string"),
    ("shadinggroup", "uniform string"),
    ("sense", "uniform string"),
    ("origin", "uniform integer[2]"),
];

/// Woordenboek van alle declaraties van een sessie, inline declaraties
/// inbegrepen.
///
/// Een herdeclaratie krijgt een nieuwe [`DeclId`]; oudere ids blijven naar de
/// oude declaratie wijzen.
#[derive(Debug, Clone)]
pub struct DeclarationDictionary {
    decls: Vec<Declaration>,
    by_token: HashMap<String, DeclId>,
    color_samples: usize,
}

impl Default for DeclarationDictionary {
    fn default() -> Self {
        Self::with_defaults()
    }
}

impl DeclarationDictionary {
    /// Leeg woordenboek zonder standaarddeclaraties.
    #[must_use]
    pub fn empty() -> Self {
        Self {
            decls: Vec::new(),
            by_token: HashMap::new(),
            color_samples: 3,
        }
    }

    #[must_use]
    pub fn with_defaults() -> Self {
        let mut dict = Self::empty();
        for (name, decl) in DEFAULT_DECLARATIONS {
            if let Ok(parsed) = Declaration::parse(name, decl) {
                dict.insert(name, parsed);
            }
        }
        dict
    }

    fn insert(&mut self, token: &str, decl: Declaration) -> DeclId {
        let id = DeclId(self.decls.len());
        self.decls.push(decl);
        self.by_token.insert(token.to_owned(), id);
        id
    }

    /// `Declare name "decl"`; geeft ook terug of een bestaande declaratie
    /// vervangen werd.
    pub fn declare(&mut self, name: &str, decl: &str) -> Result<(DeclId, bool), RiError> {
        let parsed = Declaration::parse(name, decl)?;
        let replaced = self.by_token.contains_key(parsed.name.as_str());
        let key = parsed.name.clone();
        Ok((self.insert(&key, parsed), replaced))
    }

    /// Zoekt een token op zonder iets aan te maken.
    #[must_use]
    pub fn find(&self, token: &str) -> Option<DeclId> {
        self.by_token.get(token).copied()
    }

    /// Zoekt een token op; een onbekend inline token wordt bij eerste gebruik
    /// gedeclareerd onder zijn volledige tekst.
    pub fn resolve(&mut self, token: &str) -> Result<DeclId, RiError> {
        if let Some(id) = self.find(token) {
            return Ok(id);
        }
        match Declaration::parse_inline(token) {
            Some(decl) => Ok(self.insert(token, decl)),
            None => Err(RiError::new(
                ErrorKind::BadToken,
                format!("parameter \"{token}\" is not declared"),
            )),
        }
    }

    #[must_use]
    pub fn get(&self, id: DeclId) -> &Declaration {
        &self.decls[id.0]
    }

    #[must_use]
    pub fn width(&self, id: DeclId) -> usize {
        self.get(id).width(self.color_samples)
    }

    #[must_use]
    pub fn color_samples(&self) -> usize {
        self.color_samples
    }

    pub fn set_color_samples(&mut self, samples: usize) -> Result<(), RiError> {
        if samples == 0 {
            return Err(RiError::new(
                ErrorKind::Range,
                "ColorSamples: sample count must be positive",
            ));
        }
        self.color_samples = samples;
        Ok(())
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.decls.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.decls.is_empty()
    }
}
