//! Blokmodi en de modusstapel die bepaalt welke requests geldig zijn.

use std::fmt;

use super::error::{ErrorKind, RiError, Severity};
use super::request::{RequestGroup, RequestKind};

/// Soort open blok.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Mode {
    Begin,
    Frame,
    World,
    Attribute,
    Transform,
    Solid,
    Object,
    Motion,
    Resource,
    Archive,
}

impl Mode {
    const fn bit(self) -> u16 {
        1 << self as u16
    }

    /// Transparante modi erven hun geldigheid van de dichtstbijzijnde
    /// niet-transparante voorouder.
    #[must_use]
    pub const fn is_transparent(self) -> bool {
        matches!(self, Self::Resource | Self::Archive)
    }

    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Begin => "Begin",
            Self::Frame => "Frame",
            Self::World => "World",
            Self::Attribute => "Attribute",
            Self::Transform => "Transform",
            Self::Solid => "Solid",
            Self::Object => "Object",
            Self::Motion => "Motion",
            Self::Resource => "Resource",
            Self::Archive => "Archive",
        }
    }

    /// Blok dat door `kind` geopend wordt.
    #[must_use]
    pub const fn opened_by(kind: RequestKind) -> Option<Self> {
        match kind {
            RequestKind::Begin => Some(Self::Begin),
            RequestKind::FrameBegin => Some(Self::Frame),
            RequestKind::WorldBegin => Some(Self::World),
            RequestKind::AttributeBegin => Some(Self::Attribute),
            RequestKind::TransformBegin => Some(Self::Transform),
            RequestKind::SolidBegin => Some(Self::Solid),
            RequestKind::ObjectBegin => Some(Self::Object),
            RequestKind::MotionBegin => Some(Self::Motion),
            RequestKind::ResourceBegin => Some(Self::Resource),
            RequestKind::ArchiveBegin => Some(Self::Archive),
            _ => None,
        }
    }

    /// Blok dat door `kind` gesloten wordt.
    #[must_use]
    pub const fn closed_by(kind: RequestKind) -> Option<Self> {
        match kind {
            RequestKind::End => Some(Self::Begin),
            RequestKind::FrameEnd => Some(Self::Frame),
            RequestKind::WorldEnd => Some(Self::World),
            RequestKind::AttributeEnd => Some(Self::Attribute),
            RequestKind::TransformEnd => Some(Self::Transform),
            RequestKind::SolidEnd => Some(Self::Solid),
            RequestKind::ObjectEnd => Some(Self::Object),
            RequestKind::MotionEnd => Some(Self::Motion),
            RequestKind::ResourceEnd => Some(Self::Resource),
            RequestKind::ArchiveEnd => Some(Self::Archive),
            _ => None,
        }
    }
}

impl fmt::Display for Mode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

const fn modes(list: &[Mode]) -> u16 {
    let mut mask = 0;
    let mut i = 0;
    while i < list.len() {
        mask |= list[i].bit();
        i += 1;
    }
    mask
}

const ALL: u16 = modes(&[
    Mode::Begin,
    Mode::Frame,
    Mode::World,
    Mode::Attribute,
    Mode::Transform,
    Mode::Solid,
    Mode::Object,
    Mode::Motion,
]);
const OUTSIDE_WORLD: u16 = modes(&[Mode::Begin, Mode::Frame]);
const NOT_MOTION: u16 = ALL & !Mode::Motion.bit();
const IN_WORLD: u16 = modes(&[
    Mode::World,
    Mode::Attribute,
    Mode::Transform,
    Mode::Solid,
    Mode::Object,
    Mode::Motion,
]);

/// Modi waarin een request uit `group` geldig is.
const fn allowed(group: RequestGroup) -> u16 {
    match group {
        RequestGroup::Anywhere | RequestGroup::Context | RequestGroup::End => ALL,
        RequestGroup::FrameBegin => Mode::Begin.bit(),
        RequestGroup::WorldBegin | RequestGroup::Options => OUTSIDE_WORLD,
        RequestGroup::Block | RequestGroup::Attributes | RequestGroup::MotionBegin => NOT_MOTION,
        RequestGroup::Moving | RequestGroup::Transforms => ALL,
        RequestGroup::Geometry => IN_WORLD,
        RequestGroup::SolidBegin => IN_WORLD & !Mode::Motion.bit(),
        RequestGroup::ObjectBegin => modes(&[
            Mode::Begin,
            Mode::Frame,
            Mode::World,
            Mode::Attribute,
            Mode::Transform,
        ]),
        RequestGroup::ObjectInstance => modes(&[
            Mode::World,
            Mode::Attribute,
            Mode::Transform,
            Mode::Solid,
            Mode::Object,
        ]),
    }
}

/// Stapel van open blokken; `Begin` is altijd de wortel.
#[derive(Debug, Clone, Default)]
pub struct ModeStack {
    stack: Vec<Mode>,
}

impl ModeStack {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn depth(&self) -> usize {
        self.stack.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.stack.is_empty()
    }

    #[must_use]
    pub fn top(&self) -> Option<Mode> {
        self.stack.last().copied()
    }

    /// Bovenste niet-transparante modus.
    #[must_use]
    pub fn effective_top(&self) -> Option<Mode> {
        self.stack.iter().rev().copied().find(|m| !m.is_transparent())
    }

    #[must_use]
    pub fn contains(&self, mode: Mode) -> bool {
        self.stack.contains(&mode)
    }

    #[must_use]
    pub fn modes(&self) -> &[Mode] {
        &self.stack
    }

    /// Of `kind` in de huidige modus uitgevoerd mag worden.
    #[must_use]
    pub fn is_valid(&self, kind: RequestKind) -> bool {
        let Some(effective) = self.effective_top() else {
            return kind == RequestKind::Begin;
        };
        match kind {
            RequestKind::Begin => return false,
            RequestKind::End => return true,
            _ => {}
        }
        if let Some(mode) = Mode::closed_by(kind) {
            return self.top() == Some(mode);
        }
        allowed(kind.group()) & effective.bit() != 0
    }

    /// Opent een blok. Bij een ongeldige overgang blijft de stapel ongewijzigd.
    pub fn push(&mut self, mode: Mode) -> Result<(), RiError> {
        let ok = match (mode, self.effective_top()) {
            (Mode::Begin, top) => top.is_none(),
            (_, None) => false,
            (Mode::Resource | Mode::Archive, Some(_)) => true,
            (_, Some(top)) => allowed(Self::group_of(mode)) & top.bit() != 0,
        };
        if !ok {
            let place = self.effective_top().map_or("outside a context", Mode::name);
            return Err(RiError::new(
                ErrorKind::Nesting,
                format!("cannot open {mode} block in {place}"),
            ));
        }
        self.stack.push(mode);
        Ok(())
    }

    /// Sluit het bovenste blok als dat `expected` is.
    pub fn pop(&mut self, expected: Mode) -> Result<Mode, RiError> {
        match self.top() {
            Some(top) if top == expected => {
                self.stack.pop();
                Ok(top)
            }
            Some(top) => Err(RiError::new(
                ErrorKind::Nesting,
                format!("cannot close {expected} block, innermost open block is {top}"),
            )),
            None => Err(RiError::new(
                ErrorKind::Nesting,
                format!("cannot close {expected} block, no block is open"),
            )),
        }
    }

    /// Sluit de hele context. Open blokken onder de wortel leveren een
    /// waarschuwing op; de stapel wordt hoe dan ook leeggemaakt.
    pub fn teardown(&mut self) -> Option<RiError> {
        let warning = (self.stack.len() > 1).then(|| {
            let open: Vec<&str> = self.stack[1..].iter().map(|m| m.name()).collect();
            RiError::new(
                ErrorKind::Nesting,
                format!("context ended with open blocks: {}", open.join(", ")),
            )
            .with_severity(Severity::Warning)
        });
        self.stack.clear();
        warning
    }

    const fn group_of(mode: Mode) -> RequestGroup {
        match mode {
            Mode::Begin => RequestGroup::Context,
            Mode::Frame => RequestGroup::FrameBegin,
            Mode::World => RequestGroup::WorldBegin,
            Mode::Attribute | Mode::Transform => RequestGroup::Block,
            Mode::Solid => RequestGroup::SolidBegin,
            Mode::Object => RequestGroup::ObjectBegin,
            Mode::Motion => RequestGroup::MotionBegin,
            Mode::Resource | Mode::Archive => RequestGroup::Anywhere,
        }
    }
}
