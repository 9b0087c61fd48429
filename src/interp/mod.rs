//! De interpreter: één [`Session`] per context.
//!
//! Elk request doorloopt dezelfde volgorde: valideren tegen de modusstapel,
//! toestand bijwerken of tesselleren, en tot slot de backend informeren.
//! Fouten worden gemeld via de [`ErrorHandler`]; het request wordt dan
//! overgeslagen en de stroom loopt door.

mod backend;
mod geometry;
mod state;

use std::collections::HashMap;
use std::fs::File;
use std::io::Read;
use std::path::{Path, PathBuf};
use std::rc::Rc;

pub use backend::{Backend, SceneCollector};
pub use state::{Attributes, GraphicsState, Handedness};

use crate::geom::{IndexLayout, Surface, SurfaceVar, Tolerance};
use crate::parse::{RibDecoder, StreamItem};
use crate::scene::{
    Args, BasicType, DeclarationDictionary, ErrorHandler, ErrorKind, ErrorLog, Mode, ModeStack,
    Request, RequestGroup, RequestKind, RiError, Severity, TypeKind, Values,
};

use geometry::{Context, Tessellated};

/// Instellingen die voor de hele sessie gelden.
#[derive(Debug, Clone)]
pub struct SessionOptions {
    /// Standaard roosterresolutie `(u, v)` voor parametrische oppervlakken.
    pub tessellation: (usize, usize),
    pub index_layout: IndexLayout,
    pub tolerance: Tolerance,
    /// Maximale nesting van `ReadArchive` en `ObjectInstance`.
    pub max_archive_depth: usize,
    /// Map waarin `ReadArchive` bestanden zoekt.
    pub archive_search_path: Option<PathBuf>,
}

impl Default for SessionOptions {
    fn default() -> Self {
        Self {
            tessellation: (16, 16),
            index_layout: IndexLayout::Triangles,
            tolerance: Tolerance::DEFAULT,
            max_archive_depth: 64,
            archive_search_path: None,
        }
    }
}

/// Verwijzing naar een objectdefinitie.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
enum Handle {
    Id(i32),
    Name(String),
}

impl Handle {
    fn read(args: &mut Args<'_>) -> Result<Self, RiError> {
        if args.peek_type() == Some(BasicType::String) {
            Ok(Self::Name(args.string()?.to_owned()))
        } else {
            Ok(Self::Id(args.int()?))
        }
    }
}

#[derive(Debug)]
enum Target {
    Object(Handle),
    Archive(String),
}

/// Requests die opgenomen en niet uitgevoerd worden.
#[derive(Debug)]
struct Recording {
    target: Target,
    requests: Vec<Request>,
    /// Open `ArchiveBegin`-blokken binnen een archief.
    nested: usize,
}

/// Reactie op gemelde fouten, ingesteld met `ErrorHandler`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ErrorMode {
    Ignore,
    Print,
    Abort,
}

/// Eén interpretercontext met al zijn veranderlijke toestand.
pub struct Session<B: Backend, H: ErrorHandler = ErrorLog> {
    options: SessionOptions,
    layout: IndexLayout,
    backend: B,
    handler: H,
    dict: DeclarationDictionary,
    modes: ModeStack,
    state: GraphicsState,
    objects: HashMap<Handle, Rc<Vec<Request>>>,
    archives: HashMap<String, Rc<Vec<Request>>>,
    recording: Option<Recording>,
    /// Aantal requests binnen het open motion-blok.
    motion: Option<usize>,
    depth: usize,
    locator: Option<String>,
    worst: Option<Severity>,
    error_mode: ErrorMode,
    aborted: bool,
    /// De context is impliciet geopend en nog onaangeroerd.
    implicit: bool,
}

impl<B: Backend> Session<B> {
    /// Sessie die fouten naar de `log`-facade stuurt.
    pub fn new(backend: B) -> Self {
        Self::with_handler(backend, ErrorLog, SessionOptions::default())
    }
}

impl<B: Backend, H: ErrorHandler> Session<B, H> {
    pub fn with_handler(backend: B, handler: H, options: SessionOptions) -> Self {
        let dict = DeclarationDictionary::with_defaults();
        let state = GraphicsState::new(dict.color_samples(), options.tessellation);
        let mut modes = ModeStack::new();
        // Een lege stapel accepteert altijd `Begin`.
        let _ = modes.push(Mode::Begin);
        Self {
            layout: options.index_layout,
            options,
            backend,
            handler,
            dict,
            modes,
            state,
            objects: HashMap::new(),
            archives: HashMap::new(),
            recording: None,
            motion: None,
            depth: 0,
            locator: None,
            worst: None,
            error_mode: ErrorMode::Print,
            aborted: false,
            implicit: true,
        }
    }

    #[must_use]
    pub fn backend(&self) -> &B {
        &self.backend
    }

    #[must_use]
    pub fn declarations(&self) -> &DeclarationDictionary {
        &self.dict
    }

    #[must_use]
    pub fn handler(&self) -> &H {
        &self.handler
    }

    #[must_use]
    pub fn modes(&self) -> &ModeStack {
        &self.modes
    }

    #[must_use]
    pub fn state(&self) -> &GraphicsState {
        &self.state
    }

    /// Zwaarste ernst die tot nu toe gemeld is.
    #[must_use]
    pub fn worst_severity(&self) -> Option<Severity> {
        self.worst
    }

    /// Sluit de context af en geeft backend en handler terug.
    pub fn finish(mut self) -> (B, H) {
        if self.recording.is_some() {
            self.report(RiError::new(
                ErrorKind::Nesting,
                "stream ended inside an object or archive definition",
            ));
        }
        if let Some(warning) = self.modes.teardown() {
            self.report(warning);
        }
        (self.backend, self.handler)
    }

    // ─────────────────────────────────────────────────────────────────────
    // Stromen
    // ─────────────────────────────────────────────────────────────────────

    /// Decodeert en verwerkt een stroom; `locator` verschijnt in meldingen.
    pub fn read_stream<R: Read>(&mut self, source: R, locator: &str) {
        let outer = self.locator.replace(locator.to_owned());
        log::debug!("reading stream {locator}");
        for item in RibDecoder::new(source) {
            if self.aborted {
                break;
            }
            match item {
                Ok(StreamItem::Request(request)) => self.process(request),
                Ok(StreamItem::Comment(comment)) => {
                    if comment.structured {
                        self.backend.comment(&comment);
                    }
                }
                Err(err) => self.report(err),
            }
        }
        self.locator = outer;
    }

    pub fn read_bytes(&mut self, bytes: &[u8], locator: &str) {
        self.read_stream(bytes, locator);
    }

    pub fn read_file(&mut self, path: &Path) -> Result<(), RiError> {
        let file = File::open(path).map_err(|err| {
            RiError::new(ErrorKind::NoFile, format!("cannot open {}: {err}", path.display()))
        })?;
        self.read_stream(file, &path.display().to_string());
        Ok(())
    }

    /// Verwerkt één request; fouten gaan naar de handler.
    pub fn process(&mut self, request: Request) {
        if self.aborted {
            return;
        }
        let line = request.line;
        if let Err(err) = self.dispatch(request) {
            self.report(err.at_line(line));
        }
    }

    fn report(&mut self, error: RiError) {
        let error = match &self.locator {
            Some(locator) => error.in_stream(locator),
            None => error,
        };
        self.worst = self.worst.max(Some(error.severity));
        match self.error_mode {
            ErrorMode::Ignore => {}
            ErrorMode::Print => self.handler.handle(&error),
            ErrorMode::Abort => {
                self.handler.handle(&error);
                if error.severity >= Severity::Error {
                    log::warn!("aborting stream after {}", error.kind);
                    self.aborted = true;
                }
            }
        }
    }

    // ─────────────────────────────────────────────────────────────────────
    // Opnemen
    // ─────────────────────────────────────────────────────────────────────

    fn dispatch(&mut self, request: Request) -> Result<(), RiError> {
        let Some(recording) = self.recording.as_mut() else {
            return self.execute(&request);
        };
        if matches!(recording.target, Target::Archive(_)) {
            match request.kind {
                RequestKind::ArchiveBegin => recording.nested += 1,
                RequestKind::ArchiveEnd if recording.nested == 0 => {
                    return self.end_recording(&request);
                }
                RequestKind::ArchiveEnd => recording.nested -= 1,
                _ => {}
            }
            recording.requests.push(request);
            return Ok(());
        }
        // Objecten worden gevalideerd en hun blokken bijgehouden.
        self.validate(&request)?;
        let kind = request.kind;
        if kind == RequestKind::ObjectEnd {
            return self.end_recording(&request);
        }
        if let Some(mode) = Mode::opened_by(kind) {
            self.modes.push(mode)?;
        } else if let Some(mode) = Mode::closed_by(kind) {
            self.modes.pop(mode)?;
        }
        if let Some(recording) = self.recording.as_mut() {
            recording.requests.push(request);
        }
        Ok(())
    }

    fn end_recording(&mut self, request: &Request) -> Result<(), RiError> {
        let Some(recording) = self.recording.take() else {
            return Err(RiError::new(ErrorKind::Bug, "no definition is being recorded"));
        };
        let requests = Rc::new(recording.requests);
        match recording.target {
            Target::Object(handle) => {
                self.modes.pop(Mode::Object)?;
                log::debug!("object {handle:?} holds {} requests", requests.len());
                self.objects.insert(handle, requests);
            }
            Target::Archive(name) => {
                self.modes.pop(Mode::Archive)?;
                log::debug!("archive \"{name}\" holds {} requests", requests.len());
                self.archives.insert(name, requests);
            }
        }
        self.backend.request(request);
        Ok(())
    }

    /// Speelt opgenomen requests af, één niveau dieper.
    fn replay(&mut self, kind: RequestKind, requests: &[Request]) -> Result<(), RiError> {
        if self.depth >= self.options.max_archive_depth {
            return Err(RiError::new(
                ErrorKind::Limit,
                format!("{}: nesting deeper than {} levels", kind.name(), self.options.max_archive_depth),
            ));
        }
        self.depth += 1;
        for request in requests {
            self.process(request.clone());
        }
        self.depth -= 1;
        Ok(())
    }

    // ─────────────────────────────────────────────────────────────────────
    // Uitvoeren
    // ─────────────────────────────────────────────────────────────────────

    fn validate(&self, request: &Request) -> Result<(), RiError> {
        let kind = request.kind;
        if !self.modes.is_valid(kind) {
            let place = self.modes.top().map_or("outside a context", Mode::name);
            let message = match Mode::closed_by(kind) {
                Some(mode) => format!("{} without matching {mode} block (innermost is {place})", kind.name()),
                None => format!("{} is not valid in {place}", kind.name()),
            };
            let error_kind = if Mode::closed_by(kind).is_some() {
                ErrorKind::Nesting
            } else {
                ErrorKind::IllegalState
            };
            return Err(RiError::new(error_kind, message));
        }
        if request.value_count() < kind.arity() {
            return Err(RiError::new(
                ErrorKind::MissingData,
                format!(
                    "{} needs at least {} values, found {}",
                    kind.name(),
                    kind.arity(),
                    request.value_count()
                ),
            ));
        }
        Ok(())
    }

    fn execute(&mut self, request: &Request) -> Result<(), RiError> {
        // Een expliciete `Begin` bevestigt de impliciet geopende context.
        if request.kind == RequestKind::Begin && self.implicit {
            self.implicit = false;
            self.backend.request(request);
            return Ok(());
        }
        self.validate(request)?;
        self.implicit = false;
        if let Some(count) = self.motion.as_mut() {
            if request.kind != RequestKind::MotionEnd {
                *count += 1;
                if *count > 1 {
                    log::debug!("{}: only the first motion sample is used", request.kind.name());
                    self.backend.request(request);
                    return Ok(());
                }
            }
        }
        self.apply(request)?;
        self.backend.request(request);
        Ok(())
    }

    fn apply(&mut self, request: &Request) -> Result<(), RiError> {
        let kind = request.kind;
        let mut args = Args::new(kind, &request.params);
        match kind {
            RequestKind::Begin => {
                self.modes.push(Mode::Begin)?;
                self.reset();
            }
            RequestKind::End => {
                if let Some(warning) = self.modes.teardown() {
                    self.report(warning);
                }
            }
            RequestKind::Declare => {
                let name = args.string()?;
                let decl = args.string()?;
                let (_, replaced) = self.dict.declare(name, decl)?;
                if replaced {
                    self.report(
                        RiError::new(ErrorKind::Consistency, format!("\"{name}\" redeclared as \"{decl}\""))
                            .with_severity(Severity::Info)
                            .at_line(request.line),
                    );
                }
            }
            RequestKind::ErrorHandler => {
                self.error_mode = match args.string()? {
                    "ignore" => ErrorMode::Ignore,
                    "print" => ErrorMode::Print,
                    "abort" => ErrorMode::Abort,
                    other => {
                        return Err(RiError::new(
                            ErrorKind::BadToken,
                            format!("ErrorHandler: unknown handler \"{other}\""),
                        ));
                    }
                };
            }
            RequestKind::FrameBegin => {
                self.modes.push(Mode::Frame)?;
                self.state.push_attributes();
            }
            RequestKind::FrameEnd => {
                self.modes.pop(Mode::Frame)?;
                self.state.pop_attributes()?;
            }
            RequestKind::WorldBegin => {
                self.modes.push(Mode::World)?;
                self.state.begin_world();
            }
            RequestKind::WorldEnd => {
                self.modes.pop(Mode::World)?;
                self.state.pop_attributes()?;
            }
            RequestKind::AttributeBegin => {
                self.modes.push(Mode::Attribute)?;
                self.state.push_attributes();
            }
            RequestKind::AttributeEnd => {
                self.modes.pop(Mode::Attribute)?;
                self.state.pop_attributes()?;
            }
            RequestKind::TransformBegin => {
                self.modes.push(Mode::Transform)?;
                self.state.push_transform();
            }
            RequestKind::TransformEnd => {
                self.modes.pop(Mode::Transform)?;
                self.state.pop_transform()?;
            }
            RequestKind::SolidBegin => {
                let operation = args.string()?;
                if !matches!(operation, "primitive" | "union" | "intersection" | "difference") {
                    return Err(RiError::new(
                        ErrorKind::BadToken,
                        format!("SolidBegin: unknown operation \"{operation}\""),
                    ));
                }
                self.modes.push(Mode::Solid)?;
                self.state.push_attributes();
                if operation != "primitive" {
                    self.report(
                        RiError::new(
                            ErrorKind::Unimplemented,
                            format!("SolidBegin \"{operation}\": members are emitted unchanged"),
                        )
                        .at_line(request.line),
                    );
                }
            }
            RequestKind::SolidEnd => {
                self.modes.pop(Mode::Solid)?;
                self.state.pop_attributes()?;
            }
            RequestKind::MotionBegin => {
                self.modes.push(Mode::Motion)?;
                self.motion = Some(0);
            }
            RequestKind::MotionEnd => {
                self.modes.pop(Mode::Motion)?;
                self.motion = None;
            }
            RequestKind::ResourceBegin => self.modes.push(Mode::Resource)?,
            RequestKind::ResourceEnd => {
                self.modes.pop(Mode::Resource)?;
            }
            RequestKind::ObjectBegin => {
                let handle = Handle::read(&mut args)?;
                self.modes.push(Mode::Object)?;
                self.recording = Some(Recording {
                    target: Target::Object(handle),
                    requests: Vec::new(),
                    nested: 0,
                });
            }
            RequestKind::ObjectInstance => {
                let handle = Handle::read(&mut args)?;
                let requests = self.objects.get(&handle).cloned().ok_or_else(|| {
                    RiError::new(ErrorKind::BadHandle, format!("ObjectInstance: unknown object {handle:?}"))
                })?;
                self.replay(kind, &requests)?;
            }
            RequestKind::ArchiveBegin => {
                let name = args.string()?.to_owned();
                self.modes.push(Mode::Archive)?;
                self.recording = Some(Recording {
                    target: Target::Archive(name),
                    requests: Vec::new(),
                    nested: 0,
                });
            }
            RequestKind::ReadArchive => {
                let name = args.string()?;
                self.read_archive(name)?;
            }
            RequestKind::ColorSamples => {
                let to_rgb = args.float_array()?;
                let from_rgb = args.float_array()?;
                if to_rgb.len() % 3 != 0 || to_rgb.len() != from_rgb.len() {
                    return Err(RiError::new(
                        ErrorKind::Consistency,
                        format!(
                            "ColorSamples: conversion matrices of {} and {} values do not match",
                            to_rgb.len(),
                            from_rgb.len()
                        ),
                    ));
                }
                let samples = to_rgb.len() / 3;
                self.dict.set_color_samples(samples)?;
                self.state.set_color_samples(samples);
            }
            RequestKind::Option => {
                if args.string()? == "tessellation" {
                    self.tessellation_option(args)?;
                }
            }
            RequestKind::Procedural | RequestKind::Geometry => {
                self.report(
                    RiError::new(ErrorKind::Unimplemented, format!("{} is passed through", kind.name()))
                        .at_line(request.line),
                );
            }
            _ => match kind.group() {
                RequestGroup::Transforms => self.state.apply_transform(request)?,
                RequestGroup::Attributes | RequestGroup::Moving => {
                    self.state.apply_attribute(request, &mut self.dict)?;
                }
                RequestGroup::Geometry => self.tessellate(request)?,
                _ => {}
            },
        }
        Ok(())
    }

    /// Nieuwe context na `End` gevolgd door `Begin`.
    fn reset(&mut self) {
        self.dict = DeclarationDictionary::with_defaults();
        self.state = GraphicsState::new(self.dict.color_samples(), self.options.tessellation);
        self.objects.clear();
        self.archives.clear();
        self.motion = None;
        self.layout = self.options.index_layout;
    }

    fn tessellation_option(&mut self, args: Args<'_>) -> Result<(), RiError> {
        for pair in args.token_list()? {
            let id = self.dict.resolve(pair.token)?;
            if self.dict.get(id).name != "layout" {
                continue;
            }
            let name = pair.value.as_str().unwrap_or_default();
            self.layout = IndexLayout::parse(name).ok_or_else(|| {
                RiError::new(
                    ErrorKind::BadToken,
                    format!("Option \"tessellation\": unknown layout \"{name}\""),
                )
            })?;
        }
        Ok(())
    }

    fn read_archive(&mut self, name: &str) -> Result<(), RiError> {
        if let Some(requests) = self.archives.get(name).cloned() {
            return self.replay(RequestKind::ReadArchive, &requests);
        }
        if self.depth >= self.options.max_archive_depth {
            return Err(RiError::new(
                ErrorKind::Limit,
                format!("ReadArchive: nesting deeper than {} levels", self.options.max_archive_depth),
            ));
        }
        let path = match &self.options.archive_search_path {
            Some(dir) => dir.join(name),
            None => PathBuf::from(name),
        };
        let file = File::open(&path).map_err(|err| {
            RiError::new(ErrorKind::NoFile, format!("ReadArchive: cannot open {}: {err}", path.display()))
        })?;
        self.depth += 1;
        self.read_stream(file, name);
        self.depth -= 1;
        Ok(())
    }

    fn tessellate(&mut self, request: &Request) -> Result<(), RiError> {
        let mut ctx = Context {
            dict: &mut self.dict,
            attributes: self.state.attributes(),
            layout: self.layout,
            tolerance: self.options.tolerance,
        };
        match geometry::tessellate(request, &mut ctx)? {
            Tessellated::Surfaces(surfaces) => {
                for surface in surfaces {
                    self.emit(surface)?;
                }
            }
            Tessellated::Unsupported(vars) => {
                log::debug!("{}: bound {} variables, not tessellated", request.kind.name(), vars.len());
                self.backend.unsupported(request.kind, &vars);
            }
            Tessellated::Deferred => {}
        }
        Ok(())
    }

    fn emit(&mut self, mut surface: Surface) -> Result<(), RiError> {
        let attributes = self.state.attributes();
        surface.transform = self.state.transform().to_row_major();
        surface.reversed = self.state.is_reversed();
        surface.two_sided = attributes.sides == 2;
        let samples = self.dict.color_samples();
        for (name, color) in [("Cs", &attributes.color), ("Os", &attributes.opacity)] {
            surface.vars.entry(name.to_owned()).or_insert_with(|| {
                SurfaceVar::constant(TypeKind::Color, samples, Values::Floats(color.clone()))
            });
        }
        surface
            .validate()
            .map_err(|message| RiError::new(ErrorKind::Bug, format!("{:?}: {message}", surface.primitive)))?;
        self.backend.surface(surface);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scene::ErrorCollect;

    fn session() -> Session<SceneCollector, ErrorCollect> {
        Session::with_handler(SceneCollector::new(), ErrorCollect::new(), SessionOptions::default())
    }

    fn run(text: &str) -> (SceneCollector, ErrorCollect) {
        let mut session = session();
        session.read_bytes(text.as_bytes(), "test.rib");
        session.finish()
    }

    #[test]
    fn world_geometry_becomes_surfaces() {
        let (scene, errors) = run(
            "WorldBegin\n\
             Polygon \"P\" [0 0 0 1 0 0 1 1 0 0 1 0]\n\
             WorldEnd\n",
        );
        assert!(errors.errors.is_empty(), "{:?}", errors.errors);
        assert_eq!(scene.surfaces.len(), 1);
        assert_eq!(scene.count(RequestKind::WorldBegin), 1);
        let cs = scene.surfaces[0].var("Cs").unwrap();
        assert!(!cs.per_vertex);
    }

    #[test]
    fn geometry_outside_world_is_rejected() {
        let (scene, errors) = run("Sphere 1 -1 1 360\n");
        assert!(scene.surfaces.is_empty());
        assert_eq!(errors.count(ErrorKind::IllegalState), 1);
        assert_eq!(errors.errors[0].line, Some(1));
        assert_eq!(errors.errors[0].locator.as_deref(), Some("test.rib"));
    }

    #[test]
    fn explicit_begin_confirms_the_implicit_context() {
        let (_, errors) = run("Begin\nWorldBegin\nWorldEnd\nEnd\n");
        assert!(errors.errors.is_empty(), "{:?}", errors.errors);
    }

    #[test]
    fn unmatched_end_leaves_the_stack_alone() {
        let mut session = session();
        session.read_bytes(b"WorldBegin\nAttributeEnd\n", "test.rib");
        assert_eq!(session.modes().depth(), 2);
        assert_eq!(session.handler().count(ErrorKind::Nesting), 1);
    }

    #[test]
    fn objects_are_recorded_then_instanced() {
        let (scene, errors) = run(
            "ObjectBegin 1\n\
             Sphere 1 -1 1 360\n\
             ObjectEnd\n\
             WorldBegin\n\
             ObjectInstance 1\n\
             Translate 2 0 0\n\
             ObjectInstance 1\n\
             WorldEnd\n",
        );
        assert!(errors.errors.is_empty(), "{:?}", errors.errors);
        assert_eq!(scene.surfaces.len(), 2);
        assert!((scene.surfaces[1].transform[12] - 2.0).abs() < 1e-6);
    }

    #[test]
    fn unknown_object_is_a_bad_handle() {
        let (_, errors) = run("WorldBegin\nObjectInstance \"missing\"\nWorldEnd\n");
        assert_eq!(errors.count(ErrorKind::BadHandle), 1);
    }

    #[test]
    fn inline_archives_replay_in_place() {
        let (scene, errors) = run(
            "ArchiveBegin \"ball\"\n\
             Sphere 1 -1 1 360\n\
             ArchiveEnd\n\
             WorldBegin\n\
             ReadArchive \"ball\"\n\
             ReadArchive \"ball\"\n\
             WorldEnd\n",
        );
        assert!(errors.errors.is_empty(), "{:?}", errors.errors);
        assert_eq!(scene.surfaces.len(), 2);
    }

    #[test]
    fn self_referencing_archive_hits_the_depth_limit() {
        let mut session = Session::with_handler(
            SceneCollector::new(),
            ErrorCollect::new(),
            SessionOptions {
                max_archive_depth: 4,
                ..SessionOptions::default()
            },
        );
        session.read_bytes(
            b"ArchiveBegin \"loop\"\nReadArchive \"loop\"\nArchiveEnd\nReadArchive \"loop\"\n",
            "test.rib",
        );
        let (_, errors) = session.finish();
        assert_eq!(errors.count(ErrorKind::Limit), 1);
    }

    #[test]
    fn missing_archive_file_is_reported() {
        let (_, errors) = run("ReadArchive \"no/such/file.rib\"\n");
        assert_eq!(errors.count(ErrorKind::NoFile), 1);
    }

    #[test]
    fn motion_uses_the_first_sample() {
        let (scene, errors) = run(
            "WorldBegin\n\
             MotionBegin [0 1]\n\
             Translate 1 0 0\n\
             Translate 5 0 0\n\
             MotionEnd\n\
             Sphere 1 -1 1 360\n\
             WorldEnd\n",
        );
        assert!(errors.errors.is_empty(), "{:?}", errors.errors);
        assert!((scene.surfaces[0].transform[12] - 1.0).abs() < 1e-6);
        assert_eq!(scene.count(RequestKind::Translate), 2);
    }

    #[test]
    fn color_samples_widen_colors() {
        let (scene, errors) = run(
            "ColorSamples [1 0 0 0 1 0 0 0 1 1 1 1] [1 0 0 0 1 0 0 0 1 1 1 1]\n\
             WorldBegin\n\
             Color [0.5 0.5 0.5 0.5]\n\
             Sphere 1 -1 1 360\n\
             WorldEnd\n",
        );
        assert!(errors.errors.is_empty(), "{:?}", errors.errors);
        let cs = scene.surfaces[0].var("Cs").unwrap();
        assert_eq!(cs.width, 4);
        assert_eq!(cs.values, Values::Floats(vec![0.5; 4]));
    }

    #[test]
    fn strips_layout_option() {
        let (scene, errors) = run(
            "Option \"tessellation\" \"string layout\" [\"strips\"]\n\
             Attribute \"tessellation\" \"integer u\" [4] \"integer v\" [2]\n\
             WorldBegin\n\
             Cylinder 1 0 1 360\n\
             WorldEnd\n",
        );
        assert!(errors.errors.is_empty(), "{:?}", errors.errors);
        assert_eq!(scene.surfaces[0].strip_lengths, vec![10, 10]);
    }

    #[test]
    fn oversized_tessellation_is_rejected() {
        let (scene, errors) = run(
            "WorldBegin\n\
             Attribute \"tessellation\" \"integer u\" [10000000000] \"integer v\" [10000000000]\n\
             Sphere 1 -1 1 360\n\
             WorldEnd\n",
        );
        assert_eq!(errors.errors.len(), 1, "{:?}", errors.errors);
        assert_eq!(errors.errors[0].kind, ErrorKind::Range);
        assert_eq!(errors.errors[0].line, Some(2));
        assert_eq!(scene.surfaces.len(), 1);
        assert_eq!(scene.surfaces[0].vertex_count(), 17 * 17);
    }

    #[test]
    fn redeclaration_is_informational() {
        let mut session = session();
        session.read_bytes(b"Declare \"foo\" \"uniform float\"\nDeclare \"foo\" \"varying float\"\n", "test.rib");
        assert_eq!(session.worst_severity(), Some(Severity::Info));
        let foo = session.declarations().find("foo").unwrap();
        assert_eq!(session.declarations().get(foo).class, crate::scene::StorageClass::Varying);
    }

    #[test]
    fn ignore_handler_suppresses_reports() {
        let (_, errors) = run("ErrorHandler \"ignore\"\nSphere 1 -1 1 360\n");
        assert!(errors.errors.is_empty());
    }

    #[test]
    fn abort_handler_stops_the_stream() {
        let (scene, _) = run(
            "ErrorHandler \"abort\"\n\
             Sphere 1 -1 1 360\n\
             WorldBegin\n\
             Sphere 1 -1 1 360\n\
             WorldEnd\n",
        );
        assert!(scene.surfaces.is_empty());
        assert_eq!(scene.count(RequestKind::WorldBegin), 0);
    }

    #[test]
    fn structured_comments_reach_the_backend() {
        let (scene, _) = run("##RenderMan RIB\n# plain\nversion 3.04\n");
        assert_eq!(scene.comments.len(), 1);
        assert!(scene.comments[0].structured);
        assert_eq!(scene.count(RequestKind::Version), 1);
    }

    #[test]
    fn open_blocks_warn_at_finish() {
        let (_, errors) = run("WorldBegin\nAttributeBegin\n");
        assert_eq!(errors.worst(), Some(Severity::Warning));
        assert_eq!(errors.count(ErrorKind::Nesting), 1);
    }
}
