//! De uitvoerkant van een sessie: ontvanger van oppervlakken, requests en
//! gestructureerd commentaar.

use std::collections::BTreeMap;

use serde::Serialize;

use crate::geom::Surface;
use crate::parse::Comment;
use crate::scene::{Request, RequestKind};
use crate::vars::PrimVars;

/// Consument van alles wat een sessie oplevert.
///
/// Een [`Surface`] gaat bij overdracht volledig naar de backend.
pub trait Backend {
    /// Een getesselleerd oppervlak.
    fn surface(&mut self, surface: Surface);

    /// Elk request dat gevalideerd en uitgevoerd is, in volgorde.
    fn request(&mut self, _request: &Request) {}

    /// Gestructureerd (`##`) commentaar uit de stroom.
    fn comment(&mut self, _comment: &Comment) {}

    /// Een primitief dat gebonden is maar niet getesselleerd wordt.
    fn unsupported(&mut self, _kind: RequestKind, _vars: &PrimVars) {}
}

impl<B: Backend + ?Sized> Backend for &mut B {
    fn surface(&mut self, surface: Surface) {
        (**self).surface(surface);
    }

    fn request(&mut self, request: &Request) {
        (**self).request(request);
    }

    fn comment(&mut self, comment: &Comment) {
        (**self).comment(comment);
    }

    fn unsupported(&mut self, kind: RequestKind, vars: &PrimVars) {
        (**self).unsupported(kind, vars);
    }
}

/// Backend die alles bewaart; gebruikt door de CLI, de wasm-facade en tests.
#[derive(Debug, Default, Clone, Serialize)]
pub struct SceneCollector {
    pub surfaces: Vec<Surface>,
    pub comments: Vec<Comment>,
    /// Aantal uitgevoerde requests per soort.
    pub requests: BTreeMap<RequestKind, usize>,
    pub unsupported: Vec<RequestKind>,
}

impl SceneCollector {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn request_count(&self) -> usize {
        self.requests.values().sum()
    }

    #[must_use]
    pub fn count(&self, kind: RequestKind) -> usize {
        self.requests.get(&kind).copied().unwrap_or(0)
    }

    #[must_use]
    pub fn triangle_count(&self) -> usize {
        self.surfaces.iter().map(Surface::triangle_count).sum()
    }
}

impl Backend for SceneCollector {
    fn surface(&mut self, surface: Surface) {
        self.surfaces.push(surface);
    }

    fn request(&mut self, request: &Request) {
        *self.requests.entry(request.kind).or_insert(0) += 1;
    }

    fn comment(&mut self, comment: &Comment) {
        self.comments.push(comment.clone());
    }

    fn unsupported(&mut self, kind: RequestKind, _vars: &PrimVars) {
        self.unsupported.push(kind);
    }
}
