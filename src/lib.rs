#![warn(clippy::all, clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod geom;
pub mod interp;
pub mod parse;
pub mod scene;
pub mod vars;

use std::fmt;

use interp::{SceneCollector, Session, SessionOptions};
use scene::{ErrorCollect, Severity};
use serde::Serialize;
use wasm_bindgen::JsError;
use wasm_bindgen::prelude::*;

cfg_if::cfg_if! {
    if #[cfg(all(feature = "console_error_panic_hook", target_arch = "wasm32"))] {
        #[wasm_bindgen(start)]
        pub fn initialize() {
            console_error_panic_hook::set_once();
            init_logger();
        }
    } else {
        #[wasm_bindgen(start)]
        pub fn initialize() {
            init_logger();
        }
    }
}

#[cfg(feature = "debug_logs")]
fn init_logger() {
    use log::LevelFilter;
    use wasm_bindgen_console_logger::DEFAULT_LOGGER;
    log::set_logger(&DEFAULT_LOGGER).expect("error initializing logger");
    log::set_max_level(LevelFilter::Debug);
}

#[cfg(not(feature = "debug_logs"))]
fn init_logger() {}

#[macro_export]
macro_rules! debug_log {
    ($($t:tt)*) => {{
        #[cfg(feature = "debug_logs")]
        {
            #[cfg(target_arch = "wasm32")]
            {
                ::web_sys::console::log_1(&::wasm_bindgen::JsValue::from_str(&format!($($t)*)));
            }
            #[cfg(not(target_arch = "wasm32"))]
            {
                println!("{}", format!($($t)*));
            }
        }
    }};
}

/// Samenvatting van de laatst geladen stroom.
#[derive(Debug, Serialize)]
struct LoadSummary {
    requests: usize,
    surfaces: usize,
    triangles: usize,
    unsupported: usize,
    errors: usize,
}

/// Public entry point for consumers.
#[wasm_bindgen]
pub struct Engine {
    options: SessionOptions,
    scene: Option<SceneCollector>,
    errors: ErrorCollect,
}

impl Default for Engine {
    fn default() -> Self {
        Self::new()
    }
}

#[wasm_bindgen]
impl Engine {
    #[wasm_bindgen(constructor)]
    #[must_use]
    pub fn new() -> Engine {
        Engine {
            options: SessionOptions::default(),
            scene: None,
            errors: ErrorCollect::new(),
        }
    }

    /// Standaardresolutie voor parametrische oppervlakken in volgende loads.
    #[wasm_bindgen]
    pub fn set_tessellation(&mut self, u: u32, v: u32) -> Result<(), JsValue> {
        let max = geom::MAX_RESOLUTION as u32;
        if u == 0 || v == 0 || u > max || v > max {
            return Err(js_error(&format!("tessellatieresolutie moet tussen 1 en {max} liggen")));
        }
        self.options.tessellation = (u as usize, v as usize);
        Ok(())
    }

    /// `"triangles"` of `"strips"`.
    #[wasm_bindgen]
    pub fn set_index_layout(&mut self, layout: &str) -> Result<(), JsValue> {
        self.options.index_layout = geom::IndexLayout::parse(layout)
            .ok_or_else(|| js_error(&format!("onbekende indexindeling `{layout}`")))?;
        Ok(())
    }

    /// Decodeert en interpreteert een tekst- of binaire RIB-stroom. Fouten in
    /// de stroom zijn achteraf op te vragen met `get_errors`.
    #[wasm_bindgen]
    pub fn load_rib(&mut self, bytes: &[u8]) -> Result<JsValue, JsValue> {
        let summary = self.load(bytes);
        serde_wasm_bindgen::to_value(&summary).map_err(to_js_error)
    }

    /// Alle getesselleerde oppervlakken van de laatste load.
    #[wasm_bindgen]
    pub fn get_surfaces(&self) -> Result<JsValue, JsValue> {
        let Some(scene) = self.scene.as_ref() else {
            return Err(js_error("er is geen RIB-stroom geladen"));
        };
        serde_wasm_bindgen::to_value(&scene.surfaces).map_err(to_js_error)
    }

    #[wasm_bindgen]
    pub fn get_errors(&self) -> Result<JsValue, JsValue> {
        serde_wasm_bindgen::to_value(&self.errors.errors).map_err(to_js_error)
    }

    /// Zwaarste ernst van de laatste load, of `undefined` zonder meldingen.
    #[wasm_bindgen]
    #[must_use]
    pub fn worst_severity(&self) -> Option<String> {
        self.errors.worst().map(|severity: Severity| severity.to_string())
    }

    #[wasm_bindgen]
    #[must_use]
    pub fn surface_count(&self) -> usize {
        self.scene.as_ref().map_or(0, |scene| scene.surfaces.len())
    }
}

impl Engine {
    fn load(&mut self, bytes: &[u8]) -> LoadSummary {
        let mut session = Session::with_handler(
            SceneCollector::new(),
            ErrorCollect::new(),
            self.options.clone(),
        );
        session.read_bytes(bytes, "<memory>");
        let (scene, errors) = session.finish();
        log::debug!(
            "loaded {} requests, {} surfaces, {} errors",
            scene.request_count(),
            scene.surfaces.len(),
            errors.errors.len()
        );
        let summary = LoadSummary {
            requests: scene.request_count(),
            surfaces: scene.surfaces.len(),
            triangles: scene.triangle_count(),
            unsupported: scene.unsupported.len(),
            errors: errors.errors.len(),
        };
        self.scene = Some(scene);
        self.errors = errors;
        summary
    }
}

fn to_js_error<E: fmt::Display>(error: E) -> JsValue {
    js_error(&error.to_string())
}

fn js_error(message: &str) -> JsValue {
    #[cfg(target_arch = "wasm32")]
    {
        JsError::new(message).into()
    }
    #[cfg(not(target_arch = "wasm32"))]
    {
        let _ = message;
        JsValue::NULL
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SCENE: &[u8] = b"WorldBegin\nSphere 1 -1 1 360\nBogus 1 2\nWorldEnd\n";

    #[test]
    fn engine_keeps_surfaces_and_errors_of_last_load() {
        let mut engine = Engine::new();
        assert_eq!(engine.surface_count(), 0);
        let summary = engine.load(SCENE);
        assert_eq!(summary.surfaces, 1);
        assert_eq!(summary.requests, 3);
        assert_eq!(engine.surface_count(), 1);
        assert_eq!(engine.errors.errors.len(), 1);
        assert_eq!(engine.worst_severity().as_deref(), Some("error"));
    }

    #[test]
    fn engine_rejects_zero_tessellation() {
        let mut engine = Engine::new();
        assert!(engine.set_tessellation(0, 4).is_err());
        assert!(engine.set_tessellation(8, u32::MAX).is_err());
        assert!(engine.set_tessellation(8, 4).is_ok());
        assert_eq!(engine.options.tessellation, (8, 4));
    }
}
