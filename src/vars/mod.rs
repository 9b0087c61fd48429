//! Primitieve variabelen: verwachte aantallen per opslagklasse en het binden
//! van parameterwaarden.

pub mod binder;
pub mod counts;

pub use binder::{BoundVar, FaceSelection, PrimVars};
pub use counts::ValueCounts;
