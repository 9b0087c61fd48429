//! Fouttaxonomie en foutafhandeling voor de scene-interface.
//!
//! Herstelbare fouten (syntaxis, nesting, ontbrekende data) worden als
//! [`RiError`]-waarden doorgegeven aan een [`ErrorHandler`]; alleen fouten met
//! ernst [`Severity::Severe`] breken de omsluitende operatie af.

use std::fmt;

use serde::Serialize;
use thiserror::Error;

/// Ernst van een gerapporteerde fout, oplopend geordend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub enum Severity {
    Info,
    Warning,
    Error,
    Severe,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::Info => "info",
            Self::Warning => "warning",
            Self::Error => "error",
            Self::Severe => "severe",
        };
        f.write_str(label)
    }
}

/// Soort fout.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum ErrorKind {
    /// Onleesbare of ongeldige token.
    Syntax,
    /// Onbekende of niet-gedeclareerde parameter-token.
    BadToken,
    /// Inconsistente data, bijvoorbeeld een verkeerd aantal waarden.
    Consistency,
    /// Array met gemengde types of niet-sluitende haken.
    BadArray,
    /// Request is niet geldig in de huidige modus.
    IllegalState,
    /// Begin/End paren kloppen niet.
    Nesting,
    /// Een verplichte parameter ontbreekt.
    MissingData,
    /// Numeriek argument buiten het geldige bereik.
    Range,
    /// Verwijzing naar een onbekend object, archief of coördinatenstelsel.
    BadHandle,
    OutOfMemory,
    /// Interne invariant geschonden.
    Bug,
    /// Bestand niet gevonden.
    NoFile,
    /// I/O-fout op de onderliggende stroom.
    System,
    /// Herkend maar niet uitgevoerd.
    Unimplemented,
    /// Een ingestelde limiet is overschreden.
    Limit,
}

impl ErrorKind {
    /// Standaard-ernst waarmee deze soort gerapporteerd wordt.
    #[must_use]
    pub const fn default_severity(self) -> Severity {
        match self {
            Self::Unimplemented => Severity::Warning,
            Self::OutOfMemory | Self::Bug | Self::System => Severity::Severe,
            Self::Syntax
            | Self::BadToken
            | Self::Consistency
            | Self::BadArray
            | Self::IllegalState
            | Self::Nesting
            | Self::MissingData
            | Self::Range
            | Self::BadHandle
            | Self::NoFile
            | Self::Limit => Severity::Error,
        }
    }

    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Syntax => "syntax",
            Self::BadToken => "bad token",
            Self::Consistency => "consistency",
            Self::BadArray => "bad array",
            Self::IllegalState => "illegal state",
            Self::Nesting => "nesting",
            Self::MissingData => "missing data",
            Self::Range => "range",
            Self::BadHandle => "bad handle",
            Self::OutOfMemory => "out of memory",
            Self::Bug => "internal",
            Self::NoFile => "no file",
            Self::System => "system",
            Self::Unimplemented => "unimplemented",
            Self::Limit => "limit",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Eén gerapporteerde fout: soort, ernst, bericht en bronlocatie.
#[derive(Debug, Clone, PartialEq, Error, Serialize)]
#[error("{severity} ({kind}): {message}")]
pub struct RiError {
    pub kind: ErrorKind,
    pub severity: Severity,
    pub message: String,
    pub line: Option<usize>,
    pub locator: Option<String>,
}

impl RiError {
    #[must_use]
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            severity: kind.default_severity(),
            message: message.into(),
            line: None,
            locator: None,
        }
    }

    #[must_use]
    pub fn with_severity(mut self, severity: Severity) -> Self {
        self.severity = severity;
        self
    }

    /// Zet de regel, tenzij die al bekend is.
    #[must_use]
    pub fn at_line(mut self, line: usize) -> Self {
        self.line.get_or_insert(line);
        self
    }

    /// Zet de bronnaam, tenzij die al bekend is.
    #[must_use]
    pub fn in_stream(mut self, locator: &str) -> Self {
        if self.locator.is_none() {
            self.locator = Some(locator.to_owned());
        }
        self
    }

    #[must_use]
    pub fn is_severe(&self) -> bool {
        self.severity >= Severity::Severe
    }

    /// Bericht inclusief `bron:regel` voorvoegsel, bedoeld voor logging.
    #[must_use]
    pub fn describe(&self) -> String {
        match (&self.locator, self.line) {
            (Some(locator), Some(line)) => format!("{locator}:{line}: {self}"),
            (Some(locator), None) => format!("{locator}: {self}"),
            (None, Some(line)) => format!("line {line}: {self}"),
            (None, None) => self.to_string(),
        }
    }
}

/// Ontvanger van alle gerapporteerde fouten binnen een sessie.
pub trait ErrorHandler {
    fn handle(&mut self, error: &RiError);
}

/// Negeert alle fouten.
#[derive(Debug, Default, Clone, Copy)]
pub struct ErrorIgnore;

impl ErrorHandler for ErrorIgnore {
    fn handle(&mut self, _error: &RiError) {}
}

/// Stuurt fouten door naar de `log`-facade.
#[derive(Debug, Default, Clone, Copy)]
pub struct ErrorLog;

impl ErrorHandler for ErrorLog {
    fn handle(&mut self, error: &RiError) {
        match error.severity {
            Severity::Info => log::info!("{}", error.describe()),
            Severity::Warning => log::warn!("{}", error.describe()),
            Severity::Error | Severity::Severe => log::error!("{}", error.describe()),
        }
    }
}

/// Verzamelt fouten zodat ze achteraf geïnspecteerd kunnen worden.
#[derive(Debug, Default, Clone)]
pub struct ErrorCollect {
    pub errors: Vec<RiError>,
}

impl ErrorCollect {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn count(&self, kind: ErrorKind) -> usize {
        self.errors.iter().filter(|e| e.kind == kind).count()
    }

    #[must_use]
    pub fn worst(&self) -> Option<Severity> {
        self.errors.iter().map(|e| e.severity).max()
    }
}

impl ErrorHandler for ErrorCollect {
    fn handle(&mut self, error: &RiError) {
        log::debug!("{}", error.describe());
        self.errors.push(error.clone());
    }
}

impl<H: ErrorHandler + ?Sized> ErrorHandler for &mut H {
    fn handle(&mut self, error: &RiError) {
        (**self).handle(error);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn severity_is_ordered() {
        assert!(Severity::Info < Severity::Warning);
        assert!(Severity::Warning < Severity::Error);
        assert!(Severity::Error < Severity::Severe);
    }

    #[test]
    fn location_is_only_set_once() {
        let err = RiError::new(ErrorKind::Syntax, "bad")
            .at_line(3)
            .at_line(9)
            .in_stream("a.rib")
            .in_stream("b.rib");
        assert_eq!(err.line, Some(3));
        assert_eq!(err.locator.as_deref(), Some("a.rib"));
        assert_eq!(err.describe(), "a.rib:3: error (syntax): bad");
    }

    #[test]
    fn collector_tracks_worst_severity() {
        let mut collect = ErrorCollect::new();
        collect.handle(&RiError::new(ErrorKind::Unimplemented, "x"));
        collect.handle(&RiError::new(ErrorKind::Range, "y"));
        assert_eq!(collect.worst(), Some(Severity::Error));
        assert_eq!(collect.count(ErrorKind::Range), 1);
    }
}
