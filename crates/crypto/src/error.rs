//! Fehlertypen fuer das Kryptografie-Subsystem

use std::path::PathBuf;

use thiserror::Error;

/// Fehler im Kryptografie-Subsystem
#[derive(Debug, Error)]
pub enum CryptoError {
    /// Schluesseldateien fehlen teilweise, sind unlesbar oder fehlerhaft
    #[error("Schluessel-Speicher fehlerhaft ({}): {grund}", pfad.display())]
    SchluesselSpeicher { pfad: PathBuf, grund: String },

    #[error("Schluessel-Generierung fehlgeschlagen: {0}")]
    SchluesselGenerierung(String),

    #[error("Signierung fehlgeschlagen: {0}")]
    Signierung(String),
}

impl CryptoError {
    pub(crate) fn speicher(pfad: impl Into<PathBuf>, grund: impl ToString) -> Self {
        Self::SchluesselSpeicher {
            pfad: pfad.into(),
            grund: grund.to_string(),
        }
    }
}

pub type CryptoResult<T> = Result<T, CryptoError>;
