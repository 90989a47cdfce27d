//! Fehlertypen fuer das Chat-Crate

use thiserror::Error;

use crate::codec::CodecError;

/// Chat-Fehlertypen
#[derive(Debug, Error)]
pub enum ChatError {
    #[error("Nachricht nicht gefunden: {0}")]
    NachrichtNichtGefunden(String),

    #[error("Ungueltiger Datensatz: {0}")]
    UngueltigerDatensatz(#[from] CodecError),

    #[error("Keine freien Dateinamen fuer {stempel} nach {versuche} Versuchen")]
    KollisionenErschoepft { stempel: String, versuche: u32 },

    #[error("Kryptografie-Fehler: {0}")]
    Krypto(#[from] siegel_crypto::CryptoError),

    #[error("IO-Fehler: {0}")]
    Io(#[from] std::io::Error),
}

impl ChatError {
    /// Gibt true zurueck wenn die Datei waehrend des Zugriffs nicht existierte
    pub fn ist_nicht_gefunden(&self) -> bool {
        match self {
            Self::NachrichtNichtGefunden(_) => true,
            Self::Io(e) => e.kind() == std::io::ErrorKind::NotFound,
            _ => false,
        }
    }
}

pub type ChatResult<T> = Result<T, ChatError>;
