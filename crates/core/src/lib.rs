//! siegel-core – Gemeinsame Typen, Ereignisse und Fehlertypen
//!
//! Dieses Crate stellt die Wertetypen bereit, die Schluesselverwaltung
//! (`siegel-crypto`) und Nachrichtenspeicher (`siegel-chat`) gemeinsam
//! verwenden.

pub mod error;
pub mod event;
pub mod types;

// Re-Exporte fuer bequemen Zugriff
pub use error::CoreError;
pub use event::SiegelEvent;
pub use types::{Fingerprint, MessageType, Signature};
