//! Ereignisse des Nachrichtenspeichers
//!
//! Ereignisse werden erst nach dem Festschreiben einer Nachricht
//! verschickt. Abonnenten (z.B. ein Veroeffentlicher) arbeiten
//! ausserhalb des Schreibpfads; ihr Scheitern beruehrt den Speicher nicht.

use std::path::PathBuf;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::types::{Fingerprint, MessageType};

/// Alle Ereignisse die der ChatService verschickt
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum SiegelEvent {
    /// Eine Nachricht wurde unter ihrem endgueltigen Namen festgeschrieben
    NachrichtGespeichert {
        /// Speicher-Schluessel (Dateiname)
        key: String,
        /// Vollstaendiger Pfad der Datei
        pfad: PathBuf,
        fingerprint: Fingerprint,
        message_type: MessageType,
        date: DateTime<Utc>,
    },
}
