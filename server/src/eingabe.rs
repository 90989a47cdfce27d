//! Eingabe-Aufbereitung vor dem Signieren
//!
//! Der Speicher nimmt jeden Inhalt unveraendert entgegen. Die aeussere
//! Schicht entfernt vorher Steuerzeichen, begrenzt die Groesse und weist
//! leere Nachrichten ab.

use siegel_core::MessageType;
use thiserror::Error;

/// Fehler bei der Eingabe-Aufbereitung
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EingabeFehler {
    #[error("Nachrichteninhalt darf nicht leer sein")]
    Leer,

    #[error("Nachricht zu lang: {bytes} Bytes (Maximum: {max} Bytes)")]
    ZuLang { bytes: usize, max: usize },

    #[error(transparent)]
    UngueltigerTyp(#[from] siegel_core::CoreError),
}

/// Bereitet einen Nachrichteninhalt zum Signieren auf
///
/// Entfernt alle Zeichen unter U+0020 ausser `\n`, prueft die Groesse und
/// schneidet umgebende Leerzeichen ab.
pub fn inhalt_aufbereiten(content: &str, max_bytes: usize) -> Result<String, EingabeFehler> {
    let bereinigt: String = content
        .chars()
        .filter(|&c| c == '\n' || c >= ' ')
        .collect();

    if bereinigt.len() > max_bytes {
        return Err(EingabeFehler::ZuLang {
            bytes: bereinigt.len(),
            max: max_bytes,
        });
    }

    let getrimmt = bereinigt.trim();
    if getrimmt.is_empty() {
        return Err(EingabeFehler::Leer);
    }
    Ok(getrimmt.to_string())
}

/// Liest einen Nachrichtentyp aus der Eingabe
pub fn typ_parsen(typ: &str) -> Result<MessageType, EingabeFehler> {
    Ok(typ.parse()?)
}
