//! Fehlertypen fuer die gemeinsamen Wertetypen

use thiserror::Error;

/// Fehler beim Parsen der gemeinsamen Wertetypen
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CoreError {
    #[error("Unbekannter Nachrichtentyp: '{0}' (erlaubt: message, system, error)")]
    UnbekannterNachrichtentyp(String),

    #[error("Ungueltiger Fingerprint: '{0}' (erwartet: 8 Hex-Zeichen, klein)")]
    UngueltigerFingerprint(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fehler_anzeige() {
        let e = CoreError::UnbekannterNachrichtentyp("bogus".into());
        assert!(e.to_string().contains("'bogus'"));
    }
}
