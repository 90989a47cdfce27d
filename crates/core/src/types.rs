//! Gemeinsame Wertetypen fuer Siegel
//!
//! Fingerprint und Signatur verwenden das Newtype-Pattern, damit die
//! beiden Hex-Strings zur Compilezeit nicht verwechselt werden koennen.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::error::CoreError;

/// Art einer gespeicherten Nachricht
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageType {
    Message,
    System,
    Error,
}

impl MessageType {
    /// Alle bekannten Typen in Header-Schreibweise
    pub const ALLE: [MessageType; 3] = [Self::Message, Self::System, Self::Error];

    /// Schreibweise im `Type:`-Header
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Message => "message",
            Self::System => "system",
            Self::Error => "error",
        }
    }
}

impl Default for MessageType {
    fn default() -> Self {
        Self::Message
    }
}

impl fmt::Display for MessageType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for MessageType {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "message" => Ok(Self::Message),
            "system" => Ok(Self::System),
            "error" => Ok(Self::Error),
            andere => Err(CoreError::UnbekannterNachrichtentyp(andere.to_string())),
        }
    }
}

/// Autoren-Identitaet: die ersten 8 Hex-Zeichen des SHA-256 ueber die
/// kanonische Kodierung eines oeffentlichen Schluessels
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Fingerprint(String);

impl Fingerprint {
    /// Anzahl Hex-Zeichen eines Fingerprints
    pub const LAENGE: usize = 8;

    /// Berechnet den Fingerprint aus der kanonischen Schluessel-Kodierung
    pub fn aus_kodierung(kodierung: &[u8]) -> Self {
        let digest = Sha256::digest(kodierung);
        let mut hex = hex::encode(digest);
        hex.truncate(Self::LAENGE);
        Self(hex)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl FromStr for Fingerprint {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let gueltig = s.len() == Self::LAENGE
            && s.bytes().all(|b| matches!(b, b'0'..=b'9' | b'a'..=b'f'));
        if gueltig {
            Ok(Self(s.to_string()))
        } else {
            Err(CoreError::UngueltigerFingerprint(s.to_string()))
        }
    }
}

impl TryFrom<String> for Fingerprint {
    type Error = CoreError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        s.parse()
    }
}

impl From<Fingerprint> for String {
    fn from(fp: Fingerprint) -> Self {
        fp.0
    }
}

impl fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Hex-kodierte Signatur, wie sie im `Signature:`-Header steht
///
/// Der Inhalt wird beim Einlesen nicht geprueft: eine manipulierte
/// Signatur muss lesbar bleiben und faellt erst bei der Verifikation auf.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Signature(String);

impl Signature {
    /// Kodiert rohe Signatur-Bytes als Hex (klein)
    pub fn aus_bytes(bytes: &[u8]) -> Self {
        Self(hex::encode(bytes))
    }

    /// Uebernimmt einen Hex-String ungeprueft
    pub fn aus_hex(hex: impl Into<String>) -> Self {
        Self(hex.into())
    }

    /// Dekodiert die Hex-Darstellung, `None` bei ungueltigem Hex
    pub fn bytes(&self) -> Option<Vec<u8>> {
        hex::decode(&self.0).ok()
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Signature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
