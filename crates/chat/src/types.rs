//! Oeffentliche Typen fuer den Nachrichtenspeicher

use std::cmp::Ordering;
use std::fmt;

use chrono::{DateTime, NaiveDateTime, SubsecRound, Utc};
use serde::{Deserialize, Serialize};
use siegel_core::{Fingerprint, MessageType, Signature};

/// Eine signierte Nachricht, so wie sie auf der Platte liegt
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MessageRecord {
    /// Erstellungszeitpunkt
    pub date: DateTime<Utc>,
    #[serde(rename = "type")]
    pub message_type: MessageType,
    /// Identitaet des Verfassers
    pub fingerprint: Fingerprint,
    /// Signatur ueber `content`
    pub signature: Signature,
    /// Signierter Inhalt, unveraendert
    pub content: String,
}

/// Speicher-Schluessel einer Nachricht: `YYYYMMDD_HHMMSS[_N].txt`
///
/// Sortiert nach Zeitstempel, dann numerisch nach Suffix
/// (`_2` vor `_10`). Suffix 0 steht fuer den Namen ohne Suffix.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RecordKey {
    stempel: NaiveDateTime,
    suffix: u32,
}

impl RecordKey {
    /// Dateiendung aller Nachrichten
    pub const ENDUNG: &'static str = ".txt";

    const STEMPEL_FORMAT: &'static str = "%Y%m%d_%H%M%S";
    const STEMPEL_LAENGE: usize = 15;

    /// Schluessel fuer `date` (sekundengenau) mit Kollisions-Suffix
    pub fn neu(date: &DateTime<Utc>, suffix: u32) -> Self {
        Self {
            stempel: date.naive_utc().trunc_subsecs(0),
            suffix,
        }
    }

    /// Liest einen Dateinamen; `None` wenn er nicht der Konvention folgt
    pub fn parse(name: &str) -> Option<Self> {
        let stamm = name.strip_suffix(Self::ENDUNG)?;
        let stempel_text = stamm.get(..Self::STEMPEL_LAENGE)?;
        let stempel = NaiveDateTime::parse_from_str(stempel_text, Self::STEMPEL_FORMAT).ok()?;

        let suffix = match &stamm[Self::STEMPEL_LAENGE..] {
            "" => 0,
            rest => {
                let zahl = rest.strip_prefix('_')?;
                let n: u32 = zahl.parse().ok()?;
                // Nur kanonische Schreibweise: kein "_0", kein "_01"
                if n == 0 || n.to_string() != zahl {
                    return None;
                }
                n
            }
        };

        Some(Self { stempel, suffix })
    }

    pub fn suffix(&self) -> u32 {
        self.suffix
    }

    /// Zeitstempel-Teil des Namens, z.B. `20250108_152842`
    pub fn stempel(&self) -> String {
        self.stempel.format(Self::STEMPEL_FORMAT).to_string()
    }

    pub fn file_name(&self) -> String {
        if self.suffix == 0 {
            format!("{}{}", self.stempel(), Self::ENDUNG)
        } else {
            format!("{}_{}{}", self.stempel(), self.suffix, Self::ENDUNG)
        }
    }
}

impl fmt::Display for RecordKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.file_name())
    }
}

/// Eine festgeschriebene Nachricht mit ihrem Speicher-Schluessel
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredMessage {
    /// Dateiname im Nachrichtenverzeichnis
    pub key: String,
    #[serde(flatten)]
    pub record: MessageRecord,
}

impl StoredMessage {
    /// Reihenfolge der Auflistung: Datum, dann Speicher-Schluessel
    pub fn chronologisch(&self, other: &Self) -> Ordering {
        self.record
            .date
            .cmp(&other.record.date)
            .then_with(|| RecordKey::parse(&self.key).cmp(&RecordKey::parse(&other.key)))
            .then_with(|| self.key.cmp(&other.key))
    }
}

/// Eine Nachricht mit dem Ergebnis der Signaturpruefung
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CheckedMessage {
    #[serde(flatten)]
    pub nachricht: StoredMessage,
    /// `false` bedeutet: manipuliert oder von unbekanntem Schluessel
    pub verified: bool,
}

/// Eine Datei, die beim Auflisten uebersprungen wurde
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SkippedRecord {
    pub key: String,
    pub grund: String,
}

/// Ergebnis von `MessageStore::list`
#[derive(Debug, Clone, Default)]
pub struct Listing {
    /// Lesbare Nachrichten, chronologisch sortiert
    pub records: Vec<StoredMessage>,
    /// Nicht lesbare Dateien (Fehler-Senke)
    pub skipped: Vec<SkippedRecord>,
}

/// Ergebnis von `ChatService::verlauf`
#[derive(Debug, Clone, Default, Serialize)]
pub struct Verlauf {
    pub nachrichten: Vec<CheckedMessage>,
    pub skipped: Vec<SkippedRecord>,
}

impl Verlauf {
    /// Anzahl der Nachrichten mit ungueltiger Signatur
    pub fn manipuliert(&self) -> usize {
        self.nachrichten.iter().filter(|n| !n.verified).count()
    }
}
