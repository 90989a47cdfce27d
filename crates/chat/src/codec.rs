//! Kanonisches Textformat einer Nachricht
//!
//! ```text
//! Date: 2025-01-08T15:28:42.123456Z
//! Type: message
//! Fingerprint: 1a2b3c4d
//! Signature: 5e6f...
//!
//! <Inhalt, unveraendert, darf Zeilenumbrueche enthalten>
//! ```
//!
//! Der Codec prueft keine Signaturen. Das ist Aufgabe des Aufrufers.

use chrono::{DateTime, NaiveDateTime, SecondsFormat, Utc};
use siegel_core::{Fingerprint, MessageType, Signature};
use thiserror::Error;

use crate::types::MessageRecord;

const DATE: &str = "Date";
const TYPE: &str = "Type";
const FINGERPRINT: &str = "Fingerprint";
const SIGNATURE: &str = "Signature";

/// Fehler beim Lesen eines Datensatzes
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CodecError {
    #[error("Header '{0}' fehlt")]
    HeaderFehlt(&'static str),

    #[error("Header '{0}' ist mehrfach vorhanden")]
    HeaderDoppelt(&'static str),

    #[error("Keine Leerzeile zwischen Headern und Inhalt")]
    KeinTrenner,

    #[error("Unbekannter Nachrichtentyp: '{0}'")]
    UnbekannterTyp(String),

    #[error("Ungueltiges Datum: '{0}'")]
    UngueltigesDatum(String),

    #[error("Ungueltiger Fingerprint: '{0}'")]
    UngueltigerFingerprint(String),

    #[error("Datensatz ist kein gueltiges UTF-8")]
    KeinUtf8,
}

/// Kodiert einen Datensatz in das kanonische Textformat
pub fn encode(record: &MessageRecord) -> String {
    format!(
        "{DATE}: {}\n{TYPE}: {}\n{FINGERPRINT}: {}\n{SIGNATURE}: {}\n\n{}",
        record.date.to_rfc3339_opts(SecondsFormat::AutoSi, true),
        record.message_type,
        record.fingerprint,
        record.signature,
        record.content
    )
}

/// Dekodiert rohe Dateibytes
pub fn decode_bytes(bytes: &[u8]) -> Result<MessageRecord, CodecError> {
    let text = std::str::from_utf8(bytes).map_err(|_| CodecError::KeinUtf8)?;
    decode(text)
}

/// Dekodiert das kanonische Textformat
///
/// Header werden bis zur ersten Leerzeile gelesen, alles danach ist Inhalt.
/// Unbekannte Header werden ignoriert.
pub fn decode(text: &str) -> Result<MessageRecord, CodecError> {
    let mut date = None;
    let mut message_type = None;
    let mut fingerprint = None;
    let mut signature = None;
    let mut inhalt_start = None;

    let mut offset = 0;
    for zeile in text.split_inclusive('\n') {
        offset += zeile.len();
        let zeile = zeile.trim_end_matches('\n').trim_end_matches('\r');

        if zeile.is_empty() {
            // Leerzeile nur als Trenner, wenn sie tatsaechlich endet
            if text[..offset].ends_with('\n') {
                inhalt_start = Some(offset);
            }
            break;
        }

        let Some((name, wert)) = zeile.split_once(':') else {
            continue;
        };
        let wert = wert.trim();
        match name.trim() {
            DATE => setzen(&mut date, DATE, wert)?,
            TYPE => setzen(&mut message_type, TYPE, wert)?,
            FINGERPRINT => setzen(&mut fingerprint, FINGERPRINT, wert)?,
            SIGNATURE => setzen(&mut signature, SIGNATURE, wert)?,
            _ => {}
        }
    }

    let inhalt_start = inhalt_start.ok_or(CodecError::KeinTrenner)?;

    let date = datum_parsen(date.ok_or(CodecError::HeaderFehlt(DATE))?)?;
    let typ_text = message_type.ok_or(CodecError::HeaderFehlt(TYPE))?;
    let message_type: MessageType = typ_text
        .parse()
        .map_err(|_| CodecError::UnbekannterTyp(typ_text.to_string()))?;
    let fp_text = fingerprint.ok_or(CodecError::HeaderFehlt(FINGERPRINT))?;
    let fingerprint: Fingerprint = fp_text
        .parse()
        .map_err(|_| CodecError::UngueltigerFingerprint(fp_text.to_string()))?;
    let signature = signature.ok_or(CodecError::HeaderFehlt(SIGNATURE))?;
    if signature.is_empty() {
        return Err(CodecError::HeaderFehlt(SIGNATURE));
    }

    Ok(MessageRecord {
        date,
        message_type,
        fingerprint,
        signature: Signature::aus_hex(signature),
        content: text[inhalt_start..].to_string(),
    })
}

fn setzen<'a>(
    feld: &mut Option<&'a str>,
    name: &'static str,
    wert: &'a str,
) -> Result<(), CodecError> {
    if feld.replace(wert).is_some() {
        return Err(CodecError::HeaderDoppelt(name));
    }
    Ok(())
}

/// RFC 3339 mit Offset, oder ohne Offset (aeltere Datensaetze) als UTC
fn datum_parsen(text: &str) -> Result<DateTime<Utc>, CodecError> {
    if let Ok(datum) = DateTime::parse_from_rfc3339(text) {
        return Ok(datum.with_timezone(&Utc));
    }
    NaiveDateTime::parse_from_str(text, "%Y-%m-%dT%H:%M:%S%.f")
        .map(|naiv| naiv.and_utc())
        .map_err(|_| CodecError::UngueltigesDatum(text.to_string()))
}
