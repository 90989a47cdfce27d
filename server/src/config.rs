//! Konfiguration
//!
//! Wird beim Start aus einer TOML-Datei geladen. Alle Felder haben
//! sinnvolle Standardwerte, sodass Siegel ohne Konfigurationsdatei
//! lauffaehig ist.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// Vollstaendige Konfiguration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct SiegelConfig {
    /// Ablage fuer Nachrichten und Schluessel
    pub speicher: SpeicherEinstellungen,
    /// Schluessel-Erzeugung
    pub schluessel: SchluesselEinstellungen,
    /// Eingabe-Aufbereitung vor dem Signieren
    pub eingabe: EingabeEinstellungen,
    /// Logging-Einstellungen
    pub logging: LoggingEinstellungen,
    /// Veroeffentlichung festgeschriebener Nachrichten
    pub veroeffentlichung: VeroeffentlichungsEinstellungen,
}

/// Ablage-Einstellungen
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SpeicherEinstellungen {
    /// Verzeichnis der Nachrichtendateien
    pub nachrichten_verzeichnis: PathBuf,
    /// Verzeichnis fuer `local.pem` / `local.pub`
    pub schluessel_verzeichnis: PathBuf,
    /// Hoechster Kollisions-Suffix pro Sekunde
    pub max_suffix: u32,
}

impl Default for SpeicherEinstellungen {
    fn default() -> Self {
        Self {
            nachrichten_verzeichnis: "messages".into(),
            schluessel_verzeichnis: "keys".into(),
            max_suffix: siegel_chat::MAX_SUFFIX,
        }
    }
}

/// Schluessel-Einstellungen
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SchluesselEinstellungen {
    /// Modulus-Laenge neu erzeugter Schluessel (mindestens 2048)
    pub bits: usize,
}

impl Default for SchluesselEinstellungen {
    fn default() -> Self {
        Self {
            bits: siegel_crypto::MIN_BITS,
        }
    }
}

/// Eingabe-Einstellungen
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EingabeEinstellungen {
    /// Maximale Inhaltsgroesse in Bytes
    pub max_bytes: usize,
}

impl Default for EingabeEinstellungen {
    fn default() -> Self {
        Self {
            max_bytes: 100 * 1024,
        }
    }
}

/// Logging-Einstellungen
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingEinstellungen {
    /// Log-Level: "trace", "debug", "info", "warn", "error"
    pub level: String,
    /// Format: "json" oder "text"
    pub format: String,
}

impl Default for LoggingEinstellungen {
    fn default() -> Self {
        Self {
            level: "info".into(),
            format: "text".into(),
        }
    }
}

/// Veroeffentlichung (z.B. git add/commit/push je Nachricht)
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct VeroeffentlichungsEinstellungen {
    /// Aktiviert die Veroeffentlichung nach jedem Festschreiben
    pub aktiviert: bool,
    /// Arbeitsverzeichnis der Befehle (leer = aktuelles Verzeichnis)
    pub arbeitsverzeichnis: Option<PathBuf>,
    /// Befehle in Reihenfolge, jeweils Programm + Argumente.
    /// Platzhalter: `{datei}` (voller Pfad), `{name}` (Dateiname)
    pub befehle: Vec<Vec<String>>,
}

impl SiegelConfig {
    /// Laedt die Konfiguration aus einer TOML-Datei.
    /// Gibt die Standardkonfiguration zurueck wenn die Datei nicht existiert.
    pub fn laden(pfad: &str) -> anyhow::Result<Self> {
        match std::fs::read_to_string(pfad) {
            Ok(inhalt) => {
                let config: Self = toml::from_str(&inhalt)
                    .map_err(|e| anyhow::anyhow!("Konfigurationsfehler in '{pfad}': {e}"))?;
                config.pruefen()?;
                Ok(config)
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::warn!(
                    pfad = pfad,
                    "Konfigurationsdatei nicht gefunden, verwende Standardwerte"
                );
                Ok(Self::default())
            }
            Err(e) => Err(anyhow::anyhow!(
                "Konfigurationsdatei '{pfad}' nicht lesbar: {e}"
            )),
        }
    }

    /// Prueft Werte, die TOML allein nicht ausschliesst
    pub fn pruefen(&self) -> anyhow::Result<()> {
        if self.schluessel.bits < siegel_crypto::MIN_BITS {
            anyhow::bail!(
                "schluessel.bits = {} ist zu klein (Minimum: {})",
                self.schluessel.bits,
                siegel_crypto::MIN_BITS
            );
        }
        if self.eingabe.max_bytes == 0 {
            anyhow::bail!("eingabe.max_bytes muss groesser als 0 sein");
        }
        if !siegel_observability::log_level_gueltig(&self.logging.level) {
            anyhow::bail!(
                "logging.level = '{}' ist keine gueltige Filter-Direktive",
                self.logging.level
            );
        }
        if !siegel_observability::log_format_gueltig(&self.logging.format) {
            anyhow::bail!(
                "logging.format = '{}' ist unbekannt (erlaubt: text, json)",
                self.logging.format
            );
        }
        if self.veroeffentlichung.befehle.iter().any(Vec::is_empty) {
            anyhow::bail!("veroeffentlichung.befehle enthaelt einen leeren Befehl");
        }
        Ok(())
    }
}
