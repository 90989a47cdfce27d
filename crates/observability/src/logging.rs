//! Structured Logging Setup via tracing-subscriber
//!
//! Konfigurierbar per Umgebungsvariable (hat Vorrang vor der Konfiguration):
//! - `SIEGEL_LOG_LEVEL`: Filter-Direktive (z.B. `debug`, `siegel_chat=trace`)
//! - `SIEGEL_LOG_FORMAT`: Format (text/json)

use std::str::FromStr;

use tracing_subscriber::{fmt, EnvFilter};

pub const LOG_LEVEL_VAR: &str = "SIEGEL_LOG_LEVEL";
pub const LOG_FORMAT_VAR: &str = "SIEGEL_LOG_FORMAT";

/// Ausgabeformat der Logs
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogFormat {
    #[default]
    Text,
    Json,
}

impl FromStr for LogFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "text" => Ok(Self::Text),
            "json" => Ok(Self::Json),
            anderes => Err(format!("Unbekanntes Log-Format: '{anderes}' (erlaubt: text, json)")),
        }
    }
}

/// Initialisiert das Logging-System.
///
/// `SIEGEL_LOG_LEVEL` und `SIEGEL_LOG_FORMAT` ueberschreiben die
/// uebergebenen Werte. Ungueltige Angaben fallen auf `info` / `text`
/// zurueck. Ein zweiter Aufruf ist wirkungslos.
pub fn logging_initialisieren(level: &str, format: &str) {
    let filter = EnvFilter::try_from_env(LOG_LEVEL_VAR)
        .or_else(|_| EnvFilter::try_new(level))
        .unwrap_or_else(|_| EnvFilter::new("info"));

    let format = std::env::var(LOG_FORMAT_VAR)
        .ok()
        .and_then(|f| f.parse().ok())
        .unwrap_or_else(|| format.parse().unwrap_or_default());

    let ergebnis = match format {
        LogFormat::Json => fmt()
            .json()
            .with_env_filter(filter)
            .with_writer(std::io::stderr)
            .with_target(true)
            .with_thread_ids(true)
            .with_current_span(true)
            .try_init(),
        LogFormat::Text => fmt()
            .with_env_filter(filter)
            .with_writer(std::io::stderr)
            .with_target(true)
            .try_init(),
    };

    if ergebnis.is_err() {
        tracing::debug!("Logging war bereits initialisiert");
    }
}

/// Validiert eine Filter-Direktive wie `info` oder `siegel_chat=debug,warn`.
///
/// Teile ohne `=` muessen ein Level-Name sein. Ein Tippfehler wie
/// `verbos` waere sonst als Target-Name gueltig.
pub fn log_level_gueltig(level: &str) -> bool {
    let teile_gueltig = level.split(',').all(|teil| {
        let teil = teil.trim();
        teil.contains('=') || matches!(teil, "trace" | "debug" | "info" | "warn" | "error" | "off")
    });
    teile_gueltig && EnvFilter::try_new(level).is_ok()
}

/// Validiert ob ein Log-Format-String gueltig ist.
pub fn log_format_gueltig(format: &str) -> bool {
    format.parse::<LogFormat>().is_ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn log_level_gueltige_werte() {
        for level in ["trace", "debug", "info", "warn", "error"] {
            assert!(log_level_gueltig(level));
        }
    }

    #[test]
    fn log_level_direktiven() {
        assert!(log_level_gueltig("off"));
        assert!(log_level_gueltig("siegel_chat=trace,info"));
        assert!(log_level_gueltig("warn,siegel_crypto=debug"));
        assert!(!log_level_gueltig("siegel_chat=verbos"));
        assert!(!log_level_gueltig("info,verbos"));
    }

    #[test]
    fn log_level_ungueltige_werte() {
        assert!(!log_level_gueltig("verbose"));
        assert!(!log_level_gueltig("verbos"));
        assert!(!log_level_gueltig("INFO")); // Gross-/Kleinschreibung
        assert!(!log_level_gueltig(""));
    }

    #[test]
    fn log_format_parsen() {
        assert_eq!("text".parse::<LogFormat>(), Ok(LogFormat::Text));
        assert_eq!("json".parse::<LogFormat>(), Ok(LogFormat::Json));
        assert!(!log_format_gueltig("xml"));
        assert!(!log_format_gueltig("JSON"));
        assert_eq!(LogFormat::default(), LogFormat::Text);
    }

    #[test]
    fn doppelte_initialisierung_ist_harmlos() {
        logging_initialisieren("debug", "text");
        logging_initialisieren("info", "json");
        tracing::info!("Logging laeuft");
    }
}
