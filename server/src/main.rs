//! Siegel – Einstiegspunkt
//!
//! Laedt die Konfiguration, initialisiert das Logging und fuehrt den
//! gewaehlten Unterbefehl aus. Logs gehen nach stderr, Ergebnisse nach
//! stdout.

use std::io::{Read, Write};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use siegel_chat::CheckedMessage;
use siegel_server::{config::SiegelConfig, Siegel};

/// Umgebungsvariable fuer den Pfad der Konfigurationsdatei
const CONFIG_VAR: &str = "SIEGEL_CONFIG";

/// Siegel - signierte Chat-Nachrichten als nur anhaengende Dateiablage
#[derive(Parser, Debug)]
#[command(name = "siegel")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Konfigurationsdatei (Standard: $SIEGEL_CONFIG oder siegel.toml)
    #[arg(short, long)]
    config: Option<String>,

    #[command(subcommand)]
    befehl: Befehl,
}

#[derive(Subcommand, Debug)]
enum Befehl {
    /// Fingerprint der lokalen Identitaet ausgeben
    Fingerprint,

    /// Oeffentlichen Schluessel (PEM) ausgeben
    PublicKey,

    /// Nachricht signieren und speichern
    Send {
        /// Nachrichteninhalt, "-" liest von stdin
        content: String,

        /// Nachrichtentyp: message, system, error
        #[arg(short = 't', long = "type", default_value = "message")]
        message_type: String,
    },

    /// Alle Nachrichten chronologisch mit Pruefergebnis auflisten
    List {
        /// Ausgabe als JSON
        #[arg(long)]
        json: bool,
    },

    /// Eine einzelne Nachricht anzeigen
    Show {
        /// Dateiname, z.B. 20250108_152842.txt
        key: String,

        /// Ausgabe als JSON
        #[arg(long)]
        json: bool,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let config_pfad = cli
        .config
        .or_else(|| std::env::var(CONFIG_VAR).ok())
        .unwrap_or_else(|| "siegel.toml".into());

    let config = SiegelConfig::laden(&config_pfad)?;

    siegel_observability::logging_initialisieren(&config.logging.level, &config.logging.format);

    tracing::debug!(
        version = env!("CARGO_PKG_VERSION"),
        config = %config_pfad,
        "Siegel wird initialisiert"
    );

    let siegel = Siegel::aufbauen(config).await?;
    let mut stdout = std::io::stdout().lock();

    match cli.befehl {
        Befehl::Fingerprint => {
            writeln!(stdout, "{}", siegel.chat().fingerprint())?;
        }
        Befehl::PublicKey => {
            write!(stdout, "{}", siegel.chat().public_key_pem())?;
        }
        Befehl::Send {
            content,
            message_type,
        } => {
            let content = if content == "-" {
                let mut puffer = String::new();
                std::io::stdin()
                    .read_to_string(&mut puffer)
                    .context("stdin nicht lesbar")?;
                puffer
            } else {
                content
            };
            let nachricht = siegel.senden(&content, &message_type).await?;
            writeln!(stdout, "{}", nachricht.key)?;
        }
        Befehl::List { json } => {
            let verlauf = siegel.chat().verlauf().await?;
            for uebersprungen in &verlauf.skipped {
                tracing::warn!(
                    key = %uebersprungen.key,
                    grund = %uebersprungen.grund,
                    "Datei uebersprungen"
                );
            }
            let manipuliert = verlauf.manipuliert();
            if manipuliert > 0 {
                tracing::warn!(
                    manipuliert,
                    gesamt = verlauf.nachrichten.len(),
                    "Nachrichten mit ungueltiger Signatur gefunden"
                );
            }
            if json {
                serde_json::to_writer_pretty(&mut stdout, &verlauf.nachrichten)?;
                writeln!(stdout)?;
            } else {
                for nachricht in &verlauf.nachrichten {
                    writeln!(stdout, "{}", zeile(nachricht))?;
                }
            }
        }
        Befehl::Show { key, json } => {
            let nachricht = siegel.chat().get(&key).await?;
            if json {
                serde_json::to_writer_pretty(&mut stdout, &nachricht)?;
                writeln!(stdout)?;
            } else {
                let record = &nachricht.nachricht.record;
                writeln!(stdout, "key:         {}", nachricht.nachricht.key)?;
                writeln!(stdout, "date:        {}", record.date.to_rfc3339())?;
                writeln!(stdout, "type:        {}", record.message_type)?;
                writeln!(stdout, "fingerprint: {}", record.fingerprint)?;
                writeln!(stdout, "verified:    {}", nachricht.verified)?;
                writeln!(stdout)?;
                writeln!(stdout, "{}", record.content)?;
            }
        }
    }

    Ok(())
}

/// Eine Zeile der Listenausgabe
fn zeile(nachricht: &CheckedMessage) -> String {
    let record = &nachricht.nachricht.record;
    let marke = if nachricht.verified { "ok" } else { "!!" };
    let erste_zeile = record.content.lines().next().unwrap_or_default();
    format!(
        "{marke} {} {:<7} {} {}",
        record.date.format("%Y-%m-%d %H:%M:%S"),
        record.message_type.as_str(),
        record.fingerprint,
        erste_zeile
    )
}
