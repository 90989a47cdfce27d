//! siegel-server – Bibliotheks-Root
//!
//! Deklariert die Module der aeusseren Schicht und baut aus einer
//! Konfiguration den laufenden Dienst zusammen.

pub mod config;
pub mod eingabe;
pub mod veroeffentlichung;

use std::sync::Arc;

use anyhow::{Context, Result};
use config::SiegelConfig;
use siegel_chat::{ChatService, DiskStorage, MessageStore, StoredMessage};
use siegel_crypto::KeyManager;
use tokio::sync::oneshot;
use veroeffentlichung::Veroeffentlicher;

/// Haelt Konfiguration und Chat-Dienst zusammen
pub struct Siegel {
    config: SiegelConfig,
    chat: Arc<ChatService>,
}

impl Siegel {
    /// Baut den Dienst aus der gegebenen Konfiguration auf
    ///
    /// Reihenfolge:
    /// 1. Schluesselpaar laden oder erzeugen
    /// 2. Nachrichtenverzeichnis anlegen
    /// 3. ChatService erstellen
    pub async fn aufbauen(config: SiegelConfig) -> Result<Self> {
        let schluessel_verzeichnis = config.speicher.schluessel_verzeichnis.clone();
        let bits = config.schluessel.bits;

        // RSA-Erzeugung blockiert mehrere hundert Millisekunden
        let keys = tokio::task::spawn_blocking(move || {
            KeyManager::ensure_key_pair_mit_bits(&schluessel_verzeichnis, bits)
        })
        .await
        .context("Schluessel-Task abgebrochen")?
        .with_context(|| {
            format!(
                "Schluesselpaar in '{}' nicht verfuegbar",
                config.speicher.schluessel_verzeichnis.display()
            )
        })?;

        tracing::info!(
            fingerprint = %keys.fingerprint(),
            bits = keys.bits(),
            "Identitaet geladen"
        );

        let storage = DiskStorage::new(&config.speicher.nachrichten_verzeichnis);
        let store = MessageStore::oeffnen(storage, Arc::new(keys))
            .await
            .with_context(|| {
                format!(
                    "Nachrichtenverzeichnis '{}' nicht verfuegbar",
                    config.speicher.nachrichten_verzeichnis.display()
                )
            })?
            .mit_max_suffix(config.speicher.max_suffix);

        Ok(Self {
            chat: ChatService::neu(store),
            config,
        })
    }

    pub fn config(&self) -> &SiegelConfig {
        &self.config
    }

    pub fn chat(&self) -> &Arc<ChatService> {
        &self.chat
    }

    /// Bereitet die Eingabe auf, signiert und speichert sie
    ///
    /// Ist die Veroeffentlichung aktiviert, wartet der Aufruf bis die
    /// Befehlskette gelaufen ist. Deren Fehler werden nur geloggt.
    pub async fn senden(&self, content: &str, typ: &str) -> Result<StoredMessage> {
        let message_type = eingabe::typ_parsen(typ)?;
        let content = eingabe::inhalt_aufbereiten(content, self.config.eingabe.max_bytes)?;

        let veroeffentlichung = if self.config.veroeffentlichung.aktiviert {
            let empfaenger = self.chat.abonnieren();
            let (ende, ende_empfaenger) = oneshot::channel();
            let veroeffentlicher = Veroeffentlicher::neu(&self.config.veroeffentlichung);
            let handle = tokio::spawn(veroeffentlicher.laufen(empfaenger, ende_empfaenger));
            Some((ende, handle))
        } else {
            None
        };

        let ergebnis = self.chat.append(&content, message_type).await;

        // Das Ereignis liegt bereits im Puffer; der Veroeffentlicher
        // arbeitet ihn ab und endet, egal wer den ChatService noch haelt
        if let Some((ende, handle)) = veroeffentlichung {
            let _ = ende.send(());
            if let Err(e) = handle.await {
                tracing::error!(fehler = %e, "Veroeffentlicher abgestuerzt");
            }
        }

        let nachricht = ergebnis?;
        tracing::info!(
            key = %nachricht.key,
            message_type = %nachricht.record.message_type,
            "Nachricht gespeichert"
        );
        Ok(nachricht)
    }
}
