//! MessageStore – signieren, benennen, festschreiben, auflisten
//!
//! Der Store ist die einzige Komponente, die Nachrichtendateien anfasst.
//! Parallele Schreiber (Tasks oder Prozesse) brauchen keine gemeinsame
//! Sperre: jeder Name wird per atomarem Hardlink genau einmal vergeben,
//! Verlierer versuchen den naechsten Suffix.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use siegel_core::MessageType;
use siegel_crypto::{CryptoError, KeyManager};

use crate::{
    codec,
    error::{ChatError, ChatResult},
    storage::{ist_nachrichtenname, Commit, DiskStorage},
    types::{Listing, MessageRecord, RecordKey, SkippedRecord, StoredMessage},
};

/// Standard-Obergrenze fuer Kollisions-Suffixe pro Sekunde
pub const MAX_SUFFIX: u32 = 1000;

/// Ab diesem Alter gilt eine Temp-Datei beim Oeffnen als verwaist
const VERWAIST_NACH: Duration = Duration::from_secs(60 * 60);

/// Dauerhafte, geordnete, kollisionsfreie Ablage signierter Nachrichten
#[derive(Debug, Clone)]
pub struct MessageStore {
    storage: DiskStorage,
    keys: Arc<KeyManager>,
    max_suffix: u32,
}

impl MessageStore {
    /// Oeffnet (und erstellt bei Bedarf) das Nachrichtenverzeichnis
    pub async fn oeffnen(storage: DiskStorage, keys: Arc<KeyManager>) -> ChatResult<Self> {
        storage.verzeichnis_anlegen().await?;
        match storage.verwaiste_entfernen(VERWAIST_NACH).await {
            Ok(0) => {}
            Ok(anzahl) => tracing::info!(anzahl, "Verwaiste Temp-Dateien entfernt"),
            Err(e) => tracing::warn!(fehler = %e, "Aufraeumen verwaister Temp-Dateien fehlgeschlagen"),
        }
        tracing::debug!(verzeichnis = %storage.base_dir().display(), "Nachrichtenspeicher geoeffnet");
        Ok(Self {
            storage,
            keys,
            max_suffix: MAX_SUFFIX,
        })
    }

    /// Setzt die Obergrenze fuer Kollisions-Suffixe
    pub fn mit_max_suffix(mut self, max_suffix: u32) -> Self {
        self.max_suffix = max_suffix;
        self
    }

    pub fn keys(&self) -> &KeyManager {
        &self.keys
    }

    pub fn storage(&self) -> &DiskStorage {
        &self.storage
    }

    /// Signiert `content`, kodiert und schreibt die Nachricht in eine neue Datei
    ///
    /// Der Dateiname ist der sekundengenaue Zeitstempel. Ist er vergeben,
    /// werden `_1`, `_2`, ... bis `max_suffix` probiert.
    pub async fn append(&self, content: &str, message_type: MessageType) -> ChatResult<StoredMessage> {
        let date = Utc::now();
        // RSA ist rechenintensiv und blockiert sonst den Worker
        let keys = Arc::clone(&self.keys);
        let daten = content.as_bytes().to_vec();
        let signature = tokio::task::spawn_blocking(move || keys.sign(&daten))
            .await
            .map_err(|e| CryptoError::Signierung(format!("Signier-Task abgebrochen: {e}")))??;

        let record = MessageRecord {
            date,
            message_type,
            fingerprint: self.keys.fingerprint().clone(),
            signature,
            content: content.to_string(),
        };

        let bereitgestellt = self.storage.stage(codec::encode(&record).as_bytes()).await?;

        for suffix in 0..=self.max_suffix {
            let key = RecordKey::neu(&date, suffix);
            let name = key.file_name();

            match self.storage.commit(&bereitgestellt, &name).await? {
                Commit::Festgeschrieben => {
                    tracing::info!(
                        key = %name,
                        typ = %message_type,
                        bytes = content.len(),
                        "Nachricht gespeichert"
                    );
                    return Ok(StoredMessage { key: name, record });
                }
                Commit::NameBelegt => {
                    tracing::debug!(key = %name, "Dateiname vergeben, naechster Suffix");
                }
            }
        }

        let stempel = RecordKey::neu(&date, 0).stempel();
        tracing::error!(stempel = %stempel, versuche = self.max_suffix + 1, "Kollisions-Suffixe erschoepft");
        Err(ChatError::KollisionenErschoepft {
            stempel,
            versuche: self.max_suffix + 1,
        })
    }

    /// Liest alle Nachrichten, chronologisch sortiert
    ///
    /// Nicht lesbare Dateien werden uebersprungen und in `Listing::skipped`
    /// gesammelt. Eine waehrend der Auflistung verschwundene Datei wird
    /// still ignoriert.
    pub async fn list(&self) -> ChatResult<Listing> {
        let namen = self.storage.list_names().await?;
        let mut listing = Listing::default();

        for name in namen {
            match self.laden(&name).await {
                Ok(nachricht) => listing.records.push(nachricht),
                Err(e) if e.ist_nicht_gefunden() => {
                    tracing::debug!(key = %name, "Datei waehrend der Auflistung verschwunden");
                }
                Err(e) => {
                    tracing::warn!(key = %name, fehler = %e, "Nachricht uebersprungen");
                    listing.skipped.push(SkippedRecord {
                        key: name,
                        grund: e.to_string(),
                    });
                }
            }
        }

        listing.records.sort_by(StoredMessage::chronologisch);
        Ok(listing)
    }

    /// Laedt eine einzelne Nachricht ueber ihren Speicher-Schluessel
    pub async fn get(&self, key: &str) -> ChatResult<StoredMessage> {
        if !ist_nachrichtenname(key) {
            return Err(ChatError::NachrichtNichtGefunden(key.to_string()));
        }
        match self.laden(key).await {
            Err(e) if e.ist_nicht_gefunden() => Err(ChatError::NachrichtNichtGefunden(key.to_string())),
            ergebnis => ergebnis,
        }
    }

    async fn laden(&self, key: &str) -> ChatResult<StoredMessage> {
        let bytes = self.storage.retrieve(key).await?;
        let record = codec::decode_bytes(&bytes)?;
        Ok(StoredMessage {
            key: key.to_string(),
            record,
        })
    }
}
