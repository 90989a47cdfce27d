//! ChatService – Nachrichten anhaengen, auflisten, pruefen
//!
//! Die Schnittstelle fuer die aeussere Schicht (HTTP, CLI). Eingaben
//! werden hier nicht bereinigt, das erledigt der Aufrufer.

use std::sync::Arc;

use siegel_core::{Fingerprint, MessageType, SiegelEvent};
use tokio::sync::broadcast;

use crate::{
    error::ChatResult,
    store::MessageStore,
    types::{CheckedMessage, MessageRecord, StoredMessage, Verlauf},
};

/// Puffergroesse des Ereignis-Kanals
const EVENT_KAPAZITAET: usize = 256;

/// ChatService verbindet Signier-Identitaet und Nachrichtenspeicher
pub struct ChatService {
    store: MessageStore,
    events: broadcast::Sender<SiegelEvent>,
}

impl ChatService {
    /// Erstellt einen neuen ChatService
    pub fn neu(store: MessageStore) -> Arc<Self> {
        let (events, _) = broadcast::channel(EVENT_KAPAZITAET);
        Arc::new(Self { store, events })
    }

    /// Identitaet dieses Prozesses
    pub fn fingerprint(&self) -> &Fingerprint {
        self.store.keys().fingerprint()
    }

    /// Oeffentlicher Schluessel als PEM
    pub fn public_key_pem(&self) -> &str {
        self.store.keys().public_key_pem()
    }

    /// Abonniert Ereignisse fuer kuenftig festgeschriebene Nachrichten
    pub fn abonnieren(&self) -> broadcast::Receiver<SiegelEvent> {
        self.events.subscribe()
    }

    /// Signiert und speichert eine Nachricht
    ///
    /// Nach dem Festschreiben wird `SiegelEvent::NachrichtGespeichert`
    /// verschickt. Fehlende Abonnenten sind kein Fehler.
    pub async fn append(&self, content: &str, message_type: MessageType) -> ChatResult<StoredMessage> {
        let nachricht = self.store.append(content, message_type).await?;

        let event = SiegelEvent::NachrichtGespeichert {
            key: nachricht.key.clone(),
            pfad: self.store.storage().full_path(&nachricht.key),
            fingerprint: nachricht.record.fingerprint.clone(),
            message_type: nachricht.record.message_type,
            date: nachricht.record.date,
        };
        if self.events.send(event).is_err() {
            tracing::trace!(key = %nachricht.key, "Keine Abonnenten fuer Ereignis");
        }

        Ok(nachricht)
    }

    /// Alle Nachrichten chronologisch, jeweils mit Pruefergebnis
    pub async fn list(&self) -> ChatResult<Vec<CheckedMessage>> {
        Ok(self.verlauf().await?.nachrichten)
    }

    /// Wie `list`, zusaetzlich mit den uebersprungenen Dateien
    pub async fn verlauf(&self) -> ChatResult<Verlauf> {
        let listing = self.store.list().await?;
        let nachrichten = listing
            .records
            .into_iter()
            .map(|n| self.pruefen(n))
            .collect();

        Ok(Verlauf {
            nachrichten,
            skipped: listing.skipped,
        })
    }

    /// Eine einzelne Nachricht mit Pruefergebnis
    pub async fn get(&self, key: &str) -> ChatResult<CheckedMessage> {
        let nachricht = self.store.get(key).await?;
        Ok(self.pruefen(nachricht))
    }

    /// Prueft die Signatur eines Datensatzes gegen die eigene Identitaet
    pub fn verify(&self, record: &MessageRecord) -> bool {
        self.store
            .keys()
            .verify(record.content.as_bytes(), &record.signature, &record.fingerprint)
    }

    fn pruefen(&self, nachricht: StoredMessage) -> CheckedMessage {
        let verified = self.verify(&nachricht.record);
        if !verified {
            tracing::warn!(
                key = %nachricht.key,
                fingerprint = %nachricht.record.fingerprint,
                "Signatur ungueltig oder Verfasser unbekannt"
            );
        }
        CheckedMessage { nachricht, verified }
    }
}
