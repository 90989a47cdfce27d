//! Unit-Tests fuer das Chat-Crate


use std::sync::{Arc, OnceLock};

use siegel_crypto::{KeyManager, MIN_BITS};

use crate::{storage::DiskStorage, store::MessageStore};

/// Ein Schluessel-Paar fuer alle Tests (Generierung ist teuer)
pub(crate) fn test_keys() -> Arc<KeyManager> {
    static KEYS: OnceLock<Arc<KeyManager>> = OnceLock::new();
    KEYS.get_or_init(|| {
        Arc::new(KeyManager::generieren(MIN_BITS).expect("Schluessel-Generierung fehlgeschlagen"))
    })
    .clone()
}

pub(crate) async fn test_store() -> (MessageStore, tempfile::TempDir) {
    let dir = tempfile::tempdir().expect("Temp-Verzeichnis konnte nicht erstellt werden");
    let store = MessageStore::oeffnen(DiskStorage::new(dir.path().join("messages")), test_keys())
        .await
        .expect("Store oeffnen fehlgeschlagen");
    (store, dir)
}
