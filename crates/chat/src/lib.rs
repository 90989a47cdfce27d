//! siegel-chat – Signierter, nur anhaengender Nachrichtenspeicher
//!
//! Dieses Crate implementiert:
//! - codec: kanonisches Textformat einer Nachricht
//! - DiskStorage: Temp-Datei + atomares Festschreiben ohne Ueberschreiben
//! - MessageStore: signieren, benennen, festschreiben, sortiert auflisten
//! - ChatService: Fassade fuer die aeussere Schicht (HTTP, CLI)
//!
//! # Beispiel
//!
//! ```no_run
//! use std::sync::Arc;
//! use siegel_chat::{ChatService, DiskStorage, MessageStore};
//! use siegel_core::MessageType;
//! use siegel_crypto::KeyManager;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let keys = Arc::new(KeyManager::ensure_key_pair("keys")?);
//!     let store = MessageStore::oeffnen(DiskStorage::new("messages"), keys).await?;
//!     let chat = ChatService::neu(store);
//!
//!     chat.append("hello", MessageType::Message).await?;
//!     for nachricht in chat.list().await? {
//!         println!("{} {}", nachricht.nachricht.key, nachricht.verified);
//!     }
//!     Ok(())
//! }
//! ```

pub mod codec;
pub mod error;
pub mod service;
pub mod storage;
pub mod store;
pub mod types;

#[cfg(test)]
mod tests;

// Bequeme Re-Exporte
pub use codec::{decode, encode, CodecError};
pub use error::{ChatError, ChatResult};
pub use service::ChatService;
pub use storage::DiskStorage;
pub use store::{MessageStore, MAX_SUFFIX};
pub use types::{
    CheckedMessage, Listing, MessageRecord, RecordKey, SkippedRecord, StoredMessage, Verlauf,
};
