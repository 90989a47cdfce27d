//! # siegel-crypto
//!
//! Signier-Identitaet fuer Siegel.
//!
//! ## Module
//! - `key_manager` - RSA-Schluesselpaar laden/erzeugen, signieren, verifizieren
//! - `error` - Fehlertypen

pub mod error;
pub mod key_manager;

// Bequeme Re-Exports
pub use error::{CryptoError, CryptoResult};
pub use key_manager::{KeyManager, MIN_BITS, PRIVATER_SCHLUESSEL, OEFFENTLICHER_SCHLUESSEL};
