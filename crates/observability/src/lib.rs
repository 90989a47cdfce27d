//! # siegel-observability
//!
//! Structured Logging fuer Siegel via tracing-subscriber (Text oder JSON).
//! Ausgabe geht nach stderr, damit stdout fuer Kommandoausgaben frei bleibt.

pub mod logging;

pub use logging::{log_format_gueltig, log_level_gueltig, logging_initialisieren, LogFormat};
