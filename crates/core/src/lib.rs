//! voxrelay-core – Gemeinsame Typen, Konstanten und Fehlertypen
//!
//! Dieses Crate stellt die Bausteine bereit, die Relay, Client und
//! Protokoll gemeinsam nutzen.

pub mod error;
pub mod types;

// Re-Exporte fuer bequemen Zugriff
pub use error::{Result, VoxError};
pub use types::{
    anzeigename_normalisieren, auf_bytes_kuerzen, Endpunkt, ANONYM, AUDIO_BLOCK_SAMPLES,
    HISTORY_LIMIT, MAX_DATAGRAMM, MIN_EMPFANGSPUFFER, NAME_MAX_BYTES, SESSION_TIMEOUT,
    STANDARD_PORT, TEXT_MAX_BYTES,
};
