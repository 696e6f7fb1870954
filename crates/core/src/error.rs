//! Fehlertypen fuer VoxRelay
//!
//! Zentraler Fehler-Enum fuer Konfiguration und Prozessgrenzen.
//! Die Fach-Crates definieren eigene Fehler und konvertieren via `#[from]`.

use thiserror::Error;

/// Globaler Result-Alias fuer VoxRelay
pub type Result<T> = std::result::Result<T, VoxError>;

/// Alle uebergreifenden Fehler im VoxRelay-System
#[derive(Debug, Error)]
pub enum VoxError {
    // --- Netzwerk ---
    #[error("Socket konnte nicht gebunden werden ({adresse}): {grund}")]
    Binden { adresse: String, grund: String },

    #[error("Ungueltige Adresse: {0}")]
    UngueltigeAdresse(String),

    // --- Protokoll ---
    #[error("Ungueltiges Paket: {0}")]
    UngueltigesPaket(String),

    // --- Konfiguration ---
    #[error("Konfigurationsfehler: {0}")]
    Konfiguration(String),

    #[error("Wert ausserhalb des erlaubten Bereichs: {wert} (erlaubt {min}..={max})")]
    Wertebereich { wert: i64, min: i64, max: i64 },

    // --- Audio ---
    #[error("Audiofehler: {0}")]
    Audio(String),

    #[error("IO-Fehler: {0}")]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Anyhow(#[from] anyhow::Error),
}

impl VoxError {
    /// Gibt true zurueck wenn der Fehler den Prozessstart verhindert
    pub fn ist_fatal(&self) -> bool {
        matches!(self, Self::Binden { .. } | Self::Konfiguration(_))
    }
}
