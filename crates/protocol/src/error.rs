//! Fehlertypen des Protokoll-Crates

use thiserror::Error;

/// Fehler beim Dekodieren von Datagrammen und API-Nachrichten
#[derive(Debug, Error)]
pub enum ProtokollFehler {
    /// Datagramm ohne Typ-Byte (MalformedPacket)
    #[error("Leeres Datagramm")]
    LeeresPaket,

    #[error("Unbekannter Pakettyp: {0}")]
    UnbekannterTyp(u8),

    #[error("Ungueltiges JSON: {0}")]
    Json(#[from] serde_json::Error),
}

impl From<ProtokollFehler> for voxrelay_core::VoxError {
    fn from(e: ProtokollFehler) -> Self {
        voxrelay_core::VoxError::UngueltigesPaket(e.to_string())
    }
}
