//! Fehlertypen fuer die Audio-Pipeline

use thiserror::Error;
use voxrelay_core::VoxError;

/// Alle moeglichen Fehler der Audio-Pipeline
#[derive(Debug, Error)]
pub enum AudioError {
    #[error("Audio-Geraet nicht verfuegbar: {0}")]
    GeraetNichtVerfuegbar(String),

    #[error("Stream-Fehler: {0}")]
    StreamFehler(String),

    #[error("Ungueltiger Wert {wert} (erlaubt {min}..={max})")]
    UngueltigerWert { wert: i64, min: i64, max: i64 },

    #[error("IO-Fehler: {0}")]
    Io(#[from] std::io::Error),

    #[error("Unerwarteter Fehler: {0}")]
    Anyhow(#[from] anyhow::Error),
}

pub type AudioResult<T> = Result<T, AudioError>;

impl From<AudioError> for VoxError {
    fn from(e: AudioError) -> Self {
        match e {
            AudioError::UngueltigerWert { wert, min, max } => {
                VoxError::Wertebereich { wert, min, max }
            }
            AudioError::Io(io) => VoxError::Io(io),
            andere => VoxError::Audio(andere.to_string()),
        }
    }
}
