//! voxrelay-audio – Client-Audio ohne Geraetebindung
//!
//! - Audio-Gate (RMS-Schwelle)
//! - Lautstaerke mit Clipping
//! - PCM-Kodierung (i16 LE, 16 kHz, Mono)
//! - Geteilte Laufzeit-Einstellungen
//! - Capture/Playback-Pipelines hinter den Geraete-Traits
//!   [`AudioQuelle`] und [`AudioSenke`]

pub mod capture;
pub mod error;
pub mod gate;
pub mod pcm;
pub mod playback;
pub mod settings;
pub mod volume;

pub use capture::{AudioQuelle, CapturePipeline, CaptureStatistik, StilleQuelle};
pub use error::{AudioError, AudioResult};
pub use gate::{rms, AudioGate};
pub use pcm::{pcm_dekodieren, pcm_kodieren, ABTASTRATE, BLOCK_GROESSE, KANAELE};
pub use playback::{AudioSenke, PlaybackPipeline, VerwerfendeSenke};
pub use settings::{
    AudioSettings, LAUTSTAERKE_MAX, LAUTSTAERKE_STANDARD, SCHWELLE_MAX, SCHWELLE_STANDARD,
};
pub use volume::{verstaerkung, verstaerkung_anwenden};
