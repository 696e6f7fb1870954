//! Lautsprecher-Playback
//!
//! Empfangene Audio-Nutzdaten werden dekodiert, mit der Wiedergabe-
//! Lautstaerke skaliert und an eine [`AudioSenke`] geschrieben.

use std::sync::Arc;

use crate::error::AudioResult;
use crate::pcm::pcm_dekodieren;
use crate::settings::AudioSettings;
use crate::volume::verstaerkung_anwenden;

/// Nimmt Wiedergabe-Bloecke entgegen (blockierend)
pub trait AudioSenke: Send {
    fn block_schreiben(&mut self, samples: &[i16]) -> AudioResult<()>;
}

/// Dekodierung + Verstaerkung fuer empfangene Audio-Pakete
#[derive(Debug, Clone)]
pub struct PlaybackPipeline {
    einstellungen: Arc<AudioSettings>,
}

impl PlaybackPipeline {
    pub fn neu(einstellungen: Arc<AudioSettings>) -> Self {
        Self { einstellungen }
    }

    /// `None` wenn die Wiedergabe stumm ist oder keine Samples enthalten sind
    pub fn verarbeiten(&self, nutzdaten: &[u8]) -> Option<Vec<i16>> {
        if self.einstellungen.ton_stumm() {
            return None;
        }
        let mut samples = pcm_dekodieren(nutzdaten);
        if samples.is_empty() {
            return None;
        }
        verstaerkung_anwenden(&mut samples, self.einstellungen.ton_lautstaerke());
        Some(samples)
    }
}

/// Senke ohne Geraet: verwirft alle Bloecke
#[derive(Debug, Default)]
pub struct VerwerfendeSenke;

impl AudioSenke for VerwerfendeSenke {
    fn block_schreiben(&mut self, _samples: &[i16]) -> AudioResult<()> {
        Ok(())
    }
}
