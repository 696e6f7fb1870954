//! Audio-Gate (Sprachaktivitaet per RMS-Schwelle)
//!
//! Ein Block wird nur gesendet, wenn sein RMS-Pegel die aktuelle Schwelle
//! ueberschreitet. Die Schwelle kommt live aus [`AudioSettings`].

use std::sync::Arc;

use crate::settings::AudioSettings;

/// Berechnet den RMS-Pegel eines Blocks: sqrt(mean(sample²))
///
/// Ein leerer Block hat den Pegel 0.
pub fn rms(block: &[i16]) -> f64 {
    if block.is_empty() {
        return 0.0;
    }
    let summe: f64 = block
        .iter()
        .map(|&s| {
            let s = f64::from(s);
            s * s
        })
        .sum();
    (summe / block.len() as f64).sqrt()
}

/// Schwellen-Gate fuer Capture-Bloecke
#[derive(Debug, Clone)]
pub struct AudioGate {
    einstellungen: Arc<AudioSettings>,
}

impl AudioGate {
    pub fn neu(einstellungen: Arc<AudioSettings>) -> Self {
        Self { einstellungen }
    }

    /// `true` wenn der Block die Schwelle strikt ueberschreitet
    pub fn durchlassen(&self, block: &[i16]) -> bool {
        rms(block) > f64::from(self.einstellungen.schwelle())
    }
}
