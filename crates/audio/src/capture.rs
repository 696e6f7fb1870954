//! Mikrofon-Capture
//!
//! Das Geraet selbst liegt hinter [`AudioQuelle`]. Die [`CapturePipeline`]
//! entscheidet pro Block, ob und was gesendet wird:
//!
//! ```text
//! AudioQuelle::block_lesen()
//!     |
//!     v
//! Mikrofon stumm? ----------> verworfen
//!     |
//! RMS(roh) <= Schwelle? ----> verworfen
//!     |
//! Verstaerkung (Mic-Lautstaerke), Clipping
//!     |
//!     v
//! PCM Little-Endian -> Audio-Paket
//! ```

use std::sync::Arc;
use std::time::Duration;

use crate::error::AudioResult;
use crate::gate::AudioGate;
use crate::pcm::{block_dauer_ms, pcm_kodieren};
use crate::settings::AudioSettings;
use crate::volume::verstaerkung_anwenden;

/// Liefert Mikrofon-Bloecke (blockierend, ein Block pro Aufruf)
pub trait AudioQuelle: Send {
    /// Fuellt `puffer` vollstaendig mit dem naechsten Block
    fn block_lesen(&mut self, puffer: &mut [i16]) -> AudioResult<()>;
}

/// Zaehler der Capture-Seite
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CaptureStatistik {
    pub bloecke: u64,
    pub gesendet: u64,
    /// Unter der Schwelle oder stumm
    pub unterdrueckt: u64,
}

/// Gate + Verstaerkung + Kodierung eines Capture-Blocks
#[derive(Debug)]
pub struct CapturePipeline {
    einstellungen: Arc<AudioSettings>,
    gate: AudioGate,
    statistik: CaptureStatistik,
}

impl CapturePipeline {
    pub fn neu(einstellungen: Arc<AudioSettings>) -> Self {
        let gate = AudioGate::neu(Arc::clone(&einstellungen));
        Self {
            einstellungen,
            gate,
            statistik: CaptureStatistik::default(),
        }
    }

    /// Verarbeitet einen Roh-Block; `None` wenn nichts gesendet werden soll
    ///
    /// Die Schwelle wird auf dem unverstaerkten Block geprueft.
    pub fn verarbeiten(&mut self, block: &[i16]) -> Option<Vec<u8>> {
        self.statistik.bloecke += 1;

        if self.einstellungen.mic_stumm() || !self.gate.durchlassen(block) {
            self.statistik.unterdrueckt += 1;
            return None;
        }

        let mut samples = block.to_vec();
        verstaerkung_anwenden(&mut samples, self.einstellungen.mic_lautstaerke());
        self.statistik.gesendet += 1;
        Some(pcm_kodieren(&samples))
    }

    pub fn statistik(&self) -> CaptureStatistik {
        self.statistik
    }
}

/// Quelle ohne Geraet: liefert Stille im Block-Takt
///
/// Fuer Clients ohne Mikrofon. Das Gate laesst Stille nie durch, es wird
/// also nur Text gesendet.
#[derive(Debug, Default)]
pub struct StilleQuelle;

impl AudioQuelle for StilleQuelle {
    fn block_lesen(&mut self, puffer: &mut [i16]) -> AudioResult<()> {
        std::thread::sleep(Duration::from_millis(block_dauer_ms()));
        puffer.fill(0);
        Ok(())
    }
}
