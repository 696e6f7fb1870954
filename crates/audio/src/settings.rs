//! Laufzeit-Einstellungen der Audio-Pipeline
//!
//! Schwelle, Lautstaerken und Stummschaltung werden von der Oberflaeche
//! gesetzt und von Capture- und Playback-Thread gelesen, ohne Neustart der
//! Streams. Alle Zugriffe sind `Relaxed`: es gilt der zuletzt geschriebene
//! Wert, eine Ordnung zwischen den Feldern gibt es nicht.

use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};

use crate::error::{AudioError, AudioResult};

/// Standard-Schwelle des Audio-Gates (RMS)
pub const SCHWELLE_STANDARD: u32 = 200;
/// Obergrenze der Schwelle
pub const SCHWELLE_MAX: u32 = 1000;
/// Standard-Lautstaerke (Verstaerkung 1.0)
pub const LAUTSTAERKE_STANDARD: u32 = 50;
/// Obergrenze der Lautstaerke (Verstaerkung 2.0)
pub const LAUTSTAERKE_MAX: u32 = 100;

/// Geteilte Audio-Einstellungen (ueber `Arc` zwischen Threads)
#[derive(Debug)]
pub struct AudioSettings {
    schwelle: AtomicU32,
    mic_lautstaerke: AtomicU32,
    ton_lautstaerke: AtomicU32,
    mic_stumm: AtomicBool,
    ton_stumm: AtomicBool,
}

impl AudioSettings {
    pub fn neu() -> Self {
        Self {
            schwelle: AtomicU32::new(SCHWELLE_STANDARD),
            mic_lautstaerke: AtomicU32::new(LAUTSTAERKE_STANDARD),
            ton_lautstaerke: AtomicU32::new(LAUTSTAERKE_STANDARD),
            mic_stumm: AtomicBool::new(false),
            ton_stumm: AtomicBool::new(false),
        }
    }

    // --- Schwelle ---

    pub fn schwelle(&self) -> u32 {
        self.schwelle.load(Ordering::Relaxed)
    }

    /// Setzt die Gate-Schwelle; Werte ausserhalb 0..=1000 werden abgelehnt
    pub fn schwelle_setzen(&self, wert: i64) -> AudioResult<()> {
        let wert = im_bereich(wert, SCHWELLE_MAX)?;
        self.schwelle.store(wert, Ordering::Relaxed);
        tracing::debug!(schwelle = wert, "Gate-Schwelle geaendert");
        Ok(())
    }

    // --- Lautstaerken ---

    pub fn mic_lautstaerke(&self) -> u32 {
        self.mic_lautstaerke.load(Ordering::Relaxed)
    }

    /// Setzt die Mikrofon-Lautstaerke (0..=100)
    pub fn mic_lautstaerke_setzen(&self, wert: i64) -> AudioResult<()> {
        let wert = im_bereich(wert, LAUTSTAERKE_MAX)?;
        self.mic_lautstaerke.store(wert, Ordering::Relaxed);
        tracing::debug!(lautstaerke = wert, "Mikrofon-Lautstaerke geaendert");
        Ok(())
    }

    pub fn ton_lautstaerke(&self) -> u32 {
        self.ton_lautstaerke.load(Ordering::Relaxed)
    }

    /// Setzt die Wiedergabe-Lautstaerke (0..=100)
    pub fn ton_lautstaerke_setzen(&self, wert: i64) -> AudioResult<()> {
        let wert = im_bereich(wert, LAUTSTAERKE_MAX)?;
        self.ton_lautstaerke.store(wert, Ordering::Relaxed);
        tracing::debug!(lautstaerke = wert, "Wiedergabe-Lautstaerke geaendert");
        Ok(())
    }

    // --- Stummschaltung ---

    pub fn mic_stumm(&self) -> bool {
        self.mic_stumm.load(Ordering::Relaxed)
    }

    pub fn mic_stumm_setzen(&self, stumm: bool) {
        self.mic_stumm.store(stumm, Ordering::Relaxed);
    }

    /// Schaltet das Mikrofon um und gibt den neuen Zustand zurueck
    pub fn mic_stumm_umschalten(&self) -> bool {
        !self.mic_stumm.fetch_xor(true, Ordering::Relaxed)
    }

    pub fn ton_stumm(&self) -> bool {
        self.ton_stumm.load(Ordering::Relaxed)
    }

    pub fn ton_stumm_setzen(&self, stumm: bool) {
        self.ton_stumm.store(stumm, Ordering::Relaxed);
    }

    /// Schaltet die Wiedergabe um und gibt den neuen Zustand zurueck
    pub fn ton_stumm_umschalten(&self) -> bool {
        !self.ton_stumm.fetch_xor(true, Ordering::Relaxed)
    }
}

impl Default for AudioSettings {
    fn default() -> Self {
        Self::neu()
    }
}

fn im_bereich(wert: i64, max: u32) -> AudioResult<u32> {
    if (0..=i64::from(max)).contains(&wert) {
        // Bereich ist geprueft, passt in u32
        Ok(wert as u32)
    } else {
        Err(AudioError::UngueltigerWert {
            wert,
            min: 0,
            max: i64::from(max),
        })
    }
}
