//! Lautstaerke-Verstaerkung fuer i16-Samples
//!
//! Lautstaerke 0..=100 wird linear auf Verstaerkung 0.0..=2.0 abgebildet
//! (50 = unveraendert). Ergebnisse werden gerundet und auf den i16-Bereich
//! begrenzt.

use crate::settings::LAUTSTAERKE_STANDARD;

/// Verstaerkungsfaktor fuer eine Lautstaerke
pub fn verstaerkung(lautstaerke: u32) -> f64 {
    f64::from(lautstaerke) / f64::from(LAUTSTAERKE_STANDARD)
}

/// Wendet die Lautstaerke auf einen Sample-Puffer an (in place)
pub fn verstaerkung_anwenden(samples: &mut [i16], lautstaerke: u32) {
    if lautstaerke == LAUTSTAERKE_STANDARD {
        return;
    }
    let faktor = verstaerkung(lautstaerke);
    for s in samples.iter_mut() {
        *s = begrenzen(f64::from(*s) * faktor);
    }
}

/// Rundet und clippt auf den i16-Bereich
fn begrenzen(wert: f64) -> i16 {
    wert.round().clamp(f64::from(i16::MIN), f64::from(i16::MAX)) as i16
}
