//! PCM-Format auf dem Draht: i16 Little-Endian, Mono, 16 kHz

use bytes::{Buf, BufMut};

/// Abtastrate in Hz
pub const ABTASTRATE: u32 = 16_000;
/// Kanalanzahl
pub const KANAELE: u16 = 1;
/// Samples pro Block
pub const BLOCK_GROESSE: usize = voxrelay_core::AUDIO_BLOCK_SAMPLES;

/// Kodiert Samples als Little-Endian-Bytes
pub fn pcm_kodieren(samples: &[i16]) -> Vec<u8> {
    let mut buf = Vec::with_capacity(samples.len() * 2);
    for &s in samples {
        buf.put_i16_le(s);
    }
    buf
}

/// Dekodiert Little-Endian-Bytes; ein ueberzaehliges letztes Byte wird ignoriert
pub fn pcm_dekodieren(mut daten: &[u8]) -> Vec<i16> {
    let mut samples = Vec::with_capacity(daten.len() / 2);
    while daten.remaining() >= 2 {
        samples.push(daten.get_i16_le());
    }
    samples
}

/// Dauer eines Blocks in Millisekunden
pub fn block_dauer_ms() -> u64 {
    (BLOCK_GROESSE as u64 * 1000) / u64::from(ABTASTRATE)
}
