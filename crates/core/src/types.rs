//! Gemeinsame Typen und Protokoll-Konstanten
//!
//! Der Relay kennt Clients ausschliesslich ueber ihren UDP-Endpunkt
//! (IP-Adresse + Port). Es gibt keine weitere Identitaet.

use std::net::SocketAddr;
use std::time::Duration;

/// Netzwerk-Endpunkt eines Clients – einzige Identitaet einer Sitzung
pub type Endpunkt = SocketAddr;

/// Standard-UDP-Port des Relays
pub const STANDARD_PORT: u16 = 5555;

/// Inaktivitaetsfenster, nach dem eine Sitzung entfernt wird
pub const SESSION_TIMEOUT: Duration = Duration::from_secs(30);

/// Anzahl der History-Eintraege, die neue Teilnehmer erhalten
pub const HISTORY_LIMIT: usize = 20;

/// Anzeigename fuer Clients ohne (oder mit leerem) Namen
pub const ANONYM: &str = "Anonymous";

/// Maximale Laenge eines Anzeigenamens in Bytes
pub const NAME_MAX_BYTES: usize = 64;

/// Maximale Laenge einer Chat-Nachricht in Bytes
///
/// [`HISTORY_LIMIT`] Eintraege dieser Groesse passen samt JSON-Huelle in ein
/// Datagramm.
pub const TEXT_MAX_BYTES: usize = 1024;

/// Groesste Nutzlast eines UDP-Datagramms ueber IPv4
pub const MAX_DATAGRAMM: usize = 65_507;

/// Samples pro Audio-Block
pub const AUDIO_BLOCK_SAMPLES: usize = 1024;

/// Kleinster Empfangspuffer, der einen Audio-Block ungekuerzt aufnimmt
/// (Typ-Byte + i16-Samples)
pub const MIN_EMPFANGSPUFFER: usize = 1 + 2 * AUDIO_BLOCK_SAMPLES;

/// Normalisiert einen vom Client gelieferten Anzeigenamen.
///
/// Leerraum am Rand wird entfernt; ein leerer Name wird zu [`ANONYM`].
/// Laengere Namen werden auf [`NAME_MAX_BYTES`] gekuerzt.
pub fn anzeigename_normalisieren(name: Option<&str>) -> String {
    match name.map(|n| auf_bytes_kuerzen(n.trim(), NAME_MAX_BYTES).trim_end()) {
        Some(n) if !n.is_empty() => n.to_string(),
        _ => ANONYM.to_string(),
    }
}

/// Kuerzt `text` auf hoechstens `max` Bytes, ohne ein Zeichen zu teilen
pub fn auf_bytes_kuerzen(text: &str, max: usize) -> &str {
    if text.len() <= max {
        return text;
    }
    let mut ende = max;
    while !text.is_char_boundary(ende) {
        ende -= 1;
    }
    &text[..ende]
}
