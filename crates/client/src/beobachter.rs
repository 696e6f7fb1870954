//! Beobachter-Schnittstelle zur Oberflaeche
//!
//! Der Client ruft die Methoden aus seinen Empfangs- und Audio-Threads auf.
//! Implementierungen muessen daher `Send + Sync` sein und duerfen nicht
//! lange blockieren.

use tokio::sync::mpsc;
use voxrelay_protocol::ApiBenutzer;

/// Eingehende Chat-Nachrichten
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Nachrichten<'a> {
    /// Eine neue Zeile `"name: text"`
    Neu(&'a str),
    /// Kompletter Verlauf (ersetzt die bisherige Anzeige), neueste zuletzt
    Verlauf(&'a [String]),
}

/// Callbacks fuer Oberflaechen (GUI, Terminal, Headless)
pub trait ClientBeobachter: Send + Sync {
    fn benutzer_geaendert(&self, _benutzer: &[ApiBenutzer]) {}

    fn nachrichten_empfangen(&self, _nachrichten: Nachrichten<'_>) {}

    fn servername_empfangen(&self, _name: &str) {}

    /// Laufzeitfehler (z.B. Audio-Geraet ausgefallen)
    fn fehler(&self, _meldung: &str) {}

    /// Verbindung beendet; wird genau einmal gemeldet
    fn getrennt(&self) {}
}

/// Beobachter ohne Reaktion
#[derive(Debug, Default)]
pub struct KeinBeobachter;

impl ClientBeobachter for KeinBeobachter {}

// ---------------------------------------------------------------------------
// KanalBeobachter
// ---------------------------------------------------------------------------

/// Ereignis als eigenstaendiger Wert (fuer [`KanalBeobachter`])
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClientEreignis {
    Benutzer(Vec<ApiBenutzer>),
    Nachricht(String),
    Verlauf(Vec<String>),
    Servername(String),
    Fehler(String),
    Getrennt,
}

/// Leitet alle Callbacks als [`ClientEreignis`] in einen Tokio-Kanal
#[derive(Debug, Clone)]
pub struct KanalBeobachter {
    tx: mpsc::UnboundedSender<ClientEreignis>,
}

impl KanalBeobachter {
    pub fn neu() -> (Self, mpsc::UnboundedReceiver<ClientEreignis>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }

    fn melden(&self, ereignis: ClientEreignis) {
        // Empfaenger weg: Oberflaeche ist bereits beendet
        let _ = self.tx.send(ereignis);
    }
}

impl ClientBeobachter for KanalBeobachter {
    fn benutzer_geaendert(&self, benutzer: &[ApiBenutzer]) {
        self.melden(ClientEreignis::Benutzer(benutzer.to_vec()));
    }

    fn nachrichten_empfangen(&self, nachrichten: Nachrichten<'_>) {
        let ereignis = match nachrichten {
            Nachrichten::Neu(zeile) => ClientEreignis::Nachricht(zeile.to_string()),
            Nachrichten::Verlauf(zeilen) => ClientEreignis::Verlauf(zeilen.to_vec()),
        };
        self.melden(ereignis);
    }

    fn servername_empfangen(&self, name: &str) {
        self.melden(ClientEreignis::Servername(name.to_string()));
    }

    fn fehler(&self, meldung: &str) {
        self.melden(ClientEreignis::Fehler(meldung.to_string()));
    }

    fn getrennt(&self) {
        self.melden(ClientEreignis::Getrennt);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kanal_beobachter_leitet_weiter() {
        let (beobachter, mut rx) = KanalBeobachter::neu();
        beobachter.servername_empfangen("Stammtisch");
        beobachter.nachrichten_empfangen(Nachrichten::Neu("Alice: hi"));
        beobachter.nachrichten_empfangen(Nachrichten::Verlauf(&["a".to_string()]));
        beobachter.getrennt();

        assert_eq!(rx.try_recv().unwrap(), ClientEreignis::Servername("Stammtisch".into()));
        assert_eq!(rx.try_recv().unwrap(), ClientEreignis::Nachricht("Alice: hi".into()));
        assert_eq!(rx.try_recv().unwrap(), ClientEreignis::Verlauf(vec!["a".into()]));
        assert_eq!(rx.try_recv().unwrap(), ClientEreignis::Getrennt);
    }

    #[test]
    fn geschlossener_kanal_ist_kein_fehler() {
        let (beobachter, rx) = KanalBeobachter::neu();
        drop(rx);
        beobachter.fehler("egal");
    }
}
