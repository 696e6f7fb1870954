//! Nachrichtenverlauf des Relays
//!
//! Unbegrenztes Append-Log; neue Teilnehmer erhalten nur die letzten
//! [`HISTORY_LIMIT`](voxrelay_core::HISTORY_LIMIT) Eintraege.

use voxrelay_core::HISTORY_LIMIT;
use voxrelay_protocol::ApiNachricht;

/// Ein Eintrag im Verlauf. Nach dem Anhaengen unveraenderlich.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HistoryEintrag {
    /// Anzeigename des Absenders
    pub absender: String,
    pub text: String,
    /// Laufende Nummer in Ankunftsreihenfolge
    pub nummer: u64,
}

#[derive(Debug, Default)]
pub struct MessageHistory {
    eintraege: Vec<HistoryEintrag>,
}

impl MessageHistory {
    pub fn neu() -> Self {
        Self::default()
    }

    /// Haengt eine Nachricht an und gibt ihre laufende Nummer zurueck
    pub fn anhaengen(&mut self, absender: &str, text: &str) -> u64 {
        let nummer = self.eintraege.len() as u64;
        self.eintraege.push(HistoryEintrag {
            absender: absender.to_string(),
            text: text.to_string(),
            nummer,
        });
        nummer
    }

    /// Die letzten `limit` Eintraege, aeltester zuerst
    pub fn letzte(&self, limit: usize) -> &[HistoryEintrag] {
        let start = self.eintraege.len().saturating_sub(limit);
        &self.eintraege[start..]
    }

    /// Verlauf als API-Nachricht (hoechstens 20 Eintraege, neueste zuletzt)
    pub fn als_api(&self) -> ApiNachricht {
        ApiNachricht::nachrichtenverlauf(
            self.letzte(HISTORY_LIMIT)
                .iter()
                .map(|e| (e.absender.as_str(), e.text.as_str())),
        )
    }

    pub fn anzahl(&self) -> usize {
        self.eintraege.len()
    }

    pub fn ist_leer(&self) -> bool {
        self.eintraege.is_empty()
    }
}
