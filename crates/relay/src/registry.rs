//! Client-Registry – In-Memory Zustand aller aktiven Sitzungen
//!
//! Verwaltet pro Endpunkt:
//! - Anzeigename (wird nach dem Anlegen nie ueberschrieben)
//! - Zeitpunkt der letzten Aktivitaet
//!
//! Die Registry gehoert exklusiv der Dispatch-Loop. Es gibt genau einen
//! Besitzer, daher keine interne Synchronisation.

use std::collections::HashMap;
use std::time::{Duration, Instant};
use voxrelay_core::{anzeigename_normalisieren, Endpunkt, SESSION_TIMEOUT};

// ---------------------------------------------------------------------------
// ClientSitzung
// ---------------------------------------------------------------------------

/// Zustand eines einzelnen verbundenen Clients
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientSitzung {
    /// UDP-Endpunkt des Clients
    pub endpunkt: Endpunkt,
    /// Anzeigename
    pub name: String,
    /// Zeitpunkt des letzten empfangenen Pakets
    pub letzte_aktivitaet: Instant,
    /// Einfuege-Reihenfolge (fuer stabile Benutzerliste)
    reihenfolge: u64,
}

impl ClientSitzung {
    /// Prueft ob die Sitzung zum Zeitpunkt `jetzt` abgelaufen ist
    pub fn ist_abgelaufen(&self, jetzt: Instant, timeout: Duration) -> bool {
        jetzt.saturating_duration_since(self.letzte_aktivitaet) > timeout
    }
}

// ---------------------------------------------------------------------------
// ClientRegistry
// ---------------------------------------------------------------------------

/// Zuordnung Endpunkt -> Sitzung
///
/// Invariante: jeder Endpunkt hat hoechstens eine Sitzung.
#[derive(Debug)]
pub struct ClientRegistry {
    sitzungen: HashMap<Endpunkt, ClientSitzung>,
    timeout: Duration,
    naechste_reihenfolge: u64,
}

impl ClientRegistry {
    /// Erstellt eine leere Registry mit dem Standard-Timeout (30 s)
    pub fn neu() -> Self {
        Self::mit_timeout(SESSION_TIMEOUT)
    }

    /// Erstellt eine leere Registry mit eigenem Inaktivitaets-Timeout
    pub fn mit_timeout(timeout: Duration) -> Self {
        Self {
            sitzungen: HashMap::new(),
            timeout,
            naechste_reihenfolge: 0,
        }
    }

    /// Legt eine Sitzung an oder frischt eine bestehende auf
    ///
    /// Gibt eine Kopie der Sitzung und `true` zurueck, wenn sie neu ist.
    /// Bei bestehenden Sitzungen wird nur die Aktivitaet aktualisiert.
    pub fn upsert(
        &mut self,
        endpunkt: Endpunkt,
        name: Option<&str>,
        jetzt: Instant,
    ) -> (ClientSitzung, bool) {
        if let Some(sitzung) = self.sitzungen.get_mut(&endpunkt) {
            sitzung.letzte_aktivitaet = jetzt;
            return (sitzung.clone(), false);
        }

        let sitzung = ClientSitzung {
            endpunkt,
            name: anzeigename_normalisieren(name),
            letzte_aktivitaet: jetzt,
            reihenfolge: self.naechste_reihenfolge,
        };
        self.naechste_reihenfolge += 1;
        self.sitzungen.insert(endpunkt, sitzung.clone());

        tracing::info!(
            endpunkt = %endpunkt,
            name = %sitzung.name,
            gesamt = self.sitzungen.len(),
            "Client registriert"
        );
        (sitzung, true)
    }

    /// Aktualisiert nur den Aktivitaets-Zeitstempel
    ///
    /// Gibt `false` zurueck wenn der Endpunkt unbekannt ist.
    pub fn beruehren(&mut self, endpunkt: &Endpunkt, jetzt: Instant) -> bool {
        match self.sitzungen.get_mut(endpunkt) {
            Some(sitzung) => {
                sitzung.letzte_aktivitaet = jetzt;
                true
            }
            None => false,
        }
    }

    /// Entfernt eine Sitzung (idempotent)
    pub fn entfernen(&mut self, endpunkt: &Endpunkt) -> Option<ClientSitzung> {
        let entfernt = self.sitzungen.remove(endpunkt);
        if let Some(sitzung) = &entfernt {
            tracing::info!(
                endpunkt = %endpunkt,
                name = %sitzung.name,
                gesamt = self.sitzungen.len(),
                "Client entfernt"
            );
        }
        entfernt
    }

    /// Bereinigt inaktive Sitzungen (Timeout-Handling)
    ///
    /// Gibt die Endpunkte der entfernten Sitzungen zurueck.
    pub fn abgelaufene_entfernen(&mut self, jetzt: Instant) -> Vec<Endpunkt> {
        let timeout = self.timeout;
        let mut kandidaten: Vec<(u64, Endpunkt)> = self
            .sitzungen
            .values()
            .filter(|s| s.ist_abgelaufen(jetzt, timeout))
            .map(|s| (s.reihenfolge, s.endpunkt))
            .collect();
        kandidaten.sort_unstable_by_key(|(reihenfolge, _)| *reihenfolge);
        let abgelaufen: Vec<Endpunkt> = kandidaten.into_iter().map(|(_, e)| e).collect();

        for endpunkt in &abgelaufen {
            if let Some(sitzung) = self.sitzungen.remove(endpunkt) {
                tracing::warn!(
                    endpunkt = %endpunkt,
                    name = %sitzung.name,
                    "Inaktiver Client entfernt (Timeout)"
                );
            }
        }

        abgelaufen
    }

    /// Momentaufnahme aller Sitzungen in Einfuege-Reihenfolge
    pub fn sitzungen(&self) -> Vec<ClientSitzung> {
        let mut liste: Vec<ClientSitzung> = self.sitzungen.values().cloned().collect();
        liste.sort_by_key(|s| s.reihenfolge);
        liste
    }

    /// Alle Endpunkte in Einfuege-Reihenfolge
    pub fn endpunkte(&self) -> Vec<Endpunkt> {
        self.sitzungen().into_iter().map(|s| s.endpunkt).collect()
    }

    /// Anzeigename eines registrierten Endpunkts
    pub fn name_von(&self, endpunkt: &Endpunkt) -> Option<&str> {
        self.sitzungen.get(endpunkt).map(|s| s.name.as_str())
    }

    /// Prueft ob ein Endpunkt registriert ist
    pub fn enthaelt(&self, endpunkt: &Endpunkt) -> bool {
        self.sitzungen.contains_key(endpunkt)
    }

    /// Anzahl der registrierten Clients
    pub fn anzahl(&self) -> usize {
        self.sitzungen.len()
    }

    pub fn ist_leer(&self) -> bool {
        self.sitzungen.is_empty()
    }

    /// Konfiguriertes Inaktivitaets-Timeout
    pub fn timeout(&self) -> Duration {
        self.timeout
    }
}

impl Default for ClientRegistry {
    fn default() -> Self {
        Self::neu()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
