//! Relay-Dispatcher – Verarbeitung eines Datagramms
//!
//! Klassifiziert jedes eingehende Datagramm, aktualisiert die Registry und
//! verteilt es je nach Pakettyp weiter.
//!
//! ## Zustandsautomat pro Endpunkt
//!
//! ```text
//! Unregistriert --Connect(name)--> Registriert --bye------> Abgemeldet
//!       ^                              |       --Timeout--> Entfernt
//!       |                              |       --Sendefehler-> Entfernt
//!   Audio/Text/Api: verworfen          +--Connect: nur Auffrischen
//! ```
//!
//! ## Fan-out
//! - Audio: an alle registrierten Endpunkte ausser dem Absender
//! - Text: an alle registrierten Endpunkte inklusive Absender
//! - Benutzerliste: an alle, nach jeder Aenderung der Registry
//!
//! Ein Sendefehler an einen Empfaenger gilt als implizites Trennen dieses
//! Empfaengers. Die uebrigen Empfaenger werden trotzdem bedient. Lokale
//! Fehler (voller Puffer, Datagramm zu gross) verwerfen nur das Datagramm.
//!
//! API-Antworten werden so gekuerzt, dass sie in ein Datagramm passen;
//! Namen und Texte sind bereits beim Eingang begrenzt.
//!
//! Der Dispatcher selbst macht kein I/O ausser ueber [`DatagrammSender`];
//! Zeitpunkte werden von aussen uebergeben.

use std::io;
use std::sync::Arc;
use std::time::Instant;

use tokio::net::UdpSocket;
use voxrelay_core::{auf_bytes_kuerzen, Endpunkt, MAX_DATAGRAMM, TEXT_MAX_BYTES};
use voxrelay_protocol::paket::{self, Paket, PaketTyp};
use voxrelay_protocol::{ApiAnfrage, ApiAuswertung, ApiNachricht};

use crate::history::MessageHistory;
use crate::registry::ClientRegistry;

// ---------------------------------------------------------------------------
// DatagrammSender
// ---------------------------------------------------------------------------

/// Nicht-blockierendes Versenden eines einzelnen Datagramms
pub trait DatagrammSender {
    fn senden(&self, daten: &[u8], ziel: Endpunkt) -> io::Result<()>;
}

impl DatagrammSender for UdpSocket {
    fn senden(&self, daten: &[u8], ziel: Endpunkt) -> io::Result<()> {
        self.try_send_to(daten, ziel).map(|_| ())
    }
}

impl<T: DatagrammSender + ?Sized> DatagrammSender for Arc<T> {
    fn senden(&self, daten: &[u8], ziel: Endpunkt) -> io::Result<()> {
        (**self).senden(daten, ziel)
    }
}

// ---------------------------------------------------------------------------
// Ergebnis-Typen
// ---------------------------------------------------------------------------

/// Grund fuer das Verwerfen eines Datagramms
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verwerfgrund {
    /// Leeres Datagramm
    Leer,
    /// Typ-Byte unbekannt
    UnbekannterTyp(u8),
    /// Absender hat keine Sitzung
    NichtRegistriert,
    /// ApiJson nicht parsebar
    UngueltigesJson,
    /// ApiJson mit unbekannter Action
    UnbekannteAction,
    /// Text ohne Inhalt
    LeererText,
}

/// Was der Dispatcher mit einem Datagramm gemacht hat
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verarbeitung {
    /// Neue Sitzung angelegt
    Angemeldet,
    /// Bestehende Sitzung aufgefrischt (Connect ohne Wirkung)
    Aufgefrischt,
    AudioWeitergeleitet { empfaenger: usize },
    TextVerteilt { empfaenger: usize },
    ApiBeantwortet,
    Abgemeldet,
    Verworfen(Verwerfgrund),
}

/// Zaehler fuer Betrieb und Tests
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct RelayStatistik {
    pub empfangen: u64,
    pub verworfen: u64,
    /// Erfolgreich versendete Datagramme
    pub gesendet: u64,
    /// Wegen voller Socket-Puffer nicht versendete Datagramme
    pub sendepuffer_voll: u64,
    /// Lokal abgelehnte Datagramme (zu gross, ungueltig); Empfaenger bleibt
    pub lokal_verworfen: u64,
    pub entfernt_timeout: u64,
    pub entfernt_sendefehler: u64,
}

/// Ergebnis eines einzelnen Sendeversuchs
enum Zustellung {
    Ok,
    /// Lokaler Fehler – Datagramm verloren, Empfaenger bleibt
    Verloren,
    /// Empfaenger gilt als getrennt
    Fehlgeschlagen,
}

// ---------------------------------------------------------------------------
// RelayDispatcher
// ---------------------------------------------------------------------------

/// Kern des Relays: besitzt Registry und Verlauf
pub struct RelayDispatcher<S> {
    sender: S,
    server_name: String,
    registry: ClientRegistry,
    history: MessageHistory,
    statistik: RelayStatistik,
}

impl<S: DatagrammSender> RelayDispatcher<S> {
    /// Erstellt einen Dispatcher mit leerer Registry und leerem Verlauf
    pub fn neu(sender: S, server_name: impl Into<String>, registry: ClientRegistry) -> Self {
        Self {
            sender,
            server_name: server_name.into(),
            registry,
            history: MessageHistory::neu(),
            statistik: RelayStatistik::default(),
        }
    }

    /// Verarbeitet ein empfangenes Datagramm
    ///
    /// Sendefehler werden intern behandelt und nie an den Aufrufer gereicht.
    pub fn verarbeiten(&mut self, daten: &[u8], absender: Endpunkt, jetzt: Instant) -> Verarbeitung {
        self.statistik.empfangen += 1;

        // Abmeldung zuerst: das rohe "bye" aelterer Clients hat kein Typ-Byte
        if paket::ist_bye(daten) {
            return self.abmelden(absender);
        }

        let paket = match Paket::decode(daten) {
            Ok(p) => p,
            Err(e) => {
                tracing::debug!(fehler = %e, absender = %absender, "Ungueltiges Datagramm");
                // Auch ein kaputtes Datagramm zeigt, dass der Client noch da ist
                self.registry.beruehren(&absender, jetzt);
                let grund = match e {
                    voxrelay_protocol::ProtokollFehler::UnbekannterTyp(tag) => {
                        Verwerfgrund::UnbekannterTyp(tag)
                    }
                    _ => Verwerfgrund::Leer,
                };
                return self.verwerfen(grund);
            }
        };

        if paket.typ == PaketTyp::Connect {
            return self.anmelden(absender, &paket, jetzt);
        }

        if !self.registry.beruehren(&absender, jetzt) {
            tracing::debug!(
                absender = %absender,
                typ = ?paket.typ,
                "Paket von unbekanntem Absender"
            );
            return self.verwerfen(Verwerfgrund::NichtRegistriert);
        }

        match paket.typ {
            PaketTyp::Audio => self.audio_weiterleiten(absender, paket),
            PaketTyp::Text => self.text_verteilen(absender, &paket),
            PaketTyp::ApiJson => self.api_beantworten(absender, &paket),
            PaketTyp::Connect => Verarbeitung::Aufgefrischt,
        }
    }

    /// Entfernt abgelaufene Sitzungen und verteilt ggf. die neue Benutzerliste
    ///
    /// Wird nach jedem Empfangszyklus aufgerufen, auch nach Poll-Timeouts.
    pub fn bereinigen(&mut self, jetzt: Instant) -> Vec<Endpunkt> {
        let entfernt = self.registry.abgelaufene_entfernen(jetzt);
        if !entfernt.is_empty() {
            self.statistik.entfernt_timeout += entfernt.len() as u64;
            self.benutzerliste_verteilen(Vec::new());
        }
        entfernt
    }

    pub fn registry(&self) -> &ClientRegistry {
        &self.registry
    }

    pub fn history(&self) -> &MessageHistory {
        &self.history
    }

    pub fn statistik(&self) -> RelayStatistik {
        self.statistik
    }

    pub fn server_name(&self) -> &str {
        &self.server_name
    }

    // -----------------------------------------------------------------------
    // Pakettypen
    // -----------------------------------------------------------------------

    fn anmelden(&mut self, absender: Endpunkt, paket: &Paket, jetzt: Instant) -> Verarbeitung {
        let name = paket.text_lossy();
        let (_, neu) = self.registry.upsert(absender, Some(name.as_str()), jetzt);
        if !neu {
            return Verarbeitung::Aufgefrischt;
        }

        // Willkommen + Verlauf nur an den Neuen
        let mut getrennt = Vec::new();
        let willkommen = Paket::willkommen(&self.server_name);
        if let Zustellung::Fehlgeschlagen = self.zustellen(&willkommen.encode(), absender) {
            getrennt.push(absender);
        } else if let Some(verlauf) = self.api_kodieren(&self.history.als_api()) {
            if let Zustellung::Fehlgeschlagen = self.zustellen(&verlauf, absender) {
                getrennt.push(absender);
            }
        }

        self.benutzerliste_verteilen(getrennt);
        Verarbeitung::Angemeldet
    }

    fn abmelden(&mut self, absender: Endpunkt) -> Verarbeitung {
        if self.registry.entfernen(&absender).is_none() {
            tracing::debug!(absender = %absender, "Abmeldung ohne Sitzung");
            return self.verwerfen(Verwerfgrund::NichtRegistriert);
        }
        self.benutzerliste_verteilen(Vec::new());
        Verarbeitung::Abgemeldet
    }

    fn audio_weiterleiten(&mut self, absender: Endpunkt, paket: Paket) -> Verarbeitung {
        // Nutzdaten werden unveraendert, neu als Audio getaggt, weitergereicht
        let bytes = Paket::audio(paket.nutzdaten).encode();
        let (empfaenger, getrennt) = self.verteilen(&bytes, Some(absender));

        tracing::trace!(
            absender = %absender,
            bytes = bytes.len(),
            empfaenger,
            "Audio weitergeleitet"
        );

        if !getrennt.is_empty() {
            self.benutzerliste_verteilen(getrennt);
        }
        Verarbeitung::AudioWeitergeleitet { empfaenger }
    }

    fn text_verteilen(&mut self, absender: Endpunkt, paket: &Paket) -> Verarbeitung {
        let roh = paket.text_lossy();
        if roh.trim().is_empty() {
            return self.verwerfen(Verwerfgrund::LeererText);
        }
        let text = auf_bytes_kuerzen(&roh, TEXT_MAX_BYTES);
        if text.len() < roh.len() {
            tracing::debug!(absender = %absender, bytes = roh.len(), "Text gekuerzt");
        }
        let name = self
            .registry
            .name_von(&absender)
            .unwrap_or(voxrelay_core::ANONYM)
            .to_string();

        let nummer = self.history.anhaengen(&name, text);
        let bytes = Paket::text(&format!("{name}: {text}")).encode();
        let (empfaenger, getrennt) = self.verteilen(&bytes, None);

        tracing::debug!(
            absender = %absender,
            name = %name,
            nummer,
            empfaenger,
            "Textnachricht verteilt"
        );

        if !getrennt.is_empty() {
            self.benutzerliste_verteilen(getrennt);
        }
        Verarbeitung::TextVerteilt { empfaenger }
    }

    fn api_beantworten(&mut self, absender: Endpunkt, paket: &Paket) -> Verarbeitung {
        let anfrage = match ApiAnfrage::parse(&paket.nutzdaten) {
            Ok(ApiAuswertung::Bekannt(a)) => a,
            Ok(ApiAuswertung::Unbekannt(action)) => {
                tracing::debug!(absender = %absender, action = %action, "Unbekannte API-Action");
                return self.verwerfen(Verwerfgrund::UnbekannteAction);
            }
            Err(e) => {
                tracing::debug!(absender = %absender, fehler = %e, "Ungueltige API-Anfrage");
                return self.verwerfen(Verwerfgrund::UngueltigesJson);
            }
        };

        let antwort = match anfrage {
            ApiAnfrage::Users => self.benutzerliste(),
            ApiAnfrage::Messages => self.history.als_api(),
        };
        if let Some(bytes) = self.api_kodieren(&antwort) {
            if let Zustellung::Fehlgeschlagen = self.zustellen(&bytes, absender) {
                self.benutzerliste_verteilen(vec![absender]);
            }
        }
        Verarbeitung::ApiBeantwortet
    }

    // -----------------------------------------------------------------------
    // Fan-out
    // -----------------------------------------------------------------------

    fn benutzerliste(&self) -> ApiNachricht {
        let sitzungen = self.registry.sitzungen();
        ApiNachricht::benutzerliste(sitzungen.iter().map(|s| (s.endpunkt, s.name.as_str())))
    }

    /// Entfernt `getrennt` und verteilt die Benutzerliste an alle.
    ///
    /// Schlaegt dabei erneut ein Versand fehl, wird der Empfaenger entfernt
    /// und die Liste nochmals verteilt. Jede Runde entfernt mindestens einen
    /// Client, die Schleife endet also spaetestens bei leerer Registry.
    fn benutzerliste_verteilen(&mut self, mut getrennt: Vec<Endpunkt>) {
        loop {
            for endpunkt in getrennt.drain(..) {
                if self.registry.entfernen(&endpunkt).is_some() {
                    self.statistik.entfernt_sendefehler += 1;
                    tracing::warn!(endpunkt = %endpunkt, "Client nach Sendefehler entfernt");
                }
            }

            let Some(bytes) = self.api_kodieren(&self.benutzerliste()) else {
                return;
            };
            let (_, fehlgeschlagen) = self.verteilen(&bytes, None);
            if fehlgeschlagen.is_empty() {
                return;
            }
            getrennt = fehlgeschlagen;
        }
    }

    /// Sendet `daten` an alle registrierten Endpunkte (optional ohne einen)
    ///
    /// Gibt die Anzahl erfolgreicher Zustellungen und die fehlgeschlagenen
    /// Endpunkte zurueck. Die Registry wird hier nicht veraendert.
    fn verteilen(&mut self, daten: &[u8], ausser: Option<Endpunkt>) -> (usize, Vec<Endpunkt>) {
        let mut zugestellt = 0usize;
        let mut fehlgeschlagen = Vec::new();

        for ziel in self.registry.endpunkte() {
            if Some(ziel) == ausser {
                continue;
            }
            match self.zustellen(daten, ziel) {
                Zustellung::Ok => zugestellt += 1,
                Zustellung::Verloren => {}
                Zustellung::Fehlgeschlagen => fehlgeschlagen.push(ziel),
            }
        }

        (zugestellt, fehlgeschlagen)
    }

    fn zustellen(&mut self, daten: &[u8], ziel: Endpunkt) -> Zustellung {
        if daten.len() > MAX_DATAGRAMM {
            self.statistik.lokal_verworfen += 1;
            tracing::warn!(ziel = %ziel, bytes = daten.len(), "Datagramm zu gross – verworfen");
            return Zustellung::Verloren;
        }
        match self.sender.senden(daten, ziel) {
            Ok(()) => {
                self.statistik.gesendet += 1;
                Zustellung::Ok
            }
            Err(e) if e.kind() == io::ErrorKind::WouldBlock => {
                self.statistik.sendepuffer_voll += 1;
                tracing::trace!(ziel = %ziel, "Sendepuffer voll – Datagramm verworfen");
                Zustellung::Verloren
            }
            Err(e) if ist_lokaler_fehler(&e) => {
                self.statistik.lokal_verworfen += 1;
                tracing::warn!(fehler = %e, ziel = %ziel, bytes = daten.len(), "Datagramm lokal abgelehnt");
                Zustellung::Verloren
            }
            Err(e) => {
                tracing::warn!(fehler = %e, ziel = %ziel, "UDP-Sendefehler");
                Zustellung::Fehlgeschlagen
            }
        }
    }

    fn api_kodieren(&self, nachricht: &ApiNachricht) -> Option<bytes::Bytes> {
        match nachricht.zu_paket_begrenzt(MAX_DATAGRAMM) {
            Ok((paket, weggelassen)) => {
                if weggelassen > 0 {
                    tracing::debug!(
                        action = nachricht.action(),
                        weggelassen,
                        "API-Antwort auf Datagrammgroesse gekuerzt"
                    );
                }
                Some(paket.encode())
            }
            Err(e) => {
                tracing::error!(fehler = %e, action = nachricht.action(), "API-Nachricht nicht serialisierbar");
                None
            }
        }
    }

    fn verwerfen(&mut self, grund: Verwerfgrund) -> Verarbeitung {
        self.statistik.verworfen += 1;
        Verarbeitung::Verworfen(grund)
    }
}

/// EMSGSIZE je Plattform
#[cfg(target_os = "linux")]
const EMSGSIZE: Option<i32> = Some(90);
#[cfg(any(target_os = "macos", target_os = "ios", target_os = "freebsd"))]
const EMSGSIZE: Option<i32> = Some(40);
#[cfg(windows)]
const EMSGSIZE: Option<i32> = Some(10040);
#[cfg(not(any(
    target_os = "linux",
    target_os = "macos",
    target_os = "ios",
    target_os = "freebsd",
    windows
)))]
const EMSGSIZE: Option<i32> = None;

/// Fehler, die am Datagramm liegen und nicht am Empfaenger
fn ist_lokaler_fehler(e: &io::Error) -> bool {
    e.kind() == io::ErrorKind::InvalidInput
        || (EMSGSIZE.is_some() && e.raw_os_error() == EMSGSIZE)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;
    use std::collections::HashSet;
    use std::net::{IpAddr, Ipv4Addr, SocketAddr};
    use std::time::Duration;

    /// Zeichnet alle gesendeten Datagramme auf; einzelne Ziele koennen
    /// Fehler liefern.
    #[derive(Default)]
    struct TestSender {
        gesendet: RefCell<Vec<(Endpunkt, Vec<u8>)>>,
        defekt: RefCell<HashSet<Endpunkt>>,
        voll: RefCell<HashSet<Endpunkt>>,
        /// Ziele, fuer die der Socket jedes Datagramm als ungueltig ablehnt
        abgelehnt: RefCell<HashSet<Endpunkt>>,
    }

    impl DatagrammSender for TestSender {
        fn senden(&self, daten: &[u8], ziel: Endpunkt) -> io::Result<()> {
            if self.defekt.borrow().contains(&ziel) {
                return Err(io::Error::new(io::ErrorKind::ConnectionRefused, "weg"));
            }
            if self.voll.borrow().contains(&ziel) {
                return Err(io::Error::new(io::ErrorKind::WouldBlock, "voll"));
            }
            if self.abgelehnt.borrow().contains(&ziel) {
                return Err(io::Error::new(io::ErrorKind::InvalidInput, "Nachricht zu lang"));
            }
            assert!(daten.len() <= MAX_DATAGRAMM, "Datagramm ueber UDP-Limit: {}", daten.len());
            self.gesendet.borrow_mut().push((ziel, daten.to_vec()));
            Ok(())
        }
    }

    impl TestSender {
        /// Alle an `ziel` gesendeten Pakete (und leert die Aufzeichnung dafuer)
        fn an(&self, ziel: Endpunkt) -> Vec<Paket> {
            let mut gesendet = self.gesendet.borrow_mut();
            let (treffer, rest): (Vec<_>, Vec<_>) =
                gesendet.drain(..).partition(|(z, _)| *z == ziel);
            *gesendet = rest;
            treffer
                .into_iter()
                .map(|(_, d)| Paket::decode(&d).expect("Server sendet nur gueltige Pakete"))
                .collect()
        }

        fn leeren(&self) {
            self.gesendet.borrow_mut().clear();
        }
    }

    fn endpunkt(port: u16) -> SocketAddr {
        SocketAddr::new(IpAddr::V4(Ipv4Addr::LOCALHOST), port)
    }

    fn dispatcher() -> RelayDispatcher<Arc<TestSender>> {
        RelayDispatcher::neu(Arc::new(TestSender::default()), "Testserver", ClientRegistry::neu())
    }

    fn benutzernamen(paket: &Paket) -> Vec<String> {
        match ApiNachricht::parse(&paket.nutzdaten).unwrap() {
            ApiAuswertung::Bekannt(ApiNachricht::Users(liste)) => {
                liste.into_iter().map(|b| b.name).collect()
            }
            andere => panic!("Erwartet Benutzerliste, war {andere:?}"),
        }
    }

    fn anmelden(d: &mut RelayDispatcher<Arc<TestSender>>, port: u16, name: &str, jetzt: Instant) {
        let v = d.verarbeiten(&Paket::connect(name).encode(), endpunkt(port), jetzt);
        assert_eq!(v, Verarbeitung::Angemeldet);
    }

    #[test]
    fn connect_sendet_willkommen_verlauf_und_liste() {
        let mut d = dispatcher();
        let sender = Arc::clone(&d.sender);
        anmelden(&mut d, 4001, "Alice", Instant::now());

        let pakete = sender.an(endpunkt(4001));
        assert_eq!(pakete.len(), 3);
        assert_eq!(pakete[0].servername().as_deref(), Some("Testserver"));
        assert_eq!(pakete[1].typ, PaketTyp::ApiJson);
        assert_eq!(pakete[1].text_lossy(), r#"{"action":"messages","objects":[]}"#);
        assert_eq!(benutzernamen(&pakete[2]), vec!["Alice"]);
    }

    #[test]
    fn zweiter_connect_nur_auffrischen() {
        let mut d = dispatcher();
        let sender = Arc::clone(&d.sender);
        let t0 = Instant::now();
        anmelden(&mut d, 4001, "Alice", t0);
        sender.leeren();

        let t1 = t0 + Duration::from_secs(10);
        let v = d.verarbeiten(&Paket::connect("Alice").encode(), endpunkt(4001), t1);
        assert_eq!(v, Verarbeitung::Aufgefrischt);
        assert!(sender.an(endpunkt(4001)).is_empty(), "Kein doppeltes Willkommen");
        assert_eq!(d.registry().sitzungen()[0].letzte_aktivitaet, t1);
    }

    #[test]
    fn audio_nie_an_absender() {
        let mut d = dispatcher();
        let sender = Arc::clone(&d.sender);
        let jetzt = Instant::now();
        anmelden(&mut d, 4001, "Alice", jetzt);
        anmelden(&mut d, 4002, "Bob", jetzt);
        anmelden(&mut d, 4003, "Carol", jetzt);
        sender.leeren();

        let pcm = vec![1u8, 0, 2, 0];
        let v = d.verarbeiten(&Paket::audio(pcm.clone()).encode(), endpunkt(4001), jetzt);
        assert_eq!(v, Verarbeitung::AudioWeitergeleitet { empfaenger: 2 });

        assert!(sender.an(endpunkt(4001)).is_empty(), "Absender darf kein Echo empfangen");
        for port in [4002, 4003] {
            let pakete = sender.an(endpunkt(port));
            assert_eq!(pakete.len(), 1);
            assert_eq!(pakete[0], Paket::audio(pcm.clone()));
        }
    }

    #[test]
    fn text_an_alle_inklusive_absender_und_verlauf() {
        let mut d = dispatcher();
        let sender = Arc::clone(&d.sender);
        let jetzt = Instant::now();
        anmelden(&mut d, 4001, "Alice", jetzt);
        anmelden(&mut d, 4002, "Bob", jetzt);
        sender.leeren();

        let v = d.verarbeiten(&Paket::text("hi").encode(), endpunkt(4001), jetzt);
        assert_eq!(v, Verarbeitung::TextVerteilt { empfaenger: 2 });
        for port in [4001, 4002] {
            let pakete = sender.an(endpunkt(port));
            assert_eq!(pakete, vec![Paket::text("Alice: hi")]);
        }
        assert_eq!(d.history().anzahl(), 1);
        assert_eq!(d.history().letzte(1)[0].absender, "Alice");
    }

    #[test]
    fn unregistriert_wird_verworfen() {
        let mut d = dispatcher();
        let sender = Arc::clone(&d.sender);
        let jetzt = Instant::now();

        for paket in [Paket::audio(vec![0u8; 8]), Paket::text("hallo"), Paket::api(&b"{}"[..])] {
            let v = d.verarbeiten(&paket.encode(), endpunkt(4009), jetzt);
            assert_eq!(v, Verarbeitung::Verworfen(Verwerfgrund::NichtRegistriert));
        }
        assert!(d.registry().ist_leer());
        assert!(d.history().ist_leer());
        assert!(sender.gesendet.borrow().is_empty());
    }

    #[test]
    fn bye_ohne_sitzung_legt_nichts_an() {
        let mut d = dispatcher();
        let v = d.verarbeiten(&Paket::bye().encode(), endpunkt(4010), Instant::now());
        assert_eq!(v, Verarbeitung::Verworfen(Verwerfgrund::NichtRegistriert));
        assert!(d.registry().ist_leer());
    }

    #[test]
    fn bye_roh_und_getaggt_meldet_ab() {
        let mut d = dispatcher();
        let sender = Arc::clone(&d.sender);
        let jetzt = Instant::now();
        anmelden(&mut d, 4001, "Alice", jetzt);
        anmelden(&mut d, 4002, "Bob", jetzt);
        anmelden(&mut d, 4003, "Carol", jetzt);
        sender.leeren();

        assert_eq!(d.verarbeiten(b"bye", endpunkt(4002), jetzt), Verarbeitung::Abgemeldet);
        let pakete = sender.an(endpunkt(4001));
        assert_eq!(benutzernamen(&pakete[0]), vec!["Alice", "Carol"]);
        assert!(sender.an(endpunkt(4002)).is_empty());

        assert_eq!(
            d.verarbeiten(&Paket::bye().encode(), endpunkt(4003), jetzt),
            Verarbeitung::Abgemeldet
        );
        let pakete = sender.an(endpunkt(4001));
        assert_eq!(benutzernamen(&pakete[0]), vec!["Alice"]);
        assert_eq!(d.registry().anzahl(), 1);
    }

    #[test]
    fn leeres_und_unbekanntes_datagramm() {
        let mut d = dispatcher();
        let jetzt = Instant::now();
        assert_eq!(
            d.verarbeiten(&[], endpunkt(4001), jetzt),
            Verarbeitung::Verworfen(Verwerfgrund::Leer)
        );
        assert_eq!(
            d.verarbeiten(&[42, 1, 2], endpunkt(4001), jetzt),
            Verarbeitung::Verworfen(Verwerfgrund::UnbekannterTyp(42))
        );
        assert_eq!(d.statistik().verworfen, 2);
        assert_eq!(d.statistik().empfangen, 2);
    }

    #[test]
    fn timeout_entfernt_und_verteilt_liste() {
        let mut d = dispatcher();
        let sender = Arc::clone(&d.sender);
        let t0 = Instant::now();
        anmelden(&mut d, 4001, "Alice", t0);
        anmelden(&mut d, 4002, "Bob", t0);

        // Alice bleibt aktiv, Bob schweigt
        let t1 = t0 + Duration::from_secs(25);
        d.verarbeiten(&Paket::audio(vec![0u8; 4]).encode(), endpunkt(4001), t1);
        sender.leeren();

        assert!(d.bereinigen(t0 + Duration::from_secs(30)).is_empty());
        let entfernt = d.bereinigen(t0 + Duration::from_secs(31));
        assert_eq!(entfernt, vec![endpunkt(4002)]);

        let pakete = sender.an(endpunkt(4001));
        assert_eq!(benutzernamen(&pakete[0]), vec!["Alice"]);
        assert_eq!(d.statistik().entfernt_timeout, 1);
    }

    #[test]
    fn sendefehler_gilt_als_trennen() {
        let mut d = dispatcher();
        let sender = Arc::clone(&d.sender);
        let jetzt = Instant::now();
        anmelden(&mut d, 4001, "Alice", jetzt);
        anmelden(&mut d, 4002, "Bob", jetzt);
        anmelden(&mut d, 4003, "Carol", jetzt);
        sender.leeren();

        sender.defekt.borrow_mut().insert(endpunkt(4002));
        let v = d.verarbeiten(&Paket::audio(vec![9u8; 4]).encode(), endpunkt(4001), jetzt);

        // Carol bekommt das Audio trotz Bobs Fehler
        assert_eq!(v, Verarbeitung::AudioWeitergeleitet { empfaenger: 1 });
        let carol = sender.an(endpunkt(4003));
        assert_eq!(carol[0].typ, PaketTyp::Audio);
        assert_eq!(benutzernamen(&carol[1]), vec!["Alice", "Carol"]);

        assert!(!d.registry().enthaelt(&endpunkt(4002)));
        assert_eq!(d.statistik().entfernt_sendefehler, 1);
    }

    #[test]
    fn mehrere_sendefehler_in_folge() {
        let mut d = dispatcher();
        let sender = Arc::clone(&d.sender);
        let jetzt = Instant::now();
        for (port, name) in [(4001, "A"), (4002, "B"), (4003, "C"), (4004, "D")] {
            anmelden(&mut d, port, name, jetzt);
        }
        sender.leeren();
        sender.defekt.borrow_mut().extend([endpunkt(4002), endpunkt(4004)]);

        d.verarbeiten(&Paket::text("hallo").encode(), endpunkt(4001), jetzt);

        assert_eq!(d.registry().anzahl(), 2);
        let a = sender.an(endpunkt(4001));
        let liste = a.iter().find(|p| p.typ == PaketTyp::ApiJson).unwrap();
        assert_eq!(benutzernamen(liste), vec!["A", "C"]);
    }

    #[test]
    fn voller_sendepuffer_trennt_nicht() {
        let mut d = dispatcher();
        let sender = Arc::clone(&d.sender);
        let jetzt = Instant::now();
        anmelden(&mut d, 4001, "Alice", jetzt);
        anmelden(&mut d, 4002, "Bob", jetzt);
        sender.voll.borrow_mut().insert(endpunkt(4002));

        let v = d.verarbeiten(&Paket::audio(vec![1u8; 4]).encode(), endpunkt(4001), jetzt);
        assert_eq!(v, Verarbeitung::AudioWeitergeleitet { empfaenger: 0 });
        assert!(d.registry().enthaelt(&endpunkt(4002)));
        assert_eq!(d.statistik().sendepuffer_voll, 1);
    }

    #[test]
    fn api_anfragen_nur_an_absender() {
        let mut d = dispatcher();
        let sender = Arc::clone(&d.sender);
        let jetzt = Instant::now();
        anmelden(&mut d, 4001, "Alice", jetzt);
        anmelden(&mut d, 4002, "Bob", jetzt);
        d.verarbeiten(&Paket::text("eins").encode(), endpunkt(4002), jetzt);
        sender.leeren();

        let anfrage = ApiAnfrage::Users.zu_paket().unwrap().encode();
        assert_eq!(d.verarbeiten(&anfrage, endpunkt(4001), jetzt), Verarbeitung::ApiBeantwortet);
        let pakete = sender.an(endpunkt(4001));
        assert_eq!(benutzernamen(&pakete[0]), vec!["Alice", "Bob"]);
        assert!(sender.an(endpunkt(4002)).is_empty());

        let anfrage = ApiAnfrage::Messages.zu_paket().unwrap().encode();
        d.verarbeiten(&anfrage, endpunkt(4001), jetzt);
        let pakete = sender.an(endpunkt(4001));
        assert_eq!(pakete[0].text_lossy(), r#"{"action":"messages","objects":[{"id":"Bob","message":"eins"}]}"#);
    }

    #[test]
    fn ungueltiges_api_json_wird_verworfen() {
        let mut d = dispatcher();
        let jetzt = Instant::now();
        anmelden(&mut d, 4001, "Alice", jetzt);

        let v = d.verarbeiten(&Paket::api(&b"{kaputt"[..]).encode(), endpunkt(4001), jetzt);
        assert_eq!(v, Verarbeitung::Verworfen(Verwerfgrund::UngueltigesJson));
        let v = d.verarbeiten(&Paket::api(&br#"{"action":"kick"}"#[..]).encode(), endpunkt(4001), jetzt);
        assert_eq!(v, Verarbeitung::Verworfen(Verwerfgrund::UnbekannteAction));
        assert!(d.registry().enthaelt(&endpunkt(4001)));
    }

    #[test]
    fn verlauf_fuer_neue_teilnehmer_begrenzt() {
        let mut d = dispatcher();
        let sender = Arc::clone(&d.sender);
        let jetzt = Instant::now();
        anmelden(&mut d, 4001, "Alice", jetzt);
        for i in 0..25 {
            d.verarbeiten(&Paket::text(&format!("m{i}")).encode(), endpunkt(4001), jetzt);
        }
        anmelden(&mut d, 4002, "Bob", jetzt);

        let pakete = sender.an(endpunkt(4002));
        let ApiAuswertung::Bekannt(ApiNachricht::Messages(objekte)) =
            ApiNachricht::parse(&pakete[1].nutzdaten).unwrap()
        else {
            panic!("Erwartet Verlauf");
        };
        assert_eq!(objekte.len(), 20);
        assert_eq!(objekte.first().unwrap().message, "m5");
        assert_eq!(objekte.last().unwrap().message, "m24");
    }

    #[test]
    fn leerer_text_wird_verworfen_aber_frischt_auf() {
        let mut d = dispatcher();
        let t0 = Instant::now();
        anmelden(&mut d, 4001, "Alice", t0);
        let t1 = t0 + Duration::from_secs(3);
        let v = d.verarbeiten(&Paket::text("   ").encode(), endpunkt(4001), t1);
        assert_eq!(v, Verarbeitung::Verworfen(Verwerfgrund::LeererText));
        assert!(d.history().ist_leer());
        assert_eq!(d.registry().sitzungen()[0].letzte_aktivitaet, t1);
    }

    #[test]
    fn grosser_verlauf_erreicht_neuen_teilnehmer() {
        let mut d = dispatcher();
        let sender = Arc::clone(&d.sender);
        let jetzt = Instant::now();
        anmelden(&mut d, 4001, "Alice", jetzt);
        let langer_text = "y".repeat(8000);
        for _ in 0..20 {
            d.verarbeiten(&Paket::text(&langer_text).encode(), endpunkt(4001), jetzt);
        }
        assert_eq!(d.history().letzte(1)[0].text.len(), TEXT_MAX_BYTES);

        anmelden(&mut d, 4002, "Bob", jetzt);
        let pakete = sender.an(endpunkt(4002));
        assert_eq!(pakete.len(), 3);
        let ApiAuswertung::Bekannt(ApiNachricht::Messages(objekte)) =
            ApiNachricht::parse(&pakete[1].nutzdaten).unwrap()
        else {
            panic!("Erwartet Verlauf");
        };
        assert_eq!(objekte.len(), 20);
        assert_eq!(benutzernamen(&pakete[2]), vec!["Alice", "Bob"]);
        assert!(d.registry().enthaelt(&endpunkt(4002)));
        assert_eq!(d.statistik().entfernt_sendefehler, 0);
    }

    #[test]
    fn verlauf_mit_escapes_wird_auf_datagramm_gekuerzt() {
        let mut d = dispatcher();
        let sender = Arc::clone(&d.sender);
        let jetzt = Instant::now();
        anmelden(&mut d, 4001, "Alice", jetzt);
        // Steuerzeichen werden in JSON zu \u0001 und wachsen auf das Sechsfache
        let text = "\u{1}".repeat(TEXT_MAX_BYTES);
        for _ in 0..20 {
            d.verarbeiten(&Paket::text(&text).encode(), endpunkt(4001), jetzt);
        }
        sender.leeren();

        anmelden(&mut d, 4002, "Bob", jetzt);
        let pakete = sender.an(endpunkt(4002));
        assert_eq!(pakete.len(), 3);
        assert!(pakete[1].encode().len() <= MAX_DATAGRAMM);
        let ApiAuswertung::Bekannt(ApiNachricht::Messages(objekte)) =
            ApiNachricht::parse(&pakete[1].nutzdaten).unwrap()
        else {
            panic!("Erwartet Verlauf");
        };
        assert!(!objekte.is_empty() && objekte.len() < 20);
        assert!(d.registry().enthaelt(&endpunkt(4002)));
    }

    #[test]
    fn lange_namen_behalten_alle_sitzungen() {
        let mut d = dispatcher();
        let sender = Arc::clone(&d.sender);
        let jetzt = Instant::now();
        for i in 0..9u16 {
            let name = format!("{i}{}", "n".repeat(8000));
            anmelden(&mut d, 4001 + i, &name, jetzt);
        }

        assert_eq!(d.registry().anzahl(), 9);
        assert_eq!(d.statistik().entfernt_sendefehler, 0);
        let pakete = sender.an(endpunkt(4001));
        let namen = benutzernamen(pakete.last().unwrap());
        assert_eq!(namen.len(), 9);
        assert!(namen.iter().all(|n| n.len() == voxrelay_core::NAME_MAX_BYTES));
    }

    #[test]
    fn lokal_abgelehntes_datagramm_trennt_nicht() {
        let mut d = dispatcher();
        let sender = Arc::clone(&d.sender);
        let jetzt = Instant::now();
        anmelden(&mut d, 4001, "Alice", jetzt);
        anmelden(&mut d, 4002, "Bob", jetzt);
        sender.leeren();
        sender.abgelehnt.borrow_mut().insert(endpunkt(4002));

        let v = d.verarbeiten(&Paket::text("hallo").encode(), endpunkt(4001), jetzt);
        assert_eq!(v, Verarbeitung::TextVerteilt { empfaenger: 1 });
        assert!(d.registry().enthaelt(&endpunkt(4002)));
        assert_eq!(d.statistik().lokal_verworfen, 1);
        assert_eq!(d.statistik().entfernt_sendefehler, 0);
    }

    #[test]
    fn emsgsize_gilt_als_lokaler_fehler() {
        if let Some(code) = EMSGSIZE {
            assert!(ist_lokaler_fehler(&io::Error::from_raw_os_error(code)));
        }
        assert!(ist_lokaler_fehler(&io::Error::new(io::ErrorKind::InvalidInput, "x")));
        assert!(!ist_lokaler_fehler(&io::Error::new(io::ErrorKind::ConnectionRefused, "x")));
    }

    #[test]
    fn kaputtes_datagramm_frischt_sitzung_auf() {
        let mut d = dispatcher();
        let t0 = Instant::now();
        anmelden(&mut d, 4001, "Alice", t0);
        anmelden(&mut d, 4002, "Bob", t0);

        let t1 = t0 + Duration::from_secs(20);
        d.verarbeiten(&[], endpunkt(4001), t1);
        d.verarbeiten(&[42, 0], endpunkt(4002), t1);

        assert!(d.bereinigen(t0 + Duration::from_secs(40)).is_empty());
        assert_eq!(d.registry().anzahl(), 2);
        // Kaputte Datagramme legen keine Sitzung an
        d.verarbeiten(&[], endpunkt(4003), t1);
        assert!(!d.registry().enthaelt(&endpunkt(4003)));
    }
}
