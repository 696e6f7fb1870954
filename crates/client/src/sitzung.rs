//! Voice-Client – Sitzung mit einem Relay
//!
//! ## Sende-Pipeline (Mikrofon -> Relay)
//! ```text
//! Capture-Thread (std::thread, besitzt AudioQuelle)
//!     -> AudioQuelle::block_lesen() (1024 Samples)
//!     -> CapturePipeline: stumm? Gate (RMS) -> Verstaerkung -> PCM LE
//!     -> Paket::audio -> try_send_to(relay)
//! ```
//!
//! ## Empfangs-Pipeline (Relay -> Lautsprecher / Oberflaeche)
//! ```text
//! Empfangs-Task (tokio, recv_from mit Timeout)
//!     -> Paket::decode
//!     -> Audio:   PlaybackPipeline -> crossbeam bounded -> Playback-Thread -> AudioSenke
//!     -> Text:    ClientBeobachter::nachrichten_empfangen
//!     -> ApiJson: ClientBeobachter::benutzer_geaendert / nachrichten_empfangen
//!     -> Connect: ClientBeobachter::servername_empfangen
//! ```
//!
//! Trennen und Geraeteausfall laufen durch denselben Abbau: Flag setzen,
//! "bye" senden, Empfangs-Task signalisieren, Threads joinen, Beobachter
//! informieren. Der Abbau ist idempotent und laeuft auch beim Drop.

use std::net::{Ipv4Addr, Ipv6Addr, SocketAddr};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Duration;

use crossbeam_channel::{bounded, Receiver, RecvTimeoutError, Sender, TrySendError};
use parking_lot::Mutex;
use tokio::net::UdpSocket;
use tokio::sync::watch;
use tracing::{debug, error, info, trace, warn};
use voxrelay_audio::{
    AudioError, AudioQuelle, AudioSenke, AudioSettings, CapturePipeline, PlaybackPipeline,
    BLOCK_GROESSE,
};
use voxrelay_core::anzeigename_normalisieren;
use voxrelay_protocol::{
    ApiAnfrage, ApiAuswertung, ApiNachricht, ApiNachrichtEintrag, Paket, PaketTyp,
};

use crate::beobachter::{ClientBeobachter, Nachrichten};
use crate::error::{ClientError, ClientResult};

/// Standard-Groesse des Empfangspuffers
const EMPFANGSPUFFER: usize = 8192;

// ---------------------------------------------------------------------------
// Konfiguration
// ---------------------------------------------------------------------------

/// Verbindungsparameter des Clients
#[derive(Debug, Clone)]
pub struct ClientKonfig {
    /// Relay-Adresse
    pub server: SocketAddr,
    /// Anzeigename (leer = Anonymous)
    pub name: String,
    /// Geteilte Audio-Einstellungen (Schwelle, Lautstaerken, Stumm)
    pub einstellungen: Arc<AudioSettings>,
    /// Maximale Wartezeit pro Empfangsversuch
    pub empfangs_timeout: Duration,
    /// Anzahl Bloecke zwischen Empfang und Wiedergabe
    pub playback_puffer: usize,
}

impl ClientKonfig {
    /// Erstellt eine Konfiguration mit Standard-Werten
    pub fn neu(server: SocketAddr, name: impl Into<String>) -> Self {
        Self {
            server,
            name: name.into(),
            einstellungen: Arc::new(AudioSettings::neu()),
            empfangs_timeout: Duration::from_millis(500),
            playback_puffer: 8,
        }
    }
}

// ---------------------------------------------------------------------------
// Verbindung – geteilter Zustand aller Threads
// ---------------------------------------------------------------------------

struct Verbindung {
    server: SocketAddr,
    socket: Arc<UdpSocket>,
    laeuft: AtomicBool,
    shutdown_tx: watch::Sender<bool>,
    threads: Mutex<Vec<JoinHandle<()>>>,
    beobachter: Arc<dyn ClientBeobachter>,
}

impl Verbindung {
    fn laeuft(&self) -> bool {
        self.laeuft.load(Ordering::Relaxed)
    }

    /// Gemeinsamer Abbau fuer Trennen, Geraeteausfall und Drop
    fn beenden(&self) {
        if !self.laeuft.swap(false, Ordering::SeqCst) {
            return;
        }

        info!(server = %self.server, "Trenne Verbindung");

        // Best effort: geht das "bye" verloren, raeumt der Relay per Timeout auf
        if let Err(e) = self.socket.try_send_to(&Paket::bye().encode(), self.server) {
            debug!(fehler = %e, "Abmeldung konnte nicht gesendet werden");
        }

        self.shutdown_tx.send_replace(true);

        let handles = std::mem::take(&mut *self.threads.lock());
        let aktuell = std::thread::current().id();
        for handle in handles {
            // Der aufrufende Audio-Thread beendet sich selbst
            if handle.thread().id() == aktuell {
                continue;
            }
            if handle.join().is_err() {
                warn!("Audio-Thread mit Panic beendet");
            }
        }

        info!(server = %self.server, "Verbindung getrennt");
        self.beobachter.getrennt();
    }

    fn geraetefehler(&self, geraet: &str, fehler: &AudioError) {
        error!(geraet, fehler = %fehler, "Audio-Geraet ausgefallen");
        self.beobachter.fehler(&format!("{geraet}: {fehler}"));
        self.beenden();
    }
}

// ---------------------------------------------------------------------------
// VoiceClient
// ---------------------------------------------------------------------------

/// Verbundene Client-Sitzung
///
/// Lifecycle:
/// 1. `verbinden()` – Socket binden, Connect senden, Threads und Task starten
/// 2. `text_senden()` / `benutzer_anfordern()` / `einstellungen()` – Betrieb
/// 3. `trennen()` – sauberer Abbau (alternativ Drop)
pub struct VoiceClient {
    verbindung: Arc<Verbindung>,
    einstellungen: Arc<AudioSettings>,
    empfang: Option<tokio::task::JoinHandle<()>>,
}

impl VoiceClient {
    /// Verbindet sich mit dem Relay und startet die Audio-Pipeline
    pub async fn verbinden(
        konfig: ClientKonfig,
        quelle: Box<dyn AudioQuelle>,
        senke: Box<dyn AudioSenke>,
        beobachter: Arc<dyn ClientBeobachter>,
    ) -> ClientResult<Self> {
        // 1. UDP-Socket binden (Port 0 = OS waehlt), Adressfamilie wie der Relay
        let bind_addr: SocketAddr = if konfig.server.is_ipv6() {
            (Ipv6Addr::UNSPECIFIED, 0).into()
        } else {
            (Ipv4Addr::UNSPECIFIED, 0).into()
        };
        let socket = Arc::new(UdpSocket::bind(bind_addr).await?);

        // 2. Anmelden
        let name = anzeigename_normalisieren(Some(konfig.name.as_str()));
        socket
            .send_to(&Paket::connect(&name).encode(), konfig.server)
            .await?;

        info!(
            server = %konfig.server,
            lokal = %socket.local_addr()?,
            name = %name,
            "Verbindung zum Relay aufgebaut"
        );

        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let verbindung = Arc::new(Verbindung {
            server: konfig.server,
            socket,
            laeuft: AtomicBool::new(true),
            shutdown_tx,
            threads: Mutex::new(Vec::with_capacity(2)),
            beobachter,
        });

        let (audio_tx, audio_rx) = bounded::<Vec<i16>>(konfig.playback_puffer.max(1));

        // 3. Audio-Threads starten. Die Sperre haelt einen sofortigen
        //    Geraetefehler an, bis beide Handles eingetragen sind.
        let gestartet = {
            let mut threads = verbindung.threads.lock();
            Self::threads_starten(
                &verbindung,
                &konfig.einstellungen,
                quelle,
                senke,
                audio_rx,
                &mut threads,
            )
        };
        if let Err(e) = gestartet {
            verbindung.beenden();
            return Err(e.into());
        }

        // 4. Empfangs-Task starten
        let empfang = tokio::spawn(empfangs_loop(
            Arc::clone(&verbindung),
            PlaybackPipeline::neu(Arc::clone(&konfig.einstellungen)),
            audio_tx,
            shutdown_rx,
            konfig.empfangs_timeout,
        ));

        Ok(Self {
            verbindung,
            einstellungen: konfig.einstellungen,
            empfang: Some(empfang),
        })
    }

    fn threads_starten(
        verbindung: &Arc<Verbindung>,
        einstellungen: &Arc<AudioSettings>,
        quelle: Box<dyn AudioQuelle>,
        senke: Box<dyn AudioSenke>,
        audio_rx: Receiver<Vec<i16>>,
        threads: &mut Vec<JoinHandle<()>>,
    ) -> std::io::Result<()> {
        let capture_verbindung = Arc::clone(verbindung);
        let pipeline = CapturePipeline::neu(Arc::clone(einstellungen));
        threads.push(
            std::thread::Builder::new()
                .name("voxrelay-capture".to_string())
                .spawn(move || capture_loop(capture_verbindung, quelle, pipeline))?,
        );

        let playback_verbindung = Arc::clone(verbindung);
        threads.push(
            std::thread::Builder::new()
                .name("voxrelay-playback".to_string())
                .spawn(move || playback_loop(playback_verbindung, senke, audio_rx))?,
        );
        Ok(())
    }

    /// Sendet eine Chat-Nachricht; leere Nachrichten werden ignoriert
    pub async fn text_senden(&self, text: &str) -> ClientResult<()> {
        let text = text.trim();
        if text.is_empty() {
            return Ok(());
        }
        self.senden(Paket::text(text)).await
    }

    /// Fordert die aktuelle Benutzerliste an
    pub async fn benutzer_anfordern(&self) -> ClientResult<()> {
        self.senden(ApiAnfrage::Users.zu_paket()?).await
    }

    /// Fordert den Nachrichtenverlauf an
    pub async fn verlauf_anfordern(&self) -> ClientResult<()> {
        self.senden(ApiAnfrage::Messages.zu_paket()?).await
    }

    /// Geteilte Audio-Einstellungen (live aenderbar)
    pub fn einstellungen(&self) -> &Arc<AudioSettings> {
        &self.einstellungen
    }

    pub fn ist_verbunden(&self) -> bool {
        self.verbindung.laeuft()
    }

    pub fn server(&self) -> SocketAddr {
        self.verbindung.server
    }

    /// Lokale Adresse des Client-Sockets
    pub fn lokale_adresse(&self) -> std::io::Result<SocketAddr> {
        self.verbindung.socket.local_addr()
    }

    /// Trennt die Verbindung und wartet auf das Ende des Empfangs-Tasks
    ///
    /// Das Joinen der Audio-Threads blockiert und laeuft deshalb im
    /// Blocking-Pool; der Worker bleibt frei.
    pub async fn trennen(mut self) {
        let verbindung = Arc::clone(&self.verbindung);
        if let Err(e) = tokio::task::spawn_blocking(move || verbindung.beenden()).await {
            warn!(fehler = %e, "Abbau im Blocking-Pool fehlgeschlagen");
            self.verbindung.beenden();
        }
        if let Some(handle) = self.empfang.take() {
            let _ = handle.await;
        }
    }

    async fn senden(&self, paket: Paket) -> ClientResult<()> {
        if !self.verbindung.laeuft() {
            return Err(ClientError::NichtVerbunden);
        }
        self.verbindung
            .socket
            .send_to(&paket.encode(), self.verbindung.server)
            .await?;
        Ok(())
    }
}

impl Drop for VoiceClient {
    fn drop(&mut self) {
        // Sicherstellen dass alles gestoppt wird
        if self.verbindung.laeuft() {
            let verbindung = Arc::clone(&self.verbindung);
            match tokio::runtime::Handle::try_current() {
                Ok(handle) => {
                    handle.spawn_blocking(move || verbindung.beenden());
                }
                Err(_) => verbindung.beenden(),
            }
        }
        debug!("VoiceClient gedroppt");
    }
}

// ---------------------------------------------------------------------------
// Capture-Thread
// ---------------------------------------------------------------------------

fn capture_loop(
    verbindung: Arc<Verbindung>,
    mut quelle: Box<dyn AudioQuelle>,
    mut pipeline: CapturePipeline,
) {
    let mut block = vec![0i16; BLOCK_GROESSE];

    debug!("Capture-Loop gestartet");

    while verbindung.laeuft() {
        if let Err(e) = quelle.block_lesen(&mut block) {
            verbindung.geraetefehler("Mikrofon", &e);
            break;
        }
        if !verbindung.laeuft() {
            break;
        }

        let Some(pcm) = pipeline.verarbeiten(&block) else {
            continue;
        };
        let daten = Paket::audio(pcm).encode();
        if let Err(e) = verbindung.socket.try_send_to(&daten, verbindung.server) {
            trace!(fehler = %e, "Audio-Block nicht gesendet");
        }
    }

    let statistik = pipeline.statistik();
    debug!(
        bloecke = statistik.bloecke,
        gesendet = statistik.gesendet,
        unterdrueckt = statistik.unterdrueckt,
        "Capture-Loop beendet"
    );
    // quelle wird hier gedroppt (Geraet freigeben)
}

// ---------------------------------------------------------------------------
// Playback-Thread
// ---------------------------------------------------------------------------

fn playback_loop(
    verbindung: Arc<Verbindung>,
    mut senke: Box<dyn AudioSenke>,
    audio_rx: Receiver<Vec<i16>>,
) {
    debug!("Playback-Loop gestartet");

    while verbindung.laeuft() {
        match audio_rx.recv_timeout(Duration::from_millis(100)) {
            Ok(samples) => {
                if let Err(e) = senke.block_schreiben(&samples) {
                    verbindung.geraetefehler("Lautsprecher", &e);
                    break;
                }
            }
            Err(RecvTimeoutError::Timeout) => {}
            Err(RecvTimeoutError::Disconnected) => break,
        }
    }

    debug!("Playback-Loop beendet");
}

// ---------------------------------------------------------------------------
// Empfangs-Task
// ---------------------------------------------------------------------------

async fn empfangs_loop(
    verbindung: Arc<Verbindung>,
    playback: PlaybackPipeline,
    audio_tx: Sender<Vec<i16>>,
    mut shutdown_rx: watch::Receiver<bool>,
    timeout: Duration,
) {
    let socket = Arc::clone(&verbindung.socket);
    let mut buf = vec![0u8; EMPFANGSPUFFER];

    debug!("Empfangs-Loop gestartet");

    loop {
        tokio::select! {
            result = tokio::time::timeout(timeout, socket.recv_from(&mut buf)) => {
                match result {
                    Ok(Ok((len, absender))) => {
                        if absender == verbindung.server {
                            paket_verarbeiten(&verbindung, &playback, &audio_tx, &buf[..len]);
                        } else {
                            trace!(absender = %absender, "Paket von fremdem Absender ignoriert");
                        }
                    }
                    Ok(Err(e)) => {
                        if verbindung.laeuft() {
                            warn!(fehler = %e, "UDP-Empfangsfehler");
                        }
                        tokio::time::sleep(Duration::from_millis(1)).await;
                    }
                    Err(_) => {}
                }
                if !verbindung.laeuft() {
                    break;
                }
            }

            // Shutdown-Signal
            _ = shutdown_rx.changed() => {
                debug!("Empfangs-Loop: Shutdown-Signal empfangen");
                break;
            }
        }
    }

    debug!("Empfangs-Loop beendet");
    // audio_tx wird gedroppt -> Playback-Thread endet
}

fn paket_verarbeiten(
    verbindung: &Verbindung,
    playback: &PlaybackPipeline,
    audio_tx: &Sender<Vec<i16>>,
    daten: &[u8],
) {
    let paket = match Paket::decode(daten) {
        Ok(p) => p,
        Err(e) => {
            debug!(fehler = %e, "Ungueltiges Paket vom Relay");
            return;
        }
    };
    let beobachter = &verbindung.beobachter;

    match paket.typ {
        PaketTyp::Connect => match paket.servername() {
            Some(name) => {
                info!(server_name = %name, "Willkommen empfangen");
                beobachter.servername_empfangen(&name);
            }
            None => debug!("Connect-Paket ohne Servernamen"),
        },
        PaketTyp::Audio => {
            let Some(samples) = playback.verarbeiten(&paket.nutzdaten) else {
                return;
            };
            match audio_tx.try_send(samples) {
                Ok(()) => {}
                Err(TrySendError::Full(_)) => trace!("Playback-Puffer voll – Block verworfen"),
                Err(TrySendError::Disconnected(_)) => debug!("Playback-Thread beendet"),
            }
        }
        PaketTyp::Text => {
            beobachter.nachrichten_empfangen(Nachrichten::Neu(&paket.text_lossy()));
        }
        PaketTyp::ApiJson => match ApiNachricht::parse(&paket.nutzdaten) {
            Ok(ApiAuswertung::Bekannt(ApiNachricht::Users(benutzer))) => {
                debug!(anzahl = benutzer.len(), "Benutzerliste empfangen");
                beobachter.benutzer_geaendert(&benutzer);
            }
            Ok(ApiAuswertung::Bekannt(ApiNachricht::Messages(eintraege))) => {
                let zeilen: Vec<String> = eintraege.iter().map(ApiNachrichtEintrag::anzeige).collect();
                beobachter.nachrichten_empfangen(Nachrichten::Verlauf(&zeilen));
            }
            Ok(ApiAuswertung::Unbekannt(action)) => {
                debug!(action = %action, "Unbekannte API-Action ignoriert");
            }
            Err(e) => debug!(fehler = %e, "Ungueltiges API-JSON"),
        },
    }
}
