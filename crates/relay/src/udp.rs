//! UDP Relay Server – Empfangs-Loop
//!
//! ## Architektur
//!
//! ```text
//! UDP Socket (recv_from, Poll-Timeout)
//!     |
//!     v
//! RelayDispatcher::verarbeiten()   <- Registry, Verlauf, Fan-out
//!     |
//!     +--> try_send_to an Empfaenger (nicht blockierend)
//!     |
//!     v
//! RelayDispatcher::bereinigen()    <- nach jedem Zyklus, auch ohne Paket
//! ```
//!
//! Ein einzelner Task besitzt Socket-Empfang, Registry und Verlauf. Der
//! Poll-Timeout sorgt dafuer, dass inaktive Clients auch bei voelliger
//! Stille entfernt werden.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::net::UdpSocket;
use tokio::sync::oneshot;
use voxrelay_core::{Result, VoxError, SESSION_TIMEOUT};

use crate::dispatcher::{RelayDispatcher, RelayStatistik};
use crate::registry::ClientRegistry;

/// Standard-Groesse des Empfangspuffers (ein Audio-Block sind 2049 Bytes)
pub const STANDARD_EMPFANGSPUFFER: usize = 8192;

/// Standard-Poll-Intervall der Empfangs-Loop
pub const STANDARD_POLL_INTERVALL: Duration = Duration::from_millis(500);

// ---------------------------------------------------------------------------
// RelayServer-Konfiguration
// ---------------------------------------------------------------------------

/// Konfiguration fuer den UDP Relay Server
#[derive(Debug, Clone)]
pub struct RelayServerConfig {
    /// Bind-Adresse (z.B. "0.0.0.0:5555")
    pub bind_addr: SocketAddr,
    /// Name in der Willkommensnachricht
    pub server_name: String,
    /// Inaktivitaets-Timeout pro Client
    pub session_timeout: Duration,
    /// Maximale Wartezeit pro Empfangszyklus
    pub poll_intervall: Duration,
    /// Groesse des Empfangspuffers in Bytes
    pub empfangspuffer: usize,
}

impl RelayServerConfig {
    /// Erstellt eine Konfiguration mit Standard-Werten
    pub fn neu(bind_addr: SocketAddr, server_name: impl Into<String>) -> Self {
        Self {
            bind_addr,
            server_name: server_name.into(),
            session_timeout: SESSION_TIMEOUT,
            poll_intervall: STANDARD_POLL_INTERVALL,
            empfangspuffer: STANDARD_EMPFANGSPUFFER,
        }
    }
}

// ---------------------------------------------------------------------------
// RelayServer
// ---------------------------------------------------------------------------

/// UDP Relay Server
pub struct RelayServer {
    config: RelayServerConfig,
    socket: Arc<UdpSocket>,
    dispatcher: RelayDispatcher<Arc<UdpSocket>>,
}

impl RelayServer {
    /// Bindet den UDP-Socket und erstellt einen neuen RelayServer
    ///
    /// Schlaegt das Binden fehl, wird [`VoxError::Binden`] zurueckgegeben.
    pub async fn binden(config: RelayServerConfig) -> Result<Self> {
        let socket = UdpSocket::bind(config.bind_addr)
            .await
            .map_err(|e| VoxError::Binden {
                adresse: config.bind_addr.to_string(),
                grund: e.to_string(),
            })?;
        let socket = Arc::new(socket);

        tracing::info!(
            addr = %config.bind_addr,
            server_name = %config.server_name,
            "UDP Relay Server gebunden"
        );

        let registry = ClientRegistry::mit_timeout(config.session_timeout);
        let dispatcher =
            RelayDispatcher::neu(Arc::clone(&socket), config.server_name.clone(), registry);

        Ok(Self {
            config,
            socket,
            dispatcher,
        })
    }

    /// Gibt die lokale Bind-Adresse zurueck
    pub fn lokale_adresse(&self) -> std::io::Result<SocketAddr> {
        self.socket.local_addr()
    }

    pub fn dispatcher(&self) -> &RelayDispatcher<Arc<UdpSocket>> {
        &self.dispatcher
    }

    /// Startet die Empfangs-Loop (laeuft bis `shutdown_rx` ein Signal sendet)
    ///
    /// Gibt die Statistik beim Beenden zurueck.
    pub async fn empfangs_loop_starten(
        mut self,
        mut shutdown_rx: oneshot::Receiver<()>,
    ) -> RelayStatistik {
        let mut buf = vec![0u8; self.config.empfangspuffer];
        let socket = Arc::clone(&self.socket);
        let poll = self.config.poll_intervall;

        tracing::info!(
            poll_ms = poll.as_millis() as u64,
            timeout_sek = self.config.session_timeout.as_secs(),
            "Relay-Empfangs-Loop gestartet"
        );

        loop {
            tokio::select! {
                // Eingehendes Datagramm oder Poll-Timeout
                result = tokio::time::timeout(poll, socket.recv_from(&mut buf)) => {
                    match result {
                        Ok(Ok((len, absender))) => {
                            let ergebnis = self.dispatcher.verarbeiten(&buf[..len], absender, Instant::now());
                            tracing::trace!(
                                absender = %absender,
                                bytes = len,
                                ergebnis = ?ergebnis,
                                "Datagramm verarbeitet"
                            );
                        }
                        Ok(Err(e)) => {
                            tracing::warn!(fehler = %e, "UDP-Empfangsfehler");
                            // Kurze Pause um Busy-Loop bei persistentem Fehler zu vermeiden
                            tokio::time::sleep(Duration::from_millis(1)).await;
                        }
                        Err(_) => {}
                    }
                    self.dispatcher.bereinigen(Instant::now());
                }

                // Shutdown-Signal
                _ = &mut shutdown_rx => {
                    tracing::info!("Relay-Server: Shutdown-Signal empfangen");
                    break;
                }
            }
        }

        let statistik = self.dispatcher.statistik();
        tracing::info!(
            empfangen = statistik.empfangen,
            gesendet = statistik.gesendet,
            verworfen = statistik.verworfen,
            clients = self.dispatcher.registry().anzahl(),
            "Relay-Empfangs-Loop beendet"
        );
        statistik
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
