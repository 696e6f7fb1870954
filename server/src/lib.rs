//! voxrelay-server – Bibliotheks-Root
//!
//! Deklariert die Server-Module und stellt den oeffentlichen Einstiegspunkt
//! fuer Integrationstests bereit.

pub mod config;

use std::future::Future;
use std::net::SocketAddr;

use anyhow::{Context, Result};
use config::ServerConfig;
use tokio::sync::oneshot;
use voxrelay_relay::{RelayServer, RelayStatistik};

/// Haelt den Server-Zustand zusammen
pub struct Server {
    pub config: ServerConfig,
}

/// Gebundener, noch nicht laufender Relay
pub struct GebundenerServer {
    relay: RelayServer,
}

impl Server {
    /// Erstellt einen neuen Server aus der gegebenen Konfiguration
    pub fn neu(config: ServerConfig) -> Self {
        Self { config }
    }

    /// Bindet den UDP-Socket; ein Fehler hier ist fatal
    pub async fn binden(&self) -> Result<GebundenerServer> {
        let relay_config = self.config.relay_config()?;
        let relay = RelayServer::binden(relay_config).await?;
        Ok(GebundenerServer { relay })
    }

    /// Startet den Relay und laeuft bis zum Shutdown-Signal (Ctrl-C)
    ///
    /// Reihenfolge:
    /// 1. UDP-Socket binden (Fehler -> Abbruch vor der Loop)
    /// 2. Empfangs-Loop starten
    /// 3. Auf Ctrl-C warten, Loop stoppen
    pub async fn starten(self) -> Result<()> {
        tracing::info!(
            server_name = %self.config.server.name,
            udp = %self.config.udp_bind_adresse()?,
            timeout_sek = self.config.relay.session_timeout_sek,
            "Server startet"
        );

        let gebunden = self.binden().await?;
        tracing::info!("Server laeuft. Warte auf Shutdown-Signal (Ctrl-C)...");

        gebunden
            .laufen_bis(async {
                if let Err(e) = tokio::signal::ctrl_c().await {
                    tracing::error!(fehler = %e, "Ctrl-C-Handler nicht verfuegbar");
                }
            })
            .await?;
        Ok(())
    }
}

impl GebundenerServer {
    pub fn lokale_adresse(&self) -> std::io::Result<SocketAddr> {
        self.relay.lokale_adresse()
    }

    /// Betreibt die Empfangs-Loop bis `signal` fertig ist
    pub async fn laufen_bis<F>(self, signal: F) -> Result<RelayStatistik>
    where
        F: Future<Output = ()>,
    {
        let (shutdown_tx, shutdown_rx) = oneshot::channel();
        let handle = tokio::spawn(self.relay.empfangs_loop_starten(shutdown_rx));

        signal.await;
        tracing::info!("Shutdown-Signal empfangen, Server wird beendet");
        // Loop kann bereits beendet sein
        let _ = shutdown_tx.send(());

        handle.await.context("Relay-Loop abgebrochen")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;
    use tokio::net::UdpSocket;
    use voxrelay_protocol::Paket;

    fn test_config() -> ServerConfig {
        let mut config = ServerConfig::default();
        config.netzwerk.bind_adresse = "127.0.0.1".into();
        config.netzwerk.udp_port = 0;
        config.relay.poll_intervall_ms = 50;
        config
    }

    #[tokio::test]
    async fn relay_laeuft_bis_zum_signal() {
        let server = Server::neu(test_config());
        let gebunden = server.binden().await.unwrap();
        let adresse = gebunden.lokale_adresse().unwrap();

        let (stop_tx, stop_rx) = oneshot::channel::<()>();
        let lauf = tokio::spawn(gebunden.laufen_bis(async {
            let _ = stop_rx.await;
        }));

        let client = UdpSocket::bind("127.0.0.1:0").await.unwrap();
        client
            .send_to(&Paket::connect("Alice").encode(), adresse)
            .await
            .unwrap();

        let mut buf = [0u8; 2048];
        let (len, _) = tokio::time::timeout(Duration::from_secs(2), client.recv_from(&mut buf))
            .await
            .unwrap()
            .unwrap();
        let willkommen = Paket::decode(&buf[..len]).unwrap();
        assert_eq!(willkommen.servername().as_deref(), Some("VoxRelay"));

        stop_tx.send(()).unwrap();
        let statistik = lauf.await.unwrap().unwrap();
        assert_eq!(statistik.empfangen, 1);
    }

    #[tokio::test]
    async fn belegter_port_ist_fatal() {
        let belegt = std::net::UdpSocket::bind("127.0.0.1:0").unwrap();
        let mut config = test_config();
        config.netzwerk.udp_port = belegt.local_addr().unwrap().port();

        let fehler = Server::neu(config).binden().await.err().unwrap();
        let vox = fehler.downcast_ref::<voxrelay_core::VoxError>().unwrap();
        assert!(vox.ist_fatal());
    }
}
