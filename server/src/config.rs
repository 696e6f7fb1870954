//! Server-Konfiguration
//!
//! Wird beim Start aus einer TOML-Datei geladen. Alle Felder haben
//! sinnvolle Standardwerte, sodass der Relay ohne Konfigurationsdatei
//! lauffaehig ist.

use std::net::{IpAddr, SocketAddr};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use voxrelay_core::{Result, VoxError, MIN_EMPFANGSPUFFER, SESSION_TIMEOUT, STANDARD_PORT};
use voxrelay_relay::RelayServerConfig;

/// Vollstaendige Server-Konfiguration
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Allgemeine Server-Einstellungen
    pub server: ServerEinstellungen,
    /// Netzwerk-Einstellungen
    pub netzwerk: NetzwerkEinstellungen,
    /// Relay-Einstellungen (Timeout, Poll-Intervall, Puffer)
    pub relay: RelayEinstellungen,
    /// Logging-Einstellungen
    pub logging: LoggingEinstellungen,
}

/// Allgemeine Server-Einstellungen
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerEinstellungen {
    /// Name, den Clients in der Willkommensnachricht sehen
    pub name: String,
}

impl Default for ServerEinstellungen {
    fn default() -> Self {
        Self {
            name: "VoxRelay".into(),
        }
    }
}

/// Netzwerk-Einstellungen
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct NetzwerkEinstellungen {
    /// Bind-Adresse (IPv4 oder IPv6)
    pub bind_adresse: String,
    /// UDP-Port fuer Sprache, Text und API
    pub udp_port: u16,
}

impl Default for NetzwerkEinstellungen {
    fn default() -> Self {
        Self {
            bind_adresse: "0.0.0.0".into(),
            udp_port: STANDARD_PORT,
        }
    }
}

/// Relay-Einstellungen
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RelayEinstellungen {
    /// Sekunden ohne Paket bis eine Sitzung entfernt wird
    pub session_timeout_sek: u64,
    /// Maximale Wartezeit pro Empfangsversuch; danach laeuft der Sweep
    pub poll_intervall_ms: u64,
    /// Groesse des Empfangspuffers in Bytes
    pub empfangspuffer: usize,
}

impl Default for RelayEinstellungen {
    fn default() -> Self {
        Self {
            session_timeout_sek: SESSION_TIMEOUT.as_secs(),
            poll_intervall_ms: 500,
            empfangspuffer: 8192,
        }
    }
}

/// Logging-Einstellungen
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingEinstellungen {
    /// Log-Level: "trace", "debug", "info", "warn", "error"
    pub level: String,
    /// Format: "json" oder "text"
    pub format: String,
}

impl Default for LoggingEinstellungen {
    fn default() -> Self {
        Self {
            level: "info".into(),
            format: "text".into(),
        }
    }
}

impl ServerConfig {
    /// Laedt die Konfiguration aus einer TOML-Datei.
    /// Gibt die Standardkonfiguration zurueck wenn die Datei nicht existiert.
    pub fn laden(pfad: &str) -> Result<Self> {
        match std::fs::read_to_string(pfad) {
            Ok(inhalt) => Self::aus_toml(&inhalt)
                .map_err(|e| VoxError::Konfiguration(format!("'{pfad}': {e}"))),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::warn!(
                    pfad = pfad,
                    "Konfigurationsdatei nicht gefunden, verwende Standardwerte"
                );
                Ok(Self::default())
            }
            Err(e) => Err(VoxError::Konfiguration(format!(
                "Konfigurationsdatei '{pfad}' nicht lesbar: {e}"
            ))),
        }
    }

    /// Parst und prueft eine Konfiguration aus einem TOML-String
    pub fn aus_toml(inhalt: &str) -> Result<Self> {
        let config: Self =
            toml::from_str(inhalt).map_err(|e| VoxError::Konfiguration(e.to_string()))?;
        config.pruefen()?;
        Ok(config)
    }

    /// Prueft Werte, die serde allein nicht abfangen kann
    pub fn pruefen(&self) -> Result<()> {
        self.udp_bind_adresse()?;
        if self.relay.session_timeout_sek == 0 {
            return Err(VoxError::Konfiguration(
                "relay.session_timeout_sek muss groesser 0 sein".into(),
            ));
        }
        if self.relay.poll_intervall_ms == 0 {
            return Err(VoxError::Konfiguration(
                "relay.poll_intervall_ms muss groesser 0 sein".into(),
            ));
        }
        // Kleinere Puffer schneiden jeden Audio-Block stillschweigend ab
        if self.relay.empfangspuffer < MIN_EMPFANGSPUFFER {
            return Err(VoxError::Konfiguration(format!(
                "relay.empfangspuffer muss mindestens {MIN_EMPFANGSPUFFER} sein, ist {}",
                self.relay.empfangspuffer
            )));
        }
        Ok(())
    }

    /// Gibt die vollstaendige Bind-Adresse fuer UDP zurueck
    pub fn udp_bind_adresse(&self) -> Result<SocketAddr> {
        let ip: IpAddr = self
            .netzwerk
            .bind_adresse
            .parse()
            .map_err(|_| VoxError::UngueltigeAdresse(self.netzwerk.bind_adresse.clone()))?;
        Ok(SocketAddr::new(ip, self.netzwerk.udp_port))
    }

    /// Baut die Konfiguration des Relay-Loops
    pub fn relay_config(&self) -> Result<RelayServerConfig> {
        let mut relay = RelayServerConfig::neu(self.udp_bind_adresse()?, self.server.name.clone());
        relay.session_timeout = Duration::from_secs(self.relay.session_timeout_sek);
        relay.poll_intervall = Duration::from_millis(self.relay.poll_intervall_ms);
        relay.empfangspuffer = self.relay.empfangspuffer;
        Ok(relay)
    }
}
