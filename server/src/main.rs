//! VoxRelay Server – Einstiegspunkt
//!
//! Laedt die Konfiguration, initialisiert das Logging und startet den Relay.

use anyhow::Result;
use voxrelay_observability::logging_initialisieren;
use voxrelay_server::{config::ServerConfig, Server};

#[tokio::main]
async fn main() -> Result<()> {
    // Konfigurationsdatei-Pfad aus Umgebungsvariable oder Standard
    let config_pfad = std::env::var("VOXRELAY_CONFIG").unwrap_or_else(|_| "config.toml".into());

    // Konfiguration laden (Standardwerte falls Datei fehlt)
    let config = match ServerConfig::laden(&config_pfad) {
        Ok(config) => config,
        Err(e) => {
            // Logging steht noch nicht, Fehler direkt ausgeben
            eprintln!("Konfiguration '{config_pfad}' ungueltig: {e}");
            std::process::exit(2);
        }
    };

    logging_initialisieren(&config.logging.level, &config.logging.format);

    // Die Warnung aus `laden` faellt vor die Logging-Initialisierung
    if !std::path::Path::new(&config_pfad).exists() {
        tracing::warn!(
            pfad = %config_pfad,
            "Konfigurationsdatei nicht gefunden, verwende Standardwerte"
        );
    }

    tracing::info!(
        version = env!("CARGO_PKG_VERSION"),
        config = %config_pfad,
        "VoxRelay Server wird initialisiert"
    );

    let server = Server::neu(config);
    if let Err(e) = server.starten().await {
        tracing::error!(fehler = %e, "Server konnte nicht gestartet werden");
        return Err(e);
    }

    Ok(())
}
