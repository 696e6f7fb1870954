//! Structured Logging Setup via tracing-subscriber
//!
//! Konfigurierbar per Umgebungsvariable:
//! - `VOX_LOG_LEVEL`: Log-Level oder Filter-Direktive, Standard: info
//! - `VOX_LOG_FORMAT`: Format (text/json), Standard: text
//!
//! Die Umgebung hat Vorrang vor den uebergebenen (konfigurierten) Werten.

use tracing_subscriber::{fmt, EnvFilter};

/// Umgebungsvariable fuer den Log-Level
pub const ENV_LOG_LEVEL: &str = "VOX_LOG_LEVEL";
/// Umgebungsvariable fuer das Log-Format
pub const ENV_LOG_FORMAT: &str = "VOX_LOG_FORMAT";

/// Wohin die Log-Ausgabe geschrieben wird
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogZiel {
    /// Server: Logs auf stdout
    #[default]
    Stdout,
    /// Terminal-Client: stdout gehoert dem Chat, Logs nach stderr
    Stderr,
}

/// Initialisiert das Logging-System (stdout).
///
/// Liest `VOX_LOG_LEVEL` und `VOX_LOG_FORMAT` aus der Umgebung.
/// Faellt auf `level` / `format` zurueck falls nicht gesetzt.
pub fn logging_initialisieren(level: &str, format: &str) {
    logging_initialisieren_mit(level, format, LogZiel::Stdout);
}

/// Wie [`logging_initialisieren`], mit waehlbarem Ausgabeziel.
///
/// Ein bereits gesetzter globaler Subscriber bleibt bestehen.
pub fn logging_initialisieren_mit(level: &str, format: &str, ziel: LogZiel) {
    let filter = EnvFilter::try_from_env(ENV_LOG_LEVEL)
        .or_else(|_| EnvFilter::try_new(level))
        .unwrap_or_else(|_| EnvFilter::new("info"));

    let format = log_format_aus_env().unwrap_or_else(|| format.to_string());

    let ergebnis = match (format.as_str(), ziel) {
        ("json", LogZiel::Stdout) => fmt()
            .json()
            .with_env_filter(filter)
            .with_target(true)
            .with_thread_ids(true)
            .with_current_span(true)
            .try_init(),
        ("json", LogZiel::Stderr) => fmt()
            .json()
            .with_env_filter(filter)
            .with_target(true)
            .with_thread_ids(true)
            .with_current_span(true)
            .with_writer(std::io::stderr)
            .try_init(),
        (_, LogZiel::Stdout) => fmt().with_env_filter(filter).with_target(true).try_init(),
        (_, LogZiel::Stderr) => fmt()
            .with_env_filter(filter)
            .with_target(true)
            .with_writer(std::io::stderr)
            .try_init(),
    };

    if ergebnis.is_err() {
        tracing::debug!("Logging bereits initialisiert");
    }
}

/// Konfiguriertes Log-Format aus der Umgebung, falls gesetzt
pub fn log_format_aus_env() -> Option<String> {
    std::env::var(ENV_LOG_FORMAT).ok()
}

/// Validiert ob ein Log-Level-String gueltig ist.
pub fn log_level_gueltig(level: &str) -> bool {
    matches!(level, "trace" | "debug" | "info" | "warn" | "error")
}

/// Validiert ob ein Log-Format-String gueltig ist.
pub fn log_format_gueltig(format: &str) -> bool {
    matches!(format, "text" | "json")
}
