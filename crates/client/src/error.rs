//! Fehlertypen des Clients

use thiserror::Error;
use voxrelay_protocol::ProtokollFehler;

#[derive(Debug, Error)]
pub enum ClientError {
    #[error("Ungueltige Serveradresse: {0}")]
    UngueltigeAdresse(String),

    #[error("Nicht verbunden")]
    NichtVerbunden,

    #[error("Protokollfehler: {0}")]
    Protokoll(#[from] ProtokollFehler),

    #[error("IO-Fehler: {0}")]
    Io(#[from] std::io::Error),
}

pub type ClientResult<T> = Result<T, ClientError>;
