//! Aufloesen der Serveradresse (`ip`, `ip:port`, `host`, `host:port`)

use std::net::{IpAddr, SocketAddr, ToSocketAddrs};

use voxrelay_core::STANDARD_PORT;

use crate::error::{ClientError, ClientResult};

/// Loest eine Benutzereingabe in eine Relay-Adresse auf.
///
/// Ohne Port wird [`STANDARD_PORT`] verwendet.
pub fn server_adresse_aufloesen(eingabe: &str) -> ClientResult<SocketAddr> {
    let eingabe = eingabe.trim();
    if eingabe.is_empty() {
        return Err(ClientError::UngueltigeAdresse("leer".into()));
    }

    if let Ok(addr) = eingabe.parse::<SocketAddr>() {
        return Ok(addr);
    }
    if let Ok(ip) = eingabe.parse::<IpAddr>() {
        return Ok(SocketAddr::new(ip, STANDARD_PORT));
    }

    let mit_port = if eingabe.contains(':') {
        eingabe.to_string()
    } else {
        format!("{eingabe}:{STANDARD_PORT}")
    };
    mit_port
        .to_socket_addrs()
        .map_err(|e| ClientError::UngueltigeAdresse(format!("{eingabe}: {e}")))?
        .next()
        .ok_or_else(|| ClientError::UngueltigeAdresse(eingabe.to_string()))
}
