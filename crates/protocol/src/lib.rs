//! voxrelay-protocol – Wire-Format des Relays
//!
//! Jedes UDP-Datagramm besteht aus einem Typ-Byte und den Nutzdaten.
//! Ueber Typ 3 (ApiJson) laufen zusaetzlich JSON-Nachrichten fuer
//! Benutzerliste und Nachrichtenverlauf.

pub mod api;
pub mod error;
pub mod paket;

pub use api::{ApiAnfrage, ApiAuswertung, ApiBenutzer, ApiNachricht, ApiNachrichtEintrag};
pub use error::ProtokollFehler;
pub use paket::{Paket, PaketTyp};
