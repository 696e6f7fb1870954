//! voxrelay-client – Client-Sitzung fuer den VoxRelay
//!
//! - [`sitzung`] – Verbindung, Audio-Threads, Empfangs-Task, Abbau
//! - [`beobachter`] – Callbacks zur Oberflaeche
//! - [`adresse`] – Aufloesen von `ip[:port]`
//! - [`eingabe`] – Zeilenbefehle des Terminal-Frontends

pub mod adresse;
pub mod beobachter;
pub mod eingabe;
pub mod error;
pub mod sitzung;

pub use adresse::server_adresse_aufloesen;
pub use beobachter::{ClientBeobachter, ClientEreignis, KanalBeobachter, KeinBeobachter, Nachrichten};
pub use eingabe::{eingabe_parsen, Eingabe, HILFE};
pub use error::{ClientError, ClientResult};
pub use sitzung::{ClientKonfig, VoiceClient};
