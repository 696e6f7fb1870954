//! voxrelay-relay – Sitzungs- und Dispatch-Engine des Relays
//!
//! ## Module
//! - [`registry`] – Endpunkt -> Sitzung, Timeout-Bereinigung
//! - [`history`] – Append-Log der Chat-Nachrichten
//! - [`dispatcher`] – Verarbeitung eines Datagramms und Fan-out
//! - [`udp`] – UDP-Empfangs-Loop mit Poll-Timeout

pub mod dispatcher;
pub mod history;
pub mod registry;
pub mod udp;

pub use dispatcher::{DatagrammSender, RelayDispatcher, RelayStatistik, Verarbeitung, Verwerfgrund};
pub use history::{HistoryEintrag, MessageHistory};
pub use registry::{ClientRegistry, ClientSitzung};
pub use udp::{RelayServer, RelayServerConfig};
