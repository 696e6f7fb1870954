//! # voxrelay-observability
//!
//! Structured Logging (Text oder JSON) via tracing-subscriber fuer Relay
//! und Terminal-Client.

pub mod logging;

pub use logging::{logging_initialisieren, logging_initialisieren_mit, LogZiel};
