//! Datagramm-Codec (UDP)
//!
//! ## Paketformat
//!
//! ```text
//! Offset  Len  Beschreibung
//! ------  ---  -----------
//!  0       1   PaketTyp (0 = Connect, 1 = Audio, 2 = Text, 3 = ApiJson)
//!  1+      N   Nutzdaten (typabhaengig, hier nicht validiert)
//! ```
//!
//! Die Interpretation der Nutzdaten uebernimmt der Dispatcher. Der Codec
//! lehnt nur leere Datagramme und unbekannte Typ-Bytes ab.

use bytes::{BufMut, Bytes, BytesMut};

use crate::error::ProtokollFehler;

/// Abmeldung eines Clients (roh oder als Connect-Nutzdaten)
pub const BYE: &[u8] = b"bye";

/// Praefix der Willkommensnachricht des Servers
pub const SERVER_NAME_PRAEFIX: &str = "SERVER_NAME|";

// ---------------------------------------------------------------------------
// PaketTyp
// ---------------------------------------------------------------------------

/// Art des Datagramms
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum PaketTyp {
    /// Anmeldung (Client -> Server) bzw. Willkommen (Server -> Client)
    Connect = 0,
    /// Rohes PCM-Audio
    Audio = 1,
    /// Chat-Text
    Text = 2,
    /// JSON-API (Benutzerliste, Verlauf)
    ApiJson = 3,
}

impl PaketTyp {
    /// Konvertiert ein Byte in einen `PaketTyp`.
    pub fn from_u8(byte: u8) -> Option<Self> {
        match byte {
            0 => Some(Self::Connect),
            1 => Some(Self::Audio),
            2 => Some(Self::Text),
            3 => Some(Self::ApiJson),
            _ => None,
        }
    }
}

// ---------------------------------------------------------------------------
// Paket
// ---------------------------------------------------------------------------

/// Ein dekodiertes Datagramm
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Paket {
    pub typ: PaketTyp,
    pub nutzdaten: Bytes,
}

impl Paket {
    /// Erstellt ein Paket aus Typ und Nutzdaten
    pub fn neu(typ: PaketTyp, nutzdaten: impl Into<Bytes>) -> Self {
        Self {
            typ,
            nutzdaten: nutzdaten.into(),
        }
    }

    /// Anmeldung mit Anzeigename
    pub fn connect(name: &str) -> Self {
        Self::neu(PaketTyp::Connect, Bytes::copy_from_slice(name.as_bytes()))
    }

    /// Abmeldung (Connect-Typ mit Nutzdaten "bye")
    pub fn bye() -> Self {
        Self::neu(PaketTyp::Connect, Bytes::from_static(BYE))
    }

    /// Willkommensnachricht des Servers: `SERVER_NAME|<name>`
    pub fn willkommen(server_name: &str) -> Self {
        Self::neu(
            PaketTyp::Connect,
            format!("{SERVER_NAME_PRAEFIX}{server_name}").into_bytes(),
        )
    }

    /// Audio-Block (Little-Endian i16 PCM)
    pub fn audio(pcm: impl Into<Bytes>) -> Self {
        Self::neu(PaketTyp::Audio, pcm)
    }

    /// Chat-Text
    pub fn text(text: &str) -> Self {
        Self::neu(PaketTyp::Text, Bytes::copy_from_slice(text.as_bytes()))
    }

    /// JSON-API-Nachricht
    pub fn api(json: impl Into<Bytes>) -> Self {
        Self::neu(PaketTyp::ApiJson, json)
    }

    /// Serialisiert das Paket: Typ-Byte + Nutzdaten
    pub fn encode(&self) -> Bytes {
        let mut buf = BytesMut::with_capacity(1 + self.nutzdaten.len());
        buf.put_u8(self.typ as u8);
        buf.put_slice(&self.nutzdaten);
        buf.freeze()
    }

    /// Deserialisiert ein Datagramm
    ///
    /// # Fehler
    /// - `LeeresPaket` wenn `buf` leer ist
    /// - `UnbekannterTyp` bei einem Typ-Byte ausserhalb 0..=3
    pub fn decode(buf: &[u8]) -> Result<Self, ProtokollFehler> {
        let (&tag, rest) = buf.split_first().ok_or(ProtokollFehler::LeeresPaket)?;
        let typ = PaketTyp::from_u8(tag).ok_or(ProtokollFehler::UnbekannterTyp(tag))?;
        Ok(Self::neu(typ, Bytes::copy_from_slice(rest)))
    }

    /// Nutzdaten als Text (ungueltiges UTF-8 wird ersetzt)
    pub fn text_lossy(&self) -> String {
        String::from_utf8_lossy(&self.nutzdaten).into_owned()
    }

    /// Prueft ob dieses Paket eine Connect-Abmeldung ist
    pub fn ist_bye(&self) -> bool {
        self.typ == PaketTyp::Connect && self.nutzdaten.as_ref() == BYE
    }

    /// Extrahiert den Servernamen aus einer Willkommensnachricht
    pub fn servername(&self) -> Option<String> {
        if self.typ != PaketTyp::Connect {
            return None;
        }
        self.text_lossy()
            .strip_prefix(SERVER_NAME_PRAEFIX)
            .map(str::to_string)
    }
}

/// Erkennt die Abmeldung im Rohdatagramm.
///
/// Akzeptiert sowohl das untypisierte `bye` aelterer Clients als auch
/// die Connect-Variante.
pub fn ist_bye(roh: &[u8]) -> bool {
    if roh == BYE {
        return true;
    }
    matches!(roh.split_first(), Some((&tag, rest)) if tag == PaketTyp::Connect as u8 && rest == BYE)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
