//! JSON-API ueber ApiJson-Pakete (Typ 3)
//!
//! Zwei Nachrichtenformen vom Server an Clients:
//!
//! ```text
//! {"action":"users",    "objects":[{"id":"10.0.0.2:40000","name":"Alice"}, ...]}
//! {"action":"messages", "objects":[{"id":"Alice","message":"hi"}, ...]}
//! ```
//!
//! Clients koennen beide Listen mit `{"action":"users"}` bzw.
//! `{"action":"messages"}` erneut anfordern. Unbekannte Actions sind kein
//! Fehler, sie werden vom Empfaenger ignoriert.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use voxrelay_core::{Endpunkt, HISTORY_LIMIT};

use crate::error::ProtokollFehler;
use crate::paket::Paket;

/// Eintrag der Benutzerliste
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApiBenutzer {
    /// Endpunkt als `ip:port`
    pub id: String,
    /// Anzeigename
    pub name: String,
}

/// Eintrag des Nachrichtenverlaufs
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApiNachrichtEintrag {
    /// Name des Absenders (fehlt bei reinen Textzeilen)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    pub message: String,
}

impl ApiNachrichtEintrag {
    /// Anzeigeform `"<id>: <message>"` bzw. nur die Nachricht
    pub fn anzeige(&self) -> String {
        match &self.id {
            Some(id) => format!("{id}: {}", self.message),
            None => self.message.clone(),
        }
    }
}

/// Nachricht Server -> Client
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "action", content = "objects", rename_all = "lowercase")]
pub enum ApiNachricht {
    Users(Vec<ApiBenutzer>),
    Messages(Vec<ApiNachrichtEintrag>),
}

/// Anfrage Client -> Server
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "lowercase")]
pub enum ApiAnfrage {
    Users,
    Messages,
}

/// Ergebnis der Auswertung einer API-Nachricht
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ApiAuswertung<T> {
    Bekannt(T),
    /// Action ist nicht bekannt – wird ignoriert
    Unbekannt(String),
}

const BEKANNTE_ACTIONS: [&str; 2] = ["users", "messages"];

impl ApiNachricht {
    /// Baut die Benutzerliste aus (Endpunkt, Name)-Paaren
    pub fn benutzerliste<'a, I>(sitzungen: I) -> Self
    where
        I: IntoIterator<Item = (Endpunkt, &'a str)>,
    {
        Self::Users(
            sitzungen
                .into_iter()
                .map(|(endpunkt, name)| ApiBenutzer {
                    id: endpunkt.to_string(),
                    name: name.to_string(),
                })
                .collect(),
        )
    }

    /// Baut den Nachrichtenverlauf aus (Absender, Text)-Paaren
    ///
    /// Es werden hoechstens die letzten [`HISTORY_LIMIT`] Eintraege
    /// uebernommen, der neueste steht am Ende.
    pub fn nachrichtenverlauf<'a, I>(eintraege: I) -> Self
    where
        I: IntoIterator<Item = (&'a str, &'a str)>,
    {
        let mut objekte: Vec<ApiNachrichtEintrag> = eintraege
            .into_iter()
            .map(|(absender, text)| ApiNachrichtEintrag {
                id: Some(absender.to_string()),
                message: text.to_string(),
            })
            .collect();
        if objekte.len() > HISTORY_LIMIT {
            objekte.drain(..objekte.len() - HISTORY_LIMIT);
        }
        Self::Messages(objekte)
    }

    /// Name der Action (`users` / `messages`)
    pub fn action(&self) -> &'static str {
        match self {
            Self::Users(_) => "users",
            Self::Messages(_) => "messages",
        }
    }

    /// Serialisiert die Nachricht als ApiJson-Paket
    pub fn zu_paket(&self) -> Result<Paket, ProtokollFehler> {
        Ok(Paket::api(serde_json::to_vec(self)?))
    }

    /// Serialisiert so, dass das kodierte Paket hoechstens `max_bytes` lang ist
    ///
    /// Die aeltesten Objekte werden weggelassen, bis die Nachricht passt.
    /// Gibt das Paket und die Anzahl weggelassener Objekte zurueck.
    pub fn zu_paket_begrenzt(&self, max_bytes: usize) -> Result<(Paket, usize), ProtokollFehler> {
        let mut nachricht = self.clone();
        let mut weggelassen = 0;
        loop {
            let paket = nachricht.zu_paket()?;
            // +1 fuer das Typ-Byte
            if paket.nutzdaten.len() < max_bytes || nachricht.anzahl_objekte() == 0 {
                return Ok((paket, weggelassen));
            }
            nachricht.aeltestes_entfernen();
            weggelassen += 1;
        }
    }

    /// Anzahl der Eintraege in `objects`
    pub fn anzahl_objekte(&self) -> usize {
        match self {
            Self::Users(liste) => liste.len(),
            Self::Messages(liste) => liste.len(),
        }
    }

    fn aeltestes_entfernen(&mut self) {
        match self {
            Self::Users(liste) if !liste.is_empty() => {
                liste.remove(0);
            }
            Self::Messages(liste) if !liste.is_empty() => {
                liste.remove(0);
            }
            _ => {}
        }
    }

    /// Wertet empfangene JSON-Bytes aus
    pub fn parse(json: &[u8]) -> Result<ApiAuswertung<Self>, ProtokollFehler> {
        auswerten(json)
    }
}

impl ApiAnfrage {
    /// Serialisiert die Anfrage als ApiJson-Paket
    pub fn zu_paket(&self) -> Result<Paket, ProtokollFehler> {
        Ok(Paket::api(serde_json::to_vec(self)?))
    }

    /// Wertet eine Client-Anfrage aus
    pub fn parse(json: &[u8]) -> Result<ApiAuswertung<Self>, ProtokollFehler> {
        auswerten(json)
    }
}

/// Dispatch rein ueber das `action`-Feld; unbekannte Werte sind kein Fehler
fn auswerten<T: DeserializeOwned>(json: &[u8]) -> Result<ApiAuswertung<T>, ProtokollFehler> {
    let wert: serde_json::Value = serde_json::from_slice(json)?;
    let action = wert
        .get("action")
        .and_then(serde_json::Value::as_str)
        .ok_or_else(|| <serde_json::Error as serde::de::Error>::custom("Feld 'action' fehlt"))?
        .to_string();

    if !BEKANNTE_ACTIONS.contains(&action.as_str()) {
        return Ok(ApiAuswertung::Unbekannt(action));
    }
    Ok(ApiAuswertung::Bekannt(serde_json::from_value(wert)?))
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::paket::PaketTyp;
    use std::net::{IpAddr, Ipv4Addr, SocketAddr};

    fn endpunkt(port: u16) -> SocketAddr {
        SocketAddr::new(IpAddr::V4(Ipv4Addr::LOCALHOST), port)
    }

    #[test]
    fn benutzerliste_json_form() {
        let msg = ApiNachricht::benutzerliste([(endpunkt(4000), "Alice"), (endpunkt(4001), "Bob")]);
        let json: serde_json::Value = serde_json::to_value(&msg).unwrap();
        assert_eq!(json["action"], "users");
        assert_eq!(json["objects"][0]["id"], "127.0.0.1:4000");
        assert_eq!(json["objects"][0]["name"], "Alice");
        assert_eq!(json["objects"][1]["name"], "Bob");
    }

    #[test]
    fn verlauf_json_form() {
        let msg = ApiNachricht::nachrichtenverlauf([("Alice", "hi")]);
        let json: serde_json::Value = serde_json::to_value(&msg).unwrap();
        assert_eq!(json["action"], "messages");
        assert_eq!(json["objects"][0]["id"], "Alice");
        assert_eq!(json["objects"][0]["message"], "hi");
    }

    #[test]
    fn leerer_verlauf_hat_leeres_array() {
        let msg = ApiNachricht::nachrichtenverlauf(std::iter::empty());
        let json = serde_json::to_string(&msg).unwrap();
        assert_eq!(json, r#"{"action":"messages","objects":[]}"#);
    }

    #[test]
    fn verlauf_wird_auf_limit_gekuerzt_neueste_zuletzt() {
        let texte: Vec<String> = (0..30).map(|i| format!("nachricht {i}")).collect();
        let msg = ApiNachricht::nachrichtenverlauf(texte.iter().map(|t| ("Alice", t.as_str())));
        let ApiNachricht::Messages(objekte) = msg else {
            panic!("Erwartet Messages");
        };
        assert_eq!(objekte.len(), HISTORY_LIMIT);
        assert_eq!(objekte[0].message, "nachricht 10");
        assert_eq!(objekte[HISTORY_LIMIT - 1].message, "nachricht 29");
    }

    #[test]
    fn parse_bekannte_action() {
        let json = br#"{"action":"users","objects":[{"id":"1.2.3.4:5","name":"Eve"}]}"#;
        match ApiNachricht::parse(json).unwrap() {
            ApiAuswertung::Bekannt(ApiNachricht::Users(liste)) => {
                assert_eq!(liste.len(), 1);
                assert_eq!(liste[0].name, "Eve");
            }
            andere => panic!("Unerwartet: {andere:?}"),
        }
    }

    #[test]
    fn parse_unbekannte_action_ist_kein_fehler() {
        let json = br#"{"action":"kick","objects":[]}"#;
        assert_eq!(
            ApiNachricht::parse(json).unwrap(),
            ApiAuswertung::Unbekannt("kick".into())
        );
    }

    #[test]
    fn parse_ungueltiges_json_ist_fehler() {
        assert!(ApiNachricht::parse(b"{kein json").is_err());
        assert!(ApiNachricht::parse(br#"{"objects":[]}"#).is_err());
    }

    #[test]
    fn nachricht_ohne_id() {
        let json = br#"{"action":"messages","objects":[{"message":"Systemhinweis"}]}"#;
        let ApiAuswertung::Bekannt(ApiNachricht::Messages(objekte)) = ApiNachricht::parse(json).unwrap() else {
            panic!("Erwartet Messages");
        };
        assert_eq!(objekte[0].id, None);
        assert_eq!(objekte[0].anzeige(), "Systemhinweis");
    }

    #[test]
    fn anfrage_round_trip() {
        let paket = ApiAnfrage::Messages.zu_paket().unwrap();
        assert_eq!(paket.typ, PaketTyp::ApiJson);
        assert_eq!(paket.text_lossy(), r#"{"action":"messages"}"#);
        assert_eq!(
            ApiAnfrage::parse(&paket.nutzdaten).unwrap(),
            ApiAuswertung::Bekannt(ApiAnfrage::Messages)
        );
    }

    #[test]
    fn begrenzt_laesst_aelteste_weg() {
        let texte: Vec<String> = (0..20).map(|i| format!("{i:02}{}", "x".repeat(998))).collect();
        let msg = ApiNachricht::nachrichtenverlauf(texte.iter().map(|t| ("Alice", t.as_str())));

        let (paket, weggelassen) = msg.zu_paket_begrenzt(8_000).unwrap();
        assert!(paket.encode().len() <= 8_000);
        assert!(weggelassen > 0);

        let ApiAuswertung::Bekannt(ApiNachricht::Messages(objekte)) =
            ApiNachricht::parse(&paket.nutzdaten).unwrap()
        else {
            panic!("Erwartet Messages");
        };
        assert_eq!(objekte.len(), 20 - weggelassen);
        // Der neueste Eintrag bleibt immer erhalten
        assert!(objekte.last().unwrap().message.starts_with("19"));
    }

    #[test]
    fn begrenzt_ohne_kuerzung_wenn_passend() {
        let msg = ApiNachricht::benutzerliste([(endpunkt(4000), "Alice")]);
        let (paket, weggelassen) = msg.zu_paket_begrenzt(65_507).unwrap();
        assert_eq!(weggelassen, 0);
        assert_eq!(paket, msg.zu_paket().unwrap());
    }

    #[test]
    fn zu_paket_setzt_api_typ() {
        let paket = ApiNachricht::benutzerliste(std::iter::empty()).zu_paket().unwrap();
        assert_eq!(paket.typ, PaketTyp::ApiJson);
        assert_eq!(paket.text_lossy(), r#"{"action":"users","objects":[]}"#);
    }
}
