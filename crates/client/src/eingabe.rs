//! Zeilenbefehle des Terminal-Clients

/// Hilfetext fuer `/hilfe`
pub const HILFE: &str = "\
Befehle:
  <zahl>        Gate-Schwelle setzen (0-1000)
  /mic <0-100>  Mikrofon-Lautstaerke
  /ton <0-100>  Wiedergabe-Lautstaerke
  /stumm        Mikrofon an/aus
  /taub         Wiedergabe an/aus
  /users        Benutzerliste anfordern
  /verlauf      Nachrichtenverlauf anfordern
  /quit         Beenden
  alles andere wird als Nachricht gesendet";

/// Eine ausgewertete Eingabezeile
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Eingabe {
    Leer,
    Schwelle(i64),
    MicLautstaerke(i64),
    TonLautstaerke(i64),
    MicStumm,
    TonStumm,
    Benutzer,
    Verlauf,
    Hilfe,
    Beenden,
    Text(String),
    /// Fehlerhafter Befehl mit Hinweis fuer den Benutzer
    Ungueltig(String),
}

/// Wertet eine Eingabezeile aus
///
/// Eine reine Zahl setzt die Schwelle, Zeilen mit `/` sind Befehle, alles
/// andere ist Chat-Text.
pub fn eingabe_parsen(zeile: &str) -> Eingabe {
    let zeile = zeile.trim();
    if zeile.is_empty() {
        return Eingabe::Leer;
    }
    if let Ok(wert) = zeile.parse::<i64>() {
        return Eingabe::Schwelle(wert);
    }
    let Some(befehl) = zeile.strip_prefix('/') else {
        return Eingabe::Text(zeile.to_string());
    };

    let mut teile = befehl.split_whitespace();
    let name = teile.next().unwrap_or_default();
    let argument = teile.next();

    match name {
        "mic" => zahl_argument(argument, "/mic <0-100>").map_or_else(|e| e, Eingabe::MicLautstaerke),
        "ton" => zahl_argument(argument, "/ton <0-100>").map_or_else(|e| e, Eingabe::TonLautstaerke),
        "stumm" | "mute" => Eingabe::MicStumm,
        "taub" | "deaf" => Eingabe::TonStumm,
        "users" => Eingabe::Benutzer,
        "verlauf" | "messages" => Eingabe::Verlauf,
        "hilfe" | "help" => Eingabe::Hilfe,
        "quit" | "exit" => Eingabe::Beenden,
        andere => Eingabe::Ungueltig(format!("Unbekannter Befehl: /{andere}")),
    }
}

fn zahl_argument(argument: Option<&str>, verwendung: &str) -> Result<i64, Eingabe> {
    argument
        .and_then(|a| a.parse().ok())
        .ok_or_else(|| Eingabe::Ungueltig(format!("Verwendung: {verwendung}")))
}
