//! Terminal-Client fuer VoxRelay
//!
//! Liest Zeilen von stdin und zeigt Chat, Benutzerliste und Meldungen auf
//! stdout. Ohne Audio-Geraet laeuft die Capture-Seite mit Stille, das Gate
//! sendet dann nichts.
//!
//! ```not_rust
//! voxrelay-client --server 192.168.1.20 --name Alice
//! voxrelay-client -s relay.example:6000 --schwelle 350
//! ```

use std::io::BufRead;
use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use tokio::sync::mpsc;
use voxrelay_audio::{StilleQuelle, VerwerfendeSenke};
use voxrelay_client::{
    eingabe_parsen, server_adresse_aufloesen, ClientEreignis, ClientKonfig, Eingabe,
    KanalBeobachter, VoiceClient, HILFE,
};
use voxrelay_observability::{logging_initialisieren_mit, LogZiel};

#[derive(Parser, Debug)]
#[command(name = "voxrelay-client")]
#[command(about = "Terminal-Client fuer den VoxRelay Sprach- und Text-Relay", long_about = None)]
struct Args {
    /// Relay-Adresse als ip[:port] oder host[:port] (Standardport 5555)
    #[arg(short = 's', long, default_value = "127.0.0.1")]
    server: String,

    /// Anzeigename (leer = Anonymous)
    #[arg(short = 'n', long, default_value = "")]
    name: String,

    /// Gate-Schwelle (RMS, 0-1000)
    #[arg(long, default_value_t = 200)]
    schwelle: i64,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // stdout gehoert dem Chat
    logging_initialisieren_mit("warn", "text", LogZiel::Stderr);

    let args = Args::parse();

    let server = server_adresse_aufloesen(&args.server)?;
    let konfig = ClientKonfig::neu(server, args.name);
    konfig
        .einstellungen
        .schwelle_setzen(args.schwelle)
        .context("Ungueltige Schwelle")?;

    let (beobachter, mut ereignisse) = KanalBeobachter::neu();
    let client = VoiceClient::verbinden(
        konfig,
        Box::new(StilleQuelle),
        Box::new(VerwerfendeSenke),
        Arc::new(beobachter),
    )
    .await
    .with_context(|| format!("Verbindung zu {server} fehlgeschlagen"))?;

    println!("Verbunden mit {server}. /hilfe zeigt die Befehle.");

    let mut zeilen = stdin_lesen();

    loop {
        tokio::select! {
            zeile = zeilen.recv() => {
                // EOF auf stdin beendet den Client
                let Some(zeile) = zeile else { break };
                if !eingabe_ausfuehren(&client, eingabe_parsen(&zeile)).await {
                    break;
                }
            }

            ereignis = ereignisse.recv() => {
                match ereignis {
                    Some(ClientEreignis::Getrennt) | None => {
                        println!("Verbindung getrennt");
                        break;
                    }
                    Some(ereignis) => ereignis_anzeigen(&ereignis),
                }
            }

            _ = tokio::signal::ctrl_c() => break,
        }
    }

    client.trennen().await;
    Ok(())
}

/// Liest stdin in einem eigenen Thread (blockierend), Zeilen kommen per Kanal
fn stdin_lesen() -> mpsc::UnboundedReceiver<String> {
    let (tx, rx) = mpsc::unbounded_channel();
    std::thread::spawn(move || {
        for zeile in std::io::stdin().lock().lines() {
            let Ok(zeile) = zeile else { break };
            if tx.send(zeile).is_err() {
                break;
            }
        }
    });
    rx
}

/// Fuehrt eine Eingabe aus; `false` beendet den Client
async fn eingabe_ausfuehren(client: &VoiceClient, eingabe: Eingabe) -> bool {
    let einstellungen = client.einstellungen();
    let ergebnis: anyhow::Result<()> = match eingabe {
        Eingabe::Leer => Ok(()),
        Eingabe::Beenden => return false,
        Eingabe::Hilfe => {
            println!("{HILFE}");
            Ok(())
        }
        Eingabe::Schwelle(wert) => einstellungen
            .schwelle_setzen(wert)
            .map(|()| println!("Schwelle: {wert}"))
            .map_err(Into::into),
        Eingabe::MicLautstaerke(wert) => einstellungen
            .mic_lautstaerke_setzen(wert)
            .map(|()| println!("Mikrofon: {wert}"))
            .map_err(Into::into),
        Eingabe::TonLautstaerke(wert) => einstellungen
            .ton_lautstaerke_setzen(wert)
            .map(|()| println!("Wiedergabe: {wert}"))
            .map_err(Into::into),
        Eingabe::MicStumm => {
            let stumm = einstellungen.mic_stumm_umschalten();
            println!("Mikrofon {}", if stumm { "stumm" } else { "aktiv" });
            Ok(())
        }
        Eingabe::TonStumm => {
            let stumm = einstellungen.ton_stumm_umschalten();
            println!("Wiedergabe {}", if stumm { "stumm" } else { "aktiv" });
            Ok(())
        }
        Eingabe::Benutzer => client.benutzer_anfordern().await.map_err(Into::into),
        Eingabe::Verlauf => client.verlauf_anfordern().await.map_err(Into::into),
        Eingabe::Text(text) => client.text_senden(&text).await.map_err(Into::into),
        Eingabe::Ungueltig(hinweis) => {
            println!("{hinweis}");
            Ok(())
        }
    };

    if let Err(e) = ergebnis {
        println!("Fehler: {e}");
    }
    true
}

fn ereignis_anzeigen(ereignis: &ClientEreignis) {
    match ereignis {
        ClientEreignis::Servername(name) => println!("== {name} =="),
        ClientEreignis::Nachricht(zeile) => println!("{zeile}"),
        ClientEreignis::Verlauf(zeilen) => {
            println!("-- Verlauf ({}) --", zeilen.len());
            for zeile in zeilen {
                println!("{zeile}");
            }
        }
        ClientEreignis::Benutzer(benutzer) => {
            let namen: Vec<&str> = benutzer.iter().map(|b| b.name.as_str()).collect();
            println!("-- Online ({}): {}", namen.len(), namen.join(", "));
        }
        ClientEreignis::Fehler(meldung) => println!("Fehler: {meldung}"),
        ClientEreignis::Getrennt => println!("Verbindung getrennt"),
    }
}
