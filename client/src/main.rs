//! Duett Client – Einstiegspunkt
//!
//! `duett-client <raum>` tritt dem Raum bei. Zeilen von stdin gehen als
//! Chat an den Peer, `/datei <pfad>` teilt eine Datei. Eingehende
//! Nachrichten und Dateien erscheinen auf stdout.

use anyhow::{Context, Result};
use duett_canvas::store::ABSENDER_LOKAL;
use duett_canvas::CanvasEreignis;
use duett_client::{sitzung_starten, ClientConfig, SitzungsHandle, WebRtcFabrik};
use duett_core::types::RoomId;
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::broadcast::error::RecvError;

#[tokio::main]
async fn main() -> Result<()> {
    let config_pfad =
        std::env::var("DUETT_CLIENT_CONFIG").unwrap_or_else(|_| "duett-client.toml".into());
    let config = ClientConfig::laden(&config_pfad)?;

    duett_observability::logging_initialisieren(&config.log_level, &config.log_format)?;

    let raum = std::env::args()
        .nth(1)
        .map(|r| RoomId::from(r.as_str()))
        .context("Aufruf: duett-client <raum>")?;

    tracing::info!(
        version = env!("CARGO_PKG_VERSION"),
        raum = %raum,
        relay = %config.signaling_url,
        "Duett Client wird gestartet"
    );

    let fabrik = Arc::new(WebRtcFabrik::neu()?);
    let sitzung = sitzung_starten(config, raum, fabrik).await?;
    let ausgabe = tokio::spawn(ausgabe_schleife(
        sitzung.canvas().store().lock().abonnieren(),
        Arc::clone(sitzung.canvas()),
    ));

    let mut zeilen = BufReader::new(tokio::io::stdin()).lines();
    loop {
        tokio::select! {
            zeile = zeilen.next_line() => {
                match zeile {
                    Ok(Some(zeile)) => eingabe(&sitzung, zeile.trim()).await,
                    Ok(None) => break,
                    Err(e) => {
                        tracing::warn!(fehler = %e, "stdin nicht lesbar");
                        break;
                    }
                }
            }
            _ = tokio::signal::ctrl_c() => {
                tracing::info!("Ctrl-C empfangen");
                break;
            }
        }
    }

    sitzung.beenden().await;
    ausgabe.abort();
    Ok(())
}

async fn eingabe(sitzung: &SitzungsHandle, zeile: &str) {
    if zeile.is_empty() {
        return;
    }
    let Some(pfad) = zeile.strip_prefix("/datei ") else {
        sitzung.canvas().chat_senden(zeile);
        return;
    };

    let pfad = pfad.trim();
    let daten = match tokio::fs::read(pfad).await {
        Ok(d) => d,
        Err(e) => {
            tracing::warn!(pfad, fehler = %e, "Datei nicht lesbar");
            return;
        }
    };
    let name = std::path::Path::new(pfad)
        .file_name()
        .map_or_else(|| pfad.to_string(), |n| n.to_string_lossy().into_owned());
    if let Err(e) = sitzung
        .canvas()
        .datei_teilen(name, "application/octet-stream", daten.into())
    {
        tracing::warn!(pfad, fehler = %e, "Datei konnte nicht geteilt werden");
    }
}

async fn ausgabe_schleife(
    mut ereignisse: tokio::sync::broadcast::Receiver<CanvasEreignis>,
    canvas: Arc<duett_canvas::CanvasSession>,
) {
    loop {
        match ereignisse.recv().await {
            Ok(CanvasEreignis::NachrichtHinzugefuegt(id)) => {
                let store = canvas.store().lock();
                if let Some(n) = store
                    .messages()
                    .iter()
                    .find(|n| n.id == id && n.from != ABSENDER_LOKAL)
                {
                    println!("[{}] {}", n.from, n.text);
                }
            }
            Ok(CanvasEreignis::DateiEmpfangen(datei)) => {
                println!("* Datei empfangen: {} ({} Bytes)", datei.name, datei.size);
            }
            Ok(_) => {}
            Err(RecvError::Lagged(n)) => tracing::debug!(verpasst = n, "Ausgabe hinkt hinterher"),
            Err(RecvError::Closed) => break,
        }
    }
}
