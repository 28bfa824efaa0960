//! Client-seitige TCP-Verbindung zum Signaling-Relay
//!
//! Nutzt den `ClientCodec` aus duett-protocol fuer das Wire-Format
//! (u32 BE length + JSON payload). Lesen und Schreiben laufen in getrennten
//! Hintergrund-Tasks; Keepalive-Pings beantwortet der Lese-Task selbststaendig
//! ueber die Schreib-Queue.

use duett_protocol::{
    signaling::{ClientMessage, ServerMessage},
    wire::ClientCodec,
};
use futures_util::stream::{SplitSink, SplitStream};
use futures_util::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio::sync::mpsc::{self, error::TrySendError};
use tokio::task::JoinHandle;
use tokio_util::codec::Framed;

use crate::error::{NegotiationError, NegotiationResult};

/// Standard-Port des Relays, falls die URL keinen nennt
pub const STANDARD_RELAY_PORT: u16 = 3001;

/// Groesse der Queues zwischen Task und Engine
const SIGNAL_QUEUE_GROESSE: usize = 64;

/// Wandelt eine Relay-URL in eine TCP-Adresse `host:port`
///
/// Akzeptiert `http://`, `https://`, `ws://`, `wss://`, `tcp://` oder eine
/// nackte Adresse. Pfade werden ignoriert.
pub fn relay_adresse(url: &str) -> NegotiationResult<String> {
    let ohne_schema = match url.split_once("://") {
        Some((schema, rest)) => match schema {
            "http" | "https" | "ws" | "wss" | "tcp" => rest,
            anderes => {
                return Err(NegotiationError::Konfiguration(format!(
                    "Nicht unterstuetztes URL-Schema '{anderes}' in '{url}'"
                )))
            }
        },
        None => url,
    };

    let autoritaet = ohne_schema.split('/').next().unwrap_or_default();
    if autoritaet.is_empty() {
        return Err(NegotiationError::Konfiguration(format!(
            "Relay-URL '{url}' enthaelt keinen Host"
        )));
    }

    // IPv6 in Klammern: [::1]:3001
    let hat_port = match autoritaet.rfind(']') {
        Some(klammer) => autoritaet[klammer..].contains(':'),
        None => autoritaet.contains(':'),
    };

    if hat_port {
        Ok(autoritaet.to_string())
    } else {
        Ok(format!("{autoritaet}:{STANDARD_RELAY_PORT}"))
    }
}

/// Verbindung zum Relay
///
/// Beim Drop werden beide Hintergrund-Tasks beendet und damit die
/// TCP-Verbindung geschlossen.
pub struct SignalingClient {
    sender: mpsc::Sender<ClientMessage>,
    empfaenger: mpsc::Receiver<ServerMessage>,
    leser: JoinHandle<()>,
    schreiber: JoinHandle<()>,
}

impl SignalingClient {
    /// Baut eine TCP-Verbindung zum Relay auf
    pub async fn verbinden(url: &str) -> NegotiationResult<Self> {
        let adresse = relay_adresse(url)?;
        tracing::info!(relay = %adresse, "Verbinde mit Relay");
        let stream = TcpStream::connect(&adresse)
            .await
            .map_err(|e| NegotiationError::RelayGetrennt(format!("{adresse}: {e}")))?;
        tracing::info!(relay = %adresse, "TCP-Verbindung zum Relay hergestellt");
        Ok(Self::mit_stream(stream))
    }

    /// Uebernimmt einen bereits verbundenen Stream
    pub fn mit_stream(stream: TcpStream) -> Self {
        let (senke, quelle) = Framed::new(stream, ClientCodec::new()).split();
        let (sender, ausgehend_rx) = mpsc::channel(SIGNAL_QUEUE_GROESSE);
        let (eingehend_tx, empfaenger) = mpsc::channel(SIGNAL_QUEUE_GROESSE);
        let schreiber = tokio::spawn(schreiben(senke, ausgehend_rx));
        let leser = tokio::spawn(lesen(quelle, eingehend_tx, sender.clone()));
        Self {
            sender,
            empfaenger,
            leser,
            schreiber,
        }
    }

    /// Sender fuer ausgehende Nachrichten (klonbar)
    pub fn sender(&self) -> mpsc::Sender<ClientMessage> {
        self.sender.clone()
    }

    /// Naechste Nachricht vom Relay; `None` wenn die Verbindung beendet ist
    pub async fn empfangen(&mut self) -> Option<ServerMessage> {
        self.empfaenger.recv().await
    }
}

impl Drop for SignalingClient {
    fn drop(&mut self) {
        self.leser.abort();
        self.schreiber.abort();
    }
}

async fn schreiben(
    mut senke: SplitSink<Framed<TcpStream, ClientCodec>, ClientMessage>,
    mut ausgehend: mpsc::Receiver<ClientMessage>,
) {
    while let Some(nachricht) = ausgehend.recv().await {
        if let Err(e) = senke.send(nachricht).await {
            tracing::warn!(fehler = %e, "Senden an Relay fehlgeschlagen");
            break;
        }
    }
    tracing::debug!("Schreib-Task zum Relay beendet");
}

/// Liest Frames vom Relay
///
/// Blockiert nie auf die Schreib-Queue: ein Pong, der nicht mehr hineinpasst,
/// wird verworfen.
async fn lesen(
    mut quelle: SplitStream<Framed<TcpStream, ClientCodec>>,
    eingehend: mpsc::Sender<ServerMessage>,
    ausgehend: mpsc::Sender<ClientMessage>,
) {
    loop {
        match quelle.next().await {
            Some(Ok(ServerMessage::Ping { timestamp_ms })) => {
                match ausgehend.try_send(ClientMessage::Pong { timestamp_ms }) {
                    Ok(()) => {}
                    Err(TrySendError::Full(_)) => {
                        tracing::warn!(timestamp_ms, "Schreib-Queue voll, Pong verworfen");
                    }
                    Err(TrySendError::Closed(_)) => break,
                }
            }
            Some(Ok(nachricht)) => match eingehend.try_send(nachricht) {
                Ok(()) => {}
                Err(TrySendError::Full(nachricht)) => {
                    tracing::warn!(
                        kapazitaet = SIGNAL_QUEUE_GROESSE,
                        "Eingangs-Queue voll, Lesen pausiert"
                    );
                    if eingehend.send(nachricht).await.is_err() {
                        tracing::debug!("Eingangs-Queue geschlossen");
                        break;
                    }
                }
                Err(TrySendError::Closed(_)) => {
                    tracing::debug!("Eingangs-Queue geschlossen");
                    break;
                }
            },
            Some(Err(e)) => {
                tracing::warn!(fehler = %e, "Frame-Lesefehler vom Relay");
                break;
            }
            None => {
                tracing::info!("Verbindung vom Relay getrennt");
                break;
            }
        }
    }
}
