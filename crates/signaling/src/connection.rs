//! Relay-Connection – Verwaltet eine einzelne TCP-Verbindung
//!
//! Jede TCP-Verbindung bekommt eine `RelayConnection` in einem eigenen
//! tokio-Task und beim Aufbau eine frische `PeerId`.
//!
//! ## Lebenszyklus
//! ```text
//! Verbunden -> (join-room) -> ImRaum -> (leave-room) -> Verbunden
//!     |                          |
//!     +------- Trennung ---------+--> leave + Abmeldung im Broadcaster
//! ```
//!
//! ## Keepalive
//! - Relay sendet alle `keepalive_sek` einen Ping
//! - Kommt innerhalb von `verbindungs_timeout_sek` kein Frame, wird getrennt
//!
//! Ein Frame mit ungueltigem JSON wird vom Codec verworfen, die Verbindung
//! bleibt bestehen.

use duett_core::types::PeerId;
use duett_protocol::{signaling::ServerMessage, wire::RelayCodec};
use futures_util::{SinkExt, StreamExt};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpStream;
use tokio::sync::{mpsc, watch};
use tokio::time::Instant;
use tokio_util::codec::Framed;

use crate::dispatcher::{jetzt_ms, DispatcherContext, MessageDispatcher};
use crate::error::{SignalingError, SignalingResult};
use crate::server_state::SignalingState;

/// Verarbeitet eine einzelne TCP-Verbindung
///
/// Liest Frames via `RelayCodec`, dispatcht an den `MessageDispatcher` und
/// sendet alles aus der Broadcaster-Queue des Peers zurueck.
pub struct RelayConnection {
    state: Arc<SignalingState>,
    peer_addr: SocketAddr,
    peer_id: PeerId,
}

impl RelayConnection {
    /// Erstellt eine neue RelayConnection mit frischer PeerId
    pub fn neu(state: Arc<SignalingState>, peer_addr: SocketAddr) -> Self {
        Self {
            state,
            peer_addr,
            peer_id: PeerId::new(),
        }
    }

    pub fn peer_id(&self) -> PeerId {
        self.peer_id
    }

    /// Startet die Verbindungs-Verarbeitungsschleife
    ///
    /// Laeuft bis die Verbindung getrennt wird oder ein Shutdown-Signal eingeht.
    /// Gibt den Grund des Verbindungsendes zurueck.
    pub async fn verarbeiten(
        self,
        stream: TcpStream,
        shutdown_rx: watch::Receiver<bool>,
    ) -> SignalingError {
        let peer_id = self.peer_id;
        tracing::info!(adresse = %self.peer_addr, peer = %peer_id, "Neue Verbindung");

        let mut framed = Framed::new(
            stream,
            RelayCodec::with_max_size(self.state.config.max_frame_groesse),
        );

        // Broadcaster-Queue dieses Peers (Relay -> TCP)
        let sende_rx = self.state.broadcaster.registrieren(peer_id);
        let dispatcher = MessageDispatcher::neu(Arc::clone(&self.state));
        let mut ctx = DispatcherContext::neu(peer_id);

        let ende = match self
            .schleife(&mut framed, sende_rx, &dispatcher, &mut ctx, shutdown_rx)
            .await
        {
            Ok(()) => SignalingError::VerbindungGetrennt,
            Err(e) => e,
        };

        // Raum verlassen und Queue abmelden
        dispatcher.peer_cleanup(&peer_id);

        if ende.ist_regulaer() {
            tracing::info!(peer = %peer_id, raum = ?ctx.raum, grund = %ende, "Verbindungs-Task beendet");
        } else {
            tracing::warn!(peer = %peer_id, raum = ?ctx.raum, grund = %ende, "Verbindung abgebrochen");
        }
        ende
    }

    async fn schleife(
        &self,
        framed: &mut Framed<TcpStream, RelayCodec>,
        mut sende_rx: mpsc::Receiver<ServerMessage>,
        dispatcher: &MessageDispatcher,
        ctx: &mut DispatcherContext,
        mut shutdown_rx: watch::Receiver<bool>,
    ) -> SignalingResult<()> {
        let peer_id = self.peer_id;
        let keepalive_intervall = Duration::from_secs(self.state.config.keepalive_sek.max(1));
        let timeout_dauer = Duration::from_secs(self.state.config.verbindungs_timeout_sek);

        framed
            .send(ServerMessage::IdAssigned { peer: peer_id })
            .await?;

        let mut letzter_empfang = Instant::now();
        let mut keepalive = tokio::time::interval_at(
            Instant::now() + keepalive_intervall,
            keepalive_intervall,
        );

        loop {
            tokio::select! {
                // Eingehende Nachricht vom Client
                frame = framed.next() => {
                    let nachricht = frame.ok_or(SignalingError::VerbindungGetrennt)??;
                    letzter_empfang = Instant::now();
                    tracing::trace!(peer = %peer_id, nachricht = ?nachricht, "Nachricht empfangen");
                    dispatcher.dispatch(nachricht, ctx);
                }

                // Ausgehende Nachricht aus dem Broadcaster
                Some(ausgehend) = sende_rx.recv() => {
                    framed.send(ausgehend).await?;
                }

                // Keepalive und Timeout-Pruefung
                _ = keepalive.tick() => {
                    if letzter_empfang.elapsed() > timeout_dauer {
                        return Err(SignalingError::Timeout);
                    }
                    framed.send(ServerMessage::Ping { timestamp_ms: jetzt_ms() }).await?;
                }

                // Shutdown-Signal
                Ok(()) = shutdown_rx.changed() => {
                    if *shutdown_rx.borrow() {
                        let _ = framed
                            .send(ServerMessage::error(SignalingError::Shutdown.to_string()))
                            .await;
                        return Err(SignalingError::Shutdown);
                    }
                }
            }
        }
    }
}
