//! TCP-Listener – Bindet Socket, akzeptiert Verbindungen
//!
//! Der `SignalingServer` bindet einen TCP-Socket und startet fuer jede
//! eingehende Verbindung einen eigenen tokio-Task mit einer `RelayConnection`.
//! Verschiedene Raeume werden dabei parallel bedient.

use duett_protocol::{signaling::ServerMessage, wire::RelayCodec};
use futures_util::SinkExt;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio_util::codec::Framed;

use crate::connection::RelayConnection;
use crate::error::{SignalingError, SignalingResult};
use crate::server_state::SignalingState;

/// TCP-Signaling-Server
///
/// Bindet einen TCP-Socket und akzeptiert Verbindungen in einer Loop.
pub struct SignalingServer {
    state: Arc<SignalingState>,
    listener: TcpListener,
}

impl SignalingServer {
    /// Bindet den Listener an die angegebene Adresse
    ///
    /// Port 0 waehlt einen freien Port, siehe [`SignalingServer::lokale_adresse`].
    pub async fn binden(
        state: Arc<SignalingState>,
        bind_addr: SocketAddr,
    ) -> SignalingResult<Self> {
        let listener = TcpListener::bind(bind_addr).await?;
        Ok(Self { state, listener })
    }

    /// Gibt die tatsaechlich gebundene Adresse zurueck
    pub fn lokale_adresse(&self) -> SignalingResult<SocketAddr> {
        Ok(self.listener.local_addr()?)
    }

    /// Akzeptiert Verbindungen bis `shutdown_rx` ein `true`-Signal empfaengt
    pub async fn starten(
        self,
        mut shutdown_rx: tokio::sync::watch::Receiver<bool>,
    ) -> SignalingResult<()> {
        let lokale_addr = self.listener.local_addr()?;

        tracing::info!(adresse = %lokale_addr, "TCP Signaling-Relay gestartet");

        loop {
            tokio::select! {
                // Neue eingehende Verbindung
                result = self.listener.accept() => {
                    match result {
                        Ok((stream, peer_addr)) => {
                            // Verbindungs-Limit pruefen
                            let online = self.state.peer_anzahl() as u32;
                            if online >= self.state.config.max_clients {
                                tracing::warn!(
                                    adresse = %peer_addr,
                                    max = self.state.config.max_clients,
                                    "Relay voll – Verbindung abgelehnt"
                                );
                                tokio::spawn(async move {
                                    let mut framed = Framed::new(stream, RelayCodec::new());
                                    let _ = framed
                                        .send(ServerMessage::error(SignalingError::ServerVoll.to_string()))
                                        .await;
                                });
                                continue;
                            }

                            tracing::debug!(adresse = %peer_addr, "Verbindung akzeptiert");
                            self.state.verbindung_gezaehlt();

                            let verbindung = RelayConnection::neu(
                                Arc::clone(&self.state),
                                peer_addr,
                            );
                            let shutdown_rx_clone = shutdown_rx.clone();

                            tokio::spawn(async move {
                                verbindung.verarbeiten(stream, shutdown_rx_clone).await;
                            });
                        }
                        Err(e) => {
                            tracing::error!(fehler = %e, "TCP-Accept-Fehler");
                            tokio::time::sleep(std::time::Duration::from_millis(10)).await;
                        }
                    }
                }

                // Shutdown-Signal
                Ok(()) = shutdown_rx.changed() => {
                    if *shutdown_rx.borrow() {
                        tracing::info!("Signaling-Relay: Shutdown-Signal empfangen");
                        break;
                    }
                }
            }
        }

        tracing::info!("TCP Signaling-Relay gestoppt");
        Ok(())
    }
}
