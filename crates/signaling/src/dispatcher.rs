//! Message-Dispatcher – Routet Client-Nachrichten an die Raum-Verwaltung
//!
//! Antworten und Events laufen ausschliesslich ueber die Send-Queues des
//! `PeerBroadcaster`, damit ihre Reihenfolge pro Raum erhalten bleibt.

use duett_core::types::{PeerId, RoomId};
use duett_protocol::signaling::ClientMessage;
use std::sync::Arc;

use crate::server_state::SignalingState;

/// Dispatcher-Kontext – Informationen ueber die aktuelle Verbindung
#[derive(Debug)]
pub struct DispatcherContext {
    /// Vom Relay vergebene ID dieser Verbindung
    pub peer_id: PeerId,
    /// Aktueller Raum (None vor `join-room` und nach `leave-room`)
    pub raum: Option<RoomId>,
    /// Letzte gemessene Round-Trip-Time in Millisekunden
    pub rtt_ms: Option<u64>,
}

impl DispatcherContext {
    pub fn neu(peer_id: PeerId) -> Self {
        Self {
            peer_id,
            raum: None,
            rtt_ms: None,
        }
    }
}

/// Zentraler Message-Dispatcher
pub struct MessageDispatcher {
    state: Arc<SignalingState>,
}

impl MessageDispatcher {
    /// Erstellt einen neuen Dispatcher
    pub fn neu(state: Arc<SignalingState>) -> Self {
        Self { state }
    }

    /// Verarbeitet eine eingehende Client-Nachricht
    pub fn dispatch(&self, nachricht: ClientMessage, ctx: &mut DispatcherContext) {
        match nachricht {
            ClientMessage::JoinRoom { room_id } => {
                self.state.raeume.beitreten(&room_id, ctx.peer_id);
                ctx.raum = Some(room_id);
            }

            ClientMessage::LeaveRoom => {
                self.state.raeume.verlassen(&ctx.peer_id);
                ctx.raum = None;
            }

            ClientMessage::Pong { timestamp_ms } => {
                let jetzt = jetzt_ms();
                ctx.rtt_ms = Some(jetzt.saturating_sub(timestamp_ms));
                tracing::trace!(peer = %ctx.peer_id, rtt_ms = ?ctx.rtt_ms, "Pong empfangen");
            }

            signal => {
                if let Some((art, raum_id, inhalt)) = signal.in_signal() {
                    self.state
                        .raeume
                        .weiterleiten(art, inhalt, &raum_id, ctx.peer_id);
                }
            }
        }
    }

    /// Aufraeumen beim Verbindungsende
    pub fn peer_cleanup(&self, peer_id: &PeerId) {
        self.state.raeume.verlassen(peer_id);
        self.state.broadcaster.entfernen(peer_id);
    }
}

/// Aktuelle Unix-Zeit in Millisekunden
pub(crate) fn jetzt_ms() -> u64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as u64
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::server_state::SignalingConfig;
    use duett_protocol::signaling::ServerMessage;
    use serde_json::json;

    #[test]
    fn join_und_signal_werden_geroutet() {
        let state = SignalingState::neu(SignalingConfig::default());
        let dispatcher = MessageDispatcher::neu(Arc::clone(&state));

        let a = PeerId::new();
        let b = PeerId::new();
        let mut rx_a = state.broadcaster.registrieren(a);
        let mut rx_b = state.broadcaster.registrieren(b);
        let mut ctx_a = DispatcherContext::neu(a);
        let mut ctx_b = DispatcherContext::neu(b);

        let raum = RoomId::from("abc123");
        dispatcher.dispatch(ClientMessage::JoinRoom { room_id: raum.clone() }, &mut ctx_a);
        dispatcher.dispatch(ClientMessage::JoinRoom { room_id: raum.clone() }, &mut ctx_b);
        assert_eq!(ctx_b.raum, Some(raum.clone()));

        assert_eq!(
            rx_a.try_recv().expect("existing-users fuer A"),
            ServerMessage::ExistingUsers { peers: vec![] }
        );
        assert_eq!(
            rx_a.try_recv().expect("user-joined fuer A"),
            ServerMessage::UserJoined { peer: b }
        );
        assert_eq!(
            rx_b.try_recv().expect("existing-users fuer B"),
            ServerMessage::ExistingUsers { peers: vec![a] }
        );

        dispatcher.dispatch(
            ClientMessage::IceCandidate {
                room_id: raum.clone(),
                candidate: json!({"candidate": "c"}),
            },
            &mut ctx_a,
        );
        assert_eq!(
            rx_b.try_recv().expect("Kandidat fuer B"),
            ServerMessage::IceCandidate {
                candidate: json!({"candidate": "c"}),
                from: a
            }
        );
    }

    #[test]
    fn leave_room_und_cleanup() {
        let state = SignalingState::neu(SignalingConfig::default());
        let dispatcher = MessageDispatcher::neu(Arc::clone(&state));
        let a = PeerId::new();
        let _rx = state.broadcaster.registrieren(a);
        let mut ctx = DispatcherContext::neu(a);
        let raum = RoomId::from("r");

        dispatcher.dispatch(ClientMessage::JoinRoom { room_id: raum.clone() }, &mut ctx);
        dispatcher.dispatch(ClientMessage::LeaveRoom, &mut ctx);
        assert!(ctx.raum.is_none());
        assert!(!state.raeume.existiert(&raum));

        dispatcher.peer_cleanup(&a);
        assert!(!state.broadcaster.ist_registriert(&a));
    }

    #[test]
    fn pong_misst_rtt() {
        let state = SignalingState::neu(SignalingConfig::default());
        let dispatcher = MessageDispatcher::neu(state);
        let mut ctx = DispatcherContext::neu(PeerId::new());

        dispatcher.dispatch(
            ClientMessage::Pong {
                timestamp_ms: jetzt_ms(),
            },
            &mut ctx,
        );
        assert!(ctx.rtt_ms.is_some());
    }
}
