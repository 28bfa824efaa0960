//! Peer-Broadcaster – Send-Queues aller verbundenen Peers
//!
//! Jede `RelayConnection` registriert beim Verbindungsaufbau eine Queue.
//! Das Relay schreibt nicht-blockierend hinein, der Verbindungs-Task
//! liest daraus und sendet via TCP. Eine volle Queue verwirft die
//! Nachricht statt den Absender zu blockieren.

use dashmap::DashMap;
use duett_core::types::PeerId;
use duett_protocol::signaling::ServerMessage;
use std::sync::Arc;
use tokio::sync::mpsc;

// ---------------------------------------------------------------------------
// Konfiguration
// ---------------------------------------------------------------------------

/// Standardgroesse der Send-Queue pro Peer
pub const SEND_QUEUE_GROESSE: usize = 64;

// ---------------------------------------------------------------------------
// PeerSender
// ---------------------------------------------------------------------------

/// Handle auf die Send-Queue eines verbundenen Peers
#[derive(Clone, Debug)]
pub struct PeerSender {
    pub peer_id: PeerId,
    pub tx: mpsc::Sender<ServerMessage>,
}

impl PeerSender {
    /// Sendet eine Nachricht nicht-blockierend an den Peer
    ///
    /// Gibt `false` zurueck wenn die Queue voll oder geschlossen ist.
    pub fn senden(&self, nachricht: ServerMessage) -> bool {
        match self.tx.try_send(nachricht) {
            Ok(()) => true,
            Err(mpsc::error::TrySendError::Full(_)) => {
                tracing::warn!(peer = %self.peer_id, "Send-Queue voll – Nachricht verworfen");
                false
            }
            Err(mpsc::error::TrySendError::Closed(_)) => {
                tracing::debug!(peer = %self.peer_id, "Send-Queue geschlossen (Peer getrennt)");
                false
            }
        }
    }
}

// ---------------------------------------------------------------------------
// PeerBroadcaster
// ---------------------------------------------------------------------------

/// Zentrale Zustellung an verbundene Peers
///
/// Thread-safe via Arc + DashMap. Clone teilt den inneren Zustand.
#[derive(Clone)]
pub struct PeerBroadcaster {
    inner: Arc<PeerBroadcasterInner>,
}

struct PeerBroadcasterInner {
    peers: DashMap<PeerId, PeerSender>,
    queue_groesse: usize,
}

impl PeerBroadcaster {
    /// Erstellt einen neuen Broadcaster mit Standard-Queue-Groesse
    pub fn neu() -> Self {
        Self::mit_queue_groesse(SEND_QUEUE_GROESSE)
    }

    pub fn mit_queue_groesse(queue_groesse: usize) -> Self {
        Self {
            inner: Arc::new(PeerBroadcasterInner {
                peers: DashMap::new(),
                queue_groesse: queue_groesse.max(1),
            }),
        }
    }

    /// Registriert einen Peer und gibt seine Empfangs-Queue zurueck
    pub fn registrieren(&self, peer_id: PeerId) -> mpsc::Receiver<ServerMessage> {
        let (tx, rx) = mpsc::channel(self.inner.queue_groesse);
        self.inner.peers.insert(peer_id, PeerSender { peer_id, tx });
        tracing::debug!(peer = %peer_id, "Peer im Broadcaster registriert");
        rx
    }

    /// Entfernt einen Peer aus dem Broadcaster
    pub fn entfernen(&self, peer_id: &PeerId) {
        if self.inner.peers.remove(peer_id).is_some() {
            tracing::debug!(peer = %peer_id, "Peer aus Broadcaster entfernt");
        }
    }

    /// Sendet eine Nachricht an einen einzelnen Peer
    ///
    /// Gibt `true` zurueck wenn der Peer gefunden und die Nachricht eingereiht wurde.
    pub fn an_peer_senden(&self, peer_id: &PeerId, nachricht: ServerMessage) -> bool {
        match self.inner.peers.get(peer_id) {
            Some(sender) => sender.senden(nachricht),
            None => {
                tracing::debug!(peer = %peer_id, "Senden an unbekannten Peer");
                false
            }
        }
    }

    /// Sendet eine Nachricht an mehrere Peers
    ///
    /// Gibt die Anzahl der erfolgreichen Sendungen zurueck.
    pub fn an_peers_senden<'a>(
        &self,
        peer_ids: impl IntoIterator<Item = &'a PeerId>,
        nachricht: &ServerMessage,
    ) -> usize {
        peer_ids
            .into_iter()
            .filter(|peer_id| self.an_peer_senden(peer_id, nachricht.clone()))
            .count()
    }

    /// Gibt die Anzahl der registrierten Peers zurueck
    pub fn peer_anzahl(&self) -> usize {
        self.inner.peers.len()
    }

    /// Prueft ob ein Peer registriert ist
    pub fn ist_registriert(&self, peer_id: &PeerId) -> bool {
        self.inner.peers.contains_key(peer_id)
    }
}

impl Default for PeerBroadcaster {
    fn default() -> Self {
        Self::neu()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
