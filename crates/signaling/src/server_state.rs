//! Gemeinsamer Server-Zustand fuer das Signaling-Relay
//!
//! Haelt Konfiguration, Raum-Verwaltung und Broadcaster als
//! Arc-geteilte Handles, die zwischen tokio-Tasks geteilt werden.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Instant;

use crate::broadcast::{PeerBroadcaster, SEND_QUEUE_GROESSE};
use crate::relay::RoomRegistry;

/// Konfiguration fuer das Signaling-Relay
#[derive(Debug, Clone)]
pub struct SignalingConfig {
    /// Maximale gleichzeitige Verbindungen
    pub max_clients: u32,
    /// Keepalive-Intervall in Sekunden
    pub keepalive_sek: u64,
    /// Timeout fuer inaktive Verbindungen in Sekunden
    pub verbindungs_timeout_sek: u64,
    /// Groesse der Send-Queue pro Peer
    pub send_queue_groesse: usize,
    /// Maximale Frame-Groesse in Bytes
    pub max_frame_groesse: usize,
}

impl Default for SignalingConfig {
    fn default() -> Self {
        Self {
            max_clients: 512,
            keepalive_sek: 25,
            verbindungs_timeout_sek: 60,
            send_queue_groesse: SEND_QUEUE_GROESSE,
            max_frame_groesse: duett_protocol::wire::DEFAULT_MAX_FRAME_SIZE,
        }
    }
}

/// Gemeinsamer Relay-Zustand (thread-safe, Arc-geteilt)
pub struct SignalingState {
    /// Relay-Konfiguration
    pub config: Arc<SignalingConfig>,
    /// Raum-Verwaltung
    pub raeume: RoomRegistry,
    /// Send-Queues aller verbundenen Peers
    pub broadcaster: PeerBroadcaster,
    /// Anzahl aller jemals angenommenen Verbindungen
    pub verbindungen_gesamt: AtomicU64,
    /// Startzeitpunkt des Relays (fuer Uptime-Berechnung)
    pub start_time: Instant,
}

impl SignalingState {
    /// Erstellt einen neuen SignalingState
    pub fn neu(config: SignalingConfig) -> Arc<Self> {
        let broadcaster = PeerBroadcaster::mit_queue_groesse(config.send_queue_groesse);
        Arc::new(Self {
            config: Arc::new(config),
            raeume: RoomRegistry::neu(broadcaster.clone()),
            broadcaster,
            verbindungen_gesamt: AtomicU64::new(0),
            start_time: Instant::now(),
        })
    }

    /// Anzahl aktuell verbundener Peers
    pub fn peer_anzahl(&self) -> usize {
        self.broadcaster.peer_anzahl()
    }

    pub fn verbindung_gezaehlt(&self) {
        self.verbindungen_gesamt.fetch_add(1, Ordering::Relaxed);
    }

    /// Gibt die Uptime in Sekunden zurueck
    pub fn uptime_sek(&self) -> u64 {
        self.start_time.elapsed().as_secs()
    }
}
