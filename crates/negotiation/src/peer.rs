//! Peer-Verbindung – Schnittstelle zur Plattform
//!
//! Die eigentliche Peer-Verbindung (SDP, ICE, DTLS, Datenkanal) stellt die
//! Plattform bereit. Die Aushandlung spricht sie nur ueber die Traits
//! dieses Moduls an und erhaelt asynchrone Ereignisse ueber einen
//! `EreignisSender`.

use async_trait::async_trait;
use duett_protocol::{IceCandidate, SessionChannel, SessionDescription, VerbindungsStatistik};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::mpsc;

use crate::error::NegotiationResult;

// ---------------------------------------------------------------------------
// Zustaende
// ---------------------------------------------------------------------------

/// Signalisierungszustand des Standard-Offer/Answer-Automaten
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SignalZustand {
    Stable,
    HaveLocalOffer,
    HaveRemoteOffer,
    Closed,
}

impl std::fmt::Display for SignalZustand {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::Stable => "stable",
            Self::HaveLocalOffer => "have-local-offer",
            Self::HaveRemoteOffer => "have-remote-offer",
            Self::Closed => "closed",
        };
        f.write_str(name)
    }
}

/// Transportzustand der Peer-Verbindung
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransportZustand {
    New,
    Connecting,
    Connected,
    Disconnected,
    Failed,
    Closed,
}

impl TransportZustand {
    /// Verbindung ist unterbrochen oder endgueltig gescheitert
    pub fn ist_getrennt(&self) -> bool {
        matches!(self, Self::Disconnected | Self::Failed | Self::Closed)
    }
}

// ---------------------------------------------------------------------------
// Ereignisse
// ---------------------------------------------------------------------------

/// Asynchrones Ereignis einer Peer-Verbindung
#[derive(Clone)]
pub enum PeerEreignis {
    /// Lokal ermittelter Kandidat, muss ueber das Relay verschickt werden
    LokalerKandidat(IceCandidate),
    /// Transportzustand hat sich geaendert
    Transport(TransportZustand),
    /// Datenkanal ist offen
    KanalGeoeffnet(Arc<dyn SessionChannel>),
    /// Textnachricht auf dem Datenkanal
    KanalNachricht(String),
    /// Datenkanal wurde geschlossen
    KanalGeschlossen,
}

impl std::fmt::Debug for PeerEreignis {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::LokalerKandidat(k) => f.debug_tuple("LokalerKandidat").field(k).finish(),
            Self::Transport(t) => f.debug_tuple("Transport").field(t).finish(),
            Self::KanalGeoeffnet(_) => f.write_str("KanalGeoeffnet"),
            Self::KanalNachricht(n) => f.debug_tuple("KanalNachricht").field(&n.len()).finish(),
            Self::KanalGeschlossen => f.write_str("KanalGeschlossen"),
        }
    }
}

/// Sendet Ereignisse einer Peer-Verbindung an die Engine
///
/// Jede Verbindung erhaelt einen Sender mit eigener Generation. Ereignisse
/// einer ersetzten Verbindung erkennt die Engine an der alten Generation.
#[derive(Clone, Debug)]
pub struct EreignisSender {
    generation: u64,
    tx: mpsc::UnboundedSender<(u64, PeerEreignis)>,
}

impl EreignisSender {
    pub fn neu(generation: u64, tx: mpsc::UnboundedSender<(u64, PeerEreignis)>) -> Self {
        Self { generation, tx }
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Gibt `false` zurueck wenn die Engine nicht mehr zuhoert
    pub fn senden(&self, ereignis: PeerEreignis) -> bool {
        self.tx.send((self.generation, ereignis)).is_ok()
    }
}

// ---------------------------------------------------------------------------
// Traits
// ---------------------------------------------------------------------------

/// Plattform-Peer-Verbindung mit Standard-Offer/Answer-Semantik
///
/// `set_local_description` mit einem Rollback verwirft ein eigenes
/// ausstehendes Angebot und fuehrt zurueck nach `Stable`.
#[async_trait]
pub trait PeerConnection: Send + Sync {
    fn signal_zustand(&self) -> SignalZustand;

    fn transport_zustand(&self) -> TransportZustand;

    async fn create_offer(&self) -> NegotiationResult<SessionDescription>;

    async fn create_answer(&self) -> NegotiationResult<SessionDescription>;

    async fn set_local_description(&self, desc: SessionDescription) -> NegotiationResult<()>;

    async fn set_remote_description(&self, desc: SessionDescription) -> NegotiationResult<()>;

    async fn add_ice_candidate(&self, kandidat: IceCandidate) -> NegotiationResult<()>;

    /// Aktuelle Verbindungsqualitaet; `None` solange die Plattform keine
    /// Werte liefert
    async fn statistiken(&self) -> NegotiationResult<Option<VerbindungsStatistik>> {
        Ok(None)
    }

    /// Schliesst Verbindung und Datenkanal
    async fn close(&self);
}

/// STUN/TURN-Server fuer die Kandidatensuche
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IceServer {
    pub urls: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub credential: Option<String>,
}

impl IceServer {
    pub fn stun(url: impl Into<String>) -> Self {
        Self {
            urls: vec![url.into()],
            username: None,
            credential: None,
        }
    }

    /// Oeffentliche STUN-Server als Standard
    pub fn standard() -> Vec<Self> {
        vec![
            Self::stun("stun:stun.l.google.com:19302"),
            Self::stun("stun:stun1.l.google.com:19302"),
        ]
    }
}

/// Erzeugt neue Peer-Verbindungen
///
/// Die Verbindung oeffnet einen geordneten, zuverlaessigen Datenkanal und
/// meldet alle Ereignisse ueber `ereignisse`.
pub trait PeerConnectionFactory: Send + Sync {
    fn erstellen(
        &self,
        ice_server: &[IceServer],
        ereignisse: EreignisSender,
    ) -> NegotiationResult<Arc<dyn PeerConnection>>;
}
