//! duett-negotiation – Sitzungsaushandlung auf Client-Seite
//!
//! Treibt pro Peer-Paar den Offer/Answer/ICE-Austausch ueber das
//! Signaling-Relay, entscheidet wann ein neuer Versuch beginnen darf und
//! stellt die Sitzung nach Verbindungsverlust wieder her.
//!
//! ## Architektur
//!
//! ```text
//! SignalingClient (TCP zum Relay)
//!     |  ServerMessage                 ^ ClientMessage
//!     v                                |
//! NegotiationEngine ------------------+
//!     |  VerhandlungsZustand (Idle/Negotiating/Established/Closed)
//!     |  dyn PeerConnection  <-- PeerConnectionFactory
//!     v
//! PeerEreignis (Kandidaten, Transport, Datenkanal)
//!
//! LivenessMonitor – prueft alle 5s, loest Neuinitialisierung aus
//! ```

pub mod engine;
pub mod error;
pub mod peer;
pub mod reconnect;
pub mod signaling_client;
pub mod state;

#[cfg(test)]
mod tests;

pub use engine::{
    GlareStrategie, KanalEreignis, NegotiationConfig, NegotiationEngine, Rolle, Verbindungsstatus,
};
pub use error::{NegotiationError, NegotiationResult};
pub use peer::{
    EreignisSender, IceServer, PeerConnection, PeerConnectionFactory, PeerEreignis, SignalZustand,
    TransportZustand,
};
pub use reconnect::{ImmerErreichbar, LivenessEntscheidung, LivenessMonitor, NetzwerkStatus};
pub use signaling_client::SignalingClient;
pub use state::{Verhandlungsphase, VerhandlungsSperre, VerhandlungsZustand};
