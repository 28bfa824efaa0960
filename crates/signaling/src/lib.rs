//! duett-signaling – TCP Signaling-Relay
//!
//! Dieser Crate implementiert den Rendezvous-Dienst fuer Duett. Er
//! verwaltet Raeume und deren Teilnehmer und leitet Sitzungsnachrichten
//! (Offer, Answer, ICE-Kandidaten) zwischen den Peers eines Raums weiter,
//! ohne deren Inhalt zu interpretieren.
//!
//! ## Architektur
//!
//! ```text
//! TCP Listener (SignalingServer)
//!     |
//!     v
//! RelayConnection (pro Verbindung ein Task, eine PeerId)
//!     |
//!     v
//! MessageDispatcher
//!     |
//!     +-- join-room / leave-room  -> RoomRegistry
//!     +-- offer / answer / ice    -> RoomRegistry::weiterleiten
//!
//! RoomRegistry    – Raum -> Teilnehmer, serialisiert pro Raum
//! PeerBroadcaster – Send-Queues aller verbundenen Peers
//! ```

pub mod broadcast;
pub mod connection;
pub mod dispatcher;
pub mod error;
pub mod relay;
pub mod server_state;
pub mod tcp;

// Bequeme Re-Exporte
pub use broadcast::PeerBroadcaster;
pub use connection::RelayConnection;
pub use dispatcher::MessageDispatcher;
pub use error::{SignalingError, SignalingResult};
pub use relay::RoomRegistry;
pub use server_state::{SignalingConfig, SignalingState};
pub use tcp::SignalingServer;
