//! duett-client – Client-Sitzung
//!
//! Verbindet Relay-Client, [`NegotiationEngine`](duett_negotiation::NegotiationEngine),
//! Zeichenflaeche und Liveness-Pruefung zu einer Ereignisschleife. Die
//! Plattform liefert nur die Peer-Verbindung ueber eine
//! [`PeerConnectionFactory`](duett_negotiation::PeerConnectionFactory);
//! [`WebRtcFabrik`] ist die Variante auf Basis des `webrtc`-Crates.

pub mod config;
pub mod session;
pub mod webrtc_peer;

pub use config::ClientConfig;
pub use session::{sitzung_starten, sitzung_starten_mit_netz, SitzungsHandle};
pub use webrtc_peer::WebRtcFabrik;
