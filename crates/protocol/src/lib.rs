//! duett-protocol – Netzwerkprotokoll-Definitionen
//!
//! Dieses Crate definiert alle Nachrichtentypen, die zwischen Client und
//! Relay (TCP, [`signaling`]) sowie zwischen zwei Peers ueber den
//! Sitzungskanal ([`sync`]) ausgetauscht werden, dazu das gemeinsame
//! Datenmodell der Zeichenflaeche ([`model`]).

pub mod channel;
pub mod error;
pub mod model;
pub mod session;
pub mod signaling;
pub mod sync;
pub mod wire;

pub use channel::SessionChannel;
pub use error::{ProtocolError, ProtocolResult};
pub use model::{
    ChatMessage, Point, Stroke, VerbindungsStatistik, Widget, WidgetKind, WidgetUpdate,
};
pub use session::{IceCandidate, SdpTyp, SessionDescription};
pub use signaling::{ClientMessage, ServerMessage, SignalArt};
pub use sync::{FileChunk, FileStart, SyncMessage};
