//! Relay-Protokoll (TCP)
//!
//! Definiert alle Nachrichten zwischen Client und Signaling-Relay.
//!
//! ## Design
//! - Tagged Enums (`"type"`, kebab-case) fuer typsichere Nachrichtentypen
//! - Sitzungsbeschreibungen und Kandidaten bleiben `serde_json::Value`:
//!   das Relay leitet sie weiter ohne sie zu interpretieren
//!
//! ## Ablauf
//! ```text
//! Client                     Relay                      andere Peers
//!   | -- join-room --------->  |                             |
//!   | <-- existing-users ----  | -- user-joined ----------->  |
//!   | -- offer/answer/ice -->  | -- offer/answer/ice+from -> |
//!   | (Verbindungsende)        | -- user-left ------------->  |
//! ```

use duett_core::types::{PeerId, RoomId};
use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Signal-Arten
// ---------------------------------------------------------------------------

/// Art einer weitergeleiteten Sitzungsnachricht
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SignalArt {
    Offer,
    Answer,
    IceCandidate,
}

impl SignalArt {
    /// Name der Art auf dem Draht (fuer Logs und Metrik-Labels)
    pub fn name(&self) -> &'static str {
        match self {
            Self::Offer => "offer",
            Self::Answer => "answer",
            Self::IceCandidate => "ice-candidate",
        }
    }
}

impl std::fmt::Display for SignalArt {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

// ---------------------------------------------------------------------------
// Client -> Relay
// ---------------------------------------------------------------------------

/// Nachrichten vom Client an das Relay
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum ClientMessage {
    /// Raum betreten (legt ihn bei Bedarf an)
    JoinRoom {
        #[serde(rename = "roomId")]
        room_id: RoomId,
    },
    /// Raum explizit verlassen (Auflegen)
    LeaveRoom,
    Offer {
        #[serde(rename = "roomId")]
        room_id: RoomId,
        offer: serde_json::Value,
    },
    Answer {
        #[serde(rename = "roomId")]
        room_id: RoomId,
        answer: serde_json::Value,
    },
    IceCandidate {
        #[serde(rename = "roomId")]
        room_id: RoomId,
        candidate: serde_json::Value,
    },
    /// Antwort auf einen Keepalive-Ping des Relays
    Pong {
        #[serde(rename = "timestampMs")]
        timestamp_ms: u64,
    },
}

impl ClientMessage {
    /// Erstellt eine Sitzungsnachricht der angegebenen Art
    pub fn signal(art: SignalArt, room_id: RoomId, inhalt: serde_json::Value) -> Self {
        match art {
            SignalArt::Offer => Self::Offer {
                room_id,
                offer: inhalt,
            },
            SignalArt::Answer => Self::Answer {
                room_id,
                answer: inhalt,
            },
            SignalArt::IceCandidate => Self::IceCandidate {
                room_id,
                candidate: inhalt,
            },
        }
    }

    /// Zerlegt eine Sitzungsnachricht in Art, Raum und Inhalt
    ///
    /// Gibt `None` fuer Nachrichten zurueck, die nicht weitergeleitet werden.
    pub fn in_signal(self) -> Option<(SignalArt, RoomId, serde_json::Value)> {
        match self {
            Self::Offer { room_id, offer } => Some((SignalArt::Offer, room_id, offer)),
            Self::Answer { room_id, answer } => Some((SignalArt::Answer, room_id, answer)),
            Self::IceCandidate { room_id, candidate } => {
                Some((SignalArt::IceCandidate, room_id, candidate))
            }
            _ => None,
        }
    }
}

// ---------------------------------------------------------------------------
// Relay -> Client
// ---------------------------------------------------------------------------

/// Nachrichten vom Relay an den Client
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum ServerMessage {
    /// Eigene Teilnehmer-ID, einmal pro Verbindung
    IdAssigned { peer: PeerId },
    /// Antwort auf `join-room`: alle anderen Mitglieder des Raums
    ExistingUsers { peers: Vec<PeerId> },
    /// Ein neuer Teilnehmer hat den Raum betreten
    UserJoined { peer: PeerId },
    Offer {
        offer: serde_json::Value,
        from: PeerId,
    },
    Answer {
        answer: serde_json::Value,
        from: PeerId,
    },
    IceCandidate {
        candidate: serde_json::Value,
        from: PeerId,
    },
    /// Ein Teilnehmer hat den Raum verlassen
    UserLeft { peer: PeerId },
    /// Keepalive des Relays
    Ping {
        #[serde(rename = "timestampMs")]
        timestamp_ms: u64,
    },
    /// Fehler- oder Abschiedsnachricht
    Error { message: String },
}

impl ServerMessage {
    /// Erstellt eine weitergeleitete Sitzungsnachricht mit Absender
    pub fn signal(art: SignalArt, inhalt: serde_json::Value, from: PeerId) -> Self {
        match art {
            SignalArt::Offer => Self::Offer {
                offer: inhalt,
                from,
            },
            SignalArt::Answer => Self::Answer {
                answer: inhalt,
                from,
            },
            SignalArt::IceCandidate => Self::IceCandidate {
                candidate: inhalt,
                from,
            },
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self::Error {
            message: message.into(),
        }
    }
}
