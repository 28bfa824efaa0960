//! Sitzungsbeschreibungen und Verbindungskandidaten
//!
//! Das Relay behandelt diese Werte als undurchsichtige JSON-Objekte. Erst
//! der Client deserialisiert sie in die Typen dieses Moduls. Das Format
//! entspricht dem Standard-Offer/Answer-Austausch (`{type, sdp}`) und den
//! Standard-ICE-Kandidaten (`{candidate, sdpMid, sdpMLineIndex}`).

use serde::{Deserialize, Serialize};

/// Art einer Sitzungsbeschreibung
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SdpTyp {
    Offer,
    Answer,
    Pranswer,
    Rollback,
}

/// Sitzungsbeschreibung (Offer, Answer oder Rollback)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionDescription {
    #[serde(rename = "type")]
    pub typ: SdpTyp,
    #[serde(default)]
    pub sdp: String,
}

impl SessionDescription {
    pub fn offer(sdp: impl Into<String>) -> Self {
        Self {
            typ: SdpTyp::Offer,
            sdp: sdp.into(),
        }
    }

    pub fn answer(sdp: impl Into<String>) -> Self {
        Self {
            typ: SdpTyp::Answer,
            sdp: sdp.into(),
        }
    }

    /// Verwirft das eigene ausstehende Angebot
    pub fn rollback() -> Self {
        Self {
            typ: SdpTyp::Rollback,
            sdp: String::new(),
        }
    }

    /// Wandelt die Beschreibung in den undurchsichtigen Relay-Wert um
    pub fn als_wert(&self) -> serde_json::Value {
        // Serialisierung einer Struktur aus Strings kann nicht fehlschlagen
        serde_json::to_value(self).unwrap_or(serde_json::Value::Null)
    }

    /// Liest eine Beschreibung aus einem Relay-Wert
    pub fn aus_wert(wert: serde_json::Value) -> serde_json::Result<Self> {
        serde_json::from_value(wert)
    }
}

/// Verbindungskandidat (ICE)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IceCandidate {
    pub candidate: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sdp_mid: Option<String>,
    #[serde(
        default,
        rename = "sdpMLineIndex",
        skip_serializing_if = "Option::is_none"
    )]
    pub sdp_m_line_index: Option<u16>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub username_fragment: Option<String>,
}

impl IceCandidate {
    pub fn neu(candidate: impl Into<String>) -> Self {
        Self {
            candidate: candidate.into(),
            sdp_mid: None,
            sdp_m_line_index: None,
            username_fragment: None,
        }
    }

    pub fn als_wert(&self) -> serde_json::Value {
        serde_json::to_value(self).unwrap_or(serde_json::Value::Null)
    }

    pub fn aus_wert(wert: serde_json::Value) -> serde_json::Result<Self> {
        serde_json::from_value(wert)
    }
}
