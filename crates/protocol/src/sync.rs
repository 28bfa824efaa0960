//! Sync-Protokoll – Nachrichten ueber den direkten Sitzungskanal
//!
//! Ein Umschlag ist ein JSON-Objekt `{kind, ...}` mit genau einer der
//! Arten `drawing`, `chat`, `widget`, `file-start`, `file-chunk`.
//! Unbekannte Arten und kaputtes JSON liefern einen Fehler, den der
//! Empfaenger protokolliert und verwirft.

use duett_core::types::TransferId;
use serde::{Deserialize, Serialize};

use crate::error::{ProtocolError, ProtocolResult};
use crate::model::{Stroke, Widget};

/// Alle bekannten Umschlag-Arten
pub const BEKANNTE_ARTEN: [&str; 5] = ["drawing", "chat", "widget", "file-start", "file-chunk"];

// ---------------------------------------------------------------------------
// Dateiuebertragung
// ---------------------------------------------------------------------------

/// Metadaten einer Dateiuebertragung, vor dem ersten Chunk gesendet
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FileStart {
    pub id: TransferId,
    pub name: String,
    pub size: u64,
    pub mime_type: String,
    pub total_chunks: u32,
}

/// Ein Stueck einer Datei; `data` ist auf dem Draht Base64
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FileChunk {
    pub id: TransferId,
    pub chunk_index: u32,
    #[serde(with = "base64_daten")]
    pub data: Vec<u8>,
}

mod base64_daten {
    use base64::{engine::general_purpose::STANDARD, Engine as _};
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(daten: &[u8], serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&STANDARD.encode(daten))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<u8>, D::Error> {
        let text = String::deserialize(deserializer)?;
        STANDARD
            .decode(text.as_bytes())
            .map_err(serde::de::Error::custom)
    }
}

// ---------------------------------------------------------------------------
// Umschlag
// ---------------------------------------------------------------------------

/// Nachricht ueber den Sitzungskanal
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "kebab-case")]
pub enum SyncMessage {
    /// Vollstaendiger Strich
    Drawing { stroke: Stroke },
    /// Chat-Text mit Absender-Bezeichnung
    Chat {
        text: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        from: Option<String>,
    },
    /// Vollstaendiges Widget (Upsert beim Empfaenger)
    Widget { widget: Widget },
    FileStart(FileStart),
    FileChunk(FileChunk),
}

impl SyncMessage {
    /// Art des Umschlags wie auf dem Draht
    pub fn art(&self) -> &'static str {
        match self {
            Self::Drawing { .. } => "drawing",
            Self::Chat { .. } => "chat",
            Self::Widget { .. } => "widget",
            Self::FileStart(_) => "file-start",
            Self::FileChunk(_) => "file-chunk",
        }
    }

    /// Serialisiert den Umschlag als JSON-Text
    pub fn kodieren(&self) -> ProtocolResult<String> {
        Ok(serde_json::to_string(self)?)
    }

    /// Liest einen Umschlag
    ///
    /// Unterscheidet zwischen fehlender Art, unbekannter Art und
    /// ungueltigen Feldern einer bekannten Art.
    pub fn dekodieren(text: &str) -> ProtocolResult<Self> {
        let wert: serde_json::Value = serde_json::from_str(text)?;
        let art = wert
            .get("kind")
            .and_then(|k| k.as_str())
            .ok_or(ProtocolError::FehlendeArt)?;

        if !BEKANNTE_ARTEN.contains(&art) {
            return Err(ProtocolError::UnbekannteArt(art.to_string()));
        }

        Ok(serde_json::from_value(wert)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use duett_core::types::StrokeId;
    use crate::model::Point;
    use serde_json::json;

    #[test]
    fn chat_umschlag_format() {
        let msg = SyncMessage::Chat {
            text: "Hallo".into(),
            from: Some("Peer".into()),
        };
        let json: serde_json::Value = serde_json::from_str(&msg.kodieren().unwrap()).unwrap();
        assert_eq!(json, json!({"kind": "chat", "text": "Hallo", "from": "Peer"}));
    }

    #[test]
    fn drawing_umschlag_lesen() {
        let strich = Stroke {
            id: StrokeId::from("s1"),
            points: vec![Point::new(0.0, 0.0), Point::new(1.0, 1.0)],
            color: "#222".into(),
            line_width: 2.0,
            timestamp: 10,
        };
        let text = SyncMessage::Drawing {
            stroke: strich.clone(),
        }
        .kodieren()
        .unwrap();
        match SyncMessage::dekodieren(&text).unwrap() {
            SyncMessage::Drawing { stroke } => assert_eq!(stroke, strich),
            andere => panic!("Drawing erwartet, erhalten: {andere:?}"),
        }
    }

    #[test]
    fn file_start_feldnamen() {
        let msg = SyncMessage::FileStart(FileStart {
            id: TransferId::from("t1"),
            name: "bild.png".into(),
            size: 40_000,
            mime_type: "image/png".into(),
            total_chunks: 3,
        });
        let json: serde_json::Value = serde_json::from_str(&msg.kodieren().unwrap()).unwrap();
        assert_eq!(json["kind"], "file-start");
        assert_eq!(json["totalChunks"], 3);
        assert_eq!(json["mimeType"], "image/png");
    }

    #[test]
    fn chunk_daten_als_base64() {
        let msg = SyncMessage::FileChunk(FileChunk {
            id: TransferId::from("t1"),
            chunk_index: 2,
            data: vec![0, 1, 2, 255],
        });
        let text = msg.kodieren().unwrap();
        assert!(text.contains(r#""data":"AAEC/w==""#));
        assert!(text.contains(r#""chunkIndex":2"#));
        assert_eq!(SyncMessage::dekodieren(&text).unwrap(), msg);
    }

    #[test]
    fn unbekannte_art_wird_erkannt() {
        let err = SyncMessage::dekodieren(r#"{"kind":"cursor","x":1}"#).unwrap_err();
        assert!(matches!(err, ProtocolError::UnbekannteArt(art) if art == "cursor"));
    }

    #[test]
    fn fehlende_art_wird_erkannt() {
        let err = SyncMessage::dekodieren(r#"{"type":"drawing"}"#).unwrap_err();
        assert!(matches!(err, ProtocolError::FehlendeArt));
    }

    #[test]
    fn kaputtes_json_ist_fehler() {
        assert!(matches!(
            SyncMessage::dekodieren("{kind: drawing"),
            Err(ProtocolError::Json(_))
        ));
        // Bekannte Art, aber Pflichtfeld fehlt
        assert!(matches!(
            SyncMessage::dekodieren(r#"{"kind":"widget"}"#),
            Err(ProtocolError::Json(_))
        ));
    }

    #[test]
    fn ungueltiges_base64_ist_fehler() {
        let text = r####"{"kind":"file-chunk","id":"t1","chunkIndex":0,"data":"###"}"####;
        assert!(SyncMessage::dekodieren(text).is_err());
    }
}
