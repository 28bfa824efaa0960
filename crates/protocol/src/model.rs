//! Datenmodell der gemeinsamen Zeichenflaeche
//!
//! Diese Typen reisen unveraendert im Sync-Umschlag zwischen den Peers.
//! Zeitstempel sind Unix-Millisekunden.

use duett_core::types::{MessageId, StrokeId, WidgetId};
use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Striche
// ---------------------------------------------------------------------------

/// Punkt eines Strichs
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Point {
    pub x: f64,
    pub y: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pressure: Option<f64>,
}

impl Point {
    pub fn new(x: f64, y: f64) -> Self {
        Self {
            x,
            y,
            pressure: None,
        }
    }
}

/// Ein abgeschlossener Strich. Unveraenderlich nach dem Erstellen.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Stroke {
    pub id: StrokeId,
    pub points: Vec<Point>,
    pub color: String,
    pub line_width: f64,
    pub timestamp: i64,
}

impl Stroke {
    pub fn neu(
        points: Vec<Point>,
        color: impl Into<String>,
        line_width: f64,
        timestamp: i64,
    ) -> Self {
        Self {
            id: StrokeId::new(),
            points,
            color: color.into(),
            line_width,
            timestamp,
        }
    }
}

// ---------------------------------------------------------------------------
// Widgets
// ---------------------------------------------------------------------------

/// Variante eines Widgets
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WidgetKind {
    Emoji,
    Image,
    Text,
}

/// Widget auf der Zeichenflaeche
///
/// `content` enthaelt das Emoji, den Text oder eine Bildbeschreibung.
/// Bilddaten liegen in `image_data` (Base64 oder URL).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Widget {
    pub id: WidgetId,
    #[serde(rename = "type")]
    pub kind: WidgetKind,
    pub content: String,
    pub x: f64,
    pub y: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub width: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub height: Option<f64>,
    pub timestamp: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub font_size: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub font_color: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image_data: Option<String>,
}

impl Widget {
    /// Erstellt ein Emoji-Widget an der angegebenen Position
    pub fn emoji(glyph: impl Into<String>, x: f64, y: f64, timestamp: i64) -> Self {
        Self {
            id: WidgetId::new(),
            kind: WidgetKind::Emoji,
            content: glyph.into(),
            x,
            y,
            width: None,
            height: None,
            timestamp,
            font_size: None,
            font_color: None,
            image_data: None,
        }
    }

    /// Erstellt ein Text-Widget mit Schriftgroesse und -farbe
    pub fn text(
        text: impl Into<String>,
        x: f64,
        y: f64,
        font_size: f64,
        font_color: impl Into<String>,
        timestamp: i64,
    ) -> Self {
        Self {
            id: WidgetId::new(),
            kind: WidgetKind::Text,
            content: text.into(),
            x,
            y,
            width: None,
            height: None,
            timestamp,
            font_size: Some(font_size),
            font_color: Some(font_color.into()),
            image_data: None,
        }
    }

    /// Erstellt ein Bild-Widget mit fester Groesse
    pub fn image(
        image_data: impl Into<String>,
        x: f64,
        y: f64,
        width: f64,
        height: f64,
        timestamp: i64,
    ) -> Self {
        Self {
            id: WidgetId::new(),
            kind: WidgetKind::Image,
            content: String::new(),
            x,
            y,
            width: Some(width),
            height: Some(height),
            timestamp,
            font_size: None,
            font_color: None,
            image_data: Some(image_data.into()),
        }
    }

    pub fn ist_emoji(&self) -> bool {
        self.kind == WidgetKind::Emoji
    }
}

/// Teilaktualisierung eines Widgets (nur gesetzte Felder werden uebernommen)
#[derive(Debug, Clone, Default, PartialEq)]
pub struct WidgetUpdate {
    pub content: Option<String>,
    pub x: Option<f64>,
    pub y: Option<f64>,
    pub width: Option<f64>,
    pub height: Option<f64>,
    pub font_size: Option<f64>,
    pub font_color: Option<String>,
    pub image_data: Option<String>,
}

impl WidgetUpdate {
    /// Aktualisierung nur der Position
    pub fn position(x: f64, y: f64) -> Self {
        Self {
            x: Some(x),
            y: Some(y),
            ..Self::default()
        }
    }

    /// Uebertraegt alle gesetzten Felder auf das Widget
    pub fn anwenden(self, widget: &mut Widget) {
        if let Some(content) = self.content {
            widget.content = content;
        }
        if let Some(x) = self.x {
            widget.x = x;
        }
        if let Some(y) = self.y {
            widget.y = y;
        }
        if self.width.is_some() {
            widget.width = self.width;
        }
        if self.height.is_some() {
            widget.height = self.height;
        }
        if self.font_size.is_some() {
            widget.font_size = self.font_size;
        }
        if self.font_color.is_some() {
            widget.font_color = self.font_color;
        }
        if self.image_data.is_some() {
            widget.image_data = self.image_data;
        }
    }
}

// ---------------------------------------------------------------------------
// Chat
// ---------------------------------------------------------------------------

/// Chat-Nachricht im lokalen Verlauf
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub id: MessageId,
    pub text: String,
    pub timestamp: i64,
    pub from: String,
}

impl ChatMessage {
    pub fn neu(text: impl Into<String>, from: impl Into<String>, timestamp: i64) -> Self {
        Self {
            id: MessageId::new(),
            text: text.into(),
            timestamp,
            from: from.into(),
        }
    }
}

// ---------------------------------------------------------------------------
// Verbindungsstatistik
// ---------------------------------------------------------------------------

/// Momentaufnahme der Verbindungsqualitaet zum Peer
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VerbindungsStatistik {
    /// Uebertragungsrate in kbit/s
    pub bitrate: u64,
    pub packets_lost: u64,
    /// Jitter in Millisekunden
    pub jitter: u64,
    /// Round-Trip-Time in Millisekunden
    pub rtt: u64,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn statistik_feldnamen() {
        let statistik = VerbindungsStatistik {
            bitrate: 512,
            packets_lost: 3,
            jitter: 12,
            rtt: 40,
        };
        let json = serde_json::to_value(statistik).unwrap();
        assert_eq!(json, json!({"bitrate": 512, "packetsLost": 3, "jitter": 12, "rtt": 40}));
    }

    #[test]
    fn widget_feldnamen() {
        let mut widget = Widget::text("Hallo", 10.0, 20.0, 24.0, "#ff0000", 1000);
        widget.id = WidgetId::from("w1");
        let json = serde_json::to_value(&widget).unwrap();
        assert_eq!(json["type"], "text");
        assert_eq!(json["fontSize"], 24.0);
        assert_eq!(json["fontColor"], "#ff0000");
        assert!(json.get("imageData").is_none());
        assert!(json.get("width").is_none());
    }

    #[test]
    fn widget_ohne_optionale_felder_lesbar() {
        let json = json!({
            "id": "1712345678901",
            "type": "emoji",
            "content": "🎉",
            "x": 5.0,
            "y": 6.0,
            "timestamp": 1712345678901i64
        });
        let widget: Widget = serde_json::from_value(json).unwrap();
        assert!(widget.ist_emoji());
        assert!(widget.font_size.is_none());
    }

    #[test]
    fn update_uebernimmt_nur_gesetzte_felder() {
        let mut widget = Widget::text("alt", 0.0, 0.0, 16.0, "#000000", 1);
        WidgetUpdate {
            content: Some("neu".into()),
            ..WidgetUpdate::position(42.0, 7.0)
        }
        .anwenden(&mut widget);

        assert_eq!(widget.content, "neu");
        assert_eq!((widget.x, widget.y), (42.0, 7.0));
        assert_eq!(widget.font_size, Some(16.0));
        assert_eq!(widget.font_color.as_deref(), Some("#000000"));
    }

    #[test]
    fn strich_feldnamen() {
        let strich = Stroke {
            id: StrokeId::from("s1"),
            points: vec![Point::new(1.0, 2.0)],
            color: "#000".into(),
            line_width: 3.0,
            timestamp: 5,
        };
        let json = serde_json::to_value(&strich).unwrap();
        assert_eq!(json["lineWidth"], 3.0);
        assert!(json["points"][0].get("pressure").is_none());
    }
}
