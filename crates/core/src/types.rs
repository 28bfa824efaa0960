//! Gemeinsame Identifikationstypen fuer Duett
//!
//! Alle IDs verwenden das Newtype-Pattern um Verwechslungen zwischen
//! verschiedenen ID-Arten zur Compilezeit auszuschliessen. Auf dem Draht
//! erscheinen sie als nackte Strings.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

// ---------------------------------------------------------------------------
// Teilnehmer und Raeume
// ---------------------------------------------------------------------------

/// Verbindungs-ID eines Teilnehmers, vom Relay pro Verbindung vergeben
///
/// Die Ordnung wird fuer die Glare-Aufloesung genutzt: die kleinere ID
/// ist der hoefliche Peer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct PeerId(pub Uuid);

impl PeerId {
    /// Erstellt eine neue zufaellige PeerId
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Gibt die innere UUID zurueck
    pub fn inner(&self) -> Uuid {
        self.0
    }
}

impl Default for PeerId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for PeerId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "peer:{}", self.0)
    }
}

/// Raum-Bezeichner, frei vom Benutzer gewaehlt (z.B. `"abc123"`)
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RoomId(pub String);

impl RoomId {
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for RoomId {
    fn from(name: &str) -> Self {
        Self(name.to_string())
    }
}

impl std::fmt::Display for RoomId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

// ---------------------------------------------------------------------------
// Canvas-Elemente
// ---------------------------------------------------------------------------

/// Definiert eine String-ID fuer Canvas-Elemente
///
/// Lokal erzeugte IDs sind UUIDs, fremde IDs werden unveraendert uebernommen.
macro_rules! element_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(pub String);

        impl $name {
            /// Erzeugt eine neue zufaellige ID
            pub fn new() -> Self {
                Self(Uuid::new_v4().to_string())
            }

            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl Default for $name {
            fn default() -> Self {
                Self::new()
            }
        }

        impl From<&str> for $name {
            fn from(id: &str) -> Self {
                Self(id.to_string())
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.write_str(&self.0)
            }
        }
    };
}

element_id!(
    /// Eindeutige ID eines Strichs
    StrokeId
);
element_id!(
    /// Eindeutige ID eines Widgets (Emoji, Bild, Text)
    WidgetId
);
element_id!(
    /// Eindeutige ID einer Chat-Nachricht
    MessageId
);
element_id!(
    /// Eindeutige ID einer Dateiuebertragung
    TransferId
);
