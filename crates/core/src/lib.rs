//! duett-core – Gemeinsame Typen
//!
//! Dieses Crate stellt die ID-Newtypes bereit, die Relay, Client und
//! Canvas gemeinsam nutzen. Fehlertypen definiert jedes Fach-Crate selbst.

pub mod types;

// Re-Exporte fuer bequemen Zugriff
pub use types::{MessageId, PeerId, RoomId, StrokeId, TransferId, WidgetId};
