//! duett-canvas – gemeinsame Zeichenflaeche
//!
//! Jeder Teilnehmer besitzt seinen eigenen [`CanvasStore`]. Konsistenz
//! entsteht allein dadurch, dass beide Seiten dieselbe Folge von
//! Sync-Nachrichten anwenden; Konflikte loest nur "gleiche ID
//! ueberschreibt".
//!
//! ## Datenfluss
//! ```text
//! lokaler Befehl -> CanvasSession -> CanvasStore
//!                         |
//!                         v  SyncMessage (JSON)
//!                  SessionChannel ~~~~~> Peer: eingehend_verarbeiten -> CanvasStore
//! ```
//!
//! ## Module
//! - [`history`]  – Strich-Schnappschuesse mit Cursor (Undo/Redo)
//! - [`store`]    – Striche, Widgets, Chat, Dateien, Emoji-Ablauf
//! - [`sync`]     – Umschlaege anwenden und versenden
//! - [`transfer`] – Chunking und Zusammensetzen von Dateien

pub mod error;
pub mod history;
pub mod store;
pub mod sync;
pub mod transfer;

#[cfg(test)]
mod tests;

pub use error::{CanvasError, CanvasResult};
pub use history::StrokeHistory;
pub use store::{CanvasEreignis, CanvasStore, EMOJI_LEBENSDAUER_MS};
pub use sync::{eingehend_verarbeiten, geteilt, jetzt_ms, CanvasSession, SharedCanvas};
pub use transfer::{datei_zerlegen, IncomingTransfer, SharedFile, CHUNK_GROESSE};
