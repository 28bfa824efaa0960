//! Sitzungskanal – Sendeseite der direkten Peer-Verbindung
//!
//! Der Kanal ist zuverlaessig und geordnet. Senden ist fire-and-forget:
//! es gibt keine Bestaetigung und keinen Gegendruck.

use crate::error::ProtocolResult;

/// Sendeschnittstelle eines geoeffneten Peer-Datenkanals
///
/// Implementiert von der Plattform-Anbindung der Peer-Verbindung.
pub trait SessionChannel: Send + Sync {
    /// Gibt true zurueck solange der Kanal Nachrichten annimmt
    fn ist_offen(&self) -> bool;

    /// Reiht eine Textnachricht nicht-blockierend zum Versand ein
    fn senden(&self, text: String) -> ProtocolResult<()>;
}
