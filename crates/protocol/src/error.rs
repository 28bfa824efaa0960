//! Fehlertypen fuer das Protokoll-Crate

use thiserror::Error;

/// Fehler beim Kodieren, Dekodieren oder Senden von Protokollnachrichten
#[derive(Debug, Error)]
pub enum ProtocolError {
    /// JSON konnte nicht gelesen oder geschrieben werden
    #[error("JSON-Fehler: {0}")]
    Json(#[from] serde_json::Error),

    /// Sync-Umschlag ohne `kind`-Feld
    #[error("Nachricht ohne Art (kind)")]
    FehlendeArt,

    /// Sync-Umschlag mit unbekannter Art
    #[error("Unbekannte Nachrichtenart: {0}")]
    UnbekannteArt(String),

    /// Sitzungskanal ist nicht offen
    #[error("Sitzungskanal geschlossen")]
    KanalGeschlossen,

    /// Senden ueber den Sitzungskanal fehlgeschlagen
    #[error("Senden fehlgeschlagen: {0}")]
    Senden(String),
}

/// Result-Typ fuer das Protokoll-Crate
pub type ProtocolResult<T> = Result<T, ProtocolError>;
