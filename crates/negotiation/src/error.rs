//! Fehlertypen fuer die Sitzungsaushandlung

use thiserror::Error;

/// Fehler bei Aushandlung, Peer-Verbindung oder Relay-Transport
#[derive(Debug, Error)]
pub enum NegotiationError {
    /// Die Plattform-Peer-Verbindung hat eine Operation abgelehnt
    #[error("Peer-Verbindung: {0}")]
    Peer(String),

    /// Operation im aktuellen Signalisierungszustand nicht erlaubt
    #[error("Ungueltiger Zustandsuebergang: {operation} im Zustand {zustand}")]
    UngueltigerZustand {
        operation: &'static str,
        zustand: String,
    },

    /// Sitzung ist bereits geschlossen
    #[error("Sitzung geschlossen")]
    Geschlossen,

    /// Verbindung zum Relay verloren oder nicht aufgebaut
    #[error("Relay nicht erreichbar: {0}")]
    RelayGetrennt(String),

    /// Relay-URL oder andere Einstellung ungueltig
    #[error("Konfigurationsfehler: {0}")]
    Konfiguration(String),

    /// Sitzungsbeschreibung oder Kandidat nicht lesbar
    #[error("Ungueltige Sitzungsnachricht: {0}")]
    Json(#[from] serde_json::Error),

    #[error("IO-Fehler: {0}")]
    Io(#[from] std::io::Error),
}

impl NegotiationError {
    pub fn peer(msg: impl Into<String>) -> Self {
        Self::Peer(msg.into())
    }
}

/// Result-Typ fuer die Sitzungsaushandlung
pub type NegotiationResult<T> = Result<T, NegotiationError>;
