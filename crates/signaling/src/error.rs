//! Fehlertypen fuer das Signaling-Relay

use thiserror::Error;

/// Fehlertyp fuer das Signaling-Relay
#[derive(Debug, Error)]
pub enum SignalingError {
    /// IO-Fehler (TCP, Socket, zu grosser Frame)
    #[error("IO-Fehler: {0}")]
    Io(#[from] std::io::Error),

    /// Verbindung wurde vom Client getrennt
    #[error("Verbindung getrennt")]
    VerbindungGetrennt,

    /// Relay hat `max_clients` erreicht
    #[error("Server ist voll")]
    ServerVoll,

    /// Innerhalb des Timeouts kam kein Frame
    #[error("Keepalive-Timeout")]
    Timeout,

    /// Relay faehrt herunter
    #[error("Server wird heruntergefahren")]
    Shutdown,
}

impl SignalingError {
    /// Regulaeres Verbindungsende (kein Fehler im Betrieb)
    pub fn ist_regulaer(&self) -> bool {
        matches!(self, Self::VerbindungGetrennt | Self::Shutdown)
    }
}

/// Result-Typ fuer das Signaling-Relay
pub type SignalingResult<T> = Result<T, SignalingError>;
