//! Fehlertypen fuer das Canvas-Crate

use duett_core::types::{StrokeId, TransferId, WidgetId};
use duett_protocol::ProtocolError;
use thiserror::Error;

/// Canvas-Fehlertypen
#[derive(Debug, Error)]
pub enum CanvasError {
    #[error("Widget existiert bereits: {0}")]
    WidgetExistiert(WidgetId),

    #[error("Widget nicht gefunden: {0}")]
    WidgetNichtGefunden(WidgetId),

    #[error("Strich nicht gefunden: {0}")]
    StrichNichtGefunden(StrokeId),

    #[error("Unbekannte Uebertragung: {0}")]
    UnbekannteUebertragung(TransferId),

    #[error("Chunk {index} ausserhalb von 0..{gesamt} (Uebertragung {id})")]
    ChunkAusserhalb {
        id: TransferId,
        index: u32,
        gesamt: u32,
    },

    #[error("Datei zu gross: {groesse} Bytes")]
    DateiZuGross { groesse: u64 },

    #[error("Uebertragung {id}: {angekuendigt} Chunks angekuendigt, {erwartet} passen zur Groesse")]
    ChunkAnzahlFalsch {
        id: TransferId,
        angekuendigt: u32,
        erwartet: u32,
    },

    #[error("Protokollfehler: {0}")]
    Protokoll(#[from] ProtocolError),
}

pub type CanvasResult<T> = Result<T, CanvasError>;
