//! Dateiuebertragung in Chunks
//!
//! Sender: `datei_zerlegen` liefert einen `file-start` und die Chunks in
//! Index-Reihenfolge. Empfaenger: `IncomingTransfer` sammelt Chunks nach
//! Index und setzt die Datei zusammen, sobald alle Indizes vorliegen.
//!
//! Es gibt kein erneutes Senden. Schliesst der Kanal waehrend einer
//! Uebertragung, wird sie verworfen.

use bytes::{Bytes, BytesMut};
use duett_core::types::TransferId;
use duett_protocol::{FileChunk, FileStart};

use crate::error::{CanvasError, CanvasResult};

/// Groesse eines Chunks in Bytes
pub const CHUNK_GROESSE: usize = 16 * 1024;

/// Groesste Datei, die ein Peer ankuendigen darf
pub const MAX_DATEI_GROESSE: u64 = 100 * 1024 * 1024;

/// Geteilte oder vollstaendig empfangene Datei
#[derive(Debug, Clone, PartialEq)]
pub struct SharedFile {
    pub id: TransferId,
    pub name: String,
    pub size: u64,
    pub mime_type: String,
    pub data: Bytes,
}

impl SharedFile {
    pub fn neu(name: impl Into<String>, mime_type: impl Into<String>, data: Bytes) -> Self {
        Self {
            id: TransferId::new(),
            name: name.into(),
            size: data.len() as u64,
            mime_type: mime_type.into(),
            data,
        }
    }

    /// Groesse in KB mit zwei Nachkommastellen
    pub fn groesse_kb(&self) -> String {
        format!("{:.2}", self.size as f64 / 1024.0)
    }
}

/// Anzahl Chunks fuer `groesse` Bytes (aufgerundet)
pub fn chunk_anzahl(groesse: u64) -> CanvasResult<u32> {
    u32::try_from(groesse.div_ceil(CHUNK_GROESSE as u64))
        .map_err(|_| CanvasError::DateiZuGross { groesse })
}

/// Zerlegt eine Datei in `file-start` und Chunks
pub fn datei_zerlegen(datei: &SharedFile) -> CanvasResult<(FileStart, Vec<FileChunk>)> {
    let total_chunks = chunk_anzahl(datei.data.len() as u64)?;
    let start = FileStart {
        id: datei.id.clone(),
        name: datei.name.clone(),
        size: datei.size,
        mime_type: datei.mime_type.clone(),
        total_chunks,
    };

    let chunks = datei
        .data
        .chunks(CHUNK_GROESSE)
        .zip(0u32..)
        .map(|(daten, chunk_index)| FileChunk {
            id: datei.id.clone(),
            chunk_index,
            data: daten.to_vec(),
        })
        .collect();

    Ok((start, chunks))
}

/// Eingehende Uebertragung
#[derive(Debug)]
pub struct IncomingTransfer {
    start: FileStart,
    chunks: Vec<Option<Vec<u8>>>,
    empfangen: u32,
}

impl IncomingTransfer {
    /// Legt eine Uebertragung an, sofern die Ankuendigung stimmig ist
    ///
    /// Abgelehnt wird eine Groesse ueber [`MAX_DATEI_GROESSE`] oder eine
    /// Chunk-Anzahl, die nicht zur Groesse passt.
    pub fn neu(start: FileStart) -> CanvasResult<Self> {
        if start.size > MAX_DATEI_GROESSE {
            return Err(CanvasError::DateiZuGross { groesse: start.size });
        }
        let erwartet = chunk_anzahl(start.size)?;
        if start.total_chunks != erwartet {
            return Err(CanvasError::ChunkAnzahlFalsch {
                id: start.id,
                angekuendigt: start.total_chunks,
                erwartet,
            });
        }

        Ok(Self {
            chunks: vec![None; erwartet as usize],
            start,
            empfangen: 0,
        })
    }

    pub fn id(&self) -> &TransferId {
        &self.start.id
    }

    pub fn metadaten(&self) -> &FileStart {
        &self.start
    }

    pub fn empfangen(&self) -> u32 {
        self.empfangen
    }

    pub fn ist_vollstaendig(&self) -> bool {
        self.empfangen == self.start.total_chunks
    }

    /// Speichert einen Chunk; gibt `true` zurueck sobald alle vorliegen
    ///
    /// Ein doppelter Index ueberschreibt den vorherigen Inhalt.
    pub fn chunk_speichern(&mut self, chunk: FileChunk) -> CanvasResult<bool> {
        let gesamt = self.start.total_chunks;
        let platz = self
            .chunks
            .get_mut(chunk.chunk_index as usize)
            .ok_or_else(|| CanvasError::ChunkAusserhalb {
                id: chunk.id.clone(),
                index: chunk.chunk_index,
                gesamt,
            })?;

        if platz.is_none() {
            self.empfangen += 1;
        }
        *platz = Some(chunk.data);
        Ok(self.ist_vollstaendig())
    }

    /// Setzt die Datei zusammen; `None` solange Chunks fehlen
    pub fn zusammensetzen(self) -> Option<SharedFile> {
        if !self.ist_vollstaendig() {
            return None;
        }

        let laenge = self.chunks.iter().flatten().map(Vec::len).sum();
        let mut puffer = BytesMut::with_capacity(laenge);
        for chunk in self.chunks.into_iter().flatten() {
            puffer.extend_from_slice(&chunk);
        }

        if puffer.len() as u64 != self.start.size {
            tracing::warn!(
                transfer = %self.start.id,
                angekuendigt = self.start.size,
                erhalten = puffer.len(),
                "Dateigroesse weicht von der Ankuendigung ab"
            );
        }

        Some(SharedFile {
            id: self.start.id,
            name: self.start.name,
            size: puffer.len() as u64,
            mime_type: self.start.mime_type,
            data: puffer.freeze(),
        })
    }
}
