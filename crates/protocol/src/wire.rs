//! Wire-Format fuer TCP-Verbindungen
//!
//! Frame-basiertes Protokoll: Length(u32 big-endian) + JSON-Payload.
//!
//! ## Frame-Format
//!
//! ```text
//! +--------+--------+--------+--------+----...----+
//! | Laenge (u32 BE) | 4 Bytes        | Payload    |
//! +--------+--------+--------+--------+----...----+
//! ```
//!
//! Die Laenge gibt die Anzahl der Payload-Bytes an (ohne die 4 Laengen-Bytes).
//! Maximale Frame-Groesse ist konfigurierbar (Standard: 1 MB). Der Codec ist
//! generisch ueber den gelesenen und den geschriebenen Nachrichtentyp.
//!
//! Ein vollstaendiger Frame mit ungueltigem JSON wird protokolliert und
//! uebersprungen; nur ein zu grosser Frame beendet den Stream.

use bytes::{Buf, BufMut, BytesMut};
use serde::{de::DeserializeOwned, Serialize};
use std::io;
use std::marker::PhantomData;
use tokio_util::codec::{Decoder, Encoder};

use crate::signaling::{ClientMessage, ServerMessage};

// ---------------------------------------------------------------------------
// Konstanten
// ---------------------------------------------------------------------------

/// Standard-maximale Frame-Groesse (1 MB)
pub const DEFAULT_MAX_FRAME_SIZE: usize = 1024 * 1024;

/// Groesse des Laengen-Felds in Bytes
pub const LENGTH_FIELD_SIZE: usize = 4;

// ---------------------------------------------------------------------------
// FrameCodec
// ---------------------------------------------------------------------------

/// tokio-util Codec fuer frame-basierte TCP-Verbindungen
///
/// `Ein` ist der Typ der gelesenen Frames, `Aus` der Typ der geschriebenen.
/// Das Relay liest `ClientMessage` und schreibt `ServerMessage`
/// ([`RelayCodec`]), der Client umgekehrt ([`ClientCodec`]).
///
/// # Beispiel
///
/// ```rust,no_run
/// use tokio_util::codec::Framed;
/// use duett_protocol::wire::RelayCodec;
///
/// // let stream = TcpStream::connect(...).await?;
/// // let framed = Framed::new(stream, RelayCodec::new());
/// ```
pub struct FrameCodec<Ein, Aus> {
    /// Maximale erlaubte Frame-Groesse in Bytes
    max_frame_size: usize,
    _typen: PhantomData<fn(Aus) -> Ein>,
}

/// Codec der Relay-Seite
pub type RelayCodec = FrameCodec<ClientMessage, ServerMessage>;

/// Codec der Client-Seite
pub type ClientCodec = FrameCodec<ServerMessage, ClientMessage>;

impl<Ein, Aus> FrameCodec<Ein, Aus> {
    /// Erstellt einen neuen `FrameCodec` mit Standard-Limits
    pub fn new() -> Self {
        Self::with_max_size(DEFAULT_MAX_FRAME_SIZE)
    }

    /// Erstellt einen `FrameCodec` mit benutzerdefinierter maximaler Frame-Groesse
    pub fn with_max_size(max_frame_size: usize) -> Self {
        Self {
            max_frame_size,
            _typen: PhantomData,
        }
    }

    /// Gibt die konfigurierte maximale Frame-Groesse zurueck
    pub fn max_frame_size(&self) -> usize {
        self.max_frame_size
    }
}

impl<Ein, Aus> Default for FrameCodec<Ein, Aus> {
    fn default() -> Self {
        Self::new()
    }
}

impl<Ein, Aus> Clone for FrameCodec<Ein, Aus> {
    fn clone(&self) -> Self {
        Self::with_max_size(self.max_frame_size)
    }
}

impl<Ein, Aus> std::fmt::Debug for FrameCodec<Ein, Aus> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FrameCodec")
            .field("max_frame_size", &self.max_frame_size)
            .finish()
    }
}

fn zu_gross(laenge: usize, maximum: usize) -> io::Error {
    io::Error::new(
        io::ErrorKind::InvalidData,
        format!("Frame zu gross: {laenge} Bytes (Maximum: {maximum} Bytes)"),
    )
}

fn json_fehler(e: serde_json::Error) -> io::Error {
    io::Error::new(
        io::ErrorKind::InvalidData,
        format!("JSON-Verarbeitung fehlgeschlagen: {e}"),
    )
}

// ---------------------------------------------------------------------------
// Decoder-Implementierung
// ---------------------------------------------------------------------------

impl<Ein, Aus> Decoder for FrameCodec<Ein, Aus>
where
    Ein: DeserializeOwned,
{
    type Item = Ein;
    type Error = io::Error;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        loop {
            // Warte auf mindestens 4 Bytes fuer das Laengen-Feld
            if src.len() < LENGTH_FIELD_SIZE {
                return Ok(None);
            }

            // Laenge lesen (big-endian u32) ohne den Buffer zu veraendern
            let length = u32::from_be_bytes([src[0], src[1], src[2], src[3]]) as usize;

            if length > self.max_frame_size {
                return Err(zu_gross(length, self.max_frame_size));
            }

            // Pruefen ob der vollstaendige Frame bereits im Buffer ist
            let total_size = LENGTH_FIELD_SIZE + length;
            if src.len() < total_size {
                src.reserve(total_size - src.len());
                return Ok(None);
            }

            src.advance(LENGTH_FIELD_SIZE);
            let payload = src.split_to(length);

            match serde_json::from_slice(&payload) {
                Ok(nachricht) => return Ok(Some(nachricht)),
                Err(e) => {
                    tracing::warn!(fehler = %e, laenge = length, "Ungueltiger Frame verworfen");
                }
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Encoder-Implementierung
// ---------------------------------------------------------------------------

impl<Ein, Aus> Encoder<Aus> for FrameCodec<Ein, Aus>
where
    Aus: Serialize,
{
    type Error = io::Error;

    fn encode(&mut self, item: Aus, dst: &mut BytesMut) -> Result<(), Self::Error> {
        let json = serde_json::to_vec(&item).map_err(json_fehler)?;

        if json.len() > self.max_frame_size {
            return Err(zu_gross(json.len(), self.max_frame_size));
        }

        // Laengen-Feld + Payload schreiben
        dst.reserve(LENGTH_FIELD_SIZE + json.len());
        dst.put_u32(json.len() as u32);
        dst.put_slice(&json);

        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
