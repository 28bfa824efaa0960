//! Sync-Handler – verbindet Store und Sitzungskanal
//!
//! Eingehend: `eingehend_verarbeiten` dekodiert einen Umschlag und wendet
//! ihn ueber die Store-Operationen an. Fehlerhafte Umschlaege werden
//! geloggt und verworfen, der Kanal bleibt offen.
//!
//! Ausgehend: `CanvasSession` fuehrt lokale Befehle erst im Store aus und
//! sendet dann den passenden Umschlag. Ohne offenen Kanal bleibt es bei
//! der lokalen Aenderung.

use bytes::Bytes;
use duett_core::types::WidgetId;
use duett_protocol::{ChatMessage, SessionChannel, Stroke, SyncMessage, Widget, WidgetUpdate};
use parking_lot::{Mutex, RwLock};
use std::sync::Arc;

use crate::error::CanvasResult;
use crate::store::{CanvasStore, ABSENDER_LOKAL};
use crate::transfer::{datei_zerlegen, SharedFile};

/// Absender-Bezeichnung fuer Peers ohne Namen
pub const ABSENDER_PEER: &str = "Peer";

/// Von mehreren Tasks geteilter Store
pub type SharedCanvas = Arc<Mutex<CanvasStore>>;

pub fn geteilt(store: CanvasStore) -> SharedCanvas {
    Arc::new(Mutex::new(store))
}

/// Aktuelle Zeit in Unix-Millisekunden
pub fn jetzt_ms() -> i64 {
    chrono::Utc::now().timestamp_millis()
}

// ---------------------------------------------------------------------------
// Eingehend
// ---------------------------------------------------------------------------

/// Wendet einen eingehenden Umschlag an
///
/// Gibt `false` zurueck, wenn der Umschlag verworfen wurde.
pub fn eingehend_verarbeiten(store: &mut CanvasStore, text: &str, jetzt_ms: i64) -> bool {
    let nachricht = match SyncMessage::dekodieren(text) {
        Ok(n) => n,
        Err(e) => {
            tracing::warn!(fehler = %e, laenge = text.len(), "Sync-Nachricht verworfen");
            return false;
        }
    };

    tracing::trace!(art = nachricht.art(), "Sync-Nachricht empfangen");
    match nachricht {
        SyncMessage::Drawing { stroke } => store.add_stroke(stroke),
        SyncMessage::Chat { text, from } => {
            let from = from.unwrap_or_else(|| ABSENDER_PEER.to_string());
            store.add_message(ChatMessage::neu(text, from, jetzt_ms));
        }
        SyncMessage::Widget { widget } => store.upsert_widget(widget),
        SyncMessage::FileStart(start) => {
            if let Err(e) = store.transfer_beginnen(start) {
                tracing::warn!(fehler = %e, "Dateiankuendigung verworfen");
                return false;
            }
        }
        SyncMessage::FileChunk(chunk) => {
            if let Err(e) = store.chunk_speichern(chunk) {
                tracing::warn!(fehler = %e, "Datei-Chunk verworfen");
                return false;
            }
        }
    }
    true
}

// ---------------------------------------------------------------------------
// CanvasSession
// ---------------------------------------------------------------------------

/// Lokale Befehle mit Versand an den Peer
pub struct CanvasSession {
    store: SharedCanvas,
    kanal: RwLock<Option<Arc<dyn SessionChannel>>>,
    anzeigename: String,
}

impl CanvasSession {
    pub fn neu(store: SharedCanvas, anzeigename: impl Into<String>) -> Self {
        Self {
            store,
            kanal: RwLock::new(None),
            anzeigename: anzeigename.into(),
        }
    }

    pub fn store(&self) -> &SharedCanvas {
        &self.store
    }

    // -----------------------------------------------------------------------
    // Kanal
    // -----------------------------------------------------------------------

    pub fn kanal_setzen(&self, kanal: Arc<dyn SessionChannel>) {
        *self.kanal.write() = Some(kanal);
    }

    /// Kanal geschlossen: Referenz loesen und offene Uebertragungen verwerfen
    pub fn kanal_schliessen(&self) {
        self.kanal.write().take();
        let mut store = self.store.lock();
        store.transfers_abbrechen();
        store.verbindungsstatistik_loeschen();
    }

    pub fn hat_kanal(&self) -> bool {
        self.kanal
            .read()
            .as_ref()
            .is_some_and(|k| k.ist_offen())
    }

    /// Umschlag vom Peer anwenden
    pub fn eingehend(&self, text: &str) -> bool {
        eingehend_verarbeiten(&mut self.store.lock(), text, jetzt_ms())
    }

    /// Sendet fire-and-forget; ohne offenen Kanal wird nur geloggt
    fn senden(&self, nachricht: &SyncMessage) {
        let Some(kanal) = self.kanal.read().clone() else {
            tracing::debug!(art = nachricht.art(), "Kein Sitzungskanal, nur lokal");
            return;
        };
        if !kanal.ist_offen() {
            tracing::debug!(art = nachricht.art(), "Sitzungskanal nicht offen, nur lokal");
            return;
        }

        let ergebnis = nachricht.kodieren().and_then(|text| kanal.senden(text));
        if let Err(e) = ergebnis {
            tracing::warn!(art = nachricht.art(), fehler = %e, "Senden ueber Sitzungskanal fehlgeschlagen");
        }
    }

    // -----------------------------------------------------------------------
    // Befehle
    // -----------------------------------------------------------------------

    pub fn strich_zeichnen(&self, strich: Stroke) {
        self.store.lock().add_stroke(strich.clone());
        self.senden(&SyncMessage::Drawing { stroke: strich });
    }

    pub fn chat_senden(&self, text: impl Into<String>) {
        let text = text.into();
        self.store
            .lock()
            .add_message(ChatMessage::neu(text.clone(), ABSENDER_LOKAL, jetzt_ms()));
        self.senden(&SyncMessage::Chat {
            text,
            from: Some(self.anzeigename.clone()),
        });
    }

    pub fn widget_hinzufuegen(&self, widget: Widget) -> CanvasResult<()> {
        self.store.lock().add_widget(widget.clone())?;
        self.senden(&SyncMessage::Widget { widget });
        Ok(())
    }

    /// Aktualisiert lokal und sendet das vollstaendige Widget
    pub fn widget_aktualisieren(&self, id: &WidgetId, update: WidgetUpdate) -> CanvasResult<()> {
        let widget = self.store.lock().update_widget(id, update)?.clone();
        self.senden(&SyncMessage::Widget { widget });
        Ok(())
    }

    /// Nur lokal; das Protokoll kennt kein Entfernen
    pub fn widget_entfernen(&self, id: &WidgetId) -> Option<Widget> {
        self.store.lock().remove_widget(id)
    }

    pub fn rueckgaengig(&self) -> bool {
        self.store.lock().undo()
    }

    pub fn wiederholen(&self) -> bool {
        self.store.lock().redo()
    }

    pub fn leeren(&self) {
        self.store.lock().clear();
    }

    /// Teilt eine Datei: `file-start`, dann alle Chunks in Reihenfolge
    pub fn datei_teilen(
        &self,
        name: impl Into<String>,
        mime_type: impl Into<String>,
        daten: Bytes,
    ) -> CanvasResult<SharedFile> {
        let datei = SharedFile::neu(name, mime_type, daten);
        let (start, chunks) = datei_zerlegen(&datei)?;

        self.store.lock().datei_geteilt(datei.clone(), jetzt_ms());

        tracing::info!(transfer = %datei.id, name = %datei.name, chunks = chunks.len(), "Datei wird gesendet");
        self.senden(&SyncMessage::FileStart(start));
        for chunk in chunks {
            self.senden(&SyncMessage::FileChunk(chunk));
        }
        Ok(datei)
    }

    /// Periodischer Emoji-Ablauf
    pub fn emojis_aufraeumen(&self, jetzt_ms: i64) -> Vec<WidgetId> {
        self.store.lock().abgelaufene_emojis_entfernen(jetzt_ms)
    }
}
