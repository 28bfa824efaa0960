//! CanvasStore – lokale Replik der gemeinsamen Zeichenflaeche
//!
//! Lokale Befehle und eingehende Sync-Nachrichten aendern den Store ueber
//! dieselben Operationen. Nur Striche sind historisiert; Widgets,
//! Nachrichten und Dateien nicht.
//!
//! Jede Aenderung wird als [`CanvasEreignis`] auf einem Broadcast-Kanal
//! veroeffentlicht. Ohne Abonnenten gehen die Ereignisse verloren.

use duett_core::types::{MessageId, StrokeId, TransferId, WidgetId};
use duett_protocol::{
    ChatMessage, FileChunk, FileStart, Stroke, VerbindungsStatistik, Widget, WidgetUpdate,
};
use std::collections::{HashMap, HashSet};
use tokio::sync::broadcast;

use crate::error::{CanvasError, CanvasResult};
use crate::history::StrokeHistory;
use crate::transfer::{IncomingTransfer, SharedFile};

/// Lebensdauer eines Emoji-Widgets in Millisekunden
pub const EMOJI_LEBENSDAUER_MS: i64 = 5000;

/// Absender-Bezeichnung fuer eigene Nachrichten
pub const ABSENDER_LOKAL: &str = "You";

/// Absender-Bezeichnung fuer Systemnachrichten
pub const ABSENDER_SYSTEM: &str = "System";

const EREIGNIS_KAPAZITAET: usize = 256;

/// Aenderung am Store fuer die Oberflaeche
#[derive(Debug, Clone)]
pub enum CanvasEreignis {
    StrichHinzugefuegt(StrokeId),
    HistorieGeaendert { cursor: usize, laenge: usize },
    WidgetGeaendert(WidgetId),
    WidgetEntfernt(WidgetId),
    NachrichtHinzugefuegt(MessageId),
    DateiEmpfangen(SharedFile),
    StatistikAktualisiert(VerbindungsStatistik),
}

pub struct CanvasStore {
    historie: StrokeHistory,
    widgets: Vec<Widget>,
    nachrichten: Vec<ChatMessage>,
    dateien: Vec<SharedFile>,
    uebertragungen: HashMap<TransferId, IncomingTransfer>,
    gezogen: HashSet<WidgetId>,
    emoji_lebensdauer_ms: i64,
    statistik: Option<VerbindungsStatistik>,
    ereignisse: broadcast::Sender<CanvasEreignis>,
}

impl CanvasStore {
    pub fn neu() -> Self {
        Self::mit_emoji_lebensdauer(EMOJI_LEBENSDAUER_MS)
    }

    pub fn mit_emoji_lebensdauer(emoji_lebensdauer_ms: i64) -> Self {
        let (ereignisse, _) = broadcast::channel(EREIGNIS_KAPAZITAET);
        Self {
            historie: StrokeHistory::neu(),
            widgets: Vec::new(),
            nachrichten: Vec::new(),
            dateien: Vec::new(),
            uebertragungen: HashMap::new(),
            gezogen: HashSet::new(),
            emoji_lebensdauer_ms,
            statistik: None,
            ereignisse,
        }
    }

    pub fn abonnieren(&self) -> broadcast::Receiver<CanvasEreignis> {
        self.ereignisse.subscribe()
    }

    fn melden(&self, ereignis: CanvasEreignis) {
        // Fehler heisst nur: niemand hoert zu
        let _ = self.ereignisse.send(ereignis);
    }

    fn historie_melden(&self) {
        self.melden(CanvasEreignis::HistorieGeaendert {
            cursor: self.historie.cursor(),
            laenge: self.historie.laenge(),
        });
    }

    // -----------------------------------------------------------------------
    // Striche (historisiert)
    // -----------------------------------------------------------------------

    /// Sichtbare Striche
    pub fn striche(&self) -> &[Stroke] {
        self.historie.aktuell()
    }

    pub fn historie(&self) -> &StrokeHistory {
        &self.historie
    }

    /// Haengt einen Strich an und legt einen neuen Schnappschuss an
    pub fn add_stroke(&mut self, strich: Stroke) {
        let id = strich.id.clone();
        let mut striche = self.historie.aktuell().to_vec();
        striche.push(strich);
        self.historie.festschreiben(striche);

        tracing::trace!(strich = %id, cursor = self.historie.cursor(), "Strich hinzugefuegt");
        self.melden(CanvasEreignis::StrichHinzugefuegt(id));
        self.historie_melden();
    }

    /// Entfernt einen Strich als neuer Schnappschuss (rueckgaengig machbar)
    pub fn remove_stroke(&mut self, id: &StrokeId) -> CanvasResult<()> {
        let aktuell = self.historie.aktuell();
        if !aktuell.iter().any(|s| &s.id == id) {
            return Err(CanvasError::StrichNichtGefunden(id.clone()));
        }
        let striche = aktuell.iter().filter(|s| &s.id != id).cloned().collect();
        self.historie.festschreiben(striche);
        self.historie_melden();
        Ok(())
    }

    /// Leert die Zeichenflaeche als neuer Schnappschuss
    pub fn clear(&mut self) {
        self.historie.festschreiben(Vec::new());
        self.historie_melden();
    }

    /// Ein Schritt zurueck; am Anfang ohne Wirkung
    pub fn undo(&mut self) -> bool {
        let bewegt = self.historie.rueckgaengig();
        if bewegt {
            self.historie_melden();
        }
        bewegt
    }

    /// Ein Schritt vor; am Ende ohne Wirkung
    pub fn redo(&mut self) -> bool {
        let bewegt = self.historie.wiederholen();
        if bewegt {
            self.historie_melden();
        }
        bewegt
    }

    // -----------------------------------------------------------------------
    // Widgets (nicht historisiert)
    // -----------------------------------------------------------------------

    pub fn widgets(&self) -> &[Widget] {
        &self.widgets
    }

    pub fn widget(&self, id: &WidgetId) -> Option<&Widget> {
        self.widgets.iter().find(|w| &w.id == id)
    }

    /// Fuegt ein neues Widget hinzu; eine vorhandene ID wird abgelehnt
    pub fn add_widget(&mut self, widget: Widget) -> CanvasResult<()> {
        if self.widget(&widget.id).is_some() {
            return Err(CanvasError::WidgetExistiert(widget.id));
        }
        let id = widget.id.clone();
        self.widgets.push(widget);
        self.melden(CanvasEreignis::WidgetGeaendert(id));
        Ok(())
    }

    /// Teilaktualisierung; gibt das aktualisierte Widget zurueck
    pub fn update_widget(&mut self, id: &WidgetId, update: WidgetUpdate) -> CanvasResult<&Widget> {
        let index = self
            .widgets
            .iter()
            .position(|w| &w.id == id)
            .ok_or_else(|| CanvasError::WidgetNichtGefunden(id.clone()))?;

        update.anwenden(&mut self.widgets[index]);
        self.melden(CanvasEreignis::WidgetGeaendert(id.clone()));
        Ok(&self.widgets[index])
    }

    /// Einfuegen oder zusammenfuehren (letzter Schreiber gewinnt)
    ///
    /// Optionale Felder, die im neuen Stand fehlen, behalten ihren
    /// bisherigen Wert.
    pub fn upsert_widget(&mut self, widget: Widget) {
        let id = widget.id.clone();
        match self.widgets.iter_mut().find(|w| w.id == widget.id) {
            Some(vorhanden) => zusammenfuehren(vorhanden, widget),
            None => self.widgets.push(widget),
        }
        self.melden(CanvasEreignis::WidgetGeaendert(id));
    }

    pub fn remove_widget(&mut self, id: &WidgetId) -> Option<Widget> {
        let index = self.widgets.iter().position(|w| &w.id == id)?;
        let widget = self.widgets.remove(index);
        self.gezogen.remove(id);
        self.melden(CanvasEreignis::WidgetEntfernt(id.clone()));
        Some(widget)
    }

    /// Widget wird interaktiv verschoben
    pub fn ziehen_beginnen(&mut self, id: &WidgetId) {
        self.gezogen.insert(id.clone());
    }

    pub fn ziehen_beenden(&mut self, id: &WidgetId) {
        self.gezogen.remove(id);
    }

    pub fn wird_gezogen(&self, id: &WidgetId) -> bool {
        self.gezogen.contains(id)
    }

    /// Entfernt abgelaufene Emojis, die nicht gerade gezogen werden
    ///
    /// Abgelaufen heisst `jetzt_ms - timestamp >= Lebensdauer`.
    pub fn abgelaufene_emojis_entfernen(&mut self, jetzt_ms: i64) -> Vec<WidgetId> {
        let lebensdauer = self.emoji_lebensdauer_ms;
        let gezogen = &self.gezogen;
        let mut entfernt = Vec::new();

        self.widgets.retain(|w| {
            let abgelaufen = w.ist_emoji()
                && jetzt_ms.saturating_sub(w.timestamp) >= lebensdauer
                && !gezogen.contains(&w.id);
            if abgelaufen {
                entfernt.push(w.id.clone());
            }
            !abgelaufen
        });

        if !entfernt.is_empty() {
            tracing::debug!(anzahl = entfernt.len(), "Abgelaufene Emojis entfernt");
        }
        for id in &entfernt {
            self.melden(CanvasEreignis::WidgetEntfernt(id.clone()));
        }
        entfernt
    }

    // -----------------------------------------------------------------------
    // Nachrichten (nur anhaengen)
    // -----------------------------------------------------------------------

    pub fn messages(&self) -> &[ChatMessage] {
        &self.nachrichten
    }

    pub fn add_message(&mut self, nachricht: ChatMessage) {
        let id = nachricht.id.clone();
        self.nachrichten.push(nachricht);
        self.melden(CanvasEreignis::NachrichtHinzugefuegt(id));
    }

    // -----------------------------------------------------------------------
    // Verbindungsstatistik
    // -----------------------------------------------------------------------

    /// Letzte gemessene Verbindungsqualitaet
    pub fn verbindungsstatistik(&self) -> Option<VerbindungsStatistik> {
        self.statistik
    }

    pub fn verbindungsstatistik_setzen(&mut self, statistik: VerbindungsStatistik) {
        self.statistik = Some(statistik);
        self.melden(CanvasEreignis::StatistikAktualisiert(statistik));
    }

    pub fn verbindungsstatistik_loeschen(&mut self) {
        self.statistik = None;
    }

    // -----------------------------------------------------------------------
    // Dateien
    // -----------------------------------------------------------------------

    pub fn shared_files(&self) -> &[SharedFile] {
        &self.dateien
    }

    pub fn add_shared_file(&mut self, datei: SharedFile) {
        self.dateien.push(datei);
    }

    /// Eigene Datei geteilt: Liste plus Systemnachricht
    pub fn datei_geteilt(&mut self, datei: SharedFile, jetzt_ms: i64) {
        let text = format!("Shared file: {} ({} KB)", datei.name, datei.groesse_kb());
        self.add_shared_file(datei);
        self.add_message(ChatMessage::neu(text, ABSENDER_SYSTEM, jetzt_ms));
    }

    /// Beginnt eine eingehende Uebertragung
    ///
    /// Eine leere Datei ist sofort vollstaendig und wird zurueckgegeben.
    /// Eine unstimmige Ankuendigung legt keine Uebertragung an.
    pub fn transfer_beginnen(&mut self, start: FileStart) -> CanvasResult<Option<SharedFile>> {
        tracing::info!(
            transfer = %start.id,
            name = %start.name,
            groesse = start.size,
            chunks = start.total_chunks,
            "Eingehende Datei angekuendigt"
        );
        let transfer = IncomingTransfer::neu(start)?;
        if transfer.ist_vollstaendig() {
            return Ok(self.transfer_abschliessen(transfer));
        }
        if let Some(alt) = self.uebertragungen.insert(transfer.id().clone(), transfer) {
            tracing::warn!(transfer = %alt.id(), "Laufende Uebertragung durch neue ersetzt");
        }
        Ok(None)
    }

    /// Speichert einen Chunk; gibt die Datei zurueck sobald sie vollstaendig ist
    pub fn chunk_speichern(&mut self, chunk: FileChunk) -> CanvasResult<Option<SharedFile>> {
        let id = chunk.id.clone();
        let transfer = self
            .uebertragungen
            .get_mut(&id)
            .ok_or_else(|| CanvasError::UnbekannteUebertragung(id.clone()))?;

        if !transfer.chunk_speichern(chunk)? {
            return Ok(None);
        }

        match self.uebertragungen.remove(&id) {
            Some(transfer) => Ok(self.transfer_abschliessen(transfer)),
            None => Ok(None),
        }
    }

    fn transfer_abschliessen(&mut self, transfer: IncomingTransfer) -> Option<SharedFile> {
        let datei = transfer.zusammensetzen()?;
        tracing::info!(transfer = %datei.id, name = %datei.name, groesse = datei.size, "Datei vollstaendig empfangen");
        self.add_shared_file(datei.clone());
        self.melden(CanvasEreignis::DateiEmpfangen(datei.clone()));
        Some(datei)
    }

    pub fn offene_transfers(&self) -> usize {
        self.uebertragungen.len()
    }

    /// Verwirft alle unvollstaendigen Uebertragungen
    pub fn transfers_abbrechen(&mut self) -> usize {
        let anzahl = self.uebertragungen.len();
        if anzahl > 0 {
            tracing::warn!(anzahl, "Unvollstaendige Uebertragungen verworfen");
        }
        self.uebertragungen.clear();
        anzahl
    }
}

fn zusammenfuehren(vorhanden: &mut Widget, neu: Widget) {
    let Widget {
        id: _,
        kind,
        content,
        x,
        y,
        width,
        height,
        timestamp,
        font_size,
        font_color,
        image_data,
    } = neu;

    vorhanden.kind = kind;
    vorhanden.content = content;
    vorhanden.x = x;
    vorhanden.y = y;
    vorhanden.timestamp = timestamp;
    vorhanden.width = width.or(vorhanden.width);
    vorhanden.height = height.or(vorhanden.height);
    vorhanden.font_size = font_size.or(vorhanden.font_size);
    if font_color.is_some() {
        vorhanden.font_color = font_color;
    }
    if image_data.is_some() {
        vorhanden.image_data = image_data;
    }
}

impl Default for CanvasStore {
    fn default() -> Self {
        Self::neu()
    }
}
