//! Strich-Historie – Schnappschuesse mit Cursor
//!
//! Invariante: `0 <= cursor < snapshots.len()` und die sichtbaren Striche
//! sind immer `snapshots[cursor]`. Die Liste beginnt mit einem leeren
//! Schnappschuss.

use duett_protocol::Stroke;

#[derive(Debug, Clone)]
pub struct StrokeHistory {
    snapshots: Vec<Vec<Stroke>>,
    cursor: usize,
}

impl StrokeHistory {
    pub fn neu() -> Self {
        Self {
            snapshots: vec![Vec::new()],
            cursor: 0,
        }
    }

    /// Sichtbare Striche (Schnappschuss am Cursor)
    pub fn aktuell(&self) -> &[Stroke] {
        // Invariante: cursor < snapshots.len()
        &self.snapshots[self.cursor]
    }

    /// Neuer Schnappschuss; verwirft alles hinter dem Cursor
    pub fn festschreiben(&mut self, striche: Vec<Stroke>) {
        self.snapshots.truncate(self.cursor + 1);
        self.snapshots.push(striche);
        self.cursor = self.snapshots.len() - 1;
    }

    /// Einen Schritt zurueck; `false` am Anfang
    pub fn rueckgaengig(&mut self) -> bool {
        if self.cursor == 0 {
            return false;
        }
        self.cursor -= 1;
        true
    }

    /// Einen Schritt vor; `false` am Ende
    pub fn wiederholen(&mut self) -> bool {
        if self.cursor + 1 >= self.snapshots.len() {
            return false;
        }
        self.cursor += 1;
        true
    }

    pub fn cursor(&self) -> usize {
        self.cursor
    }

    pub fn laenge(&self) -> usize {
        self.snapshots.len()
    }

    pub fn kann_rueckgaengig(&self) -> bool {
        self.cursor > 0
    }

    pub fn kann_wiederholen(&self) -> bool {
        self.cursor + 1 < self.snapshots.len()
    }
}

impl Default for StrokeHistory {
    fn default() -> Self {
        Self::neu()
    }
}
