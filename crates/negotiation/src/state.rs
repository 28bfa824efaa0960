//! Verhandlungszustand – expliziter Automat statt Merker
//!
//! ## State Machine
//! ```text
//!            try_begin                 Sperre faellt
//! Idle ---------------> Negotiating ------------------> Idle / Established
//!  ^                        ^                                  |
//!  |                        +---------- try_begin -------------+
//!  |
//!  +-- zuruecksetzen    (jeder Zustand) -- schliessen --> Closed
//! ```
//!
//! `try_begin` prueft und setzt atomar. Die zurueckgegebene
//! `VerhandlungsSperre` beendet die Verhandlung beim Drop, egal ob die
//! Aushandlung gelungen ist, fehlschlug oder abgebrochen wurde.

use parking_lot::Mutex;
use std::sync::Arc;

/// Phase der Aushandlung eines Peer-Paares
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verhandlungsphase {
    Idle,
    Negotiating,
    Established,
    Closed,
}

#[derive(Debug)]
struct Inner {
    phase: Verhandlungsphase,
    transport_verbunden: bool,
}

impl Inner {
    fn ruhephase(&self) -> Verhandlungsphase {
        if self.transport_verbunden {
            Verhandlungsphase::Established
        } else {
            Verhandlungsphase::Idle
        }
    }
}

/// Geteilter Verhandlungszustand
#[derive(Debug, Clone)]
pub struct VerhandlungsZustand {
    inner: Arc<Mutex<Inner>>,
}

impl VerhandlungsZustand {
    pub fn neu() -> Self {
        Self {
            inner: Arc::new(Mutex::new(Inner {
                phase: Verhandlungsphase::Idle,
                transport_verbunden: false,
            })),
        }
    }

    pub fn phase(&self) -> Verhandlungsphase {
        self.inner.lock().phase
    }

    /// Beginnt eine Verhandlung, falls keine laeuft und nicht geschlossen
    pub fn try_begin(&self) -> Option<VerhandlungsSperre> {
        let mut inner = self.inner.lock();
        match inner.phase {
            Verhandlungsphase::Idle | Verhandlungsphase::Established => {
                inner.phase = Verhandlungsphase::Negotiating;
                Some(VerhandlungsSperre {
                    inner: Arc::clone(&self.inner),
                })
            }
            Verhandlungsphase::Negotiating | Verhandlungsphase::Closed => None,
        }
    }

    pub fn verhandlung_laeuft(&self) -> bool {
        self.phase() == Verhandlungsphase::Negotiating
    }

    /// Transport meldet verbunden
    pub fn transport_verbunden(&self) {
        let mut inner = self.inner.lock();
        inner.transport_verbunden = true;
        if inner.phase == Verhandlungsphase::Idle {
            inner.phase = Verhandlungsphase::Established;
        }
    }

    /// Transport meldet getrennt
    pub fn transport_getrennt(&self) {
        let mut inner = self.inner.lock();
        inner.transport_verbunden = false;
        if inner.phase == Verhandlungsphase::Established {
            inner.phase = Verhandlungsphase::Idle;
        }
    }

    /// Neue Sitzung: zurueck nach Idle, auch aus Closed
    pub fn zuruecksetzen(&self) {
        let mut inner = self.inner.lock();
        inner.phase = Verhandlungsphase::Idle;
        inner.transport_verbunden = false;
    }

    /// Endgueltig schliessen; `try_begin` schlaegt danach fehl
    pub fn schliessen(&self) {
        let mut inner = self.inner.lock();
        inner.phase = Verhandlungsphase::Closed;
        inner.transport_verbunden = false;
    }
}

impl Default for VerhandlungsZustand {
    fn default() -> Self {
        Self::neu()
    }
}

/// Halter der laufenden Verhandlung
///
/// Beim Drop wird die Verhandlung beendet. Wurde der Zustand
/// zwischenzeitlich geschlossen oder zurueckgesetzt, bleibt er unveraendert.
#[derive(Debug)]
#[must_use = "die Verhandlung endet sobald die Sperre faellt"]
pub struct VerhandlungsSperre {
    inner: Arc<Mutex<Inner>>,
}

impl Drop for VerhandlungsSperre {
    fn drop(&mut self) {
        let mut inner = self.inner.lock();
        if inner.phase == Verhandlungsphase::Negotiating {
            inner.phase = inner.ruhephase();
        }
    }
}
