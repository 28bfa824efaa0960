//! Tests fuer Store, Sync-Handler und Dateiuebertragung


use duett_protocol::{ProtocolError, ProtocolResult, SessionChannel};
use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};

/// Sitzungskanal, der alle gesendeten Texte sammelt
#[derive(Default)]
pub(crate) struct MitschnittKanal {
    pub gesendet: Mutex<Vec<String>>,
    geschlossen: AtomicBool,
}

impl MitschnittKanal {
    pub fn schliessen(&self) {
        self.geschlossen.store(true, Ordering::SeqCst);
    }

    pub fn texte(&self) -> Vec<String> {
        self.gesendet.lock().clone()
    }
}

impl SessionChannel for MitschnittKanal {
    fn ist_offen(&self) -> bool {
        !self.geschlossen.load(Ordering::SeqCst)
    }

    fn senden(&self, text: String) -> ProtocolResult<()> {
        if !self.ist_offen() {
            return Err(ProtocolError::KanalGeschlossen);
        }
        self.gesendet.lock().push(text);
        Ok(())
    }
}
