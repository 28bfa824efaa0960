//! Liveness-Pruefung und Wiederverbindung
//!
//! Ein fester Takt (Standard 5s) prueft den Verbindungsstatus. Ist die
//! Sitzung getrennt, wird der Versuchszaehler erhoeht und bei erreichbarem
//! Netzwerk eine vollstaendige Neuinitialisierung angefordert. Nach
//! `max_versuche` Versuchen gibt der Monitor auf, bis das Netzwerk wieder
//! als online gemeldet wird.
//!
//! ## State Machine
//! ```text
//!             netzwerk_offline
//! Zaehlend -------------------> Ausgesetzt
//!    ^  |                           |
//!    |  | versuche == max           | netzwerk_online (Zaehler = 0)
//!    |  v                           |
//!    | Erschoepft <-----------------+
//!    +----------- netzwerk_online --+
//! ```

use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::{interval_at, Instant, Interval, MissedTickBehavior};

use crate::engine::Verbindungsstatus;

/// Standard-Pruefintervall
pub const STANDARD_INTERVALL: Duration = Duration::from_secs(5);

/// Standard-Hoechstzahl an Wiederverbindungsversuchen
pub const STANDARD_MAX_VERSUCHE: u32 = 5;

/// Auskunft ueber die Erreichbarkeit des Netzwerks
pub trait NetzwerkStatus: Send + Sync {
    fn ist_erreichbar(&self) -> bool;
}

/// Netzwerk gilt immer als erreichbar
#[derive(Debug, Clone, Copy, Default)]
pub struct ImmerErreichbar;

impl NetzwerkStatus for ImmerErreichbar {
    fn ist_erreichbar(&self) -> bool {
        true
    }
}

/// Ergebnis einer Liveness-Pruefung
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LivenessEntscheidung {
    /// Nichts zu tun (verbunden, verbindet oder Netzwerk nicht erreichbar)
    Keine,
    /// Vollstaendige Neuinitialisierung, `versuch` zaehlt ab 1
    NeuInitialisieren { versuch: u32 },
    /// Netzwerk offline gemeldet, Zaehlung ruht
    Ausgesetzt,
    /// Alle Versuche verbraucht
    Erschoepft,
}

/// Periodische Pruefung des Verbindungsstatus
pub struct LivenessMonitor {
    intervall: Duration,
    max_versuche: u32,
    versuche: AtomicU32,
    offline: AtomicBool,
    netz: Arc<dyn NetzwerkStatus>,
}

impl LivenessMonitor {
    pub fn neu(intervall: Duration, max_versuche: u32, netz: Arc<dyn NetzwerkStatus>) -> Self {
        Self {
            intervall,
            max_versuche,
            versuche: AtomicU32::new(0),
            offline: AtomicBool::new(false),
            netz,
        }
    }

    /// Takt fuer die Pruefung; der erste Tick kommt nach einem Intervall
    pub fn takt(&self) -> Interval {
        let mut takt = interval_at(Instant::now() + self.intervall, self.intervall);
        takt.set_missed_tick_behavior(MissedTickBehavior::Delay);
        takt
    }

    pub fn versuche(&self) -> u32 {
        self.versuche.load(Ordering::Acquire)
    }

    pub fn ist_offline(&self) -> bool {
        self.offline.load(Ordering::Acquire)
    }

    /// Eine Pruefung bei gegebenem Verbindungsstatus
    pub fn pruefen(&self, status: Verbindungsstatus) -> LivenessEntscheidung {
        if status != Verbindungsstatus::Getrennt {
            return LivenessEntscheidung::Keine;
        }
        if self.ist_offline() {
            tracing::debug!("Netzwerk offline, Wiederverbindung ausgesetzt");
            return LivenessEntscheidung::Ausgesetzt;
        }

        let bisher = self.versuche.load(Ordering::Acquire);
        if bisher >= self.max_versuche {
            tracing::debug!(versuche = bisher, "Wiederverbindungsversuche erschoepft");
            return LivenessEntscheidung::Erschoepft;
        }

        let versuch = bisher + 1;
        self.versuche.store(versuch, Ordering::Release);

        if self.netz.ist_erreichbar() {
            tracing::info!(versuch, max = self.max_versuche, "Getrennt, Sitzung wird neu aufgebaut");
            LivenessEntscheidung::NeuInitialisieren { versuch }
        } else {
            tracing::info!(versuch, "Getrennt, Netzwerk nicht erreichbar");
            LivenessEntscheidung::Keine
        }
    }

    /// Netzwerk wieder online: Zaehler zuruecksetzen
    pub fn netzwerk_online(&self) {
        tracing::info!("Netzwerk online");
        self.offline.store(false, Ordering::Release);
        self.versuche.store(0, Ordering::Release);
    }

    /// Netzwerk offline: Zaehlung aussetzen
    pub fn netzwerk_offline(&self) {
        tracing::warn!("Netzwerk offline");
        self.offline.store(true, Ordering::Release);
    }
}

impl Default for LivenessMonitor {
    fn default() -> Self {
        Self::neu(
            STANDARD_INTERVALL,
            STANDARD_MAX_VERSUCHE,
            Arc::new(ImmerErreichbar),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Schalter(AtomicBool);

    impl NetzwerkStatus for Schalter {
        fn ist_erreichbar(&self) -> bool {
            self.0.load(Ordering::SeqCst)
        }
    }

    #[test]
    fn verbunden_loest_nichts_aus() {
        let monitor = LivenessMonitor::default();
        assert_eq!(monitor.pruefen(Verbindungsstatus::Verbunden), LivenessEntscheidung::Keine);
        assert_eq!(monitor.pruefen(Verbindungsstatus::Verbindet), LivenessEntscheidung::Keine);
        assert_eq!(monitor.versuche(), 0);
    }

    #[test]
    fn hoechstens_fuenf_versuche() {
        let monitor = LivenessMonitor::default();
        for erwartet in 1..=5 {
            assert_eq!(
                monitor.pruefen(Verbindungsstatus::Getrennt),
                LivenessEntscheidung::NeuInitialisieren { versuch: erwartet }
            );
        }
        assert_eq!(monitor.pruefen(Verbindungsstatus::Getrennt), LivenessEntscheidung::Erschoepft);
        assert_eq!(monitor.versuche(), 5);

        monitor.netzwerk_online();
        assert_eq!(
            monitor.pruefen(Verbindungsstatus::Getrennt),
            LivenessEntscheidung::NeuInitialisieren { versuch: 1 }
        );
    }

    #[test]
    fn unerreichbares_netz_zaehlt_ohne_neuinitialisierung() {
        let netz = Arc::new(Schalter(AtomicBool::new(false)));
        let monitor = LivenessMonitor::neu(STANDARD_INTERVALL, 2, netz.clone());

        assert_eq!(monitor.pruefen(Verbindungsstatus::Getrennt), LivenessEntscheidung::Keine);
        assert_eq!(monitor.versuche(), 1);

        netz.0.store(true, Ordering::SeqCst);
        assert_eq!(
            monitor.pruefen(Verbindungsstatus::Getrennt),
            LivenessEntscheidung::NeuInitialisieren { versuch: 2 }
        );
        assert_eq!(monitor.pruefen(Verbindungsstatus::Getrennt), LivenessEntscheidung::Erschoepft);
    }

    #[test]
    fn offline_setzt_zaehlung_aus() {
        let monitor = LivenessMonitor::default();
        monitor.pruefen(Verbindungsstatus::Getrennt);
        monitor.netzwerk_offline();
        assert_eq!(monitor.pruefen(Verbindungsstatus::Getrennt), LivenessEntscheidung::Ausgesetzt);
        assert_eq!(monitor.versuche(), 1);

        monitor.netzwerk_online();
        assert!(!monitor.ist_offline());
        assert_eq!(monitor.versuche(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn takt_feuert_alle_fuenf_sekunden() {
        let monitor = LivenessMonitor::default();
        let mut takt = monitor.takt();
        let start = Instant::now();

        takt.tick().await;
        assert_eq!(start.elapsed(), Duration::from_secs(5));
        takt.tick().await;
        assert_eq!(start.elapsed(), Duration::from_secs(10));
    }
}
