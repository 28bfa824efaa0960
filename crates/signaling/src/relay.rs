//! Raum-Verwaltung – Mitgliedschaft und Weiterleitung
//!
//! Die `RoomRegistry` ordnet jedem Raum seine Teilnehmer zu und leitet
//! Sitzungsnachrichten an alle anderen Mitglieder weiter.
//!
//! ## Nebenlaeufigkeit
//! Raeume liegen in einer `DashMap`. Beitritt, Austritt und Weiterleitung
//! halten waehrend der Aenderung und der Zustellung die Sperre des
//! jeweiligen Raum-Eintrags. Damit sind alle Operationen auf einem Raum
//! serialisiert, waehrend verschiedene Raeume unabhaengig bleiben.
//! Zustellungen sind `try_send` und blockieren nie.
//!
//! ## Lebenszyklus
//! ```text
//! erster join -> Raum angelegt -> ... -> letzter leave -> Raum geloescht
//! ```

use dashmap::DashMap;
use duett_core::types::{PeerId, RoomId};
use duett_protocol::signaling::{ServerMessage, SignalArt};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use crate::broadcast::PeerBroadcaster;

/// Teilnehmer eines Raums in Beitrittsreihenfolge
#[derive(Debug, Default)]
struct Raum {
    mitglieder: Vec<PeerId>,
}

/// Zentrale Raum-Verwaltung des Relays
///
/// Thread-safe via Arc + DashMap. Clone teilt den inneren Zustand.
#[derive(Clone)]
pub struct RoomRegistry {
    inner: Arc<RoomRegistryInner>,
}

struct RoomRegistryInner {
    raeume: DashMap<RoomId, Raum>,
    /// Peer -> Raum, ein Raum pro Peer
    zugehoerigkeit: DashMap<PeerId, RoomId>,
    broadcaster: PeerBroadcaster,
    weitergeleitet: AtomicU64,
}

impl RoomRegistry {
    pub fn neu(broadcaster: PeerBroadcaster) -> Self {
        Self {
            inner: Arc::new(RoomRegistryInner {
                raeume: DashMap::new(),
                zugehoerigkeit: DashMap::new(),
                broadcaster,
                weitergeleitet: AtomicU64::new(0),
            }),
        }
    }

    /// Fuegt einen Peer einem Raum hinzu und legt den Raum bei Bedarf an
    ///
    /// Der beitretende Peer erhaelt `existing-users` mit allen anderen
    /// Mitgliedern, jedes andere Mitglied genau ein `user-joined`. Beides
    /// wird unter der Raum-Sperre eingereiht, damit kein spaeteres Event
    /// des Raums vor `existing-users` beim neuen Peer ankommt.
    ///
    /// Ist der Peer bereits in einem Raum, verlaesst er diesen zuerst.
    pub fn beitreten(&self, raum_id: &RoomId, peer_id: PeerId) -> Vec<PeerId> {
        if self.inner.zugehoerigkeit.contains_key(&peer_id) {
            self.verlassen(&peer_id);
        }

        let andere = {
            let mut raum = self.inner.raeume.entry(raum_id.clone()).or_default();
            let andere: Vec<PeerId> = raum.mitglieder.clone();
            raum.mitglieder.push(peer_id);

            self.inner.broadcaster.an_peer_senden(
                &peer_id,
                ServerMessage::ExistingUsers {
                    peers: andere.clone(),
                },
            );
            self.inner
                .broadcaster
                .an_peers_senden(&andere, &ServerMessage::UserJoined { peer: peer_id });
            andere
        };

        self.inner.zugehoerigkeit.insert(peer_id, raum_id.clone());

        tracing::info!(
            raum = %raum_id,
            peer = %peer_id,
            andere = andere.len(),
            "Peer hat Raum betreten"
        );
        andere
    }

    /// Leitet eine Sitzungsnachricht an alle anderen Mitglieder weiter
    ///
    /// Existiert der Raum nicht oder hat er kein anderes Mitglied, passiert
    /// nichts. Gibt die Anzahl der Zustellungen zurueck.
    pub fn weiterleiten(
        &self,
        art: SignalArt,
        inhalt: serde_json::Value,
        raum_id: &RoomId,
        absender: PeerId,
    ) -> usize {
        let Some(raum) = self.inner.raeume.get(raum_id) else {
            tracing::trace!(raum = %raum_id, art = %art, "Weiterleitung an unbekannten Raum");
            return 0;
        };

        let nachricht = ServerMessage::signal(art, inhalt, absender);
        let empfaenger = raum.mitglieder.iter().filter(|p| **p != absender);
        let zugestellt = self.inner.broadcaster.an_peers_senden(empfaenger, &nachricht);
        drop(raum);

        self.inner
            .weitergeleitet
            .fetch_add(zugestellt as u64, Ordering::Relaxed);
        tracing::trace!(
            raum = %raum_id,
            art = %art,
            absender = %absender,
            zugestellt,
            "Sitzungsnachricht weitergeleitet"
        );
        zugestellt
    }

    /// Entfernt einen Peer aus seinem Raum
    ///
    /// Die verbleibenden Mitglieder erhalten `user-left`. Ein leerer Raum
    /// wird geloescht. Gibt den verlassenen Raum zurueck.
    pub fn verlassen(&self, peer_id: &PeerId) -> Option<RoomId> {
        let (_, raum_id) = self.inner.zugehoerigkeit.remove(peer_id)?;

        let leer = match self.inner.raeume.get_mut(&raum_id) {
            Some(mut raum) => {
                raum.mitglieder.retain(|p| p != peer_id);
                self.inner
                    .broadcaster
                    .an_peers_senden(&raum.mitglieder, &ServerMessage::UserLeft { peer: *peer_id });
                raum.mitglieder.is_empty()
            }
            None => false,
        };

        tracing::info!(raum = %raum_id, peer = %peer_id, "Peer hat Raum verlassen");

        // Ein zwischenzeitlicher Beitritt hat Vorrang
        if leer
            && self
                .inner
                .raeume
                .remove_if(&raum_id, |_, raum| raum.mitglieder.is_empty())
                .is_some()
        {
            tracing::debug!(raum = %raum_id, "Leerer Raum geloescht");
        }

        Some(raum_id)
    }

    /// Mitglieder eines Raums in Beitrittsreihenfolge
    pub fn mitglieder(&self, raum_id: &RoomId) -> Vec<PeerId> {
        self.inner
            .raeume
            .get(raum_id)
            .map(|raum| raum.mitglieder.clone())
            .unwrap_or_default()
    }

    /// Raum, in dem sich ein Peer befindet
    pub fn raum_von(&self, peer_id: &PeerId) -> Option<RoomId> {
        self.inner.zugehoerigkeit.get(peer_id).map(|r| r.clone())
    }

    pub fn existiert(&self, raum_id: &RoomId) -> bool {
        self.inner.raeume.contains_key(raum_id)
    }

    pub fn raum_anzahl(&self) -> usize {
        self.inner.raeume.len()
    }

    /// Gesamtzahl der zugestellten Sitzungsnachrichten seit dem Start
    pub fn weitergeleitet_gesamt(&self) -> u64 {
        self.inner.weitergeleitet.load(Ordering::Relaxed)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tokio::sync::mpsc;

    struct Testaufbau {
        registry: RoomRegistry,
        broadcaster: PeerBroadcaster,
    }

    impl Testaufbau {
        fn neu() -> Self {
            let broadcaster = PeerBroadcaster::neu();
            Self {
                registry: RoomRegistry::neu(broadcaster.clone()),
                broadcaster,
            }
        }

        fn peer(&self) -> (PeerId, mpsc::Receiver<ServerMessage>) {
            let peer = PeerId::new();
            let rx = self.broadcaster.registrieren(peer);
            (peer, rx)
        }
    }

    fn alle(rx: &mut mpsc::Receiver<ServerMessage>) -> Vec<ServerMessage> {
        let mut nachrichten = Vec::new();
        while let Ok(msg) = rx.try_recv() {
            nachrichten.push(msg);
        }
        nachrichten
    }

    #[test]
    fn erster_beitritt_legt_raum_an() {
        let t = Testaufbau::neu();
        let raum = RoomId::from("abc123");
        let (a, mut rx_a) = t.peer();

        assert!(t.registry.beitreten(&raum, a).is_empty());
        assert!(t.registry.existiert(&raum));
        assert_eq!(alle(&mut rx_a), vec![ServerMessage::ExistingUsers { peers: vec![] }]);
    }

    #[test]
    fn beitritt_liefert_andere_und_meldet_genau_einmal() {
        let t = Testaufbau::neu();
        let raum = RoomId::from("abc123");
        let (a, mut rx_a) = t.peer();
        let (b, mut rx_b) = t.peer();
        let (p, mut rx_p) = t.peer();

        t.registry.beitreten(&raum, a);
        t.registry.beitreten(&raum, b);
        alle(&mut rx_a);
        alle(&mut rx_b);

        let andere = t.registry.beitreten(&raum, p);
        assert_eq!(andere, vec![a, b]);
        assert_eq!(alle(&mut rx_p), vec![ServerMessage::ExistingUsers { peers: vec![a, b] }]);
        assert_eq!(alle(&mut rx_a), vec![ServerMessage::UserJoined { peer: p }]);
        assert_eq!(alle(&mut rx_b), vec![ServerMessage::UserJoined { peer: p }]);
    }

    #[test]
    fn weiterleitung_an_alle_ausser_absender() {
        let t = Testaufbau::neu();
        let raum = RoomId::from("r");
        let (a, mut rx_a) = t.peer();
        let (b, mut rx_b) = t.peer();
        let (c, mut rx_c) = t.peer();
        for p in [a, b, c] {
            t.registry.beitreten(&raum, p);
        }
        for rx in [&mut rx_a, &mut rx_b, &mut rx_c] {
            alle(rx);
        }

        let inhalt = json!({"type": "offer", "sdp": "v=0"});
        let zugestellt = t
            .registry
            .weiterleiten(SignalArt::Offer, inhalt.clone(), &raum, a);
        assert_eq!(zugestellt, 2);

        let erwartet = ServerMessage::Offer {
            offer: inhalt,
            from: a,
        };
        assert!(alle(&mut rx_a).is_empty());
        assert_eq!(alle(&mut rx_b), vec![erwartet.clone()]);
        assert_eq!(alle(&mut rx_c), vec![erwartet]);
        assert_eq!(t.registry.weitergeleitet_gesamt(), 2);
    }

    #[test]
    fn weiterleitung_ohne_andere_mitglieder_ist_noop() {
        let t = Testaufbau::neu();
        let raum = RoomId::from("solo");
        let (a, mut rx_a) = t.peer();
        t.registry.beitreten(&raum, a);
        alle(&mut rx_a);

        assert_eq!(
            t.registry
                .weiterleiten(SignalArt::IceCandidate, json!({}), &raum, a),
            0
        );
        assert!(alle(&mut rx_a).is_empty());

        // Unbekannter Raum
        assert_eq!(
            t.registry
                .weiterleiten(SignalArt::Answer, json!({}), &RoomId::from("gibt-es-nicht"), a),
            0
        );
    }

    #[test]
    fn verlassen_meldet_und_loescht_leeren_raum() {
        let t = Testaufbau::neu();
        let raum = RoomId::from("abc123");
        let (a, mut rx_a) = t.peer();
        let (b, mut rx_b) = t.peer();
        t.registry.beitreten(&raum, a);
        t.registry.beitreten(&raum, b);
        alle(&mut rx_a);
        alle(&mut rx_b);

        assert_eq!(t.registry.verlassen(&a), Some(raum.clone()));
        assert_eq!(alle(&mut rx_b), vec![ServerMessage::UserLeft { peer: a }]);
        assert_eq!(t.registry.mitglieder(&raum), vec![b]);

        assert_eq!(t.registry.verlassen(&b), Some(raum.clone()));
        assert!(!t.registry.existiert(&raum));
        assert_eq!(t.registry.raum_anzahl(), 0);

        // Weiterleitung an den geloeschten Raum ist ein No-op
        assert_eq!(
            t.registry.weiterleiten(SignalArt::Offer, json!({}), &raum, a),
            0
        );
    }

    #[test]
    fn verlassen_ohne_raum() {
        let t = Testaufbau::neu();
        let (a, _rx) = t.peer();
        assert!(t.registry.verlassen(&a).is_none());
    }

    #[test]
    fn raumwechsel_verlaesst_alten_raum() {
        let t = Testaufbau::neu();
        let alt = RoomId::from("alt");
        let neu = RoomId::from("neu");
        let (a, _rx_a) = t.peer();
        let (b, mut rx_b) = t.peer();
        t.registry.beitreten(&alt, a);
        t.registry.beitreten(&alt, b);
        alle(&mut rx_b);

        t.registry.beitreten(&neu, a);
        assert_eq!(alle(&mut rx_b), vec![ServerMessage::UserLeft { peer: a }]);
        assert_eq!(t.registry.raum_von(&a), Some(neu.clone()));
        assert_eq!(t.registry.mitglieder(&alt), vec![b]);
        assert_eq!(t.registry.mitglieder(&neu), vec![a]);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn parallele_beitritte_und_austritte() {
        let t = Testaufbau::neu();
        let raum = RoomId::from("voll");

        let mut tasks = Vec::new();
        for _ in 0..32 {
            let registry = t.registry.clone();
            let raum = raum.clone();
            let (peer, rx) = t.peer();
            tasks.push(tokio::spawn(async move {
                registry.beitreten(&raum, peer);
                tokio::task::yield_now().await;
                registry.verlassen(&peer);
                drop(rx);
            }));
        }
        for task in tasks {
            task.await.expect("Task darf nicht paniken");
        }

        assert!(!t.registry.existiert(&raum));
        assert_eq!(t.registry.raum_anzahl(), 0);
    }
}
