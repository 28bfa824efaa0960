//! NegotiationEngine – Offer/Answer/ICE fuer ein Peer-Paar
//!
//! Die Engine verarbeitet Relay-Nachrichten und Ereignisse der
//! Peer-Verbindung nacheinander. Jede Sitzung hat genau eine aktuelle
//! Peer-Verbindung; wird sie ersetzt (Peer hat verlassen,
//! Neuinitialisierung), erhoeht sich die Generation und Ereignisse der alten
//! Verbindung werden verworfen.
//!
//! ## Ablauf (Initiator)
//! ```text
//! existing-users / user-joined
//!   -> try_begin -> create_offer -> set_local -> offer an Relay
//!   <- answer (nur in have-local-offer) -> set_remote
//!   <-> ice-candidate
//!   Transport Connected -> Verbunden
//! ```
//!
//! ## Glare
//! Trifft ein Angebot ein, waehrend ein eigenes aussteht
//! (`have-local-offer`), entscheidet die [`GlareStrategie`]. Ein Angebot,
//! das waehrend einer laufenden Verhandlung eintrifft, wird immer verworfen.

use duett_core::types::{PeerId, RoomId};
use duett_protocol::{
    ClientMessage, IceCandidate, ServerMessage, SessionChannel, SessionDescription, SignalArt,
    VerbindungsStatistik,
};
use parking_lot::{Mutex, RwLock};
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::{mpsc, watch};

use crate::error::{NegotiationError, NegotiationResult};
use crate::peer::{
    EreignisSender, IceServer, PeerConnection, PeerConnectionFactory, PeerEreignis, SignalZustand,
    TransportZustand,
};
use crate::state::{Verhandlungsphase, VerhandlungsZustand};

// ---------------------------------------------------------------------------
// Oeffentliche Typen
// ---------------------------------------------------------------------------

/// Verbindungsstatus fuer die Oberflaeche
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verbindungsstatus {
    Getrennt,
    Verbindet,
    Verbunden,
}

/// Verhalten bei gleichzeitigen Angeboten
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GlareStrategie {
    /// Die kleinere Teilnehmer-ID nimmt ihr Angebot zurueck und antwortet,
    /// die groessere ignoriert das fremde Angebot
    #[default]
    HoeflicherPeer,
    /// Fremdes Angebot wird immer angenommen
    Uebernehmen,
}

/// Einstellungen der Engine
#[derive(Debug, Clone)]
pub struct NegotiationConfig {
    pub ice_server: Vec<IceServer>,
    pub glare: GlareStrategie,
}

impl Default for NegotiationConfig {
    fn default() -> Self {
        Self {
            ice_server: IceServer::standard(),
            glare: GlareStrategie::default(),
        }
    }
}

/// Rolle im aktuellen Offer/Answer-Zyklus
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Rolle {
    Initiator,
    Responder,
}

/// Ereignis des Sitzungskanals fuer die Synchronisationsschicht
pub enum KanalEreignis {
    Geoeffnet(Arc<dyn SessionChannel>),
    Nachricht(String),
    Geschlossen,
}

impl std::fmt::Debug for KanalEreignis {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Geoeffnet(_) => f.write_str("Geoeffnet"),
            Self::Nachricht(n) => f.debug_tuple("Nachricht").field(&n.len()).finish(),
            Self::Geschlossen => f.write_str("Geschlossen"),
        }
    }
}

#[derive(Debug, Default)]
struct SitzungsInfo {
    eigene_id: Option<PeerId>,
    remote: Option<PeerId>,
    rolle: Option<Rolle>,
}

// ---------------------------------------------------------------------------
// Engine
// ---------------------------------------------------------------------------

/// Aushandlung fuer einen Raum
///
/// Alle `&self`-Methoden sind fuer einen einzelnen Verarbeitungs-Task
/// gedacht; Sperren werden nie ueber `.await` gehalten.
pub struct NegotiationEngine {
    raum: RoomId,
    config: NegotiationConfig,
    fabrik: Arc<dyn PeerConnectionFactory>,
    signal_tx: RwLock<mpsc::Sender<ClientMessage>>,
    peer: RwLock<Arc<dyn PeerConnection>>,
    generation: AtomicU64,
    ereignis_tx: mpsc::UnboundedSender<(u64, PeerEreignis)>,
    zustand: VerhandlungsZustand,
    sitzung: Mutex<SitzungsInfo>,
    status_tx: watch::Sender<Verbindungsstatus>,
}

impl NegotiationEngine {
    /// Erstellt die Engine samt erster Peer-Verbindung
    ///
    /// Der zurueckgegebene Empfaenger liefert die Ereignisse aller
    /// Peer-Verbindungen dieser Engine; sie gehoeren an
    /// [`ereignis_verarbeiten`](Self::ereignis_verarbeiten).
    pub fn neu(
        raum: RoomId,
        config: NegotiationConfig,
        fabrik: Arc<dyn PeerConnectionFactory>,
        signal_tx: mpsc::Sender<ClientMessage>,
    ) -> NegotiationResult<(Arc<Self>, mpsc::UnboundedReceiver<(u64, PeerEreignis)>)> {
        let (ereignis_tx, ereignis_rx) = mpsc::unbounded_channel();
        let peer = fabrik.erstellen(&config.ice_server, EreignisSender::neu(0, ereignis_tx.clone()))?;
        let (status_tx, _) = watch::channel(Verbindungsstatus::Getrennt);

        let engine = Arc::new(Self {
            raum,
            config,
            fabrik,
            signal_tx: RwLock::new(signal_tx),
            peer: RwLock::new(peer),
            generation: AtomicU64::new(0),
            ereignis_tx,
            zustand: VerhandlungsZustand::neu(),
            sitzung: Mutex::new(SitzungsInfo::default()),
            status_tx,
        });
        Ok((engine, ereignis_rx))
    }

    // -----------------------------------------------------------------------
    // Abfragen
    // -----------------------------------------------------------------------

    pub fn raum(&self) -> &RoomId {
        &self.raum
    }

    pub fn status(&self) -> watch::Receiver<Verbindungsstatus> {
        self.status_tx.subscribe()
    }

    pub fn aktueller_status(&self) -> Verbindungsstatus {
        *self.status_tx.borrow()
    }

    pub fn ist_verbunden(&self) -> bool {
        self.aktueller_status() == Verbindungsstatus::Verbunden
    }

    pub fn phase(&self) -> Verhandlungsphase {
        self.zustand.phase()
    }

    pub fn eigene_id(&self) -> Option<PeerId> {
        self.sitzung.lock().eigene_id
    }

    pub fn remote_peer(&self) -> Option<PeerId> {
        self.sitzung.lock().remote
    }

    pub fn rolle(&self) -> Option<Rolle> {
        self.sitzung.lock().rolle
    }

    pub fn signal_zustand(&self) -> SignalZustand {
        self.aktuelle_verbindung().signal_zustand()
    }

    /// Verbindungsqualitaet der aktuellen Peer-Verbindung
    ///
    /// Nur bei bestehender Verbindung; Fehler der Plattform werden
    /// protokolliert und als `None` gemeldet.
    pub async fn statistiken(&self) -> Option<VerbindungsStatistik> {
        if !self.ist_verbunden() {
            return None;
        }
        let peer = self.aktuelle_verbindung();
        match peer.statistiken().await {
            Ok(statistik) => statistik,
            Err(e) => {
                tracing::debug!(fehler = %e, "Verbindungsstatistik nicht verfuegbar");
                None
            }
        }
    }

    // -----------------------------------------------------------------------
    // Lebenszyklus
    // -----------------------------------------------------------------------

    /// Tritt dem Raum bei
    pub async fn beitreten(&self) -> NegotiationResult<()> {
        self.status_setzen(Verbindungsstatus::Verbindet);
        tracing::info!(raum = %self.raum, "Trete Raum bei");
        self.signal_senden(ClientMessage::JoinRoom {
            room_id: self.raum.clone(),
        })
        .await
    }

    /// Vollstaendige Neuinitialisierung ueber eine neue Relay-Verbindung
    ///
    /// Ersetzt die Peer-Verbindung, setzt Verhandlung und Sitzung zurueck
    /// und tritt dem Raum erneut bei.
    pub async fn neu_initialisieren(
        &self,
        signal_tx: mpsc::Sender<ClientMessage>,
    ) -> NegotiationResult<()> {
        tracing::info!(raum = %self.raum, "Sitzung wird neu initialisiert");
        *self.signal_tx.write() = signal_tx;

        let alte = self.verbindung_ersetzen()?;
        alte.close().await;

        self.zustand.zuruecksetzen();
        *self.sitzung.lock() = SitzungsInfo::default();
        self.beitreten().await
    }

    /// Relay-Verbindung verloren
    ///
    /// Eine bestehende direkte Verbindung bleibt bestehen; erst wenn deren
    /// Transport abbricht, wird neu initialisiert.
    pub fn relay_getrennt(&self) {
        if self.ist_verbunden() {
            tracing::warn!(raum = %self.raum, "Relay-Verbindung verloren, direkte Verbindung bleibt");
            return;
        }
        tracing::warn!(raum = %self.raum, "Relay-Verbindung verloren");
        self.status_setzen(Verbindungsstatus::Getrennt);
    }

    /// Markiert die Sitzung als getrennt (z.B. Netzwerk offline)
    pub fn als_getrennt_markieren(&self) {
        self.status_setzen(Verbindungsstatus::Getrennt);
    }

    /// Auflegen: Verhandlung endgueltig beenden und Raum verlassen
    pub async fn schliessen(&self) {
        self.zustand.schliessen();
        // Spaete Ereignisse der geschlossenen Verbindung verwerfen
        self.generation.fetch_add(1, Ordering::AcqRel);

        let peer = self.aktuelle_verbindung();
        peer.close().await;

        {
            let mut sitzung = self.sitzung.lock();
            sitzung.remote = None;
            sitzung.rolle = None;
        }

        if let Err(e) = self.signal_senden(ClientMessage::LeaveRoom).await {
            tracing::debug!(fehler = %e, "leave-room nicht zustellbar");
        }
        self.status_setzen(Verbindungsstatus::Getrennt);
        tracing::info!(raum = %self.raum, "Sitzung geschlossen");
    }

    // -----------------------------------------------------------------------
    // Relay-Nachrichten
    // -----------------------------------------------------------------------

    /// Verarbeitet eine Nachricht vom Relay
    ///
    /// Gibt `Some(KanalEreignis::Geschlossen)` zurueck, wenn der
    /// Sitzungskanal dadurch ungueltig geworden ist.
    pub async fn signal_verarbeiten(&self, nachricht: ServerMessage) -> Option<KanalEreignis> {
        match nachricht {
            ServerMessage::IdAssigned { peer } => {
                tracing::debug!(peer = %peer, "Eigene Teilnehmer-ID erhalten");
                self.sitzung.lock().eigene_id = Some(peer);
                None
            }
            ServerMessage::ExistingUsers { peers } => {
                tracing::info!(raum = %self.raum, anzahl = peers.len(), "Raum beigetreten");
                if let Some(erster) = peers.first() {
                    self.angebot_starten(*erster).await;
                }
                None
            }
            ServerMessage::UserJoined { peer } => {
                tracing::info!(peer = %peer, "Neuer Teilnehmer im Raum");
                self.angebot_starten(peer).await;
                None
            }
            ServerMessage::Offer { offer, from } => {
                self.angebot_empfangen(offer, from).await;
                None
            }
            ServerMessage::Answer { answer, from } => {
                self.antwort_empfangen(answer, from).await;
                None
            }
            ServerMessage::IceCandidate { candidate, from } => {
                self.kandidat_empfangen(candidate, from).await;
                None
            }
            ServerMessage::UserLeft { peer } => self.peer_verlassen(peer).await,
            // Wird bereits im SignalingClient beantwortet
            ServerMessage::Ping { .. } => None,
            ServerMessage::Error { message } => {
                tracing::warn!(meldung = %message, "Fehlermeldung vom Relay");
                None
            }
        }
    }

    /// Startet ein Angebot an `remote`, falls keine Verhandlung laeuft
    async fn angebot_starten(&self, remote: PeerId) {
        let Some(_sperre) = self.zustand.try_begin() else {
            tracing::debug!(peer = %remote, "Verhandlung laeuft bereits, kein Angebot");
            return;
        };

        let peer = self.aktuelle_verbindung();
        let zustand = peer.signal_zustand();
        if zustand != SignalZustand::Stable {
            tracing::debug!(peer = %remote, zustand = %zustand, "Nicht stable, kein Angebot");
            return;
        }

        {
            let mut sitzung = self.sitzung.lock();
            sitzung.remote = Some(remote);
            sitzung.rolle = Some(Rolle::Initiator);
        }

        match self.angebot_senden(peer.as_ref()).await {
            Ok(()) => tracing::info!(peer = %remote, "Angebot gesendet"),
            Err(e) => tracing::warn!(peer = %remote, fehler = %e, "Angebot fehlgeschlagen"),
        }
    }

    async fn angebot_senden(&self, peer: &dyn PeerConnection) -> NegotiationResult<()> {
        let angebot = peer.create_offer().await?;
        peer.set_local_description(angebot.clone()).await?;
        self.signal_senden(ClientMessage::signal(
            SignalArt::Offer,
            self.raum.clone(),
            angebot.als_wert(),
        ))
        .await
    }

    async fn angebot_empfangen(&self, wert: serde_json::Value, from: PeerId) {
        let angebot = match SessionDescription::aus_wert(wert) {
            Ok(a) => a,
            Err(e) => {
                tracing::warn!(peer = %from, fehler = %e, "Ungueltiges Angebot verworfen");
                return;
            }
        };

        let Some(_sperre) = self.zustand.try_begin() else {
            tracing::warn!(peer = %from, "Verhandlung laeuft, Angebot verworfen");
            return;
        };

        let peer = self.aktuelle_verbindung();
        match peer.signal_zustand() {
            SignalZustand::Stable => {}
            SignalZustand::HaveLocalOffer => match self.config.glare {
                GlareStrategie::Uebernehmen => {
                    tracing::info!(peer = %from, "Glare: fremdes Angebot wird uebernommen");
                }
                GlareStrategie::HoeflicherPeer => {
                    if !self.ist_hoeflich_gegenueber(from) {
                        tracing::info!(peer = %from, "Glare: fremdes Angebot ignoriert");
                        return;
                    }
                    tracing::info!(peer = %from, "Glare: eigenes Angebot wird zurueckgenommen");
                    if let Err(e) = peer
                        .set_local_description(SessionDescription::rollback())
                        .await
                    {
                        tracing::warn!(peer = %from, fehler = %e, "Rollback fehlgeschlagen");
                        return;
                    }
                }
            },
            zustand => {
                tracing::warn!(peer = %from, zustand = %zustand, "Angebot im aktuellen Zustand ignoriert");
                return;
            }
        }

        {
            let mut sitzung = self.sitzung.lock();
            sitzung.remote = Some(from);
            sitzung.rolle = Some(Rolle::Responder);
        }

        match self.antwort_senden(peer.as_ref(), angebot).await {
            Ok(()) => tracing::info!(peer = %from, "Antwort gesendet"),
            Err(e) => tracing::warn!(peer = %from, fehler = %e, "Antwort fehlgeschlagen"),
        }
    }

    async fn antwort_senden(
        &self,
        peer: &dyn PeerConnection,
        angebot: SessionDescription,
    ) -> NegotiationResult<()> {
        peer.set_remote_description(angebot).await?;
        let antwort = peer.create_answer().await?;
        peer.set_local_description(antwort.clone()).await?;
        self.signal_senden(ClientMessage::signal(
            SignalArt::Answer,
            self.raum.clone(),
            antwort.als_wert(),
        ))
        .await
    }

    async fn antwort_empfangen(&self, wert: serde_json::Value, from: PeerId) {
        let antwort = match SessionDescription::aus_wert(wert) {
            Ok(a) => a,
            Err(e) => {
                tracing::warn!(peer = %from, fehler = %e, "Ungueltige Antwort verworfen");
                return;
            }
        };

        let peer = self.aktuelle_verbindung();
        let zustand = peer.signal_zustand();
        if zustand != SignalZustand::HaveLocalOffer {
            tracing::warn!(peer = %from, zustand = %zustand, "Antwort ausserhalb von have-local-offer ignoriert");
            return;
        }

        match peer.set_remote_description(antwort).await {
            Ok(()) => tracing::info!(peer = %from, "Antwort angewendet"),
            Err(e) => tracing::warn!(peer = %from, fehler = %e, "Antwort nicht anwendbar"),
        }
    }

    async fn kandidat_empfangen(&self, wert: serde_json::Value, from: PeerId) {
        let kandidat: IceCandidate = match IceCandidate::aus_wert(wert) {
            Ok(k) => k,
            Err(e) => {
                tracing::warn!(peer = %from, fehler = %e, "Ungueltiger Kandidat verworfen");
                return;
            }
        };

        let peer = self.aktuelle_verbindung();
        if self.zustand.phase() == Verhandlungsphase::Closed
            || peer.signal_zustand() == SignalZustand::Closed
        {
            tracing::debug!(peer = %from, "Sitzung geschlossen, Kandidat uebersprungen");
            return;
        }

        if let Err(e) = peer.add_ice_candidate(kandidat).await {
            tracing::warn!(peer = %from, fehler = %e, "Kandidat nicht anwendbar");
        }
    }

    /// Gegenueber hat den Raum verlassen
    async fn peer_verlassen(&self, peer_id: PeerId) -> Option<KanalEreignis> {
        let remote = self.sitzung.lock().remote;
        if remote != Some(peer_id) {
            tracing::debug!(peer = %peer_id, "Teilnehmer ohne Sitzung hat den Raum verlassen");
            return None;
        }
        tracing::info!(peer = %peer_id, "Gegenueber hat den Raum verlassen");

        match self.verbindung_ersetzen() {
            Ok(alte) => alte.close().await,
            Err(e) => {
                tracing::warn!(fehler = %e, "Neue Peer-Verbindung konnte nicht erstellt werden");
            }
        }

        self.zustand.zuruecksetzen();
        {
            let mut sitzung = self.sitzung.lock();
            sitzung.remote = None;
            sitzung.rolle = None;
        }
        self.status_setzen(Verbindungsstatus::Verbindet);
        Some(KanalEreignis::Geschlossen)
    }

    // -----------------------------------------------------------------------
    // Peer-Ereignisse
    // -----------------------------------------------------------------------

    /// Verarbeitet ein Ereignis der Peer-Verbindung
    pub async fn ereignis_verarbeiten(
        &self,
        generation: u64,
        ereignis: PeerEreignis,
    ) -> Option<KanalEreignis> {
        if generation != self.generation.load(Ordering::Acquire) {
            tracing::trace!(generation, ereignis = ?ereignis, "Ereignis einer alten Verbindung verworfen");
            return None;
        }

        match ereignis {
            PeerEreignis::LokalerKandidat(kandidat) => {
                let nachricht = ClientMessage::signal(
                    SignalArt::IceCandidate,
                    self.raum.clone(),
                    kandidat.als_wert(),
                );
                if let Err(e) = self.signal_senden(nachricht).await {
                    tracing::warn!(fehler = %e, "Kandidat nicht gesendet");
                }
                None
            }
            PeerEreignis::Transport(zustand) => {
                self.transport_geaendert(zustand);
                None
            }
            PeerEreignis::KanalGeoeffnet(kanal) => {
                tracing::info!("Sitzungskanal geoeffnet");
                Some(KanalEreignis::Geoeffnet(kanal))
            }
            PeerEreignis::KanalNachricht(text) => Some(KanalEreignis::Nachricht(text)),
            PeerEreignis::KanalGeschlossen => {
                tracing::info!("Sitzungskanal geschlossen");
                Some(KanalEreignis::Geschlossen)
            }
        }
    }

    fn transport_geaendert(&self, zustand: TransportZustand) {
        tracing::debug!(zustand = ?zustand, "Transportzustand geaendert");
        match zustand {
            TransportZustand::Connected => {
                self.zustand.transport_verbunden();
                self.status_setzen(Verbindungsstatus::Verbunden);
            }
            z if z.ist_getrennt() => {
                self.zustand.transport_getrennt();
                self.status_setzen(Verbindungsstatus::Getrennt);
            }
            _ => {}
        }
    }

    // -----------------------------------------------------------------------
    // Hilfsfunktionen
    // -----------------------------------------------------------------------

    fn aktuelle_verbindung(&self) -> Arc<dyn PeerConnection> {
        self.peer.read().clone()
    }

    /// Ersetzt die Peer-Verbindung und gibt die alte zurueck
    fn verbindung_ersetzen(&self) -> NegotiationResult<Arc<dyn PeerConnection>> {
        let generation = self.generation.load(Ordering::Acquire) + 1;
        let neue = self.fabrik.erstellen(
            &self.config.ice_server,
            EreignisSender::neu(generation, self.ereignis_tx.clone()),
        )?;
        self.generation.store(generation, Ordering::Release);
        let alte = std::mem::replace(&mut *self.peer.write(), neue);
        Ok(alte)
    }

    /// Die kleinere ID ist hoeflich; ohne eigene ID immer hoeflich
    fn ist_hoeflich_gegenueber(&self, remote: PeerId) -> bool {
        match self.sitzung.lock().eigene_id {
            Some(eigene) => eigene < remote,
            None => true,
        }
    }

    async fn signal_senden(&self, nachricht: ClientMessage) -> NegotiationResult<()> {
        let tx = self.signal_tx.read().clone();
        tx.send(nachricht)
            .await
            .map_err(|_| NegotiationError::RelayGetrennt("Signal-Queue geschlossen".into()))
    }

    fn status_setzen(&self, neu: Verbindungsstatus) {
        let geaendert = self.status_tx.send_if_modified(|status| {
            if *status == neu {
                false
            } else {
                *status = neu;
                true
            }
        });
        if geaendert {
            tracing::info!(raum = %self.raum, status = ?neu, "Verbindungsstatus geaendert");
        }
    }
}
