//! Peer-Verbindung auf Basis des `webrtc`-Crates
//!
//! Beide Seiten legen denselben ausgehandelten Datenkanal (`id` 0,
//! geordnet und zuverlaessig) an, bevor das erste Angebot entsteht. Die
//! eigentliche `RTCPeerConnection` wird erst beim ersten asynchronen Aufruf
//! aufgebaut, da die Fabrik synchron ist.
//!
//! Paketverlust und Jitter stammen aus RTP-Strecken; eine reine
//! Datenkanal-Sitzung meldet dafuer 0.

use async_trait::async_trait;
use duett_negotiation::{
    EreignisSender, IceServer, NegotiationError, NegotiationResult, PeerConnection,
    PeerConnectionFactory, PeerEreignis, SignalZustand, TransportZustand,
};
use duett_protocol::{
    IceCandidate, ProtocolError, ProtocolResult, SdpTyp, SessionChannel, SessionDescription,
    VerbindungsStatistik,
};
use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, OnceCell};
use tokio::time::Instant;
use webrtc::api::interceptor_registry::register_default_interceptors;
use webrtc::api::media_engine::MediaEngine;
use webrtc::api::{APIBuilder, API};
use webrtc::data_channel::data_channel_init::RTCDataChannelInit;
use webrtc::data_channel::data_channel_message::DataChannelMessage;
use webrtc::data_channel::RTCDataChannel;
use webrtc::ice_transport::ice_candidate::{RTCIceCandidate, RTCIceCandidateInit};
use webrtc::ice_transport::ice_server::RTCIceServer;
use webrtc::interceptor::registry::Registry;
use webrtc::peer_connection::configuration::RTCConfiguration;
use webrtc::peer_connection::peer_connection_state::RTCPeerConnectionState;
use webrtc::peer_connection::sdp::sdp_type::RTCSdpType;
use webrtc::peer_connection::sdp::session_description::RTCSessionDescription;
use webrtc::peer_connection::signaling_state::RTCSignalingState;
use webrtc::peer_connection::RTCPeerConnection;
use webrtc::stats::StatsReportType;

const KANAL_NAME: &str = "duett";
const KANAL_ID: u16 = 0;

fn plattform_fehler(e: webrtc::Error) -> NegotiationError {
    NegotiationError::peer(e.to_string())
}

// ---------------------------------------------------------------------------
// Fabrik
// ---------------------------------------------------------------------------

/// Erzeugt `webrtc`-Peer-Verbindungen mit gemeinsamer API-Instanz
pub struct WebRtcFabrik {
    api: Arc<API>,
}

impl WebRtcFabrik {
    pub fn neu() -> NegotiationResult<Self> {
        let mut medien = MediaEngine::default();
        let registry =
            register_default_interceptors(Registry::new(), &mut medien).map_err(plattform_fehler)?;
        let api = APIBuilder::new()
            .with_media_engine(medien)
            .with_interceptor_registry(registry)
            .build();
        Ok(Self { api: Arc::new(api) })
    }
}

impl PeerConnectionFactory for WebRtcFabrik {
    fn erstellen(
        &self,
        ice_server: &[IceServer],
        ereignisse: EreignisSender,
    ) -> NegotiationResult<Arc<dyn PeerConnection>> {
        tracing::debug!(generation = ereignisse.generation(), "Neue WebRTC-Verbindung");
        Ok(Arc::new(WebRtcPeer {
            api: Arc::clone(&self.api),
            ice_server: ice_server.iter().map(rtc_ice_server).collect(),
            ereignisse,
            pc: OnceCell::new(),
            geschlossen: AtomicBool::new(false),
            letzte_messung: Mutex::new(None),
        }))
    }
}

fn rtc_ice_server(server: &IceServer) -> RTCIceServer {
    RTCIceServer {
        urls: server.urls.clone(),
        username: server.username.clone().unwrap_or_default(),
        credential: server.credential.clone().unwrap_or_default(),
        ..Default::default()
    }
}

// ---------------------------------------------------------------------------
// Peer-Verbindung
// ---------------------------------------------------------------------------

pub struct WebRtcPeer {
    api: Arc<API>,
    ice_server: Vec<RTCIceServer>,
    ereignisse: EreignisSender,
    pc: OnceCell<Arc<RTCPeerConnection>>,
    geschlossen: AtomicBool,
    /// Byte-Stand und Zeitpunkt der letzten Statistik-Abfrage
    letzte_messung: Mutex<Option<(u64, Instant)>>,
}

impl WebRtcPeer {
    async fn verbindung(&self) -> NegotiationResult<&Arc<RTCPeerConnection>> {
        if self.geschlossen.load(Ordering::Acquire) {
            return Err(NegotiationError::Geschlossen);
        }
        self.pc.get_or_try_init(|| self.aufbauen()).await
    }

    async fn aufbauen(&self) -> NegotiationResult<Arc<RTCPeerConnection>> {
        let config = RTCConfiguration {
            ice_servers: self.ice_server.clone(),
            ..Default::default()
        };
        let pc = Arc::new(
            self.api
                .new_peer_connection(config)
                .await
                .map_err(plattform_fehler)?,
        );

        let ereignisse = self.ereignisse.clone();
        pc.on_ice_candidate(Box::new(move |kandidat: Option<RTCIceCandidate>| {
            let ereignisse = ereignisse.clone();
            Box::pin(async move {
                // `None` beendet die Kandidatensuche
                let Some(kandidat) = kandidat else { return };
                match kandidat.to_json() {
                    Ok(init) => {
                        ereignisse.senden(PeerEreignis::LokalerKandidat(aus_rtc_kandidat(init)));
                    }
                    Err(e) => tracing::warn!(fehler = %e, "Lokaler Kandidat nicht lesbar"),
                }
            })
        }));

        let ereignisse = self.ereignisse.clone();
        pc.on_peer_connection_state_change(Box::new(move |zustand: RTCPeerConnectionState| {
            let ereignisse = ereignisse.clone();
            Box::pin(async move {
                tracing::debug!(zustand = %zustand, "Transportzustand geaendert");
                ereignisse.senden(PeerEreignis::Transport(transport_zustand(zustand)));
            })
        }));

        let kanal = pc
            .create_data_channel(
                KANAL_NAME,
                Some(RTCDataChannelInit {
                    ordered: Some(true),
                    negotiated: Some(KANAL_ID),
                    ..Default::default()
                }),
            )
            .await
            .map_err(plattform_fehler)?;
        kanal_verdrahten(kanal, self.ereignisse.clone());

        tracing::info!(ice_server = self.ice_server.len(), "WebRTC-Verbindung aufgebaut");
        Ok(pc)
    }
}

#[async_trait]
impl PeerConnection for WebRtcPeer {
    fn signal_zustand(&self) -> SignalZustand {
        if self.geschlossen.load(Ordering::Acquire) {
            return SignalZustand::Closed;
        }
        self.pc
            .get()
            .map_or(SignalZustand::Stable, |pc| signal_zustand(pc.signaling_state()))
    }

    fn transport_zustand(&self) -> TransportZustand {
        if self.geschlossen.load(Ordering::Acquire) {
            return TransportZustand::Closed;
        }
        self.pc
            .get()
            .map_or(TransportZustand::New, |pc| transport_zustand(pc.connection_state()))
    }

    async fn create_offer(&self) -> NegotiationResult<SessionDescription> {
        let pc = self.verbindung().await?;
        let angebot = pc.create_offer(None).await.map_err(plattform_fehler)?;
        aus_rtc_beschreibung(angebot)
    }

    async fn create_answer(&self) -> NegotiationResult<SessionDescription> {
        let pc = self.verbindung().await?;
        let antwort = pc.create_answer(None).await.map_err(plattform_fehler)?;
        aus_rtc_beschreibung(antwort)
    }

    async fn set_local_description(&self, desc: SessionDescription) -> NegotiationResult<()> {
        let pc = self.verbindung().await?;
        pc.set_local_description(in_rtc_beschreibung(desc)?)
            .await
            .map_err(plattform_fehler)
    }

    async fn set_remote_description(&self, desc: SessionDescription) -> NegotiationResult<()> {
        let pc = self.verbindung().await?;
        pc.set_remote_description(in_rtc_beschreibung(desc)?)
            .await
            .map_err(plattform_fehler)
    }

    async fn add_ice_candidate(&self, kandidat: IceCandidate) -> NegotiationResult<()> {
        let pc = self.verbindung().await?;
        pc.add_ice_candidate(RTCIceCandidateInit {
            candidate: kandidat.candidate,
            sdp_mid: kandidat.sdp_mid,
            sdp_mline_index: kandidat.sdp_m_line_index,
            username_fragment: kandidat.username_fragment,
        })
        .await
        .map_err(plattform_fehler)
    }

    async fn statistiken(&self) -> NegotiationResult<Option<VerbindungsStatistik>> {
        let Some(pc) = self.pc.get() else {
            return Ok(None);
        };
        let bericht = pc.get_stats().await;
        let paar = bericht.reports.values().find_map(|eintrag| match eintrag {
            StatsReportType::CandidatePair(paar) if paar.nominated => Some(paar),
            _ => None,
        });
        let Some(paar) = paar else {
            return Ok(None);
        };

        let bytes = paar.bytes_sent.saturating_add(paar.bytes_received);
        let jetzt = Instant::now();
        let bitrate = {
            let mut letzte = self.letzte_messung.lock();
            let rate = match *letzte {
                Some((vorher, zeitpunkt)) => {
                    bitrate_kbps(bytes.saturating_sub(vorher), jetzt - zeitpunkt)
                }
                None => 0,
            };
            *letzte = Some((bytes, jetzt));
            rate
        };

        Ok(Some(VerbindungsStatistik {
            bitrate,
            packets_lost: 0,
            jitter: 0,
            rtt: sekunden_in_ms(paar.current_round_trip_time),
        }))
    }

    async fn close(&self) {
        self.geschlossen.store(true, Ordering::Release);
        if let Some(pc) = self.pc.get() {
            if let Err(e) = pc.close().await {
                tracing::debug!(fehler = %e, "Schliessen der WebRTC-Verbindung fehlgeschlagen");
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Datenkanal
// ---------------------------------------------------------------------------

fn kanal_verdrahten(kanal: Arc<RTCDataChannel>, ereignisse: EreignisSender) {
    let offen = Arc::new(AtomicBool::new(false));

    let beim_oeffnen = Arc::clone(&kanal);
    let ereignisse_oeffnen = ereignisse.clone();
    let offen_oeffnen = Arc::clone(&offen);
    kanal.on_open(Box::new(move || {
        Box::pin(async move {
            tracing::info!(kanal = KANAL_NAME, "Datenkanal geoeffnet");
            offen_oeffnen.store(true, Ordering::Release);
            let sitzungskanal = WebRtcKanal::starten(beim_oeffnen, offen_oeffnen);
            ereignisse_oeffnen.senden(PeerEreignis::KanalGeoeffnet(Arc::new(sitzungskanal)));
        })
    }));

    let ereignisse_nachricht = ereignisse.clone();
    kanal.on_message(Box::new(move |nachricht: DataChannelMessage| {
        let ereignisse = ereignisse_nachricht.clone();
        Box::pin(async move {
            if !nachricht.is_string {
                tracing::debug!(laenge = nachricht.data.len(), "Binaere Kanalnachricht verworfen");
                return;
            }
            match String::from_utf8(nachricht.data.to_vec()) {
                Ok(text) => {
                    ereignisse.senden(PeerEreignis::KanalNachricht(text));
                }
                Err(e) => tracing::warn!(fehler = %e, "Kanalnachricht ist kein UTF-8"),
            }
        })
    }));

    kanal.on_close(Box::new(move || {
        let ereignisse = ereignisse.clone();
        let offen = Arc::clone(&offen);
        Box::pin(async move {
            tracing::info!(kanal = KANAL_NAME, "Datenkanal geschlossen");
            offen.store(false, Ordering::Release);
            ereignisse.senden(PeerEreignis::KanalGeschlossen);
        })
    }));
}

/// Sendeseite des Datenkanals
///
/// `senden` reiht nur ein; ein eigener Task schreibt in Einreihungsreihenfolge.
struct WebRtcKanal {
    tx: mpsc::UnboundedSender<String>,
    offen: Arc<AtomicBool>,
}

impl WebRtcKanal {
    fn starten(kanal: Arc<RTCDataChannel>, offen: Arc<AtomicBool>) -> Self {
        let (tx, mut rx) = mpsc::unbounded_channel::<String>();
        let offen_schreiber = Arc::clone(&offen);
        tokio::spawn(async move {
            while let Some(text) = rx.recv().await {
                if let Err(e) = kanal.send_text(text).await {
                    tracing::warn!(fehler = %e, "Senden auf dem Datenkanal fehlgeschlagen");
                    offen_schreiber.store(false, Ordering::Release);
                    break;
                }
            }
        });
        Self { tx, offen }
    }
}

impl SessionChannel for WebRtcKanal {
    fn ist_offen(&self) -> bool {
        self.offen.load(Ordering::Acquire) && !self.tx.is_closed()
    }

    fn senden(&self, text: String) -> ProtocolResult<()> {
        if !self.ist_offen() {
            return Err(ProtocolError::KanalGeschlossen);
        }
        self.tx.send(text).map_err(|_| ProtocolError::KanalGeschlossen)
    }
}

// ---------------------------------------------------------------------------
// Umwandlungen
// ---------------------------------------------------------------------------

fn signal_zustand(zustand: RTCSignalingState) -> SignalZustand {
    match zustand {
        RTCSignalingState::HaveLocalOffer | RTCSignalingState::HaveRemotePranswer => {
            SignalZustand::HaveLocalOffer
        }
        RTCSignalingState::HaveRemoteOffer | RTCSignalingState::HaveLocalPranswer => {
            SignalZustand::HaveRemoteOffer
        }
        RTCSignalingState::Closed => SignalZustand::Closed,
        RTCSignalingState::Stable | RTCSignalingState::Unspecified => SignalZustand::Stable,
    }
}

fn transport_zustand(zustand: RTCPeerConnectionState) -> TransportZustand {
    match zustand {
        RTCPeerConnectionState::Connecting => TransportZustand::Connecting,
        RTCPeerConnectionState::Connected => TransportZustand::Connected,
        RTCPeerConnectionState::Disconnected => TransportZustand::Disconnected,
        RTCPeerConnectionState::Failed => TransportZustand::Failed,
        RTCPeerConnectionState::Closed => TransportZustand::Closed,
        RTCPeerConnectionState::New | RTCPeerConnectionState::Unspecified => TransportZustand::New,
    }
}

fn in_rtc_beschreibung(desc: SessionDescription) -> NegotiationResult<RTCSessionDescription> {
    let beschreibung = match desc.typ {
        SdpTyp::Offer => RTCSessionDescription::offer(desc.sdp),
        SdpTyp::Answer => RTCSessionDescription::answer(desc.sdp),
        SdpTyp::Pranswer => RTCSessionDescription::pranswer(desc.sdp),
        SdpTyp::Rollback => {
            let mut rollback = RTCSessionDescription::default();
            rollback.sdp_type = RTCSdpType::Rollback;
            return Ok(rollback);
        }
    };
    beschreibung.map_err(plattform_fehler)
}

fn aus_rtc_beschreibung(desc: RTCSessionDescription) -> NegotiationResult<SessionDescription> {
    let typ = match desc.sdp_type {
        RTCSdpType::Offer => SdpTyp::Offer,
        RTCSdpType::Answer => SdpTyp::Answer,
        RTCSdpType::Pranswer => SdpTyp::Pranswer,
        RTCSdpType::Rollback => SdpTyp::Rollback,
        RTCSdpType::Unspecified => {
            return Err(NegotiationError::peer("Sitzungsbeschreibung ohne Typ"))
        }
    };
    Ok(SessionDescription { typ, sdp: desc.sdp })
}

fn aus_rtc_kandidat(init: RTCIceCandidateInit) -> IceCandidate {
    IceCandidate {
        candidate: init.candidate,
        sdp_mid: init.sdp_mid,
        sdp_m_line_index: init.sdp_mline_index,
        username_fragment: init.username_fragment,
    }
}

fn bitrate_kbps(bytes: u64, dauer: Duration) -> u64 {
    let sekunden = dauer.as_secs_f64();
    if sekunden <= 0.0 {
        return 0;
    }
    (bytes as f64 * 8.0 / 1000.0 / sekunden).round() as u64
}

fn sekunden_in_ms(sekunden: f64) -> u64 {
    (sekunden * 1000.0).round().max(0.0) as u64
}
