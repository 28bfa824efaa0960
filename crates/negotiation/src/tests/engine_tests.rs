//! Tests fuer die NegotiationEngine

use duett_core::types::{PeerId, RoomId};
use duett_protocol::{
    ClientMessage, IceCandidate, SdpTyp, ServerMessage, SessionDescription, SignalArt,
    VerbindungsStatistik,
};
use std::sync::Arc;
use tokio::sync::mpsc;

use super::fake_peer::FakeFabrik;
use crate::{
    GlareStrategie, KanalEreignis, NegotiationConfig, NegotiationEngine, PeerEreignis, Rolle,
    SignalZustand, TransportZustand, Verbindungsstatus, Verhandlungsphase,
};

struct Aufbau {
    engine: Arc<NegotiationEngine>,
    fabrik: Arc<FakeFabrik>,
    signale: mpsc::Receiver<ClientMessage>,
    ereignisse: mpsc::UnboundedReceiver<(u64, PeerEreignis)>,
}

fn aufbau(glare: GlareStrategie) -> Aufbau {
    let fabrik = Arc::new(FakeFabrik::default());
    let (signal_tx, signale) = mpsc::channel(64);
    let config = NegotiationConfig {
        glare,
        ..NegotiationConfig::default()
    };
    let (engine, ereignisse) = NegotiationEngine::neu(
        RoomId::from("abc123"),
        config,
        fabrik.clone(),
        signal_tx,
    )
    .expect("Engine muss erstellt werden");
    Aufbau {
        engine,
        fabrik,
        signale,
        ereignisse,
    }
}

/// Zwei IDs mit fester Ordnung: (kleiner, groesser)
fn geordnete_ids() -> (PeerId, PeerId) {
    let mut ids = [PeerId::new(), PeerId::new()];
    ids.sort();
    (ids[0], ids[1])
}

/// Macht aus einer gesendeten Sitzungsnachricht die weitergeleitete Form
fn weiterleiten(nachricht: ClientMessage, from: PeerId) -> ServerMessage {
    let (art, raum, inhalt) = nachricht
        .in_signal()
        .expect("Sitzungsnachricht muss vorhanden sein");
    assert_eq!(raum, RoomId::from("abc123"));
    ServerMessage::signal(art, inhalt, from)
}

fn angebot_wert(sdp: &str) -> serde_json::Value {
    SessionDescription::offer(sdp).als_wert()
}

fn signal_art(nachricht: &ClientMessage) -> Option<SignalArt> {
    nachricht.clone().in_signal().map(|(art, _, _)| art)
}

// ---------------------------------------------------------------------------
// Beitritt und Angebote
// ---------------------------------------------------------------------------

#[tokio::test]
async fn beitreten_sendet_join_und_setzt_verbindet() {
    let mut a = aufbau(GlareStrategie::default());
    assert_eq!(a.engine.aktueller_status(), Verbindungsstatus::Getrennt);

    a.engine.beitreten().await.expect("Beitritt muss gesendet werden");

    assert_eq!(
        a.signale.try_recv().expect("join-room muss gesendet sein"),
        ClientMessage::JoinRoom {
            room_id: RoomId::from("abc123")
        }
    );
    assert_eq!(a.engine.aktueller_status(), Verbindungsstatus::Verbindet);
    assert!(!a.engine.ist_verbunden());
}

#[tokio::test]
async fn leerer_raum_erzeugt_kein_angebot() {
    let mut a = aufbau(GlareStrategie::default());
    let ergebnis = a
        .engine
        .signal_verarbeiten(ServerMessage::ExistingUsers { peers: vec![] })
        .await;

    assert!(ergebnis.is_none());
    assert!(a.signale.try_recv().is_err());
    assert_eq!(a.engine.phase(), Verhandlungsphase::Idle);
    assert_eq!(a.engine.signal_zustand(), SignalZustand::Stable);
}

#[tokio::test]
async fn existing_users_startet_angebot() {
    let mut a = aufbau(GlareStrategie::default());
    let anderer = PeerId::new();
    a.engine
        .signal_verarbeiten(ServerMessage::ExistingUsers {
            peers: vec![anderer],
        })
        .await;

    let gesendet = a.signale.try_recv().expect("Angebot muss gesendet sein");
    assert_eq!(signal_art(&gesendet), Some(SignalArt::Offer));
    assert_eq!(a.engine.remote_peer(), Some(anderer));
}

#[tokio::test]
async fn user_joined_startet_angebot_und_gibt_sperre_frei() {
    let mut a = aufbau(GlareStrategie::default());
    let b = PeerId::new();
    a.engine
        .signal_verarbeiten(ServerMessage::UserJoined { peer: b })
        .await;

    let gesendet = a.signale.try_recv().expect("Angebot muss gesendet sein");
    let (art, _, inhalt) = gesendet.in_signal().expect("Sitzungsnachricht erwartet");
    assert_eq!(art, SignalArt::Offer);
    let angebot = SessionDescription::aus_wert(inhalt).expect("Angebot muss lesbar sein");
    assert_eq!(angebot.typ, SdpTyp::Offer);

    let peer = a.fabrik.letzte();
    assert_eq!(peer.lokal(), Some(angebot));
    assert_eq!(a.engine.signal_zustand(), SignalZustand::HaveLocalOffer);
    assert_eq!(a.engine.phase(), Verhandlungsphase::Idle);
    assert_eq!(a.engine.rolle(), Some(Rolle::Initiator));
    assert_eq!(a.engine.remote_peer(), Some(b));
}

#[tokio::test]
async fn fehlgeschlagenes_angebot_gibt_sperre_frei() {
    let mut a = aufbau(GlareStrategie::default());
    let b = PeerId::new();
    a.fabrik.letzte().offer_fehlschlagen(true);

    a.engine
        .signal_verarbeiten(ServerMessage::UserJoined { peer: b })
        .await;
    assert!(a.signale.try_recv().is_err());
    assert_eq!(a.engine.phase(), Verhandlungsphase::Idle);
    assert_eq!(a.engine.signal_zustand(), SignalZustand::Stable);

    // Naechster Ausloeser versucht es erneut
    a.fabrik.letzte().offer_fehlschlagen(false);
    a.engine
        .signal_verarbeiten(ServerMessage::UserJoined { peer: b })
        .await;
    let gesendet = a.signale.try_recv().expect("zweiter Versuch muss senden");
    assert_eq!(signal_art(&gesendet), Some(SignalArt::Offer));
}

#[tokio::test]
async fn kein_angebot_ausserhalb_von_stable() {
    let mut a = aufbau(GlareStrategie::default());
    a.engine
        .signal_verarbeiten(ServerMessage::UserJoined {
            peer: PeerId::new(),
        })
        .await;
    let _ = a.signale.try_recv();

    // have-local-offer: zweites user-joined bleibt folgenlos
    a.engine
        .signal_verarbeiten(ServerMessage::UserJoined {
            peer: PeerId::new(),
        })
        .await;
    assert!(a.signale.try_recv().is_err());
    assert_eq!(a.engine.phase(), Verhandlungsphase::Idle);
}

#[tokio::test]
async fn angebot_waehrend_verhandlung_wird_verworfen() {
    let mut a = aufbau(GlareStrategie::Uebernehmen);
    let b = PeerId::new();
    let tor = a.fabrik.letzte().offer_anhalten();

    let engine = a.engine.clone();
    let laufend = tokio::spawn(async move {
        engine
            .signal_verarbeiten(ServerMessage::UserJoined { peer: b })
            .await
    });

    while a.engine.phase() != Verhandlungsphase::Negotiating {
        tokio::task::yield_now().await;
    }

    a.engine
        .signal_verarbeiten(ServerMessage::Offer {
            offer: angebot_wert("v=0 fremd"),
            from: b,
        })
        .await;
    assert!(a.fabrik.letzte().remote().is_none());
    assert!(a.signale.try_recv().is_err());

    tor.notify_one();
    laufend.await.expect("Aushandlung darf nicht paniken");
    let gesendet = a.signale.try_recv().expect("eigenes Angebot muss gesendet sein");
    assert_eq!(signal_art(&gesendet), Some(SignalArt::Offer));
    assert_eq!(a.engine.phase(), Verhandlungsphase::Idle);
}

// ---------------------------------------------------------------------------
// Angebot und Antwort empfangen
// ---------------------------------------------------------------------------

#[tokio::test]
async fn angebot_wird_beantwortet() {
    let mut a = aufbau(GlareStrategie::default());
    let b = PeerId::new();
    a.engine
        .signal_verarbeiten(ServerMessage::Offer {
            offer: angebot_wert("v=0 von-b"),
            from: b,
        })
        .await;

    let gesendet = a.signale.try_recv().expect("Antwort muss gesendet sein");
    let (art, _, inhalt) = gesendet.in_signal().expect("Sitzungsnachricht erwartet");
    assert_eq!(art, SignalArt::Answer);
    assert_eq!(
        SessionDescription::aus_wert(inhalt).unwrap().typ,
        SdpTyp::Answer
    );
    assert_eq!(
        a.fabrik.letzte().remote(),
        Some(SessionDescription::offer("v=0 von-b"))
    );
    assert_eq!(a.engine.signal_zustand(), SignalZustand::Stable);
    assert_eq!(a.engine.rolle(), Some(Rolle::Responder));
    assert_eq!(a.engine.phase(), Verhandlungsphase::Idle);
}

#[tokio::test]
async fn ungueltiges_angebot_wird_verworfen() {
    let mut a = aufbau(GlareStrategie::default());
    a.engine
        .signal_verarbeiten(ServerMessage::Offer {
            offer: serde_json::json!({"kaputt": true}),
            from: PeerId::new(),
        })
        .await;
    assert!(a.signale.try_recv().is_err());
    assert_eq!(a.engine.phase(), Verhandlungsphase::Idle);
}

#[tokio::test]
async fn antwort_ausserhalb_von_have_local_offer_wird_ignoriert() {
    let a = aufbau(GlareStrategie::default());
    a.engine
        .signal_verarbeiten(ServerMessage::Answer {
            answer: SessionDescription::answer("v=0 spaet").als_wert(),
            from: PeerId::new(),
        })
        .await;

    assert!(a.fabrik.letzte().remote().is_none());
    assert_eq!(a.engine.signal_zustand(), SignalZustand::Stable);
}

#[tokio::test]
async fn antwort_in_have_local_offer_wird_angewendet() {
    let mut a = aufbau(GlareStrategie::default());
    let b = PeerId::new();
    a.engine
        .signal_verarbeiten(ServerMessage::UserJoined { peer: b })
        .await;
    let _ = a.signale.try_recv();

    a.engine
        .signal_verarbeiten(ServerMessage::Answer {
            answer: SessionDescription::answer("v=0 von-b").als_wert(),
            from: b,
        })
        .await;
    assert_eq!(a.engine.signal_zustand(), SignalZustand::Stable);
    assert_eq!(
        a.fabrik.letzte().remote(),
        Some(SessionDescription::answer("v=0 von-b"))
    );
}

// ---------------------------------------------------------------------------
// Kandidaten
// ---------------------------------------------------------------------------

#[tokio::test]
async fn kandidat_wird_angewendet() {
    let a = aufbau(GlareStrategie::default());
    let kandidat = IceCandidate::neu("candidate:1 1 udp 2122260223 192.168.1.2 54321 typ host");
    a.engine
        .signal_verarbeiten(ServerMessage::IceCandidate {
            candidate: kandidat.als_wert(),
            from: PeerId::new(),
        })
        .await;
    assert_eq!(a.fabrik.letzte().kandidaten(), vec![kandidat]);
}

#[tokio::test]
async fn kandidat_nach_schliessen_wird_uebersprungen() {
    let mut a = aufbau(GlareStrategie::default());
    a.engine.schliessen().await;
    assert_eq!(a.signale.try_recv().unwrap(), ClientMessage::LeaveRoom);
    assert_eq!(a.engine.phase(), Verhandlungsphase::Closed);

    a.engine
        .signal_verarbeiten(ServerMessage::IceCandidate {
            candidate: IceCandidate::neu("candidate:spaet").als_wert(),
            from: PeerId::new(),
        })
        .await;
    assert!(a.fabrik.letzte().kandidaten().is_empty());

    // Geschlossen: keine neuen Angebote
    a.engine
        .signal_verarbeiten(ServerMessage::UserJoined {
            peer: PeerId::new(),
        })
        .await;
    assert!(a.signale.try_recv().is_err());
}

#[tokio::test]
async fn lokaler_kandidat_wird_ans_relay_gesendet() {
    let mut a = aufbau(GlareStrategie::default());
    let kandidat = IceCandidate::neu("candidate:lokal");
    a.fabrik
        .letzte()
        .ereignis(PeerEreignis::LokalerKandidat(kandidat.clone()));

    let (generation, ereignis) = a.ereignisse.recv().await.expect("Ereignis erwartet");
    assert!(a.engine.ereignis_verarbeiten(generation, ereignis).await.is_none());

    let gesendet = a.signale.try_recv().expect("Kandidat muss gesendet sein");
    let (art, _, inhalt) = gesendet.in_signal().unwrap();
    assert_eq!(art, SignalArt::IceCandidate);
    assert_eq!(IceCandidate::aus_wert(inhalt).unwrap(), kandidat);
}

// ---------------------------------------------------------------------------
// Glare
// ---------------------------------------------------------------------------

/// Bringt die Engine mit eigener ID `eigene` in have-local-offer gegenueber `remote`
async fn eigenes_angebot_ausstehend(a: &mut Aufbau, eigene: PeerId, remote: PeerId) {
    a.engine
        .signal_verarbeiten(ServerMessage::IdAssigned { peer: eigene })
        .await;
    a.engine
        .signal_verarbeiten(ServerMessage::UserJoined { peer: remote })
        .await;
    let gesendet = a.signale.try_recv().expect("eigenes Angebot erwartet");
    assert_eq!(signal_art(&gesendet), Some(SignalArt::Offer));
    assert_eq!(a.engine.signal_zustand(), SignalZustand::HaveLocalOffer);
}

#[tokio::test]
async fn glare_hoeflicher_peer_nimmt_eigenes_angebot_zurueck() {
    let (klein, gross) = geordnete_ids();
    let mut a = aufbau(GlareStrategie::HoeflicherPeer);
    eigenes_angebot_ausstehend(&mut a, klein, gross).await;

    a.engine
        .signal_verarbeiten(ServerMessage::Offer {
            offer: angebot_wert("v=0 von-gross"),
            from: gross,
        })
        .await;

    assert_eq!(a.fabrik.letzte().rollbacks(), 1);
    let gesendet = a.signale.try_recv().expect("Antwort erwartet");
    assert_eq!(signal_art(&gesendet), Some(SignalArt::Answer));
    assert_eq!(a.engine.signal_zustand(), SignalZustand::Stable);
    assert_eq!(a.engine.rolle(), Some(Rolle::Responder));
}

#[tokio::test]
async fn glare_unhoeflicher_peer_ignoriert_fremdes_angebot() {
    let (klein, gross) = geordnete_ids();
    let mut a = aufbau(GlareStrategie::HoeflicherPeer);
    eigenes_angebot_ausstehend(&mut a, gross, klein).await;

    a.engine
        .signal_verarbeiten(ServerMessage::Offer {
            offer: angebot_wert("v=0 von-klein"),
            from: klein,
        })
        .await;

    assert!(a.signale.try_recv().is_err());
    assert_eq!(a.fabrik.letzte().rollbacks(), 0);
    assert!(a.fabrik.letzte().remote().is_none());
    assert_eq!(a.engine.signal_zustand(), SignalZustand::HaveLocalOffer);
    assert_eq!(a.engine.rolle(), Some(Rolle::Initiator));
    assert_eq!(a.engine.phase(), Verhandlungsphase::Idle);
}

#[tokio::test]
async fn glare_uebernehmen_beantwortet_immer() {
    let (klein, gross) = geordnete_ids();
    let mut a = aufbau(GlareStrategie::Uebernehmen);
    eigenes_angebot_ausstehend(&mut a, gross, klein).await;

    a.engine
        .signal_verarbeiten(ServerMessage::Offer {
            offer: angebot_wert("v=0 von-klein"),
            from: klein,
        })
        .await;

    let gesendet = a.signale.try_recv().expect("Antwort erwartet");
    assert_eq!(signal_art(&gesendet), Some(SignalArt::Answer));
    assert_eq!(a.engine.signal_zustand(), SignalZustand::Stable);
}

// ---------------------------------------------------------------------------
// Peer verlaesst den Raum, Transport, Neuinitialisierung
// ---------------------------------------------------------------------------

#[tokio::test]
async fn peer_verlassen_ersetzt_verbindung() {
    let mut a = aufbau(GlareStrategie::default());
    let b = PeerId::new();
    a.engine
        .signal_verarbeiten(ServerMessage::UserJoined { peer: b })
        .await;
    let _ = a.signale.try_recv();

    // Fremder Teilnehmer ohne Sitzung
    let ergebnis = a
        .engine
        .signal_verarbeiten(ServerMessage::UserLeft {
            peer: PeerId::new(),
        })
        .await;
    assert!(ergebnis.is_none());
    assert_eq!(a.fabrik.anzahl(), 1);

    let ergebnis = a
        .engine
        .signal_verarbeiten(ServerMessage::UserLeft { peer: b })
        .await;
    assert!(matches!(ergebnis, Some(KanalEreignis::Geschlossen)));
    assert_eq!(a.fabrik.anzahl(), 2);
    assert_eq!(crate::PeerConnection::signal_zustand(a.fabrik.nummer(0).as_ref()), SignalZustand::Closed);
    assert_eq!(a.engine.signal_zustand(), SignalZustand::Stable);
    assert_eq!(a.engine.remote_peer(), None);
    assert_eq!(a.engine.aktueller_status(), Verbindungsstatus::Verbindet);

    // Ereignisse der alten Verbindung zaehlen nicht mehr
    a.fabrik
        .nummer(0)
        .ereignis(PeerEreignis::Transport(TransportZustand::Connected));
    let (generation, ereignis) = a.ereignisse.recv().await.unwrap();
    assert_eq!(generation, 0);
    assert!(a.engine.ereignis_verarbeiten(generation, ereignis).await.is_none());
    assert!(!a.engine.ist_verbunden());

    // Naechster Teilnehmer wird mit der neuen Verbindung verhandelt
    a.engine
        .signal_verarbeiten(ServerMessage::UserJoined {
            peer: PeerId::new(),
        })
        .await;
    assert!(a.signale.try_recv().is_ok());
    assert!(a.fabrik.letzte().lokal().is_some());
}

#[tokio::test]
async fn transportzustand_steuert_status() {
    let mut a = aufbau(GlareStrategie::default());
    let mut status = a.engine.status();
    let peer = a.fabrik.letzte();

    peer.ereignis(PeerEreignis::Transport(TransportZustand::Connected));
    let (g, e) = a.ereignisse.recv().await.unwrap();
    a.engine.ereignis_verarbeiten(g, e).await;
    assert!(a.engine.ist_verbunden());
    assert_eq!(a.engine.phase(), Verhandlungsphase::Established);
    assert!(status.has_changed().unwrap());
    assert_eq!(*status.borrow_and_update(), Verbindungsstatus::Verbunden);

    peer.ereignis(PeerEreignis::Transport(TransportZustand::Disconnected));
    let (g, e) = a.ereignisse.recv().await.unwrap();
    a.engine.ereignis_verarbeiten(g, e).await;
    assert_eq!(a.engine.aktueller_status(), Verbindungsstatus::Getrennt);
    assert_eq!(a.engine.phase(), Verhandlungsphase::Idle);
}

#[tokio::test]
async fn kanal_ereignisse_werden_durchgereicht() {
    let mut a = aufbau(GlareStrategie::default());
    let peer = a.fabrik.letzte();

    peer.ereignis(PeerEreignis::KanalNachricht("{\"kind\":\"chat\"}".into()));
    let (g, e) = a.ereignisse.recv().await.unwrap();
    match a.engine.ereignis_verarbeiten(g, e).await {
        Some(KanalEreignis::Nachricht(text)) => assert_eq!(text, "{\"kind\":\"chat\"}"),
        anderes => panic!("Nachricht erwartet, erhalten: {anderes:?}"),
    }

    peer.ereignis(PeerEreignis::KanalGeschlossen);
    let (g, e) = a.ereignisse.recv().await.unwrap();
    assert!(matches!(
        a.engine.ereignis_verarbeiten(g, e).await,
        Some(KanalEreignis::Geschlossen)
    ));
}

#[tokio::test]
async fn neuinitialisierung_tritt_erneut_bei() {
    let mut a = aufbau(GlareStrategie::default());
    a.engine
        .signal_verarbeiten(ServerMessage::IdAssigned {
            peer: PeerId::new(),
        })
        .await;
    a.engine
        .signal_verarbeiten(ServerMessage::UserJoined {
            peer: PeerId::new(),
        })
        .await;
    a.engine.als_getrennt_markieren();

    let (neuer_tx, mut neue_signale) = mpsc::channel(8);
    a.engine
        .neu_initialisieren(neuer_tx)
        .await
        .expect("Neuinitialisierung muss gelingen");

    assert_eq!(
        neue_signale.try_recv().unwrap(),
        ClientMessage::JoinRoom {
            room_id: RoomId::from("abc123")
        }
    );
    // Alte Queue bekommt nichts mehr
    let _ = a.signale.try_recv();
    assert!(a.signale.try_recv().is_err());

    assert_eq!(a.fabrik.anzahl(), 2);
    assert_eq!(a.engine.eigene_id(), None);
    assert_eq!(a.engine.remote_peer(), None);
    assert_eq!(a.engine.signal_zustand(), SignalZustand::Stable);
    assert_eq!(a.engine.aktueller_status(), Verbindungsstatus::Verbindet);
}

// ---------------------------------------------------------------------------
// Zwei Engines
// ---------------------------------------------------------------------------

#[tokio::test]
async fn zwei_engines_handeln_sitzung_aus() {
    let (id_a, id_b) = geordnete_ids();
    let mut a = aufbau(GlareStrategie::HoeflicherPeer);
    let mut b = aufbau(GlareStrategie::HoeflicherPeer);

    // A betritt den leeren Raum
    a.engine.signal_verarbeiten(ServerMessage::IdAssigned { peer: id_a }).await;
    a.engine
        .signal_verarbeiten(ServerMessage::ExistingUsers { peers: vec![] })
        .await;

    // B kommt dazu: B sieht A, A sieht B; beide bieten an
    b.engine.signal_verarbeiten(ServerMessage::IdAssigned { peer: id_b }).await;
    b.engine
        .signal_verarbeiten(ServerMessage::ExistingUsers { peers: vec![id_a] })
        .await;
    a.engine
        .signal_verarbeiten(ServerMessage::UserJoined { peer: id_b })
        .await;
    let angebot_b = b.signale.try_recv().expect("B bietet an");
    let angebot_a = a.signale.try_recv().expect("A bietet an");

    // A (kleinere ID) ist hoeflich und beantwortet B
    a.engine.signal_verarbeiten(weiterleiten(angebot_b, id_b)).await;
    // B ignoriert das Angebot von A
    b.engine.signal_verarbeiten(weiterleiten(angebot_a, id_a)).await;
    assert!(b.signale.try_recv().is_err());

    let antwort_a = a.signale.try_recv().expect("A antwortet");
    assert_eq!(signal_art(&antwort_a), Some(SignalArt::Answer));
    b.engine.signal_verarbeiten(weiterleiten(antwort_a, id_a)).await;

    assert_eq!(a.engine.signal_zustand(), SignalZustand::Stable);
    assert_eq!(b.engine.signal_zustand(), SignalZustand::Stable);
    assert_eq!(a.engine.rolle(), Some(Rolle::Responder));
    assert_eq!(b.engine.rolle(), Some(Rolle::Initiator));

    // Kandidatenaustausch
    a.fabrik
        .letzte()
        .ereignis(PeerEreignis::LokalerKandidat(IceCandidate::neu("candidate:a")));
    let (g, e) = a.ereignisse.recv().await.unwrap();
    a.engine.ereignis_verarbeiten(g, e).await;
    let kandidat_a = a.signale.try_recv().expect("Kandidat von A");
    b.engine.signal_verarbeiten(weiterleiten(kandidat_a, id_a)).await;
    assert_eq!(
        b.fabrik.letzte().kandidaten(),
        vec![IceCandidate::neu("candidate:a")]
    );

    // Beide melden verbunden
    for seite in [&mut a, &mut b] {
        seite
            .fabrik
            .letzte()
            .ereignis(PeerEreignis::Transport(TransportZustand::Connected));
        let (g, e) = seite.ereignisse.recv().await.unwrap();
        seite.engine.ereignis_verarbeiten(g, e).await;
        assert!(seite.engine.ist_verbunden());
        assert_eq!(seite.engine.phase(), Verhandlungsphase::Established);
    }
}

#[tokio::test]
async fn statistiken_nur_bei_bestehender_verbindung() {
    let mut a = aufbau(GlareStrategie::default());
    let peer = a.fabrik.letzte();
    let statistik = VerbindungsStatistik {
        bitrate: 800,
        packets_lost: 0,
        jitter: 4,
        rtt: 25,
    };
    peer.statistik_setzen(statistik);
    assert_eq!(a.engine.statistiken().await, None);

    peer.ereignis(PeerEreignis::Transport(TransportZustand::Connected));
    let (g, e) = a.ereignisse.recv().await.unwrap();
    a.engine.ereignis_verarbeiten(g, e).await;
    assert_eq!(a.engine.statistiken().await, Some(statistik));
}
