//! Sitzungs-Ereignisschleife
//!
//! Ein Task pro Sitzung verarbeitet nacheinander:
//! - Nachrichten vom Relay (an die Engine)
//! - Ereignisse der Peer-Verbindung (an Engine, dann an die Zeichenflaeche)
//! - den Liveness-Takt (Neuinitialisierung bei Verbindungsverlust)
//! - den Emoji-Takt (Ablauf alter Emojis)
//! - den Statistik-Takt (Verbindungsstatistik an Store und Metriken)
//! - das Shutdown-Signal
//!
//! Beim Beenden wird die Verhandlung geschlossen, `leave-room` gesendet
//! und der Sitzungskanal geloest; alle Takte enden mit dem Task.
//!
//! Ist `metriken_port` gesetzt, laeuft neben der Schleife ein
//! Observability-Server; `/health` meldet dort, ob das Relay erreichbar ist.

use anyhow::Context;
use duett_canvas::{geteilt, jetzt_ms, CanvasSession, CanvasStore};
use duett_core::types::RoomId;
use duett_negotiation::{
    ImmerErreichbar, KanalEreignis, LivenessEntscheidung, LivenessMonitor, NegotiationEngine,
    NetzwerkStatus, PeerConnectionFactory, PeerEreignis, SignalingClient, Verbindungsstatus,
};
use duett_observability::{DuettMetrics, HealthState};
use duett_protocol::ServerMessage;
use std::sync::Arc;
use tokio::sync::{mpsc, watch, Mutex as AsyncMutex};
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant, MissedTickBehavior};

use crate::config::ClientConfig;

/// Griff auf eine laufende Sitzung
pub struct SitzungsHandle {
    engine: Arc<NegotiationEngine>,
    canvas: Arc<CanvasSession>,
    liveness: Arc<LivenessMonitor>,
    metriken: DuettMetrics,
    shutdown_tx: watch::Sender<bool>,
    task: AsyncMutex<Option<JoinHandle<()>>>,
}

impl SitzungsHandle {
    /// Zeichenflaeche fuer lokale Befehle
    pub fn canvas(&self) -> &Arc<CanvasSession> {
        &self.canvas
    }

    pub fn engine(&self) -> &Arc<NegotiationEngine> {
        &self.engine
    }

    /// Metriken der Sitzung, u.a. die Gauges der Verbindungsstatistik
    pub fn metriken(&self) -> &DuettMetrics {
        &self.metriken
    }

    pub fn status(&self) -> watch::Receiver<Verbindungsstatus> {
        self.engine.status()
    }

    pub fn ist_verbunden(&self) -> bool {
        self.engine.ist_verbunden()
    }

    /// Netzwerk wieder online: Wiederverbindungszaehler zuruecksetzen
    pub fn netzwerk_online(&self) {
        self.liveness.netzwerk_online();
    }

    /// Netzwerk offline: Sitzung als getrennt markieren, Zaehlung aussetzen
    pub fn netzwerk_offline(&self) {
        self.liveness.netzwerk_offline();
        self.engine.als_getrennt_markieren();
    }

    /// Auflegen und auf das Ende der Ereignisschleife warten
    pub async fn beenden(&self) {
        let _ = self.shutdown_tx.send(true);
        if let Some(task) = self.task.lock().await.take() {
            if let Err(e) = task.await {
                tracing::warn!(fehler = %e, "Sitzungs-Task nicht sauber beendet");
            }
        }
    }
}

/// Startet eine Sitzung im Raum `raum`
///
/// Baut die Relay-Verbindung auf, tritt dem Raum bei und startet die
/// Ereignisschleife. Das Netzwerk gilt als immer erreichbar; siehe
/// [`sitzung_starten_mit_netz`] fuer eine eigene Erreichbarkeitsquelle.
pub async fn sitzung_starten(
    config: ClientConfig,
    raum: RoomId,
    fabrik: Arc<dyn PeerConnectionFactory>,
) -> anyhow::Result<SitzungsHandle> {
    sitzung_starten_mit_netz(config, raum, fabrik, Arc::new(ImmerErreichbar)).await
}

pub async fn sitzung_starten_mit_netz(
    config: ClientConfig,
    raum: RoomId,
    fabrik: Arc<dyn PeerConnectionFactory>,
    netz: Arc<dyn NetzwerkStatus>,
) -> anyhow::Result<SitzungsHandle> {
    let signaling = SignalingClient::verbinden(&config.signaling_url)
        .await
        .with_context(|| format!("Relay '{}' nicht erreichbar", config.signaling_url))?;

    let (engine, ereignisse) =
        NegotiationEngine::neu(raum, config.negotiation(), fabrik, signaling.sender())
            .context("Peer-Verbindung konnte nicht erstellt werden")?;

    let store = geteilt(CanvasStore::mit_emoji_lebensdauer(config.emoji_lebensdauer_ms));
    let canvas = Arc::new(CanvasSession::neu(store, config.anzeigename.clone()));
    let liveness = Arc::new(LivenessMonitor::neu(
        config.liveness_intervall(),
        config.max_wiederverbindungen,
        netz,
    ));

    engine
        .beitreten()
        .await
        .context("Raumbeitritt konnte nicht gesendet werden")?;

    let metriken = DuettMetrics::neu().context("Metriken konnten nicht registriert werden")?;
    let health = HealthState::neu();
    health.relay_status_setzen(true);

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let observability = config.metriken_adresse().map(|addr| {
        let metriken = metriken.clone();
        let health = health.clone();
        let rx = shutdown_rx.clone();
        tokio::spawn(async move {
            if let Err(e) =
                duett_observability::observability_server_starten(addr, metriken, health, rx).await
            {
                tracing::error!(fehler = %e, "Observability-Server beendet");
            }
        })
    });

    let schleife = Schleife {
        config,
        engine: Arc::clone(&engine),
        canvas: Arc::clone(&canvas),
        liveness: Arc::clone(&liveness),
        metriken: metriken.clone(),
        health,
        signaling: Some(signaling),
        ereignisse,
        observability,
        shutdown_rx,
    };
    let task = tokio::spawn(schleife.laufen());

    Ok(SitzungsHandle {
        engine,
        canvas,
        liveness,
        metriken,
        shutdown_tx,
        task: AsyncMutex::new(Some(task)),
    })
}

// ---------------------------------------------------------------------------
// Ereignisschleife
// ---------------------------------------------------------------------------

struct Schleife {
    config: ClientConfig,
    engine: Arc<NegotiationEngine>,
    canvas: Arc<CanvasSession>,
    liveness: Arc<LivenessMonitor>,
    metriken: DuettMetrics,
    health: HealthState,
    signaling: Option<SignalingClient>,
    ereignisse: mpsc::UnboundedReceiver<(u64, PeerEreignis)>,
    observability: Option<JoinHandle<()>>,
    shutdown_rx: watch::Receiver<bool>,
}

impl Schleife {
    async fn laufen(mut self) {
        let mut liveness_takt = self.liveness.takt();
        let emoji_intervall = self.config.emoji_aufraeumen();
        let mut emoji_takt = interval_at(Instant::now() + emoji_intervall, emoji_intervall);
        emoji_takt.set_missed_tick_behavior(MissedTickBehavior::Skip);
        let statistik_intervall = self.config.statistik_intervall();
        let mut statistik_takt =
            interval_at(Instant::now() + statistik_intervall, statistik_intervall);
        statistik_takt.set_missed_tick_behavior(MissedTickBehavior::Skip);

        tracing::info!(raum = %self.engine.raum(), "Sitzung gestartet");

        loop {
            tokio::select! {
                nachricht = naechste_signal(&mut self.signaling) => {
                    match nachricht {
                        Some(nachricht) => {
                            if let Some(ereignis) = self.engine.signal_verarbeiten(nachricht).await {
                                self.kanal_ereignis(ereignis);
                            }
                        }
                        None => {
                            self.signaling = None;
                            self.health.relay_status_setzen(false);
                            self.engine.relay_getrennt();
                        }
                    }
                }

                Some((generation, ereignis)) = self.ereignisse.recv() => {
                    if let Some(ereignis) = self.engine.ereignis_verarbeiten(generation, ereignis).await {
                        self.kanal_ereignis(ereignis);
                    }
                }

                _ = liveness_takt.tick() => {
                    let status = self.engine.aktueller_status();
                    if let LivenessEntscheidung::NeuInitialisieren { versuch } = self.liveness.pruefen(status) {
                        self.neu_verbinden(versuch).await;
                    }
                }

                _ = emoji_takt.tick() => {
                    self.canvas.emojis_aufraeumen(jetzt_ms());
                }

                _ = statistik_takt.tick() => {
                    self.statistik_erfassen().await;
                }

                _ = self.shutdown_rx.changed() => {
                    tracing::info!(raum = %self.engine.raum(), "Sitzung wird beendet");
                    break;
                }
            }
        }

        self.engine.schliessen().await;
        self.canvas.kanal_schliessen();
        self.signaling = None;
        self.health.relay_status_setzen(false);

        if let Some(task) = self.observability.take() {
            if let Err(e) = task.await {
                tracing::warn!(fehler = %e, "Observability-Task nicht sauber beendet");
            }
        }
    }

    async fn statistik_erfassen(&self) {
        let Some(s) = self.engine.statistiken().await else {
            return;
        };
        self.canvas.store().lock().verbindungsstatistik_setzen(s);
        self.metriken
            .peer_statistik_setzen(s.bitrate, s.packets_lost, s.jitter, s.rtt);
    }

    fn kanal_ereignis(&self, ereignis: KanalEreignis) {
        match ereignis {
            KanalEreignis::Geoeffnet(kanal) => self.canvas.kanal_setzen(kanal),
            KanalEreignis::Nachricht(text) => {
                self.canvas.eingehend(&text);
            }
            KanalEreignis::Geschlossen => self.canvas.kanal_schliessen(),
        }
    }

    /// Vollstaendige Neuinitialisierung mit neuer Relay-Verbindung
    async fn neu_verbinden(&mut self, versuch: u32) {
        tracing::info!(versuch, url = %self.config.signaling_url, "Baue Sitzung neu auf");
        let client = match SignalingClient::verbinden(&self.config.signaling_url).await {
            Ok(c) => c,
            Err(e) => {
                tracing::warn!(versuch, fehler = %e, "Relay nicht erreichbar");
                return;
            }
        };

        self.canvas.kanal_schliessen();
        if let Err(e) = self.engine.neu_initialisieren(client.sender()).await {
            tracing::warn!(versuch, fehler = %e, "Neuinitialisierung fehlgeschlagen");
            return;
        }
        self.signaling = Some(client);
        self.health.relay_status_setzen(true);
    }
}

async fn naechste_signal(client: &mut Option<SignalingClient>) -> Option<ServerMessage> {
    match client {
        Some(c) => c.empfangen().await,
        None => std::future::pending().await,
    }
}
