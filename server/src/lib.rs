//! duett-server – Bibliotheks-Root
//!
//! Setzt das Relay aus Konfiguration, Signaling-Server und
//! Observability-Server zusammen und stellt den Einstiegspunkt fuer
//! Integrationstests bereit.

pub mod config;

use anyhow::{Context, Result};
use config::ServerConfig;
use duett_observability::{DuettMetrics, HealthState};
use duett_signaling::{SignalingServer, SignalingState};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;

/// Haelt den laufenden Server-Zustand zusammen
pub struct Server {
    pub config: ServerConfig,
    state: Arc<SignalingState>,
    metriken: DuettMetrics,
    health: HealthState,
}

impl Server {
    /// Erstellt einen neuen Server aus der gegebenen Konfiguration
    pub fn neu(config: ServerConfig) -> Result<Self> {
        let state = SignalingState::neu(config.signaling_config());
        let metriken = DuettMetrics::neu().context("Metriken konnten nicht registriert werden")?;
        Ok(Self {
            config,
            state,
            metriken,
            health: HealthState::neu(),
        })
    }

    pub fn state(&self) -> &Arc<SignalingState> {
        &self.state
    }

    pub fn health(&self) -> &HealthState {
        &self.health
    }

    /// Startet alle Subsysteme und laeuft bis Ctrl-C
    pub async fn starten(self) -> Result<()> {
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        tokio::spawn(async move {
            if let Err(e) = tokio::signal::ctrl_c().await {
                tracing::error!(fehler = %e, "Ctrl-C-Handler konnte nicht registriert werden");
                return;
            }
            tracing::info!("Shutdown-Signal empfangen, Relay wird beendet");
            let _ = shutdown_tx.send(true);
        });

        let bind_addr = self.config.relay_bind_adresse()?;
        self.laufen(bind_addr, shutdown_rx, |_| {}).await
    }

    /// Startet alle Subsysteme und laeuft bis `shutdown_rx` auf `true` wechselt
    ///
    /// Reihenfolge:
    /// 1. Relay-Listener binden (`bereit` erhaelt die gebundene Adresse)
    /// 2. Observability-Server starten (falls aktiviert)
    /// 3. Metriken periodisch aus dem Relay-Zustand aktualisieren
    /// 4. Verbindungen annehmen bis zum Shutdown
    pub async fn laufen(
        self,
        bind_addr: SocketAddr,
        shutdown_rx: watch::Receiver<bool>,
        bereit: impl FnOnce(SocketAddr),
    ) -> Result<()> {
        tracing::info!(
            server_name = %self.config.server.name,
            relay = %bind_addr,
            max_clients = self.config.server.max_clients,
            "Relay startet"
        );

        let relay = SignalingServer::binden(Arc::clone(&self.state), bind_addr)
            .await
            .with_context(|| format!("Relay-Listener auf {bind_addr} nicht bindbar"))?;
        let lokale_addr = relay.lokale_adresse()?;
        self.health.relay_status_setzen(true);
        bereit(lokale_addr);

        let observability = if self.config.observability.aktiviert {
            let addr = self.config.observability_bind_adresse()?;
            let metriken = self.metriken.clone();
            let health = self.health.clone();
            let rx = shutdown_rx.clone();
            Some(tokio::spawn(async move {
                if let Err(e) =
                    duett_observability::observability_server_starten(addr, metriken, health, rx)
                        .await
                {
                    tracing::error!(fehler = %e, "Observability-Server beendet");
                }
            }))
        } else {
            None
        };

        let metriken_task = tokio::spawn(metriken_aktualisieren(
            Arc::clone(&self.state),
            self.metriken.clone(),
            Duration::from_secs(self.config.observability.intervall_sek.max(1)),
            shutdown_rx.clone(),
        ));

        let ergebnis = relay.starten(shutdown_rx).await;
        self.health.relay_status_setzen(false);

        let _ = metriken_task.await;
        if let Some(task) = observability {
            let _ = task.await;
        }

        ergebnis.context("Relay-Listener fehlgeschlagen")?;
        tracing::info!("Relay beendet");
        Ok(())
    }
}

/// Uebertraegt die Relay-Zaehler periodisch in die Prometheus-Metriken
async fn metriken_aktualisieren(
    state: Arc<SignalingState>,
    metriken: DuettMetrics,
    intervall: Duration,
    mut shutdown_rx: watch::Receiver<bool>,
) {
    let mut takt = tokio::time::interval(intervall);
    loop {
        tokio::select! {
            _ = takt.tick() => {
                metriken.aktualisieren(
                    state.peer_anzahl(),
                    state.raeume.raum_anzahl(),
                    state.raeume.weitergeleitet_gesamt(),
                    state.verbindungen_gesamt.load(std::sync::atomic::Ordering::Relaxed),
                );
            }
            _ = shutdown_rx.changed() => break,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use duett_protocol::{signaling::ServerMessage, wire::ClientCodec};

    fn test_config() -> ServerConfig {
        let mut config = ServerConfig::default();
        config.netzwerk.bind_adresse = "127.0.0.1".into();
        config.observability.aktiviert = false;
        config
    }

    #[tokio::test]
    async fn relay_startet_und_endet_mit_shutdown() {
        let server = Server::neu(test_config()).unwrap();
        let health = server.health().clone();
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let (addr_tx, addr_rx) = tokio::sync::oneshot::channel();

        let task = tokio::spawn(server.laufen(
            "127.0.0.1:0".parse().unwrap(),
            shutdown_rx,
            move |addr| {
                let _ = addr_tx.send(addr);
            },
        ));
        let addr = addr_rx.await.unwrap();
        assert!(health.relay_aktiv());

        // Verbindung wird angenommen und erhaelt eine Id
        let stream = tokio::net::TcpStream::connect(addr).await.unwrap();
        let mut framed = tokio_util_framed(stream);
        let erste = next_frame(&mut framed).await;
        assert!(matches!(erste, ServerMessage::IdAssigned { .. }));

        shutdown_tx.send(true).unwrap();
        tokio::time::timeout(Duration::from_secs(5), task)
            .await
            .expect("Relay muss nach Shutdown enden")
            .unwrap()
            .unwrap();
        assert!(!health.relay_aktiv());
    }

    #[tokio::test]
    async fn belegter_port_ist_fehler() {
        let belegt = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = belegt.local_addr().unwrap();

        let server = Server::neu(test_config()).unwrap();
        let (_tx, rx) = watch::channel(false);
        assert!(server.laufen(addr, rx, |_| {}).await.is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn metriken_folgen_dem_relay() {
        let state = SignalingState::neu(Default::default());
        let metriken = DuettMetrics::neu().unwrap();
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        state.verbindung_gezaehlt();
        state.verbindung_gezaehlt();

        let task = tokio::spawn(metriken_aktualisieren(
            Arc::clone(&state),
            metriken.clone(),
            Duration::from_secs(5),
            shutdown_rx,
        ));
        tokio::time::sleep(Duration::from_millis(10)).await;
        assert_eq!(metriken.connections_total.get(), 2);

        state.verbindung_gezaehlt();
        tokio::time::sleep(Duration::from_secs(5)).await;
        assert_eq!(metriken.connections_total.get(), 3);

        shutdown_tx.send(true).unwrap();
        task.await.unwrap();
    }

    type Framed = tokio_util::codec::Framed<tokio::net::TcpStream, ClientCodec>;

    fn tokio_util_framed(stream: tokio::net::TcpStream) -> Framed {
        tokio_util::codec::Framed::new(stream, ClientCodec::new())
    }

    async fn next_frame(framed: &mut Framed) -> ServerMessage {
        use futures_util::StreamExt;
        tokio::time::timeout(Duration::from_secs(2), framed.next())
            .await
            .unwrap()
            .unwrap()
            .unwrap()
    }
}
