//! Prometheus-kompatible Metriken fuer Relay und Client
//!
//! Registrierte Metriken (Relay):
//! - `duett_connected_peers` – Gauge: Aktuell verbundene Peers
//! - `duett_rooms_active` – Gauge: Raeume mit mindestens einem Mitglied
//! - `duett_signals_relayed_total` – Counter: Weitergeleitete Offer/Answer/ICE-Nachrichten
//! - `duett_connections_total` – Counter: Angenommene TCP-Verbindungen
//!
//! Registrierte Metriken (Client, Verbindung zum Peer):
//! - `duett_peer_bitrate_kbps` – Gauge
//! - `duett_peer_packets_lost` – Gauge
//! - `duett_peer_jitter_ms` – Gauge
//! - `duett_peer_rtt_ms` – Gauge

use anyhow::Result;
use axum::{extract::State, http::StatusCode, response::IntoResponse, routing::get, Router};
use prometheus::{Encoder, IntCounter, IntGauge, Opts, Registry, TextEncoder};
use std::sync::Arc;

/// Alle Duett-Prometheus-Metriken
#[derive(Clone)]
pub struct DuettMetrics {
    pub registry: Arc<Registry>,
    pub connected_peers: IntGauge,
    pub rooms_active: IntGauge,
    pub signals_relayed_total: IntCounter,
    pub connections_total: IntCounter,
    pub peer_bitrate_kbps: IntGauge,
    pub peer_packets_lost: IntGauge,
    pub peer_jitter_ms: IntGauge,
    pub peer_rtt_ms: IntGauge,
}

impl DuettMetrics {
    /// Erstellt und registriert alle Metriken in einer neuen Registry
    pub fn neu() -> Result<Self> {
        let registry = Registry::new();

        let connected_peers = IntGauge::with_opts(Opts::new(
            "duett_connected_peers",
            "Anzahl aktuell verbundener Peers",
        ))?;
        registry.register(Box::new(connected_peers.clone()))?;

        let rooms_active = IntGauge::with_opts(Opts::new(
            "duett_rooms_active",
            "Anzahl aktiver Raeume",
        ))?;
        registry.register(Box::new(rooms_active.clone()))?;

        let signals_relayed_total = IntCounter::with_opts(Opts::new(
            "duett_signals_relayed_total",
            "Gesamtanzahl weitergeleiteter Sitzungsnachrichten",
        ))?;
        registry.register(Box::new(signals_relayed_total.clone()))?;

        let connections_total = IntCounter::with_opts(Opts::new(
            "duett_connections_total",
            "Gesamtanzahl angenommener Verbindungen",
        ))?;
        registry.register(Box::new(connections_total.clone()))?;

        let peer_bitrate_kbps = gauge_registrieren(
            &registry,
            "duett_peer_bitrate_kbps",
            "Uebertragungsrate zum Peer in kbit/s",
        )?;
        let peer_packets_lost = gauge_registrieren(
            &registry,
            "duett_peer_packets_lost",
            "Verlorene Pakete auf der Peer-Verbindung",
        )?;
        let peer_jitter_ms =
            gauge_registrieren(&registry, "duett_peer_jitter_ms", "Jitter zum Peer in ms")?;
        let peer_rtt_ms =
            gauge_registrieren(&registry, "duett_peer_rtt_ms", "Round-Trip-Time zum Peer in ms")?;

        Ok(Self {
            registry: Arc::new(registry),
            connected_peers,
            rooms_active,
            signals_relayed_total,
            connections_total,
            peer_bitrate_kbps,
            peer_packets_lost,
            peer_jitter_ms,
            peer_rtt_ms,
        })
    }

    /// Uebernimmt die zuletzt gemessene Qualitaet der Peer-Verbindung
    pub fn peer_statistik_setzen(
        &self,
        bitrate_kbps: u64,
        packets_lost: u64,
        jitter_ms: u64,
        rtt_ms: u64,
    ) {
        self.peer_bitrate_kbps.set(als_gauge(bitrate_kbps));
        self.peer_packets_lost.set(als_gauge(packets_lost));
        self.peer_jitter_ms.set(als_gauge(jitter_ms));
        self.peer_rtt_ms.set(als_gauge(rtt_ms));
    }

    /// Uebernimmt Zaehlerstaende aus dem Relay
    ///
    /// Die Counter sind monoton; kleinere Werte als der aktuelle Stand
    /// werden ignoriert.
    pub fn aktualisieren(&self, peers: usize, raeume: usize, weitergeleitet: u64, verbindungen: u64) {
        self.connected_peers.set(i64::try_from(peers).unwrap_or(i64::MAX));
        self.rooms_active.set(i64::try_from(raeume).unwrap_or(i64::MAX));
        counter_nachziehen(&self.signals_relayed_total, weitergeleitet);
        counter_nachziehen(&self.connections_total, verbindungen);
    }

    /// Exportiert alle Metriken im Prometheus-Textformat
    pub fn exportieren(&self) -> Result<String> {
        let encoder = TextEncoder::new();
        let metric_families = self.registry.gather();
        let mut buffer = Vec::new();
        encoder.encode(&metric_families, &mut buffer)?;
        Ok(String::from_utf8(buffer)?)
    }
}

fn gauge_registrieren(registry: &Registry, name: &str, hilfe: &str) -> Result<IntGauge> {
    let gauge = IntGauge::with_opts(Opts::new(name, hilfe))?;
    registry.register(Box::new(gauge.clone()))?;
    Ok(gauge)
}

fn als_gauge(wert: u64) -> i64 {
    i64::try_from(wert).unwrap_or(i64::MAX)
}

fn counter_nachziehen(counter: &IntCounter, stand: u64) {
    let aktuell = counter.get();
    if stand > aktuell {
        counter.inc_by(stand - aktuell);
    }
}

/// Axum-Router fuer den `/metrics`-Endpunkt
pub fn metrics_router(metriken: DuettMetrics) -> Router {
    Router::new()
        .route("/metrics", get(metrics_handler))
        .with_state(metriken)
}

async fn metrics_handler(State(metriken): State<DuettMetrics>) -> impl IntoResponse {
    match metriken.exportieren() {
        Ok(text) => (
            StatusCode::OK,
            [(axum::http::header::CONTENT_TYPE, "text/plain; version=0.0.4")],
            text,
        )
            .into_response(),
        Err(err) => {
            tracing::error!(fehler = %err, "Metriken-Export fehlgeschlagen");
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}
