//! Health-Check-Endpunkt des Relays
//!
//! Endpoint: `GET /health`
//! Response: JSON mit Status, Version, Uptime und ob der Relay-Listener laeuft

use axum::{extract::State, http::StatusCode, response::IntoResponse, routing::get, Json, Router};
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;

/// Status des Health-Checks
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "lowercase")]
pub enum HealthStatus {
    Healthy,
    Unhealthy,
}

/// Antwort des Health-Check-Endpunkts
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: HealthStatus,
    pub version: String,
    pub uptime_seconds: u64,
    pub relay_aktiv: bool,
}

/// Geteilter Zustand fuer den Health-Check-Handler
#[derive(Clone)]
pub struct HealthState {
    start_time: Arc<Instant>,
    relay_aktiv: Arc<AtomicBool>,
}

impl HealthState {
    pub fn neu() -> Self {
        Self {
            start_time: Arc::new(Instant::now()),
            relay_aktiv: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn uptime_seconds(&self) -> u64 {
        self.start_time.elapsed().as_secs()
    }

    pub fn relay_aktiv(&self) -> bool {
        self.relay_aktiv.load(Ordering::Relaxed)
    }

    pub fn relay_status_setzen(&self, aktiv: bool) {
        self.relay_aktiv.store(aktiv, Ordering::Relaxed);
    }

    fn antwort(&self) -> HealthResponse {
        let relay_aktiv = self.relay_aktiv();
        HealthResponse {
            status: if relay_aktiv {
                HealthStatus::Healthy
            } else {
                HealthStatus::Unhealthy
            },
            version: env!("CARGO_PKG_VERSION").to_string(),
            uptime_seconds: self.uptime_seconds(),
            relay_aktiv,
        }
    }
}

impl Default for HealthState {
    fn default() -> Self {
        Self::neu()
    }
}

/// Axum-Router fuer den `/health`-Endpunkt
pub fn health_router(state: HealthState) -> Router {
    Router::new()
        .route("/health", get(health_handler))
        .with_state(state)
}

/// `GET /health` – 503 solange der Relay-Listener nicht laeuft
async fn health_handler(State(state): State<HealthState>) -> impl IntoResponse {
    let antwort = state.antwort();
    let http_status = match antwort.status {
        HealthStatus::Healthy => StatusCode::OK,
        HealthStatus::Unhealthy => StatusCode::SERVICE_UNAVAILABLE,
    };
    (http_status, Json(antwort))
}
