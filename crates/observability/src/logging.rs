//! Structured Logging Setup via tracing-subscriber
//!
//! Die Werte aus der `[logging]`-Sektion lassen sich per Umgebung
//! ueberschreiben:
//! - `DUETT_LOG_LEVEL`: Filter-Ausdruck (z.B. `info` oder
//!   `duett_signaling=debug,info`), Standard: info
//! - `DUETT_LOG_FORMAT`: `text` oder `json`, Standard: text

use anyhow::{anyhow, Result};
use tracing_subscriber::{fmt, EnvFilter};

pub const ENV_LOG_LEVEL: &str = "DUETT_LOG_LEVEL";
pub const ENV_LOG_FORMAT: &str = "DUETT_LOG_FORMAT";

/// Ausgabeformat der Log-Zeilen
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    Text,
    Json,
}

impl LogFormat {
    /// Unbekannte Werte fallen auf `Text` zurueck
    pub fn parsen(wert: &str) -> Self {
        match wert {
            "json" => Self::Json,
            _ => Self::Text,
        }
    }
}

/// Initialisiert den globalen Subscriber
///
/// Schlaegt fehl, wenn bereits ein Subscriber gesetzt ist.
pub fn logging_initialisieren(level: &str, format: &str) -> Result<()> {
    let filter = EnvFilter::try_from_env(ENV_LOG_LEVEL)
        .or_else(|_| EnvFilter::try_new(level))
        .unwrap_or_else(|_| EnvFilter::new("info"));

    let format = LogFormat::parsen(&log_format_aus_env().unwrap_or_else(|| format.to_string()));

    let ergebnis = match format {
        LogFormat::Json => fmt()
            .json()
            .with_env_filter(filter)
            .with_target(true)
            .with_current_span(true)
            .try_init(),
        LogFormat::Text => fmt().with_env_filter(filter).with_target(true).try_init(),
    };
    ergebnis.map_err(|e| anyhow!("Logging bereits initialisiert: {e}"))
}

/// `DUETT_LOG_FORMAT`, falls gesetzt
pub fn log_format_aus_env() -> Option<String> {
    std::env::var(ENV_LOG_FORMAT).ok()
}

pub fn log_level_gueltig(level: &str) -> bool {
    matches!(level, "trace" | "debug" | "info" | "warn" | "error")
}

pub fn log_format_gueltig(format: &str) -> bool {
    matches!(format, "text" | "json")
}
