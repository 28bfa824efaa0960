//! Duett Relay – Einstiegspunkt
//!
//! Laedt die Konfiguration, initialisiert das Logging und startet das Relay.

use anyhow::Result;
use duett_server::{config::ServerConfig, Server};

#[tokio::main]
async fn main() -> Result<()> {
    // Konfigurationsdatei-Pfad aus Umgebungsvariable oder Standard
    let config_pfad = std::env::var("DUETT_CONFIG").unwrap_or_else(|_| "config.toml".into());

    // Konfiguration laden (Standardwerte falls Datei fehlt)
    let config = ServerConfig::laden(&config_pfad)?;

    duett_observability::logging_initialisieren(&config.logging.level, &config.logging.format)?;

    tracing::info!(
        version = env!("CARGO_PKG_VERSION"),
        config = %config_pfad,
        "Duett Relay wird initialisiert"
    );

    Server::neu(config)?.starten().await
}
