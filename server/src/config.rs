//! Server-Konfiguration
//!
//! Wird beim Start aus einer TOML-Datei geladen. Alle Felder haben
//! sinnvolle Standardwerte, sodass das Relay ohne Konfigurationsdatei
//! lauffaehig ist. `PORT` in der Umgebung ueberschreibt den Listen-Port.

use duett_signaling::SignalingConfig;
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;

pub const ENV_PORT: &str = "PORT";

/// Vollstaendige Server-Konfiguration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Allgemeine Server-Einstellungen
    pub server: ServerEinstellungen,
    /// Netzwerk-Einstellungen
    pub netzwerk: NetzwerkEinstellungen,
    /// Relay-Einstellungen (Keepalive, Queues, Frames)
    pub signaling: SignalingEinstellungen,
    /// Logging-Einstellungen
    pub logging: LoggingEinstellungen,
    /// Observability-Einstellungen (Metriken, Health)
    pub observability: ObservabilityEinstellungen,
}

/// Allgemeine Server-Einstellungen
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerEinstellungen {
    /// Anzeigename im Log
    pub name: String,
    /// Maximale Anzahl gleichzeitiger Verbindungen
    pub max_clients: u32,
}

impl Default for ServerEinstellungen {
    fn default() -> Self {
        Self {
            name: "Duett Relay".into(),
            max_clients: 512,
        }
    }
}

/// Netzwerk-Einstellungen
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct NetzwerkEinstellungen {
    pub bind_adresse: String,
    /// TCP-Port des Relays
    pub port: u16,
}

impl Default for NetzwerkEinstellungen {
    fn default() -> Self {
        Self {
            bind_adresse: "0.0.0.0".into(),
            port: 3001,
        }
    }
}

/// Relay-Einstellungen
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SignalingEinstellungen {
    /// Keepalive-Ping-Intervall in Sekunden
    pub keepalive_sek: u64,
    /// Stille Verbindungen werden nach dieser Zeit getrennt
    pub verbindungs_timeout_sek: u64,
    /// Send-Queue pro Peer
    pub send_queue_groesse: usize,
    /// Maximale Frame-Groesse in Bytes
    pub max_frame_groesse: usize,
}

impl Default for SignalingEinstellungen {
    fn default() -> Self {
        let standard = SignalingConfig::default();
        Self {
            keepalive_sek: standard.keepalive_sek,
            verbindungs_timeout_sek: standard.verbindungs_timeout_sek,
            send_queue_groesse: standard.send_queue_groesse,
            max_frame_groesse: standard.max_frame_groesse,
        }
    }
}

/// Logging-Einstellungen
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingEinstellungen {
    /// Log-Level bzw. Filter-Ausdruck
    pub level: String,
    /// Format: "json" oder "text"
    pub format: String,
}

impl Default for LoggingEinstellungen {
    fn default() -> Self {
        Self {
            level: "info".into(),
            format: "text".into(),
        }
    }
}

/// Observability-Einstellungen (Metriken + Health-Check)
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ObservabilityEinstellungen {
    /// Aktiviert den Observability-Server
    pub aktiviert: bool,
    /// Port fuer Metriken und Health (Standard: 9300)
    pub port: u16,
    /// Aktualisierungsintervall der Metriken in Sekunden
    pub intervall_sek: u64,
}

impl Default for ObservabilityEinstellungen {
    fn default() -> Self {
        Self {
            aktiviert: true,
            port: 9300,
            intervall_sek: 5,
        }
    }
}

impl ServerConfig {
    /// Laedt die Konfiguration aus einer TOML-Datei.
    /// Gibt die Standardkonfiguration zurueck wenn die Datei nicht existiert.
    pub fn laden(pfad: &str) -> anyhow::Result<Self> {
        let config = match std::fs::read_to_string(pfad) {
            Ok(inhalt) => toml::from_str(&inhalt)
                .map_err(|e| anyhow::anyhow!("Konfigurationsfehler in '{pfad}': {e}"))?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::warn!(
                    pfad = pfad,
                    "Konfigurationsdatei nicht gefunden, verwende Standardwerte"
                );
                Self::default()
            }
            Err(e) => {
                return Err(anyhow::anyhow!(
                    "Konfigurationsdatei '{pfad}' nicht lesbar: {e}"
                ))
            }
        };
        config.mit_port(std::env::var(ENV_PORT).ok().as_deref())
    }

    /// Ueberschreibt den Relay-Port, falls angegeben
    pub fn mit_port(mut self, port: Option<&str>) -> anyhow::Result<Self> {
        if let Some(port) = port {
            self.netzwerk.port = port
                .trim()
                .parse()
                .map_err(|e| anyhow::anyhow!("Ungueltiger Port '{port}': {e}"))?;
        }
        Ok(self)
    }

    /// Bind-Adresse des Relays
    pub fn relay_bind_adresse(&self) -> anyhow::Result<SocketAddr> {
        adresse(&self.netzwerk.bind_adresse, self.netzwerk.port)
    }

    /// Bind-Adresse fuer den Observability-Server
    pub fn observability_bind_adresse(&self) -> anyhow::Result<SocketAddr> {
        adresse(&self.netzwerk.bind_adresse, self.observability.port)
    }

    /// Relay-Konfiguration fuer `SignalingState`
    pub fn signaling_config(&self) -> SignalingConfig {
        SignalingConfig {
            max_clients: self.server.max_clients,
            keepalive_sek: self.signaling.keepalive_sek,
            verbindungs_timeout_sek: self.signaling.verbindungs_timeout_sek,
            send_queue_groesse: self.signaling.send_queue_groesse,
            max_frame_groesse: self.signaling.max_frame_groesse,
        }
    }
}

fn adresse(host: &str, port: u16) -> anyhow::Result<SocketAddr> {
    format!("{host}:{port}")
        .parse()
        .map_err(|e| anyhow::anyhow!("Ungueltige Bind-Adresse '{host}:{port}': {e}"))
}
