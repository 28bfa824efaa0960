//! Client-Konfiguration
//!
//! Standardwerte gelten ohne Konfigurationsdatei. Die Relay-URL kann ueber
//! `DUETT_SIGNALING_URL` ueberschrieben werden.

use duett_negotiation::{GlareStrategie, IceServer, NegotiationConfig};
use serde::{Deserialize, Serialize};
use std::net::{Ipv4Addr, SocketAddr};
use std::time::Duration;

/// Umgebungsvariable fuer die Relay-URL
pub const ENV_SIGNALING_URL: &str = "DUETT_SIGNALING_URL";

/// Vollstaendige Client-Konfiguration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    /// URL des Signaling-Relays
    pub signaling_url: String,
    /// Anzeigename, mit dem eigene Chat-Nachrichten gesendet werden
    pub anzeigename: String,
    /// Intervall der Liveness-Pruefung in Millisekunden
    pub liveness_intervall_ms: u64,
    /// Hoechstzahl an Wiederverbindungsversuchen
    pub max_wiederverbindungen: u32,
    /// Lebensdauer eines Emoji-Widgets in Millisekunden
    pub emoji_lebensdauer_ms: i64,
    /// Intervall des Emoji-Aufraeumens in Millisekunden
    pub emoji_aufraeumen_ms: u64,
    /// STUN/TURN-Server
    pub ice_server: Vec<IceServer>,
    /// Verhalten bei gleichzeitigen Angeboten
    pub glare: GlareStrategie,
    /// Abfrageintervall der Verbindungsstatistik in Millisekunden
    pub statistik_intervall_ms: u64,
    /// Port fuer `/metrics` und `/health` auf 127.0.0.1; ohne Wert kein Server
    pub metriken_port: Option<u16>,
    pub log_level: String,
    /// `text` oder `json`
    pub log_format: String,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            signaling_url: "http://localhost:3001".into(),
            anzeigename: "Peer".into(),
            liveness_intervall_ms: 5000,
            max_wiederverbindungen: 5,
            emoji_lebensdauer_ms: duett_canvas::EMOJI_LEBENSDAUER_MS,
            emoji_aufraeumen_ms: 250,
            ice_server: IceServer::standard(),
            glare: GlareStrategie::default(),
            statistik_intervall_ms: 1000,
            metriken_port: None,
            log_level: "info".into(),
            log_format: "text".into(),
        }
    }
}

impl ClientConfig {
    /// Laedt die Konfiguration aus einer TOML-Datei.
    /// Gibt die Standardkonfiguration zurueck wenn die Datei nicht existiert.
    pub fn laden(pfad: &str) -> anyhow::Result<Self> {
        let config = match std::fs::read_to_string(pfad) {
            Ok(inhalt) => toml::from_str(&inhalt)
                .map_err(|e| anyhow::anyhow!("Konfigurationsfehler in '{pfad}': {e}"))?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::debug!(pfad, "Keine Client-Konfiguration, verwende Standardwerte");
                Self::default()
            }
            Err(e) => {
                return Err(anyhow::anyhow!(
                    "Konfigurationsdatei '{pfad}' nicht lesbar: {e}"
                ))
            }
        };
        Ok(config.mit_umgebung())
    }

    /// Uebernimmt `DUETT_SIGNALING_URL`, falls gesetzt
    pub fn mit_umgebung(self) -> Self {
        self.mit_signaling_url(std::env::var(ENV_SIGNALING_URL).ok())
    }

    fn mit_signaling_url(mut self, url: Option<String>) -> Self {
        if let Some(url) = url.filter(|u| !u.trim().is_empty()) {
            self.signaling_url = url;
        }
        self
    }

    pub fn liveness_intervall(&self) -> Duration {
        Duration::from_millis(self.liveness_intervall_ms.max(1))
    }

    pub fn emoji_aufraeumen(&self) -> Duration {
        Duration::from_millis(self.emoji_aufraeumen_ms.max(1))
    }

    pub fn statistik_intervall(&self) -> Duration {
        Duration::from_millis(self.statistik_intervall_ms.max(1))
    }

    pub fn metriken_adresse(&self) -> Option<SocketAddr> {
        self.metriken_port
            .map(|port| SocketAddr::from((Ipv4Addr::LOCALHOST, port)))
    }

    pub fn negotiation(&self) -> NegotiationConfig {
        NegotiationConfig {
            ice_server: self.ice_server.clone(),
            glare: self.glare,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn standardwerte() {
        let cfg = ClientConfig::default();
        assert_eq!(cfg.signaling_url, "http://localhost:3001");
        assert_eq!(cfg.liveness_intervall(), Duration::from_secs(5));
        assert_eq!(cfg.max_wiederverbindungen, 5);
        assert_eq!(cfg.emoji_lebensdauer_ms, 5000);
        assert_eq!(cfg.ice_server.len(), 2);
        assert_eq!(cfg.glare, GlareStrategie::HoeflicherPeer);
        assert_eq!(cfg.statistik_intervall(), Duration::from_secs(1));
        assert_eq!(cfg.metriken_adresse(), None);
        assert_eq!(cfg.log_level, "info");
    }

    #[test]
    fn metriken_nur_auf_localhost() {
        let cfg: ClientConfig = toml::from_str("metriken_port = 9464").unwrap();
        assert_eq!(
            cfg.metriken_adresse(),
            Some("127.0.0.1:9464".parse().unwrap())
        );
    }

    #[test]
    fn url_ueberschreiben() {
        let cfg = ClientConfig::default().mit_signaling_url(Some("tcp://relay:4000".into()));
        assert_eq!(cfg.signaling_url, "tcp://relay:4000");

        let cfg = ClientConfig::default().mit_signaling_url(Some("  ".into()));
        assert_eq!(cfg.signaling_url, "http://localhost:3001");
    }

    #[test]
    fn config_aus_toml_string() {
        let toml = r#"
            anzeigename = "Alex"
            glare = "uebernehmen"

            [[ice_server]]
            urls = ["turn:turn.example.org:3478"]
            username = "u"
            credential = "p"
        "#;
        let cfg: ClientConfig = toml::from_str(toml).unwrap();
        assert_eq!(cfg.anzeigename, "Alex");
        assert_eq!(cfg.glare, GlareStrategie::Uebernehmen);
        assert_eq!(cfg.ice_server[0].username.as_deref(), Some("u"));
        // Nicht angegebene Felder behalten Standardwerte
        assert_eq!(cfg.max_wiederverbindungen, 5);
    }

    #[test]
    fn fehlende_datei_ergibt_standard() {
        let cfg = ClientConfig::laden("/nicht/vorhanden/duett-client.toml").unwrap();
        assert_eq!(cfg.liveness_intervall_ms, 5000);
    }
}
