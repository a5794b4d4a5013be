//! treffpunkt-server – Bibliotheks-Root
//!
//! Deklariert alle Server-Module und stellt den oeffentlichen Einstiegspunkt
//! fuer Integrationstests bereit.

pub mod config;

use anyhow::{Context, Result};
use config::ServerConfig;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::sync::watch;
use treffpunkt_observability::{
    observability_server_starten, Bestand, HealthState, TreffpunktMetrics,
};
use treffpunkt_signaling::{SignalingServer, SignalingState};

/// Haelt den laufenden Server-Zustand zusammen
pub struct Server {
    pub config: ServerConfig,
}

impl Server {
    /// Erstellt einen neuen Server aus der gegebenen Konfiguration
    pub fn neu(config: ServerConfig) -> Self {
        Self { config }
    }

    /// Startet den Server und laeuft bis Ctrl-C
    pub async fn starten(self) -> Result<()> {
        let (shutdown_tx, shutdown_rx) = watch::channel(false);

        let signal = tokio::spawn(async move {
            match tokio::signal::ctrl_c().await {
                Ok(()) => tracing::info!("Shutdown-Signal empfangen, Server wird beendet"),
                Err(e) => tracing::error!(fehler = %e, "Ctrl-C-Handler fehlgeschlagen"),
            }
            shutdown_tx.send_replace(true);
        });

        let ergebnis = self.ausfuehren(shutdown_rx).await;
        signal.abort();
        ergebnis
    }

    /// Startet alle Subsysteme und laeuft bis `shutdown_rx` auf `true` wechselt
    ///
    /// Reihenfolge:
    /// 1. Session-Zustand und Metriken anlegen
    /// 2. Signaling-Listener binden
    /// 3. Observability-Server starten (falls aktiviert)
    /// 4. Verbindungen annehmen bis zum Shutdown, danach alle schliessen
    pub async fn ausfuehren(self, shutdown_rx: watch::Receiver<bool>) -> Result<()> {
        let state = SignalingState::neu(self.config.signaling_config());

        let metriken = TreffpunktMetrics::neu()?;
        let session = state.session.clone();
        let metriken_task =
            metriken.ereignisse_verfolgen(state.session.events_abonnieren(), move || Bestand {
                verbindungen: session.verbindungen_anzahl(),
                raeume: session.raum_anzahl(),
            });
        let health = HealthState::neu();

        let bind_addr: SocketAddr = self
            .config
            .tcp_bind_adresse()
            .parse()
            .with_context(|| format!("Ungueltige Bind-Adresse '{}'", self.config.tcp_bind_adresse()))?;
        let server = SignalingServer::binden(Arc::clone(&state), bind_addr)
            .await
            .with_context(|| format!("Signaling-Listener auf {bind_addr} nicht bindbar"))?;
        let lokale_addr = server.lokale_adresse()?;
        health.listener_status_setzen(true);

        let observability = if self.config.observability.aktiviert {
            let obs_addr: SocketAddr = self.config.observability_bind_adresse().parse()?;
            let metriken = metriken.clone();
            let health = health.clone();
            let shutdown_rx = shutdown_rx.clone();
            Some(tokio::spawn(async move {
                if let Err(e) =
                    observability_server_starten(obs_addr, metriken, health, shutdown_rx).await
                {
                    tracing::error!(fehler = %e, "Observability-Server fehlgeschlagen");
                }
            }))
        } else {
            None
        };

        tracing::info!(
            server_name = %self.config.server.name,
            adresse = %lokale_addr,
            max_teilnehmer = self.config.raeume.max_teilnehmer,
            "Server laeuft"
        );

        server.starten(shutdown_rx).await?;
        health.listener_status_setzen(false);

        if let Some(task) = observability {
            let _ = task.await;
        }
        metriken_task.abort();

        tracing::info!(laufzeit_sek = state.uptime_sek(), "Server beendet");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_config() -> ServerConfig {
        let mut config = ServerConfig::default();
        config.netzwerk.bind_adresse = "127.0.0.1".into();
        config.netzwerk.tcp_port = 0;
        config.observability.aktiviert = false;
        config
    }

    #[tokio::test]
    async fn start_und_shutdown() {
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let server = tokio::spawn(Server::neu(test_config()).ausfuehren(shutdown_rx));

        tokio::time::sleep(std::time::Duration::from_millis(50)).await;
        shutdown_tx.send(true).unwrap();

        tokio::time::timeout(std::time::Duration::from_secs(5), server)
            .await
            .expect("Server muss nach dem Shutdown enden")
            .unwrap()
            .unwrap();
    }

    #[tokio::test]
    async fn ungueltige_bind_adresse_schlaegt_fehl() {
        let mut config = test_config();
        config.netzwerk.bind_adresse = "kein host".into();
        let (_shutdown_tx, shutdown_rx) = watch::channel(false);

        let fehler = Server::neu(config).ausfuehren(shutdown_rx).await.unwrap_err();
        assert!(fehler.to_string().contains("Bind-Adresse"));
    }
}
