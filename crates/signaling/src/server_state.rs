//! Gemeinsamer Server-Zustand fuer den Signaling-Service
//!
//! Haelt Konfiguration und Session-Handler als Arc-Referenzen, die sicher
//! zwischen tokio-Tasks geteilt werden koennen.

use std::sync::Arc;
use std::time::Instant;
use treffpunkt_protocol::wire::DEFAULT_MAX_FRAME_SIZE;

use crate::directory::MAX_TEILNEHMER_PRO_RAUM;
use crate::registry::{SEND_QUEUE_GROESSE, STANDARD_ANZEIGENAME};
use crate::session::SessionHandler;

/// Konfiguration fuer den Signaling-Service
#[derive(Debug, Clone)]
pub struct SignalingConfig {
    /// Maximale Mitglieder pro Raum
    pub max_teilnehmer_pro_raum: usize,
    /// Platzhalter fuer fehlende Anzeigenamen
    pub standard_anzeigename: String,
    /// Maximale gleichzeitige Verbindungen
    pub max_verbindungen: usize,
    /// Keepalive-Intervall in Sekunden
    pub keepalive_sek: u64,
    /// Timeout fuer inaktive Verbindungen in Sekunden
    pub verbindungs_timeout_sek: u64,
    /// Groesse der Send-Queue pro Verbindung
    pub send_queue_groesse: usize,
    /// Maximale Frame-Groesse in Bytes
    pub max_frame_bytes: usize,
}

impl Default for SignalingConfig {
    fn default() -> Self {
        Self {
            max_teilnehmer_pro_raum: MAX_TEILNEHMER_PRO_RAUM,
            standard_anzeigename: STANDARD_ANZEIGENAME.to_string(),
            max_verbindungen: 1024,
            keepalive_sek: 30,
            verbindungs_timeout_sek: 90,
            send_queue_groesse: SEND_QUEUE_GROESSE,
            max_frame_bytes: DEFAULT_MAX_FRAME_SIZE,
        }
    }
}

/// Gemeinsamer Server-Zustand (thread-safe, Arc-geteilt)
pub struct SignalingState {
    /// Server-Konfiguration
    pub config: Arc<SignalingConfig>,
    /// Raum- und Verbindungsverwaltung
    pub session: SessionHandler,
    /// Startzeitpunkt des Servers (fuer Uptime-Berechnung)
    pub start_time: Instant,
}

impl SignalingState {
    /// Erstellt einen neuen SignalingState
    pub fn neu(config: SignalingConfig) -> Arc<Self> {
        let session = SessionHandler::neu(&config);
        Arc::new(Self {
            config: Arc::new(config),
            session,
            start_time: Instant::now(),
        })
    }

    /// Laufzeit seit dem Start in Sekunden
    pub fn uptime_sek(&self) -> u64 {
        self.start_time.elapsed().as_secs()
    }
}
