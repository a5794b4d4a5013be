//! Prometheus-kompatible Metriken fuer Treffpunkt
//!
//! Registrierte Metriken:
//! - `treffpunkt_connected_clients` – Gauge: Aktuell verbundene Clients
//! - `treffpunkt_rooms_active` – Gauge: Aktive Raeume
//! - `treffpunkt_room_joins_total` – Counter: Erfolgreiche Beitritte
//! - `treffpunkt_room_full_total` – Counter: Wegen Kapazitaet abgelehnte Beitritte
//! - `treffpunkt_host_migrations_total` – Counter: Host-Wechsel
//! - `treffpunkt_kicks_total` – Counter: Vom Host entfernte Mitglieder
//!
//! Die Zaehler werden aus dem `RaumEvent`-Strom abgeleitet. Die beiden Gauges
//! werden nach jedem Ereignis aus dem aktuellen [`Bestand`] gesetzt, damit
//! verpasste Ereignisse sie nicht dauerhaft verfaelschen.

use anyhow::Result;
use axum::{extract::State, http::StatusCode, response::IntoResponse, routing::get, Router};
use prometheus::{Encoder, IntCounter, IntGauge, Opts, Registry, TextEncoder};
use std::sync::Arc;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use treffpunkt_core::RaumEvent;

/// Momentaufnahme der aktuell verbundenen Clients und aktiven Raeume
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Bestand {
    pub verbindungen: usize,
    pub raeume: usize,
}

/// Alle Treffpunkt-Prometheus-Metriken
#[derive(Clone)]
pub struct TreffpunktMetrics {
    pub registry: Arc<Registry>,

    pub connected_clients: IntGauge,
    pub rooms_active: IntGauge,
    pub room_joins_total: IntCounter,
    pub room_full_total: IntCounter,
    pub host_migrations_total: IntCounter,
    pub kicks_total: IntCounter,
}

impl TreffpunktMetrics {
    /// Erstellt und registriert alle Metriken in einer neuen Registry
    pub fn neu() -> Result<Self> {
        let registry = Registry::new();

        let connected_clients = IntGauge::with_opts(Opts::new(
            "treffpunkt_connected_clients",
            "Anzahl aktuell verbundener Clients",
        ))?;
        registry.register(Box::new(connected_clients.clone()))?;

        let rooms_active = IntGauge::with_opts(Opts::new(
            "treffpunkt_rooms_active",
            "Anzahl aktiver Raeume",
        ))?;
        registry.register(Box::new(rooms_active.clone()))?;

        let room_joins_total = IntCounter::with_opts(Opts::new(
            "treffpunkt_room_joins_total",
            "Gesamtanzahl erfolgreicher Raum-Beitritte",
        ))?;
        registry.register(Box::new(room_joins_total.clone()))?;

        let room_full_total = IntCounter::with_opts(Opts::new(
            "treffpunkt_room_full_total",
            "Gesamtanzahl abgelehnter Beitritte (Raum voll)",
        ))?;
        registry.register(Box::new(room_full_total.clone()))?;

        let host_migrations_total = IntCounter::with_opts(Opts::new(
            "treffpunkt_host_migrations_total",
            "Gesamtanzahl Host-Wechsel",
        ))?;
        registry.register(Box::new(host_migrations_total.clone()))?;

        let kicks_total = IntCounter::with_opts(Opts::new(
            "treffpunkt_kicks_total",
            "Gesamtanzahl vom Host entfernter Mitglieder",
        ))?;
        registry.register(Box::new(kicks_total.clone()))?;

        Ok(Self {
            registry: Arc::new(registry),
            connected_clients,
            rooms_active,
            room_joins_total,
            room_full_total,
            host_migrations_total,
            kicks_total,
        })
    }

    /// Zaehlt ein Raum-Ereignis in die Counter
    pub fn ereignis_verarbeiten(&self, event: &RaumEvent) {
        match event {
            RaumEvent::Beigetreten { .. } => self.room_joins_total.inc(),
            RaumEvent::RaumVoll { .. } => self.room_full_total.inc(),
            RaumEvent::HostGewechselt { .. } => self.host_migrations_total.inc(),
            RaumEvent::Gekickt { .. } => self.kicks_total.inc(),
            RaumEvent::Verbunden { .. }
            | RaumEvent::Getrennt { .. }
            | RaumEvent::Verlassen { .. }
            | RaumEvent::RaumGeschlossen { .. } => {}
        }
    }

    /// Setzt die Gauges auf den aktuellen Bestand
    pub fn bestand_setzen(&self, bestand: Bestand) {
        self.connected_clients.set(bestand.verbindungen as i64);
        self.rooms_active.set(bestand.raeume as i64);
    }

    /// Startet einen Task, der den Ereignisstrom in die Metriken uebertraegt
    ///
    /// `bestand` liefert die aktuellen Zahlen und wird nach jedem Ereignis
    /// sowie nach verpassten Ereignissen abgefragt. Endet, wenn der Sender
    /// geschlossen wird.
    pub fn ereignisse_verfolgen<F>(
        &self,
        mut events: broadcast::Receiver<RaumEvent>,
        bestand: F,
    ) -> JoinHandle<()>
    where
        F: Fn() -> Bestand + Send + 'static,
    {
        let metriken = self.clone();
        tokio::spawn(async move {
            loop {
                match events.recv().await {
                    Ok(event) => metriken.ereignis_verarbeiten(&event),
                    Err(broadcast::error::RecvError::Lagged(verpasst)) => {
                        tracing::warn!(verpasst, "Metriken: Raum-Ereignisse verpasst");
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                }
                metriken.bestand_setzen(bestand());
            }
        })
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

/// Axum-Router fuer den `/metrics`-Endpunkt
pub fn metrics_router(metriken: TreffpunktMetrics) -> Router {
    Router::new()
        .route("/metrics", get(metrics_handler))
        .with_state(metriken)
}

async fn metrics_handler(State(metriken): State<TreffpunktMetrics>) -> impl IntoResponse {
    match metriken.exportieren() {
        Ok(text) => (
            StatusCode::OK,
            [(axum::http::header::CONTENT_TYPE, "text/plain; version=0.0.4")],
            text,
        )
            .into_response(),
        Err(err) => {
            tracing::error!("Metriken-Export fehlgeschlagen: {err}");
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}
