//! Connection-Registry – Wer ist verbunden, in welchem Raum, unter welchem Namen
//!
//! Haelt pro aktiver Verbindung den Anzeigenamen, den aktuellen Raum und die
//! Send-Queue. Die Registry ist die einzige Stelle, die Verbindungs-IDs auf
//! Zustellwege abbildet; alles was einen Client erreichen will, geht hier durch.
//!
//! ## Ueberlauf
//! Jede Verbindung hat eine begrenzte Queue. Ist sie voll, wird die Nachricht
//! nicht still verworfen, sondern die Verbindung getrennt: ein Client, der
//! dranbleibt, sieht jede Nachricht seines Raums in Reihenfolge.

use dashmap::DashMap;
use std::sync::Arc;
use tokio::sync::{mpsc, watch};
use treffpunkt_core::types::{ConnectionId, RoomId};
use treffpunkt_protocol::ServerEvent;

/// Standard-Groesse der Send-Queue pro Verbindung
pub const SEND_QUEUE_GROESSE: usize = 256;

/// Platzhalter fuer fehlende Anzeigenamen
pub const STANDARD_ANZEIGENAME: &str = "Gast";

/// Getrimmter Name, bei leerem oder fehlendem Wert der Platzhalter
pub fn name_oder_standard(roh: Option<&str>, standard: &str) -> String {
    match roh.map(str::trim) {
        Some(name) if !name.is_empty() => name.to_string(),
        _ => standard.to_string(),
    }
}

// ---------------------------------------------------------------------------
// Teilnehmer
// ---------------------------------------------------------------------------

/// Registry-Eintrag einer Verbindung
#[derive(Debug)]
pub struct Teilnehmer {
    pub connection_id: ConnectionId,
    pub anzeigename: String,
    /// Aktueller Raum (None vor dem ersten Beitritt)
    pub raum_id: Option<RoomId>,
    tx: mpsc::Sender<ServerEvent>,
    trenn_tx: watch::Sender<bool>,
}

impl Teilnehmer {
    /// Reiht ein Event nicht-blockierend in die Send-Queue ein
    fn senden(&self, event: ServerEvent) -> bool {
        match self.tx.try_send(event) {
            Ok(()) => true,
            Err(mpsc::error::TrySendError::Full(event)) => {
                tracing::warn!(
                    connection_id = %self.connection_id,
                    event = event.name(),
                    "Send-Queue voll – Verbindung wird getrennt"
                );
                self.trennen();
                false
            }
            Err(mpsc::error::TrySendError::Closed(_)) => {
                tracing::debug!(
                    connection_id = %self.connection_id,
                    "Send-Queue geschlossen (Client getrennt)"
                );
                false
            }
        }
    }

    fn trennen(&self) {
        self.trenn_tx.send_replace(true);
    }
}

/// Empfangsseite einer registrierten Verbindung
///
/// Der Verbindungs-Task liest `events` und schreibt sie auf den Stream.
/// Wechselt `trennen` auf `true`, leert er die Queue und schliesst.
pub struct VerbindungsEmpfang {
    pub connection_id: ConnectionId,
    pub events: mpsc::Receiver<ServerEvent>,
    pub trennen: watch::Receiver<bool>,
}

// ---------------------------------------------------------------------------
// ConnectionRegistry
// ---------------------------------------------------------------------------

/// Verwaltet alle aktiven Verbindungen
///
/// Thread-safe via Arc + DashMap. Clone teilt den inneren Zustand.
#[derive(Clone)]
pub struct ConnectionRegistry {
    inner: Arc<RegistryInner>,
}

struct RegistryInner {
    verbindungen: DashMap<ConnectionId, Teilnehmer>,
    queue_groesse: usize,
}

impl ConnectionRegistry {
    /// Erstellt eine leere Registry mit der gegebenen Queue-Groesse pro Verbindung
    pub fn neu(queue_groesse: usize) -> Self {
        Self {
            inner: Arc::new(RegistryInner {
                verbindungen: DashMap::new(),
                queue_groesse: queue_groesse.max(1),
            }),
        }
    }

    /// Legt den Eintrag fuer eine neue Verbindung an
    pub fn registrieren(
        &self,
        connection_id: ConnectionId,
        anzeigename: impl Into<String>,
    ) -> VerbindungsEmpfang {
        let (tx, events) = mpsc::channel(self.inner.queue_groesse);
        let (trenn_tx, trennen) = watch::channel(false);
        self.inner.verbindungen.insert(
            connection_id,
            Teilnehmer {
                connection_id,
                anzeigename: anzeigename.into(),
                raum_id: None,
                tx,
                trenn_tx,
            },
        );
        tracing::debug!(connection_id = %connection_id, "Verbindung registriert");
        VerbindungsEmpfang {
            connection_id,
            events,
            trennen,
        }
    }

    /// Entfernt den Eintrag einer Verbindung und gibt ihn zurueck
    ///
    /// Mit dem Eintrag faellt auch der Sender der Queue weg.
    pub fn entfernen(&self, connection_id: &ConnectionId) -> Option<Teilnehmer> {
        self.inner
            .verbindungen
            .remove(connection_id)
            .map(|(_, teilnehmer)| teilnehmer)
    }

    /// Haelt Raum und Anzeigenamen einer Verbindung fest
    ///
    /// Gibt `false` zurueck, wenn die Verbindung nicht (mehr) existiert.
    pub fn raum_zuordnen(
        &self,
        connection_id: &ConnectionId,
        raum_id: RoomId,
        anzeigename: String,
    ) -> bool {
        match self.inner.verbindungen.get_mut(connection_id) {
            Some(mut eintrag) => {
                eintrag.raum_id = Some(raum_id);
                eintrag.anzeigename = anzeigename;
                true
            }
            None => false,
        }
    }

    /// Aktueller Raum einer Verbindung
    pub fn raum_von(&self, connection_id: &ConnectionId) -> Option<RoomId> {
        self.inner.verbindungen.get(connection_id)?.raum_id.clone()
    }

    /// Registrierter Anzeigename einer Verbindung
    pub fn anzeigename(&self, connection_id: &ConnectionId) -> Option<String> {
        self.inner
            .verbindungen
            .get(connection_id)
            .map(|e| e.anzeigename.clone())
    }

    /// Sendet ein Event an genau eine Verbindung
    ///
    /// Gibt `true` zurueck wenn die Verbindung existiert und das Event
    /// eingereiht wurde. Unbekannte Ziele werden still verworfen.
    pub fn senden(&self, connection_id: &ConnectionId, event: ServerEvent) -> bool {
        match self.inner.verbindungen.get(connection_id) {
            Some(teilnehmer) => teilnehmer.senden(event),
            None => {
                tracing::debug!(
                    connection_id = %connection_id,
                    event = event.name(),
                    "Senden an unbekannte Verbindung verworfen"
                );
                false
            }
        }
    }

    /// Fordert den Verbindungs-Task auf, die Verbindung zu schliessen
    pub fn trennen(&self, connection_id: &ConnectionId) -> bool {
        match self.inner.verbindungen.get(connection_id) {
            Some(teilnehmer) => {
                teilnehmer.trennen();
                true
            }
            None => false,
        }
    }

    /// Prueft ob eine Verbindung registriert ist
    pub fn ist_verbunden(&self, connection_id: &ConnectionId) -> bool {
        self.inner.verbindungen.contains_key(connection_id)
    }

    /// Anzahl der registrierten Verbindungen
    pub fn anzahl(&self) -> usize {
        self.inner.verbindungen.len()
    }
}

impl Default for ConnectionRegistry {
    fn default() -> Self {
        Self::neu(SEND_QUEUE_GROESSE)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
