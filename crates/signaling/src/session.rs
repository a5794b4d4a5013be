//! Session-Handler – Beitritt, Austritt und Kick gegen Registry und Verzeichnis
//!
//! Einziger Einstiegspunkt fuer Zustandsaenderungen. Besitzt Registry,
//! Raumverzeichnis, Relay und Broadcaster; nichts davon ist global.
//! Jede Zustandsaenderung wird zusaetzlich als [`RaumEvent`] veroeffentlicht.
//!
//! ## Ablauf eines Austritts
//! 1. Verbindung aus dem Raum entfernen (unter dem Raum-Guard)
//! 2. `user-left` an die verbleibenden Mitglieder
//! 3. Falls Host: Nachfolger bestimmen und mit `set-host true` benachrichtigen
//! 4. Leeren Raum loeschen
//!
//! Kick und Verbindungsabbruch laufen beide durch diesen Pfad.

use tokio::sync::broadcast;
use treffpunkt_core::event::RaumEvent;
use treffpunkt_core::types::{ConnectionId, RoomId};
use treffpunkt_protocol::event::{
    ReturningSignalRequest, SendMessageRequest, SendReactionRequest, SendingSignalRequest,
    UploadFileRequest, UserLeft,
};
use treffpunkt_protocol::ServerEvent;

use crate::broadcast::RoomBroadcaster;
use crate::directory::{Austritt, Beitritt, RoomDirectory};
use crate::error::{SignalingError, SignalingResult};
use crate::host_migration::{self, HostWechsel};
use crate::registry::{name_oder_standard, ConnectionRegistry, VerbindungsEmpfang};
use crate::relay::SignalRelay;
use crate::server_state::SignalingConfig;

/// Kapazitaet des RaumEvent-Kanals
const EVENT_KANAL_GROESSE: usize = 1024;

/// Antwort auf einen Beitrittsversuch
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BeitrittsAntwort {
    /// Raum voll, Beitritt nicht ausgefuehrt
    Voll,
    /// Beitritt erfolgreich
    Beigetreten {
        /// Andere Mitglieder (ohne den Beitretenden)
        andere: Vec<ConnectionId>,
        ist_host: bool,
    },
}

/// Orchestriert Beitritt, Austritt und Kick
///
/// Clone teilt den inneren Zustand.
#[derive(Clone)]
pub struct SessionHandler {
    registry: ConnectionRegistry,
    directory: RoomDirectory,
    relay: SignalRelay,
    broadcaster: RoomBroadcaster,
    event_tx: broadcast::Sender<RaumEvent>,
    kapazitaet: usize,
    standard_anzeigename: String,
}

impl SessionHandler {
    pub fn neu(config: &SignalingConfig) -> Self {
        let registry = ConnectionRegistry::neu(config.send_queue_groesse);
        let directory = RoomDirectory::neu();
        let (event_tx, _) = broadcast::channel(EVENT_KANAL_GROESSE);
        Self {
            relay: SignalRelay::neu(registry.clone()),
            broadcaster: RoomBroadcaster::neu(
                directory.clone(),
                registry.clone(),
                config.standard_anzeigename.clone(),
            ),
            registry,
            directory,
            event_tx,
            kapazitaet: config.max_teilnehmer_pro_raum,
            standard_anzeigename: config.standard_anzeigename.clone(),
        }
    }

    // -----------------------------------------------------------------------
    // Verbindungen
    // -----------------------------------------------------------------------

    /// Registriert eine neue Verbindung mit frischer ID
    pub fn verbinden(&self) -> VerbindungsEmpfang {
        let connection_id = ConnectionId::new();
        let empfang = self
            .registry
            .registrieren(connection_id, self.standard_anzeigename.clone());
        self.ereignis(RaumEvent::Verbunden { connection_id });
        empfang
    }

    /// Raeumt eine getrennte Verbindung vollstaendig ab
    ///
    /// Idempotent: unbekannte Verbindungen werden ignoriert.
    pub fn verlassen(&self, connection_id: &ConnectionId) {
        if !self.registry.ist_verbunden(connection_id) {
            return;
        }

        if let Some(raum) = self.registry.raum_von(connection_id) {
            let name = self
                .registry
                .anzeigename(connection_id)
                .unwrap_or_else(|| self.standard_anzeigename.clone());
            self.raum_austritt(connection_id, &raum, &name);
        }

        if self.registry.entfernen(connection_id).is_some() {
            self.ereignis(RaumEvent::Getrennt {
                connection_id: *connection_id,
            });
        }
    }

    // -----------------------------------------------------------------------
    // Raeume
    // -----------------------------------------------------------------------

    /// Tritt einem Raum bei
    ///
    /// Ist die Verbindung bereits in einem anderen Raum, wird dieser erst nach
    /// erfolgreichem Beitritt verlassen. Ein abgelehnter Wechsel laesst die
    /// Verbindung im alten Raum.
    pub fn beitreten(
        &self,
        connection_id: ConnectionId,
        room_id: &RoomId,
        anzeigename: Option<&str>,
    ) -> SignalingResult<BeitrittsAntwort> {
        let alter_raum = self.registry.raum_von(&connection_id);
        let alter_name = self
            .registry
            .anzeigename(&connection_id)
            .ok_or(SignalingError::VerbindungGetrennt)?;
        let name = name_oder_standard(anzeigename, &self.standard_anzeigename);

        let (andere, ist_host) = match self.directory.beitreten(room_id, connection_id, self.kapazitaet) {
            Beitritt::Voll => {
                tracing::info!(
                    connection_id = %connection_id,
                    room_id = %room_id,
                    kapazitaet = self.kapazitaet,
                    "Raum voll – Beitritt abgelehnt"
                );
                self.ereignis(RaumEvent::RaumVoll {
                    connection_id,
                    room_id: room_id.clone(),
                });
                return Ok(BeitrittsAntwort::Voll);
            }
            Beitritt::BereitsMitglied { andere, ist_host } => {
                self.registry
                    .raum_zuordnen(&connection_id, room_id.clone(), name);
                return Ok(BeitrittsAntwort::Beigetreten { andere, ist_host });
            }
            Beitritt::Aufgenommen {
                andere,
                ist_host,
                neuer_raum,
            } => {
                tracing::info!(
                    connection_id = %connection_id,
                    room_id = %room_id,
                    ist_host,
                    mitglieder = andere.len() + 1,
                    "Raum beigetreten"
                );
                self.ereignis(RaumEvent::Beigetreten {
                    connection_id,
                    room_id: room_id.clone(),
                    ist_host,
                    neuer_raum,
                });
                (andere, ist_host)
            }
        };

        if !self
            .registry
            .raum_zuordnen(&connection_id, room_id.clone(), name)
        {
            // Verbindung ist waehrenddessen verschwunden, Beitritt zuruecknehmen
            self.raum_austritt(&connection_id, room_id, &alter_name);
            return Err(SignalingError::VerbindungGetrennt);
        }

        if let Some(alt) = alter_raum.filter(|alt| alt != room_id) {
            self.raum_austritt(&connection_id, &alt, &alter_name);
        }

        Ok(BeitrittsAntwort::Beigetreten { andere, ist_host })
    }

    /// Entfernt eine Verbindung aus einem Raum samt Benachrichtigungen
    fn raum_austritt(&self, connection_id: &ConnectionId, room_id: &RoomId, anzeigename: &str) {
        let abgang = ServerEvent::UserLeft(UserLeft {
            id: *connection_id,
            display_name: anzeigename.to_string(),
        });
        let melden = |austritt: &Austritt| {
            for mitglied in &austritt.verbleibend {
                self.registry.senden(mitglied, abgang.clone());
            }
            if let HostWechsel::Migriert { neuer, .. } = austritt.host_wechsel {
                host_migration::befoerderung_melden(&self.registry, &neuer);
            }
        };

        let Some(austritt) = self.directory.verlassen(room_id, connection_id, melden) else {
            return;
        };

        tracing::info!(
            connection_id = %connection_id,
            room_id = %room_id,
            verbleibend = austritt.verbleibend.len(),
            "Raum verlassen"
        );
        self.ereignis(RaumEvent::Verlassen {
            connection_id: *connection_id,
            room_id: room_id.clone(),
        });

        match austritt.host_wechsel {
            HostWechsel::Unveraendert => {}
            HostWechsel::Migriert { vorheriger, neuer } => {
                tracing::info!(
                    room_id = %room_id,
                    vorheriger = %vorheriger,
                    neuer = %neuer,
                    "Host migriert"
                );
                self.ereignis(RaumEvent::HostGewechselt {
                    room_id: room_id.clone(),
                    vorheriger_host: vorheriger,
                    neuer_host: neuer,
                });
            }
            HostWechsel::RaumLeer => {
                tracing::info!(room_id = %room_id, "Raum geschlossen");
                self.ereignis(RaumEvent::RaumGeschlossen {
                    room_id: room_id.clone(),
                });
            }
        }
    }

    /// Entfernt ein Mitglied auf Anweisung des Hosts
    ///
    /// Nicht-Hosts und Ziele ausserhalb des Raums werden still ignoriert.
    /// Das Ziel erhaelt `kicked`, danach wird seine Verbindung geschlossen;
    /// der Austritt laeuft ueber den normalen Trennungspfad.
    pub fn kicken(&self, anfrager: ConnectionId, room_id: &RoomId, ziel: ConnectionId) -> bool {
        let erlaubt = self
            .directory
            .mit_raum(room_id, |raum| {
                raum.host() == anfrager && raum.ist_mitglied(&ziel)
            })
            .unwrap_or(false);

        if !erlaubt {
            tracing::debug!(
                connection_id = %anfrager,
                room_id = %room_id,
                ziel = %ziel,
                "Kick ohne Berechtigung ignoriert"
            );
            return false;
        }

        self.registry.senden(&ziel, ServerEvent::Kicked);
        self.registry.trennen(&ziel);

        tracing::info!(
            host = %anfrager,
            room_id = %room_id,
            ziel = %ziel,
            "Mitglied gekickt"
        );
        self.ereignis(RaumEvent::Gekickt {
            room_id: room_id.clone(),
            host: anfrager,
            ziel,
        });
        true
    }

    // -----------------------------------------------------------------------
    // Relay & Broadcast
    // -----------------------------------------------------------------------

    pub fn signal_senden(&self, absender: ConnectionId, anfrage: SendingSignalRequest) -> bool {
        self.relay.angebot_weiterleiten(absender, anfrage)
    }

    pub fn signal_zurueckgeben(&self, absender: ConnectionId, anfrage: ReturningSignalRequest) -> bool {
        self.relay.antwort_weiterleiten(absender, anfrage)
    }

    pub fn nachricht_senden(&self, absender: ConnectionId, anfrage: SendMessageRequest) -> Option<usize> {
        self.broadcaster.chat_senden(absender, anfrage)
    }

    pub fn datei_senden(&self, absender: ConnectionId, anfrage: UploadFileRequest) -> Option<usize> {
        self.broadcaster.datei_senden(absender, anfrage)
    }

    pub fn reaktion_senden(&self, absender: ConnectionId, anfrage: SendReactionRequest) -> Option<usize> {
        self.broadcaster.reaktion_senden(absender, anfrage)
    }

    // -----------------------------------------------------------------------
    // Abfragen
    // -----------------------------------------------------------------------

    /// Abonniert alle Raum- und Verbindungsereignisse
    pub fn events_abonnieren(&self) -> broadcast::Receiver<RaumEvent> {
        self.event_tx.subscribe()
    }

    pub fn registry(&self) -> &ConnectionRegistry {
        &self.registry
    }

    pub fn directory(&self) -> &RoomDirectory {
        &self.directory
    }

    pub fn verbindungen_anzahl(&self) -> usize {
        self.registry.anzahl()
    }

    pub fn raum_anzahl(&self) -> usize {
        self.directory.raum_anzahl()
    }

    pub fn mitglieder(&self, room_id: &RoomId) -> Vec<ConnectionId> {
        self.directory.mitglieder(room_id)
    }

    pub fn host(&self, room_id: &RoomId) -> Option<ConnectionId> {
        self.directory.host(room_id)
    }

    fn ereignis(&self, event: RaumEvent) {
        // Ohne Abonnenten schlaegt send fehl, das ist kein Fehler
        let _ = self.event_tx.send(event);
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
