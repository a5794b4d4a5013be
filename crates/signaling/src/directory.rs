//! Raumverzeichnis – Welche Verbindungen sind in welchem Raum, wer ist Host
//!
//! Jeder Raum haelt seine Mitglieder in Beitrittsreihenfolge. Ein Raum
//! entsteht beim ersten Beitritt (der Beitretende wird Host) und verschwindet
//! mit dem letzten Mitglied. Leere Raeume gibt es im Verzeichnis nie.
//!
//! ## Sperren
//! Jede Mutation eines Raums laeuft unter dem exklusiven DashMap-Guard dieses
//! Raums: Kapazitaetspruefung und Einfuegen, Entfernen samt Host-Migration
//! und Loeschen des leeren Raums sind jeweils ein atomarer Schritt.
//! Waehrend ein Guard gehalten wird, darf die Registry gesperrt werden,
//! umgekehrt nie.

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use std::sync::Arc;
use treffpunkt_core::types::{ConnectionId, RoomId};

use crate::host_migration::{self, HostWechsel};

/// Standard-Kapazitaet eines Raums
pub const MAX_TEILNEHMER_PRO_RAUM: usize = 30;

// ---------------------------------------------------------------------------
// Raum
// ---------------------------------------------------------------------------

/// Ein aktiver Raum
///
/// Invariante: `mitglieder` ist nicht leer, enthaelt keine Duplikate und
/// `host` ist eines der Mitglieder.
#[derive(Debug, Clone)]
pub struct Raum {
    id: RoomId,
    mitglieder: Vec<ConnectionId>,
    host: ConnectionId,
}

impl Raum {
    fn neu(id: RoomId, erster: ConnectionId) -> Self {
        Self {
            id,
            mitglieder: vec![erster],
            host: erster,
        }
    }

    pub fn id(&self) -> &RoomId {
        &self.id
    }

    /// Mitglieder in Beitrittsreihenfolge
    pub fn mitglieder(&self) -> &[ConnectionId] {
        &self.mitglieder
    }

    pub fn host(&self) -> ConnectionId {
        self.host
    }

    pub fn ist_mitglied(&self, connection_id: &ConnectionId) -> bool {
        self.mitglieder.contains(connection_id)
    }

    /// Alle Mitglieder ausser der angegebenen Verbindung
    pub fn andere(&self, connection_id: &ConnectionId) -> Vec<ConnectionId> {
        self.mitglieder
            .iter()
            .filter(|m| *m != connection_id)
            .copied()
            .collect()
    }

    pub(crate) fn host_setzen(&mut self, neuer_host: ConnectionId) {
        debug_assert!(self.ist_mitglied(&neuer_host));
        self.host = neuer_host;
    }
}

// ---------------------------------------------------------------------------
// Ergebnisse
// ---------------------------------------------------------------------------

/// Ergebnis eines Beitrittsversuchs
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Beitritt {
    /// Raum hat die Kapazitaetsgrenze erreicht, nichts wurde veraendert
    Voll,
    /// Verbindung wurde angehaengt
    Aufgenommen {
        /// Mitglieder vor dem Beitritt (ohne den Beitretenden)
        andere: Vec<ConnectionId>,
        ist_host: bool,
        neuer_raum: bool,
    },
    /// Verbindung war bereits Mitglied, nichts wurde veraendert
    BereitsMitglied {
        andere: Vec<ConnectionId>,
        ist_host: bool,
    },
}

/// Ergebnis eines Austritts
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Austritt {
    pub room_id: RoomId,
    /// Mitglieder nach dem Austritt, in Beitrittsreihenfolge
    pub verbleibend: Vec<ConnectionId>,
    pub host_wechsel: HostWechsel,
}

// ---------------------------------------------------------------------------
// RoomDirectory
// ---------------------------------------------------------------------------

/// Verzeichnis aller aktiven Raeume
///
/// Clone teilt den inneren Zustand.
#[derive(Clone, Default)]
pub struct RoomDirectory {
    raeume: Arc<DashMap<RoomId, Raum>>,
}

impl RoomDirectory {
    pub fn neu() -> Self {
        Self::default()
    }

    /// Haengt eine Verbindung an einen Raum an (legt ihn bei Bedarf an)
    pub fn beitreten(
        &self,
        room_id: &RoomId,
        connection_id: ConnectionId,
        kapazitaet: usize,
    ) -> Beitritt {
        match self.raeume.entry(room_id.clone()) {
            Entry::Occupied(mut eintrag) => {
                let raum = eintrag.get_mut();
                if raum.ist_mitglied(&connection_id) {
                    return Beitritt::BereitsMitglied {
                        andere: raum.andere(&connection_id),
                        ist_host: raum.host == connection_id,
                    };
                }
                if raum.mitglieder.len() >= kapazitaet {
                    return Beitritt::Voll;
                }
                let andere = raum.mitglieder.clone();
                raum.mitglieder.push(connection_id);
                Beitritt::Aufgenommen {
                    andere,
                    ist_host: false,
                    neuer_raum: false,
                }
            }
            Entry::Vacant(eintrag) => {
                if kapazitaet == 0 {
                    return Beitritt::Voll;
                }
                eintrag.insert(Raum::neu(room_id.clone(), connection_id));
                Beitritt::Aufgenommen {
                    andere: Vec::new(),
                    ist_host: true,
                    neuer_raum: true,
                }
            }
        }
    }

    /// Entfernt eine Verbindung aus einem Raum
    ///
    /// Ist die Verbindung Host, wird der Nachfolger bestimmt. Ein leerer Raum
    /// wird geloescht. `melden` laeuft noch unter dem Guard des Raums, damit
    /// Abgangsmeldungen nicht mit Broadcasts desselben Raums ueberholen.
    /// Gibt `None` zurueck, wenn die Verbindung nicht Mitglied war.
    pub fn verlassen<F>(
        &self,
        room_id: &RoomId,
        connection_id: &ConnectionId,
        melden: F,
    ) -> Option<Austritt>
    where
        F: FnOnce(&Austritt),
    {
        let Entry::Occupied(mut eintrag) = self.raeume.entry(room_id.clone()) else {
            return None;
        };

        let raum = eintrag.get_mut();
        let position = raum.mitglieder.iter().position(|m| m == connection_id)?;
        raum.mitglieder.remove(position);

        let austritt = Austritt {
            room_id: room_id.clone(),
            verbleibend: raum.mitglieder.clone(),
            host_wechsel: host_migration::nach_austritt(raum, connection_id),
        };

        if austritt.host_wechsel == HostWechsel::RaumLeer {
            eintrag.remove();
        }
        melden(&austritt);
        Some(austritt)
    }

    /// Fuehrt `f` unter dem exklusiven Guard eines Raums aus
    ///
    /// Aufrufe fuer denselben Raum laufen dadurch strikt nacheinander.
    pub fn mit_raum<R>(&self, room_id: &RoomId, f: impl FnOnce(&Raum) -> R) -> Option<R> {
        let raum = self.raeume.get_mut(room_id)?;
        Some(f(&raum))
    }

    /// Mitglieder eines Raums in Beitrittsreihenfolge (leer wenn unbekannt)
    pub fn mitglieder(&self, room_id: &RoomId) -> Vec<ConnectionId> {
        self.raeume
            .get(room_id)
            .map(|r| r.mitglieder.clone())
            .unwrap_or_default()
    }

    pub fn host(&self, room_id: &RoomId) -> Option<ConnectionId> {
        self.raeume.get(room_id).map(|r| r.host)
    }

    pub fn ist_host(&self, room_id: &RoomId, connection_id: &ConnectionId) -> bool {
        self.host(room_id).as_ref() == Some(connection_id)
    }

    pub fn ist_mitglied(&self, room_id: &RoomId, connection_id: &ConnectionId) -> bool {
        self.raeume
            .get(room_id)
            .is_some_and(|r| r.ist_mitglied(connection_id))
    }

    pub fn existiert(&self, room_id: &RoomId) -> bool {
        self.raeume.contains_key(room_id)
    }

    /// Anzahl der aktiven Raeume
    pub fn raum_anzahl(&self) -> usize {
        self.raeume.len()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
