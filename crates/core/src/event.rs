//! Raum-Ereignisse
//!
//! Der Session-Handler veroeffentlicht jede Zustandsaenderung an Raeumen und
//! Verbindungen als `RaumEvent`. Abonnenten (z.B. die Metriken) lesen den
//! Strom, ohne selbst auf Registry oder Raumverzeichnis zuzugreifen.

use crate::types::{ConnectionId, RoomId};
use serde::{Deserialize, Serialize};

/// Alle Lebenszyklus-Ereignisse rund um Verbindungen und Raeume
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum RaumEvent {
    // --- Verbindungen ---
    /// Transport hat eine neue Verbindung gemeldet
    Verbunden { connection_id: ConnectionId },
    /// Verbindung ist endgueltig weg (Registry-Eintrag entfernt)
    Getrennt { connection_id: ConnectionId },

    // --- Raeume ---
    /// Verbindung ist einem Raum beigetreten
    Beigetreten {
        connection_id: ConnectionId,
        room_id: RoomId,
        ist_host: bool,
        /// Raum wurde durch diesen Beitritt erst angelegt
        neuer_raum: bool,
    },
    /// Beitritt abgelehnt, Raum ist voll
    RaumVoll {
        connection_id: ConnectionId,
        room_id: RoomId,
    },
    /// Verbindung hat einen Raum verlassen
    Verlassen {
        connection_id: ConnectionId,
        room_id: RoomId,
    },
    /// Host-Rolle ist auf ein anderes Mitglied uebergegangen
    HostGewechselt {
        room_id: RoomId,
        vorheriger_host: ConnectionId,
        neuer_host: ConnectionId,
    },
    /// Letztes Mitglied ist gegangen, der Raum existiert nicht mehr
    RaumGeschlossen { room_id: RoomId },
    /// Host hat ein Mitglied entfernt
    Gekickt {
        room_id: RoomId,
        host: ConnectionId,
        ziel: ConnectionId,
    },
}

impl RaumEvent {
    /// Raum, auf den sich das Ereignis bezieht (falls vorhanden)
    pub fn room_id(&self) -> Option<&RoomId> {
        match self {
            Self::Verbunden { .. } | Self::Getrennt { .. } => None,
            Self::Beigetreten { room_id, .. }
            | Self::RaumVoll { room_id, .. }
            | Self::Verlassen { room_id, .. }
            | Self::HostGewechselt { room_id, .. }
            | Self::RaumGeschlossen { room_id }
            | Self::Gekickt { room_id, .. } => Some(room_id),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn event_ist_serde_kompatibel() {
        let event = RaumEvent::HostGewechselt {
            room_id: RoomId::from("r1"),
            vorheriger_host: ConnectionId::new(),
            neuer_host: ConnectionId::new(),
        };
        let json = serde_json::to_string(&event).unwrap();
        let zurueck: RaumEvent = serde_json::from_str(&json).unwrap();
        assert_eq!(zurueck, event);
    }

    #[test]
    fn room_id_nur_bei_raum_ereignissen() {
        let conn = ConnectionId::new();
        assert!(RaumEvent::Verbunden { connection_id: conn }.room_id().is_none());
        let geschlossen = RaumEvent::RaumGeschlossen {
            room_id: RoomId::from("r1"),
        };
        assert_eq!(geschlossen.room_id(), Some(&RoomId::from("r1")));
    }
}
