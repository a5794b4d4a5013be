//! Host-Migration
//!
//! Verlaesst der Host einen Raum, uebernimmt das Mitglied, das am laengsten
//! im Raum ist, also das erste der verbleibenden Mitglieder. Nur der neue
//! Host wird benachrichtigt.

use treffpunkt_core::types::ConnectionId;
use treffpunkt_protocol::ServerEvent;

use crate::directory::Raum;
use crate::registry::ConnectionRegistry;

/// Auswirkung eines Austritts auf die Host-Rolle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HostWechsel {
    /// Ein anderes Mitglied ist gegangen, der Host bleibt
    Unveraendert,
    /// Der Host ist gegangen, der angegebene Nachfolger ist neuer Host
    Migriert { vorheriger: ConnectionId, neuer: ConnectionId },
    /// Niemand ist uebrig, der Raum wird geloescht
    RaumLeer,
}

/// Nachfolger aus den verbleibenden Mitgliedern (Beitrittsreihenfolge)
pub fn nachfolger(verbleibend: &[ConnectionId]) -> Option<ConnectionId> {
    verbleibend.first().copied()
}

/// Wendet die Nachfolgeregel an, nachdem `gegangen` aus `raum` entfernt wurde
pub(crate) fn nach_austritt(raum: &mut Raum, gegangen: &ConnectionId) -> HostWechsel {
    match nachfolger(raum.mitglieder()) {
        None => HostWechsel::RaumLeer,
        Some(_) if raum.host() != *gegangen => HostWechsel::Unveraendert,
        Some(neuer) => {
            raum.host_setzen(neuer);
            HostWechsel::Migriert {
                vorheriger: *gegangen,
                neuer,
            }
        }
    }
}

/// Teilt dem neuen Host seine Rolle mit
pub fn befoerderung_melden(registry: &ConnectionRegistry, neuer_host: &ConnectionId) -> bool {
    registry.senden(neuer_host, ServerEvent::SetHost(true))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::directory::RoomDirectory;
    use treffpunkt_core::types::RoomId;

    #[test]
    fn nachfolger_ist_aeltestes_mitglied() {
        let (a, b) = (ConnectionId::new(), ConnectionId::new());
        assert_eq!(nachfolger(&[a, b]), Some(a));
        assert_eq!(nachfolger(&[]), None);
    }

    #[test]
    fn host_austritt_migriert_zum_naechsten() {
        let dir = RoomDirectory::neu();
        let raum = RoomId::from("r1");
        let (a, b, c) = (ConnectionId::new(), ConnectionId::new(), ConnectionId::new());
        for id in [a, b, c] {
            dir.beitreten(&raum, id, 30);
        }

        let austritt = dir.verlassen(&raum, &a, |_| {}).expect("a war Mitglied");
        assert_eq!(
            austritt.host_wechsel,
            HostWechsel::Migriert {
                vorheriger: a,
                neuer: b
            }
        );
        assert_eq!(dir.host(&raum), Some(b));
    }

    #[test]
    fn befoerderung_erreicht_nur_den_neuen_host() {
        let registry = ConnectionRegistry::default();
        let (neu, anderer) = (ConnectionId::new(), ConnectionId::new());
        let mut empfang_neu = registry.registrieren(neu, "Neu");
        let mut empfang_anderer = registry.registrieren(anderer, "Anderer");

        assert!(befoerderung_melden(&registry, &neu));
        assert!(matches!(
            empfang_neu.events.try_recv(),
            Ok(ServerEvent::SetHost(true))
        ));
        assert!(empfang_anderer.events.try_recv().is_err());
    }
}
