//! Signaling-Relay – Punkt-zu-Punkt-Weiterleitung von Verhandlungs-Payloads
//!
//! Der Server inspiziert `signal` nicht. Er ersetzt nur die Absender-ID durch
//! die vom Transport verifizierte Verbindungs-ID und stellt genau einem Ziel
//! zu. Ist das Ziel nicht (mehr) verbunden, wird still verworfen.

use treffpunkt_core::types::ConnectionId;
use treffpunkt_protocol::event::{
    ReturnedSignal, ReturningSignalRequest, SendingSignalRequest, UserJoined,
};
use treffpunkt_protocol::ServerEvent;

use crate::registry::ConnectionRegistry;

/// Leitet Angebote und Antworten zwischen zwei Verbindungen weiter
#[derive(Clone)]
pub struct SignalRelay {
    registry: ConnectionRegistry,
}

impl SignalRelay {
    pub fn neu(registry: ConnectionRegistry) -> Self {
        Self { registry }
    }

    /// Initiierendes Payload (`sending-signal` -> `user-joined`)
    ///
    /// Gibt `true` zurueck, wenn das Ziel erreicht wurde.
    pub fn angebot_weiterleiten(&self, absender: ConnectionId, anfrage: SendingSignalRequest) -> bool {
        if let Some(behauptet) = anfrage.caller_id.as_deref() {
            if behauptet != absender.inner().to_string() {
                tracing::warn!(
                    connection_id = %absender,
                    behauptet,
                    "Abweichende callerID ignoriert"
                );
            }
        }

        // Der Anzeigename kommt aus der Registry, nicht aus dem Payload
        let Some(display_name) = self.registry.anzeigename(&absender) else {
            return false;
        };

        let ziel = anfrage.user_to_signal;
        let event = ServerEvent::UserJoined(UserJoined {
            signal: anfrage.signal,
            caller_id: absender,
            display_name,
        });
        self.zustellen(absender, ziel, event)
    }

    /// Antwort-Payload (`returning-signal` -> `receiving-returned-signal`)
    pub fn antwort_weiterleiten(
        &self,
        absender: ConnectionId,
        anfrage: ReturningSignalRequest,
    ) -> bool {
        let ziel = anfrage.caller_id;
        let event = ServerEvent::ReceivingReturnedSignal(ReturnedSignal {
            signal: anfrage.signal,
            id: absender,
        });
        self.zustellen(absender, ziel, event)
    }

    fn zustellen(&self, absender: ConnectionId, ziel: ConnectionId, event: ServerEvent) -> bool {
        let name = event.name();
        let zugestellt = self.registry.senden(&ziel, event);
        if zugestellt {
            tracing::trace!(von = %absender, an = %ziel, event = name, "Relay zugestellt");
        } else {
            tracing::debug!(von = %absender, an = %ziel, event = name, "Relay-Ziel nicht erreichbar");
        }
        zugestellt
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn aufbau() -> (ConnectionRegistry, SignalRelay) {
        let registry = ConnectionRegistry::default();
        let relay = SignalRelay::neu(registry.clone());
        (registry, relay)
    }

    #[test]
    fn angebot_traegt_verifizierte_absender_id() {
        let (registry, relay) = aufbau();
        let (a, b) = (ConnectionId::new(), ConnectionId::new());
        let _ea = registry.registrieren(a, "Ada");
        let mut eb = registry.registrieren(b, "Bob");

        let zugestellt = relay.angebot_weiterleiten(
            a,
            SendingSignalRequest {
                user_to_signal: b,
                caller_id: Some(ConnectionId::new().inner().to_string()),
                signal: json!({"type": "offer"}),
                display_name: Some("Mallory".to_string()),
            },
        );
        assert!(zugestellt);

        match eb.events.try_recv() {
            Ok(ServerEvent::UserJoined(u)) => {
                assert_eq!(u.caller_id, a);
                assert_eq!(u.display_name, "Ada");
                assert_eq!(u.signal["type"], "offer");
            }
            andere => panic!("Erwartet user-joined, erhalten {andere:?}"),
        }
    }

    #[test]
    fn antwort_geht_an_den_initiator() {
        let (registry, relay) = aufbau();
        let (a, b) = (ConnectionId::new(), ConnectionId::new());
        let mut ea = registry.registrieren(a, "Ada");
        let _eb = registry.registrieren(b, "Bob");

        assert!(relay.antwort_weiterleiten(
            b,
            ReturningSignalRequest {
                caller_id: a,
                signal: json!({"type": "answer"}),
            },
        ));
        match ea.events.try_recv() {
            Ok(ServerEvent::ReceivingReturnedSignal(r)) => {
                assert_eq!(r.id, b);
                assert_eq!(r.signal["type"], "answer");
            }
            andere => panic!("Erwartet receiving-returned-signal, erhalten {andere:?}"),
        }
    }

    #[test]
    fn unbekanntes_ziel_wird_verworfen() {
        let (registry, relay) = aufbau();
        let a = ConnectionId::new();
        let _ea = registry.registrieren(a, "Ada");

        assert!(!relay.antwort_weiterleiten(
            a,
            ReturningSignalRequest {
                caller_id: ConnectionId::new(),
                signal: json!(null),
            },
        ));
    }
}
