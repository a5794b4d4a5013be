//! Event-Dispatcher – Routet Client-Events an den Session-Handler
//!
//! Synchrone Dispatch-Tabelle: jedes Event wird mit der verifizierten
//! Verbindungs-ID und dem typisierten Payload verarbeitet. Zurueck kommen
//! die Events, die direkt an den Aufrufer gehen. Alles was andere
//! Verbindungen erreicht, laeuft ueber deren Send-Queues.

use treffpunkt_core::types::ConnectionId;
use treffpunkt_protocol::{ClientEvent, ServerEvent};

use crate::session::{BeitrittsAntwort, SessionHandler};

/// Unix-Zeit in Millisekunden
pub(crate) fn jetzt_ms() -> u64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as u64
}

/// Zentraler Event-Dispatcher
pub struct EventDispatcher {
    session: SessionHandler,
}

impl EventDispatcher {
    /// Erstellt einen neuen Dispatcher
    pub fn neu(session: SessionHandler) -> Self {
        Self { session }
    }

    /// Verarbeitet ein eingehendes Event und gibt die Antworten zurueck
    pub fn dispatch(&self, von: ConnectionId, event: ClientEvent) -> Vec<ServerEvent> {
        match event {
            // -------------------------------------------------------------------
            // Raeume
            // -------------------------------------------------------------------
            ClientEvent::JoinRoom(req) => {
                match self
                    .session
                    .beitreten(von, &req.room_id, req.display_name.as_deref())
                {
                    Ok(BeitrittsAntwort::Voll) => vec![ServerEvent::RoomFull],
                    Ok(BeitrittsAntwort::Beigetreten { andere, ist_host }) => {
                        vec![ServerEvent::AllUsers(andere), ServerEvent::SetHost(ist_host)]
                    }
                    Err(e) => {
                        tracing::debug!(connection_id = %von, fehler = %e, "Beitritt verworfen");
                        Vec::new()
                    }
                }
            }

            ClientEvent::KickUser(req) => {
                self.session.kicken(von, &req.room_id, req.target_id);
                Vec::new()
            }

            // -------------------------------------------------------------------
            // Relay
            // -------------------------------------------------------------------
            ClientEvent::SendingSignal(req) => {
                self.session.signal_senden(von, req);
                Vec::new()
            }

            ClientEvent::ReturningSignal(req) => {
                self.session.signal_zurueckgeben(von, req);
                Vec::new()
            }

            // -------------------------------------------------------------------
            // Broadcast
            // -------------------------------------------------------------------
            ClientEvent::SendMessage(req) => {
                self.session.nachricht_senden(von, req);
                Vec::new()
            }

            ClientEvent::UploadFile(req) => {
                self.session.datei_senden(von, req);
                Vec::new()
            }

            ClientEvent::SendReaction(req) => {
                self.session.reaktion_senden(von, req);
                Vec::new()
            }

            // -------------------------------------------------------------------
            // Keepalive
            // -------------------------------------------------------------------
            ClientEvent::Ping(ping) => vec![ServerEvent::pong(ping.timestamp_ms, jetzt_ms())],

            ClientEvent::Pong(_) => {
                // Pong-Antworten vom Client werden nur geloggt (RTT-Messung)
                tracing::trace!(connection_id = %von, "Pong empfangen");
                Vec::new()
            }
        }
    }
}
