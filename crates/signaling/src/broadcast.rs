//! Raum-Broadcast – Chat, Datei-Hinweise und Reaktionen an alle Mitglieder
//!
//! Zugestellt wird an jedes Mitglied des Raums, der Absender eingeschlossen.
//! Das Event wird unter dem exklusiven Guard des Raums gebaut und eingereiht,
//! dadurch sehen alle Empfaenger die Nachrichten eines Raums in derselben
//! Reihenfolge und die Zeitstempel sind pro Raum monoton.
//!
//! Nur Mitglieder des adressierten Raums duerfen senden, alles andere wird
//! still verworfen.

use chrono::Utc;
use treffpunkt_core::types::{ConnectionId, RoomId};
use treffpunkt_protocol::event::{
    ChatMessage, MessageKind, Reaction, SendMessageRequest, SendReactionRequest, UploadFileRequest,
};
use treffpunkt_protocol::ServerEvent;
use uuid::Uuid;

use crate::directory::RoomDirectory;
use crate::registry::{name_oder_standard, ConnectionRegistry};

/// Verteilt raumweite Nachrichten
#[derive(Clone)]
pub struct RoomBroadcaster {
    directory: RoomDirectory,
    registry: ConnectionRegistry,
    standard_anzeigename: String,
}

impl RoomBroadcaster {
    pub fn neu(
        directory: RoomDirectory,
        registry: ConnectionRegistry,
        standard_anzeigename: impl Into<String>,
    ) -> Self {
        Self {
            directory,
            registry,
            standard_anzeigename: standard_anzeigename.into(),
        }
    }

    /// Baut ein Event und stellt es allen Mitgliedern eines Raums zu
    ///
    /// Gibt die Anzahl der Empfaenger zurueck, `None` wenn der Raum nicht
    /// existiert oder der Absender kein Mitglied ist.
    pub fn verteilen<F>(&self, absender: &ConnectionId, room_id: &RoomId, baue: F) -> Option<usize>
    where
        F: FnOnce() -> ServerEvent,
    {
        let ergebnis = self
            .directory
            .mit_raum(room_id, |raum| {
                if !raum.ist_mitglied(absender) {
                    return None;
                }
                let event = baue();
                for mitglied in raum.mitglieder() {
                    self.registry.senden(mitglied, event.clone());
                }
                Some(raum.mitglieder().len())
            })
            .flatten();

        if ergebnis.is_none() {
            tracing::debug!(
                connection_id = %absender,
                room_id = %room_id,
                "Broadcast von Nicht-Mitglied verworfen"
            );
        }
        ergebnis
    }

    /// Chat-Nachricht (`send-message`)
    pub fn chat_senden(&self, absender: ConnectionId, anfrage: SendMessageRequest) -> Option<usize> {
        let sender = self.label(anfrage.sender.as_deref());
        self.verteilen(&absender, &anfrage.room_id, || {
            ServerEvent::ReceiveMessage(ChatMessage {
                message: anfrage.message,
                file_data: None,
                file_type: None,
                sender,
                sender_id: absender,
                kind: MessageKind::Text,
                timestamp: Utc::now(),
            })
        })
    }

    /// Datei-Hinweis (`upload-file`), der Dateiname steht in `message`
    pub fn datei_senden(&self, absender: ConnectionId, anfrage: UploadFileRequest) -> Option<usize> {
        let sender = self.label(anfrage.sender.as_deref());
        self.verteilen(&absender, &anfrage.room_id, || {
            ServerEvent::ReceiveMessage(ChatMessage {
                message: anfrage.file_name,
                file_data: Some(anfrage.file_data),
                file_type: Some(anfrage.file_type),
                sender,
                sender_id: absender,
                kind: MessageKind::File,
                timestamp: Utc::now(),
            })
        })
    }

    /// Reaktion (`send-reaction`) mit zufaelliger ID pro Ereignis
    pub fn reaktion_senden(
        &self,
        absender: ConnectionId,
        anfrage: SendReactionRequest,
    ) -> Option<usize> {
        let sender = self.label(anfrage.sender.as_deref());
        self.verteilen(&absender, &anfrage.room_id, || {
            ServerEvent::ReceiveReaction(Reaction {
                id: Uuid::new_v4(),
                reaction: anfrage.reaction,
                sender,
                sender_id: absender,
                timestamp: Utc::now(),
            })
        })
    }

    fn label(&self, roh: Option<&str>) -> String {
        name_oder_standard(roh, &self.standard_anzeigename)
    }
}
