//! Signaling-Events
//!
//! Definiert alle Events die ueber die Verbindung zwischen Client und
//! Server ausgetauscht werden.
//!
//! ## Design
//! - Jedes Event ist ein JSON-Objekt `{"event": "<name>", "data": <payload>}`
//! - Event-Namen in kebab-case, Payload-Felder in camelCase
//! - Zwei getrennte Enums: `ClientEvent` (Client -> Server) und
//!   `ServerEvent` (Server -> Client), damit keine Richtung die andere
//!   versehentlich akzeptiert
//! - Relay-Payloads (`signal`) bleiben opakes JSON, der Server inspiziert sie nicht

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use treffpunkt_core::types::{ConnectionId, RoomId};
use uuid::Uuid;

// ---------------------------------------------------------------------------
// Fehler-Codes
// ---------------------------------------------------------------------------

/// Standardisierte Fehler-Codes fuer `error`-Events
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    /// Frame enthielt kein gueltiges Client-Event
    InvalidPayload,
    /// Frame ueberschreitet die maximale Groesse, Verbindung wird getrennt
    FrameTooLarge,
    /// Server faehrt herunter, Verbindung wird getrennt
    ServerShutdown,
}

// ---------------------------------------------------------------------------
// Client -> Server
// ---------------------------------------------------------------------------

/// Raum beitreten
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JoinRoomRequest {
    #[serde(alias = "roomID")]
    pub room_id: RoomId,
    /// Anzeigename, faellt serverseitig auf einen Platzhalter zurueck
    #[serde(default)]
    pub display_name: Option<String>,
}

/// Initiierendes Relay-Payload (neues Mitglied -> bestehendes Mitglied)
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SendingSignalRequest {
    /// Ziel-Verbindung (aus der `all-users`-Liste)
    pub user_to_signal: ConnectionId,
    /// Vom Client behauptete Absender-ID. Wird nie weitergegeben.
    #[serde(rename = "callerID", default)]
    pub caller_id: Option<String>,
    pub signal: serde_json::Value,
    /// Wird ignoriert, der Server nutzt den registrierten Anzeigenamen
    #[serde(default)]
    pub display_name: Option<String>,
}

/// Antwort-Relay-Payload (zurueck an den Initiator)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReturningSignalRequest {
    #[serde(rename = "callerID")]
    pub caller_id: ConnectionId,
    pub signal: serde_json::Value,
}

/// Mitglied aus dem Raum entfernen (nur Host)
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct KickUserRequest {
    #[serde(alias = "roomID")]
    pub room_id: RoomId,
    pub target_id: ConnectionId,
}

/// Chat-Nachricht an den Raum
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SendMessageRequest {
    #[serde(alias = "roomID")]
    pub room_id: RoomId,
    pub message: String,
    #[serde(default)]
    pub sender: Option<String>,
}

/// Datei-Hinweis an den Raum (Inhalt als Data-URL)
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadFileRequest {
    #[serde(alias = "roomID")]
    pub room_id: RoomId,
    pub file_data: String,
    pub file_name: String,
    pub file_type: String,
    #[serde(default)]
    pub sender: Option<String>,
}

/// Reaktion (Emoji o.ae.) an den Raum
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SendReactionRequest {
    #[serde(alias = "roomID")]
    pub room_id: RoomId,
    pub reaction: String,
    #[serde(default)]
    pub sender: Option<String>,
}

// ---------------------------------------------------------------------------
// Keepalive
// ---------------------------------------------------------------------------

/// Ping (Client -> Server oder Server -> Client)
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PingMessage {
    /// Unix-Timestamp in Millisekunden fuer RTT-Messung
    pub timestamp_ms: u64,
}

/// Pong-Antwort (spiegelt Timestamp zurueck)
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PongMessage {
    /// Originaler Timestamp aus dem Ping
    pub echo_timestamp_ms: u64,
    /// Server-eigener Timestamp
    pub server_timestamp_ms: u64,
}

// ---------------------------------------------------------------------------
// Server -> Client
// ---------------------------------------------------------------------------

/// Weitergeleitetes initiierendes Relay-Payload
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserJoined {
    pub signal: serde_json::Value,
    /// Vom Transport verifizierte Absender-ID
    #[serde(rename = "callerID")]
    pub caller_id: ConnectionId,
    pub display_name: String,
}

/// Weitergeleitetes Antwort-Relay-Payload
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReturnedSignal {
    pub signal: serde_json::Value,
    /// Vom Transport verifizierte Absender-ID
    pub id: ConnectionId,
}

/// Abgangsmeldung an die verbleibenden Mitglieder
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserLeft {
    pub id: ConnectionId,
    pub display_name: String,
}

/// Art einer Raum-Nachricht
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageKind {
    Text,
    File,
}

/// Zugestellte Chat- oder Datei-Nachricht
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatMessage {
    /// Text bzw. Dateiname
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file_data: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file_type: Option<String>,
    /// Vom Client gelieferte Absender-Bezeichnung
    pub sender: String,
    /// Verifizierte Verbindungs-ID des Absenders
    pub sender_id: ConnectionId,
    #[serde(rename = "type")]
    pub kind: MessageKind,
    /// Server-Zeitstempel
    pub timestamp: DateTime<Utc>,
}

/// Zugestellte Reaktion
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Reaction {
    /// Zufaellige ID pro Reaktion (Client-seitige Deduplizierung der Animation)
    pub id: Uuid,
    pub reaction: String,
    pub sender: String,
    pub sender_id: ConnectionId,
    pub timestamp: DateTime<Utc>,
}

/// Standardisierte Fehler-Antwort
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub code: ErrorCode,
    pub message: String,
}

// ---------------------------------------------------------------------------
// Haupt-Enums
// ---------------------------------------------------------------------------

/// Alle Events, die ein Client senden darf
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "event", content = "data", rename_all = "kebab-case")]
pub enum ClientEvent {
    JoinRoom(JoinRoomRequest),
    SendingSignal(SendingSignalRequest),
    ReturningSignal(ReturningSignalRequest),
    KickUser(KickUserRequest),
    SendMessage(SendMessageRequest),
    UploadFile(UploadFileRequest),
    SendReaction(SendReactionRequest),
    Ping(PingMessage),
    Pong(PongMessage),
}

/// Alle Events, die der Server an einen Client sendet
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "event", content = "data", rename_all = "kebab-case")]
pub enum ServerEvent {
    /// Beitritt abgelehnt, Raum hat die Kapazitaetsgrenze erreicht
    RoomFull,
    /// Alle anderen Mitglieder (ohne den Beitretenden selbst)
    AllUsers(Vec<ConnectionId>),
    /// Host-Status des Empfaengers
    SetHost(bool),
    UserJoined(UserJoined),
    ReceivingReturnedSignal(ReturnedSignal),
    UserLeft(UserLeft),
    /// Empfaenger wurde vom Host entfernt
    Kicked,
    ReceiveMessage(ChatMessage),
    ReceiveReaction(Reaction),
    Ping(PingMessage),
    Pong(PongMessage),
    Error(ErrorResponse),
}

impl ServerEvent {
    /// Erstellt eine Ping-Nachricht
    pub fn ping(timestamp_ms: u64) -> Self {
        Self::Ping(PingMessage { timestamp_ms })
    }

    /// Erstellt eine Pong-Antwort
    pub fn pong(echo_timestamp_ms: u64, server_timestamp_ms: u64) -> Self {
        Self::Pong(PongMessage {
            echo_timestamp_ms,
            server_timestamp_ms,
        })
    }

    /// Erstellt ein Fehler-Event
    pub fn fehler(code: ErrorCode, message: impl Into<String>) -> Self {
        Self::Error(ErrorResponse {
            code,
            message: message.into(),
        })
    }

    /// Event-Name wie auf dem Draht (fuer Logging)
    pub fn name(&self) -> &'static str {
        match self {
            Self::RoomFull => "room-full",
            Self::AllUsers(_) => "all-users",
            Self::SetHost(_) => "set-host",
            Self::UserJoined(_) => "user-joined",
            Self::ReceivingReturnedSignal(_) => "receiving-returned-signal",
            Self::UserLeft(_) => "user-left",
            Self::Kicked => "kicked",
            Self::ReceiveMessage(_) => "receive-message",
            Self::ReceiveReaction(_) => "receive-reaction",
            Self::Ping(_) => "ping",
            Self::Pong(_) => "pong",
            Self::Error(_) => "error",
        }
    }

    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string(self)
    }

    pub fn from_json(json: &str) -> serde_json::Result<Self> {
        serde_json::from_str(json)
    }
}

impl ClientEvent {
    /// Event-Name wie auf dem Draht (fuer Logging)
    pub fn name(&self) -> &'static str {
        match self {
            Self::JoinRoom(_) => "join-room",
            Self::SendingSignal(_) => "sending-signal",
            Self::ReturningSignal(_) => "returning-signal",
            Self::KickUser(_) => "kick-user",
            Self::SendMessage(_) => "send-message",
            Self::UploadFile(_) => "upload-file",
            Self::SendReaction(_) => "send-reaction",
            Self::Ping(_) => "ping",
            Self::Pong(_) => "pong",
        }
    }

    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string(self)
    }

    pub fn from_json(json: &str) -> serde_json::Result<Self> {
        serde_json::from_str(json)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
