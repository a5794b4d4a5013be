//! treffpunkt-signaling – Raum-Koordination und Signaling-Relay
//!
//! Dieser Crate verwaltet Verbindungen und Raeume, waehlt und migriert den
//! Host eines Raums, leitet Verhandlungs-Payloads zwischen genau zwei
//! Verbindungen weiter und verteilt Chat, Datei-Hinweise und Reaktionen an
//! alle Mitglieder eines Raums.
//!
//! ## Architektur
//!
//! ```text
//! TCP Listener (SignalingServer)
//!     |
//!     v
//! ClientConnection (pro Verbindung ein Task)
//!     |
//!     v
//! EventDispatcher
//!     |
//!     v
//! SessionHandler
//!     +-- RoomDirectory      (Raeume, Mitglieder, Host)
//!     +-- HostMigration      (Nachfolger bei Host-Austritt)
//!     +-- SignalRelay        (sending-signal / returning-signal)
//!     +-- RoomBroadcaster    (Chat, Datei, Reaktion)
//!     +-- ConnectionRegistry (Anzeigename, Raum, Send-Queue)
//! ```

pub mod broadcast;
pub mod connection;
pub mod directory;
pub mod dispatcher;
pub mod error;
pub mod host_migration;
pub mod registry;
pub mod relay;
pub mod server_state;
pub mod session;
pub mod tcp;

// Bequeme Re-Exporte
pub use broadcast::RoomBroadcaster;
pub use connection::ClientConnection;
pub use directory::RoomDirectory;
pub use dispatcher::EventDispatcher;
pub use error::{SignalingError, SignalingResult};
pub use registry::ConnectionRegistry;
pub use relay::SignalRelay;
pub use server_state::{SignalingConfig, SignalingState};
pub use session::{BeitrittsAntwort, SessionHandler};
pub use tcp::SignalingServer;
