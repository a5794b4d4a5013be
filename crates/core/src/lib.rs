//! treffpunkt-core – Gemeinsame Typen
//!
//! Dieses Crate stellt die Identifikationstypen und Raum-Ereignisse bereit,
//! die von allen anderen Treffpunkt-Crates gemeinsam genutzt werden.

pub mod event;
pub mod types;

// Re-Exporte fuer bequemen Zugriff
pub use event::RaumEvent;
pub use types::{ConnectionId, RoomId};
