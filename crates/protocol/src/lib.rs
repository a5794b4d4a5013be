//! treffpunkt-protocol – Signaling-Protokoll
//!
//! Dieses Crate definiert alle Events, die zwischen Client und Server
//! ausgetauscht werden, sowie das Frame-Format auf dem TCP-Stream.

pub mod event;
pub mod wire;

pub use event::{ClientEvent, ErrorCode, ServerEvent};
pub use wire::{ClientCodec, FrameCodec, PayloadFehler, ServerCodec, WireFehler};
