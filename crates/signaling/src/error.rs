//! Fehlertypen fuer den Signaling-Service

use thiserror::Error;
use treffpunkt_protocol::WireFehler;

/// Fehlertyp fuer den Signaling-Service
///
/// Alle Varianten betreffen genau eine Verbindung. Keiner dieser Fehler ist
/// fatal fuer den Prozess.
#[derive(Debug, Error)]
pub enum SignalingError {
    /// IO-Fehler (TCP, Socket)
    #[error("IO-Fehler: {0}")]
    Io(#[from] std::io::Error),

    /// Fehler im Frame-Format (zu grosser Frame, Serialisierung)
    #[error("Wire-Fehler: {0}")]
    Wire(#[from] WireFehler),

    /// Verbindung wurde getrennt
    #[error("Verbindung getrennt")]
    VerbindungGetrennt,

    /// Timeout (Keepalive)
    #[error("Timeout")]
    Timeout,
}

impl SignalingError {
    /// Regulaeres Verbindungsende, kein Grund fuer eine Warnung im Log
    pub fn ist_regulaer(&self) -> bool {
        matches!(self, Self::VerbindungGetrennt)
    }
}

/// Result-Typ fuer den Signaling-Service
pub type SignalingResult<T> = Result<T, SignalingError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fehler_anzeige() {
        assert_eq!(SignalingError::Timeout.to_string(), "Timeout");
        assert_eq!(
            SignalingError::VerbindungGetrennt.to_string(),
            "Verbindung getrennt"
        );
    }

    #[test]
    fn wire_fehler_konvertierung() {
        let e: SignalingError = WireFehler::FrameZuGross {
            laenge: 10,
            maximum: 5,
        }
        .into();
        assert!(matches!(e, SignalingError::Wire(_)));
        assert!(!e.ist_regulaer());
        assert!(SignalingError::VerbindungGetrennt.ist_regulaer());
    }
}
