//! Wire-Format fuer TCP-Verbindungen
//!
//! Frame-basiertes Protokoll: Length(u32 big-endian) + JSON-Payload.
//!
//! ## Frame-Format
//!
//! ```text
//! +--------+--------+--------+--------+----...----+
//! | Laenge (u32 BE) | 4 Bytes        | Payload    |
//! +--------+--------+--------+--------+----...----+
//! ```
//!
//! Die Laenge gibt die Anzahl der Payload-Bytes an (ohne die 4 Laengen-Bytes).
//!
//! ## Fehlerklassen
//! - Kaputtes Framing (zu grosser Frame, IO) ist fatal: der Stream laesst sich
//!   nicht mehr synchronisieren, der Decoder liefert einen `WireFehler`.
//! - Ein vollstaendiger Frame mit ungueltigem JSON ist nicht fatal: der Decoder
//!   liefert `Ok(Some(Err(PayloadFehler)))` und der naechste Frame wird normal
//!   gelesen.

use bytes::{Buf, BufMut, BytesMut};
use serde::{de::DeserializeOwned, Serialize};
use std::io;
use std::marker::PhantomData;
use thiserror::Error;
use tokio_util::codec::{Decoder, Encoder};

use crate::event::{ClientEvent, ServerEvent};

// ---------------------------------------------------------------------------
// Konstanten
// ---------------------------------------------------------------------------

/// Standard-maximale Frame-Groesse (8 MB, reicht fuer Data-URL-Dateien bis 5 MB)
pub const DEFAULT_MAX_FRAME_SIZE: usize = 8 * 1024 * 1024;

/// Groesse des Laengen-Felds in Bytes
pub const LENGTH_FIELD_SIZE: usize = 4;

// ---------------------------------------------------------------------------
// Fehler
// ---------------------------------------------------------------------------

/// Fataler Fehler auf Frame-Ebene
#[derive(Debug, Error)]
pub enum WireFehler {
    #[error("IO-Fehler: {0}")]
    Io(#[from] io::Error),

    #[error("Frame zu gross: {laenge} Bytes (Maximum: {maximum} Bytes)")]
    FrameZuGross { laenge: usize, maximum: usize },

    #[error("JSON-Serialisierung fehlgeschlagen: {0}")]
    Serialisierung(#[source] serde_json::Error),
}

/// Vollstaendiger Frame, dessen Inhalt kein gueltiges Event ist
#[derive(Debug, Error)]
#[error("Ungueltiger Payload: {grund}")]
pub struct PayloadFehler {
    pub grund: String,
}

impl From<serde_json::Error> for PayloadFehler {
    fn from(e: serde_json::Error) -> Self {
        Self {
            grund: e.to_string(),
        }
    }
}

// ---------------------------------------------------------------------------
// FrameCodec
// ---------------------------------------------------------------------------

/// tokio-util Codec fuer frame-basierte TCP-Verbindungen
///
/// `Ein` ist der Event-Typ der gelesen wird, `Aus` der Typ der geschrieben
/// wird. Der Server nutzt [`ServerCodec`], Clients (und Tests) [`ClientCodec`].
///
/// # Beispiel
///
/// ```rust,no_run
/// use tokio_util::codec::Framed;
/// use treffpunkt_protocol::wire::ServerCodec;
///
/// // let stream = TcpStream::connect(...).await?;
/// // let framed = Framed::new(stream, ServerCodec::new());
/// ```
pub struct FrameCodec<Ein, Aus> {
    /// Maximale erlaubte Frame-Groesse in Bytes
    max_frame_size: usize,
    _typen: PhantomData<fn() -> (Ein, Aus)>,
}

/// Server-Seite: liest `ClientEvent`, schreibt `ServerEvent`
pub type ServerCodec = FrameCodec<ClientEvent, ServerEvent>;

/// Client-Seite: liest `ServerEvent`, schreibt `ClientEvent`
pub type ClientCodec = FrameCodec<ServerEvent, ClientEvent>;

impl<Ein, Aus> FrameCodec<Ein, Aus> {
    /// Erstellt einen neuen `FrameCodec` mit Standard-Limits
    pub fn new() -> Self {
        Self::with_max_size(DEFAULT_MAX_FRAME_SIZE)
    }

    /// Erstellt einen `FrameCodec` mit benutzerdefinierter maximaler Frame-Groesse
    pub fn with_max_size(max_frame_size: usize) -> Self {
        Self {
            max_frame_size,
            _typen: PhantomData,
        }
    }

    /// Gibt die konfigurierte maximale Frame-Groesse zurueck
    pub fn max_frame_size(&self) -> usize {
        self.max_frame_size
    }
}

impl<Ein, Aus> Default for FrameCodec<Ein, Aus> {
    fn default() -> Self {
        Self::new()
    }
}

impl<Ein, Aus> std::fmt::Debug for FrameCodec<Ein, Aus> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FrameCodec")
            .field("max_frame_size", &self.max_frame_size)
            .finish()
    }
}

// ---------------------------------------------------------------------------
// Decoder-Implementierung
// ---------------------------------------------------------------------------

impl<Ein, Aus> Decoder for FrameCodec<Ein, Aus>
where
    Ein: DeserializeOwned,
{
    type Item = Result<Ein, PayloadFehler>;
    type Error = WireFehler;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        // Warte auf mindestens 4 Bytes fuer das Laengen-Feld
        if src.len() < LENGTH_FIELD_SIZE {
            return Ok(None);
        }

        // Laenge lesen (big-endian u32) ohne den Buffer zu veraendern
        let length = u32::from_be_bytes([src[0], src[1], src[2], src[3]]) as usize;

        if length > self.max_frame_size {
            return Err(WireFehler::FrameZuGross {
                laenge: length,
                maximum: self.max_frame_size,
            });
        }

        // Pruefen ob der vollstaendige Frame bereits im Buffer ist
        let total_size = LENGTH_FIELD_SIZE + length;
        if src.len() < total_size {
            src.reserve(total_size - src.len());
            return Ok(None);
        }

        src.advance(LENGTH_FIELD_SIZE);
        let payload = src.split_to(length);

        Ok(Some(
            serde_json::from_slice(&payload).map_err(PayloadFehler::from),
        ))
    }
}

// ---------------------------------------------------------------------------
// Encoder-Implementierung
// ---------------------------------------------------------------------------

impl<Ein, Aus> Encoder<Aus> for FrameCodec<Ein, Aus>
where
    Aus: Serialize,
{
    type Error = WireFehler;

    fn encode(&mut self, item: Aus, dst: &mut BytesMut) -> Result<(), Self::Error> {
        let json = serde_json::to_vec(&item).map_err(WireFehler::Serialisierung)?;

        // Das Limit gilt nur fuer eingehende Frames. Ausgehende Events sind
        // oft groesser als der Frame, der sie ausgeloest hat.
        if json.len() > u32::MAX as usize {
            return Err(WireFehler::FrameZuGross {
                laenge: json.len(),
                maximum: u32::MAX as usize,
            });
        }

        dst.reserve(LENGTH_FIELD_SIZE + json.len());
        dst.put_u32(json.len() as u32);
        dst.put_slice(&json);

        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::{ErrorCode, JoinRoomRequest, PingMessage};
    use treffpunkt_core::types::RoomId;

    fn join_event(raum: &str) -> ClientEvent {
        ClientEvent::JoinRoom(JoinRoomRequest {
            room_id: RoomId::from(raum),
            display_name: None,
        })
    }

    fn roher_frame(payload: &[u8]) -> BytesMut {
        let mut buf = BytesMut::new();
        buf.put_u32(payload.len() as u32);
        buf.put_slice(payload);
        buf
    }

    #[test]
    fn client_frame_wird_vom_server_gelesen() {
        let mut client = ClientCodec::new();
        let mut server = ServerCodec::new();

        let mut buf = BytesMut::new();
        client.encode(join_event("r1"), &mut buf).unwrap();

        let payload_len = u32::from_be_bytes([buf[0], buf[1], buf[2], buf[3]]) as usize;
        assert_eq!(buf.len(), LENGTH_FIELD_SIZE + payload_len);

        let decoded = server
            .decode(&mut buf)
            .unwrap()
            .expect("Muss einen Frame enthalten")
            .expect("Muss ein gueltiges Event sein");
        match decoded {
            ClientEvent::JoinRoom(req) => assert_eq!(req.room_id.as_str(), "r1"),
            andere => panic!("Erwartet JoinRoom, erhalten {}", andere.name()),
        }
    }

    #[test]
    fn unvollstaendiger_frame() {
        let mut client = ClientCodec::new();
        let mut server = ServerCodec::new();

        let mut buf = BytesMut::new();
        client.encode(join_event("r1"), &mut buf).unwrap();

        let half = buf.len() / 2;
        let mut partial = buf.split_to(half);
        assert!(server.decode(&mut partial).unwrap().is_none());
    }

    #[test]
    fn zu_wenig_bytes_fuer_laengenfeld() {
        let mut codec = ServerCodec::new();
        let mut buf = BytesMut::from(&[0x00, 0x00][..]);
        assert!(codec.decode(&mut buf).unwrap().is_none());
    }

    #[test]
    fn ablehnung_zu_grosser_frame() {
        let mut codec = ServerCodec::with_max_size(100);
        let mut buf = roher_frame(&[b'x'; 200]);

        let result = codec.decode(&mut buf);
        assert!(matches!(
            result,
            Err(WireFehler::FrameZuGross {
                laenge: 200,
                maximum: 100
            })
        ));
    }

    #[test]
    fn encode_ignoriert_eingangslimit() {
        let mut server = ServerCodec::with_max_size(10);
        let mut buf = BytesMut::new();
        server
            .encode(ServerEvent::fehler(ErrorCode::InvalidPayload, "x".repeat(64)), &mut buf)
            .unwrap();
        assert!(buf.len() > LENGTH_FIELD_SIZE + 10);

        let mut client = ClientCodec::new();
        let event = client.decode(&mut buf).unwrap().expect("Frame erwartet").unwrap();
        assert!(matches!(event, ServerEvent::Error(_)));
    }

    #[test]
    fn ungueltiges_json_ist_nicht_fatal() {
        let mut codec = ServerCodec::new();
        let mut buf = roher_frame(br#"{"event":"join-room","data":{}}"#);
        let gueltig = serde_json::to_vec(&ClientEvent::Ping(PingMessage { timestamp_ms: 7 })).unwrap();
        buf.extend_from_slice(&roher_frame(&gueltig));

        let erster = codec.decode(&mut buf).unwrap().expect("Frame erwartet");
        assert!(erster.is_err(), "Fehlende roomId muss abgelehnt werden");

        let zweiter = codec.decode(&mut buf).unwrap().expect("Frame erwartet");
        assert!(matches!(zweiter, Ok(ClientEvent::Ping(PingMessage { timestamp_ms: 7 }))));
        assert!(buf.is_empty());
    }

    #[test]
    fn mehrere_events_im_buffer() {
        let mut server = ServerCodec::new();
        let mut client = ClientCodec::new();
        let mut buf = BytesMut::new();

        for i in 0..3u64 {
            server.encode(ServerEvent::ping(i), &mut buf).unwrap();
        }

        for i in 0..3u64 {
            let event = client.decode(&mut buf).unwrap().expect("Frame erwartet").unwrap();
            match event {
                ServerEvent::Ping(p) => assert_eq!(p.timestamp_ms, i),
                andere => panic!("Erwartet Ping, erhalten {}", andere.name()),
            }
        }
        assert!(buf.is_empty());
    }

    #[test]
    fn default_max_size() {
        let codec = ClientCodec::default();
        assert_eq!(codec.max_frame_size(), DEFAULT_MAX_FRAME_SIZE);
    }
}
