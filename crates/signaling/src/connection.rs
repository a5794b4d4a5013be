//! Client-Connection – Verwaltet eine einzelne Verbindung
//!
//! Jede Verbindung bekommt eine `ClientConnection` in einem eigenen
//! tokio-Task. Der Task liest Frames, dispatcht sie synchron, schreibt die
//! Antworten und leert die Send-Queue der Verbindung.
//!
//! ## Keepalive
//! - Server sendet alle `keepalive_sek` einen Ping
//! - Jeder eingehende Frame zaehlt als Lebenszeichen
//! - Nach `verbindungs_timeout_sek` ohne Frame wird die Verbindung getrennt
//!
//! ## Trennung
//! Kick und Queue-Ueberlauf signalisieren ueber den watch-Kanal der Registry.
//! Bereits eingereihte Events (z.B. `kicked`) werden vor dem Schliessen noch
//! geschrieben. Am Ende laeuft immer der normale Austrittspfad.

use futures_util::{SinkExt, StreamExt};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::sync::{mpsc, watch};
use tokio_util::codec::Framed;
use treffpunkt_core::types::ConnectionId;
use treffpunkt_protocol::{ErrorCode, ServerCodec, ServerEvent, WireFehler};

use crate::dispatcher::{jetzt_ms, EventDispatcher};
use crate::error::{SignalingError, SignalingResult};
use crate::registry::VerbindungsEmpfang;
use crate::server_state::SignalingState;

/// Verarbeitet eine einzelne Verbindung
pub struct ClientConnection {
    state: Arc<SignalingState>,
    peer_addr: SocketAddr,
}

impl ClientConnection {
    /// Erstellt eine neue ClientConnection
    pub fn neu(state: Arc<SignalingState>, peer_addr: SocketAddr) -> Self {
        Self { state, peer_addr }
    }

    /// Startet die Verbindungs-Verarbeitungsschleife
    ///
    /// Laeuft bis die Verbindung getrennt wird oder ein Shutdown-Signal
    /// eingeht. Danach ist die Verbindung aus Raum und Registry entfernt.
    pub async fn verarbeiten<S>(self, stream: S, mut shutdown_rx: watch::Receiver<bool>)
    where
        S: AsyncRead + AsyncWrite + Unpin,
    {
        let VerbindungsEmpfang {
            connection_id,
            mut events,
            trennen: mut trenn_rx,
        } = self.state.session.verbinden();

        tracing::info!(peer = %self.peer_addr, connection_id = %connection_id, "Neue Verbindung");

        let mut framed = Framed::new(
            stream,
            ServerCodec::with_max_size(self.state.config.max_frame_bytes),
        );

        let ergebnis = self
            .schleife(
                connection_id,
                &mut framed,
                &mut events,
                &mut trenn_rx,
                &mut shutdown_rx,
            )
            .await;

        match ergebnis {
            Ok(()) => {}
            Err(e) if e.ist_regulaer() => {
                tracing::info!(
                    peer = %self.peer_addr,
                    connection_id = %connection_id,
                    "Verbindung vom Client getrennt"
                );
            }
            Err(e) => {
                tracing::warn!(
                    peer = %self.peer_addr,
                    connection_id = %connection_id,
                    fehler = %e,
                    "Verbindung mit Fehler beendet"
                );
            }
        }

        // Cleanup beim Verbindungsende
        self.state.session.verlassen(&connection_id);

        tracing::info!(connection_id = %connection_id, "Verbindungs-Task beendet");
    }

    async fn schleife<S>(
        &self,
        connection_id: ConnectionId,
        framed: &mut Framed<S, ServerCodec>,
        events: &mut mpsc::Receiver<ServerEvent>,
        trenn_rx: &mut watch::Receiver<bool>,
        shutdown_rx: &mut watch::Receiver<bool>,
    ) -> SignalingResult<()>
    where
        S: AsyncRead + AsyncWrite + Unpin,
    {
        let keepalive_intervall = Duration::from_secs(self.state.config.keepalive_sek.max(1));
        let timeout_dauer = Duration::from_secs(self.state.config.verbindungs_timeout_sek);
        let dispatcher = EventDispatcher::neu(self.state.session.clone());

        // Zeitpunkt des letzten empfangenen Frames
        let mut letzter_empfang = Instant::now();
        // Zeitpunkt des naechsten Ping
        let mut naechster_ping = Instant::now() + keepalive_intervall;

        loop {
            let jetzt = Instant::now();

            // Timeout-Pruefung
            if jetzt.duration_since(letzter_empfang) > timeout_dauer {
                tracing::warn!(connection_id = %connection_id, "Verbindungs-Timeout");
                return Err(SignalingError::Timeout);
            }

            let ping_verzoegerung = naechster_ping
                .checked_duration_since(jetzt)
                .unwrap_or(Duration::from_millis(1));

            tokio::select! {
                // Eingehender Frame vom Client
                frame = framed.next() => {
                    match frame {
                        Some(Ok(Ok(event))) => {
                            letzter_empfang = Instant::now();
                            tracing::trace!(
                                connection_id = %connection_id,
                                event = event.name(),
                                "Event empfangen"
                            );
                            for antwort in dispatcher.dispatch(connection_id, event) {
                                kodierfehler_verwerfen(connection_id, framed.send(antwort).await)?;
                            }
                        }
                        Some(Ok(Err(payload_fehler))) => {
                            letzter_empfang = Instant::now();
                            tracing::warn!(
                                connection_id = %connection_id,
                                fehler = %payload_fehler,
                                "Ungueltiger Payload"
                            );
                            framed
                                .send(ServerEvent::fehler(
                                    ErrorCode::InvalidPayload,
                                    payload_fehler.grund,
                                ))
                                .await?;
                        }
                        Some(Err(e @ WireFehler::FrameZuGross { .. })) => {
                            let _ = framed
                                .send(ServerEvent::fehler(ErrorCode::FrameTooLarge, e.to_string()))
                                .await;
                            return Err(e.into());
                        }
                        Some(Err(e)) => return Err(e.into()),
                        None => return Err(SignalingError::VerbindungGetrennt),
                    }
                }

                // Ausgehendes Event aus der Send-Queue
                Some(ausgehend) = events.recv() => {
                    tracing::trace!(
                        connection_id = %connection_id,
                        event = ausgehend.name(),
                        "Event gesendet"
                    );
                    kodierfehler_verwerfen(connection_id, framed.send(ausgehend).await)?;
                }

                // Keepalive-Ping
                _ = tokio::time::sleep(ping_verzoegerung) => {
                    if Instant::now() >= naechster_ping {
                        framed.send(ServerEvent::ping(jetzt_ms())).await?;
                        naechster_ping = Instant::now() + keepalive_intervall;
                    }
                }

                // Serverseitige Trennung (Kick, Queue-Ueberlauf)
                Ok(()) = trenn_rx.changed() => {
                    if *trenn_rx.borrow() {
                        while let Ok(rest) = events.try_recv() {
                            kodierfehler_verwerfen(connection_id, framed.feed(rest).await)?;
                        }
                        framed.flush().await?;
                        tracing::info!(connection_id = %connection_id, "Verbindung serverseitig getrennt");
                        return Ok(());
                    }
                }

                // Shutdown-Signal
                Ok(()) = shutdown_rx.changed() => {
                    if *shutdown_rx.borrow() {
                        tracing::info!(connection_id = %connection_id, "Shutdown-Signal – Verbindung wird getrennt");
                        let _ = framed
                            .send(ServerEvent::fehler(
                                ErrorCode::ServerShutdown,
                                "Server wird heruntergefahren",
                            ))
                            .await;
                        return Ok(());
                    }
                }
            }
        }
    }
}

/// Ein Event, das sich nicht kodieren laesst, betrifft nur dieses Event.
/// Es wird verworfen, die Verbindung bleibt bestehen. IO-Fehler beenden sie.
fn kodierfehler_verwerfen(
    connection_id: ConnectionId,
    ergebnis: Result<(), WireFehler>,
) -> SignalingResult<()> {
    match ergebnis {
        Ok(()) => Ok(()),
        Err(WireFehler::Io(e)) => Err(e.into()),
        Err(e) => {
            tracing::warn!(
                connection_id = %connection_id,
                fehler = %e,
                "Event nicht kodierbar, verworfen"
            );
            Ok(())
        }
    }
}
