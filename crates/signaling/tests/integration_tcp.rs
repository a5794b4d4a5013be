//! End-to-End-Tests ueber echte TCP-Verbindungen (127.0.0.1, freier Port)

use futures_util::{SinkExt, StreamExt};
use serde_json::json;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::AsyncWriteExt;
use tokio::net::TcpStream;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio_util::codec::Framed;
use treffpunkt_core::types::{ConnectionId, RoomId};
use treffpunkt_protocol::event::{
    JoinRoomRequest, KickUserRequest, MessageKind, PingMessage, ReturningSignalRequest,
    SendMessageRequest, SendingSignalRequest, UploadFileRequest,
};
use treffpunkt_protocol::{ClientCodec, ClientEvent, ErrorCode, ServerEvent};
use treffpunkt_signaling::{SignalingConfig, SignalingResult, SignalingServer, SignalingState};

type Client = Framed<TcpStream, ClientCodec>;

struct TestServer {
    adresse: SocketAddr,
    state: Arc<SignalingState>,
    shutdown_tx: watch::Sender<bool>,
    handle: JoinHandle<SignalingResult<()>>,
}

async fn server_starten(config: SignalingConfig) -> TestServer {
    let state = SignalingState::neu(config);
    let server = SignalingServer::binden(Arc::clone(&state), "127.0.0.1:0".parse().unwrap())
        .await
        .expect("Bind auf Port 0 muss klappen");
    let adresse = server.lokale_adresse().unwrap();
    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let handle = tokio::spawn(server.starten(shutdown_rx));
    TestServer {
        adresse,
        state,
        shutdown_tx,
        handle,
    }
}

async fn client(adresse: SocketAddr) -> Client {
    let stream = TcpStream::connect(adresse).await.expect("Verbindung zum Testserver");
    Framed::new(stream, ClientCodec::new())
}

async fn senden(client: &mut Client, event: ClientEvent) {
    client.send(event).await.expect("Senden an den Server");
}

/// Naechstes Event vom Server, Keepalive-Pings werden uebersprungen
async fn naechstes(client: &mut Client) -> ServerEvent {
    loop {
        let frame = tokio::time::timeout(Duration::from_secs(5), client.next())
            .await
            .expect("Timeout beim Warten auf ein Server-Event")
            .expect("Verbindung unerwartet geschlossen")
            .expect("Frame-Fehler")
            .expect("Server-Event muss gueltig sein");
        if !matches!(frame, ServerEvent::Ping(_)) {
            return frame;
        }
    }
}

/// Wartet auf das Schliessen der Verbindung durch den Server
async fn geschlossen(client: &mut Client) {
    let ende = tokio::time::timeout(Duration::from_secs(5), async {
        loop {
            match client.next().await {
                None | Some(Err(_)) => return,
                Some(Ok(_)) => continue,
            }
        }
    })
    .await;
    assert!(ende.is_ok(), "Server hat die Verbindung nicht geschlossen");
}

fn join(raum: &str, name: &str) -> ClientEvent {
    ClientEvent::JoinRoom(JoinRoomRequest {
        room_id: RoomId::from(raum),
        display_name: Some(name.to_string()),
    })
}

/// Tritt bei und liefert die `all-users`-Liste und den Host-Status
async fn beitreten(client: &mut Client, raum: &str, name: &str) -> (Vec<ConnectionId>, bool) {
    senden(client, join(raum, name)).await;
    let andere = match naechstes(client).await {
        ServerEvent::AllUsers(andere) => andere,
        andere => panic!("Erwartet all-users, erhalten {andere:?}"),
    };
    let ist_host = match naechstes(client).await {
        ServerEvent::SetHost(h) => h,
        andere => panic!("Erwartet set-host, erhalten {andere:?}"),
    };
    (andere, ist_host)
}

/// `ziel` erfaehrt die ID von `von` ueber ein Angebot
async fn vorstellen(von: &mut Client, ziel: &mut Client, ziel_id: ConnectionId) -> ConnectionId {
    senden(
        von,
        ClientEvent::SendingSignal(SendingSignalRequest {
            user_to_signal: ziel_id,
            caller_id: Some("gefaelscht".to_string()),
            signal: json!({"type": "offer"}),
            display_name: None,
        }),
    )
    .await;
    match naechstes(ziel).await {
        ServerEvent::UserJoined(u) => {
            assert_eq!(u.signal["type"], "offer");
            u.caller_id
        }
        andere => panic!("Erwartet user-joined, erhalten {andere:?}"),
    }
}

#[tokio::test]
async fn beitritt_und_signal_austausch() {
    let server = server_starten(SignalingConfig::default()).await;
    let mut a = client(server.adresse).await;
    let mut b = client(server.adresse).await;

    let (andere, ist_host) = beitreten(&mut a, "r1", "Ada").await;
    assert!(andere.is_empty());
    assert!(ist_host);

    let (andere, ist_host) = beitreten(&mut b, "r1", "Bob").await;
    assert_eq!(andere.len(), 1);
    assert!(!ist_host);
    let a_id = andere[0];

    // Angebot B -> A, die gefaelschte callerID wird ersetzt
    let b_id = vorstellen(&mut b, &mut a, a_id).await;
    assert_ne!(b_id, a_id);
    assert_eq!(server.state.session.mitglieder(&RoomId::from("r1")), vec![a_id, b_id]);

    // Antwort A -> B
    senden(
        &mut a,
        ClientEvent::ReturningSignal(ReturningSignalRequest {
            caller_id: b_id,
            signal: json!({"type": "answer"}),
        }),
    )
    .await;
    match naechstes(&mut b).await {
        ServerEvent::ReceivingReturnedSignal(r) => {
            assert_eq!(r.id, a_id);
            assert_eq!(r.signal["type"], "answer");
        }
        andere => panic!("Erwartet receiving-returned-signal, erhalten {andere:?}"),
    }
}

#[tokio::test]
async fn chat_erreicht_alle_mitglieder() {
    let server = server_starten(SignalingConfig::default()).await;
    let mut a = client(server.adresse).await;
    let mut b = client(server.adresse).await;
    beitreten(&mut a, "r1", "Ada").await;
    beitreten(&mut b, "r1", "Bob").await;

    senden(
        &mut b,
        ClientEvent::SendMessage(SendMessageRequest {
            room_id: RoomId::from("r1"),
            message: "hallo".to_string(),
            sender: Some("Bob".to_string()),
        }),
    )
    .await;

    for c in [&mut a, &mut b] {
        match naechstes(c).await {
            ServerEvent::ReceiveMessage(m) => {
                assert_eq!(m.message, "hallo");
                assert_eq!(m.sender, "Bob");
            }
            andere => panic!("Erwartet receive-message, erhalten {andere:?}"),
        }
    }
}

#[tokio::test]
async fn ungueltiger_payload_haelt_verbindung_offen() {
    let server = server_starten(SignalingConfig::default()).await;
    let mut a = client(server.adresse).await;

    let payload = br#"{"event":"join-room","data":{"displayName":"ohne Raum"}}"#;
    let stream = a.get_mut();
    stream.write_all(&(payload.len() as u32).to_be_bytes()).await.unwrap();
    stream.write_all(payload).await.unwrap();

    match naechstes(&mut a).await {
        ServerEvent::Error(e) => assert_eq!(e.code, ErrorCode::InvalidPayload),
        andere => panic!("Erwartet error, erhalten {andere:?}"),
    }

    senden(&mut a, ClientEvent::Ping(PingMessage { timestamp_ms: 7 })).await;
    match naechstes(&mut a).await {
        ServerEvent::Pong(p) => assert_eq!(p.echo_timestamp_ms, 7),
        andere => panic!("Erwartet pong, erhalten {andere:?}"),
    }
    assert_eq!(server.state.session.raum_anzahl(), 0);
}

#[tokio::test]
async fn zu_grosser_frame_trennt_verbindung() {
    let config = SignalingConfig {
        max_frame_bytes: 1024,
        ..SignalingConfig::default()
    };
    let server = server_starten(config).await;
    let mut a = client(server.adresse).await;

    a.get_mut().write_all(&1_000_000u32.to_be_bytes()).await.unwrap();

    match naechstes(&mut a).await {
        ServerEvent::Error(e) => assert_eq!(e.code, ErrorCode::FrameTooLarge),
        andere => panic!("Erwartet error, erhalten {andere:?}"),
    }
    geschlossen(&mut a).await;
}

fn upload(raum: &str, daten: String) -> ClientEvent {
    ClientEvent::UploadFile(UploadFileRequest {
        room_id: RoomId::from(raum),
        file_data: daten,
        file_name: "bild.png".to_string(),
        file_type: "image/png".to_string(),
        sender: Some("Ada".to_string()),
    })
}

#[tokio::test]
async fn upload_knapp_unter_limit_erreicht_alle() {
    const LIMIT: usize = 1024;
    let config = SignalingConfig {
        max_frame_bytes: LIMIT,
        ..SignalingConfig::default()
    };
    let server = server_starten(config).await;
    let mut a = client(server.adresse).await;
    let mut b = client(server.adresse).await;
    beitreten(&mut a, "r1", "Ada").await;
    beitreten(&mut b, "r1", "Bob").await;

    // Frame so auffuellen, dass er das Eingangslimit gerade noch einhaelt
    let basis = serde_json::to_vec(&upload("r1", String::new())).unwrap().len();
    let event = upload("r1", "a".repeat(LIMIT - 4 - basis));
    let laenge = serde_json::to_vec(&event).unwrap().len();
    assert!(laenge <= LIMIT && laenge > LIMIT - 16);
    senden(&mut a, event).await;

    // Die ausgehende Zustellung ist groesser als der eingehende Frame
    for c in [&mut a, &mut b] {
        match naechstes(c).await {
            ServerEvent::ReceiveMessage(m) => {
                assert_eq!(m.kind, MessageKind::File);
                assert_eq!(m.message, "bild.png");
                assert_eq!(m.file_data.as_deref().map(str::len), Some(LIMIT - 4 - basis));
            }
            andere => panic!("Erwartet receive-message, erhalten {andere:?}"),
        }
    }
    assert_eq!(server.state.session.mitglieder(&RoomId::from("r1")).len(), 2);

    // Beide Verbindungen bleiben nutzbar
    senden(&mut b, ClientEvent::Ping(PingMessage { timestamp_ms: 3 })).await;
    assert!(matches!(naechstes(&mut b).await, ServerEvent::Pong(_)));
}

#[tokio::test]
async fn kick_liefert_kicked_und_schliesst() {
    let server = server_starten(SignalingConfig::default()).await;
    let mut a = client(server.adresse).await;
    let mut b = client(server.adresse).await;
    beitreten(&mut a, "r1", "Ada").await;
    let (andere, _) = beitreten(&mut b, "r1", "Bob").await;
    let b_id = vorstellen(&mut b, &mut a, andere[0]).await;

    senden(
        &mut a,
        ClientEvent::KickUser(KickUserRequest {
            room_id: RoomId::from("r1"),
            target_id: b_id,
        }),
    )
    .await;

    assert!(matches!(naechstes(&mut b).await, ServerEvent::Kicked));
    geschlossen(&mut b).await;

    match naechstes(&mut a).await {
        ServerEvent::UserLeft(u) => {
            assert_eq!(u.id, b_id);
            assert_eq!(u.display_name, "Bob");
        }
        andere => panic!("Erwartet user-left, erhalten {andere:?}"),
    }
}

#[tokio::test]
async fn trennung_des_hosts_migriert() {
    let server = server_starten(SignalingConfig::default()).await;
    let mut a = client(server.adresse).await;
    let mut b = client(server.adresse).await;
    beitreten(&mut a, "r1", "Ada").await;
    let (andere, _) = beitreten(&mut b, "r1", "Bob").await;
    let a_id = andere[0];

    drop(a);

    match naechstes(&mut b).await {
        ServerEvent::UserLeft(u) => {
            assert_eq!(u.id, a_id);
            assert_eq!(u.display_name, "Ada");
        }
        andere => panic!("Erwartet user-left, erhalten {andere:?}"),
    }
    assert!(matches!(naechstes(&mut b).await, ServerEvent::SetHost(true)));
}

#[tokio::test]
async fn shutdown_schliesst_alle_verbindungen() {
    let server = server_starten(SignalingConfig::default()).await;
    let mut a = client(server.adresse).await;
    beitreten(&mut a, "r1", "Ada").await;

    server.shutdown_tx.send(true).unwrap();

    match naechstes(&mut a).await {
        ServerEvent::Error(e) => assert_eq!(e.code, ErrorCode::ServerShutdown),
        andere => panic!("Erwartet error, erhalten {andere:?}"),
    }
    geschlossen(&mut a).await;

    tokio::time::timeout(Duration::from_secs(5), server.handle)
        .await
        .expect("Server muss nach dem Shutdown enden")
        .expect("Server-Task darf nicht abbrechen")
        .expect("Server muss sauber enden");
    assert_eq!(server.state.session.verbindungen_anzahl(), 0);
    assert_eq!(server.state.session.raum_anzahl(), 0);
}
