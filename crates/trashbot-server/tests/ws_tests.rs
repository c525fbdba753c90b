//! End-to-end tests for the `/ws` observer channel.
//!
//! These start the real router on an ephemeral port and connect with a
//! `tokio-tungstenite` client.

#![allow(clippy::unwrap_used, clippy::panic)]

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use futures::StreamExt;
use serde_json::Value;
use tokio::net::TcpListener;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::tungstenite::protocol::frame::coding::CloseCode;
use trashbot_core::DashboardConfig;
use trashbot_core::config::ObserverConfig;
use trashbot_server::router::build_router;
use trashbot_server::state::AppState;

type Client =
    tokio_tungstenite::WebSocketStream<tokio_tungstenite::MaybeTlsStream<tokio::net::TcpStream>>;

async fn spawn_server(capacity: usize) -> (SocketAddr, Arc<AppState>) {
    let config = DashboardConfig {
        observers: ObserverConfig {
            capacity,
            ..ObserverConfig::default()
        },
        ..DashboardConfig::default()
    };
    let state = Arc::new(AppState::new(&config));
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let router = build_router(Arc::clone(&state));
    tokio::spawn(async move {
        axum::serve(listener, router).await.unwrap();
    });
    (addr, state)
}

async fn connect(addr: SocketAddr) -> Client {
    let (client, _) = tokio_tungstenite::connect_async(format!("ws://{addr}/ws"))
        .await
        .unwrap();
    client
}

async fn next_message(client: &mut Client) -> Message {
    tokio::time::timeout(Duration::from_secs(5), client.next())
        .await
        .unwrap()
        .unwrap()
        .unwrap()
}

async fn next_json(client: &mut Client) -> Value {
    let msg = next_message(client).await;
    serde_json::from_str(msg.to_text().unwrap()).unwrap()
}

async fn wait_for_observers(state: &AppState, n: usize) {
    for _ in 0..100 {
        if state.dashboard.hub().len() == n {
            return;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    assert_eq!(state.dashboard.hub().len(), n);
}

#[tokio::test]
async fn test_init_then_updates() {
    let (addr, state) = spawn_server(4).await;
    let mut client = connect(addr).await;

    let init = next_json(&mut client).await;
    assert_eq!(init["type"], "init");
    assert_eq!(init["state"]["arm"]["status"], "unknown");
    assert!(init["ts_ms"].is_i64());

    state
        .dashboard
        .submit_vision_report(br#"{"label":"bottle","recyclable":true}"#)
        .unwrap();
    state
        .dashboard
        .submit_arm_report(br#"{"status":"error"}"#)
        .unwrap();

    let vision = next_json(&mut client).await;
    assert_eq!(vision["type"], "vision_update");
    assert_eq!(vision["payload"]["label"], "bottle");
    assert_eq!(vision["state"]["counts"]["total"], 1);

    let arm = next_json(&mut client).await;
    assert_eq!(arm["type"], "arm_update");
    assert_eq!(arm["state"]["counts"]["errors"], 1);
    assert_eq!(arm["payload"]["status"], "error");
    assert!(
        arm["state"]["last_update_ms"].as_i64().unwrap()
            >= vision["state"]["last_update_ms"].as_i64().unwrap()
    );
}

#[tokio::test]
async fn test_connection_beyond_capacity_is_closed() {
    let (addr, state) = spawn_server(1).await;
    let mut first = connect(addr).await;
    assert_eq!(next_json(&mut first).await["type"], "init");

    let mut second = connect(addr).await;
    match next_message(&mut second).await {
        Message::Close(Some(frame)) => assert_eq!(frame.code, CloseCode::Again),
        other => panic!("expected close frame, got {other:?}"),
    }
    assert_eq!(state.dashboard.hub().len(), 1);
}

#[tokio::test]
async fn test_disconnect_unregisters_and_spares_others() {
    let (addr, state) = spawn_server(4).await;
    let mut staying = connect(addr).await;
    let mut leaving = connect(addr).await;
    next_json(&mut staying).await;
    next_json(&mut leaving).await;
    wait_for_observers(&state, 2).await;

    leaving.close(None).await.unwrap();
    drop(leaving);
    wait_for_observers(&state, 1).await;

    state
        .dashboard
        .submit_vision_report(br#"{"recyclable":false}"#)
        .unwrap();
    let update = next_json(&mut staying).await;
    assert_eq!(update["type"], "vision_update");
    assert_eq!(update["state"]["counts"]["trash"], 1);
}

#[tokio::test]
async fn test_client_messages_are_ignored() {
    let (addr, state) = spawn_server(2).await;
    let mut client = connect(addr).await;
    next_json(&mut client).await;

    futures::SinkExt::send(&mut client, Message::text("hello")).await.unwrap();
    state
        .dashboard
        .submit_arm_report(br#"{"status":"idle"}"#)
        .unwrap();

    let update = next_json(&mut client).await;
    assert_eq!(update["type"], "arm_update");
    assert_eq!(state.dashboard.hub().len(), 1);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_reading_client_survives_report_burst() {
    const BURST: u64 = 200;

    let (addr, state) = spawn_server(2).await;
    let mut client = connect(addr).await;
    assert_eq!(next_json(&mut client).await["type"], "init");
    wait_for_observers(&state, 1).await;

    let reader = tokio::spawn(async move {
        let mut totals = Vec::new();
        while totals.len() < usize::try_from(BURST).unwrap() {
            match next_message(&mut client).await {
                Message::Text(text) => {
                    let frame: Value = serde_json::from_str(&text).unwrap();
                    totals.push(frame["state"]["counts"]["total"].as_u64().unwrap());
                }
                Message::Close(frame) => panic!("closed by server: {frame:?}"),
                _ => {}
            }
        }
        totals
    });

    for n in 0..BURST {
        state
            .dashboard
            .submit_vision_report(format!(r#"{{"seq":{n},"recyclable":true}}"#).as_bytes())
            .unwrap();
    }

    let totals = reader.await.unwrap();
    assert_eq!(totals, (1..=BURST).collect::<Vec<_>>());
    assert_eq!(state.dashboard.hub().len(), 1);
}
