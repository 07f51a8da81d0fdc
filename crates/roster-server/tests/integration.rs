//! End-to-end presence tests over real WebSocket and HTTP clients.

use std::time::Duration;

use futures::{SinkExt, StreamExt};
use roster_core::DirectoryEvent;
use roster_server::{ServerConfig, ServerHandle};
use roster_store::Database;
use serde_json::{json, Value};
use tokio::sync::broadcast;
use tokio::time::timeout;
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::Message;

const TIMEOUT: Duration = Duration::from_secs(5);

type WsStream = tokio_tungstenite::WebSocketStream<
    tokio_tungstenite::MaybeTlsStream<tokio::net::TcpStream>,
>;

async fn boot_server() -> ServerHandle {
    boot_server_with(ServerConfig {
        port: 0,
        ..Default::default()
    })
    .await
}

async fn boot_server_with(config: ServerConfig) -> ServerHandle {
    let (directory_tx, _) = broadcast::channel::<DirectoryEvent>(64);
    roster_server::start(config, Database::in_memory().unwrap(), directory_tx)
        .await
        .unwrap()
}

async fn connect(handle: &ServerHandle) -> WsStream {
    let url = format!("ws://127.0.0.1:{}/ws", handle.port);
    let (ws, _) = connect_async(url).await.unwrap();
    ws
}

async fn send_event(ws: &mut WsStream, event: &str, data: Option<Value>) {
    let mut frame = json!({ "event": event });
    if let Some(d) = data {
        frame["data"] = d;
    }
    ws.send(Message::text(frame.to_string())).await.unwrap();
}

/// Read the next text message as JSON.
async fn read_json(ws: &mut WsStream) -> Value {
    loop {
        let msg = timeout(TIMEOUT, ws.next())
            .await
            .expect("timeout waiting for message")
            .expect("stream closed")
            .expect("ws error");
        if let Message::Text(text) = msg {
            return serde_json::from_str(text.as_str()).unwrap();
        }
    }
}

/// Read the next `live_users_update` and return its records.
async fn read_roster(ws: &mut WsStream) -> Vec<Value> {
    let msg = read_json(ws).await;
    assert_eq!(msg["event"], "live_users_update", "unexpected frame: {msg}");
    msg["data"].as_array().cloned().expect("roster array")
}

/// Join as a viewer and consume the private roster reply.
async fn join_as_viewer(ws: &mut WsStream) -> Vec<Value> {
    send_event(ws, "viewer_join", None).await;
    read_roster(ws).await
}

fn join_payload(email: &str, first: &str, last: &str) -> Value {
    json!({ "email": email, "firstName": first, "lastName": last })
}

async fn wait_for_live_count(handle: &ServerHandle, expected: usize) {
    timeout(TIMEOUT, async {
        while handle.lifecycle().live_count() != expected {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await
    .expect("live count never reached expected value");
}

#[tokio::test]
async fn viewer_join_on_empty_roster_receives_empty_list() {
    let handle = boot_server().await;
    let mut c1 = connect(&handle).await;

    assert!(join_as_viewer(&mut c1).await.is_empty());

    handle.shutdown().await;
}

#[tokio::test]
async fn join_broadcasts_normalized_record_to_all_subscribers() {
    let handle = boot_server().await;
    let mut viewer = connect(&handle).await;
    join_as_viewer(&mut viewer).await;

    let mut c2 = connect(&handle).await;
    send_event(&mut c2, "join_live_users", Some(join_payload("A@X.com", "A", "B"))).await;

    for ws in [&mut viewer, &mut c2] {
        let roster = read_roster(ws).await;
        assert_eq!(roster.len(), 1);
        assert_eq!(roster[0]["email"], "a@x.com");
        assert_eq!(roster[0]["displayName"], "A B");
        assert!(roster[0]["connectionId"].as_str().is_some());
    }

    handle.shutdown().await;
}

#[tokio::test]
async fn disconnect_broadcasts_roster_without_record() {
    let handle = boot_server().await;
    let mut viewer = connect(&handle).await;
    join_as_viewer(&mut viewer).await;

    let mut c2 = connect(&handle).await;
    send_event(&mut c2, "join_live_users", Some(join_payload("a@x.com", "A", "B"))).await;
    assert_eq!(read_roster(&mut viewer).await.len(), 1);

    c2.close(None).await.unwrap();
    drop(c2);

    assert!(read_roster(&mut viewer).await.is_empty());
    wait_for_live_count(&handle, 0).await;

    handle.shutdown().await;
}

#[tokio::test]
async fn join_without_email_is_dropped_silently() {
    let handle = boot_server().await;
    let mut viewer = connect(&handle).await;
    join_as_viewer(&mut viewer).await;

    let mut c2 = connect(&handle).await;
    send_event(&mut c2, "join_live_users", Some(json!({}))).await;
    send_event(&mut c2, "join_live_users", None).await;
    send_event(&mut c2, "join_live_users", Some(json!({ "email": "   " }))).await;

    // A valid join afterwards is the first broadcast anyone sees.
    let mut c3 = connect(&handle).await;
    send_event(&mut c3, "join_live_users", Some(join_payload("c@x.com", "C", "D"))).await;

    let roster = read_roster(&mut viewer).await;
    assert_eq!(roster.len(), 1);
    assert_eq!(roster[0]["email"], "c@x.com");
    assert_eq!(handle.lifecycle().live_count(), 1);

    handle.shutdown().await;
}

#[tokio::test]
async fn same_email_twice_yields_two_records() {
    let handle = boot_server().await;
    let mut a = connect(&handle).await;
    let mut b = connect(&handle).await;

    send_event(&mut a, "join_live_users", Some(join_payload("dup@x.com", "A", "B"))).await;
    assert_eq!(read_roster(&mut a).await.len(), 1);

    send_event(&mut b, "join_live_users", Some(join_payload("DUP@x.com", "A", "B"))).await;
    let roster = read_roster(&mut b).await;
    assert_eq!(roster.len(), 2);
    assert_eq!(roster[0]["email"], "dup@x.com");
    assert_eq!(roster[1]["email"], "dup@x.com");
    assert_ne!(roster[0]["connectionId"], roster[1]["connectionId"]);

    // The first participant sees the same ordered roster.
    assert_eq!(read_roster(&mut a).await, roster);

    handle.shutdown().await;
}

#[tokio::test]
async fn unjoined_connection_receives_nothing() {
    let handle = boot_server().await;
    let mut quiet = connect(&handle).await;
    let mut c2 = connect(&handle).await;

    send_event(&mut c2, "join_live_users", Some(join_payload("a@x.com", "A", "B"))).await;
    assert_eq!(read_roster(&mut c2).await.len(), 1);

    // Unknown events are ignored, then the first frame the quiet client
    // receives is the private reply to its own viewer_join.
    send_event(&mut quiet, "wave", Some(json!({ "hello": true }))).await;
    quiet.send(Message::text("not json")).await.unwrap();
    let roster = join_as_viewer(&mut quiet).await;
    assert_eq!(roster.len(), 1);

    handle.shutdown().await;
}

#[tokio::test]
async fn registration_is_announced_to_subscribers() {
    let handle = boot_server().await;
    let mut viewer = connect(&handle).await;
    join_as_viewer(&mut viewer).await;

    let base = format!("http://127.0.0.1:{}", handle.port);
    let http = reqwest::Client::new();
    let resp = http
        .post(format!("{base}/users"))
        .json(&json!({
            "firstName": "Grace",
            "lastName": "Hopper",
            "mobile": "5551234567",
            "email": "Grace@Navy.mil",
            "street": "1 Harbor Rd",
            "city": "Arlington",
            "state": "Virginia",
            "country": "USA",
            "loginId": "grace001",
            "password": "Cobol!x",
        }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 201);

    let msg = read_json(&mut viewer).await;
    assert_eq!(msg["event"], "user_created_db");
    assert_eq!(msg["data"]["email"], "grace@navy.mil");
    assert_eq!(msg["data"]["firstName"], "Grace");

    // Registration never touches the live roster.
    assert_eq!(handle.lifecycle().live_count(), 0);

    let login: Value = http
        .post(format!("{base}/login"))
        .json(&json!({ "email": "grace@navy.mil", "password": "Cobol!x" }))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(login["success"], true);

    let resp = http
        .post(format!("{base}/login"))
        .json(&json!({ "email": "grace@navy.mil", "password": "wrong" }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 401);

    let users: Value = http
        .get(format!("{base}/users"))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(users["users"].as_array().unwrap().len(), 1);

    handle.shutdown().await;
}

#[tokio::test]
async fn invalid_registration_reports_first_failure() {
    let handle = boot_server().await;
    let resp = reqwest::Client::new()
        .post(format!("http://127.0.0.1:{}/users", handle.port))
        .json(&json!({ "firstName": "Grace" }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 400);

    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["success"], false);
    assert_eq!(body["message"], "Last Name is required");

    handle.shutdown().await;
}

#[tokio::test]
async fn silent_participant_is_reaped_and_removed_from_roster() {
    let handle = boot_server_with(ServerConfig {
        port: 0,
        heartbeat_interval: Duration::from_millis(100),
        client_timeout: Duration::from_secs(2),
        cleanup_interval: Duration::from_millis(200),
        ..Default::default()
    })
    .await;

    // The viewer keeps reading, so its client answers every ping.
    let mut viewer = connect(&handle).await;
    assert!(join_as_viewer(&mut viewer).await.is_empty());

    // The participant never reads again, so it never answers a ping.
    let mut silent = connect(&handle).await;
    send_event(&mut silent, "join_live_users", Some(join_payload("a@x.com", "A", "B"))).await;

    let roster = read_roster(&mut viewer).await;
    assert_eq!(roster.len(), 1);
    assert_eq!(roster[0]["email"], "a@x.com");

    assert!(read_roster(&mut viewer).await.is_empty());
    wait_for_live_count(&handle, 0).await;

    drop(silent);
    handle.shutdown().await;
}

#[tokio::test]
async fn form_encoded_bodies_are_accepted() {
    let handle = boot_server().await;
    let base = format!("http://127.0.0.1:{}", handle.port);
    let http = reqwest::Client::new();

    let resp = http
        .post(format!("{base}/users"))
        .form(&[
            ("firstName", "Alan"),
            ("lastName", "Turing"),
            ("mobile", "5550001111"),
            ("email", "alan@bletchley.uk"),
            ("street", "Hut 8"),
            ("city", "Bletchley"),
            ("state", "Bucks"),
            ("country", "UK"),
            ("loginId", "enigma01"),
            ("password", "Bombe#1"),
        ])
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 201);

    let resp = http
        .post(format!("{base}/login"))
        .form(&[("email", "alan@bletchley.uk"), ("password", "Bombe#1")])
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["success"], true);
    assert_eq!(body["user"]["lastName"], "Turing");

    handle.shutdown().await;
}

#[tokio::test]
async fn unreadable_bodies_keep_the_json_error_shape() {
    let handle = boot_server().await;
    let url = format!("http://127.0.0.1:{}/login", handle.port);
    let http = reqwest::Client::new();

    let malformed = http
        .post(&url)
        .header("content-type", "application/json")
        .body("{not json")
        .send()
        .await
        .unwrap();
    let wrong_type = http
        .post(&url)
        .header("content-type", "text/plain")
        .body("email=a@x.com")
        .send()
        .await
        .unwrap();
    let wrong_shape = http
        .post(&url)
        .json(&json!({ "email": { "nested": true }, "password": "x" }))
        .send()
        .await
        .unwrap();

    for resp in [malformed, wrong_type, wrong_shape] {
        assert_eq!(resp.status(), 400);
        let body: Value = resp.json().await.unwrap();
        assert_eq!(body["success"], false);
        assert!(body["message"].as_str().is_some_and(|m| !m.is_empty()));
    }

    handle.shutdown().await;
}

#[tokio::test]
async fn numeric_mobile_in_json_is_accepted() {
    let handle = boot_server().await;
    let resp = reqwest::Client::new()
        .post(format!("http://127.0.0.1:{}/users", handle.port))
        .json(&json!({
            "firstName": "Katherine",
            "lastName": "Johnson",
            "mobile": 5557778888u64,
            "email": "kj@nasa.gov",
            "street": "1 Langley Blvd",
            "city": "Hampton",
            "state": "Virginia",
            "country": "USA",
            "loginId": "orbit123",
            "password": "Apollo#11",
        }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 201);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["user"]["mobile"], "5557778888");

    handle.shutdown().await;
}
