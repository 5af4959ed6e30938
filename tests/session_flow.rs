//! End-to-end tests driving the real `axum` router plus live WebSocket
//! connections, in the style of the pack's own daemon integration tests:
//! spin the server up on a random local port, talk to it the way a real
//! client would (HTTP for session setup, WebSocket for gameplay), and
//! assert on the wire messages it produces.

use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use futures_util::{SinkExt, StreamExt};
use jsonwebtoken::{encode, Algorithm, EncodingKey, Header};
use serde_json::{json, Value};
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::Message;

use review_arcade::arcade::model::BankQuestionSpec;
use review_arcade::http::{self, AppState};
use review_arcade::network::auth::AuthConfig;
use review_arcade::session::Registry;
use review_arcade::ServerConfig;

const TEST_SECRET: &str = "integration-test-secret-please-ignore";

fn teacher_token(teacher_id: &str) -> String {
    let now = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap()
        .as_secs();
    let claims = json!({
        "sub": teacher_id,
        "exp": now + 3600,
        "iat": now,
    });
    encode(
        &Header::new(Algorithm::HS256),
        &claims,
        &EncodingKey::from_secret(TEST_SECRET.as_bytes()),
    )
    .unwrap()
}

/// Boot a full server (registry + reaper + router) on an ephemeral port and
/// return its base HTTP/WS origins.
async fn start_test_server() -> (String, String) {
    let mut config = ServerConfig::default();
    config.auth = AuthConfig {
        secret: Some(TEST_SECRET.into()),
        ..Default::default()
    };
    // Fast heartbeat/reap settings would make these tests flaky; the
    // defaults are generous enough for a request/response round trip.
    let config = Arc::new(config);

    let registry = Registry::new((*config).clone());
    registry.spawn_reaper();
    let state = AppState {
        registry,
        config: config.clone(),
    };
    let router = http::router(state);

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, router).await.ok();
    });
    tokio::time::sleep(std::time::Duration::from_millis(20)).await;

    (
        format!("http://{addr}"),
        format!("ws://{addr}"),
    )
}

async fn create_bank_session(http_origin: &str, client: &reqwest::Client, teacher_id: &str) -> Value {
    let body = json!({
        "game_type": "platformer",
        "teacher_mode": "play",
        "time_limit_minutes": 10,
        "max_players": 10,
        "question_source": "bank",
        "bank_questions": [BankQuestionSpec {
            text: "2 + 2?".into(),
            options: ["4".into(), "5".into(), "22".into(), "0".into()],
            correct_index: 0,
            category: None,
            difficulty: None,
        }],
    });

    let resp = client
        .post(format!("{http_origin}/api/reviewarcade/sessions"))
        .bearer_auth(teacher_token(teacher_id))
        .json(&body)
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), reqwest::StatusCode::OK, "create_session failed");
    resp.json().await.unwrap()
}

#[tokio::test]
async fn create_session_rejects_missing_auth() {
    let (http_origin, _ws_origin) = start_test_server().await;
    let client = reqwest::Client::new();

    let resp = client
        .post(format!("{http_origin}/api/reviewarcade/sessions"))
        .json(&json!({
            "game_type": "platformer",
            "teacher_mode": "play",
            "time_limit_minutes": 10,
            "max_players": 10,
            "question_source": "math",
        }))
        .send()
        .await
        .unwrap();

    assert_eq!(resp.status(), reqwest::StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn full_join_start_death_answer_flow() {
    let (http_origin, ws_origin) = start_test_server().await;
    let client = reqwest::Client::new();

    let summary = create_bank_session(&http_origin, &client, "teacher-1").await;
    let code = summary["code"].as_str().unwrap().to_string();

    // Preview is visible pre-start and reports an empty lobby.
    let preview: Value = client
        .get(format!("{http_origin}/api/reviewarcade/sessions/{code}"))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(preview["status"], "lobby");
    assert_eq!(preview["player_count"], 0);

    // A player joins over REST to mint a player token.
    let join: Value = client
        .post(format!("{http_origin}/api/reviewarcade/sessions/{code}/join"))
        .json(&json!({ "name": "Ada" }))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    let player_token = join["player_token"].as_str().unwrap().to_string();

    // Host and player each open their WebSocket and send `init`.
    let (mut host_ws, _) = connect_async(format!("{ws_origin}/ws/reviewarcade/{code}"))
        .await
        .expect("host ws connect");
    host_ws
        .send(Message::Text(
            json!({"type": "init", "role": "host", "teacher_token": teacher_token("teacher-1")})
                .to_string(),
        ))
        .await
        .unwrap();
    let _host_state = recv_json(&mut host_ws).await;

    let (mut player_ws, _) = connect_async(format!("{ws_origin}/ws/reviewarcade/{code}"))
        .await
        .expect("player ws connect");
    player_ws
        .send(Message::Text(
            json!({"type": "init", "role": "player", "player_token": player_token})
                .to_string(),
        ))
        .await
        .unwrap();
    let _player_state = recv_json(&mut player_ws).await;

    // Host observes the join.
    let player_connected = recv_json(&mut host_ws).await;
    assert_eq!(player_connected["type"], "player_connected");
    assert_eq!(player_connected["display_name"], "Ada");

    // Host starts the session; both sides see `session_started`.
    host_ws
        .send(Message::Text(json!({"type": "start_session"}).to_string()))
        .await
        .unwrap();
    let started_host = recv_json(&mut host_ws).await;
    assert_eq!(started_host["type"], "session_started");
    let started_player = recv_json(&mut player_ws).await;
    assert_eq!(started_player["type"], "session_started");

    // The player dies, which requests their first question.
    player_ws
        .send(Message::Text(json!({"type": "death", "score": 0}).to_string()))
        .await
        .unwrap();
    let question = recv_json(&mut player_ws).await;
    assert_eq!(question["type"], "question");
    assert_eq!(question["text"], "2 + 2?");
    let question_id = question["question_id"].as_str().unwrap().to_string();

    // Answering correctly credits a bonus and restarts the streak.
    player_ws
        .send(Message::Text(
            json!({
                "type": "answer",
                "question_id": question_id,
                "answer_index": 0,
                "time_ms": 1200,
            })
            .to_string(),
        ))
        .await
        .unwrap();
    let answered = recv_json(&mut player_ws).await;
    assert_eq!(answered["type"], "answer_correct");
    assert_eq!(answered["current_streak"], 1);

    // The host sees the leaderboard update that follows every answer.
    let leaderboard = recv_json(&mut host_ws).await;
    assert_eq!(leaderboard["type"], "leaderboard_update");
    assert_eq!(leaderboard["entries"][0]["display_name"], "Ada");
}

#[tokio::test]
async fn results_endpoint_is_scoped_to_the_owning_teacher() {
    let (http_origin, _ws_origin) = start_test_server().await;
    let client = reqwest::Client::new();

    let summary = create_bank_session(&http_origin, &client, "teacher-1").await;
    let session_id = summary["id"].as_str().unwrap().to_string();

    let resp = client
        .get(format!("{http_origin}/api/reviewarcade/sessions/{session_id}/results"))
        .bearer_auth(teacher_token("a-different-teacher"))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), reqwest::StatusCode::FORBIDDEN);

    let resp = client
        .get(format!("{http_origin}/api/reviewarcade/sessions/{session_id}/results"))
        .bearer_auth(teacher_token("teacher-1"))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), reqwest::StatusCode::OK);
}

async fn recv_json(
    ws: &mut tokio_tungstenite::WebSocketStream<
        tokio_tungstenite::MaybeTlsStream<tokio::net::TcpStream>,
    >,
) -> Value {
    loop {
        match ws.next().await.expect("stream ended").unwrap() {
            Message::Text(text) => return serde_json::from_str(&text).unwrap(),
            Message::Ping(_) | Message::Pong(_) => continue,
            other => panic!("unexpected message: {other:?}"),
        }
    }
}
