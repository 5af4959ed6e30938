//! Connection (spec §4.2): the reader/writer pump pair for one WebSocket.
//! Split-socket-plus-select loop, in the manner other examples in the pack
//! use for their own WS handlers; the outbound side drains a bounded
//! `mpsc` queue so a slow client never blocks the session actor.

use std::time::Duration;

use axum::extract::ws::{Message, WebSocket};
use futures_util::stream::SplitSink;
use futures_util::{SinkExt, StreamExt};
use tokio::sync::{mpsc, oneshot};
use tokio::time::interval;
use tracing::{debug, warn};

use crate::arcade::model::{now_unix, ConnHandle, PlayerId};
use crate::error::ErrorKind;
use crate::network::auth::{validate_token, AuthConfig};
use crate::network::codec::{decode_client_message, encode_server_message, ClientMessage, Role, ServerMessage};
use crate::session::{Registry, SessionCommand, SessionHandle};

/// Configuration the connection pump needs, sourced from `ServerConfig`.
pub struct ConnectionConfig {
    pub heartbeat_interval_seconds: u64,
    pub heartbeat_timeout_seconds: u64,
    pub outbound_queue_capacity: usize,
}

/// Drive one player/host WebSocket connection to completion.
///
/// The first frame must be `init`; everything after is forwarded to the
/// session actor and the actor's outbound queue is pumped back onto the
/// socket until either side closes or the heartbeat times out.
pub async fn handle(
    socket: WebSocket,
    session_code: String,
    registry: Registry,
    config: ConnectionConfig,
    auth: AuthConfig,
) {
    let (mut ws_tx, mut ws_rx) = socket.split();

    let Ok(session) = registry.lookup(&session_code).await else {
        send_error_and_close(&mut ws_tx, "session not found").await;
        return;
    };

    let first = match tokio::time::timeout(Duration::from_secs(5), ws_rx.next()).await {
        Ok(Some(Ok(Message::Text(text)))) => text,
        Ok(_) => {
            debug!("connection closed before init");
            return;
        }
        Err(_) => {
            send_error_and_close(&mut ws_tx, "auth_required").await;
            return;
        }
    };
    let init = match decode_client_message(&first) {
        Ok(ClientMessage::Init { role, teacher_token, player_token }) => (role, teacher_token, player_token),
        Ok(_) => {
            send_error_and_close(&mut ws_tx, "expected an init message").await;
            return;
        }
        Err(e) => {
            send_error_and_close(&mut ws_tx, &e.to_string()).await;
            return;
        }
    };

    let (msg_tx, mut out_rx) = mpsc::channel::<ServerMessage>(config.outbound_queue_capacity);
    let (close_tx, mut close_rx) = mpsc::channel::<ErrorKind>(1);
    let out_tx: ConnHandle = ConnHandle::new(msg_tx.clone(), close_tx);

    let (role, player_id) = match init {
        (Role::Host, Some(teacher_token), _) => {
            let teacher_id = match validate_token(&teacher_token, &auth) {
                Ok(claims) => claims.teacher_id().to_string(),
                Err(e) => {
                    send_error_and_close(&mut ws_tx, &e.to_string()).await;
                    return;
                }
            };
            if !attach_host(&session, out_tx.clone(), teacher_id, &mut ws_tx).await {
                return;
            }
            (Role::Host, None)
        }
        (Role::Player, _, Some(player_token)) => {
            match attach_player(&session, out_tx.clone(), player_token, &mut ws_tx).await {
                Some(pid) => (Role::Player, Some(pid)),
                None => return,
            }
        }
        _ => {
            send_error_and_close(&mut ws_tx, "init missing required token for role").await;
            return;
        }
    };

    pump(
        &mut ws_tx,
        &mut ws_rx,
        &mut out_rx,
        &mut close_rx,
        &msg_tx,
        &session,
        role,
        player_id,
        &config,
    )
    .await;

    let _ = session
        .send(SessionCommand::Disconnect {
            player_id,
            is_host: matches!(role, Role::Host),
        })
        .await;
    let _ = ws_tx.close().await;
}

async fn attach_host(
    session: &SessionHandle,
    conn: ConnHandle,
    teacher_id: String,
    ws_tx: &mut SplitSink<WebSocket, Message>,
) -> bool {
    let (reply, rx) = oneshot::channel();
    if session
        .send(SessionCommand::HostConnected { conn, teacher_id, reply })
        .await
        .is_err()
    {
        send_error_and_close(ws_tx, "session actor unreachable").await;
        return false;
    }
    match rx.await {
        Ok(Ok(())) => true,
        Ok(Err(e)) => {
            send_error_and_close(ws_tx, &e.to_string()).await;
            false
        }
        Err(_) => {
            send_error_and_close(ws_tx, "session actor unreachable").await;
            false
        }
    }
}

async fn attach_player(
    session: &SessionHandle,
    conn: ConnHandle,
    token: String,
    ws_tx: &mut SplitSink<WebSocket, Message>,
) -> Option<PlayerId> {
    let (reply, rx) = oneshot::channel();
    if session
        .send(SessionCommand::PlayerConnected { conn, token, reply })
        .await
        .is_err()
    {
        send_error_and_close(ws_tx, "session actor unreachable").await;
        return None;
    }
    match rx.await {
        Ok(Ok(player_id)) => Some(player_id),
        Ok(Err(e)) => {
            send_error_and_close(ws_tx, &e.to_string()).await;
            None
        }
        Err(_) => {
            send_error_and_close(ws_tx, "session actor unreachable").await;
            None
        }
    }
}

#[allow(clippy::too_many_arguments)]
async fn pump(
    ws_tx: &mut SplitSink<WebSocket, Message>,
    ws_rx: &mut futures_util::stream::SplitStream<WebSocket>,
    out_rx: &mut mpsc::Receiver<ServerMessage>,
    close_rx: &mut mpsc::Receiver<ErrorKind>,
    msg_tx: &mpsc::Sender<ServerMessage>,
    session: &SessionHandle,
    role: Role,
    player_id: Option<PlayerId>,
    config: &ConnectionConfig,
) {
    let mut heartbeat = interval(Duration::from_secs(config.heartbeat_interval_seconds));
    let mut last_pong = tokio::time::Instant::now();
    let timeout = Duration::from_secs(config.heartbeat_timeout_seconds);

    loop {
        tokio::select! {
            incoming = ws_rx.next() => {
                match incoming {
                    Some(Ok(Message::Text(text))) => {
                        if is_pong(&text) {
                            last_pong = tokio::time::Instant::now();
                        }
                        match forward_client_message(&text, session, role, player_id).await {
                            Ok(Some(control_rx)) => {
                                if let Ok(Err(e)) = control_rx.await {
                                    let _ = msg_tx.send(ServerMessage::Error { message: e.to_string() }).await;
                                }
                            }
                            Ok(None) => {}
                            Err(e) => debug!("dropping unroutable client frame: {e}"),
                        }
                    }
                    Some(Ok(Message::Close(_))) | None => {
                        debug!("connection closed by peer");
                        break;
                    }
                    Some(Err(e)) => {
                        warn!("websocket error: {e}");
                        break;
                    }
                    _ => {}
                }
            }
            outgoing = out_rx.recv() => {
                match outgoing {
                    Some(msg) => {
                        let text = encode_server_message(&msg);
                        if ws_tx.send(Message::Text(text)).await.is_err() {
                            warn!("failed to write outbound frame, closing connection");
                            break;
                        }
                    }
                    None => break,
                }
            }
            reason = close_rx.recv() => {
                let reason = reason.unwrap_or(ErrorKind::SlowConsumer);
                warn!(reason = reason.as_str(), "force-closing connection");
                send_error_and_close(ws_tx, reason.as_str()).await;
                break;
            }
            _ = heartbeat.tick() => {
                if last_pong.elapsed() > timeout {
                    warn!("heartbeat timeout, closing connection");
                    send_error_and_close(ws_tx, ErrorKind::HeartbeatTimeout.as_str()).await;
                    break;
                }
                let ping = encode_server_message(&ServerMessage::Ping { t: now_unix() });
                if ws_tx.send(Message::Text(ping)).await.is_err() {
                    break;
                }
            }
        }
    }
}

fn is_pong(text: &str) -> bool {
    matches!(decode_client_message(text), Ok(ClientMessage::Pong))
}

type ControlReply = oneshot::Receiver<Result<(), crate::error::SessionError>>;

/// Decode one inbound frame and forward it to the session actor as a
/// command. Host control messages (`start_session` et al.) carry a reply
/// channel so the caller can relay a rejection back to that connection;
/// everything else is fire-and-forget from the connection's point of view
/// (the actor still replies to the affected player directly).
async fn forward_client_message(
    text: &str,
    session: &SessionHandle,
    role: Role,
    player_id: Option<PlayerId>,
) -> Result<Option<ControlReply>, String> {
    let msg = decode_client_message(text).map_err(|e| e.to_string())?;
    let mut control_rx = None;
    let cmd = match (msg, role, player_id) {
        (ClientMessage::Death { score, metadata }, Role::Player, Some(pid)) => {
            SessionCommand::Death {
                player_id: pid,
                run_score: score,
                metadata,
            }
        }
        (
            ClientMessage::Answer {
                question_id,
                answer_index,
                time_ms,
            },
            Role::Player,
            Some(pid),
        ) => SessionCommand::Answer {
            player_id: pid,
            question_id,
            answer_index,
            time_ms,
        },
        (ClientMessage::ScoreUpdate { score }, Role::Player, Some(pid)) => {
            SessionCommand::ScoreUpdate { player_id: pid, score }
        }
        (ClientMessage::SpecialEvent { event }, Role::Player, Some(pid)) => {
            SessionCommand::SpecialEvent { player_id: pid, event }
        }
        (ClientMessage::StartSession, Role::Host, _) => {
            let (reply, rx) = oneshot::channel();
            control_rx = Some(rx);
            SessionCommand::StartSession { reply }
        }
        (ClientMessage::PauseSession, Role::Host, _) => {
            let (reply, rx) = oneshot::channel();
            control_rx = Some(rx);
            SessionCommand::PauseSession { reply }
        }
        (ClientMessage::ResumeSession, Role::Host, _) => {
            let (reply, rx) = oneshot::channel();
            control_rx = Some(rx);
            SessionCommand::ResumeSession { reply }
        }
        (ClientMessage::EndSession, Role::Host, _) => {
            let (reply, rx) = oneshot::channel();
            control_rx = Some(rx);
            SessionCommand::EndSession { reply }
        }
        (ClientMessage::Pong, _, pid) => SessionCommand::Pong {
            player_id: pid,
            is_host: matches!(role, Role::Host),
        },
        _ => return Err("message not valid for this connection's role".into()),
    };
    session.send(cmd).await.map_err(|e| e.to_string())?;
    Ok(control_rx)
}

async fn send_error_and_close(ws_tx: &mut SplitSink<WebSocket, Message>, message: &str) {
    let _ = ws_tx
        .send(Message::Text(encode_server_message(&ServerMessage::Error {
            message: message.to_string(),
        })))
        .await;
    let _ = ws_tx.close().await;
}
