//! Discord gateway (WebSocket) session handling.
//!
//! One session: connect, wait for HELLO, identify, then heartbeat and
//! forward dispatches until the server or the network ends the session.
//! The caller reconnects.

use chrono::{DateTime, Utc};
use futures::{SinkExt, StreamExt};
use sagecord_core::channel::{BotUser, ChannelEvent, ChannelMessage};
use sagecord_core::error::ChannelError;
use serde::Deserialize;
use serde_json::Value;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::time::{Instant, Interval};
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::Message as WsMessage;
use tracing::{debug, info, warn};

/// `GUILDS | GUILD_MESSAGES | DIRECT_MESSAGES | MESSAGE_CONTENT`
pub const DEFAULT_INTENTS: u64 = 1 | (1 << 9) | (1 << 12) | (1 << 15);
pub const GATEWAY_QUERY: &str = "?v=10&encoding=json";
const MAX_BACKOFF: Duration = Duration::from_secs(60);

mod op {
    pub const DISPATCH: u8 = 0;
    pub const HEARTBEAT: u8 = 1;
    pub const IDENTIFY: u8 = 2;
    pub const RECONNECT: u8 = 7;
    pub const INVALID_SESSION: u8 = 9;
    pub const HELLO: u8 = 10;
    pub const HEARTBEAT_ACK: u8 = 11;
}

#[derive(Debug, Deserialize)]
struct Payload {
    op: u8,
    #[serde(default)]
    d: Value,
    #[serde(default)]
    s: Option<u64>,
    #[serde(default)]
    t: Option<String>,
}

#[derive(Debug, Deserialize)]
struct User {
    id: String,
    username: String,
    #[serde(default)]
    bot: bool,
}

#[derive(Debug, Deserialize)]
struct Ready {
    user: User,
}

#[derive(Debug, Deserialize)]
struct MessageCreate {
    id: String,
    channel_id: String,
    author: User,
    #[serde(default)]
    content: String,
    timestamp: DateTime<Utc>,
}

/// A decoded gateway frame.
#[derive(Debug)]
pub(crate) enum Inbound {
    Hello { heartbeat_interval: u64 },
    Dispatch { seq: Option<u64>, event: Option<ChannelEvent> },
    HeartbeatRequest,
    Reconnect,
    InvalidSession,
    HeartbeatAck,
    Other(u8),
}

fn invalid(e: serde_json::Error) -> ChannelError {
    ChannelError::InvalidPayload(e.to_string())
}

/// Decode one text frame.
pub(crate) fn decode(text: &str) -> Result<Inbound, ChannelError> {
    let payload: Payload = serde_json::from_str(text).map_err(invalid)?;
    Ok(match payload.op {
        op::HELLO => {
            let interval = payload
                .d
                .get("heartbeat_interval")
                .and_then(Value::as_u64)
                .ok_or_else(|| ChannelError::InvalidPayload("HELLO without heartbeat_interval".into()))?;
            Inbound::Hello {
                heartbeat_interval: interval,
            }
        }
        op::DISPATCH => Inbound::Dispatch {
            seq: payload.s,
            event: decode_dispatch(payload.t.as_deref(), payload.d)?,
        },
        op::HEARTBEAT => Inbound::HeartbeatRequest,
        op::RECONNECT => Inbound::Reconnect,
        op::INVALID_SESSION => Inbound::InvalidSession,
        op::HEARTBEAT_ACK => Inbound::HeartbeatAck,
        other => Inbound::Other(other),
    })
}

fn decode_dispatch(kind: Option<&str>, data: Value) -> Result<Option<ChannelEvent>, ChannelError> {
    match kind {
        Some("READY") => {
            let ready: Ready = serde_json::from_value(data).map_err(invalid)?;
            Ok(Some(ChannelEvent::Ready(BotUser {
                id: ready.user.id,
                name: ready.user.username,
            })))
        }
        Some("MESSAGE_CREATE") => {
            let msg: MessageCreate = serde_json::from_value(data).map_err(invalid)?;
            Ok(Some(ChannelEvent::Message(ChannelMessage {
                message_id: msg.id,
                channel_id: msg.channel_id,
                author_id: msg.author.id,
                author_name: msg.author.username,
                author_is_bot: msg.author.bot,
                content: msg.content,
                timestamp: msg.timestamp,
            })))
        }
        _ => Ok(None),
    }
}

pub(crate) fn identify(token: &str, intents: u64) -> String {
    serde_json::json!({
        "op": op::IDENTIFY,
        "d": {
            "token": token,
            "intents": intents,
            "properties": {
                "os": std::env::consts::OS,
                "browser": "sagecord",
                "device": "sagecord"
            }
        }
    })
    .to_string()
}

pub(crate) fn heartbeat(seq: Option<u64>) -> String {
    serde_json::json!({ "op": op::HEARTBEAT, "d": seq }).to_string()
}

/// Delay before reconnect attempt `attempt` (0-based).
pub(crate) fn backoff(attempt: u32) -> Duration {
    Duration::from_secs(1u64 << attempt.min(6)).min(MAX_BACKOFF)
}

/// Why a session ended without an error.
#[derive(Debug, PartialEq, Eq)]
pub(crate) enum SessionEnd {
    /// The server asked us to reconnect or dropped the socket.
    Reconnect,
    /// Nobody is listening for events any more.
    Shutdown,
}

/// Close codes after which reconnecting cannot help (bad token, intents).
pub(crate) fn is_fatal_close(code: u16) -> bool {
    matches!(code, 4004 | 4010..=4014)
}

async fn tick(heartbeat: &mut Option<Interval>) {
    match heartbeat {
        Some(interval) => {
            interval.tick().await;
        }
        None => std::future::pending().await,
    }
}

/// Run one gateway session against `url`.
pub(crate) async fn run_session(
    url: &str,
    token: &str,
    intents: u64,
    events: &mpsc::Sender<Result<ChannelEvent, ChannelError>>,
) -> Result<SessionEnd, ChannelError> {
    let (socket, _) = connect_async(url)
        .await
        .map_err(|e| ChannelError::ConnectionLost(e.to_string()))?;
    info!("Discord gateway connected");

    let (mut write, mut read) = socket.split();
    let mut seq: Option<u64> = None;
    let mut heartbeat_timer: Option<Interval> = None;
    let mut awaiting_ack = false;

    let lost = |e: tokio_tungstenite::tungstenite::Error| ChannelError::ConnectionLost(e.to_string());

    loop {
        tokio::select! {
            frame = read.next() => {
                let Some(frame) = frame else {
                    return Ok(SessionEnd::Reconnect);
                };
                let text = match frame.map_err(lost)? {
                    WsMessage::Text(text) => text,
                    WsMessage::Close(frame) => {
                        info!(?frame, "Discord gateway closed");
                        if let Some(frame) = frame
                            && is_fatal_close(u16::from(frame.code))
                        {
                            return Err(ChannelError::NotConfigured(format!(
                                "gateway closed with {}: {}",
                                u16::from(frame.code),
                                frame.reason
                            )));
                        }
                        return Ok(SessionEnd::Reconnect);
                    }
                    _ => continue,
                };

                let inbound = match decode(&text) {
                    Ok(inbound) => inbound,
                    Err(e) => {
                        if events.send(Err(e)).await.is_err() {
                            return Ok(SessionEnd::Shutdown);
                        }
                        continue;
                    }
                };

                match inbound {
                    Inbound::Hello { heartbeat_interval } => {
                        let period = Duration::from_millis(heartbeat_interval.max(1));
                        debug!(heartbeat_ms = heartbeat_interval, "Discord HELLO");
                        heartbeat_timer = Some(tokio::time::interval_at(Instant::now() + period, period));
                        write.send(WsMessage::Text(identify(token, intents))).await.map_err(lost)?;
                    }
                    Inbound::Dispatch { seq: s, event } => {
                        if s.is_some() {
                            seq = s;
                        }
                        if let Some(event) = event
                            && events.send(Ok(event)).await.is_err()
                        {
                            return Ok(SessionEnd::Shutdown);
                        }
                    }
                    Inbound::HeartbeatRequest => {
                        write.send(WsMessage::Text(heartbeat(seq))).await.map_err(lost)?;
                    }
                    Inbound::HeartbeatAck => awaiting_ack = false,
                    Inbound::Reconnect => {
                        info!("Discord requested reconnect");
                        return Ok(SessionEnd::Reconnect);
                    }
                    Inbound::InvalidSession => {
                        warn!("Discord invalidated the session");
                        return Ok(SessionEnd::Reconnect);
                    }
                    Inbound::Other(code) => debug!(op = code, "Ignoring gateway opcode"),
                }
            }
            _ = tick(&mut heartbeat_timer) => {
                if awaiting_ack {
                    warn!("Heartbeat not acknowledged; reconnecting");
                    return Ok(SessionEnd::Reconnect);
                }
                write.send(WsMessage::Text(heartbeat(seq))).await.map_err(lost)?;
                awaiting_ack = true;
            }
        }
    }
}
