//! WebSocket event channels
//!
//! Each connection subscribes to one channel at upgrade time and may adjust
//! its subscription set with `{type: subscribe|unsubscribe, data: {channels}}`
//! messages. Events arrive as `{type, timestamp, data}` JSON frames.

use super::AppState;
use crate::core::types::{Channel, Event, EventType};
use actix_web::{web, HttpRequest, HttpResponse};
use futures_util::StreamExt;
use serde::Deserialize;
use serde_json::json;
use tracing::{debug, warn};

#[derive(Debug, Deserialize)]
struct ControlMessage {
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    data: ControlData,
}

#[derive(Debug, Default, Deserialize)]
struct ControlData {
    #[serde(default)]
    channels: Vec<String>,
}

/// `GET /ws/{channel}` upgrade handler
pub async fn subscribe(
    req: HttpRequest,
    stream: web::Payload,
    state: web::Data<AppState>,
    path: web::Path<String>,
) -> actix_web::Result<HttpResponse> {
    let channel: Channel = path
        .into_inner()
        .parse()
        .map_err(actix_web::error::ErrorBadRequest)?;

    let (response, mut session, mut msg_stream) = actix_ws::handle(&req, stream)?;
    let hub = state.hub.clone();
    let (id, mut events) = hub.subscribe(&[channel]);

    actix_web::rt::spawn(async move {
        loop {
            tokio::select! {
                event = events.recv() => {
                    let Some(event) = event else { break };
                    let Ok(text) = serde_json::to_string(&event) else { continue };
                    if session.text(text).await.is_err() {
                        break;
                    }
                }
                message = msg_stream.next() => {
                    let Some(Ok(message)) = message else { break };
                    match message {
                        actix_ws::Message::Text(text) => {
                            hub.touch(&id);
                            handle_control(&hub, &id, &text, &mut session).await;
                        }
                        actix_ws::Message::Ping(payload) => {
                            hub.touch(&id);
                            if session.pong(&payload).await.is_err() {
                                break;
                            }
                        }
                        actix_ws::Message::Pong(_) => hub.touch(&id),
                        actix_ws::Message::Close(_) => break,
                        _ => {}
                    }
                }
            }
        }
        hub.unsubscribe(&id);
        let _ = session.close(None).await;
    });

    Ok(response)
}

/// Apply a subscribe/unsubscribe control message
///
/// A message naming any invalid channel is rejected whole; the subscription
/// set is left untouched.
async fn handle_control(
    hub: &crate::core::events::EventHub,
    id: &uuid::Uuid,
    text: &str,
    session: &mut actix_ws::Session,
) {
    let message: ControlMessage = match serde_json::from_str(text) {
        Ok(message) => message,
        Err(error) => {
            debug!(%error, "unparseable control message");
            send_error(session, "invalid control message").await;
            return;
        }
    };

    let mut channels = Vec::with_capacity(message.data.channels.len());
    for name in &message.data.channels {
        match name.parse::<Channel>() {
            Ok(channel) => channels.push(channel),
            Err(error) => {
                warn!(%error, "control message names an invalid channel");
                send_error(session, &format!("unknown channel: {}", name)).await;
                return;
            }
        }
    }

    match message.kind.as_str() {
        "subscribe" => hub.add_channels(id, &channels),
        "unsubscribe" => hub.remove_channels(id, &channels),
        other => {
            send_error(session, &format!("unknown message type: {}", other)).await;
        }
    }
}

async fn send_error(session: &mut actix_ws::Session, message: &str) {
    let event = Event::new(EventType::Error, json!({ "message": message }));
    if let Ok(text) = serde_json::to_string(&event) {
        let _ = session.text(text).await;
    }
}
