//! Chat completion endpoint
//!
//! Accepts the OpenAI wire shape, which is also the canonical schema.
//! Non-streamed requests consult the semantic cache before the optimizer
//! picks a provider; streamed requests relay canonical chunks as SSE frames.

use super::AppState;
use crate::core::optimizer::{estimate_complexity, SelectionRequest};
use crate::core::types::{ChatChunk, ChatRequest, Channel, Event, EventType};
use crate::utils::error::{GatewayError, Result};
use actix_web::{web, HttpResponse};
use serde_json::json;
use tracing::{debug, warn};

/// `POST /v1/chat/completions`
pub async fn chat_completions(
    state: web::Data<AppState>,
    body: web::Json<ChatRequest>,
) -> Result<HttpResponse> {
    let request = body.into_inner();
    if request.messages.is_empty() {
        return Err(GatewayError::InvalidRequest("messages cannot be empty".to_string()));
    }

    if request.stream {
        stream_completion(state, request).await
    } else {
        blocking_completion(state, request).await
    }
}

async fn blocking_completion(
    state: web::Data<AppState>,
    request: ChatRequest,
) -> Result<HttpResponse> {
    let prompt = request.prompt_text();

    // Tool-calling conversations are stateful; only plain prompts cache well
    let cacheable = request.tools.is_none();
    if cacheable {
        match state.cache.lookup(&prompt).await {
            Ok(Some(hit)) => {
                debug!(entry = %hit.entry_id, similarity = hit.similarity, "served from cache");
                return Ok(HttpResponse::Ok().json(hit.response));
            }
            Ok(None) => {}
            Err(error) => warn!(%error, "cache lookup failed, dispatching"),
        }
    }

    let selection = state.optimizer.select(&SelectionRequest {
        user_id: request.user.clone(),
        ..SelectionRequest::chat(prompt.len(), estimate_complexity(&prompt))
    });

    let response = match selection {
        Ok(selection) => {
            state.dispatcher.execute(&request, Some(&selection.best.provider)).await?
        }
        // Nothing passed filtering; fall back to plain failover
        Err(GatewayError::NoSuitableProvider(_)) => {
            state.dispatcher.execute_balanced(&request).await?
        }
        Err(error) => return Err(error),
    };

    if cacheable {
        let cached = serde_json::to_value(&response)?;
        if let Err(error) = state.cache.insert(&prompt, cached, None, Default::default()).await {
            warn!(%error, "cache insert failed");
        }
    }

    state.hub.publisher().publish(
        Channel::Logs,
        Event::new(
            EventType::Log,
            json!({ "model": response.model, "id": response.id, "cached": false }),
        ),
    );
    Ok(HttpResponse::Ok().json(response))
}

/// Encode a canonical chunk as one OpenAI wire chunk
fn encode_openai_chunk(chunk: &ChatChunk) -> serde_json::Value {
    let mut delta = json!({});
    if !chunk.delta.is_empty() {
        delta["content"] = json!(chunk.delta);
    }
    if !chunk.tool_calls.is_empty() {
        delta["tool_calls"] = json!(chunk.tool_calls);
    }
    json!({
        "id": chunk.id,
        "object": "chat.completion.chunk",
        "created": chunk.created,
        "model": chunk.model,
        "choices": [{
            "index": 0,
            "delta": delta,
            "finish_reason": chunk.finish_reason,
        }],
        "usage": chunk.usage,
    })
}

async fn stream_completion(
    state: web::Data<AppState>,
    request: ChatRequest,
) -> Result<HttpResponse> {
    let prompt = request.prompt_text();
    let selection = state
        .optimizer
        .select(&SelectionRequest {
            user_id: request.user.clone(),
            ..SelectionRequest::chat(prompt.len(), estimate_complexity(&prompt))
        })
        .ok();
    let provider_name = selection.map(|s| s.best.provider);

    enum StreamItem {
        Chunk(ChatChunk),
        Failed(&'static str, String),
    }

    let (tx, mut rx) = tokio::sync::mpsc::channel::<StreamItem>(64);
    let dispatcher = state.dispatcher.clone();
    tokio::spawn(async move {
        let sender = tx.clone();
        let result = dispatcher
            .stream(&request, provider_name.as_deref(), move |chunk| {
                sender.try_send(StreamItem::Chunk(chunk)).is_ok()
            })
            .await;
        if let Err(error) = result {
            // A final frame carries the error code before the stream closes
            let _ = tx.try_send(StreamItem::Failed(error.code(), error.to_string()));
        }
    });

    let body = async_stream::stream! {
        while let Some(item) = rx.recv().await {
            match item {
                StreamItem::Failed(code, message) => {
                    let frame = json!({ "error": { "code": code, "message": message } });
                    yield Ok::<_, GatewayError>(web::Bytes::from(format!("data: {}\n\n", frame)));
                    break;
                }
                StreamItem::Chunk(chunk) if chunk.done => {
                    yield Ok(web::Bytes::from_static(b"data: [DONE]\n\n"));
                    break;
                }
                StreamItem::Chunk(chunk) => {
                    let frame = encode_openai_chunk(&chunk);
                    yield Ok(web::Bytes::from(format!("data: {}\n\n", frame)));
                }
            }
        }
    };

    Ok(HttpResponse::Ok()
        .content_type("text/event-stream")
        .insert_header(("Cache-Control", "no-cache"))
        .streaming(body))
}

/// `GET /v1/models` — models across active providers, OpenAI list shape
pub async fn list_models(state: web::Data<AppState>) -> HttpResponse {
    let mut data = Vec::new();
    for provider in state.registry.list_active() {
        for model in &provider.models {
            data.push(json!({
                "id": model.name,
                "object": "model",
                "owned_by": provider.name,
            }));
        }
    }
    HttpResponse::Ok().json(json!({ "object": "list", "data": data }))
}
