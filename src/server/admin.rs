//! Admin broadcast hook

use super::AppState;
use crate::core::types::{Channel, Event, EventType};
use crate::utils::error::{GatewayError, Result};
use actix_web::{web, HttpResponse};
use serde::Deserialize;

#[derive(Debug, Deserialize)]
pub struct BroadcastRequest {
    /// Target channel name
    pub channel: String,
    /// Event type name
    #[serde(rename = "type")]
    pub kind: String,
    /// Opaque payload
    #[serde(default)]
    pub data: serde_json::Value,
}

/// `POST /admin/ws/broadcast` — emit an event through the fabric
pub async fn broadcast(
    state: web::Data<AppState>,
    body: web::Json<BroadcastRequest>,
) -> Result<HttpResponse> {
    let request = body.into_inner();
    let channel: Channel = request
        .channel
        .parse()
        .map_err(GatewayError::InvalidRequest)?;
    let event_type: EventType = serde_json::from_value(serde_json::Value::String(request.kind))
        .map_err(|_| GatewayError::InvalidRequest("unknown event type".to_string()))?;

    state.hub.publisher().publish(channel, Event::new(event_type, request.data));
    Ok(HttpResponse::Ok().json(serde_json::json!({ "status": "queued" })))
}

/// `POST /admin/providers` — manual provider registration
pub async fn register_provider(
    state: web::Data<AppState>,
    body: web::Json<crate::config::ProviderSeed>,
) -> Result<HttpResponse> {
    let provider = body.into_inner().to_provider(&state.config.http);
    let name = provider.name.clone();
    state.registry.register(provider.clone())?;
    state.store.save_provider(&provider).await?;
    Ok(HttpResponse::Created().json(serde_json::json!({ "name": name })))
}

/// `DELETE /admin/providers/{name}` — unregister a provider
///
/// Deletion cascades: the provider row carries its models and rate limits.
pub async fn unregister_provider(
    state: web::Data<AppState>,
    path: web::Path<String>,
) -> Result<HttpResponse> {
    let name = path.into_inner();
    state.registry.unregister(&name)?;
    state.store.delete_provider(&name).await?;
    Ok(HttpResponse::Ok().json(serde_json::json!({ "removed": name })))
}

/// `PUT /admin/providers/{name}/status` — set a provider's lifecycle status
pub async fn set_provider_status(
    state: web::Data<AppState>,
    path: web::Path<String>,
    body: web::Json<serde_json::Value>,
) -> Result<HttpResponse> {
    let name = path.into_inner();
    let status: crate::core::types::ProviderStatus =
        serde_json::from_value(body.into_inner()["status"].clone())
            .map_err(|_| GatewayError::InvalidRequest("unknown provider status".to_string()))?;
    state.registry.set_status(&name, status)?;
    Ok(HttpResponse::Ok().json(serde_json::json!({ "name": name, "status": status })))
}

/// `GET /admin/recommendations/{user}` — savings recommendations for a user
pub async fn recommendations(
    state: web::Data<AppState>,
    path: web::Path<String>,
) -> Result<HttpResponse> {
    let user = path.into_inner();
    let recommendations =
        crate::core::optimizer::recommendations_for_user(state.store.as_ref(), &user).await?;
    Ok(HttpResponse::Ok().json(recommendations))
}
