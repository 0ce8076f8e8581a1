//! Inbound HTTP surface
//!
//! OpenAI-compatible chat endpoint with SSE streaming, model listing,
//! WebSocket event channels, and the admin broadcast hook.

pub mod admin;
pub mod chat;
pub mod ws;

use crate::config::GatewayConfig;
use crate::core::cache::SemanticCache;
use crate::core::dispatch::Dispatcher;
use crate::core::events::EventHub;
use crate::core::optimizer::Optimizer;
use crate::core::registry::ProviderRegistry;
use crate::storage::Store;
use crate::utils::error::Result;
use actix_web::{web, App, HttpResponse};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::info;

/// Shared state handed to every handler
pub struct AppState {
    /// Provider registry
    pub registry: Arc<ProviderRegistry>,
    /// Request dispatcher
    pub dispatcher: Arc<Dispatcher>,
    /// Provider selector
    pub optimizer: Arc<Optimizer>,
    /// Semantic cache
    pub cache: Arc<SemanticCache>,
    /// Event fabric
    pub hub: Arc<EventHub>,
    /// Storage collaborator
    pub store: Arc<dyn Store>,
    /// Effective configuration
    pub config: GatewayConfig,
}

/// Route table
pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.route("/v1/chat/completions", web::post().to(chat::chat_completions))
        .route("/v1/models", web::get().to(chat::list_models))
        .route("/health", web::get().to(health))
        .route("/ws/{channel}", web::get().to(ws::subscribe))
        .route("/admin/ws/broadcast", web::post().to(admin::broadcast))
        .route("/admin/providers", web::post().to(admin::register_provider))
        .route("/admin/providers/{name}", web::delete().to(admin::unregister_provider))
        .route("/admin/providers/{name}/status", web::put().to(admin::set_provider_status))
        .route("/admin/recommendations/{user}", web::get().to(admin::recommendations));
}

async fn health(state: web::Data<AppState>) -> HttpResponse {
    HttpResponse::Ok().json(serde_json::json!({
        "status": "ok",
        "providers": state.registry.len(),
        "active_providers": state.registry.list_active().len(),
        "subscribers": state.hub.subscriber_count(),
    }))
}

/// The gateway HTTP server
pub struct HttpServer {
    host: String,
    port: u16,
    state: web::Data<AppState>,
}

impl HttpServer {
    /// Create a server over the shared state
    pub fn new(state: AppState) -> Self {
        let host = state.config.server.host.clone();
        let port = state.config.server.port;
        Self { host, port, state: web::Data::new(state) }
    }

    /// Run until cancelled
    pub async fn run(self, cancel: CancellationToken) -> Result<()> {
        let state = self.state.clone();
        let server = actix_web::HttpServer::new(move || {
            App::new().app_data(state.clone()).configure(configure)
        })
        .bind((self.host.as_str(), self.port))?
        .run();

        info!(host = %self.host, port = self.port, "http server listening");
        let handle = server.handle();
        tokio::select! {
            result = server => Ok(result?),
            _ = cancel.cancelled() => {
                info!("stopping http server");
                handle.stop(true).await;
                Ok(())
            }
        }
    }
}
