//! §4.K: the Gateway Orchestrator's only HTTP surface, `GET /health`.
//! Concrete channel/provider wire clients carry their own external
//! interfaces out of scope here; this binary's web surface exists purely
//! so an operator or load balancer can probe liveness.

use std::sync::Arc;

use axum::{routing::get, Json, Router};
use serde_json::{json, Value};
use tower_http::trace::TraceLayer;

use crate::gateway::Gateway;

pub fn build_router(gateway: Arc<Gateway>) -> Router {
    Router::new()
        .route("/health", get(health_handler))
        .layer(TraceLayer::new_for_http())
        .with_state(gateway)
}

async fn health_handler(axum::extract::State(gateway): axum::extract::State<Arc<Gateway>>) -> Json<Value> {
    Json(json!({
        "status": "ok",
        "agents": gateway.agent_ids(),
    }))
}
