//! HTTP router for the queue workflow.

use axum::{extract::State, http::StatusCode, response::IntoResponse, routing::get, Router};
use busq::QueueWorkflow;
use std::sync::Arc;
use tower_http::trace::TraceLayer;

pub fn create_router(workflow: Arc<QueueWorkflow>) -> Router {
    Router::new()
        .route("/health", get(health_check))
        .route("/queue", get(process))
        .layer(TraceLayer::new_for_http())
        .with_state(workflow)
}

async fn health_check() -> impl IntoResponse {
    (StatusCode::OK, "OK")
}

/// Runs the workflow. Bus failures only show up in the logs; the response is
/// always 200 with whatever the report collected.
async fn process(State(workflow): State<Arc<QueueWorkflow>>) -> impl IntoResponse {
    let report = workflow.run().await;
    (StatusCode::OK, report.to_html())
}
