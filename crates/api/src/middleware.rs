pub mod rate_limit;

use std::sync::Arc;

use axum::extract::{Request, State};
use axum::middleware::Next;
use axum::response::Response;

use crate::state::AppState;

/// Counts every request against `state.metrics`, the way the teacher's
/// middleware stack tracked request volume ahead of the handler itself.
pub async fn track_metrics(State(state): State<Arc<AppState>>, request: Request, next: Next) -> Response {
    let response = next.run(request).await;
    state.metrics.record_request(response.status().is_server_error() || response.status().is_client_error());
    response
}
