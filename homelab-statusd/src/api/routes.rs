use std::path::Path;
use std::sync::Arc;
use axum::{extract::State, routing::get, Json, Router};
use tower_http::services::ServeDir;
use shared::protocol::STATUS_PATH;
use shared::types::StatusResponse;
use crate::config::Catalog;
use crate::discovery::resolver::AddressResolver;
use crate::matrix;
use crate::probe::Prober;

#[derive(Clone)]
pub struct AppState {
    pub catalog: Arc<Catalog>,
    pub resolver: Arc<dyn AddressResolver>,
    pub prober: Prober,
}

/// Status API plus the UI bundle for every other path
pub fn router(state: AppState, static_dir: impl AsRef<Path>) -> Router {
    Router::new()
        .route(STATUS_PATH, get(get_status))
        .fallback_service(ServeDir::new(static_dir))
        .with_state(state)
}

async fn get_status(State(state): State<AppState>) -> Json<StatusResponse> {
    let status = matrix::build_status(&state.catalog, state.resolver.as_ref(), &state.prober).await;

    tracing::debug!(
        "Status: tailscale={:?} lan={:?}, {} probes, {} still in flight",
        status.ips.tailscale,
        status.ips.lan,
        status.results.len(),
        state.prober.in_flight()
    );

    Json(status)
}
