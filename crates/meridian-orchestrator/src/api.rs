//! REST control surface

use std::sync::Arc;

use axum::{
    extract::State,
    http::{header, Method, StatusCode},
    response::{IntoResponse, Json, Response},
    routing::{get, post},
    Router,
};
use meridian_common::{CycleSnapshot, HealthReport, MeridianError, VERSION};
use tokio::sync::Mutex;
use tower_http::cors::{Any, CorsLayer};
use tracing::{info, warn};

use crate::engine::{Orchestrator, OrchestratorHandle};

#[derive(Clone)]
pub struct ApiState {
    pub orchestrator: Arc<Mutex<Orchestrator>>,
    pub handle: OrchestratorHandle,
}

impl ApiState {
    pub fn new(orchestrator: Arc<Mutex<Orchestrator>>, handle: OrchestratorHandle) -> Self {
        Self { orchestrator, handle }
    }
}

/// Error body returned by the control surface
pub struct ApiError(MeridianError);

impl From<MeridianError> for ApiError {
    fn from(err: MeridianError) -> Self {
        Self(err)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match &self.0 {
            MeridianError::Halted(_) => StatusCode::SERVICE_UNAVAILABLE,
            MeridianError::Invariant(_) => StatusCode::CONFLICT,
            MeridianError::Config(_) => StatusCode::BAD_REQUEST,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };
        (status, Json(serde_json::json!({ "error": self.0.to_string() }))).into_response()
    }
}

/// Build the router with permissive CORS for dashboards
pub fn create_router(state: ApiState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([header::CONTENT_TYPE, header::ACCEPT]);

    Router::new()
        .route("/health", get(health))
        .route("/cycles", post(run_cycle))
        .route("/emergency-stop", post(raise_emergency_stop))
        .route("/emergency-stop/ack", post(acknowledge_emergency_stop))
        .route("/halt/clear", post(clear_halt))
        .route("/telemetry", get(telemetry))
        .route("/evolution", get(evolution))
        .route("/metrics", get(metrics))
        .route("/api/v1/version", get(version))
        .layer(cors)
        .with_state(state)
}

async fn health(State(state): State<ApiState>) -> Json<HealthReport> {
    Json(state.handle.board.read().health.clone())
}

async fn run_cycle(State(state): State<ApiState>) -> Result<Json<CycleSnapshot>, ApiError> {
    let mut orchestrator = state.orchestrator.lock().await;
    let snapshot = orchestrator.run_cycle().await?;
    Ok(Json(snapshot))
}

async fn raise_emergency_stop(State(state): State<ApiState>) -> impl IntoResponse {
    warn!("Emergency stop requested by operator");
    state.handle.emergency.raise();
    (
        StatusCode::ACCEPTED,
        Json(serde_json::json!({ "pending": true })),
    )
}

async fn acknowledge_emergency_stop(State(state): State<ApiState>) -> Json<serde_json::Value> {
    let mut orchestrator = state.orchestrator.lock().await;
    let cleared = orchestrator.acknowledge_emergency_stop();
    info!(cleared, "Emergency stop acknowledgment received");
    Json(serde_json::json!({
        "cleared": cleared,
        "risk_mode": orchestrator.gate().mode(),
    }))
}

async fn clear_halt(State(state): State<ApiState>) -> Result<Json<HealthReport>, ApiError> {
    let mut orchestrator = state.orchestrator.lock().await;
    orchestrator.clear_halt()?;
    Ok(Json(orchestrator.get_health()))
}

async fn telemetry(State(state): State<ApiState>) -> Json<serde_json::Value> {
    let board = state.handle.board.read();
    Json(serde_json::json!({
        "records": board.history,
        "stop_reason": board.stop_reason,
        "risk_score": board.risk_score,
    }))
}

async fn evolution(State(state): State<ApiState>) -> Result<Json<serde_json::Value>, ApiError> {
    let orchestrator = state.orchestrator.lock().await;
    Ok(Json(orchestrator.evolution_export()?))
}

async fn metrics(State(state): State<ApiState>) -> impl IntoResponse {
    (
        [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
        state.handle.metrics.render(),
    )
}

async fn version() -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "name": "meridian",
        "version": VERSION,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::MeridianConfig;
    use meridian_common::RiskMode;

    fn state() -> ApiState {
        let mut config = MeridianConfig::default();
        config.agents.latency_ms = 0;
        let orchestrator = Orchestrator::from_config(config).unwrap();
        let handle = orchestrator.handle();
        ApiState::new(Arc::new(Mutex::new(orchestrator)), handle)
    }

    #[tokio::test]
    async fn test_cycle_then_health() {
        let state = state();
        let Json(snapshot) = run_cycle(State(state.clone())).await.ok().unwrap();
        assert_eq!(snapshot.cycle_id, 0);

        let Json(health) = health(State(state)).await;
        assert_eq!(health.cycles_run, 1);
    }

    #[tokio::test]
    async fn test_stop_then_ack() {
        let state = state();
        raise_emergency_stop(State(state.clone())).await;
        let Json(snapshot) = run_cycle(State(state.clone())).await.ok().unwrap();
        assert_eq!(snapshot.risk_mode, RiskMode::EmergencyStopped);

        let Json(body) = acknowledge_emergency_stop(State(state.clone())).await;
        assert_eq!(body["cleared"], true);
        assert_eq!(body["risk_mode"], "normal");
    }

    #[tokio::test]
    async fn test_halted_maps_to_service_unavailable() {
        let response = ApiError(MeridianError::Halted("allocation".into())).into_response();
        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
    }
}
