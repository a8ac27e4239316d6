//! Lifecycle endpoint handlers.
//!
//! Each handler is a thin adapter: build the request for the controller,
//! call it, serialize the outcome. Busy/conflict rejections surface as
//! HTTP 409 via [`ApiError`](crate::error::ApiError).

use crate::AppState;
use crate::error::Result;
use axum::Json;
use axum::extract::State;
use serde::{Deserialize, Serialize};
use shiftbox_core::machine::{
    ClusterState, ClusterStatusResult, ConsoleResult, Preset, StartConfig, StartResult,
};
use std::path::PathBuf;
use tokio_util::sync::CancellationToken;

/// Optional overrides accepted by `/start`.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct StartRequest {
    /// Bundle disk image path.
    pub bundle_path: Option<PathBuf>,
    /// Memory size in MiB.
    pub memory_mib: Option<u64>,
    /// Number of vCPUs.
    pub cpus: Option<u32>,
    /// Disk size in GiB.
    pub disk_size_gib: Option<u64>,
    /// Cluster preset.
    pub preset: Option<Preset>,
    /// kubeadmin password override.
    pub kubeadmin_password: Option<String>,
}

/// Response of `/stop`.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StopResponse {
    /// VM state after the stop.
    pub state: ClusterState,
}

/// Response of `/delete` and `/poweroff`.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CommandResponse {
    /// Whether the operation succeeded.
    pub success: bool,
}

/// Response of `/version`.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct VersionResponse {
    /// Daemon version.
    pub version: String,
    /// Preset the configured machine runs.
    pub preset: Preset,
}

/// Starts the cluster. Body fields override the configured defaults.
pub async fn start(
    State(state): State<AppState>,
    body: Option<Json<StartRequest>>,
) -> Result<Json<StartResult>> {
    let overrides = body.map(|Json(req)| req).unwrap_or_default();
    let defaults = &state.config.machine;

    let config = StartConfig {
        bundle_path: overrides.bundle_path.or_else(|| defaults.bundle_path.clone()),
        memory_mib: overrides.memory_mib.unwrap_or(defaults.memory_mib),
        cpus: overrides.cpus.unwrap_or(defaults.cpus),
        disk_size_gib: overrides.disk_size_gib.unwrap_or(defaults.disk_size_gib),
        nameserver: defaults.nameserver.clone(),
        kubeadmin_password: overrides.kubeadmin_password,
        preset: overrides.preset.unwrap_or(defaults.preset),
    };

    let result = state
        .machine
        .start(CancellationToken::new(), config)
        .await?;
    Ok(Json(result))
}

/// Gracefully stops the cluster.
pub async fn stop(State(state): State<AppState>) -> Result<Json<StopResponse>> {
    let vm_state = state.machine.stop().await?;
    Ok(Json(StopResponse { state: vm_state }))
}

/// Deletes the cluster VM.
pub async fn delete(State(state): State<AppState>) -> Result<Json<CommandResponse>> {
    state.machine.delete().await?;
    Ok(Json(CommandResponse { success: true }))
}

/// Hard-stops the cluster VM.
pub async fn power_off(State(state): State<AppState>) -> Result<Json<CommandResponse>> {
    state.machine.power_off().await?;
    Ok(Json(CommandResponse { success: true }))
}

/// Returns the cluster status snapshot.
pub async fn status(State(state): State<AppState>) -> Result<Json<ClusterStatusResult>> {
    let status = state.machine.status().await?;
    Ok(Json(status))
}

/// Returns the web console location and login details.
pub async fn web_console_url(State(state): State<AppState>) -> Result<Json<ConsoleResult>> {
    let console = state.machine.console_url().await?;
    Ok(Json(console))
}

/// Returns daemon version information.
pub async fn version(State(state): State<AppState>) -> Json<VersionResponse> {
    Json(VersionResponse {
        version: env!("CARGO_PKG_VERSION").to_string(),
        preset: state.machine.preset(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::create_router;
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use http_body_util::BodyExt;
    use shiftbox_core::machine::fake::FakeMachine;
    use shiftbox_core::{Config, EventBus, Synchronized};
    use std::sync::Arc;
    use tower::ServiceExt;

    fn app_state(machine: Arc<FakeMachine>) -> AppState {
        let status_events: shiftbox_core::StatusChannel = Arc::new(EventBus::new());
        AppState {
            machine: Arc::new(Synchronized::new(machine, status_events.clone())),
            status_events,
            config: Arc::new(Config::default()),
        }
    }

    async fn body_json(body: Body) -> serde_json::Value {
        let bytes = body.collect().await.unwrap().to_bytes();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn test_status_endpoint_reports_running() {
        let router = create_router(app_state(Arc::new(FakeMachine::new())));
        let response = router
            .oneshot(Request::builder().uri("/status").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let json = body_json(response.into_body()).await;
        assert_eq!(json["clusterStatus"], "running");
        assert_eq!(json["openshiftVersion"], "4.17.3");
    }

    #[tokio::test]
    async fn test_start_endpoint_returns_cluster_config() {
        let router = create_router(app_state(Arc::new(FakeMachine::new())));
        let response = router
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/start")
                    .header("content-type", "application/json")
                    .body(Body::from(r#"{"cpus": 6}"#))
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let json = body_json(response.into_body()).await;
        assert_eq!(json["status"], "running");
        assert_eq!(json["kubeletStarted"], true);
    }

    #[tokio::test]
    async fn test_failing_driver_maps_to_500_with_message() {
        let router = create_router(app_state(Arc::new(FakeMachine::failing())));
        let response = router
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/stop")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        let json = body_json(response.into_body()).await;
        assert_eq!(json["message"], "machine error: stop failed");
    }

    #[tokio::test]
    async fn test_version_endpoint() {
        let router = create_router(app_state(Arc::new(FakeMachine::new())));
        let response = router
            .oneshot(
                Request::builder()
                    .uri("/version")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let json = body_json(response.into_body()).await;
        assert_eq!(json["version"], env!("CARGO_PKG_VERSION"));
        assert_eq!(json["preset"], "openshift");
    }
}
