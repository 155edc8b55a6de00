//! REST API server for the progression engine
//!
//! Loads the user's aggregate from the store, runs the engine, and writes
//! the result back with an optimistic revision check. Requests carrying a
//! `request_id` are processed at most once.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::{info, warn};
use uuid::Uuid;

use crate::audit::{ActionLedger, Reservation};
use crate::error::GamificationError;
use crate::models::UserStats;
use crate::service::{GamificationService, GamificationUpdate, LeaderboardRow};
use crate::store::ProgressStore;
use crate::Result;

const LEADERBOARD_SIZE: usize = 10;

/// =============================
/// Request Models
/// =============================

#[derive(Debug, Serialize, Deserialize, Clone, Default)]
pub struct CompletionRequest {
    #[serde(default)]
    pub perfect_score: bool,
    #[serde(default)]
    pub first_try: bool,
    pub request_id: Option<String>,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct ActivityRequest {
    pub activity_type: String,
    pub custom_multiplier: Option<f64>,
    pub request_id: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ProcessResponse {
    /// True when the update was replayed from the ledger
    pub replayed: bool,
    #[serde(flatten)]
    pub update: GamificationUpdate,
}

/// =============================
/// Response Wrapper
/// =============================

#[derive(Debug, Serialize, Deserialize)]
pub struct ApiResponse {
    pub success: bool,
    pub data: Option<serde_json::Value>,
    pub error: Option<String>,
    pub timestamp: String,
}

impl ApiResponse {
    pub fn success<T: Serialize>(data: T) -> Self {
        Self {
            success: true,
            data: serde_json::to_value(data).ok(),
            error: None,
            timestamp: chrono::Utc::now().to_rfc3339(),
        }
    }

    pub fn error(message: String) -> Self {
        Self {
            success: false,
            data: None,
            error: Some(message),
            timestamp: chrono::Utc::now().to_rfc3339(),
        }
    }
}

fn status_for(err: &GamificationError) -> StatusCode {
    match err {
        GamificationError::InvalidInput(_) => StatusCode::BAD_REQUEST,
        GamificationError::Conflict(_)
        | GamificationError::StalePatch { .. }
        | GamificationError::UserMismatch { .. } => StatusCode::CONFLICT,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

fn respond<T: Serialize>(result: Result<T>) -> (StatusCode, Json<ApiResponse>) {
    match result {
        Ok(data) => (StatusCode::OK, Json(ApiResponse::success(data))),
        Err(e) => (status_for(&e), Json(ApiResponse::error(e.to_string()))),
    }
}

/// =============================
/// API State
/// =============================

#[derive(Clone)]
pub struct ApiState {
    pub service: Arc<GamificationService>,
    pub store: Arc<dyn ProgressStore>,
    pub ledger: Arc<ActionLedger>,
    pub max_write_attempts: u32,
}

impl ApiState {
    async fn load(&self, user_id: Uuid) -> Result<UserStats> {
        self.store
            .load_or_create(user_id, self.service.catalog().first_level())
            .await
    }

    /// Load, evaluate, apply, save; reload and retry on a write conflict
    async fn apply_with_retry<F>(&self, user_id: Uuid, evaluate: F) -> Result<GamificationUpdate>
    where
        F: Fn(&GamificationService, &UserStats) -> Result<GamificationUpdate> + Send,
    {
        let mut attempt = 0;

        loop {
            attempt += 1;

            let mut stats = self.load(user_id).await?;
            let expected_revision = stats.revision;
            let update = evaluate(&self.service, &stats)?;
            if update.is_noop() {
                return Ok(update);
            }

            update.patch.apply(&mut stats)?;
            match self.store.save(stats, expected_revision).await {
                Ok(()) => return Ok(update),
                Err(GamificationError::Conflict(reason)) if attempt < self.max_write_attempts => {
                    warn!(user_id = ?user_id, attempt, %reason, "Write conflict, retrying");
                }
                Err(e) => return Err(e),
            }
        }
    }

    /// Run `evaluate` at most once per `request_id`
    async fn process_once<F>(
        &self,
        user_id: Uuid,
        request_id: Option<&str>,
        evaluate: F,
    ) -> Result<ProcessResponse>
    where
        F: Fn(&GamificationService, &UserStats) -> Result<GamificationUpdate> + Send,
    {
        let Some(request_id) = request_id.filter(|id| !id.trim().is_empty()) else {
            let update = self.apply_with_retry(user_id, evaluate).await?;
            return Ok(ProcessResponse {
                replayed: false,
                update,
            });
        };

        match self.ledger.reserve(user_id, request_id).await? {
            Reservation::Completed(action) => {
                info!(user_id = ?user_id, request_id, "Replaying processed request");
                Ok(ProcessResponse {
                    replayed: true,
                    update: action.update,
                })
            }
            Reservation::InFlight => Err(GamificationError::Conflict(format!(
                "request {} is already being processed",
                request_id
            ))),
            Reservation::Reserved => match self.apply_with_retry(user_id, evaluate).await {
                Ok(update) => {
                    self.ledger
                        .complete(user_id, request_id, update.clone())
                        .await?;
                    Ok(ProcessResponse {
                        replayed: false,
                        update,
                    })
                }
                Err(e) => {
                    self.ledger.release(user_id, request_id).await?;
                    Err(e)
                }
            },
        }
    }
}

/// =============================
/// Helpers — User Id Parsing
/// =============================

fn stable_uuid_from_string(input: &str) -> Uuid {
    use sha2::{Digest, Sha256};

    let hash = Sha256::digest(input.as_bytes());
    let mut bytes = [0u8; 16];
    bytes.copy_from_slice(&hash[..16]);

    // Set UUID version (4) and variant (RFC4122) bits.
    bytes[6] = (bytes[6] & 0x0f) | 0x40;
    bytes[8] = (bytes[8] & 0x3f) | 0x80;

    Uuid::from_bytes(bytes)
}

/// Path user ids may be UUIDs or opaque handles
pub fn parse_user_id(value: &str) -> Uuid {
    let value = value.trim();
    if value.is_empty() {
        return stable_uuid_from_string("anonymous-user");
    }
    Uuid::parse_str(value).unwrap_or_else(|_| stable_uuid_from_string(value))
}

/// =============================
/// Health & Catalog Endpoints
/// =============================

async fn health() -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "status": "healthy",
        "timestamp": chrono::Utc::now().to_rfc3339()
    }))
}

async fn list_levels(State(state): State<ApiState>) -> (StatusCode, Json<ApiResponse>) {
    respond(Ok(state.service.get_all_levels()))
}

async fn list_badges(State(state): State<ApiState>) -> (StatusCode, Json<ApiResponse>) {
    respond(Ok(state.service.get_all_badges()))
}

async fn list_simulations(State(state): State<ApiState>) -> (StatusCode, Json<ApiResponse>) {
    respond(Ok(state.service.get_all_simulations()))
}

/// =============================
/// Read Model Endpoints
/// =============================

async fn user_dashboard(
    State(state): State<ApiState>,
    Path(user_id): Path<String>,
) -> (StatusCode, Json<ApiResponse>) {
    let user_id = parse_user_id(&user_id);
    let result = state
        .load(user_id)
        .await
        .map(|stats| state.service.get_user_dashboard(&stats));
    respond(result)
}

async fn user_leaderboard_row(
    State(state): State<ApiState>,
    Path(user_id): Path<String>,
) -> (StatusCode, Json<ApiResponse>) {
    let user_id = parse_user_id(&user_id);
    let result = state
        .load(user_id)
        .await
        .map(|stats| state.service.get_leaderboard_stats(&stats));
    respond(result)
}

async fn leaderboard(State(state): State<ApiState>) -> (StatusCode, Json<ApiResponse>) {
    let result = state.store.list().await.map(|users| {
        let mut rows: Vec<LeaderboardRow> = users
            .iter()
            .map(|stats| state.service.get_leaderboard_stats(stats))
            .collect();
        rows.sort_by(|a, b| b.total_xp.cmp(&a.total_xp));
        rows.truncate(LEADERBOARD_SIZE);
        rows
    });
    respond(result)
}

/// =============================
/// Action Endpoints
/// =============================

async fn complete_simulation(
    State(state): State<ApiState>,
    Path((user_id, simulation_id)): Path<(String, String)>,
    Json(req): Json<CompletionRequest>,
) -> (StatusCode, Json<ApiResponse>) {
    let user_id = parse_user_id(&user_id);
    info!(
        user_id = ?user_id,
        simulation_id = %simulation_id,
        perfect_score = req.perfect_score,
        first_try = req.first_try,
        "Simulation completion request"
    );

    let result = state
        .process_once(user_id, req.request_id.as_deref(), |service, stats| {
            service.evaluate_simulation_completion(
                stats,
                &simulation_id,
                req.perfect_score,
                req.first_try,
            )
        })
        .await;
    respond(result)
}

async fn record_activity(
    State(state): State<ApiState>,
    Path(user_id): Path<String>,
    Json(req): Json<ActivityRequest>,
) -> (StatusCode, Json<ApiResponse>) {
    let user_id = parse_user_id(&user_id);
    let multiplier = req.custom_multiplier.unwrap_or(1.0);
    info!(
        user_id = ?user_id,
        activity_type = %req.activity_type,
        multiplier,
        "Activity request"
    );

    let result = state
        .process_once(user_id, req.request_id.as_deref(), |service, stats| {
            service.evaluate_activity(stats, &req.activity_type, multiplier)
        })
        .await;
    respond(result)
}

/// =============================
/// Router
/// =============================

pub fn create_router(state: ApiState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/api/levels", get(list_levels))
        .route("/api/badges", get(list_badges))
        .route("/api/simulations", get(list_simulations))
        .route("/api/leaderboard", get(leaderboard))
        .route("/api/users/:user_id/dashboard", get(user_dashboard))
        .route("/api/users/:user_id/leaderboard", get(user_leaderboard_row))
        .route(
            "/api/users/:user_id/simulations/:simulation_id/complete",
            post(complete_simulation),
        )
        .route("/api/users/:user_id/activities", post(record_activity))
        .with_state(state)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
}

/// =============================
/// Server Startup
/// =============================

pub async fn start_server(
    state: ApiState,
    port: u16,
) -> std::result::Result<(), Box<dyn std::error::Error>> {
    let router = create_router(state);

    let listener = tokio::net::TcpListener::bind(format!("0.0.0.0:{}", port)).await?;

    info!("API Server listening on http://0.0.0.0:{}", port);
    info!("Local: http://127.0.0.1:{}", port);

    axum::serve(listener, router).await?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::Catalog;
    use crate::service::FixedClock;
    use crate::store::InMemoryProgressStore;
    use axum::body::{to_bytes, Body};
    use axum::http::Request;
    use chrono::{FixedOffset, TimeZone};
    use serde_json::{json, Value};
    use tower::ServiceExt;

    fn test_state() -> ApiState {
        let now = FixedOffset::east_opt(0)
            .unwrap()
            .with_ymd_and_hms(2024, 9, 3, 14, 0, 0)
            .unwrap();
        ApiState {
            service: Arc::new(GamificationService::with_clock(
                Arc::new(Catalog::builtin()),
                Arc::new(FixedClock(now)),
            )),
            store: Arc::new(InMemoryProgressStore::new()),
            ledger: Arc::new(ActionLedger::new()),
            max_write_attempts: 3,
        }
    }

    async fn call(router: Router, method: &str, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
        let request = Request::builder()
            .method(method)
            .uri(uri)
            .header("content-type", "application/json");
        let request = match body {
            Some(body) => request.body(Body::from(body.to_string())).unwrap(),
            None => request.body(Body::empty()).unwrap(),
        };

        let response = router.oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        (status, serde_json::from_slice(&bytes).unwrap())
    }

    #[tokio::test]
    async fn test_health_and_catalog() {
        let router = create_router(test_state());

        let (status, body) = call(router.clone(), "GET", "/health", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "healthy");

        let (_, body) = call(router.clone(), "GET", "/api/levels", None).await;
        assert_eq!(body["data"].as_array().unwrap().len(), 6);

        let (_, body) = call(router.clone(), "GET", "/api/badges", None).await;
        assert_eq!(body["data"].as_array().unwrap().len(), 16);

        let (_, body) = call(router, "GET", "/api/simulations", None).await;
        assert_eq!(body["data"][0]["id"], "coffee_shop_effect");
    }

    #[tokio::test]
    async fn test_completion_persists_and_dashboard_reflects_it() {
        let state = test_state();
        let router = create_router(state.clone());

        let (status, body) = call(
            router.clone(),
            "POST",
            "/api/users/alice/simulations/coffee_shop_effect/complete",
            Some(json!({})),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["success"], true);
        assert_eq!(body["data"]["replayed"], false);
        assert_eq!(body["data"]["xp_earned"]["total_xp"], 100);
        assert_eq!(body["data"]["badges_earned"].as_array().unwrap().len(), 2);

        let stored = state.store.load(parse_user_id("alice")).await.unwrap().unwrap();
        assert_eq!(stored.total_xp, 100);
        assert_eq!(stored.revision, 1);

        let (_, body) = call(router.clone(), "GET", "/api/users/alice/dashboard", None).await;
        assert_eq!(body["data"]["progress"]["current_xp"], 100);
        assert_eq!(body["data"]["stats"]["badges_earned"], 2);

        let (_, body) = call(router, "GET", "/api/users/alice/leaderboard", None).await;
        assert_eq!(body["data"]["level_name"], "Financial Newbie");
    }

    #[tokio::test]
    async fn test_request_id_replays_instead_of_double_awarding() {
        let state = test_state();
        let router = create_router(state.clone());
        let payload = json!({ "activity_type": "daily_login", "request_id": "login-1" });

        let (_, first) = call(router.clone(), "POST", "/api/users/bob/activities", Some(payload.clone())).await;
        let (_, second) = call(router, "POST", "/api/users/bob/activities", Some(payload)).await;

        assert_eq!(first["data"]["replayed"], false);
        assert_eq!(second["data"]["replayed"], true);
        assert_eq!(first["data"]["patch"], second["data"]["patch"]);

        let stored = state.store.load(parse_user_id("bob")).await.unwrap().unwrap();
        assert_eq!(stored.total_xp, 10);
        assert_eq!(stored.revision, 1);
    }

    #[tokio::test]
    async fn test_invalid_multiplier_is_bad_request() {
        let router = create_router(test_state());
        let (status, body) = call(
            router,
            "POST",
            "/api/users/carol/activities",
            Some(json!({ "activity_type": "daily_login", "custom_multiplier": -2.0 })),
        )
        .await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["success"], false);
    }

    #[tokio::test]
    async fn test_unknown_simulation_does_not_persist() {
        let state = test_state();
        let router = create_router(state.clone());

        let (status, body) = call(
            router,
            "POST",
            "/api/users/dave/simulations/nope/complete",
            Some(json!({})),
        )
        .await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["data"]["message"], "Simulation not found: nope");
        assert!(state.store.load(parse_user_id("dave")).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_leaderboard_orders_by_xp() {
        let state = test_state();
        let router = create_router(state.clone());

        call(router.clone(), "POST", "/api/users/erin/simulations/paycheck_game/complete", Some(json!({}))).await;
        call(router.clone(), "POST", "/api/users/frank/simulations/coffee_shop_effect/complete", Some(json!({}))).await;

        let (_, body) = call(router, "GET", "/api/leaderboard", None).await;
        let rows = body["data"].as_array().unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0]["total_xp"], 200);
        assert_eq!(rows[1]["total_xp"], 100);
    }

    #[test]
    fn test_parse_user_id() {
        let id = Uuid::new_v4();
        assert_eq!(parse_user_id(&id.to_string()), id);
        assert_eq!(parse_user_id("alice"), parse_user_id("alice"));
        assert_ne!(parse_user_id("alice"), parse_user_id("bob"));
    }
}
