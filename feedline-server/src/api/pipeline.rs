use axum::{extract::State, Json};
use feedline_types::{ApiResponse, PipelineReport, ResetSummary, SeedRequest, SeedSummary, TopologyReport};

use crate::{
    api::{ApiError, ApiResult},
    state::AppState,
};

fn acting_user(req: &SeedRequest) -> Result<&str, ApiError> {
    let user_id = req.user_id.trim();
    if user_id.is_empty() {
        return Err(ApiError::BadRequest("user_id is required".to_string()));
    }
    Ok(user_id)
}

fn seed_message(seed: &SeedSummary) -> String {
    if seed.is_degraded() {
        format!(
            "Created {} activities for {} sample users with {} skipped steps",
            seed.activity_ids.len(),
            seed.users_attempted,
            seed.failures.len()
        )
    } else {
        format!("Seeded {} activities", seed.activity_ids.len())
    }
}

fn report_response(report: PipelineReport) -> Json<ApiResponse<PipelineReport>> {
    let message = match &report.reset {
        Some(reset) => format!(
            "Deleted {} activities and {} follows. {}",
            reset.activities_deleted,
            reset.follows_deleted,
            seed_message(&report.seed)
        ),
        None => seed_message(&report.seed),
    };
    Json(ApiResponse {
        success: report.seed.success,
        message,
        data: Some(report),
    })
}

/// POST /feeds/setup - Create feed groups and views
pub async fn setup(State(state): State<AppState>) -> ApiResult<Json<ApiResponse<TopologyReport>>> {
    let report = state.pipeline.ensure_topology().await?;
    Ok(Json(ApiResponse::ok("Feed topology ready", report)))
}

/// POST /feeds/reset - Delete every activity and follow
pub async fn reset(State(state): State<AppState>) -> ApiResult<Json<ApiResponse<ResetSummary>>> {
    let _guard = state.run_lock.lock().await;
    let summary = state.pipeline.reset_feeds().await?;
    let message = format!(
        "Deleted {} activities and {} follows",
        summary.activities_deleted, summary.follows_deleted
    );
    Ok(Json(ApiResponse::ok(message, summary)))
}

/// POST /feeds/reset-and-seed - Clear feeds, then seed demo content
pub async fn reset_and_seed(
    State(state): State<AppState>,
    Json(req): Json<SeedRequest>,
) -> ApiResult<Json<ApiResponse<PipelineReport>>> {
    let user_id = acting_user(&req)?;
    let _guard = state.run_lock.lock().await;
    let report = state.pipeline.reset_and_seed(user_id).await?;
    Ok(report_response(report))
}

/// POST /feeds/seed - Seed demo content without clearing anything
pub async fn seed(
    State(state): State<AppState>,
    Json(req): Json<SeedRequest>,
) -> ApiResult<Json<ApiResponse<PipelineReport>>> {
    let user_id = acting_user(&req)?;
    let _guard = state.run_lock.lock().await;
    let report = state.pipeline.seed_only(user_id).await?;
    Ok(report_response(report))
}
