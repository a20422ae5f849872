use axum::extract::{Path, State};
use axum::Json;
use brsr_core::mutator::{BatchOutcome, UpdateRequest};
use brsr_core::service::ReportView;
use serde::Deserialize;

use super::ScopePath;
use crate::auth::Principal;
use crate::error::AppError;
use crate::state::AppState;

/// GET /api/companies/{c}/plants/{p}/reports/{fy}: answers visible to the caller.
pub async fn get_report(
    State(app): State<AppState>,
    principal: Principal,
    Path(path): Path<ScopePath>,
) -> Result<Json<ReportView>, AppError> {
    let scope = path.authorize(&principal)?;
    Ok(Json(app.service.get_report(&scope, &principal.actor).await?))
}

/// PATCH /api/companies/{c}/plants/{p}/reports/{fy}: apply an update batch.
pub async fn update_report(
    State(app): State<AppState>,
    principal: Principal,
    Path(path): Path<ScopePath>,
    Json(updates): Json<Vec<UpdateRequest>>,
) -> Result<Json<serde_json::Value>, AppError> {
    let scope = path.authorize(&principal)?;
    if updates.is_empty() {
        return Err(AppError::bad_request("update batch is empty"));
    }
    let outcome = app
        .service
        .update_report(&scope, &principal.actor, updates)
        .await?;
    Ok(Json(batch_response(&outcome)))
}

pub fn batch_response(outcome: &BatchOutcome) -> serde_json::Value {
    let status = if outcome.is_degraded() {
        "degraded"
    } else if outcome.unchanged {
        "unchanged"
    } else {
        "updated"
    };
    let warnings: Vec<serde_json::Value> = outcome
        .warnings
        .iter()
        .map(|w| serde_json::json!({ "kind": w.kind(), "error": w.to_string() }))
        .collect();
    serde_json::json!({
        "status": status,
        "revision": outcome.revision,
        "changes": outcome.changes,
        "warnings": warnings,
    })
}

#[derive(Deserialize)]
pub struct ResponsesBody {
    pub question_ids: Vec<String>,
}

/// POST /api/companies/{c}/plants/{p}/reports/{fy}/responses: stored values by id.
pub async fn fetch_responses(
    State(app): State<AppState>,
    principal: Principal,
    Path(path): Path<ScopePath>,
    Json(body): Json<ResponsesBody>,
) -> Result<Json<serde_json::Value>, AppError> {
    let scope = path.authorize(&principal)?;
    let responses = app
        .service
        .fetch_responses(&scope, &principal.actor, &body.question_ids)
        .await?;
    Ok(Json(serde_json::json!({ "responses": responses })))
}
