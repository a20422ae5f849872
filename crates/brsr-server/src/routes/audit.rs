use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;
use brsr_core::audit::{ActionKind, AuditLog};
use serde::Deserialize;

use super::ScopePath;
use crate::auth::Principal;
use crate::error::AppError;
use crate::state::AppState;

/// GET /api/companies/{c}/plants/{p}/audit/{fy}: full audit history.
pub async fn get_history(
    State(app): State<AppState>,
    principal: Principal,
    Path(path): Path<ScopePath>,
) -> Result<Json<AuditLog>, AppError> {
    let scope = path.authorize(&principal)?;
    Ok(Json(app.service.audit_history(&scope).await?))
}

#[derive(Deserialize)]
pub struct RecordActionBody {
    pub kind: ActionKind,
    pub target: Option<String>,
    #[serde(default)]
    pub detail: serde_json::Value,
}

/// POST /api/companies/{c}/plants/{p}/audit/{fy}: record an external action.
pub async fn record_action(
    State(app): State<AppState>,
    principal: Principal,
    Path(path): Path<ScopePath>,
    Json(body): Json<RecordActionBody>,
) -> Result<StatusCode, AppError> {
    let scope = path.authorize(&principal)?;
    app.service
        .record_action(&scope, &principal.actor, body.kind, body.target, body.detail)
        .await?;
    Ok(StatusCode::CREATED)
}
