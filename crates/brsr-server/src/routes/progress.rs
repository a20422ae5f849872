use axum::extract::{Path, State};
use axum::Json;

use super::ScopePath;
use crate::auth::{Principal, ADMIN_ROLE};
use crate::error::AppError;
use crate::state::AppState;

/// GET /api/companies/{c}/plants/{p}/progress/{fy}: counters as a nested tree.
pub async fn get_progress(
    State(app): State<AppState>,
    principal: Principal,
    Path(path): Path<ScopePath>,
) -> Result<Json<serde_json::Value>, AppError> {
    let scope = path.authorize(&principal)?;
    let progress = app.service.get_progress(&scope).await?;
    Ok(Json(serde_json::json!({
        "scope": progress.scope,
        "updated_at": progress.updated_at,
        "progress": progress.tree(),
    })))
}

/// POST /api/companies/{c}/plants/{p}/progress/{fy}/repair: rebuild from
/// answers. Admin only.
pub async fn repair_progress(
    State(app): State<AppState>,
    principal: Principal,
    Path(path): Path<ScopePath>,
) -> Result<Json<serde_json::Value>, AppError> {
    let scope = path.authorize(&principal)?;
    principal.require_role(ADMIN_ROLE)?;
    let progress = app.service.repair_counters(&scope).await?;
    tracing::info!(%scope, user = %principal.actor.user_id, "progress repaired via api");
    Ok(Json(serde_json::json!({
        "scope": progress.scope,
        "updated_at": progress.updated_at,
        "progress": progress.tree(),
    })))
}
