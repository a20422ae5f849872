use axum::extract::{Path, State};
use axum::Json;
use brsr_core::resolver::{PathResolver, Resolution};

use crate::error::AppError;
use crate::state::AppState;

/// GET /api/catalog/questions/{question_id}: resolve a question id.
pub async fn get_question(
    State(app): State<AppState>,
    Path(question_id): Path<String>,
) -> Result<Json<serde_json::Value>, AppError> {
    let catalog = app.service.catalog();
    let resolution: Resolution = PathResolver::new(catalog).resolve(&question_id)?;
    let q = catalog.descriptor(&question_id)?;
    Ok(Json(serde_json::json!({
        "resolution": resolution,
        "question": q,
        "value_type": catalog.value_kind(q),
    })))
}
