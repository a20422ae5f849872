use axum::extract::{Path, State};
use axum::Json;
use brsr_core::permissions::RolePermissionSet;
use serde::Deserialize;
use std::collections::BTreeMap;

use super::ScopePath;
use crate::auth::{Principal, ADMIN_ROLE};
use crate::error::AppError;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct RolePath {
    pub company_id: String,
    pub plant_id: String,
    pub financial_year: String,
    pub role: String,
}

impl RolePath {
    fn split(self) -> (ScopePath, String) {
        let scope = ScopePath {
            company_id: self.company_id,
            plant_id: self.plant_id,
            financial_year: self.financial_year,
        };
        (scope, self.role)
    }
}

/// GET /api/companies/{c}/plants/{p}/permissions/{fy}/{role}
pub async fn get_permissions(
    State(app): State<AppState>,
    principal: Principal,
    Path(path): Path<RolePath>,
) -> Result<Json<serde_json::Value>, AppError> {
    let (scope, role) = path.split();
    let scope = scope.authorize(&principal)?;
    let set = app.service.get_permissions(&scope, &role).await?;
    let accessible = set.accessible_questions(app.service.catalog());
    Ok(Json(serde_json::json!({
        "role": set.role,
        "grants": set.grants,
        "accessible_questions": accessible,
    })))
}

#[derive(Deserialize)]
pub struct PutPermissionsBody {
    pub grants: BTreeMap<String, bool>,
}

/// PUT /api/companies/{c}/plants/{p}/permissions/{fy}/{role}: replace grants.
/// Admin only.
pub async fn put_permissions(
    State(app): State<AppState>,
    principal: Principal,
    Path(path): Path<RolePath>,
    Json(body): Json<PutPermissionsBody>,
) -> Result<Json<serde_json::Value>, AppError> {
    let (scope, role) = path.split();
    let scope = scope.authorize(&principal)?;
    principal.require_role(ADMIN_ROLE)?;
    let set = RolePermissionSet {
        scope,
        role,
        grants: body.grants,
    };
    let accessible = set.accessible_questions(app.service.catalog());
    app.service.set_permissions(&principal.actor, set.clone()).await?;
    Ok(Json(serde_json::json!({
        "role": set.role,
        "grants": set.grants,
        "accessible_questions": accessible,
    })))
}
