use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;
use brsr_core::directory::{Company, Plant};
use brsr_core::scope::Scope;
use serde::Deserialize;

use crate::auth::Principal;
use crate::error::AppError;
use crate::state::AppState;

#[derive(Deserialize)]
pub struct CreateCompanyBody {
    pub id: String,
    pub name: String,
}

/// POST /api/companies: register a company.
pub async fn create_company(
    State(app): State<AppState>,
    principal: Principal,
    Json(body): Json<CreateCompanyBody>,
) -> Result<(StatusCode, Json<Company>), AppError> {
    principal.ensure_company(&body.id)?;
    let company = Company::new(body.id, body.name);
    app.service.register_company(company.clone()).await?;
    Ok((StatusCode::CREATED, Json(company)))
}

#[derive(Deserialize)]
pub struct CreatePlantBody {
    pub id: String,
    pub name: String,
    pub location: Option<String>,
}

/// POST /api/companies/{company_id}/plants: register a plant.
pub async fn create_plant(
    State(app): State<AppState>,
    principal: Principal,
    Path(company_id): Path<String>,
    Json(body): Json<CreatePlantBody>,
) -> Result<(StatusCode, Json<Plant>), AppError> {
    principal.ensure_company(&company_id)?;
    let mut plant = Plant::new(company_id, body.id, body.name);
    plant.location = body.location;
    app.service.register_plant(plant.clone()).await?;
    Ok((StatusCode::CREATED, Json(plant)))
}

#[derive(Deserialize)]
pub struct CreateReportBody {
    pub financial_year: String,
}

/// POST /api/companies/{company_id}/plants/{plant_id}/reports: open a report.
pub async fn create_report(
    State(app): State<AppState>,
    principal: Principal,
    Path((company_id, plant_id)): Path<(String, String)>,
    Json(body): Json<CreateReportBody>,
) -> Result<(StatusCode, Json<serde_json::Value>), AppError> {
    principal.ensure_company(&company_id)?;
    let scope = Scope::new(company_id, plant_id, &body.financial_year)?;
    let doc = app.service.create_report(&scope, &principal.actor).await?;
    Ok((
        StatusCode::CREATED,
        Json(serde_json::json!({
            "id": doc.id,
            "scope": doc.scope,
            "revision": doc.revision,
            "created_at": doc.created_at,
            "created_by": doc.created_by,
        })),
    ))
}
