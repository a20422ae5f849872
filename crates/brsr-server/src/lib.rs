pub mod auth;
pub mod error;
pub mod routes;
pub mod state;

use axum::extract::State;
use axum::routing::{get, post};
use axum::{Json, Router};
use brsr_core::service::ReportService;
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

const SCOPE: &str = "/api/companies/{company_id}/plants/{plant_id}";

/// Build the axum Router with all API routes and middleware.
/// Used by `serve()` and available for integration testing.
pub fn build_router(service: Arc<ReportService>) -> Router {
    let app_state = state::AppState::new(service);

    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/api/health", get(health))
        // Directory
        .route("/api/companies", post(routes::directory::create_company))
        .route(
            "/api/companies/{company_id}/plants",
            post(routes::directory::create_plant),
        )
        .route(
            &format!("{SCOPE}/reports"),
            post(routes::directory::create_report),
        )
        // Reports
        .route(
            &format!("{SCOPE}/reports/{{financial_year}}"),
            get(routes::reports::get_report).patch(routes::reports::update_report),
        )
        .route(
            &format!("{SCOPE}/reports/{{financial_year}}/responses"),
            post(routes::reports::fetch_responses),
        )
        // Progress
        .route(
            &format!("{SCOPE}/progress/{{financial_year}}"),
            get(routes::progress::get_progress),
        )
        .route(
            &format!("{SCOPE}/progress/{{financial_year}}/repair"),
            post(routes::progress::repair_progress),
        )
        // Audit
        .route(
            &format!("{SCOPE}/audit/{{financial_year}}"),
            get(routes::audit::get_history).post(routes::audit::record_action),
        )
        // Permissions
        .route(
            &format!("{SCOPE}/permissions/{{financial_year}}/{{role}}"),
            get(routes::permissions::get_permissions).put(routes::permissions::put_permissions),
        )
        // Catalog
        .route(
            "/api/catalog/questions/{question_id}",
            get(routes::catalog::get_question),
        )
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(app_state)
}

/// GET /api/health
async fn health(State(app): State<state::AppState>) -> Json<serde_json::Value> {
    let catalog = app.service.catalog();
    Json(serde_json::json!({
        "status": "ok",
        "catalog_version": catalog.version(),
        "questions": catalog.len(),
    }))
}

/// Bind `addr` and serve until the process is stopped.
pub async fn serve(service: Arc<ReportService>, addr: &str) -> anyhow::Result<()> {
    let listener = tokio::net::TcpListener::bind(addr).await?;
    serve_on(service, listener).await
}

/// Serve on a pre-bound listener.
///
/// Lets the caller read the actual port first (useful when binding port 0).
pub async fn serve_on(
    service: Arc<ReportService>,
    listener: tokio::net::TcpListener,
) -> anyhow::Result<()> {
    let addr = listener.local_addr()?;
    let app = build_router(service);

    tracing::info!("BRSR report server listening on http://{addr}");

    axum::serve(listener, app).await?;
    Ok(())
}
