use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use brsr_core::error::BrsrError;

// ---------------------------------------------------------------------------
// Internal sentinel for request-level failures
// ---------------------------------------------------------------------------

/// Carries an explicit status through the `anyhow::Error` chain for failures
/// that happen before the core is reached (missing identity, bad body).
#[derive(Debug)]
struct RequestError {
    status: StatusCode,
    kind: &'static str,
    message: String,
}

impl std::fmt::Display for RequestError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for RequestError {}

// ---------------------------------------------------------------------------
// AppError
// ---------------------------------------------------------------------------

/// Unified error type for HTTP responses.
#[derive(Debug)]
pub struct AppError(pub anyhow::Error);

impl AppError {
    pub fn unauthorized(msg: impl Into<String>) -> Self {
        Self::request(StatusCode::UNAUTHORIZED, "unauthorized", msg)
    }

    pub fn forbidden(msg: impl Into<String>) -> Self {
        Self::request(StatusCode::FORBIDDEN, "forbidden", msg)
    }

    pub fn bad_request(msg: impl Into<String>) -> Self {
        Self::request(StatusCode::BAD_REQUEST, "bad_request", msg)
    }

    fn request(status: StatusCode, kind: &'static str, msg: impl Into<String>) -> Self {
        Self(
            RequestError {
                status,
                kind,
                message: msg.into(),
            }
            .into(),
        )
    }
}

/// HTTP status for a core error.
pub fn status_for(err: &BrsrError) -> StatusCode {
    match err {
        BrsrError::UnknownQuestion(_)
        | BrsrError::MalformedCompositeValue { .. }
        | BrsrError::UnknownSubcomponent { .. }
        | BrsrError::TypeMismatch { .. }
        | BrsrError::InvalidScope(_) => StatusCode::BAD_REQUEST,
        BrsrError::Forbidden { .. } | BrsrError::NoAccessibleQuestions(_) => {
            StatusCode::FORBIDDEN
        }
        BrsrError::ScopeNotFound(_) | BrsrError::AuditLogNotFound(_) => StatusCode::NOT_FOUND,
        BrsrError::AlreadyExists(_) | BrsrError::RevisionConflict { .. } => StatusCode::CONFLICT,
        BrsrError::CounterUpdateFailed { .. }
        | BrsrError::AuditAppendFailed { .. }
        | BrsrError::InvalidCatalog(_)
        | BrsrError::Store(_)
        | BrsrError::Io(_)
        | BrsrError::Yaml(_)
        | BrsrError::Json(_) => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        if let Some(r) = self.0.downcast_ref::<RequestError>() {
            let body = serde_json::json!({ "error": r.message, "kind": r.kind });
            return (r.status, axum::Json(body)).into_response();
        }

        let Some(e) = self.0.downcast_ref::<BrsrError>() else {
            tracing::error!("request failed: {:#}", self.0);
            let body = serde_json::json!({ "error": self.0.to_string(), "kind": "internal" });
            return (StatusCode::INTERNAL_SERVER_ERROR, axum::Json(body)).into_response();
        };

        let status = status_for(e);
        if status.is_server_error() {
            tracing::error!(kind = e.kind(), "request failed: {e}");
        }
        let mut body = serde_json::json!({ "error": e.to_string(), "kind": e.kind() });
        if let Some(id) = e.question_id() {
            body["question_id"] = serde_json::Value::from(id);
        }
        (status, axum::Json(body)).into_response()
    }
}

impl<E> From<E> for AppError
where
    E: Into<anyhow::Error>,
{
    fn from(err: E) -> Self {
        Self(err.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use brsr_core::catalog::ValueKind;

    fn status(err: BrsrError) -> StatusCode {
        AppError(err.into()).into_response().status()
    }

    #[test]
    fn validation_errors_map_to_400() {
        assert_eq!(
            status(BrsrError::UnknownQuestion("Q404".into())),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            status(BrsrError::TypeMismatch {
                question_id: "Q3_A".into(),
                expected: ValueKind::Integer,
                found: "string 'abc'".into(),
            }),
            StatusCode::BAD_REQUEST
        );
    }

    #[test]
    fn access_errors_map_to_403() {
        assert_eq!(
            status(BrsrError::Forbidden {
                question_id: "Q1_A".into()
            }),
            StatusCode::FORBIDDEN
        );
        assert_eq!(
            status(BrsrError::NoAccessibleQuestions("viewer".into())),
            StatusCode::FORBIDDEN
        );
    }

    #[test]
    fn missing_scope_maps_to_404() {
        assert_eq!(
            status(BrsrError::ScopeNotFound("report acme/p1/2024_2025".into())),
            StatusCode::NOT_FOUND
        );
    }

    #[test]
    fn duplicates_and_conflicts_map_to_409() {
        assert_eq!(
            status(BrsrError::AlreadyExists("report".into())),
            StatusCode::CONFLICT
        );
        assert_eq!(
            status(BrsrError::RevisionConflict {
                scope: "acme/p1/2024_2025".into(),
                expected: 1,
                found: 2,
            }),
            StatusCode::CONFLICT
        );
    }

    #[test]
    fn store_and_foreign_errors_map_to_500() {
        assert_eq!(
            status(BrsrError::Store("disk full".into())),
            StatusCode::INTERNAL_SERVER_ERROR
        );
        let response = AppError(anyhow::anyhow!("something unexpected")).into_response();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[test]
    fn request_constructors_keep_their_status() {
        assert_eq!(
            AppError::unauthorized("x-user-id missing").into_response().status(),
            StatusCode::UNAUTHORIZED
        );
        assert_eq!(
            AppError::forbidden("company mismatch").into_response().status(),
            StatusCode::FORBIDDEN
        );
        assert_eq!(
            AppError::bad_request("empty batch").into_response().status(),
            StatusCode::BAD_REQUEST
        );
    }
}
