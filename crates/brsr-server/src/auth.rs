//! Caller identity from the headers set by the upstream identity provider.
//!
//! The gateway in front of this service authenticates the user and forwards
//! `x-user-id`, `x-user-roles` (comma separated) and optionally
//! `x-company-id`. They are trusted as given.

use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use axum::http::HeaderMap;
use brsr_core::permissions::Actor;

use crate::error::AppError;

pub const USER_ID_HEADER: &str = "x-user-id";
pub const USER_ROLES_HEADER: &str = "x-user-roles";
pub const COMPANY_ID_HEADER: &str = "x-company-id";

/// Role allowed to change grants and rebuild counters.
pub const ADMIN_ROLE: &str = "admin";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Principal {
    pub actor: Actor,
    /// Company the identity provider bound this user to, if any.
    pub company_id: Option<String>,
}

impl Principal {
    pub fn from_headers(headers: &HeaderMap) -> Result<Self, AppError> {
        let user_id = header(headers, USER_ID_HEADER)
            .filter(|v| !v.is_empty())
            .ok_or_else(|| AppError::unauthorized(format!("missing {USER_ID_HEADER} header")))?;
        let roles: Vec<String> = header(headers, USER_ROLES_HEADER)
            .map(|raw| {
                raw.split(',')
                    .map(str::trim)
                    .filter(|r| !r.is_empty())
                    .map(str::to_string)
                    .collect()
            })
            .unwrap_or_default();
        let company_id = header(headers, COMPANY_ID_HEADER).filter(|v| !v.is_empty());
        Ok(Self {
            actor: Actor::new(user_id, roles),
            company_id,
        })
    }

    /// A user bound to one company may only act inside it.
    pub fn ensure_company(&self, company_id: &str) -> Result<(), AppError> {
        match &self.company_id {
            Some(bound) if bound != company_id => Err(AppError::forbidden(format!(
                "user {} belongs to company {bound}, not {company_id}",
                self.actor.user_id
            ))),
            _ => Ok(()),
        }
    }

    pub fn require_role(&self, role: &str) -> Result<(), AppError> {
        if self.actor.roles.iter().any(|r| r == role) {
            Ok(())
        } else {
            Err(AppError::forbidden(format!(
                "role '{role}' required for user {}",
                self.actor.user_id
            )))
        }
    }
}

fn header(headers: &HeaderMap, name: &str) -> Option<String> {
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .map(|v| v.trim().to_string())
}

impl<S: Send + Sync> FromRequestParts<S> for Principal {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        Principal::from_headers(&parts.headers)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;
    use axum::response::IntoResponse;

    fn headers(pairs: &[(&'static str, &str)]) -> HeaderMap {
        let mut map = HeaderMap::new();
        for (k, v) in pairs {
            map.insert(*k, HeaderValue::from_str(v).unwrap());
        }
        map
    }

    #[test]
    fn roles_are_split_and_trimmed() {
        let p = Principal::from_headers(&headers(&[
            (USER_ID_HEADER, "u1"),
            (USER_ROLES_HEADER, "hr, admin ,,"),
        ]))
        .unwrap();
        assert_eq!(p.actor.user_id, "u1");
        assert_eq!(p.actor.roles, vec!["hr", "admin"]);
        assert_eq!(p.company_id, None);
    }

    #[test]
    fn missing_user_is_unauthorized() {
        let err = Principal::from_headers(&headers(&[(USER_ROLES_HEADER, "hr")])).unwrap_err();
        assert_eq!(
            err.into_response().status(),
            axum::http::StatusCode::UNAUTHORIZED
        );
    }

    #[test]
    fn bound_company_must_match() {
        let p = Principal::from_headers(&headers(&[
            (USER_ID_HEADER, "u1"),
            (COMPANY_ID_HEADER, "acme"),
        ]))
        .unwrap();
        assert!(p.ensure_company("acme").is_ok());
        assert!(p.ensure_company("globex").is_err());
    }

    #[test]
    fn admin_role_is_required() {
        let hr = Principal::from_headers(&headers(&[
            (USER_ID_HEADER, "u1"),
            (USER_ROLES_HEADER, "hr"),
        ]))
        .unwrap();
        let err = hr.require_role(ADMIN_ROLE).unwrap_err();
        assert_eq!(
            err.into_response().status(),
            axum::http::StatusCode::FORBIDDEN
        );

        let admin = Principal::from_headers(&headers(&[
            (USER_ID_HEADER, "u2"),
            (USER_ROLES_HEADER, "hr,admin"),
        ]))
        .unwrap();
        assert!(admin.require_role(ADMIN_ROLE).is_ok());
    }
}
