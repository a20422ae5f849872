pub mod audit;
pub mod catalog;
pub mod directory;
pub mod permissions;
pub mod progress;
pub mod reports;

use brsr_core::scope::Scope;

use crate::auth::Principal;
use crate::error::AppError;

/// Path segments that address one report.
#[derive(Debug, serde::Deserialize)]
pub struct ScopePath {
    pub company_id: String,
    pub plant_id: String,
    pub financial_year: String,
}

impl ScopePath {
    /// Build the scope and check the caller may act inside its company.
    pub fn authorize(self, principal: &Principal) -> Result<Scope, AppError> {
        principal.ensure_company(&self.company_id)?;
        Ok(Scope::new(
            self.company_id,
            self.plant_id,
            &self.financial_year,
        )?)
    }
}
