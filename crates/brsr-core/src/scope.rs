use crate::error::{BrsrError, Result};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::OnceLock;

// ---------------------------------------------------------------------------
// Financial year
// ---------------------------------------------------------------------------

static FINANCIAL_YEAR_RE: OnceLock<Regex> = OnceLock::new();

fn financial_year_re() -> &'static Regex {
    FINANCIAL_YEAR_RE.get_or_init(|| Regex::new(r"^[0-9]{4}_[0-9]{2}([0-9]{2})?$").unwrap())
}

/// Normalize a financial year to the underscore convention
/// (`2024-2025` → `2024_2025`, `2024-25` → `2024_25`).
pub fn normalize_financial_year(financial_year: &str) -> Result<String> {
    let normalized = financial_year.trim().replace('-', "_");
    if !financial_year_re().is_match(&normalized) {
        return Err(BrsrError::InvalidScope(format!(
            "financial year '{financial_year}' must look like 2024-2025 or 2024_25"
        )));
    }
    Ok(normalized)
}

// ---------------------------------------------------------------------------
// Scope
// ---------------------------------------------------------------------------

/// One report instance: (company, plant, financial year).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Scope {
    pub company_id: String,
    pub plant_id: String,
    pub financial_year: String,
}

/// Separator for store keys. Not expected inside ids.
const KEY_SEP: char = '\u{1f}';

impl Scope {
    pub fn new(
        company_id: impl Into<String>,
        plant_id: impl Into<String>,
        financial_year: &str,
    ) -> Result<Self> {
        let company_id = company_id.into();
        let plant_id = plant_id.into();
        validate_id("company_id", &company_id)?;
        validate_id("plant_id", &plant_id)?;
        Ok(Self {
            company_id,
            plant_id,
            financial_year: normalize_financial_year(financial_year)?,
        })
    }

    /// Key used by the stores to address this scope.
    pub fn key(&self) -> String {
        format!(
            "{}{KEY_SEP}{}{KEY_SEP}{}",
            self.company_id, self.plant_id, self.financial_year
        )
    }

    /// Key for a per-role record inside this scope.
    pub fn role_key(&self, role: &str) -> String {
        format!("{}{KEY_SEP}{role}", self.key())
    }
}

impl fmt::Display for Scope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}/{}/{}",
            self.company_id, self.plant_id, self.financial_year
        )
    }
}

/// Company and plant ids must be non-blank and free of the key separator.
pub fn validate_id(label: &str, id: &str) -> Result<()> {
    if id.trim().is_empty() {
        return Err(BrsrError::InvalidScope(format!("{label} must not be empty")));
    }
    if id.contains(KEY_SEP) {
        return Err(BrsrError::InvalidScope(format!(
            "{label} contains a control character"
        )));
    }
    Ok(())
}

/// Key for a plant inside a company, used by the plant directory.
pub fn plant_key(company_id: &str, plant_id: &str) -> String {
    format!("{company_id}{KEY_SEP}{plant_id}")
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hyphen_and_underscore_years_normalize_the_same() {
        let a = Scope::new("acme", "p1", "2024-2025").unwrap();
        let b = Scope::new("acme", "p1", "2024_2025").unwrap();
        assert_eq!(a, b);
        assert_eq!(a.financial_year, "2024_2025");
    }

    #[test]
    fn short_year_form_is_accepted() {
        let s = Scope::new("acme", "p1", "2024-25").unwrap();
        assert_eq!(s.financial_year, "2024_25");
    }

    #[test]
    fn malformed_year_is_rejected() {
        assert!(matches!(
            Scope::new("acme", "p1", "last year"),
            Err(BrsrError::InvalidScope(_))
        ));
        assert!(Scope::new("acme", "p1", "2024").is_err());
    }

    #[test]
    fn empty_ids_are_rejected() {
        assert!(Scope::new("", "p1", "2024_2025").is_err());
        assert!(Scope::new("acme", "  ", "2024_2025").is_err());
    }

    #[test]
    fn keys_are_distinct_per_component() {
        let a = Scope::new("ab", "c", "2024_2025").unwrap();
        let b = Scope::new("a", "bc", "2024_2025").unwrap();
        assert_ne!(a.key(), b.key());
        assert_ne!(a.role_key("hr"), a.role_key("admin"));
    }

    #[test]
    fn display_uses_slashes() {
        let s = Scope::new("acme", "p1", "2024-2025").unwrap();
        assert_eq!(s.to_string(), "acme/p1/2024_2025");
    }
}
