//! Report operations as the outer surfaces (HTTP, CLI) see them.

use crate::audit::{ActionKind, AuditLog, AuditTrail};
use crate::catalog::Catalog;
use crate::directory::{Company, Plant};
use crate::document::{lookup, set_path, ReportDocument};
use crate::error::{BrsrError, Result};
use crate::mutator::{BatchOutcome, ReportMutator, UpdateRequest};
use crate::permissions::{accessible_for_roles, Actor, RolePermissionSet};
use crate::progress::ProgressCounters;
use crate::scope::{validate_id, Scope};
use crate::store::Stores;
use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::{json, Map, Value};
use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;
use tracing::info;

/// A report as one actor is allowed to see it: answered, accessible leaves
/// only.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ReportView {
    pub scope: Scope,
    pub revision: u64,
    pub answers: Value,
    pub updated_at: DateTime<Utc>,
    pub updated_by: String,
}

pub struct ReportService {
    catalog: Arc<Catalog>,
    stores: Stores,
    mutator: ReportMutator,
    audit: AuditTrail,
}

impl ReportService {
    pub fn new(catalog: Arc<Catalog>, stores: Stores) -> Self {
        Self {
            mutator: ReportMutator::new(catalog.clone(), stores.clone()),
            audit: AuditTrail::new(stores.audit.clone()),
            catalog,
            stores,
        }
    }

    pub fn with_max_commit_attempts(mut self, attempts: u32) -> Self {
        self.mutator = self.mutator.with_max_commit_attempts(attempts);
        self
    }

    pub fn catalog(&self) -> &Catalog {
        &self.catalog
    }

    // -----------------------------------------------------------------------
    // Directory
    // -----------------------------------------------------------------------

    pub async fn register_company(&self, company: Company) -> Result<()> {
        validate_id("company_id", &company.id)?;
        self.stores.directory.register_company(company).await
    }

    pub async fn register_plant(&self, plant: Plant) -> Result<()> {
        validate_id("company_id", &plant.company_id)?;
        validate_id("plant_id", &plant.id)?;
        self.stores.directory.register_plant(plant).await
    }

    // -----------------------------------------------------------------------
    // Reports
    // -----------------------------------------------------------------------

    /// Open the report for `scope` with every answer null and totals filled in.
    pub async fn create_report(&self, scope: &Scope, actor: &Actor) -> Result<ReportDocument> {
        let directory = &self.stores.directory;
        if !directory.company_exists(&scope.company_id).await? {
            return Err(BrsrError::ScopeNotFound(format!(
                "company {}",
                scope.company_id
            )));
        }
        if !directory
            .plant_exists(&scope.company_id, &scope.plant_id)
            .await?
        {
            return Err(BrsrError::ScopeNotFound(format!(
                "plant {}/{}",
                scope.company_id, scope.plant_id
            )));
        }

        let doc = ReportDocument::empty(scope.clone(), &self.catalog, &actor.user_id, Utc::now());
        self.stores.reports.create_empty(doc.clone()).await?;
        self.stores
            .counters
            .put_counters(&ProgressCounters::initial(scope.clone(), &self.catalog))
            .await?;
        self.audit
            .record(
                scope,
                ActionKind::ReportCreated,
                &actor.user_id,
                Some(doc.id.to_string()),
                json!({"catalog_version": self.catalog.version()}),
            )
            .await?;
        info!(%scope, actor = %actor.user_id, "report created");
        Ok(doc)
    }

    pub async fn get_report(&self, scope: &Scope, actor: &Actor) -> Result<ReportView> {
        let doc = self.load(scope).await?;
        let accessible = self.accessible(scope, actor).await?;
        let mut answers = Value::Object(Map::new());
        for q in self.catalog.leaves() {
            let Some(path) = q.schema_path() else {
                continue;
            };
            if !accessible.contains(&q.id) {
                continue;
            }
            let value = doc.value_at(path);
            if !value.is_null() {
                let segments: Vec<&str> = path.segments().collect();
                set_path(&mut answers, &segments, value.clone());
            }
        }
        Ok(ReportView {
            scope: doc.scope,
            revision: doc.revision,
            answers,
            updated_at: doc.updated_at,
            updated_by: doc.updated_by,
        })
    }

    pub async fn update_report(
        &self,
        scope: &Scope,
        actor: &Actor,
        updates: Vec<UpdateRequest>,
    ) -> Result<BatchOutcome> {
        self.mutator.apply(scope, actor, updates).await
    }

    /// Stored value of each question; composites return their whole subtree.
    pub async fn fetch_responses(
        &self,
        scope: &Scope,
        actor: &Actor,
        question_ids: &[String],
    ) -> Result<BTreeMap<String, Value>> {
        let doc = self.load(scope).await?;
        let accessible = accessible_for_roles(
            self.stores.permissions.as_ref(),
            scope,
            &actor.roles,
            &self.catalog,
        )
        .await?;
        let mut out = BTreeMap::new();
        for id in question_ids {
            let q = self.catalog.descriptor(id)?;
            if !accessible.contains(&q.id) {
                return Err(BrsrError::Forbidden {
                    question_id: q.id.clone(),
                });
            }
            let value = lookup(&doc.answers, q.value_path())
                .cloned()
                .unwrap_or(Value::Null);
            out.insert(q.id.clone(), value);
        }
        Ok(out)
    }

    // -----------------------------------------------------------------------
    // Progress
    // -----------------------------------------------------------------------

    pub async fn get_progress(&self, scope: &Scope) -> Result<ProgressCounters> {
        self.stores
            .counters
            .get_counters(scope)
            .await?
            .ok_or_else(|| BrsrError::ScopeNotFound(format!("progress counters {scope}")))
    }

    /// Rebuild the scope's counters from its stored answers.
    pub async fn repair_counters(&self, scope: &Scope) -> Result<ProgressCounters> {
        let doc = self.load(scope).await?;
        let progress = ProgressCounters::recompute(scope.clone(), &self.catalog, &doc);
        self.stores.counters.put_counters(&progress).await?;
        info!(%scope, revision = doc.revision, "progress counters rebuilt");
        Ok(progress)
    }

    // -----------------------------------------------------------------------
    // Permissions
    // -----------------------------------------------------------------------

    pub async fn set_permissions(&self, actor: &Actor, set: RolePermissionSet) -> Result<()> {
        set.validate(&self.catalog)?;
        self.stores.permissions.put_permissions(&set).await?;
        self.audit
            .record(
                &set.scope,
                ActionKind::PermissionsChanged,
                &actor.user_id,
                Some(set.role.clone()),
                json!({ "grants": set.grants }),
            )
            .await?;
        info!(scope = %set.scope, role = %set.role, grants = set.grants.len(), "permissions updated");
        Ok(())
    }

    /// The stored set, or an empty one when the role has none yet.
    pub async fn get_permissions(&self, scope: &Scope, role: &str) -> Result<RolePermissionSet> {
        Ok(self
            .stores
            .permissions
            .get_permissions(scope, role)
            .await?
            .unwrap_or_else(|| RolePermissionSet::new(scope.clone(), role)))
    }

    // -----------------------------------------------------------------------
    // Audit
    // -----------------------------------------------------------------------

    /// Audit history; a scope with no log yet has an empty history.
    pub async fn audit_history(&self, scope: &Scope) -> Result<AuditLog> {
        self.audit.history(scope).await
    }

    pub async fn record_action(
        &self,
        scope: &Scope,
        actor: &Actor,
        kind: ActionKind,
        target: Option<String>,
        detail: Value,
    ) -> Result<()> {
        self.audit
            .record(scope, kind, &actor.user_id, target, detail)
            .await
    }

    async fn load(&self, scope: &Scope) -> Result<ReportDocument> {
        self.stores
            .reports
            .get_document(scope)
            .await?
            .ok_or_else(|| BrsrError::ScopeNotFound(format!("report {scope}")))
    }

    async fn accessible(&self, scope: &Scope, actor: &Actor) -> Result<BTreeSet<String>> {
        let accessible = accessible_for_roles(
            self.stores.permissions.as_ref(),
            scope,
            &actor.roles,
            &self.catalog,
        )
        .await?;
        if accessible.is_empty() {
            return Err(BrsrError::NoAccessibleQuestions(actor.roles.join(", ")));
        }
        Ok(accessible)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audit::AuditEntry;
    use crate::testing::{sample_catalog, sample_scope};

    fn admin() -> Actor {
        Actor::new("u-admin", ["admin"])
    }

    async fn service_with_plant() -> ReportService {
        let service = ReportService::new(Arc::new(sample_catalog()), Stores::memory());
        service
            .register_company(Company::new("acme", "Acme Ltd"))
            .await
            .unwrap();
        service
            .register_plant(Plant::new("acme", "plant-1", "Pune"))
            .await
            .unwrap();
        service
    }

    async fn open_report(service: &ReportService) -> Scope {
        let scope = sample_scope();
        service.create_report(&scope, &admin()).await.unwrap();
        let set = RolePermissionSet::new(scope.clone(), "admin")
            .grant("admin", true)
            .grant("workforce", true)
            .grant("environment", true);
        service.set_permissions(&admin(), set).await.unwrap();
        scope
    }

    #[tokio::test]
    async fn create_requires_company_and_plant() {
        let service = ReportService::new(Arc::new(sample_catalog()), Stores::memory());
        let err = service
            .create_report(&sample_scope(), &admin())
            .await
            .unwrap_err();
        assert!(matches!(err, BrsrError::ScopeNotFound(ref m) if m.contains("company")));

        service
            .register_company(Company::new("acme", "Acme Ltd"))
            .await
            .unwrap();
        let err = service
            .create_report(&sample_scope(), &admin())
            .await
            .unwrap_err();
        assert!(matches!(err, BrsrError::ScopeNotFound(ref m) if m.contains("plant")));
    }

    #[tokio::test]
    async fn create_initializes_counters_and_audit() {
        let service = service_with_plant().await;
        let scope = open_report(&service).await;

        let progress = service.get_progress(&scope).await.unwrap();
        assert_eq!(progress.get("section_a.total").unwrap().total_questions, 8);

        let log = service.audit_history(&scope).await.unwrap();
        assert!(matches!(
            &log.entries[0],
            AuditEntry::Action(a) if a.kind == ActionKind::ReportCreated
        ));
        assert!(matches!(
            &log.entries[1],
            AuditEntry::Action(a) if a.kind == ActionKind::PermissionsChanged
        ));
    }

    #[tokio::test]
    async fn duplicate_report_already_exists() {
        let service = service_with_plant().await;
        let scope = open_report(&service).await;
        let err = service.create_report(&scope, &admin()).await.unwrap_err();
        assert!(matches!(err, BrsrError::AlreadyExists(_)));
    }

    #[tokio::test]
    async fn hyphenated_year_addresses_the_same_report() {
        let service = service_with_plant().await;
        open_report(&service).await;
        let same = Scope::new("acme", "plant-1", "2024_2025").unwrap();
        assert!(service.get_report(&same, &admin()).await.is_ok());
    }

    #[tokio::test]
    async fn get_report_filters_by_role_and_omits_nulls() {
        let service = service_with_plant().await;
        let scope = open_report(&service).await;
        service
            .update_report(
                &scope,
                &admin(),
                vec![
                    UpdateRequest::new("Q1_A", json!("Acme Ltd")),
                    UpdateRequest::new("Q18a", json!({"permanent_employees": {"male": 5}})),
                ],
            )
            .await
            .unwrap();
        service
            .set_permissions(
                &admin(),
                RolePermissionSet::new(scope.clone(), "hr").grant("workforce", true),
            )
            .await
            .unwrap();

        let full = service.get_report(&scope, &admin()).await.unwrap();
        assert_eq!(full.answers["section_a"]["entity_details"]["Q1_A"], json!("Acme Ltd"));
        assert!(full.answers["section_c"].is_null());

        let hr = service
            .get_report(&scope, &Actor::new("u-hr", ["hr"]))
            .await
            .unwrap();
        assert!(hr.answers["section_a"].get("entity_details").is_none());
        assert_eq!(
            hr.answers["section_a"]["employees"]["Q18a"]["permanent_employees"],
            json!({"male": 5})
        );
    }

    #[tokio::test]
    async fn role_without_grants_sees_nothing() {
        let service = service_with_plant().await;
        let scope = open_report(&service).await;
        let err = service
            .get_report(&scope, &Actor::new("u-x", ["visitor"]))
            .await
            .unwrap_err();
        assert!(matches!(err, BrsrError::NoAccessibleQuestions(ref r) if r == "visitor"));
    }

    #[tokio::test]
    async fn fetch_responses_returns_composite_subtrees() {
        let service = service_with_plant().await;
        let scope = open_report(&service).await;
        service
            .update_report(
                &scope,
                &admin(),
                vec![UpdateRequest::new("Q19", json!({"board_women": "25.5"}))],
            )
            .await
            .unwrap();
        let out = service
            .fetch_responses(&scope, &admin(), &["Q19".to_string(), "Q1_A".to_string()])
            .await
            .unwrap();
        assert_eq!(out["Q19"], json!({"board_women": 25.5, "management_women": null}));
        assert_eq!(out["Q1_A"], Value::Null);

        let err = service
            .fetch_responses(&scope, &admin(), &["Q404".to_string()])
            .await
            .unwrap_err();
        assert!(matches!(err, BrsrError::UnknownQuestion(_)));

        let err = service
            .fetch_responses(&scope, &Actor::new("u-x", ["visitor"]), &["Q1_A".to_string()])
            .await
            .unwrap_err();
        assert!(matches!(err, BrsrError::Forbidden { .. }));
    }

    #[tokio::test]
    async fn repair_rebuilds_drifted_counters() {
        let service = service_with_plant().await;
        let scope = open_report(&service).await;
        service
            .update_report(
                &scope,
                &admin(),
                vec![
                    UpdateRequest::new("Q1_A", json!("Acme Ltd")),
                    UpdateRequest::new("Q2_P3", json!({"policy": true})),
                ],
            )
            .await
            .unwrap();
        let counted = service.get_progress(&scope).await.unwrap();

        // Simulate counters lost after a commit.
        service
            .stores
            .counters
            .put_counters(&ProgressCounters::initial(scope.clone(), service.catalog()))
            .await
            .unwrap();
        assert_eq!(
            service
                .get_progress(&scope)
                .await
                .unwrap()
                .get("section_a.total")
                .unwrap()
                .answered_questions,
            0
        );

        let repaired = service.repair_counters(&scope).await.unwrap();
        assert_eq!(repaired.counters, counted.counters);
        assert_eq!(repaired.get("section_c.total").unwrap().answered_questions, 1);
    }

    #[tokio::test]
    async fn permissions_with_unknown_keys_are_rejected() {
        let service = service_with_plant().await;
        let scope = open_report(&service).await;
        let err = service
            .set_permissions(
                &admin(),
                RolePermissionSet::new(scope.clone(), "hr").grant("payroll", true),
            )
            .await
            .unwrap_err();
        assert!(matches!(err, BrsrError::UnknownQuestion(_)));
        let empty = service.get_permissions(&scope, "hr").await.unwrap();
        assert!(empty.grants.is_empty());
    }

    #[tokio::test]
    async fn record_action_lands_in_history() {
        let service = service_with_plant().await;
        let scope = sample_scope();
        service
            .record_action(
                &scope,
                &admin(),
                ActionKind::EmployeeRemoved,
                Some("emp-3".into()),
                Value::Null,
            )
            .await
            .unwrap();
        let log = service.audit_history(&scope).await.unwrap();
        assert_eq!(log.entries.len(), 1);
    }
}
