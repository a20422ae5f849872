//! Process-local adapter for every storage port.

use super::{
    AuditStore, CounterStore, FieldCommit, PermissionStore, PlantDirectory, ReportStore,
};
use crate::audit::{AuditEntry, AuditLog};
use crate::directory::{Company, Plant};
use crate::document::ReportDocument;
use crate::error::{BrsrError, Result};
use crate::permissions::RolePermissionSet;
use crate::progress::{CounterDeltas, ProgressCounters};
use crate::scope::{plant_key, Scope};
use async_trait::async_trait;
use chrono::Utc;
use std::collections::HashMap;
use tokio::sync::RwLock;

#[derive(Default)]
pub struct MemoryStore {
    reports: RwLock<HashMap<String, ReportDocument>>,
    counters: RwLock<HashMap<String, ProgressCounters>>,
    permissions: RwLock<HashMap<String, RolePermissionSet>>,
    audit: RwLock<HashMap<String, AuditLog>>,
    companies: RwLock<HashMap<String, Company>>,
    plants: RwLock<HashMap<String, Plant>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ReportStore for MemoryStore {
    async fn get_document(&self, scope: &Scope) -> Result<Option<ReportDocument>> {
        Ok(self.reports.read().await.get(&scope.key()).cloned())
    }

    async fn create_empty(&self, doc: ReportDocument) -> Result<()> {
        let mut reports = self.reports.write().await;
        let key = doc.scope.key();
        if reports.contains_key(&key) {
            return Err(BrsrError::AlreadyExists(format!("report {}", doc.scope)));
        }
        reports.insert(key, doc);
        Ok(())
    }

    async fn commit_fields(&self, scope: &Scope, commit: FieldCommit) -> Result<u64> {
        let mut reports = self.reports.write().await;
        let doc = reports
            .get_mut(&scope.key())
            .ok_or_else(|| BrsrError::ScopeNotFound(format!("report {scope}")))?;
        if doc.revision != commit.expected_revision {
            return Err(BrsrError::RevisionConflict {
                scope: scope.to_string(),
                expected: commit.expected_revision,
                found: doc.revision,
            });
        }
        doc.apply(&commit.writes, &commit.entries, &commit.actor, commit.at);
        Ok(doc.revision)
    }
}

#[async_trait]
impl CounterStore for MemoryStore {
    async fn get_counters(&self, scope: &Scope) -> Result<Option<ProgressCounters>> {
        Ok(self.counters.read().await.get(&scope.key()).cloned())
    }

    async fn put_counters(&self, counters: &ProgressCounters) -> Result<()> {
        self.counters
            .write()
            .await
            .insert(counters.scope.key(), counters.clone());
        Ok(())
    }

    async fn increment(&self, scope: &Scope, deltas: &CounterDeltas) -> Result<()> {
        let mut counters = self.counters.write().await;
        let progress = counters
            .get_mut(&scope.key())
            .ok_or_else(|| BrsrError::ScopeNotFound(format!("progress counters {scope}")))?;
        progress.apply(deltas);
        Ok(())
    }
}

#[async_trait]
impl PermissionStore for MemoryStore {
    async fn get_permissions(
        &self,
        scope: &Scope,
        role: &str,
    ) -> Result<Option<RolePermissionSet>> {
        Ok(self
            .permissions
            .read()
            .await
            .get(&scope.role_key(role))
            .cloned())
    }

    async fn put_permissions(&self, set: &RolePermissionSet) -> Result<()> {
        self.permissions
            .write()
            .await
            .insert(set.scope.role_key(&set.role), set.clone());
        Ok(())
    }
}

#[async_trait]
impl AuditStore for MemoryStore {
    async fn append(&self, scope: &Scope, entries: Vec<AuditEntry>) -> Result<()> {
        let now = Utc::now();
        self.audit
            .write()
            .await
            .entry(scope.key())
            .or_insert_with(|| AuditLog::new(scope.clone(), now))
            .extend(entries, now);
        Ok(())
    }

    async fn get(&self, scope: &Scope) -> Result<Option<AuditLog>> {
        Ok(self.audit.read().await.get(&scope.key()).cloned())
    }
}

#[async_trait]
impl PlantDirectory for MemoryStore {
    async fn company_exists(&self, company_id: &str) -> Result<bool> {
        Ok(self.companies.read().await.contains_key(company_id))
    }

    async fn plant_exists(&self, company_id: &str, plant_id: &str) -> Result<bool> {
        Ok(self
            .plants
            .read()
            .await
            .contains_key(&plant_key(company_id, plant_id)))
    }

    async fn register_company(&self, company: Company) -> Result<()> {
        let mut companies = self.companies.write().await;
        if companies.contains_key(&company.id) {
            return Err(BrsrError::AlreadyExists(format!("company {}", company.id)));
        }
        companies.insert(company.id.clone(), company);
        Ok(())
    }

    async fn register_plant(&self, plant: Plant) -> Result<()> {
        // Lock order: companies, then plants. The company read guard is held
        // until the plant is inserted.
        let companies = self.companies.read().await;
        if !companies.contains_key(&plant.company_id) {
            return Err(BrsrError::ScopeNotFound(format!(
                "company {}",
                plant.company_id
            )));
        }
        let mut plants = self.plants.write().await;
        let key = plant_key(&plant.company_id, &plant.id);
        if plants.contains_key(&key) {
            return Err(BrsrError::AlreadyExists(format!(
                "plant {}/{}",
                plant.company_id, plant.id
            )));
        }
        plants.insert(key, plant);
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::StagedWrite;
    use crate::catalog::SchemaPath;
    use crate::testing::{sample_catalog, sample_scope};
    use serde_json::json;

    fn commit(expected_revision: u64) -> FieldCommit {
        FieldCommit {
            expected_revision,
            writes: vec![StagedWrite {
                path: SchemaPath::parse("section_a.entity_details.Q3_A").unwrap(),
                value: json!(1990),
            }],
            entries: Vec::new(),
            actor: "u1".into(),
            at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn duplicate_report_is_rejected() {
        let store = MemoryStore::new();
        let catalog = sample_catalog();
        let doc = ReportDocument::empty(sample_scope(), &catalog, "u1", Utc::now());
        store.create_empty(doc.clone()).await.unwrap();
        let err = store.create_empty(doc).await.unwrap_err();
        assert!(matches!(err, BrsrError::AlreadyExists(_)));
    }

    #[tokio::test]
    async fn stale_revision_conflicts() {
        let store = MemoryStore::new();
        let catalog = sample_catalog();
        let scope = sample_scope();
        store
            .create_empty(ReportDocument::empty(scope.clone(), &catalog, "u1", Utc::now()))
            .await
            .unwrap();
        assert_eq!(store.commit_fields(&scope, commit(0)).await.unwrap(), 1);
        let err = store.commit_fields(&scope, commit(0)).await.unwrap_err();
        assert!(matches!(
            err,
            BrsrError::RevisionConflict { expected: 0, found: 1, .. }
        ));
    }

    #[tokio::test]
    async fn commit_without_report_is_scope_not_found() {
        let store = MemoryStore::new();
        let err = store.commit_fields(&sample_scope(), commit(0)).await.unwrap_err();
        assert!(matches!(err, BrsrError::ScopeNotFound(_)));
    }

    #[tokio::test]
    async fn plant_needs_company() {
        let store = MemoryStore::new();
        let err = store
            .register_plant(Plant::new("acme", "p1", "Pune"))
            .await
            .unwrap_err();
        assert!(matches!(err, BrsrError::ScopeNotFound(_)));

        store.register_company(Company::new("acme", "Acme")).await.unwrap();
        store.register_plant(Plant::new("acme", "p1", "Pune")).await.unwrap();
        assert!(store.plant_exists("acme", "p1").await.unwrap());
        assert!(!store.plant_exists("other", "p1").await.unwrap());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_plant_registration_admits_one() {
        let store = std::sync::Arc::new(MemoryStore::new());
        store.register_company(Company::new("acme", "Acme")).await.unwrap();

        let mut tasks = tokio::task::JoinSet::new();
        for _ in 0..16 {
            let store = store.clone();
            tasks.spawn(async move {
                store
                    .register_plant(Plant::new("acme", "p1", "Pune"))
                    .await
            });
        }
        let mut created = 0;
        while let Some(result) = tasks.join_next().await {
            match result.unwrap() {
                Ok(()) => created += 1,
                Err(BrsrError::AlreadyExists(_)) => {}
                Err(other) => panic!("unexpected error: {other:?}"),
            }
        }
        assert_eq!(created, 1);
        assert!(store.plant_exists("acme", "p1").await.unwrap());
    }
}
