//! Storage ports and the bundle the service is wired with.
//!
//! Each port is an `async_trait` so the in-memory and redb adapters (and test
//! doubles) can be swapped behind `Arc<dyn …>`.

pub mod memory;
pub mod redb_store;

use crate::audit::{AuditEntry, AuditLog};
use crate::catalog::Catalog;
use crate::directory::{Company, Plant};
use crate::document::{ChangeLogEntry, ReportDocument, StagedWrite};
use crate::error::Result;
use crate::permissions::RolePermissionSet;
use crate::progress::{CounterDeltas, ProgressCounters};
use crate::scope::Scope;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::BTreeSet;
use std::path::Path;
use std::sync::Arc;

/// One batch commit against a report, conditional on `expected_revision`.
#[derive(Debug, Clone)]
pub struct FieldCommit {
    pub expected_revision: u64,
    pub writes: Vec<StagedWrite>,
    pub entries: Vec<ChangeLogEntry>,
    pub actor: String,
    pub at: DateTime<Utc>,
}

#[async_trait]
pub trait ReportStore: Send + Sync {
    async fn get_document(&self, scope: &Scope) -> Result<Option<ReportDocument>>;

    /// Fails with `AlreadyExists` if the scope already has a report.
    async fn create_empty(&self, doc: ReportDocument) -> Result<()>;

    /// Apply every write and log entry at once and return the new revision.
    ///
    /// Fails with `ScopeNotFound` when there is no report and with
    /// `RevisionConflict` when the stored revision moved since staging.
    async fn commit_fields(&self, scope: &Scope, commit: FieldCommit) -> Result<u64>;
}

#[async_trait]
pub trait CounterStore: Send + Sync {
    async fn get_counters(&self, scope: &Scope) -> Result<Option<ProgressCounters>>;

    async fn put_counters(&self, counters: &ProgressCounters) -> Result<()>;

    /// Apply net deltas. Fails with `ScopeNotFound` if the scope has no
    /// counters yet.
    async fn increment(&self, scope: &Scope, deltas: &CounterDeltas) -> Result<()>;
}

#[async_trait]
pub trait PermissionStore: Send + Sync {
    async fn get_permissions(&self, scope: &Scope, role: &str)
        -> Result<Option<RolePermissionSet>>;

    async fn put_permissions(&self, set: &RolePermissionSet) -> Result<()>;

    /// Questions `role` may touch in `scope`; no stored set means none.
    async fn accessible_questions(
        &self,
        scope: &Scope,
        role: &str,
        catalog: &Catalog,
    ) -> Result<BTreeSet<String>> {
        Ok(self
            .get_permissions(scope, role)
            .await?
            .map(|set| set.accessible_questions(catalog))
            .unwrap_or_default())
    }
}

#[async_trait]
pub trait AuditStore: Send + Sync {
    /// Create the scope's log on first use, otherwise push at the end.
    async fn append(&self, scope: &Scope, entries: Vec<AuditEntry>) -> Result<()>;

    async fn get(&self, scope: &Scope) -> Result<Option<AuditLog>>;
}

#[async_trait]
pub trait PlantDirectory: Send + Sync {
    async fn company_exists(&self, company_id: &str) -> Result<bool>;

    async fn plant_exists(&self, company_id: &str, plant_id: &str) -> Result<bool>;

    /// Fails with `AlreadyExists` on a duplicate id.
    async fn register_company(&self, company: Company) -> Result<()>;

    /// Fails with `ScopeNotFound` for an unknown company and `AlreadyExists`
    /// on a duplicate plant id.
    async fn register_plant(&self, plant: Plant) -> Result<()>;
}

/// Every port the service needs.
#[derive(Clone)]
pub struct Stores {
    pub reports: Arc<dyn ReportStore>,
    pub counters: Arc<dyn CounterStore>,
    pub permissions: Arc<dyn PermissionStore>,
    pub audit: Arc<dyn AuditStore>,
    pub directory: Arc<dyn PlantDirectory>,
}

impl Stores {
    /// All ports backed by one adapter.
    pub fn single<S>(backend: Arc<S>) -> Self
    where
        S: ReportStore + CounterStore + PermissionStore + AuditStore + PlantDirectory + 'static,
    {
        Self {
            reports: backend.clone(),
            counters: backend.clone(),
            permissions: backend.clone(),
            audit: backend.clone(),
            directory: backend,
        }
    }

    pub fn memory() -> Self {
        Self::single(Arc::new(memory::MemoryStore::new()))
    }

    pub fn redb(path: &Path) -> Result<Self> {
        Ok(Self::single(Arc::new(redb_store::RedbStore::open(path)?)))
    }
}
