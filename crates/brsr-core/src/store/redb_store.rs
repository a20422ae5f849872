//! Durable adapter for every storage port, backed by one redb file.
//!
//! # Table design
//!
//! Each record family has its own table keyed by a string built from the
//! scope (see [`Scope::key`]); values are JSON. Every port call is a single
//! redb transaction run on the blocking pool, so a report commit (revision
//! check, field writes, log append) is all-or-nothing.

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
use redb::{Database, ReadableTable, Table, TableDefinition};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::path::Path;
use std::sync::Arc;

// ---------------------------------------------------------------------------
// Table definitions
// ---------------------------------------------------------------------------

type JsonTable = TableDefinition<'static, &'static str, &'static [u8]>;

const REPORTS: JsonTable = TableDefinition::new("reports");
const COUNTERS: JsonTable = TableDefinition::new("counters");
const PERMISSIONS: JsonTable = TableDefinition::new("permissions");
const AUDIT: JsonTable = TableDefinition::new("audit");
const COMPANIES: JsonTable = TableDefinition::new("companies");
const PLANTS: JsonTable = TableDefinition::new("plants");

const ALL_TABLES: [JsonTable; 6] = [REPORTS, COUNTERS, PERMISSIONS, AUDIT, COMPANIES, PLANTS];

type OpenTable<'txn> = Table<'txn, &'static str, &'static [u8]>;

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn decode<T: DeserializeOwned>(bytes: &[u8]) -> Result<T> {
    Ok(serde_json::from_slice(bytes)?)
}

fn read_json<T: DeserializeOwned>(db: &Database, table: JsonTable, key: &str) -> Result<Option<T>> {
    let rt = db.begin_read().map_err(BrsrError::store)?;
    let table = rt.open_table(table).map_err(BrsrError::store)?;
    let guard = table.get(key).map_err(BrsrError::store)?;
    guard.map(|v| decode(v.value())).transpose()
}

fn get_in<T: DeserializeOwned>(table: &OpenTable<'_>, key: &str) -> Result<Option<T>> {
    let guard = table.get(key).map_err(BrsrError::store)?;
    guard.map(|v| decode(v.value())).transpose()
}

fn put_in<T: Serialize>(table: &mut OpenTable<'_>, key: &str, value: &T) -> Result<()> {
    let bytes = serde_json::to_vec(value)?;
    table
        .insert(key, bytes.as_slice())
        .map_err(BrsrError::store)?;
    Ok(())
}

/// Run `f` inside one write transaction; the transaction commits only when
/// `f` succeeds.
fn write_txn<T>(
    db: &Database,
    table: JsonTable,
    f: impl FnOnce(&mut OpenTable<'_>) -> Result<T>,
) -> Result<T> {
    let wt = db.begin_write().map_err(BrsrError::store)?;
    let out = {
        let mut table = wt.open_table(table).map_err(BrsrError::store)?;
        f(&mut table)?
    };
    wt.commit().map_err(BrsrError::store)?;
    Ok(out)
}

// ---------------------------------------------------------------------------
// RedbStore
// ---------------------------------------------------------------------------

pub struct RedbStore {
    db: Arc<Database>,
}

impl RedbStore {
    /// Open or create the database at `path` and make sure every table exists.
    pub fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }
        let db = Database::create(path).map_err(BrsrError::store)?;
        let wt = db.begin_write().map_err(BrsrError::store)?;
        for table in ALL_TABLES {
            wt.open_table(table).map_err(BrsrError::store)?;
        }
        wt.commit().map_err(BrsrError::store)?;
        tracing::debug!(path = %path.display(), "opened report database");
        Ok(Self { db: Arc::new(db) })
    }

    async fn blocking<T, F>(&self, f: F) -> Result<T>
    where
        T: Send + 'static,
        F: FnOnce(&Database) -> Result<T> + Send + 'static,
    {
        let db = Arc::clone(&self.db);
        tokio::task::spawn_blocking(move || f(&db))
            .await
            .map_err(BrsrError::store)?
    }
}

#[async_trait]
impl ReportStore for RedbStore {
    async fn get_document(&self, scope: &Scope) -> Result<Option<ReportDocument>> {
        let key = scope.key();
        self.blocking(move |db| read_json(db, REPORTS, &key)).await
    }

    async fn create_empty(&self, doc: ReportDocument) -> Result<()> {
        self.blocking(move |db| {
            write_txn(db, REPORTS, |table| {
                let key = doc.scope.key();
                if table.get(key.as_str()).map_err(BrsrError::store)?.is_some() {
                    return Err(BrsrError::AlreadyExists(format!("report {}", doc.scope)));
                }
                put_in(table, &key, &doc)
            })
        })
        .await
    }

    async fn commit_fields(&self, scope: &Scope, commit: FieldCommit) -> Result<u64> {
        let scope = scope.clone();
        self.blocking(move |db| {
            write_txn(db, REPORTS, |table| {
                let key = scope.key();
                let mut doc: ReportDocument = get_in(table, &key)?
                    .ok_or_else(|| BrsrError::ScopeNotFound(format!("report {scope}")))?;
                if doc.revision != commit.expected_revision {
                    return Err(BrsrError::RevisionConflict {
                        scope: scope.to_string(),
                        expected: commit.expected_revision,
                        found: doc.revision,
                    });
                }
                doc.apply(&commit.writes, &commit.entries, &commit.actor, commit.at);
                put_in(table, &key, &doc)?;
                Ok(doc.revision)
            })
        })
        .await
    }
}

#[async_trait]
impl CounterStore for RedbStore {
    async fn get_counters(&self, scope: &Scope) -> Result<Option<ProgressCounters>> {
        let key = scope.key();
        self.blocking(move |db| read_json(db, COUNTERS, &key)).await
    }

    async fn put_counters(&self, counters: &ProgressCounters) -> Result<()> {
        let counters = counters.clone();
        self.blocking(move |db| {
            write_txn(db, COUNTERS, |table| {
                put_in(table, &counters.scope.key(), &counters)
            })
        })
        .await
    }

    async fn increment(&self, scope: &Scope, deltas: &CounterDeltas) -> Result<()> {
        let scope = scope.clone();
        let deltas = deltas.clone();
        self.blocking(move |db| {
            write_txn(db, COUNTERS, |table| {
                let key = scope.key();
                let mut progress: ProgressCounters = get_in(table, &key)?.ok_or_else(|| {
                    BrsrError::ScopeNotFound(format!("progress counters {scope}"))
                })?;
                progress.apply(&deltas);
                put_in(table, &key, &progress)
            })
        })
        .await
    }
}

#[async_trait]
impl PermissionStore for RedbStore {
    async fn get_permissions(
        &self,
        scope: &Scope,
        role: &str,
    ) -> Result<Option<RolePermissionSet>> {
        let key = scope.role_key(role);
        self.blocking(move |db| read_json(db, PERMISSIONS, &key)).await
    }

    async fn put_permissions(&self, set: &RolePermissionSet) -> Result<()> {
        let set = set.clone();
        self.blocking(move |db| {
            write_txn(db, PERMISSIONS, |table| {
                put_in(table, &set.scope.role_key(&set.role), &set)
            })
        })
        .await
    }
}

#[async_trait]
impl AuditStore for RedbStore {
    async fn append(&self, scope: &Scope, entries: Vec<AuditEntry>) -> Result<()> {
        let scope = scope.clone();
        self.blocking(move |db| {
            write_txn(db, AUDIT, |table| {
                let key = scope.key();
                let now = Utc::now();
                let mut log: AuditLog =
                    get_in(table, &key)?.unwrap_or_else(|| AuditLog::new(scope.clone(), now));
                log.extend(entries, now);
                put_in(table, &key, &log)
            })
        })
        .await
    }

    async fn get(&self, scope: &Scope) -> Result<Option<AuditLog>> {
        let key = scope.key();
        self.blocking(move |db| read_json(db, AUDIT, &key)).await
    }
}

#[async_trait]
impl PlantDirectory for RedbStore {
    async fn company_exists(&self, company_id: &str) -> Result<bool> {
        let key = company_id.to_string();
        self.blocking(move |db| Ok(read_json::<Company>(db, COMPANIES, &key)?.is_some()))
            .await
    }

    async fn plant_exists(&self, company_id: &str, plant_id: &str) -> Result<bool> {
        let key = plant_key(company_id, plant_id);
        self.blocking(move |db| Ok(read_json::<Plant>(db, PLANTS, &key)?.is_some()))
            .await
    }

    async fn register_company(&self, company: Company) -> Result<()> {
        self.blocking(move |db| {
            write_txn(db, COMPANIES, |table| {
                if get_in::<Company>(table, &company.id)?.is_some() {
                    return Err(BrsrError::AlreadyExists(format!("company {}", company.id)));
                }
                put_in(table, &company.id, &company)
            })
        })
        .await
    }

    async fn register_plant(&self, plant: Plant) -> Result<()> {
        self.blocking(move |db| {
            let wt = db.begin_write().map_err(BrsrError::store)?;
            {
                let companies = wt.open_table(COMPANIES).map_err(BrsrError::store)?;
                if get_in::<Company>(&companies, &plant.company_id)?.is_none() {
                    return Err(BrsrError::ScopeNotFound(format!(
                        "company {}",
                        plant.company_id
                    )));
                }
                let mut plants = wt.open_table(PLANTS).map_err(BrsrError::store)?;
                let key = plant_key(&plant.company_id, &plant.id);
                if get_in::<Plant>(&plants, &key)?.is_some() {
                    return Err(BrsrError::AlreadyExists(format!(
                        "plant {}/{}",
                        plant.company_id, plant.id
                    )));
                }
                put_in(&mut plants, &key, &plant)?;
            }
            wt.commit().map_err(BrsrError::store)?;
            Ok(())
        })
        .await
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::SchemaPath;
    use crate::document::{ChangeLogEntry, StagedWrite};
    use crate::testing::{sample_catalog, sample_scope};
    use serde_json::json;
    use tempfile::TempDir;

    fn open_tmp() -> (TempDir, RedbStore) {
        let dir = TempDir::new().unwrap();
        let store = RedbStore::open(&dir.path().join("brsr.redb")).unwrap();
        (dir, store)
    }

    #[tokio::test]
    async fn report_commit_persists_across_reopen() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("brsr.redb");
        let catalog = sample_catalog();
        let scope = sample_scope();
        {
            let store = RedbStore::open(&path).unwrap();
            store
                .create_empty(ReportDocument::empty(scope.clone(), &catalog, "u1", Utc::now()))
                .await
                .unwrap();
            let at = Utc::now();
            let rev = store
                .commit_fields(
                    &scope,
                    FieldCommit {
                        expected_revision: 0,
                        writes: vec![StagedWrite {
                            path: SchemaPath::parse("section_a.entity_details.Q1_A").unwrap(),
                            value: json!("Acme Ltd"),
                        }],
                        entries: vec![ChangeLogEntry {
                            question_id: "Q1_A".into(),
                            updated_by: "u1".into(),
                            updated_at: at,
                            previous_value: None,
                            new_value: Some("Acme Ltd".into()),
                            schema_path: Some("section_a.entity_details.Q1_A".into()),
                        }],
                        actor: "u1".into(),
                        at,
                    },
                )
                .await
                .unwrap();
            assert_eq!(rev, 1);
        }

        let store = RedbStore::open(&path).unwrap();
        let doc = store.get_document(&scope).await.unwrap().unwrap();
        assert_eq!(doc.revision, 1);
        assert_eq!(doc.answers["section_a"]["entity_details"]["Q1_A"], json!("Acme Ltd"));
        assert_eq!(doc.updates.len(), 1);
    }

    #[tokio::test]
    async fn conflicting_commit_leaves_document_untouched() {
        let (_dir, store) = open_tmp();
        let catalog = sample_catalog();
        let scope = sample_scope();
        store
            .create_empty(ReportDocument::empty(scope.clone(), &catalog, "u1", Utc::now()))
            .await
            .unwrap();
        let err = store
            .commit_fields(
                &scope,
                FieldCommit {
                    expected_revision: 7,
                    writes: vec![StagedWrite {
                        path: SchemaPath::parse("section_a.entity_details.Q3_A").unwrap(),
                        value: json!(2001),
                    }],
                    entries: Vec::new(),
                    actor: "u1".into(),
                    at: Utc::now(),
                },
            )
            .await
            .unwrap_err();
        assert!(matches!(err, BrsrError::RevisionConflict { .. }));
        let doc = store.get_document(&scope).await.unwrap().unwrap();
        assert_eq!(doc.revision, 0);
        assert_eq!(doc.answers["section_a"]["entity_details"]["Q3_A"], json!(null));
    }

    #[tokio::test]
    async fn counters_increment_and_require_existing_scope() {
        let (_dir, store) = open_tmp();
        let catalog = sample_catalog();
        let scope = sample_scope();
        let mut deltas = CounterDeltas::new();
        deltas.add("section_a.total", 2);
        assert!(matches!(
            store.increment(&scope, &deltas).await,
            Err(BrsrError::ScopeNotFound(_))
        ));

        store
            .put_counters(&ProgressCounters::initial(scope.clone(), &catalog))
            .await
            .unwrap();
        store.increment(&scope, &deltas).await.unwrap();
        let progress = store.get_counters(&scope).await.unwrap().unwrap();
        assert_eq!(progress.get("section_a.total").unwrap().answered_questions, 2);
    }

    #[tokio::test]
    async fn audit_append_is_upsert() {
        let (_dir, store) = open_tmp();
        let scope = sample_scope();
        assert!(store.get(&scope).await.unwrap().is_none());
        let entry = AuditEntry::Question(ChangeLogEntry {
            question_id: "Q1_A".into(),
            updated_by: "u1".into(),
            updated_at: Utc::now(),
            previous_value: None,
            new_value: Some("x".into()),
            schema_path: None,
        });
        store.append(&scope, vec![entry.clone()]).await.unwrap();
        store.append(&scope, vec![entry]).await.unwrap();
        assert_eq!(store.get(&scope).await.unwrap().unwrap().entries.len(), 2);
    }

    #[tokio::test]
    async fn permissions_are_per_role() {
        let (_dir, store) = open_tmp();
        let scope = sample_scope();
        let set = RolePermissionSet::new(scope.clone(), "hr").grant("workforce", true);
        store.put_permissions(&set).await.unwrap();
        assert_eq!(store.get_permissions(&scope, "hr").await.unwrap(), Some(set));
        assert_eq!(store.get_permissions(&scope, "finance").await.unwrap(), None);
    }

    #[tokio::test]
    async fn directory_registration() {
        let (_dir, store) = open_tmp();
        assert!(store
            .register_plant(Plant::new("acme", "p1", "Pune"))
            .await
            .is_err());
        store.register_company(Company::new("acme", "Acme")).await.unwrap();
        assert!(matches!(
            store.register_company(Company::new("acme", "Acme again")).await,
            Err(BrsrError::AlreadyExists(_))
        ));
        store.register_plant(Plant::new("acme", "p1", "Pune")).await.unwrap();
        assert!(store.company_exists("acme").await.unwrap());
        assert!(store.plant_exists("acme", "p1").await.unwrap());
    }
}
