//! Update batches: validate, stage, commit.
//!
//! A batch moves through `Validating → Staging → Committing → Done`, or to
//! `Failed` from any of them. Validation and staging touch no store; the
//! report commit is a single revision-conditioned write. Audit and counter
//! updates follow as separate best-effort steps whose failures come back as
//! warnings on an otherwise successful outcome.

use crate::audit::{AuditEntry, AuditTrail};
use crate::caster::cast;
use crate::catalog::{Catalog, QuestionDescriptor, SchemaPath};
use crate::document::{ChangeLogEntry, ReportDocument, StagedWrite};
use crate::error::{BrsrError, Result};
use crate::permissions::{accessible_for_roles, Actor};
use crate::progress::{delta, CounterDeltas};
use crate::resolver::PathResolver;
use crate::scope::Scope;
use crate::store::{FieldCommit, Stores};
use crate::value::display_value;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;
use tracing::{debug, info, warn};

pub const DEFAULT_MAX_COMMIT_ATTEMPTS: u32 = 3;

/// One `{question_id, value}` item of a batch.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UpdateRequest {
    pub question_id: String,
    #[serde(default)]
    pub value: Value,
}

impl UpdateRequest {
    pub fn new(question_id: impl Into<String>, value: Value) -> Self {
        Self {
            question_id: question_id.into(),
            value,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BatchState {
    Validating,
    Staging,
    Committing,
    Done,
    Failed,
}

/// Everything a batch will write, computed against one document revision.
#[derive(Debug, Default)]
pub struct StagedBatch {
    pub base_revision: u64,
    pub writes: Vec<StagedWrite>,
    pub entries: Vec<ChangeLogEntry>,
    pub deltas: CounterDeltas,
}

#[derive(Debug)]
pub struct BatchOutcome {
    pub revision: u64,
    /// Leaves whose value actually changed.
    pub changes: usize,
    /// True when every submitted value already matched the stored one.
    pub unchanged: bool,
    pub log_entries: Vec<ChangeLogEntry>,
    pub deltas: CounterDeltas,
    /// Recoverable failures after the report commit.
    pub warnings: Vec<BrsrError>,
}

impl BatchOutcome {
    fn unchanged(revision: u64) -> Self {
        Self {
            revision,
            changes: 0,
            unchanged: true,
            log_entries: Vec::new(),
            deltas: CounterDeltas::new(),
            warnings: Vec::new(),
        }
    }

    pub fn is_degraded(&self) -> bool {
        !self.warnings.is_empty()
    }
}

/// A leaf that passed resolution, authorization and casting.
struct ValidatedLeaf<'c> {
    descriptor: &'c QuestionDescriptor,
    path: &'c SchemaPath,
    value: Value,
}

pub struct ReportMutator {
    catalog: Arc<Catalog>,
    stores: Stores,
    audit: AuditTrail,
    max_commit_attempts: u32,
}

impl ReportMutator {
    pub fn new(catalog: Arc<Catalog>, stores: Stores) -> Self {
        let audit = AuditTrail::new(stores.audit.clone());
        Self {
            catalog,
            stores,
            audit,
            max_commit_attempts: DEFAULT_MAX_COMMIT_ATTEMPTS,
        }
    }

    pub fn with_max_commit_attempts(mut self, attempts: u32) -> Self {
        self.max_commit_attempts = attempts.max(1);
        self
    }

    pub async fn apply(
        &self,
        scope: &Scope,
        actor: &Actor,
        updates: Vec<UpdateRequest>,
    ) -> Result<BatchOutcome> {
        enter(scope, BatchState::Validating);
        let mut doc = self.load(scope).await?;
        let accessible =
            accessible_for_roles(self.stores.permissions.as_ref(), scope, &actor.roles, &self.catalog)
                .await?;
        let leaves = match self.validate(updates, &accessible) {
            Ok(leaves) => leaves,
            Err(e) => return Err(failed(scope, BatchState::Validating, e)),
        };

        let mut attempt = 1;
        let (revision, batch) = loop {
            enter(scope, BatchState::Staging);
            let at = Utc::now();
            let batch = stage(&doc, &leaves, &actor.user_id, at);
            if batch.writes.is_empty() {
                enter(scope, BatchState::Done);
                debug!(%scope, revision = doc.revision, "batch has no effective changes");
                return Ok(BatchOutcome::unchanged(doc.revision));
            }

            enter(scope, BatchState::Committing);
            let commit = FieldCommit {
                expected_revision: batch.base_revision,
                writes: batch.writes.clone(),
                entries: batch.entries.clone(),
                actor: actor.user_id.clone(),
                at,
            };
            match self.stores.reports.commit_fields(scope, commit).await {
                Ok(revision) => break (revision, batch),
                Err(BrsrError::RevisionConflict { found, .. })
                    if attempt < self.max_commit_attempts =>
                {
                    debug!(%scope, attempt, found, "report moved during commit, restaging");
                    attempt += 1;
                    doc = self.load(scope).await?;
                }
                Err(e) => return Err(failed(scope, BatchState::Committing, e)),
            }
        };
        info!(%scope, revision, changes = batch.writes.len(), actor = %actor.user_id, "report updated");

        let mut warnings = Vec::new();
        let copies = batch
            .entries
            .iter()
            .cloned()
            .map(AuditEntry::Question)
            .collect();
        if let Err(e) = self.audit.append(scope, copies).await {
            warn!(%scope, error = %e, "audit append failed after commit");
            warnings.push(BrsrError::AuditAppendFailed {
                scope: scope.to_string(),
                reason: e.to_string(),
            });
        }
        if !batch.deltas.is_empty() {
            if let Err(e) = self.stores.counters.increment(scope, &batch.deltas).await {
                warn!(%scope, error = %e, "progress counters are stale, repair required");
                warnings.push(BrsrError::CounterUpdateFailed {
                    scope: scope.to_string(),
                    reason: e.to_string(),
                });
            }
        }
        enter(scope, BatchState::Done);

        Ok(BatchOutcome {
            revision,
            changes: batch.writes.len(),
            unchanged: false,
            log_entries: batch.entries,
            deltas: batch.deltas,
            warnings,
        })
    }

    async fn load(&self, scope: &Scope) -> Result<ReportDocument> {
        self.stores
            .reports
            .get_document(scope)
            .await?
            .ok_or_else(|| BrsrError::ScopeNotFound(format!("report {scope}")))
    }

    /// Resolve, authorize and cast every update. The first failure aborts.
    fn validate(
        &self,
        updates: Vec<UpdateRequest>,
        accessible: &BTreeSet<String>,
    ) -> Result<Vec<ValidatedLeaf<'_>>> {
        let resolver = PathResolver::new(&self.catalog);
        let mut leaves = Vec::new();
        for update in updates {
            for leaf in resolver.expand(&update.question_id, update.value)? {
                if !accessible.contains(&leaf.descriptor.id) {
                    return Err(BrsrError::Forbidden {
                        question_id: leaf.descriptor.id.clone(),
                    });
                }
                let value = cast(&self.catalog, leaf.descriptor, leaf.raw)?.to_json();
                leaves.push(ValidatedLeaf {
                    descriptor: leaf.descriptor,
                    path: leaf.path,
                    value,
                });
            }
        }
        Ok(leaves)
    }
}

/// Diff validated leaves against `doc`. Leaves equal to the stored value are
/// skipped; a leaf repeated in one batch diffs against its earlier staged
/// value.
fn stage(
    doc: &ReportDocument,
    leaves: &[ValidatedLeaf<'_>],
    actor: &str,
    at: DateTime<Utc>,
) -> StagedBatch {
    let mut batch = StagedBatch {
        base_revision: doc.revision,
        ..StagedBatch::default()
    };
    let mut overlay: HashMap<&str, &Value> = HashMap::new();
    for leaf in leaves {
        let previous = overlay
            .get(leaf.path.as_str())
            .copied()
            .unwrap_or_else(|| doc.value_at(leaf.path));
        if previous == &leaf.value {
            continue;
        }
        batch.deltas.record(leaf.descriptor, delta(previous, &leaf.value));
        batch.entries.push(ChangeLogEntry {
            question_id: leaf.descriptor.id.clone(),
            updated_by: actor.to_string(),
            updated_at: at,
            previous_value: display_value(previous),
            new_value: display_value(&leaf.value),
            schema_path: Some(leaf.path.to_string()),
        });
        batch.writes.push(StagedWrite {
            path: leaf.path.clone(),
            value: leaf.value.clone(),
        });
        overlay.insert(leaf.path.as_str(), &leaf.value);
    }
    batch
}

fn enter(scope: &Scope, state: BatchState) {
    debug!(%scope, ?state, "update batch");
}

fn failed(scope: &Scope, from: BatchState, err: BrsrError) -> BrsrError {
    debug!(%scope, ?from, state = ?BatchState::Failed, kind = err.kind(), error = %err, "update batch");
    err
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
