//! Append-only action log per scope.
//!
//! Holds a copy of every question change-log entry plus generic actions
//! recorded by other parts of the system (report creation, permission
//! changes, employee administration).

use crate::document::ChangeLogEntry;
use crate::error::{BrsrError, Result};
use crate::scope::Scope;
use crate::store::AuditStore;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Arc;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionKind {
    ReportCreated,
    PermissionsChanged,
    EmployeeCreated,
    EmployeeUpdated,
    EmployeeRemoved,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActionRecord {
    pub kind: ActionKind,
    pub actor: String,
    pub at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target: Option<String>,
    #[serde(default, skip_serializing_if = "Value::is_null")]
    pub detail: Value,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum AuditEntry {
    Question(ChangeLogEntry),
    Action(ActionRecord),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuditLog {
    pub scope: Scope,
    pub entries: Vec<AuditEntry>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl AuditLog {
    pub fn new(scope: Scope, now: DateTime<Utc>) -> Self {
        Self {
            scope,
            entries: Vec::new(),
            created_at: now,
            updated_at: now,
        }
    }

    /// Push entries at the end; earlier entries are never touched.
    pub fn extend(&mut self, entries: Vec<AuditEntry>, now: DateTime<Utc>) {
        self.entries.extend(entries);
        self.updated_at = now;
    }
}

/// Read/append facade over an [`AuditStore`].
#[derive(Clone)]
pub struct AuditTrail {
    store: Arc<dyn AuditStore>,
}

impl AuditTrail {
    pub fn new(store: Arc<dyn AuditStore>) -> Self {
        Self { store }
    }

    /// Upsert by scope: the first append creates the log.
    pub async fn append(&self, scope: &Scope, entries: Vec<AuditEntry>) -> Result<()> {
        if entries.is_empty() {
            return Ok(());
        }
        self.store.append(scope, entries).await
    }

    /// Fails with `AuditLogNotFound` when nothing was ever appended.
    pub async fn get(&self, scope: &Scope) -> Result<AuditLog> {
        self.store
            .get(scope)
            .await?
            .ok_or_else(|| BrsrError::AuditLogNotFound(scope.to_string()))
    }

    /// Like `get`, but a missing log reads as empty history.
    pub async fn history(&self, scope: &Scope) -> Result<AuditLog> {
        match self.get(scope).await {
            Err(BrsrError::AuditLogNotFound(_)) => Ok(AuditLog::new(scope.clone(), Utc::now())),
            other => other,
        }
    }

    pub async fn record(
        &self,
        scope: &Scope,
        kind: ActionKind,
        actor: &str,
        target: Option<String>,
        detail: Value,
    ) -> Result<()> {
        let entry = AuditEntry::Action(ActionRecord {
            kind,
            actor: actor.to_string(),
            at: Utc::now(),
            target,
            detail,
        });
        self.append(scope, vec![entry]).await
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
