use crate::catalog::{Catalog, SchemaPath};
use crate::scope::Scope;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use uuid::Uuid;

static NULL: Value = Value::Null;

// ---------------------------------------------------------------------------
// ChangeLogEntry
// ---------------------------------------------------------------------------

/// One leaf mutation. Immutable once appended.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChangeLogEntry {
    pub question_id: String,
    pub updated_by: String,
    pub updated_at: DateTime<Utc>,
    pub previous_value: Option<String>,
    pub new_value: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub schema_path: Option<String>,
}

/// A field write staged against a document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StagedWrite {
    pub path: SchemaPath,
    pub value: Value,
}

// ---------------------------------------------------------------------------
// ReportDocument
// ---------------------------------------------------------------------------

/// The answers of one scope, plus the change log of every leaf mutation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReportDocument {
    pub id: Uuid,
    pub scope: Scope,
    /// Bumped on every commit; commits are conditional on it.
    pub revision: u64,
    pub answers: Value,
    #[serde(default)]
    pub updates: Vec<ChangeLogEntry>,
    pub created_at: DateTime<Utc>,
    pub created_by: String,
    pub updated_at: DateTime<Utc>,
    pub updated_by: String,
}

impl ReportDocument {
    /// A fresh report with every catalog leaf present and null.
    pub fn empty(scope: Scope, catalog: &Catalog, actor: &str, now: DateTime<Utc>) -> Self {
        let mut doc = Self {
            id: Uuid::new_v4(),
            scope,
            revision: 0,
            answers: Value::Object(Map::new()),
            updates: Vec::new(),
            created_at: now,
            created_by: actor.to_string(),
            updated_at: now,
            updated_by: actor.to_string(),
        };
        for q in catalog.leaves() {
            if let Some(path) = q.schema_path() {
                doc.set(path, Value::Null);
            }
        }
        doc
    }

    /// Value stored at `path`; missing paths read as null.
    pub fn value_at(&self, path: &SchemaPath) -> &Value {
        lookup(&self.answers, path).unwrap_or(&NULL)
    }

    /// Set the value at `path`, creating intermediate objects as needed.
    pub fn set(&mut self, path: &SchemaPath, value: Value) {
        let segments: Vec<&str> = path.segments().collect();
        set_path(&mut self.answers, &segments, value);
    }

    /// Apply a committed batch: field writes, change-log entries, revision bump.
    pub fn apply(
        &mut self,
        writes: &[StagedWrite],
        entries: &[ChangeLogEntry],
        actor: &str,
        at: DateTime<Utc>,
    ) {
        for write in writes {
            self.set(&write.path, write.value.clone());
        }
        self.updates.extend_from_slice(entries);
        self.revision += 1;
        self.updated_at = at;
        self.updated_by = actor.to_string();
    }
}

/// Walk `root` along `path`.
pub fn lookup<'v>(root: &'v Value, path: &SchemaPath) -> Option<&'v Value> {
    path.segments()
        .try_fold(root, |node, segment| node.as_object()?.get(segment))
}

pub(crate) fn set_path(node: &mut Value, segments: &[&str], value: Value) {
    let Some((first, rest)) = segments.split_first() else {
        *node = value;
        return;
    };
    if !node.is_object() {
        *node = Value::Object(Map::new());
    }
    if let Value::Object(map) = node {
        let child = map.entry(first.to_string()).or_insert(Value::Null);
        set_path(child, rest, value);
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{sample_catalog, sample_scope};
    use serde_json::json;

    fn path(p: &str) -> SchemaPath {
        SchemaPath::parse(p).unwrap()
    }

    #[test]
    fn empty_document_has_every_leaf_null() {
        let catalog = sample_catalog();
        let doc = ReportDocument::empty(sample_scope(), &catalog, "u1", Utc::now());
        assert_eq!(doc.revision, 0);
        assert_eq!(
            doc.answers["section_a"]["employees"]["Q18a"]["permanent_employees"]["male"],
            Value::Null
        );
        assert!(doc.answers["section_a"]["employees"]["Q18a"]["permanent_employees"]
            .as_object()
            .unwrap()
            .contains_key("female"));
        assert!(doc.answers["section_c"]["principle_6"]
            .as_object()
            .unwrap()
            .contains_key("Q1_P6"));
    }

    #[test]
    fn value_at_missing_path_is_null() {
        let catalog = sample_catalog();
        let doc = ReportDocument::empty(sample_scope(), &catalog, "u1", Utc::now());
        assert_eq!(doc.value_at(&path("section_b.nothing.here")), &Value::Null);
    }

    #[test]
    fn set_creates_intermediates_and_replaces_scalars() {
        let catalog = sample_catalog();
        let mut doc = ReportDocument::empty(sample_scope(), &catalog, "u1", Utc::now());
        doc.set(&path("section_b.policy.Q1_B"), json!("yes"));
        assert_eq!(doc.value_at(&path("section_b.policy.Q1_B")), &json!("yes"));

        doc.set(&path("section_a.entity_details.Q1_A"), json!("Acme Ltd"));
        assert_eq!(
            doc.answers["section_a"]["entity_details"]["Q1_A"],
            json!("Acme Ltd")
        );
    }

    #[test]
    fn apply_bumps_revision_and_appends_log() {
        let catalog = sample_catalog();
        let mut doc = ReportDocument::empty(sample_scope(), &catalog, "u1", Utc::now());
        let at = Utc::now();
        let entry = ChangeLogEntry {
            question_id: "Q3_A".into(),
            updated_by: "u2".into(),
            updated_at: at,
            previous_value: None,
            new_value: Some("1990".into()),
            schema_path: Some("section_a.entity_details.Q3_A".into()),
        };
        doc.apply(
            &[StagedWrite {
                path: path("section_a.entity_details.Q3_A"),
                value: json!(1990),
            }],
            &[entry.clone()],
            "u2",
            at,
        );
        assert_eq!(doc.revision, 1);
        assert_eq!(doc.updates, vec![entry]);
        assert_eq!(doc.updated_by, "u2");
        assert_eq!(doc.value_at(&path("section_a.entity_details.Q3_A")), &json!(1990));
    }

    #[test]
    fn document_survives_json_roundtrip() {
        let catalog = sample_catalog();
        let doc = ReportDocument::empty(sample_scope(), &catalog, "u1", Utc::now());
        let text = serde_json::to_string(&doc).unwrap();
        let back: ReportDocument = serde_json::from_str(&text).unwrap();
        assert_eq!(back, doc);
    }
}
