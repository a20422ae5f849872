//! Answered/total tallies per section, principle and module.
//!
//! Every leaf question contributes to three counters: its sub-section (or
//! principle, for section C), its section total, and its module/sub-module.
//! Counters move by deltas during updates and can be rebuilt from a
//! document when they drift.

use crate::catalog::{snake_key, Catalog, QuestionDescriptor, Section};
use crate::document::{set_path, ReportDocument};
use crate::scope::Scope;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use std::collections::BTreeMap;

// ---------------------------------------------------------------------------
// Delta
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Delta {
    Answered,
    Cleared,
    Unchanged,
}

impl Delta {
    pub fn value(self) -> i64 {
        match self {
            Delta::Answered => 1,
            Delta::Cleared => -1,
            Delta::Unchanged => 0,
        }
    }
}

/// null → value is +1, value → null is −1, anything else is 0.
pub fn delta(previous: &Value, new: &Value) -> Delta {
    match (previous.is_null(), new.is_null()) {
        (true, false) => Delta::Answered,
        (false, true) => Delta::Cleared,
        _ => Delta::Unchanged,
    }
}

/// The counters a leaf question contributes to.
pub fn counter_paths(q: &QuestionDescriptor) -> [String; 3] {
    let section = q.section.key();
    let local = match q.section {
        Section::C => format!(
            "{section}.principles.{}",
            snake_key(q.principle.as_deref().unwrap_or("unassigned"))
        ),
        Section::A | Section::B => {
            let sub = q
                .sub_section
                .as_deref()
                .map(snake_key)
                .filter(|k| !k.is_empty())
                .unwrap_or_else(|| "others".to_string());
            format!("{section}.{sub}")
        }
    };
    [
        local,
        format!("{section}.total"),
        format!("modules.{}.{}", q.module_key(), q.sub_module_key()),
    ]
}

// ---------------------------------------------------------------------------
// CounterDeltas
// ---------------------------------------------------------------------------

/// Net counter changes accumulated over one batch.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CounterDeltas(BTreeMap<String, i64>);

impl CounterDeltas {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&mut self, q: &QuestionDescriptor, delta: Delta) {
        if delta == Delta::Unchanged {
            return;
        }
        for path in counter_paths(q) {
            self.add(&path, delta.value());
        }
    }

    pub fn add(&mut self, path: &str, by: i64) {
        let net = self.0.entry(path.to_string()).or_insert(0);
        *net += by;
        if *net == 0 {
            self.0.remove(path);
        }
    }

    pub fn get(&self, path: &str) -> i64 {
        self.0.get(path).copied().unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, i64)> {
        self.0.iter().map(|(k, v)| (k.as_str(), *v))
    }
}

// ---------------------------------------------------------------------------
// ProgressCounters
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Tally {
    pub total_questions: u32,
    pub answered_questions: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProgressCounters {
    pub scope: Scope,
    pub counters: BTreeMap<String, Tally>,
    pub updated_at: DateTime<Utc>,
}

impl ProgressCounters {
    /// Totals from the catalog, nothing answered.
    pub fn initial(scope: Scope, catalog: &Catalog) -> Self {
        let mut counters: BTreeMap<String, Tally> = BTreeMap::new();
        for q in catalog.leaves() {
            for path in counter_paths(q) {
                counters.entry(path).or_default().total_questions += 1;
            }
        }
        Self {
            scope,
            counters,
            updated_at: Utc::now(),
        }
    }

    /// Rebuild from the stored answers.
    pub fn recompute(scope: Scope, catalog: &Catalog, doc: &ReportDocument) -> Self {
        let mut progress = Self::initial(scope, catalog);
        for q in catalog.leaves() {
            let Some(path) = q.schema_path() else {
                continue;
            };
            if doc.value_at(path).is_null() {
                continue;
            }
            for counter in counter_paths(q) {
                if let Some(tally) = progress.counters.get_mut(&counter) {
                    tally.answered_questions += 1;
                }
            }
        }
        progress
    }

    /// Apply net deltas. Answered counts never drop below zero.
    pub fn apply(&mut self, deltas: &CounterDeltas) {
        for (path, by) in deltas.iter() {
            let tally = self.counters.entry(path.to_string()).or_default();
            let next = i64::from(tally.answered_questions) + by;
            tally.answered_questions = u32::try_from(next.max(0)).unwrap_or(u32::MAX);
        }
        self.updated_at = Utc::now();
    }

    pub fn get(&self, path: &str) -> Option<Tally> {
        self.counters.get(path).copied()
    }

    /// Counters as a nested JSON tree, e.g.
    /// `{"section_a": {"employees": {"total_questions": 4, ...}}}`.
    pub fn tree(&self) -> Value {
        let mut root = Value::Object(Map::new());
        for (path, tally) in &self.counters {
            let segments: Vec<&str> = path.split('.').collect();
            set_path(
                &mut root,
                &segments,
                json!({
                    "total_questions": tally.total_questions,
                    "answered_questions": tally.answered_questions,
                }),
            );
        }
        root
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
