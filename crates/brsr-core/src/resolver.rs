//! Question id → document location.
//!
//! Atomic questions resolve to one leaf path. Composite questions resolve to
//! their composite root plus the leaf of every declared subcomponent, and a
//! submitted breakdown is expanded into one [`LeafUpdate`] per leaf it
//! touches.

use crate::catalog::{Catalog, QuestionDescriptor, SchemaPath};
use crate::error::{BrsrError, Result};
use crate::value::AnswerValue;
use serde::Serialize;
use serde_json::Value;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum QuestionKind {
    Atomic,
    Composite,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Subcomponent {
    pub id: String,
    /// Category / sub-key path below the composite root.
    pub keys: Vec<String>,
    pub path: SchemaPath,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Resolution {
    pub question_id: String,
    pub kind: QuestionKind,
    pub path: SchemaPath,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub subcomponents: Vec<Subcomponent>,
}

/// One atomic write target derived from a submitted update.
#[derive(Debug, Clone)]
pub struct LeafUpdate<'c> {
    pub descriptor: &'c QuestionDescriptor,
    pub path: &'c SchemaPath,
    pub raw: Value,
}

pub struct PathResolver<'c> {
    catalog: &'c Catalog,
}

impl<'c> PathResolver<'c> {
    pub fn new(catalog: &'c Catalog) -> Self {
        Self { catalog }
    }

    pub fn resolve(&self, question_id: &str) -> Result<Resolution> {
        let q = self.catalog.descriptor(question_id)?;
        if !q.is_composite() {
            return Ok(Resolution {
                question_id: q.id.clone(),
                kind: QuestionKind::Atomic,
                path: q.value_path().clone(),
                subcomponents: Vec::new(),
            });
        }
        let base = q.value_path();
        let mut subcomponents = Vec::with_capacity(q.subcomponents().len());
        for sub_id in q.subcomponents() {
            let sub = self.catalog.descriptor(sub_id)?;
            let Some(path) = sub.schema_path() else {
                continue;
            };
            let keys = path
                .relative_to(base)
                .unwrap_or_default()
                .into_iter()
                .map(str::to_string)
                .collect();
            subcomponents.push(Subcomponent {
                id: sub.id.clone(),
                keys,
                path: path.clone(),
            });
        }
        Ok(Resolution {
            question_id: q.id.clone(),
            kind: QuestionKind::Composite,
            path: base.clone(),
            subcomponents,
        })
    }

    /// Expand one `(question_id, value)` pair into leaf updates.
    ///
    /// A composite value must be a breakdown of the composite's depth; each
    /// `parent_key1_key2` id built from it must be a declared subcomponent
    /// whose path below the composite is exactly those keys.
    pub fn expand(&self, question_id: &str, value: Value) -> Result<Vec<LeafUpdate<'c>>> {
        let q = self.catalog.descriptor(question_id)?;
        if let Some(path) = q.schema_path() {
            return Ok(vec![LeafUpdate {
                descriptor: q,
                path,
                raw: value,
            }]);
        }

        let depth = self.catalog.composite_depth(&q.id).unwrap_or(2);
        let AnswerValue::Breakdown(entries) = AnswerValue::breakdown(&q.id, value, depth)? else {
            return Err(BrsrError::MalformedCompositeValue {
                question_id: q.id.clone(),
                reason: "expected a breakdown".to_string(),
            });
        };

        let mut leaves = Vec::with_capacity(entries.len());
        for entry in entries {
            let sub_id = format!("{}_{}", q.id, entry.keys.join("_"));
            let sub = self
                .catalog
                .get(&sub_id)
                .filter(|sub| q.subcomponents().iter().any(|id| id == &sub.id))
                .and_then(|sub| sub.schema_path().map(|path| (sub, path)))
                .filter(|(_, path)| {
                    path.relative_to(q.value_path())
                        .is_some_and(|keys| keys == entry.keys)
                });
            let Some((sub, path)) = sub else {
                return Err(BrsrError::UnknownSubcomponent {
                    question_id: q.id.clone(),
                    subcomponent: sub_id,
                });
            };
            leaves.push(LeafUpdate {
                descriptor: sub,
                path,
                raw: entry.value,
            });
        }
        Ok(leaves)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::sample_catalog;
    use serde_json::json;

    #[test]
    fn atomic_resolves_to_its_leaf() {
        let catalog = sample_catalog();
        let r = PathResolver::new(&catalog).resolve("Q1_A").unwrap();
        assert_eq!(r.kind, QuestionKind::Atomic);
        assert_eq!(r.path.as_str(), "section_a.entity_details.Q1_A");
        assert!(r.subcomponents.is_empty());
    }

    #[test]
    fn composite_resolves_with_subcomponent_keys() {
        let catalog = sample_catalog();
        let r = PathResolver::new(&catalog).resolve("Q18a").unwrap();
        assert_eq!(r.kind, QuestionKind::Composite);
        assert_eq!(r.path.as_str(), "section_a.employees.Q18a");
        assert_eq!(r.subcomponents.len(), 4);
        let first = &r.subcomponents[0];
        assert_eq!(first.id, "Q18a_permanent_employees_male");
        assert_eq!(first.keys, vec!["permanent_employees", "male"]);
    }

    #[test]
    fn unknown_id_fails() {
        let catalog = sample_catalog();
        let err = PathResolver::new(&catalog).resolve("Q404").unwrap_err();
        assert!(matches!(err, BrsrError::UnknownQuestion(id) if id == "Q404"));
    }

    #[test]
    fn composite_value_expands_to_declared_leaves() {
        let catalog = sample_catalog();
        let leaves = PathResolver::new(&catalog)
            .expand(
                "Q18a",
                json!({"permanent_employees": {"male": 5, "female": 4}}),
            )
            .unwrap();
        let ids: Vec<_> = leaves.iter().map(|l| l.descriptor.id.as_str()).collect();
        assert_eq!(
            ids,
            vec![
                "Q18a_permanent_employees_female",
                "Q18a_permanent_employees_male"
            ]
        );
        assert_eq!(
            leaves[1].path.as_str(),
            "section_a.employees.Q18a.permanent_employees.male"
        );
        assert_eq!(leaves[1].raw, json!(5));
    }

    #[test]
    fn undeclared_combination_is_unknown_subcomponent() {
        let catalog = sample_catalog();
        let err = PathResolver::new(&catalog)
            .expand("Q18a", json!({"interns": {"male": 1}}))
            .unwrap_err();
        match err {
            BrsrError::UnknownSubcomponent {
                question_id,
                subcomponent,
            } => {
                assert_eq!(question_id, "Q18a");
                assert_eq!(subcomponent, "Q18a_interns_male");
            }
            other => panic!("expected UnknownSubcomponent, got {other:?}"),
        }
    }

    #[test]
    fn regrouped_keys_are_unknown_subcomponent() {
        let catalog = sample_catalog();
        let err = PathResolver::new(&catalog)
            .expand("Q18a", json!({"permanent": {"employees_male": 5}}))
            .unwrap_err();
        match err {
            BrsrError::UnknownSubcomponent {
                question_id,
                subcomponent,
            } => {
                assert_eq!(question_id, "Q18a");
                assert_eq!(subcomponent, "Q18a_permanent_employees_male");
            }
            other => panic!("expected UnknownSubcomponent, got {other:?}"),
        }
    }

    #[test]
    fn partial_key_is_unknown_subcomponent() {
        let catalog = sample_catalog();
        let err = PathResolver::new(&catalog)
            .expand("Q19", json!({"board": 1}))
            .unwrap_err();
        assert!(matches!(err, BrsrError::UnknownSubcomponent { .. }));
    }

    #[test]
    fn scalar_for_composite_is_malformed() {
        let catalog = sample_catalog();
        let err = PathResolver::new(&catalog).expand("Q18a", json!(5)).unwrap_err();
        assert!(matches!(err, BrsrError::MalformedCompositeValue { .. }));
    }

    #[test]
    fn single_level_composite_expands() {
        let catalog = sample_catalog();
        let leaves = PathResolver::new(&catalog)
            .expand("Q19", json!({"board_women": 30.5}))
            .unwrap();
        assert_eq!(leaves.len(), 1);
        assert_eq!(leaves[0].descriptor.id, "Q19_board_women");
    }

    #[test]
    fn subcomponent_can_be_addressed_directly() {
        let catalog = sample_catalog();
        let leaves = PathResolver::new(&catalog)
            .expand("Q18a_contractual_workers_female", json!(2))
            .unwrap();
        assert_eq!(leaves.len(), 1);
        assert_eq!(
            leaves[0].path.as_str(),
            "section_a.employees.Q18a.contractual_workers.female"
        );
    }
}
