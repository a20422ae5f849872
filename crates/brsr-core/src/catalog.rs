//! Static question catalog.
//!
//! Maps every disclosure question id to its owning module, section and
//! principle, and to the dot-path that locates its value inside a report
//! document. Composite questions (gender × category breakdowns and the like)
//! carry a composite path plus the ids of their subcomponents; every
//! subcomponent is an atomic question of its own.
//!
//! The catalog is loaded once and shared read-only (`Arc<Catalog>`).

use crate::error::{BrsrError, Result};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::fmt;
use std::path::Path;

const BUILTIN_CATALOG: &str = include_str!("../catalog/brsr.yaml");

// ---------------------------------------------------------------------------
// Section
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Section {
    A,
    B,
    C,
}

impl Section {
    /// Top-level key of this section in report documents and counters.
    pub fn key(self) -> &'static str {
        match self {
            Section::A => "section_a",
            Section::B => "section_b",
            Section::C => "section_c",
        }
    }
}

impl fmt::Display for Section {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.key())
    }
}

// ---------------------------------------------------------------------------
// ValueKind
// ---------------------------------------------------------------------------

/// Storage type expected at a question's leaf.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ValueKind {
    Integer,
    Decimal,
    Text,
    Boolean,
    List,
    Object,
    Any,
}

impl ValueKind {
    pub fn as_str(self) -> &'static str {
        match self {
            ValueKind::Integer => "integer",
            ValueKind::Decimal => "decimal",
            ValueKind::Text => "text",
            ValueKind::Boolean => "boolean",
            ValueKind::List => "list",
            ValueKind::Object => "object",
            ValueKind::Any => "any",
        }
    }
}

impl fmt::Display for ValueKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// SchemaPath
// ---------------------------------------------------------------------------

/// Dot-delimited address of a value inside a report document,
/// e.g. `section_a.employees.Q18a.permanent_employees.male`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct SchemaPath(String);

impl SchemaPath {
    pub fn parse(path: &str) -> Result<Self> {
        if path.is_empty() || path.split('.').any(|s| s.is_empty()) {
            return Err(BrsrError::InvalidCatalog(format!(
                "schema path '{path}' has an empty segment"
            )));
        }
        if path.split('.').count() < 2 {
            return Err(BrsrError::InvalidCatalog(format!(
                "schema path '{path}' must name a section and a field"
            )));
        }
        Ok(Self(path.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn segments(&self) -> impl Iterator<Item = &str> {
        self.0.split('.')
    }

    /// First segment, i.e. the section key.
    pub fn root(&self) -> &str {
        self.0.split('.').next().unwrap_or_default()
    }

    /// Segments of `self` below `base`, or `None` when `self` is not strictly
    /// under `base`.
    pub fn relative_to(&self, base: &SchemaPath) -> Option<Vec<&str>> {
        let rest = self.0.strip_prefix(base.as_str())?.strip_prefix('.')?;
        Some(rest.split('.').collect())
    }

    /// Every proper ancestor path (`a`, `a.b` for `a.b.c`).
    fn ancestors(&self) -> Vec<&str> {
        self.0
            .match_indices('.')
            .map(|(i, _)| &self.0[..i])
            .collect()
    }
}

impl TryFrom<String> for SchemaPath {
    type Error = BrsrError;

    fn try_from(value: String) -> Result<Self> {
        SchemaPath::parse(&value)
    }
}

impl From<SchemaPath> for String {
    fn from(value: SchemaPath) -> Self {
        value.0
    }
}

impl fmt::Display for SchemaPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

// ---------------------------------------------------------------------------
// QuestionDescriptor
// ---------------------------------------------------------------------------

/// Where a question's answer lives in the document.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Shape {
    Atomic {
        schema_path: SchemaPath,
    },
    Composite {
        schema_path_composite: SchemaPath,
        subcomponents: Vec<String>,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RawDescriptor")]
pub struct QuestionDescriptor {
    pub id: String,
    pub module: String,
    pub sub_module: String,
    pub section: Section,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sub_section: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub principle: Option<String>,
    pub description: String,
    #[serde(flatten)]
    pub shape: Shape,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub value_type: Option<ValueKind>,
}

impl QuestionDescriptor {
    pub fn is_composite(&self) -> bool {
        matches!(self.shape, Shape::Composite { .. })
    }

    /// Leaf path for atomic questions.
    pub fn schema_path(&self) -> Option<&SchemaPath> {
        match &self.shape {
            Shape::Atomic { schema_path } => Some(schema_path),
            Shape::Composite { .. } => None,
        }
    }

    /// Path of the value subtree: the leaf for atomic questions, the composite
    /// root for composite ones.
    pub fn value_path(&self) -> &SchemaPath {
        match &self.shape {
            Shape::Atomic { schema_path } => schema_path,
            Shape::Composite {
                schema_path_composite,
                ..
            } => schema_path_composite,
        }
    }

    pub fn subcomponents(&self) -> &[String] {
        match &self.shape {
            Shape::Atomic { .. } => &[],
            Shape::Composite { subcomponents, .. } => subcomponents,
        }
    }

    pub fn module_key(&self) -> String {
        snake_key(&self.module)
    }

    pub fn sub_module_key(&self) -> String {
        snake_key(&self.sub_module)
    }
}

#[derive(Debug, Deserialize)]
struct RawDescriptor {
    id: String,
    module: String,
    sub_module: String,
    section: Section,
    #[serde(default)]
    sub_section: Option<String>,
    #[serde(default)]
    principle: Option<String>,
    #[serde(default)]
    description: String,
    #[serde(default)]
    schema_path: Option<SchemaPath>,
    #[serde(default)]
    schema_path_composite: Option<SchemaPath>,
    #[serde(default)]
    subcomponents: Option<Vec<String>>,
    #[serde(default)]
    value_type: Option<ValueKind>,
}

impl TryFrom<RawDescriptor> for QuestionDescriptor {
    type Error = String;

    fn try_from(raw: RawDescriptor) -> std::result::Result<Self, Self::Error> {
        let id = raw.id;
        if id.trim().is_empty() {
            return Err("question id must not be empty".to_string());
        }
        let shape = match (raw.schema_path, raw.schema_path_composite, raw.subcomponents) {
            (Some(schema_path), None, None) => Shape::Atomic { schema_path },
            (None, Some(schema_path_composite), Some(subcomponents)) => {
                if subcomponents.is_empty() {
                    return Err(format!("composite question {id} has no subcomponents"));
                }
                Shape::Composite {
                    schema_path_composite,
                    subcomponents,
                }
            }
            (Some(_), Some(_), _) => {
                return Err(format!(
                    "question {id} declares both schema_path and schema_path_composite"
                ))
            }
            (None, Some(_), None) => {
                return Err(format!("composite question {id} has no subcomponents"))
            }
            (_, None, Some(_)) => {
                return Err(format!(
                    "question {id} lists subcomponents without schema_path_composite"
                ))
            }
            (None, None, None) => return Err(format!("question {id} has no schema_path")),
        };
        if raw.section == Section::C && raw.principle.is_none() {
            return Err(format!("section C question {id} has no principle"));
        }
        Ok(Self {
            id,
            module: raw.module,
            sub_module: raw.sub_module,
            section: raw.section,
            sub_section: raw.sub_section,
            principle: raw.principle,
            description: raw.description,
            shape,
            value_type: raw.value_type,
        })
    }
}

/// Lowercase snake_case key: `Employee Well-Being` → `employee_well_being`.
pub fn snake_key(label: &str) -> String {
    let mut out = String::with_capacity(label.len());
    for c in label.chars() {
        if c.is_ascii_alphanumeric() {
            out.push(c.to_ascii_lowercase());
        } else if !out.is_empty() && !out.ends_with('_') {
            out.push('_');
        }
    }
    while out.ends_with('_') {
        out.pop();
    }
    out
}

// ---------------------------------------------------------------------------
// Catalog
// ---------------------------------------------------------------------------

/// Id-prefix typing rule for question families (`Q18a_` → integer).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TypingRule {
    pub prefix: String,
    pub value_type: ValueKind,
}

#[derive(Debug, Deserialize)]
struct CatalogFile {
    version: u32,
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    typing: Vec<TypingRule>,
    questions: Vec<QuestionDescriptor>,
}

#[derive(Debug, Clone)]
pub struct Catalog {
    version: u32,
    name: Option<String>,
    typing: Vec<TypingRule>,
    questions: BTreeMap<String, QuestionDescriptor>,
    parents: HashMap<String, String>,
    depths: HashMap<String, usize>,
}

impl Catalog {
    /// The catalog compiled into the binary.
    pub fn builtin() -> Result<Self> {
        Self::from_yaml_str(BUILTIN_CATALOG)
    }

    pub fn load(path: &Path) -> Result<Self> {
        let data = std::fs::read_to_string(path)?;
        Self::from_yaml_str(&data)
    }

    pub fn from_yaml_str(data: &str) -> Result<Self> {
        let file: CatalogFile = serde_yaml::from_str(data)?;
        Self::build(file.version, file.name, file.typing, file.questions)
    }

    fn build(
        version: u32,
        name: Option<String>,
        mut typing: Vec<TypingRule>,
        list: Vec<QuestionDescriptor>,
    ) -> Result<Self> {
        let mut questions = BTreeMap::new();
        for q in list {
            let expected_root = q.section.key();
            if q.value_path().root() != expected_root {
                return Err(BrsrError::InvalidCatalog(format!(
                    "question {} is in section {:?} but its path '{}' is not under {expected_root}",
                    q.id,
                    q.section,
                    q.value_path()
                )));
            }
            if let Some(prev) = questions.insert(q.id.clone(), q) {
                return Err(BrsrError::InvalidCatalog(format!(
                    "duplicate question id {}",
                    prev.id
                )));
            }
        }

        let mut parents = HashMap::new();
        let mut depths = HashMap::new();
        for q in questions.values() {
            let Shape::Composite {
                schema_path_composite: base,
                subcomponents,
            } = &q.shape
            else {
                continue;
            };
            let mut depth = None;
            for sub_id in subcomponents {
                let sub = questions.get(sub_id).ok_or_else(|| {
                    BrsrError::InvalidCatalog(format!(
                        "composite {} lists unknown subcomponent {sub_id}",
                        q.id
                    ))
                })?;
                let leaf = sub.schema_path().ok_or_else(|| {
                    BrsrError::InvalidCatalog(format!(
                        "subcomponent {sub_id} of {} is itself composite",
                        q.id
                    ))
                })?;
                let keys = leaf.relative_to(base).ok_or_else(|| {
                    BrsrError::InvalidCatalog(format!(
                        "subcomponent {sub_id} path '{leaf}' is not under '{base}'"
                    ))
                })?;
                let expected_id = format!("{}_{}", q.id, keys.join("_"));
                if &expected_id != sub_id {
                    return Err(BrsrError::InvalidCatalog(format!(
                        "subcomponent {sub_id} of {} should be named {expected_id}",
                        q.id
                    )));
                }
                match depth {
                    None => depth = Some(keys.len()),
                    Some(d) if d != keys.len() => {
                        return Err(BrsrError::InvalidCatalog(format!(
                            "subcomponents of {} have mixed depths",
                            q.id
                        )))
                    }
                    Some(_) => {}
                }
                if let Some(other) = parents.insert(sub_id.clone(), q.id.clone()) {
                    return Err(BrsrError::InvalidCatalog(format!(
                        "subcomponent {sub_id} is claimed by both {other} and {}",
                        q.id
                    )));
                }
            }
            depths.insert(q.id.clone(), depth.unwrap_or(1));
        }

        // Leaf paths must be disjoint: no duplicates, no leaf nested in another.
        let mut leaf_paths: BTreeMap<&str, &str> = BTreeMap::new();
        for q in questions.values() {
            if let Some(path) = q.schema_path() {
                if let Some(other) = leaf_paths.insert(path.as_str(), q.id.as_str()) {
                    return Err(BrsrError::InvalidCatalog(format!(
                        "questions {other} and {} share path '{path}'",
                        q.id
                    )));
                }
            }
        }
        for q in questions.values() {
            if let Some(path) = q.schema_path() {
                for ancestor in path.ancestors() {
                    if let Some(other) = leaf_paths.get(ancestor) {
                        return Err(BrsrError::InvalidCatalog(format!(
                            "path of {} is nested under the leaf of {other}",
                            q.id
                        )));
                    }
                }
            }
        }

        typing.sort_by(|a, b| b.prefix.len().cmp(&a.prefix.len()));

        Ok(Self {
            version,
            name,
            typing,
            questions,
            parents,
            depths,
        })
    }

    pub fn version(&self) -> u32 {
        self.version
    }

    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    pub fn len(&self) -> usize {
        self.questions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.questions.is_empty()
    }

    pub fn get(&self, id: &str) -> Option<&QuestionDescriptor> {
        self.questions.get(id)
    }

    /// Like `get`, but an absent id is an `UnknownQuestion` error.
    pub fn descriptor(&self, id: &str) -> Result<&QuestionDescriptor> {
        self.get(id)
            .ok_or_else(|| BrsrError::UnknownQuestion(id.to_string()))
    }

    pub fn questions(&self) -> impl Iterator<Item = &QuestionDescriptor> {
        self.questions.values()
    }

    /// Atomic questions, i.e. every addressable leaf of a report.
    pub fn leaves(&self) -> impl Iterator<Item = &QuestionDescriptor> {
        self.questions.values().filter(|q| !q.is_composite())
    }

    /// Composite question owning `id`, if `id` is a subcomponent.
    pub fn parent_of(&self, id: &str) -> Option<&QuestionDescriptor> {
        self.parents.get(id).and_then(|p| self.questions.get(p))
    }

    /// Nesting depth of a composite question's value (2 for category × sub-key).
    pub fn composite_depth(&self, id: &str) -> Option<usize> {
        self.depths.get(id).copied()
    }

    /// Questions whose module key (snake_case) equals `module_key`.
    pub fn by_module<'a>(
        &'a self,
        module_key: &'a str,
    ) -> impl Iterator<Item = &'a QuestionDescriptor> + 'a {
        self.questions
            .values()
            .filter(move |q| q.module_key() == module_key)
    }

    /// Distinct module keys in the catalog.
    pub fn module_keys(&self) -> BTreeSet<String> {
        self.questions.values().map(|q| q.module_key()).collect()
    }

    /// Storage type for a question: its own `value_type`, else the longest
    /// matching family prefix, else `Any`.
    pub fn value_kind(&self, q: &QuestionDescriptor) -> ValueKind {
        if let Some(kind) = q.value_type {
            return kind;
        }
        self.typing
            .iter()
            .find(|rule| q.id.starts_with(&rule.prefix))
            .map(|rule| rule.value_type)
            .unwrap_or(ValueKind::Any)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
