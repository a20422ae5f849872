//! Per-role question visibility.

use crate::catalog::{snake_key, Catalog};
use crate::error::{BrsrError, Result};
use crate::scope::Scope;
use crate::store::PermissionStore;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

/// The acting principal, as supplied by the identity provider.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Actor {
    pub user_id: String,
    pub roles: Vec<String>,
}

impl Actor {
    pub fn new(user_id: impl Into<String>, roles: impl IntoIterator<Item = impl Into<String>>) -> Self {
        Self {
            user_id: user_id.into(),
            roles: roles.into_iter().map(Into::into).collect(),
        }
    }
}

/// Grants for one role in one scope. Keys are question ids or module keys.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RolePermissionSet {
    pub scope: Scope,
    pub role: String,
    #[serde(default)]
    pub grants: BTreeMap<String, bool>,
}

impl RolePermissionSet {
    pub fn new(scope: Scope, role: impl Into<String>) -> Self {
        Self {
            scope,
            role: role.into(),
            grants: BTreeMap::new(),
        }
    }

    pub fn grant(mut self, key: impl Into<String>, allowed: bool) -> Self {
        self.grants.insert(key.into(), allowed);
        self
    }

    /// Every grant key must name a question or a module.
    pub fn validate(&self, catalog: &Catalog) -> Result<()> {
        let modules = catalog.module_keys();
        for key in self.grants.keys() {
            if catalog.get(key).is_none() && !modules.contains(&snake_key(key)) {
                return Err(BrsrError::UnknownQuestion(key.clone()));
            }
        }
        Ok(())
    }

    /// Question ids this role may read and write.
    ///
    /// Module grants cover every question of the module, composite grants
    /// cover their subcomponents, and a question-level `false` wins over a
    /// module grant.
    pub fn accessible_questions(&self, catalog: &Catalog) -> BTreeSet<String> {
        let mut allowed = BTreeSet::new();
        let mut denied = BTreeSet::new();
        for (key, &flag) in &self.grants {
            match catalog.get(key) {
                Some(q) => {
                    let target = if flag { &mut allowed } else { &mut denied };
                    target.insert(q.id.clone());
                    target.extend(q.subcomponents().iter().cloned());
                }
                None if flag => {
                    let module = snake_key(key);
                    allowed.extend(catalog.by_module(&module).map(|q| q.id.clone()));
                }
                None => {}
            }
        }
        allowed.retain(|id| !denied.contains(id));
        allowed
    }
}

/// Union of what each of `roles` may access in `scope`.
pub async fn accessible_for_roles(
    store: &dyn PermissionStore,
    scope: &Scope,
    roles: &[String],
    catalog: &Catalog,
) -> Result<BTreeSet<String>> {
    let mut all = BTreeSet::new();
    for role in roles {
        all.extend(store.accessible_questions(scope, role, catalog).await?);
    }
    Ok(all)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
