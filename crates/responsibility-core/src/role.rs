use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

/// A named responsibility actor such as `PX`, `PM1`, or the contract party `C`.
#[derive(Debug, Clone, Serialize, Deserialize, Eq, PartialEq, Hash)]
#[serde(rename_all = "camelCase")]
pub struct Role {
    pub key: String,
    pub label: String,
    #[serde(default)]
    pub color_token: String,
}

impl Role {
    #[must_use]
    pub fn new(
        key: impl Into<String>,
        label: impl Into<String>,
        color_token: impl Into<String>,
    ) -> Self {
        Self {
            key: key.into(),
            label: label.into(),
            color_token: color_token.into(),
        }
    }
}

/// Catalog of project and contract roles plus the user-toggleable set of active project roles.
///
/// The catalogs are immutable once loaded. Only the active set changes, and listing is a pure
/// function of the catalog and that set.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RoleRegistry {
    project_roles: Vec<Role>,
    contract_roles: Vec<Role>,
    active: BTreeSet<String>,
}

impl RoleRegistry {
    /// Build a registry with every project role active. Blank and repeated keys are dropped,
    /// keeping the first occurrence.
    #[must_use]
    pub fn new(project_roles: Vec<Role>, contract_roles: Vec<Role>) -> Self {
        let project_roles = dedupe(project_roles);
        let contract_roles = dedupe(contract_roles);
        let active = project_roles.iter().map(|role| role.key.clone()).collect();
        Self {
            project_roles,
            contract_roles,
            active,
        }
    }

    /// Replace the active set with `keys`. Keys that name no project role are ignored.
    #[must_use]
    pub fn with_active_keys<I, S>(mut self, keys: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let wanted = keys
            .into_iter()
            .map(|key| key.as_ref().trim().to_string())
            .collect::<BTreeSet<_>>();
        self.active = self
            .project_roles
            .iter()
            .filter(|role| wanted.contains(&role.key))
            .map(|role| role.key.clone())
            .collect();
        self
    }

    #[must_use]
    pub fn list_project_roles(&self, active_only: bool) -> Vec<&Role> {
        self.project_roles
            .iter()
            .filter(|role| !active_only || self.active.contains(&role.key))
            .collect()
    }

    #[must_use]
    pub fn list_contract_roles(&self) -> &[Role] {
        &self.contract_roles
    }

    /// Toggle one project role. Returns `false` when `key` is not a project role.
    pub fn set_role_active(&mut self, key: &str, enabled: bool) -> bool {
        if self.project_role(key).is_none() {
            return false;
        }
        if enabled {
            self.active.insert(key.to_string());
        } else {
            self.active.remove(key);
        }
        true
    }

    #[must_use]
    pub fn is_active(&self, key: &str) -> bool {
        self.active.contains(key)
    }

    #[must_use]
    pub fn project_role(&self, key: &str) -> Option<&Role> {
        self.project_roles.iter().find(|role| role.key == key)
    }

    /// Look a key up in the project catalog first, then the contract catalog.
    #[must_use]
    pub fn role(&self, key: &str) -> Option<&Role> {
        self.project_role(key)
            .or_else(|| self.contract_roles.iter().find(|role| role.key == key))
    }

    #[must_use]
    pub fn is_known(&self, key: &str) -> bool {
        self.role(key).is_some()
    }

    pub fn project_role_keys(&self) -> impl Iterator<Item = &str> {
        self.project_roles.iter().map(|role| role.key.as_str())
    }
}

fn dedupe(roles: Vec<Role>) -> Vec<Role> {
    let mut seen = BTreeSet::new();
    roles
        .into_iter()
        .filter(|role| !role.key.trim().is_empty() && seen.insert(role.key.clone()))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn registry() -> RoleRegistry {
        RoleRegistry::new(
            vec![
                Role::new("PX", "Project Executive", "purple"),
                Role::new("PM1", "Senior Project Manager", "blue"),
                Role::new("SUP", "Superintendent", "green"),
            ],
            vec![
                Role::new("C", "Contractor", "gray"),
                Role::new("S", "Subcontractor", "gray"),
            ],
        )
    }

    fn keys(roles: &[&Role]) -> Vec<String> {
        roles.iter().map(|role| role.key.clone()).collect()
    }

    #[test]
    fn all_project_roles_start_active_in_catalog_order() {
        let registry = registry();
        assert_eq!(
            keys(&registry.list_project_roles(true)),
            vec!["PX", "PM1", "SUP"]
        );
    }

    #[test]
    fn active_filter_is_pure_over_catalog_and_active_set() {
        let registry = registry().with_active_keys(["SUP", "PX", "NOPE"]);
        assert_eq!(keys(&registry.list_project_roles(true)), vec!["PX", "SUP"]);
        assert_eq!(
            keys(&registry.list_project_roles(false)),
            vec!["PX", "PM1", "SUP"]
        );
    }

    #[test]
    fn toggling_unknown_role_is_ignored() {
        let mut registry = registry();
        assert!(!registry.set_role_active("C", false));
        assert!(registry.set_role_active("PM1", false));
        assert!(!registry.is_active("PM1"));
        assert!(registry.set_role_active("PM1", true));
        assert!(registry.is_active("PM1"));
    }

    #[test]
    fn missing_source_data_yields_empty_sequences() {
        let registry = RoleRegistry::default();
        assert!(registry.list_project_roles(false).is_empty());
        assert!(registry.list_contract_roles().is_empty());
    }

    #[test]
    fn duplicate_and_blank_keys_keep_first_occurrence() {
        let registry = RoleRegistry::new(
            vec![
                Role::new("PX", "First", ""),
                Role::new("PX", "Second", ""),
                Role::new(" ", "Blank", ""),
            ],
            Vec::new(),
        );
        let roles = registry.list_project_roles(false);
        assert_eq!(roles.len(), 1);
        assert_eq!(roles[0].label, "First");
    }

    #[test]
    fn contract_roles_are_known_but_not_project_roles() {
        let registry = registry();
        assert!(registry.is_known("C"));
        assert!(registry.project_role("C").is_none());
        let label = registry.role("S").map(|role| role.label.as_str());
        assert_eq!(label, Some("Subcontractor"));
    }
}
