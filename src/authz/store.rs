//! Read-only snapshot of the per-group whitelists.

use std::collections::HashMap;

use crate::config::{AccessRule, Permissions, RbacConfig};

/// Immutable store of group permissions, built once at startup from the
/// `rbac` section of the configuration and shared by every request.
#[derive(Debug, Default)]
pub struct PolicyStore {
    groups: HashMap<String, Permissions>,
}

impl PolicyStore {
    pub fn new(rbac: RbacConfig) -> Self {
        Self {
            groups: rbac.groups,
        }
    }

    /// Index rules for the listed groups, concatenated in input order.
    ///
    /// Groups absent from the store contribute nothing; duplicates are
    /// kept, the evaluator treats the list as a set.
    pub fn indices_for(&self, groups: &[String]) -> Vec<AccessRule> {
        groups
            .iter()
            .filter_map(|group| self.groups.get(group))
            .flat_map(|permissions| permissions.whitelisted_indices.iter().cloned())
            .collect()
    }

    /// API rules for the listed groups, concatenated in input order.
    pub fn apis_for(&self, groups: &[String]) -> Vec<AccessRule> {
        groups
            .iter()
            .filter_map(|group| self.groups.get(group))
            .flat_map(|permissions| permissions.whitelisted_apis.iter().cloned())
            .collect()
    }

    /// Whether any of the listed groups carries the legacy dashboard-admin
    /// flag. Not consulted on the request path; kept for deployments that
    /// gate dashboard-admin routes on it.
    #[allow(dead_code)]
    pub fn can_manage(&self, groups: &[String]) -> bool {
        groups
            .iter()
            .any(|group| self.groups.get(group).is_some_and(|p| p.can_manage))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store() -> PolicyStore {
        let rbac: RbacConfig = serde_yaml::from_str(
            r#"
groups:
  analysts:
    whitelisted_indices:
      - name: logs-web
        rest_verbs: [GET, POST]
      - name: logs-db
        rest_verbs: [GET]
    whitelisted_apis:
      - name: _search
        rest_verbs: [GET]
  ops:
    can_manage: true
    whitelisted_indices:
      - name: metrics-*
        rest_verbs: [GET]
"#,
        )
        .unwrap();
        PolicyStore::new(rbac)
    }

    fn names(rules: &[AccessRule]) -> Vec<&str> {
        rules.iter().map(|r| r.name.as_str()).collect()
    }

    #[test]
    fn test_indices_concatenate_in_group_order() {
        let store = store();

        let rules = store.indices_for(&["analysts".into(), "ops".into()]);
        assert_eq!(names(&rules), vec!["logs-web", "logs-db", "metrics-*"]);

        let rules = store.indices_for(&["ops".into(), "analysts".into()]);
        assert_eq!(names(&rules), vec!["metrics-*", "logs-web", "logs-db"]);
    }

    #[test]
    fn test_unknown_groups_contribute_nothing() {
        let store = store();

        let rules = store.indices_for(&["ghosts".into(), "analysts".into()]);
        assert_eq!(names(&rules), vec!["logs-web", "logs-db"]);

        assert!(store.indices_for(&[]).is_empty());
        assert!(store.apis_for(&["ghosts".into()]).is_empty());
    }

    #[test]
    fn test_apis_for_lists_api_rules() {
        let store = store();

        let rules = store.apis_for(&["analysts".into()]);
        assert_eq!(names(&rules), vec!["_search"]);
    }

    #[test]
    fn test_can_manage_when_any_group_has_it() {
        let store = store();

        assert!(store.can_manage(&["analysts".into(), "ops".into()]));
        assert!(!store.can_manage(&["analysts".into()]));
        assert!(!store.can_manage(&["ghosts".into()]));
    }
}
