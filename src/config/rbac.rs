//! Per-group access rules.
//!
//! Each group names the index patterns and API patterns its members may
//! touch, and the HTTP methods allowed on each. Patterns are globs: `*`
//! matches any run of characters, everything else is literal.

use std::collections::HashMap;

use http::Method;
use serde::{Deserialize, Serialize};

use super::ConfigError;

/// The `rbac` section of the configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RbacConfig {
    /// Permissions keyed by group name. A group absent from this map
    /// contributes nothing to any caller's permissions.
    #[serde(default)]
    pub groups: HashMap<String, Permissions>,
}

impl RbacConfig {
    pub(super) fn validate(&self) -> Result<(), ConfigError> {
        for (group, permissions) in &self.groups {
            for rule in &permissions.whitelisted_indices {
                if rule.name.is_empty() {
                    return Err(ConfigError::Validation(format!(
                        "group {group}: whitelisted index entry with an empty name"
                    )));
                }
            }
            for rule in &permissions.whitelisted_apis {
                if !rule.name.starts_with('_') {
                    return Err(ConfigError::Validation(format!(
                        "group {group}: API whitelist entry {:?} must start with '_' \
                         (backend API path segments always do)",
                        rule.name
                    )));
                }
            }
        }
        Ok(())
    }
}

/// What one group is allowed to do.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Permissions {
    /// Legacy dashboard-admin flag. Surfaced by the policy store but not
    /// consulted on the request path.
    #[serde(default)]
    pub can_manage: bool,

    /// Index patterns members may reference, with allowed methods.
    #[serde(default)]
    pub whitelisted_indices: Vec<AccessRule>,

    /// API patterns (`_search`, `_msearch`, ...) members may call.
    #[serde(default)]
    pub whitelisted_apis: Vec<AccessRule>,
}

/// A glob pattern plus the HTTP methods allowed on whatever it matches.
///
/// Index rules and API rules share this shape. An empty `rest_verbs` list
/// allows no method at all.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct AccessRule {
    pub name: String,

    #[serde(default)]
    pub rest_verbs: Vec<String>,
}

impl AccessRule {
    /// Whether this rule permits the given HTTP method.
    pub fn allows(&self, method: &Method) -> bool {
        self.rest_verbs
            .iter()
            .any(|verb| verb.eq_ignore_ascii_case(method.as_str()))
    }
}
