// crates/callgate-http/src/access.rs
// ============================================================================
// Module: Access Policies
// Description: Built-in access policies for resolved call targets.
// Purpose: Decide whether a resolved class/method may be invoked.
// Dependencies: callgate-core, callgate-config
// ============================================================================

//! ## Overview
//! The dispatcher consults an [`AccessPolicy`] after binding and before
//! invocation. An empty allowlist in config means every registered callable
//! is reachable; a non-empty one restricts dispatch to the listed targets.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::HashSet;

use callgate_config::AccessConfig;
use callgate_config::ConfigError;
use callgate_core::AccessPolicy;
use callgate_core::CallTarget;
use callgate_core::ClassName;
use callgate_core::MethodName;

// ============================================================================
// SECTION: Policies
// ============================================================================

/// Policy granting every registered callable.
pub struct AllowAllAccess;

impl AccessPolicy for AllowAllAccess {
    fn access_granted(&self, _class: &ClassName, _method: &MethodName) -> bool {
        true
    }
}

/// Policy granting only the listed targets.
#[derive(Debug, Clone, Default)]
pub struct AllowlistAccess {
    /// Targets that may be invoked.
    allowed: HashSet<CallTarget>,
}

impl AllowlistAccess {
    /// Creates a policy from an explicit target list.
    #[must_use]
    pub fn new(targets: impl IntoIterator<Item = CallTarget>) -> Self {
        Self {
            allowed: targets.into_iter().collect(),
        }
    }

    /// Returns the number of allowed targets.
    #[must_use]
    pub fn len(&self) -> usize {
        self.allowed.len()
    }

    /// Returns `true` when nothing is allowed.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.allowed.is_empty()
    }
}

impl AccessPolicy for AllowlistAccess {
    fn access_granted(&self, class: &ClassName, method: &MethodName) -> bool {
        self.allowed.contains(&CallTarget::new(class.clone(), method.clone()))
    }
}

/// Builds the policy described by an `[access]` config section.
///
/// # Errors
///
/// Returns [`ConfigError`] when an entry is not `Class.method`.
pub fn policy_from_config(config: &AccessConfig) -> Result<Box<dyn AccessPolicy>, ConfigError> {
    let targets = config.targets()?;
    if targets.is_empty() {
        return Ok(Box::new(AllowAllAccess));
    }
    Ok(Box::new(AllowlistAccess::new(targets)))
}

// ============================================================================
// SECTION: Tests
// ============================================================================

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, reason = "Test-only assertions.")]

    use callgate_config::AccessConfig;
    use callgate_core::CallTarget;
    use callgate_core::ClassName;
    use callgate_core::MethodName;

    use super::policy_from_config;

    #[test]
    fn empty_allowlist_grants_everything() {
        let policy = policy_from_config(&AccessConfig::default()).unwrap();
        assert!(policy.access_granted(&ClassName::from("Any"), &MethodName::from("thing")));
    }

    #[test]
    fn allowlist_grants_only_listed_targets() {
        let config = AccessConfig {
            allow: vec!["Greeter.greet".to_string()],
        };
        let policy = policy_from_config(&config).unwrap();
        let greet = CallTarget::new("Greeter", "greet");
        assert!(policy.access_granted(&greet.class, &greet.method));
        assert!(!policy.access_granted(&ClassName::from("Greeter"), &MethodName::from("shout")));
    }
}
