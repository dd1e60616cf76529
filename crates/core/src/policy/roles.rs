//! Role hierarchy and actor directory.

use std::collections::{BTreeSet, HashMap, HashSet};

use vaultline_shared::config::RolesConfig;
use vaultline_shared::types::{ActorId, Role};

/// Which roles each role subsumes, closed transitively.
///
/// A holder satisfies a required role when it equals it or subsumes it.
/// Cycles in the configured graph are tolerated.
#[derive(Debug, Clone, Default)]
pub struct RoleHierarchy {
    closure: HashMap<Role, HashSet<Role>>,
}

impl RoleHierarchy {
    /// Builds the hierarchy from direct `role -> subsumed roles` edges.
    pub fn new(edges: impl IntoIterator<Item = (Role, Vec<Role>)>) -> Self {
        let direct: HashMap<Role, Vec<Role>> = edges.into_iter().collect();

        let closure = direct
            .keys()
            .map(|root| {
                let mut seen = HashSet::new();
                let mut stack: Vec<&Role> = direct.get(root).into_iter().flatten().collect();
                while let Some(role) = stack.pop() {
                    if seen.insert(role.clone()) {
                        stack.extend(direct.get(role).into_iter().flatten());
                    }
                }
                seen.remove(root);
                (root.clone(), seen)
            })
            .collect();

        Self { closure }
    }

    /// Builds the hierarchy from configuration, skipping blank role names.
    #[must_use]
    pub fn from_config(config: &RolesConfig) -> Self {
        Self::new(config.hierarchy.iter().filter_map(|(role, subsumed)| {
            let role = Role::new(role)?;
            let subsumed = subsumed.iter().filter_map(Role::new).collect();
            Some((role, subsumed))
        }))
    }

    /// Returns true if `holder` may act where `required` is needed.
    #[must_use]
    pub fn satisfies(&self, holder: &Role, required: &Role) -> bool {
        holder == required
            || self
                .closure
                .get(holder)
                .is_some_and(|subsumed| subsumed.contains(required))
    }

    /// `holder` and every role it subsumes, sorted.
    #[must_use]
    pub fn subsumed_by(&self, holder: &Role) -> Vec<Role> {
        let mut roles: BTreeSet<Role> = self
            .closure
            .get(holder)
            .map(|s| s.iter().cloned().collect())
            .unwrap_or_default();
        roles.insert(holder.clone());
        roles.into_iter().collect()
    }
}

/// Maps an authenticated actor to its role.
///
/// Supplied by the embedding application; actors without a role cannot
/// approve anything.
pub trait RoleDirectory: Send + Sync {
    /// Role of `actor`, if it has one.
    fn role_of(&self, actor: &ActorId) -> Option<Role>;
}

/// Directory backed by a fixed actor to role map.
#[derive(Debug, Clone, Default)]
pub struct StaticRoleDirectory {
    roles: HashMap<ActorId, Role>,
}

impl StaticRoleDirectory {
    /// Builds the directory from configuration, skipping blank entries.
    #[must_use]
    pub fn from_config(config: &RolesConfig) -> Self {
        let roles = config
            .actors
            .iter()
            .filter_map(|(actor, role)| Some((ActorId::new(actor)?, Role::new(role)?)))
            .collect();
        Self { roles }
    }

    /// Adds or replaces one assignment.
    #[must_use]
    pub fn with(mut self, actor: ActorId, role: Role) -> Self {
        self.roles.insert(actor, role);
        self
    }
}

impl RoleDirectory for StaticRoleDirectory {
    fn role_of(&self, actor: &ActorId) -> Option<Role> {
        self.roles.get(actor).cloned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn role(name: &str) -> Role {
        Role::new(name).unwrap()
    }

    fn hierarchy() -> RoleHierarchy {
        RoleHierarchy::new([
            (role("ADMIN"), vec![role("CFO"), role("RISK_MANAGER")]),
            (role("CFO"), vec![role("FINANCE_MANAGER")]),
            (role("FINANCE_MANAGER"), vec![role("SUPERVISOR")]),
        ])
    }

    #[test]
    fn test_satisfies_is_transitive() {
        let h = hierarchy();
        assert!(h.satisfies(&role("ADMIN"), &role("SUPERVISOR")));
        assert!(h.satisfies(&role("CFO"), &role("FINANCE_MANAGER")));
        assert!(h.satisfies(&role("SUPERVISOR"), &role("SUPERVISOR")));
        assert!(!h.satisfies(&role("SUPERVISOR"), &role("CFO")));
        assert!(!h.satisfies(&role("RISK_MANAGER"), &role("FINANCE_MANAGER")));
    }

    #[test]
    fn test_cycle_terminates() {
        let h = RoleHierarchy::new([
            (role("A"), vec![role("B")]),
            (role("B"), vec![role("A")]),
        ]);
        assert!(h.satisfies(&role("A"), &role("B")));
        assert!(h.satisfies(&role("B"), &role("A")));
        assert_eq!(h.subsumed_by(&role("A")), vec![role("A"), role("B")]);
    }

    #[test]
    fn test_subsumed_by_includes_self() {
        let h = hierarchy();
        assert_eq!(
            h.subsumed_by(&role("CFO")),
            vec![role("CFO"), role("FINANCE_MANAGER"), role("SUPERVISOR")]
        );
        assert_eq!(h.subsumed_by(&role("TELLER")), vec![role("TELLER")]);
    }

    #[test]
    fn test_from_config_normalizes_names() {
        let config = RolesConfig {
            hierarchy: [("cfo".to_string(), vec!["finance-manager".to_string()])].into(),
            actors: [
                ("carol".to_string(), "cfo".to_string()),
                ("ghost".to_string(), "  ".to_string()),
            ]
            .into(),
        };
        let h = RoleHierarchy::from_config(&config);
        assert!(h.satisfies(&role("CFO"), &role("FINANCE_MANAGER")));

        let directory = StaticRoleDirectory::from_config(&config);
        assert_eq!(
            directory.role_of(&ActorId::new("carol").unwrap()),
            Some(role("CFO"))
        );
        assert_eq!(directory.role_of(&ActorId::new("ghost").unwrap()), None);
    }
}
