//! Strategy selection by name.

use crate::strategies::{
    LocalRepairStrategy, ProtectionStrategy, RestorationStrategy, WdmRestorationStrategy,
    LOCAL_REPAIR, PROTECTION, RESTORATION, WDM_RESTORATION,
};
use crate::strategy::RecoveryStrategy;
use indexmap::IndexMap;
use resilience_core::ConfigurationError;

/// Constructor of a fresh, uninitialized strategy.
pub type StrategyBuilder = fn() -> Box<dyn RecoveryStrategy>;

/// Named strategy constructors, in registration order.
#[derive(Clone)]
pub struct StrategyRegistry {
    builders: IndexMap<&'static str, StrategyBuilder>,
}

impl StrategyRegistry {
    /// A registry with no strategies.
    pub fn empty() -> Self {
        Self {
            builders: IndexMap::new(),
        }
    }

    /// Register a strategy, replacing any previous one with the same name.
    pub fn register(&mut self, name: &'static str, builder: StrategyBuilder) {
        self.builders.insert(name, builder);
    }

    pub fn contains(&self, name: &str) -> bool {
        self.builders.contains_key(name)
    }

    /// Registered names, in registration order.
    pub fn names(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.builders.keys().copied()
    }

    /// Build the strategy registered under `name`.
    pub fn build(&self, name: &str) -> Result<Box<dyn RecoveryStrategy>, ConfigurationError> {
        self.builders
            .get(name)
            .map(|builder| builder())
            .ok_or_else(|| ConfigurationError::UnknownStrategy(name.to_string()))
    }
}

impl Default for StrategyRegistry {
    /// The built-in strategies.
    fn default() -> Self {
        let mut registry = Self::empty();
        registry.register(RESTORATION, restoration);
        registry.register(LOCAL_REPAIR, local_repair);
        registry.register(PROTECTION, protection);
        registry.register(WDM_RESTORATION, wdm_restoration);
        registry
    }
}

fn restoration() -> Box<dyn RecoveryStrategy> {
    Box::new(RestorationStrategy::new())
}

fn local_repair() -> Box<dyn RecoveryStrategy> {
    Box::new(LocalRepairStrategy::new())
}

fn protection() -> Box<dyn RecoveryStrategy> {
    Box::new(ProtectionStrategy::new())
}

fn wdm_restoration() -> Box<dyn RecoveryStrategy> {
    Box::new(WdmRestorationStrategy::new())
}

impl std::fmt::Debug for StrategyRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_list().entries(self.builders.keys()).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builtin_names() {
        let registry = StrategyRegistry::default();
        assert_eq!(
            registry.names().collect::<Vec<_>>(),
            vec!["restoration", "local-repair", "protection", "wdm-restoration"]
        );
        for name in registry.names() {
            assert_eq!(registry.build(name).unwrap().name(), name);
        }
    }

    #[test]
    fn test_unknown_strategy() {
        let registry = StrategyRegistry::default();
        assert!(matches!(
            registry.build("teleport"),
            Err(ConfigurationError::UnknownStrategy(name)) if name == "teleport"
        ));
        assert!(StrategyRegistry::empty().build("restoration").is_err());
    }
}
