//! Engine module loading.
//!
//! Engines register under a logical module name; the bridge resolves the name
//! from package metadata (default name if absent) at create and constructs
//! the engine through the registered factory. A name with no registered
//! factory, or a factory that fails, is a fatal startup error.

use std::collections::HashMap;

use crate::config::BridgeConfig;
use crate::engine::{EngineCallbacks, EngineHandle, InvalidateSignal};

/// Factory constructing an engine for one module name. The factory receives
/// the invalidate signal so the engine can request redraws from any thread.
pub type EngineFactory =
    Box<dyn Fn(&BridgeConfig, InvalidateSignal) -> anyhow::Result<Box<dyn EngineCallbacks>>>;

/// Registry of engine factories, keyed by logical module name.
#[derive(Default)]
pub struct EngineRegistry {
    factories: HashMap<String, EngineFactory>,
}

impl EngineRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a factory for `module`. A later registration under the same
    /// name replaces the earlier one.
    pub fn register<F>(&mut self, module: impl Into<String>, factory: F)
    where
        F: Fn(&BridgeConfig, InvalidateSignal) -> anyhow::Result<Box<dyn EngineCallbacks>>
            + 'static,
    {
        self.factories.insert(module.into(), Box::new(factory));
    }

    pub fn contains(&self, module: &str) -> bool {
        self.factories.contains_key(module)
    }

    /// Construct the engine registered under `module`.
    pub fn load(
        &self,
        module: &str,
        config: &BridgeConfig,
        invalidate: InvalidateSignal,
    ) -> anyhow::Result<EngineHandle> {
        let factory = self
            .factories
            .get(module)
            .ok_or_else(|| anyhow::anyhow!("no engine registered under module name '{module}'"))?;

        let callbacks = factory(config, invalidate)?;
        log::debug!("engine module '{}' loaded", module);
        Ok(EngineHandle::new(module, callbacks))
    }
}

impl std::fmt::Debug for EngineRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EngineRegistry")
            .field("modules", &self.factories.keys().collect::<Vec<_>>())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::test_support::RecordingEngine;

    #[test]
    fn load_constructs_registered_engine() {
        let mut registry = EngineRegistry::new();
        registry.register("engine", |_config, _invalidate| {
            let (engine, _calls) = RecordingEngine::new();
            Ok(Box::new(engine) as Box<dyn EngineCallbacks>)
        });

        let handle = registry
            .load("engine", &BridgeConfig::default(), InvalidateSignal::new())
            .unwrap();
        assert_eq!(handle.module(), "engine");
    }

    #[test]
    fn load_unregistered_module_fails() {
        let registry = EngineRegistry::new();
        let err = registry
            .load("ghost", &BridgeConfig::default(), InvalidateSignal::new())
            .unwrap_err();
        assert!(err.to_string().contains("ghost"));
    }

    #[test]
    fn factory_error_propagates() {
        let mut registry = EngineRegistry::new();
        registry.register("broken", |_config, _invalidate| {
            anyhow::bail!("init failed")
        });
        assert!(registry
            .load("broken", &BridgeConfig::default(), InvalidateSignal::new())
            .is_err());
    }

    #[test]
    fn later_registration_replaces_earlier() {
        let mut registry = EngineRegistry::new();
        registry.register("engine", |_c, _i| anyhow::bail!("old"));
        registry.register("engine", |_c, _i| {
            let (engine, _calls) = RecordingEngine::new();
            Ok(Box::new(engine) as Box<dyn EngineCallbacks>)
        });
        assert!(registry
            .load("engine", &BridgeConfig::default(), InvalidateSignal::new())
            .is_ok());
    }
}
