use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::engine::DisplayMetrics;

/// Module name used when the manifest does not name one.
pub const DEFAULT_ENGINE_MODULE: &str = "engine";

/// Manifest metadata key that names the engine module to load.
pub const ENGINE_MODULE_KEY: &str = "engine.module";

/// Package metadata shipped alongside the application.
///
/// The bridge only reads the engine module name out of it; everything else is
/// carried for the host's benefit and stays uninterpreted.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Manifest {
    /// Package identifier, informational only.
    #[serde(default)]
    pub package: String,
    /// Free-form metadata entries.
    #[serde(default)]
    pub metadata: BTreeMap<String, String>,
}

impl Manifest {
    /// Parse a manifest from its JSON form.
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }

    /// Logical name of the engine module, falling back to
    /// [`DEFAULT_ENGINE_MODULE`] when the metadata does not name one.
    pub fn engine_module(&self) -> &str {
        self.metadata
            .get(ENGINE_MODULE_KEY)
            .map(String::as_str)
            .unwrap_or(DEFAULT_ENGINE_MODULE)
    }
}

/// Main bridge configuration.
#[derive(Debug, Clone, Default)]
pub struct BridgeConfig {
    /// Package metadata; source of the engine module name.
    pub manifest: Manifest,
    /// Display metrics handed to the engine at create.
    pub display_metrics: DisplayMetrics,
}

impl BridgeConfig {
    pub fn engine_module(&self) -> &str {
        self.manifest.engine_module()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn engine_module_defaults_when_metadata_absent() {
        let config = BridgeConfig::default();
        assert_eq!(config.engine_module(), DEFAULT_ENGINE_MODULE);
    }

    #[test]
    fn engine_module_read_from_manifest_metadata() {
        let manifest = Manifest::from_json(
            r#"{"package":"org.example.app","metadata":{"engine.module":"custom"}}"#,
        )
        .unwrap();
        assert_eq!(manifest.engine_module(), "custom");
        assert_eq!(manifest.package, "org.example.app");
    }

    #[test]
    fn manifest_json_roundtrip_keeps_unrelated_metadata() {
        let mut manifest = Manifest::default();
        manifest
            .metadata
            .insert("theme".to_string(), "dark".to_string());
        let json = serde_json::to_string(&manifest).unwrap();
        let back = Manifest::from_json(&json).unwrap();
        assert_eq!(back, manifest);
        assert_eq!(back.engine_module(), DEFAULT_ENGINE_MODULE);
    }

    #[test]
    fn malformed_manifest_json_is_an_error() {
        assert!(Manifest::from_json("{not json").is_err());
    }
}
