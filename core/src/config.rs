//! Portal configuration: where each backend lives and which one starts active.

use serde::Deserialize;

use crate::backend::BackendVariant;
use crate::error::PortalError;

pub const DEFAULT_JAVA_URL: &str = "http://localhost:8080";
pub const DEFAULT_PYTHON_URL: &str = "http://localhost:8000/api/v1";

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct PortalConfig {
    pub java_base_url: String,
    pub python_base_url: String,
    pub default_backend: BackendVariant,
}

impl Default for PortalConfig {
    fn default() -> Self {
        Self {
            java_base_url: DEFAULT_JAVA_URL.to_string(),
            python_base_url: DEFAULT_PYTHON_URL.to_string(),
            default_backend: BackendVariant::Java,
        }
    }
}

impl PortalConfig {
    /// Defaults overridden by `PORTAL_JAVA_URL`, `PORTAL_PYTHON_URL` and
    /// `PORTAL_BACKEND`.
    pub fn from_env() -> Result<Self, PortalError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, PortalError> {
        let mut config = Self::default();
        if let Some(url) = lookup("PORTAL_JAVA_URL") {
            config.java_base_url = url;
        }
        if let Some(url) = lookup("PORTAL_PYTHON_URL") {
            config.python_base_url = url;
        }
        if let Some(variant) = lookup("PORTAL_BACKEND") {
            config.default_backend = variant.parse()?;
        }
        Ok(config)
    }

    pub fn base_url(&self, variant: BackendVariant) -> &str {
        match variant {
            BackendVariant::Java => &self.java_base_url,
            BackendVariant::Python => &self.python_base_url,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key: &str| map.get(key).cloned()
    }

    #[test]
    fn env_overrides_defaults() {
        let config = PortalConfig::from_lookup(lookup(&[
            ("PORTAL_PYTHON_URL", "http://py.internal/api/v1"),
            ("PORTAL_BACKEND", "python"),
        ]))
        .unwrap();
        assert_eq!(config.java_base_url, DEFAULT_JAVA_URL);
        assert_eq!(config.python_base_url, "http://py.internal/api/v1");
        assert_eq!(config.default_backend, BackendVariant::Python);
    }

    #[test]
    fn unknown_backend_is_rejected() {
        let err = PortalConfig::from_lookup(lookup(&[("PORTAL_BACKEND", "node")])).unwrap_err();
        assert!(matches!(err, PortalError::Validation(_)));
    }

    #[test]
    fn deserializes_with_partial_fields() {
        let config: PortalConfig = serde_json::from_str(r#"{"default_backend":"python"}"#).unwrap();
        assert_eq!(config.default_backend, BackendVariant::Python);
        assert_eq!(config.java_base_url, DEFAULT_JAVA_URL);
    }
}
