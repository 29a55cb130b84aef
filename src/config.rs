use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{Error, IoResultExt, Result};
use crate::types::{Principal, PrincipalId};

/// repository configuration stored in config.toml
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub catalog: CatalogConfig,
    /// principal directory used to resolve emails
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub principals: Vec<Principal>,
}

/// tuning for the version catalog and content store
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CatalogConfig {
    /// how many times a revision slot claim may lose a race before `Conflict`
    #[serde(default = "default_allocation_attempts")]
    pub allocation_attempts: u32,
    /// buffer size for streaming payload writes
    #[serde(default = "default_chunk_size")]
    pub chunk_size: usize,
}

fn default_allocation_attempts() -> u32 {
    16
}

fn default_chunk_size() -> usize {
    64 * 1024
}

impl Default for CatalogConfig {
    fn default() -> Self {
        Self {
            allocation_attempts: default_allocation_attempts(),
            chunk_size: default_chunk_size(),
        }
    }
}

impl Config {
    /// load config from file
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).with_path(path)?;
        let config: Config = toml::from_str(&content)?;
        Ok(config)
    }

    /// save config to file
    pub fn save(&self, path: &Path) -> Result<()> {
        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content).with_path(path)?;
        Ok(())
    }

    /// register a principal, returning its new id
    pub fn add_principal(
        &mut self,
        email: impl Into<String>,
        name: impl Into<String>,
    ) -> Result<PrincipalId> {
        let email = email.into();
        if self.get_principal(&email).is_some() {
            return Err(Error::PrincipalExists(email));
        }
        let principal = Principal::new(email, name);
        let id = principal.id;
        self.principals.push(principal);
        Ok(id)
    }

    /// remove a principal by email
    pub fn remove_principal(&mut self, email: &str) -> Result<Principal> {
        let pos = self
            .principals
            .iter()
            .position(|p| p.email == email)
            .ok_or_else(|| Error::UnknownPrincipal(email.to_string()))?;
        Ok(self.principals.remove(pos))
    }

    /// get principal by email
    pub fn get_principal(&self, email: &str) -> Option<&Principal> {
        self.principals.iter().find(|p| p.email == email)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_toml_roundtrip() {
        let mut config = Config {
            catalog: CatalogConfig {
                allocation_attempts: 4,
                chunk_size: 1024,
            },
            principals: vec![],
        };
        config.add_principal("a@example.com", "A").unwrap();
        config.add_principal("b@example.com", "").unwrap();

        let toml_str = toml::to_string_pretty(&config).unwrap();
        let parsed: Config = toml::from_str(&toml_str).unwrap();

        assert_eq!(config.catalog, parsed.catalog);
        assert_eq!(config.principals, parsed.principals);
    }

    #[test]
    fn test_config_add_remove_principal() {
        let mut config = Config::default();

        let id = config.add_principal("a@example.com", "A").unwrap();
        assert_eq!(config.principals.len(), 1);

        // duplicate email should fail
        assert!(matches!(
            config.add_principal("a@example.com", "other"),
            Err(Error::PrincipalExists(_))
        ));

        assert_eq!(config.get_principal("a@example.com").unwrap().id, id);

        let removed = config.remove_principal("a@example.com").unwrap();
        assert_eq!(removed.id, id);
        assert!(config.principals.is_empty());

        assert!(config.remove_principal("a@example.com").is_err());
    }

    #[test]
    fn test_config_minimal_toml() {
        let config: Config = toml::from_str("").unwrap();
        assert_eq!(config.catalog, CatalogConfig::default());
        assert!(config.principals.is_empty());

        let toml_str = r#"
[catalog]
allocation_attempts = 3
"#;
        let config: Config = toml::from_str(toml_str).unwrap();
        assert_eq!(config.catalog.allocation_attempts, 3);
        assert_eq!(config.catalog.chunk_size, 64 * 1024);
    }
}
