//! Configuration management with file persistence

use anyhow::{Context, anyhow};
use serde::{Deserialize, Serialize};
use std::env;
use std::fs;
use std::path::PathBuf;

use crate::search::{DEFAULT_PER_PAGE, IndexTable};
use crate::storage::{DatabaseConfig, default_database_path};
use crate::storage::database::DEFAULT_MAX_CONNECTIONS;

/// Environment variable overriding the index table name
pub const INDEX_TABLE_ENV: &str = "POLYSEARCH_INDEX_TABLE";

/// Polysearch configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub database: DatabaseSettings,
    pub index: IndexSettings,
    pub search: SearchSettings,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DatabaseSettings {
    /// Database file; the platform data directory when unset
    pub path: Option<PathBuf>,
    pub max_connections: u32,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct IndexSettings {
    pub table_name: IndexTable,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SearchSettings {
    pub default_per_page: u32,
}

impl Default for DatabaseSettings {
    fn default() -> Self {
        Self {
            path: None,
            max_connections: DEFAULT_MAX_CONNECTIONS,
        }
    }
}

impl Default for SearchSettings {
    fn default() -> Self {
        Self {
            default_per_page: DEFAULT_PER_PAGE,
        }
    }
}

impl Config {
    /// Get the config directory path
    pub fn config_dir() -> anyhow::Result<PathBuf> {
        let dir = if let Ok(custom_dir) = env::var("POLYSEARCH_CONFIG_DIR") {
            PathBuf::from(custom_dir)
        } else {
            dirs::config_dir()
                .ok_or_else(|| anyhow!("Could not determine config directory"))?
                .join("polysearch")
        };
        Ok(dir)
    }

    /// Get the config file path
    pub fn config_path() -> anyhow::Result<PathBuf> {
        Ok(Self::config_dir()?.join("config.toml"))
    }

    /// Load configuration from file, or use defaults if it doesn't exist
    pub fn load() -> anyhow::Result<Self> {
        let path = Self::config_path()?;

        if path.exists() {
            let contents = fs::read_to_string(&path)
                .with_context(|| format!("Failed to read config file: {}", path.display()))?;
            let config = Self::from_toml(&contents)
                .with_context(|| format!("Failed to parse config file: {}", path.display()))?;
            Ok(config)
        } else {
            Ok(Config::default())
        }
    }

    /// Parse and validate configuration from TOML text
    pub fn from_toml(contents: &str) -> anyhow::Result<Self> {
        let config: Config = toml::from_str(contents)?;
        config.validate()?;
        Ok(config)
    }

    /// Save configuration to file
    pub fn save(&self) -> anyhow::Result<()> {
        self.validate()?;

        let dir = Self::config_dir()?;
        fs::create_dir_all(&dir)
            .with_context(|| format!("Failed to create config directory: {}", dir.display()))?;

        let path = Self::config_path()?;
        let contents = toml::to_string_pretty(self).context("Failed to serialize config")?;

        fs::write(&path, contents)
            .with_context(|| format!("Failed to write config file: {}", path.display()))?;

        Ok(())
    }

    /// Validate configuration
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.database.max_connections == 0 {
            return Err(anyhow!("database.max_connections must be at least 1"));
        }
        if self.search.default_per_page == 0 {
            return Err(anyhow!("search.default_per_page must be at least 1"));
        }
        Ok(())
    }

    /// Index table name, honoring the environment override
    pub fn index_table(&self) -> anyhow::Result<IndexTable> {
        self.index_table_with_override(env::var(INDEX_TABLE_ENV).ok())
    }

    fn index_table_with_override(&self, env_value: Option<String>) -> anyhow::Result<IndexTable> {
        match env_value.filter(|value| !value.trim().is_empty()) {
            Some(name) => IndexTable::new(name.trim())
                .with_context(|| format!("Invalid {} value", INDEX_TABLE_ENV)),
            None => Ok(self.index.table_name.clone()),
        }
    }

    /// Database file in use
    pub fn database_path(&self) -> PathBuf {
        self.database
            .path
            .clone()
            .unwrap_or_else(default_database_path)
    }

    /// Connection settings for the configured database and index table
    pub fn database_config(&self) -> anyhow::Result<DatabaseConfig> {
        Ok(DatabaseConfig::with_path(self.database_path())
            .max_connections(self.database.max_connections)
            .index_table(self.index_table()?))
    }

    /// Get a configuration value by key
    pub fn get(&self, key: &str) -> anyhow::Result<String> {
        match key {
            "database.path" => Ok(self.database_path().display().to_string()),
            "database.max_connections" => Ok(self.database.max_connections.to_string()),
            "index.table_name" => Ok(self.index.table_name.to_string()),
            "search.default_per_page" => Ok(self.search.default_per_page.to_string()),
            _ => Err(anyhow!(
                "Unknown configuration key: {}. Use `polysearch config list` to see available keys.",
                key
            )),
        }
    }

    /// Set a configuration value by key
    pub fn set(&mut self, key: &str, value: &str) -> anyhow::Result<()> {
        match key {
            "database.path" => {
                self.database.path = if value.trim().is_empty() {
                    None
                } else {
                    Some(PathBuf::from(value))
                };
            }
            "database.max_connections" => {
                let max: u32 = value
                    .parse()
                    .with_context(|| format!("Invalid max_connections value: {}", value))?;
                if max == 0 {
                    return Err(anyhow!("max_connections must be at least 1"));
                }
                self.database.max_connections = max;
            }
            "index.table_name" => {
                self.index.table_name = IndexTable::new(value)?;
            }
            "search.default_per_page" => {
                let per_page: u32 = value
                    .parse()
                    .with_context(|| format!("Invalid default_per_page value: {}", value))?;
                if per_page == 0 {
                    return Err(anyhow!("default_per_page must be at least 1"));
                }
                self.search.default_per_page = per_page;
            }
            _ => {
                return Err(anyhow!(
                    "Unknown configuration key: {}. Use `polysearch config list` to see available keys.",
                    key
                ));
            }
        }
        Ok(())
    }

    /// List all configuration keys and their values
    pub fn list(&self) -> anyhow::Result<Vec<(String, String)>> {
        let keys = [
            "database.path",
            "database.max_connections",
            "index.table_name",
            "search.default_per_page",
        ];

        keys.into_iter()
            .map(|key| {
                let value = self.get(key)?;
                Ok((key.to_string(), value))
            })
            .collect()
    }

    /// Reset configuration to defaults
    pub fn reset() -> anyhow::Result<()> {
        let path = Self::config_path()?;
        if path.exists() {
            fs::remove_file(&path)
                .with_context(|| format!("Failed to remove config file: {}", path.display()))?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert_eq!(config.index.table_name.name(), "fulltext_rows");
        assert_eq!(config.search.default_per_page, 30);
        assert_eq!(config.database.max_connections, 5);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_partial_toml_uses_defaults() {
        let config = Config::from_toml("[index]\ntable_name = \"search_rows\"\n").unwrap();
        assert_eq!(config.index.table_name.name(), "search_rows");
        assert_eq!(config.search.default_per_page, 30);
    }

    #[test]
    fn test_invalid_table_name_rejected_on_load() {
        assert!(Config::from_toml("[index]\ntable_name = \"rows; --\"\n").is_err());
        assert!(Config::from_toml("[search]\ndefault_per_page = 0\n").is_err());
    }

    #[test]
    fn test_toml_round_trip() {
        let mut config = Config::default();
        config.set("database.path", "/tmp/polysearch.db").unwrap();
        config.set("index.table_name", "docs").unwrap();

        let text = toml::to_string_pretty(&config).unwrap();
        assert_eq!(Config::from_toml(&text).unwrap(), config);
    }

    #[test]
    fn test_get_set_list() {
        let mut config = Config::default();
        config.set("search.default_per_page", "50").unwrap();
        config.set("database.max_connections", "2").unwrap();
        assert_eq!(config.get("search.default_per_page").unwrap(), "50");
        assert_eq!(config.get("database.max_connections").unwrap(), "2");

        assert!(config.set("search.default_per_page", "0").is_err());
        assert!(config.set("search.default_per_page", "many").is_err());
        assert!(config.set("index.table_name", "bad name").is_err());
        assert!(config.set("nope", "1").is_err());
        assert!(config.get("nope").is_err());

        let keys: Vec<String> = config.list().unwrap().into_iter().map(|(k, _)| k).collect();
        assert_eq!(keys.len(), 4);
        assert!(keys.contains(&"index.table_name".to_string()));
    }

    #[test]
    fn test_index_table_override() {
        let config = Config::default();
        let table = config.index_table_with_override(Some("archive".to_string())).unwrap();
        assert_eq!(table.name(), "archive");

        let table = config.index_table_with_override(Some("  ".to_string())).unwrap();
        assert_eq!(table.name(), "fulltext_rows");

        assert!(config.index_table_with_override(Some("x y".to_string())).is_err());
    }

    #[test]
    fn test_database_config_uses_settings() {
        let mut config = Config::default();
        config.set("database.path", "/tmp/search.db").unwrap();
        let table = config.index_table_with_override(None).unwrap();
        assert_eq!(table.name(), "fulltext_rows");
        assert_eq!(config.database_path(), PathBuf::from("/tmp/search.db"));
    }
}
