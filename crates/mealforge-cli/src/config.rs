//! Configuration file management for mealforge.
//!
//! Provides a TOML config file at `~/.config/mealforge/config.toml` and a
//! resolution chain: CLI flag > env var > config file > default.

use std::path::PathBuf;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use mealforge_core::config::{self as keys, AppConfig};
use mealforge_db::config::DbConfig;

// -----------------------------------------------------------------------
// Config file types
// -----------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConfigFile {
    pub database: DatabaseSection,
    pub persistence: PersistenceSection,
    #[serde(default, skip_serializing_if = "ServiceSection::is_empty")]
    pub recipes: ServiceSection,
    #[serde(default, skip_serializing_if = "ServiceSection::is_empty")]
    pub nutrition: ServiceSection,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseSection {
    pub url: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PersistenceSection {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    /// Hex-encoded signing secret (64 hex chars = 32 bytes).
    pub secret: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ServiceSection {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub key: Option<String>,
}

impl ServiceSection {
    fn is_empty(&self) -> bool {
        self.url.is_none() && self.key.is_none()
    }
}

impl ConfigFile {
    /// Value the file holds for an environment key, if any.
    pub fn lookup(&self, key: &str) -> Option<String> {
        match key {
            keys::DATABASE_URL => Some(self.database.url.clone()),
            keys::PERSISTENCE_URL => self.persistence.url.clone(),
            keys::PERSISTENCE_SECRET => Some(self.persistence.secret.clone()),
            keys::RECIPE_API_URL => self.recipes.url.clone(),
            keys::RECIPE_API_KEY => self.recipes.key.clone(),
            keys::NUTRITION_API_URL => self.nutrition.url.clone(),
            keys::NUTRITION_API_KEY => self.nutrition.key.clone(),
            _ => None,
        }
    }
}

// -----------------------------------------------------------------------
// Paths
// -----------------------------------------------------------------------

/// Return the mealforge config directory.
///
/// Always uses XDG layout: `$XDG_CONFIG_HOME/mealforge` or
/// `~/.config/mealforge`, also on macOS.
pub fn config_dir() -> PathBuf {
    if let Ok(xdg) = std::env::var("XDG_CONFIG_HOME") {
        return PathBuf::from(xdg).join("mealforge");
    }
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".config")
        .join("mealforge")
}

pub fn config_path() -> PathBuf {
    config_dir().join("config.toml")
}

// -----------------------------------------------------------------------
// Read / write
// -----------------------------------------------------------------------

/// Load and parse the config file. Returns an error if it does not exist.
pub fn load_config() -> Result<ConfigFile> {
    let path = config_path();
    let contents = std::fs::read_to_string(&path)
        .with_context(|| format!("failed to read config file at {}", path.display()))?;
    toml::from_str(&contents).context("failed to parse config file")
}

/// Serialize and write the config file, creating parent dirs as needed.
/// The file holds the signing secret, so it is owner-only on Unix.
pub fn save_config(config: &ConfigFile) -> Result<PathBuf> {
    let path = config_path();
    let dir = config_dir();
    std::fs::create_dir_all(&dir)
        .with_context(|| format!("failed to create config directory {}", dir.display()))?;

    let contents = toml::to_string_pretty(config).context("failed to serialize config")?;
    std::fs::write(&path, &contents)
        .with_context(|| format!("failed to write config file at {}", path.display()))?;

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        let perms = std::fs::Permissions::from_mode(0o600);
        std::fs::set_permissions(&path, perms)
            .with_context(|| format!("failed to set permissions on {}", path.display()))?;
    }

    Ok(path)
}

/// 32 random bytes, hex-encoded (64 chars).
pub fn generate_secret() -> String {
    use rand::Rng;
    let mut bytes = [0u8; 32];
    rand::rng().fill(&mut bytes);
    hex::encode(bytes)
}

// -----------------------------------------------------------------------
// Resolved config
// -----------------------------------------------------------------------

/// Fully resolved configuration, ready for use.
#[derive(Debug)]
pub struct ResolvedConfig {
    pub app: AppConfig,
    pub db_config: DbConfig,
}

impl ResolvedConfig {
    /// Resolve every setting: `cli_db_url` > `MEALFORGE_*` env > config file > default.
    pub fn resolve(cli_db_url: Option<&str>) -> Result<Self> {
        let file = load_config().ok();
        Self::resolve_with(cli_db_url, file.as_ref(), |key| std::env::var(key).ok())
    }

    pub fn resolve_with<F>(cli_db_url: Option<&str>, file: Option<&ConfigFile>, env: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut app = AppConfig::from_lookup(|key| {
            env(key)
                .filter(|v| !v.trim().is_empty())
                .or_else(|| file.and_then(|f| f.lookup(key)))
        })?;
        if let Some(url) = cli_db_url {
            app.database_url = Some(url.to_string());
        }

        let db_url = app
            .database_url
            .clone()
            .unwrap_or_else(|| DbConfig::DEFAULT_URL.to_string());

        Ok(Self {
            app,
            db_config: DbConfig::new(db_url),
        })
    }

    /// Startup validation: fails on fatal problems and logs the rest.
    pub fn validate(&self) -> Result<()> {
        let warnings = self.app.validate()?;
        for warning in &warnings {
            tracing::warn!("{warning}");
        }
        Ok(())
    }
}

// -----------------------------------------------------------------------
// Tests
// -----------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn lock_env() -> std::sync::MutexGuard<'static, ()> {
        crate::test_util::lock_env()
    }

    fn sample_file() -> ConfigFile {
        ConfigFile {
            database: DatabaseSection {
                url: "postgresql://filehost:5432/mealforge".to_string(),
            },
            persistence: PersistenceSection {
                url: Some("https://plans.example.com".to_string()),
                secret: "ab".repeat(32),
            },
            recipes: ServiceSection::default(),
            nutrition: ServiceSection {
                url: Some("https://nutrition.example.com".to_string()),
                key: Some("nut-key".to_string()),
            },
        }
    }

    fn env_of(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key: &str| map.get(key).cloned()
    }

    #[test]
    fn generate_secret_is_64_hex_chars() {
        let secret = generate_secret();
        assert_eq!(secret.len(), 64);
        assert!(secret.chars().all(|c| c.is_ascii_hexdigit()), "got: {secret}");
        assert_ne!(secret, generate_secret());
    }

    #[test]
    fn cli_flag_overrides_env_and_file() {
        let file = sample_file();
        let env = env_of(&[(keys::DATABASE_URL, "postgresql://env:5432/envdb")]);
        let resolved =
            ResolvedConfig::resolve_with(Some("postgresql://cli:5432/clidb"), Some(&file), env).unwrap();
        assert_eq!(resolved.db_config.database_url, "postgresql://cli:5432/clidb");
    }

    #[test]
    fn env_overrides_file() {
        let file = sample_file();
        let env = env_of(&[
            (keys::DATABASE_URL, "postgresql://env:5432/envdb"),
            (keys::PERSISTENCE_URL, "https://env-plans.example.com"),
        ]);
        let resolved = ResolvedConfig::resolve_with(None, Some(&file), env).unwrap();
        assert_eq!(resolved.db_config.database_url, "postgresql://env:5432/envdb");
        assert_eq!(
            resolved.app.persistence_url.as_deref(),
            Some("https://env-plans.example.com")
        );
        assert_eq!(resolved.app.persistence_secret, Some("ab".repeat(32)));
        assert_eq!(resolved.app.nutrition_api_key.as_deref(), Some("nut-key"));
    }

    #[test]
    fn empty_env_value_falls_through_to_file() {
        let file = sample_file();
        let env = env_of(&[(keys::DATABASE_URL, "  ")]);
        let resolved = ResolvedConfig::resolve_with(None, Some(&file), env).unwrap();
        assert_eq!(resolved.db_config.database_url, "postgresql://filehost:5432/mealforge");
    }

    #[test]
    fn defaults_db_url_when_nothing_set() {
        let resolved = ResolvedConfig::resolve_with(None, None, env_of(&[])).unwrap();
        assert_eq!(resolved.db_config.database_url, DbConfig::DEFAULT_URL);
        assert!(resolved.app.database_url.is_none());
        assert!(resolved.validate().is_ok());
    }

    #[test]
    fn production_without_persistence_fails_validation() {
        let env = env_of(&[
            (keys::ENV, "production"),
            (keys::DATABASE_URL, "postgresql://db:5432/mealforge"),
        ]);
        let resolved = ResolvedConfig::resolve_with(None, None, env).unwrap();
        let err = resolved.validate().unwrap_err();
        assert!(err.to_string().contains(keys::PERSISTENCE_URL), "got: {err}");
    }

    #[test]
    fn file_round_trips_through_toml_without_empty_sections() {
        let mut file = sample_file();
        file.nutrition = ServiceSection::default();
        let text = toml::to_string_pretty(&file).unwrap();
        assert!(!text.contains("[nutrition]"), "got:\n{text}");
        assert!(!text.contains("[recipes]"), "got:\n{text}");

        let parsed: ConfigFile = toml::from_str(&text).unwrap();
        assert_eq!(parsed.database.url, file.database.url);
        assert_eq!(parsed.persistence.secret, file.persistence.secret);
        assert!(parsed.nutrition.is_empty());
    }

    #[cfg(unix)]
    #[test]
    fn save_config_writes_owner_only_file_under_xdg_home() {
        use std::os::unix::fs::PermissionsExt;

        let _lock = lock_env();
        let tmp = tempfile::TempDir::new().unwrap();
        let orig_xdg = std::env::var("XDG_CONFIG_HOME").ok();
        unsafe { std::env::set_var("XDG_CONFIG_HOME", tmp.path()) };

        let written = save_config(&sample_file());
        let loaded = load_config();

        match orig_xdg {
            Some(x) => unsafe { std::env::set_var("XDG_CONFIG_HOME", x) },
            None => unsafe { std::env::remove_var("XDG_CONFIG_HOME") },
        }

        let path = written.unwrap();
        assert_eq!(path, tmp.path().join("mealforge").join("config.toml"));
        let meta = std::fs::metadata(&path).unwrap();
        assert_eq!(meta.permissions().mode() & 0o777, 0o600);
        assert_eq!(loaded.unwrap().database.url, "postgresql://filehost:5432/mealforge");
    }

    #[test]
    fn config_path_ends_with_expected_filename() {
        let _lock = lock_env();
        let path = config_path();
        assert!(
            path.ends_with("mealforge/config.toml"),
            "unexpected config path: {}",
            path.display()
        );
    }
}
