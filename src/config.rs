use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::info;

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct Config {
    pub general: GeneralConfig,

    pub server: ServerConfig,

    pub security: SecurityConfig,

    pub import: ImportConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneralConfig {
    pub database_path: String,

    pub log_level: String,

    /// "pretty" for human readable output, "json" for structured logs
    pub log_format: String,

    /// Number of tokio worker threads (default: 2)
    /// Set to 0 to use the number of CPU cores
    pub worker_threads: usize,

    /// Maximum database connections (default: 5)
    pub max_db_connections: u32,

    /// Minimum database connections (default: 1)
    pub min_db_connections: u32,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            database_path: "sqlite:data/integration-hub.db".to_string(),
            log_level: "info".to_string(),
            log_format: "pretty".to_string(),
            worker_threads: 2,
            max_db_connections: 5,
            min_db_connections: 1,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,

    pub port: u16,

    pub cors_allowed_origins: Vec<String>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 8000,
            cors_allowed_origins: vec!["*".to_string()],
        }
    }
}

/// Longest refresh token lifetime `validate` accepts (ten years).
pub const MAX_REFRESH_TOKEN_DAYS: i64 = 3650;

/// Longest access token lifetime `validate` accepts, the same ten years.
pub const MAX_ACCESS_TOKEN_MINUTES: i64 = MAX_REFRESH_TOKEN_DAYS * 24 * 60;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SecurityConfig {
    /// Argon2 memory cost in KiB (default: 8192 = 8MB)
    pub argon2_memory_cost_kib: u32,

    /// Argon2 time cost (iterations)
    pub argon2_time_cost: u32,

    /// Argon2 parallelism (default: 1)
    pub argon2_parallelism: u32,

    /// Lifetime of access tokens handed out at login.
    pub access_token_expire_minutes: i64,

    /// Lifetime of refresh tokens handed out at login.
    pub refresh_token_expire_days: i64,
}

impl Default for SecurityConfig {
    fn default() -> Self {
        Self {
            argon2_memory_cost_kib: 8192,
            argon2_time_cost: 3,
            argon2_parallelism: 1,
            access_token_expire_minutes: 30,
            refresh_token_expire_days: 7,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ImportConfig {
    /// Upper bound for the multipart body of a bulk upload.
    pub max_upload_bytes: usize,

    /// Upper bound for data rows in a single uploaded sheet.
    pub max_rows: usize,
}

impl Default for ImportConfig {
    fn default() -> Self {
        Self {
            max_upload_bytes: 10 * 1024 * 1024,
            max_rows: 10_000,
        }
    }
}

impl Config {
    pub fn load() -> Result<Self> {
        let paths = Self::config_paths();

        for path in &paths {
            if path.exists() {
                info!("Loading config from: {}", path.display());
                return Self::load_from_path(path);
            }
        }

        info!("No config file found, using defaults");
        Ok(Self::default())
    }

    pub fn load_from_path(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let config: Self = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;

        Ok(config)
    }

    pub fn save_to_path(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        info!("Config saved to: {}", path.display());
        Ok(())
    }

    fn config_paths() -> Vec<PathBuf> {
        let mut paths = vec![PathBuf::from("config.toml")];

        if let Some(config_dir) = dirs::config_dir() {
            paths.push(config_dir.join("integration-hub").join("config.toml"));
        }

        if let Some(home) = dirs::home_dir() {
            paths.push(home.join(".integration-hub").join("config.toml"));
        }

        paths
    }

    fn default_config_path() -> PathBuf {
        PathBuf::from("config.toml")
    }

    pub fn create_default_if_missing() -> Result<bool> {
        let path = Self::default_config_path();
        if path.exists() {
            Ok(false)
        } else {
            Self::default().save_to_path(&path)?;
            info!("Created default config file: {}", path.display());
            Ok(true)
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.server.port == 0 {
            anyhow::bail!("Server port must be > 0");
        }

        if self.security.access_token_expire_minutes <= 0
            || self.security.refresh_token_expire_days <= 0
        {
            anyhow::bail!("Token lifetimes must be positive");
        }

        if self.security.access_token_expire_minutes > MAX_ACCESS_TOKEN_MINUTES {
            anyhow::bail!(
                "access_token_expire_minutes cannot exceed {}",
                MAX_ACCESS_TOKEN_MINUTES
            );
        }

        if self.security.refresh_token_expire_days > MAX_REFRESH_TOKEN_DAYS {
            anyhow::bail!(
                "refresh_token_expire_days cannot exceed {}",
                MAX_REFRESH_TOKEN_DAYS
            );
        }

        if self.import.max_upload_bytes == 0 || self.import.max_rows == 0 {
            anyhow::bail!("Import limits must be > 0");
        }

        if self.general.max_db_connections < self.general.min_db_connections {
            anyhow::bail!("max_db_connections cannot be lower than min_db_connections");
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.server.port, 8000);
        assert_eq!(config.security.access_token_expire_minutes, 30);
        assert_eq!(config.import.max_rows, 10_000);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_token_lifetimes_are_bounded() {
        let mut config = Config::default();
        config.security.refresh_token_expire_days = MAX_REFRESH_TOKEN_DAYS;
        config.security.access_token_expire_minutes = MAX_ACCESS_TOKEN_MINUTES;
        assert!(config.validate().is_ok());

        config.security.refresh_token_expire_days = 100_000_000;
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("refresh_token_expire_days"));

        config.security.refresh_token_expire_days = 7;
        config.security.access_token_expire_minutes = MAX_ACCESS_TOKEN_MINUTES + 1;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_config_serialization() {
        let config = Config::default();
        let toml_str = toml::to_string_pretty(&config).unwrap();
        assert!(toml_str.contains("[general]"));
        assert!(toml_str.contains("[security]"));
        assert!(toml_str.contains("[import]"));
    }

    #[test]
    fn test_config_deserialization() {
        let toml_str = r#"
            [general]
            log_level = "debug"

            [import]
            max_rows = 50
        "#;

        let config: Config = toml::from_str(toml_str).unwrap();
        assert_eq!(config.general.log_level, "debug");
        assert_eq!(config.import.max_rows, 50);

        assert_eq!(config.server.port, 8000);
        assert_eq!(config.import.max_upload_bytes, 10 * 1024 * 1024);
    }

    #[test]
    fn test_validate_rejects_zero_limits() {
        let mut config = Config::default();
        config.import.max_rows = 0;
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.security.access_token_expire_minutes = 0;
        assert!(config.validate().is_err());
    }
}
