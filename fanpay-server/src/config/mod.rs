//! Configuration module for fanpay-server.
//!
//! Handles loading configuration from TOML files, CLI arguments,
//! and environment variables. Also handles admin secret hashing.

mod credentials;
pub mod file;
pub mod runtime;

use crate::config::file::FileConfig;
use crate::config::runtime::{GatewayConfig, OperatorCredentials, ServerConfig, ServiceConfig};
use fanpay_core::config::EngineConfig;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Errors that can occur during configuration loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file: {0}")]
    IoError(#[from] std::io::Error),

    #[error("failed to parse config file: {0}")]
    ParseError(#[from] toml::de::Error),

    #[error("failed to serialize config: {0}")]
    SerializeError(#[from] toml::ser::Error),

    #[error("validation error: {0}")]
    ValidationError(String),

    #[error("invalid engine configuration: {0}")]
    EngineError(#[from] fanpay_core::config::ConfigError),

    #[error("password hashing error: {0}")]
    HashError(String),

    #[error("DATABASE_URL environment variable not set")]
    MissingDatabaseUrl,

    #[error("FANPAY_GATEWAY_SECRET_KEY environment variable not set")]
    MissingGatewaySecret,
}

/// Loaded configuration result containing all parts.
#[derive(Debug)]
pub struct LoadedConfig {
    pub server: ServerConfig,
    pub admin: OperatorCredentials,
    pub service: ServiceConfig,
    pub gateway: GatewayConfig,
    pub engine: EngineConfig,
}

/// Configuration loader that handles the complete loading process.
pub struct ConfigLoader {
    config_path: PathBuf,
    listen_override: Option<SocketAddr>,
}

impl ConfigLoader {
    /// Create a new config loader.
    pub fn new(config_path: impl AsRef<Path>, listen_override: Option<SocketAddr>) -> Self {
        Self {
            config_path: config_path.as_ref().to_path_buf(),
            listen_override,
        }
    }

    /// Load and process the configuration.
    ///
    /// This will:
    /// 1. Read the TOML file
    /// 2. Apply CLI overrides
    /// 3. Validate the configuration
    /// 4. Hash the admin secret if it's plaintext (and rewrite the file)
    /// 5. Build the loaded configuration
    pub fn load(&self) -> Result<LoadedConfig, ConfigError> {
        let config_content = std::fs::read_to_string(&self.config_path)?;
        let mut file_config: FileConfig = toml::from_str(&config_content)?;

        if let Some(listen) = self.listen_override {
            file_config.server.listen = listen;
        }

        self.validate(&file_config)?;

        let admin = if file_config.is_admin_secret_hashed() {
            OperatorCredentials::from_hash(file_config.admin.secret.clone())
        } else {
            let admin = OperatorCredentials::hash_plaintext(&file_config.admin.secret)?;
            file_config.admin.secret = admin.secret_hash().to_string();
            self.rewrite_config(&file_config)?;
            tracing::info!("Admin secret hashed and config file updated");
            admin
        };

        Ok(build_loaded_config(file_config, admin))
    }

    /// Reload the configuration (used during SIGHUP).
    pub fn reload(&self) -> Result<LoadedConfig, ConfigError> {
        self.load()
    }

    fn validate(&self, config: &FileConfig) -> Result<(), ConfigError> {
        if config.admin.secret.is_empty() {
            return Err(ConfigError::ValidationError(
                "admin.secret must not be empty".to_string(),
            ));
        }
        if config.service.secret.len() < 16 {
            return Err(ConfigError::ValidationError(
                "service.secret must be at least 16 bytes".to_string(),
            ));
        }
        config.engine.validate()?;
        Ok(())
    }

    fn rewrite_config(&self, config: &FileConfig) -> Result<(), ConfigError> {
        let toml_string = toml::to_string_pretty(config)?;

        // Write atomically: write to temp file, then rename
        let temp_path = self.config_path.with_extension("toml.tmp");
        std::fs::write(&temp_path, toml_string)?;
        std::fs::rename(&temp_path, &self.config_path)?;

        Ok(())
    }
}

fn build_loaded_config(file_config: FileConfig, admin: OperatorCredentials) -> LoadedConfig {
    LoadedConfig {
        server: ServerConfig {
            listen: file_config.server.listen,
        },
        admin,
        service: ServiceConfig::new(file_config.service.secret.into_bytes()),
        gateway: GatewayConfig {
            base_url: file_config.gateway.base_url,
        },
        engine: file_config.engine,
    }
}

/// Get the database URL from the environment.
pub fn get_database_url() -> Result<String, ConfigError> {
    std::env::var("DATABASE_URL").map_err(|_| ConfigError::MissingDatabaseUrl)
}

/// Get the payment gateway secret key from the environment.
pub fn get_gateway_secret() -> Result<String, ConfigError> {
    std::env::var("FANPAY_GATEWAY_SECRET_KEY")
        .ok()
        .filter(|key| !key.is_empty())
        .ok_or(ConfigError::MissingGatewaySecret)
}

#[cfg(test)]
mod tests {
    use super::*;

    const CONFIG: &str = r#"
[server]
listen = "127.0.0.1:3000"

[admin]
secret = "operator-password"

[service]
secret = "0123456789abcdef0123"

[gateway]
base_url = "http://localhost:12111/"
"#;

    fn write_config(name: &str, contents: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(format!("fanpay-config-{}", uuid::Uuid::new_v4()));
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join(name);
        std::fs::write(&path, contents).unwrap();
        path
    }

    #[test]
    fn plaintext_admin_secret_is_hashed_and_rewritten() {
        let path = write_config("fanpay-config.toml", CONFIG);
        let loader = ConfigLoader::new(&path, None);

        let loaded = loader.load().unwrap();
        assert!(loaded.admin.secret_hash().starts_with("$argon2"));
        assert!(loaded.admin.verify("operator-password"));
        assert_eq!(loaded.service.secret_bytes(), b"0123456789abcdef0123");

        let rewritten = std::fs::read_to_string(&path).unwrap();
        assert!(!rewritten.contains("operator-password"));
        assert!(!path.with_extension("toml.tmp").exists());

        // A second load keeps the existing hash.
        let reloaded = loader.reload().unwrap();
        assert_eq!(reloaded.admin.secret_hash(), loaded.admin.secret_hash());
    }

    #[test]
    fn listen_override_wins() {
        let path = write_config("fanpay-config.toml", CONFIG);
        let listen: SocketAddr = "127.0.0.1:9999".parse().unwrap();
        let loaded = ConfigLoader::new(&path, Some(listen)).load().unwrap();
        assert_eq!(loaded.server.listen, listen);
    }

    #[test]
    fn invalid_engine_section_is_rejected() {
        let contents = format!("{CONFIG}\n[engine.failover]\ncapacity = 0\n");
        let path = write_config("fanpay-config.toml", &contents);
        let err = ConfigLoader::new(&path, None).load().unwrap_err();
        assert!(matches!(err, ConfigError::EngineError(_)));
    }

    #[test]
    fn short_service_secret_is_rejected() {
        let contents = CONFIG.replace("0123456789abcdef0123", "short");
        let path = write_config("fanpay-config.toml", &contents);
        let err = ConfigLoader::new(&path, None).load().unwrap_err();
        assert!(matches!(err, ConfigError::ValidationError(_)));
    }
}
