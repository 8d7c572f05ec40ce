//! TOML file configuration structures.
//!
//! These structs directly map to the `fanpay-config.toml` file format.

use fanpay_core::config::EngineConfig;
use serde::{Deserialize, Serialize};
use std::net::{Ipv4Addr, SocketAddr};
use url::Url;

/// Root configuration structure as read from the TOML file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FileConfig {
    #[serde(default)]
    pub server: ServerConfig,
    pub admin: AdminConfig,
    pub service: ServiceConfig,
    pub gateway: GatewayConfig,
    #[serde(default)]
    pub engine: EngineConfig,
}

/// Server configuration section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// The address and port to listen on (e.g., "0.0.0.0:8080").
    #[serde(default = "default_listen_addr")]
    pub listen: SocketAddr,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            listen: default_listen_addr(),
        }
    }
}

fn default_listen_addr() -> SocketAddr {
    SocketAddr::from((Ipv4Addr::UNSPECIFIED, 8080))
}

/// Admin configuration section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AdminConfig {
    /// The operator secret. If this is plaintext (doesn't start with `$argon2`),
    /// it will be hashed and the config file will be rewritten.
    pub secret: String,
}

/// Credentials of the platform backend calling the service API.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServiceConfig {
    /// Shared secret for HMAC request signing.
    pub secret: String,
}

/// Payment gateway connection. The secret key comes from
/// `FANPAY_GATEWAY_SECRET_KEY`, never from the file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GatewayConfig {
    pub base_url: Url,
}

impl FileConfig {
    /// Check if the admin secret is already hashed (argon2 format).
    pub fn is_admin_secret_hashed(&self) -> bool {
        self.admin.secret.starts_with("$argon2")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_parsing() {
        let toml_str = r#"
[server]
listen = "127.0.0.1:3000"

[admin]
secret = "test-secret"

[service]
secret = "service-secret"

[gateway]
base_url = "https://api.stripe.com/"

[engine]
currency = "eur"
batch_min_amount = 2500

[engine.fees]
tip = { creator_percent = 85, platform_percent = 15 }

[engine.schedule]
failover_sweep_secs = 30
"#;
        let config: FileConfig = toml::from_str(toml_str).unwrap();
        assert_eq!(config.server.listen.port(), 3000);
        assert_eq!(config.service.secret, "service-secret");
        assert_eq!(config.gateway.base_url.host_str(), Some("api.stripe.com"));
        assert_eq!(config.engine.currency, "eur");
        assert_eq!(config.engine.batch_min_amount, 2500);
        assert_eq!(config.engine.fees.tip.creator_percent, 85);
        assert_eq!(config.engine.schedule.failover_sweep_secs, 30);
        assert_eq!(config.engine.schedule.batch_payouts_secs, 24 * 3600);
        assert!(!config.is_admin_secret_hashed());
        config.engine.validate().unwrap();
    }

    #[test]
    fn engine_section_is_optional() {
        let toml_str = r#"
[admin]
secret = "test-secret"

[service]
secret = "service-secret"

[gateway]
base_url = "http://localhost:12111/"
"#;
        let config: FileConfig = toml::from_str(toml_str).unwrap();
        assert_eq!(config.server.listen, default_listen_addr());
        assert_eq!(config.engine, EngineConfig::default());
    }

    #[test]
    fn test_hashed_secret_detection() {
        let config = FileConfig {
            server: ServerConfig::default(),
            admin: AdminConfig {
                secret: "$argon2id$v=19$m=19456,t=2,p=1$abc123".to_string(),
            },
            service: ServiceConfig {
                secret: "service-secret".to_string(),
            },
            gateway: GatewayConfig {
                base_url: Url::parse("http://localhost:12111/").unwrap(),
            },
            engine: EngineConfig::default(),
        };
        assert!(config.is_admin_secret_hashed());
    }

    #[test]
    fn config_round_trips_through_pretty_toml() {
        let toml_str = r#"
[admin]
secret = "test-secret"

[service]
secret = "service-secret"

[gateway]
base_url = "http://localhost:12111/"
"#;
        let config: FileConfig = toml::from_str(toml_str).unwrap();
        let rewritten = toml::to_string_pretty(&config).unwrap();
        let reparsed: FileConfig = toml::from_str(&rewritten).unwrap();
        assert_eq!(reparsed.engine, config.engine);
        assert_eq!(reparsed.admin.secret, "test-secret");
    }
}
