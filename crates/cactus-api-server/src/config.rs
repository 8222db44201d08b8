//! API server configuration
//!
//! Loaded from TOML, optionally overridden from the command line, then
//! validated once. Nothing reads configuration after startup.

use std::path::Path;

use axum::http::HeaderValue;
use cactus_authz::AuthorizationConfig;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::ConfigError;

fn default_api_host() -> String {
    "127.0.0.1".to_string()
}

fn default_api_port() -> u16 {
    4000
}

fn default_api_cors_domain_csv() -> String {
    "*".to_string()
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_realtime_heartbeat_ms() -> u64 {
    1_000
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuthorizationProtocol {
    /// Every endpoint is open
    None,
    #[default]
    JsonWebToken,
}

/// One plugin instance to create at startup
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PluginImport {
    pub package_name: String,

    /// Constructor options of the package
    #[serde(default)]
    pub options: Value,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ApiServerConfig {
    #[serde(default = "default_api_host")]
    pub api_host: String,

    #[serde(default = "default_api_port")]
    pub api_port: u16,

    /// Allowed CORS origins, comma separated. `*` allows any origin.
    #[serde(default = "default_api_cors_domain_csv")]
    pub api_cors_domain_csv: String,

    #[serde(default = "default_log_level")]
    pub log_level: String,

    #[serde(default)]
    pub authorization_protocol: AuthorizationProtocol,

    /// Required when `authorization_protocol` is `json_web_token`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub authorization_config: Option<AuthorizationConfig>,

    /// Interval between health checks on the watch channel
    #[serde(default = "default_realtime_heartbeat_ms")]
    pub realtime_heartbeat_ms: u64,

    #[serde(default)]
    pub plugins: Vec<PluginImport>,
}

impl ApiServerConfig {
    /// Config that serves every endpoint without authorization
    pub fn unprotected() -> Self {
        Self {
            api_host: default_api_host(),
            api_port: default_api_port(),
            api_cors_domain_csv: default_api_cors_domain_csv(),
            log_level: default_log_level(),
            authorization_protocol: AuthorizationProtocol::None,
            authorization_config: None,
            realtime_heartbeat_ms: default_realtime_heartbeat_ms(),
            plugins: Vec::new(),
        }
    }

    /// Config that puts the gatekeeper in front of every endpoint
    pub fn with_authorization(authorization_config: AuthorizationConfig) -> Self {
        Self {
            authorization_protocol: AuthorizationProtocol::JsonWebToken,
            authorization_config: Some(authorization_config),
            ..Self::unprotected()
        }
    }

    /// Parse and validate a TOML document
    pub fn from_toml_str(source: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(source)?;
        config.validate()?;
        Ok(config)
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let source = std::fs::read_to_string(path).map_err(|e| ConfigError::Read {
            path: path.display().to_string(),
            reason: e.to_string(),
        })?;
        Self::from_toml_str(&source)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.api_host.trim().is_empty() {
            return Err(ConfigError::Invalid("api_host must not be blank".into()));
        }
        self.log_level
            .parse::<tracing::Level>()
            .map_err(|_| ConfigError::Invalid(format!("unknown log_level {:?}", self.log_level)))?;
        if self.realtime_heartbeat_ms == 0 {
            return Err(ConfigError::Invalid(
                "realtime_heartbeat_ms must be greater than zero".into(),
            ));
        }
        self.cors_origins()?;

        match (self.authorization_protocol, &self.authorization_config) {
            (AuthorizationProtocol::JsonWebToken, None) => {
                return Err(ConfigError::Invalid(
                    "authorization_config is required for json_web_token".into(),
                ));
            }
            (AuthorizationProtocol::JsonWebToken, Some(authz)) => authz.validate()?,
            (AuthorizationProtocol::None, _) => {}
        }

        for import in &self.plugins {
            if import.package_name.trim().is_empty() {
                return Err(ConfigError::Invalid("plugin package_name must not be blank".into()));
            }
        }
        Ok(())
    }

    /// Allowed origins, or `None` for any origin
    pub fn cors_origins(&self) -> Result<Option<Vec<HeaderValue>>, ConfigError> {
        let domains: Vec<&str> = self
            .api_cors_domain_csv
            .split(',')
            .map(str::trim)
            .filter(|d| !d.is_empty())
            .collect();
        if domains.is_empty() {
            return Err(ConfigError::Invalid("api_cors_domain_csv is empty".into()));
        }
        if domains.contains(&"*") {
            return Ok(None);
        }
        domains
            .into_iter()
            .map(|d| {
                HeaderValue::from_str(d)
                    .map_err(|_| ConfigError::Invalid(format!("invalid CORS origin {:?}", d)))
            })
            .collect::<Result<Vec<_>, _>>()
            .map(Some)
    }

    /// Where persistent channels are served
    pub fn realtime_channel_path(&self) -> String {
        self.authorization_config
            .as_ref()
            .map(|authz| authz.realtime_channel_path.clone())
            .unwrap_or_else(cactus_authz::config::default_realtime_channel_path)
    }

    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.api_host, self.api_port)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const JWT_CONFIG: &str = r#"
api_port = 0
api_cors_domain_csv = "https://example.com, https://other.example.com"

[authorization_config]
unprotected_endpoint_exemptions = ["/api/v1/api-server/healthcheck"]

[authorization_config.token_validation]
algorithms = ["HS256"]
secret_or_public_key = "secret"
issuer = "hyperledger-labs"
audience = "carbon-accounting-tool"

[[plugins]]
package_name = "cactus-plugin-keychain-memory"
options = { instanceId = "keychain-1", keychainId = "kc" }
"#;

    #[test]
    fn test_defaults_and_toml() {
        let config = ApiServerConfig::from_toml_str(JWT_CONFIG).unwrap();
        assert_eq!(config.api_host, "127.0.0.1");
        assert_eq!(config.api_port, 0);
        assert_eq!(config.authorization_protocol, AuthorizationProtocol::JsonWebToken);
        assert_eq!(config.realtime_heartbeat_ms, 1_000);
        assert_eq!(config.realtime_channel_path(), "/api/v1/async");
        assert_eq!(config.plugins.len(), 1);
        assert_eq!(config.plugins[0].options["keychainId"], "kc");
        assert_eq!(config.cors_origins().unwrap().unwrap().len(), 2);
    }

    #[test]
    fn test_json_web_token_requires_authorization_config() {
        let err = ApiServerConfig::from_toml_str("api_port = 4000").unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(_)));

        let open = ApiServerConfig::from_toml_str("authorization_protocol = \"none\"").unwrap();
        assert_eq!(open.cors_origins().unwrap(), None);
    }

    #[test]
    fn test_unknown_fields_rejected() {
        let err = ApiServerConfig::from_toml_str("authorization_protocol = \"none\"\nbogus = 1")
            .unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
    }

    #[test]
    fn test_invalid_values_rejected() {
        for source in [
            "authorization_protocol = \"none\"\nlog_level = \"chatty\"",
            "authorization_protocol = \"none\"\nrealtime_heartbeat_ms = 0",
            "authorization_protocol = \"none\"\napi_host = \" \"",
            "authorization_protocol = \"none\"\napi_cors_domain_csv = \" , \"",
        ] {
            assert!(
                matches!(ApiServerConfig::from_toml_str(source), Err(ConfigError::Invalid(_))),
                "{}",
                source
            );
        }
    }

    #[test]
    fn test_mixed_key_families_rejected() {
        let source = JWT_CONFIG.replace(r#"["HS256"]"#, r#"["HS256", "RS256"]"#);
        assert!(matches!(
            ApiServerConfig::from_toml_str(&source),
            Err(ConfigError::Invalid(_))
        ));
    }
}
