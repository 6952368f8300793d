//! Provider service configuration.
//!
//! Configuration is loaded from environment variables. Paths to key material
//! are redacted in Debug output.

use std::collections::HashMap;
use std::env;
use std::fmt;
use std::path::PathBuf;
use thiserror::Error;

/// Default plain service registry base URI.
pub const DEFAULT_REGISTRY_BASE_URI: &str = "http://10.0.0.10:8442/serviceregistry/";

/// Default secure service registry base URI.
pub const DEFAULT_REGISTRY_BASE_URI_HTTPS: &str = "https://10.0.0.10:8443/serviceregistry/";

/// Default advertised IPv4 address.
pub const DEFAULT_ADDRESS: &str = "10.0.0.11";

/// Default advertised IPv6 address, used when no IPv4 address is configured.
pub const DEFAULT_ADDRESS6: &str = "[::1]";

/// Default plain provider port. The secure listener uses the next port.
pub const DEFAULT_PORT: u16 = 8452;

/// Default listen host for the plain listener.
pub const DEFAULT_BIND_HOST: &str = "0.0.0.0";

/// Default listen host for the secure listener. It trusts the client DN
/// header, so only the TLS terminator in front of it may reach it.
pub const DEFAULT_SECURE_BIND_HOST: &str = "127.0.0.1";

/// Default lookup table file.
pub const DEFAULT_LOOKUP_PATH: &str = "provider_tables.json";

/// Default timeout for registry calls in seconds.
pub const DEFAULT_REGISTRY_TIMEOUT_SECONDS: u64 = 10;

/// Maximum accepted registry timeout in seconds.
pub const MAX_REGISTRY_TIMEOUT_SECONDS: u64 = 300;

/// Provider service configuration.
#[derive(Clone)]
pub struct Config {
    /// Plain registry base URI (e.g. "http://10.0.0.10:8442/serviceregistry/").
    pub registry_base_uri: String,

    /// Secure registry base URI.
    pub registry_base_uri_https: String,

    /// Talk to the registry through the secure base URI.
    pub secure_registry: bool,

    /// Address advertised to the registry. Falls back to the IPv6 address
    /// when the IPv4 address is configured empty.
    pub address: String,

    /// Plain listener port.
    pub port: u16,

    /// Host the plain listener binds to.
    pub bind_host: String,

    /// Host the secure listener binds to.
    pub secure_bind_host: String,

    /// JSON file holding the mote and service lookup tables.
    pub lookup_path: PathBuf,

    /// Public key of the authorization system, used to verify token signatures.
    /// Without it every secure read is denied.
    pub authorization_public_key_path: Option<PathBuf>,

    /// PEM bundle (certificate + private key) presented to the secure registry.
    pub registry_client_identity_path: Option<PathBuf>,

    /// Additional trust root for the secure registry.
    pub registry_ca_cert_path: Option<PathBuf>,

    /// Timeout for registry HTTP calls in seconds.
    pub registry_timeout_seconds: u64,

    /// Executable used to publish MQTT-translated readings.
    pub mqtt_publish_command: Option<String>,
}

/// Custom Debug implementation that redacts key material locations.
impl fmt::Debug for Config {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Config")
            .field("registry_base_uri", &self.registry_base_uri)
            .field("registry_base_uri_https", &self.registry_base_uri_https)
            .field("secure_registry", &self.secure_registry)
            .field("address", &self.address)
            .field("port", &self.port)
            .field("bind_host", &self.bind_host)
            .field("secure_bind_host", &self.secure_bind_host)
            .field("lookup_path", &self.lookup_path)
            .field(
                "authorization_public_key_path",
                &self.authorization_public_key_path.as_ref().map(|_| "[REDACTED]"),
            )
            .field(
                "registry_client_identity_path",
                &self.registry_client_identity_path.as_ref().map(|_| "[REDACTED]"),
            )
            .field("registry_ca_cert_path", &self.registry_ca_cert_path)
            .field("registry_timeout_seconds", &self.registry_timeout_seconds)
            .field("mqtt_publish_command", &self.mqtt_publish_command)
            .finish()
    }
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Invalid value for {0}: {1}")]
    InvalidValue(String, String),
}

impl Config {
    /// Load configuration from environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_vars(&env::vars().collect())
    }

    /// Load configuration from a HashMap (for testing).
    pub fn from_vars(vars: &HashMap<String, String>) -> Result<Self, ConfigError> {
        let registry_base_uri = vars
            .get("SR_BASE_URI")
            .cloned()
            .unwrap_or_else(|| DEFAULT_REGISTRY_BASE_URI.to_string());

        let registry_base_uri_https = vars
            .get("SR_BASE_URI_HTTPS")
            .cloned()
            .unwrap_or_else(|| DEFAULT_REGISTRY_BASE_URI_HTTPS.to_string());

        for (name, value) in [
            ("SR_BASE_URI", &registry_base_uri),
            ("SR_BASE_URI_HTTPS", &registry_base_uri_https),
        ] {
            if !value.starts_with("http://") && !value.starts_with("https://") {
                return Err(ConfigError::InvalidValue(
                    name.to_string(),
                    format!("'{}' is not an http(s) URI", value),
                ));
            }
        }

        let secure_registry = match vars.get("PROVIDER_SECURE_REGISTRY") {
            Some(value) => parse_bool("PROVIDER_SECURE_REGISTRY", value)?,
            None => false,
        };

        let address4 = vars
            .get("PROVIDER_ADDRESS")
            .cloned()
            .unwrap_or_else(|| DEFAULT_ADDRESS.to_string());
        let address6 = vars
            .get("PROVIDER_ADDRESS6")
            .cloned()
            .unwrap_or_else(|| DEFAULT_ADDRESS6.to_string());
        let address = if address4.trim().is_empty() {
            address6
        } else {
            address4
        };
        if address.trim().is_empty() {
            return Err(ConfigError::InvalidValue(
                "PROVIDER_ADDRESS".to_string(),
                "no IPv4 or IPv6 address configured".to_string(),
            ));
        }

        let port = match vars.get("PROVIDER_PORT") {
            Some(value) => value.parse::<u16>().map_err(|e| {
                ConfigError::InvalidValue(
                    "PROVIDER_PORT".to_string(),
                    format!("'{}' is not a valid port: {}", value, e),
                )
            })?,
            None => DEFAULT_PORT,
        };
        // The secure listener needs the adjacent port.
        if port == 0 || port == u16::MAX {
            return Err(ConfigError::InvalidValue(
                "PROVIDER_PORT".to_string(),
                format!("{} leaves no room for the secure port", port),
            ));
        }

        let bind_host = vars
            .get("PROVIDER_BIND_HOST")
            .cloned()
            .unwrap_or_else(|| DEFAULT_BIND_HOST.to_string());
        let secure_bind_host = vars
            .get("PROVIDER_SECURE_BIND_HOST")
            .cloned()
            .unwrap_or_else(|| DEFAULT_SECURE_BIND_HOST.to_string());

        let lookup_path = vars
            .get("PROVIDER_LOOKUP_PATH")
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from(DEFAULT_LOOKUP_PATH));

        let authorization_public_key_path = optional_path(vars, "AUTHORIZATION_PUBLIC_KEY_PATH");
        let registry_client_identity_path = optional_path(vars, "REGISTRY_CLIENT_IDENTITY_PATH");
        let registry_ca_cert_path = optional_path(vars, "REGISTRY_CA_CERT_PATH");

        let registry_timeout_seconds = match vars.get("REGISTRY_TIMEOUT_SECONDS") {
            Some(value) => {
                let secs = value.parse::<u64>().map_err(|e| {
                    ConfigError::InvalidValue(
                        "REGISTRY_TIMEOUT_SECONDS".to_string(),
                        format!("'{}' is not a number: {}", value, e),
                    )
                })?;
                if secs == 0 || secs > MAX_REGISTRY_TIMEOUT_SECONDS {
                    return Err(ConfigError::InvalidValue(
                        "REGISTRY_TIMEOUT_SECONDS".to_string(),
                        format!("must be between 1 and {}", MAX_REGISTRY_TIMEOUT_SECONDS),
                    ));
                }
                secs
            }
            None => DEFAULT_REGISTRY_TIMEOUT_SECONDS,
        };

        let mqtt_publish_command = vars
            .get("MQTT_PUBLISH_COMMAND")
            .filter(|s| !s.trim().is_empty())
            .cloned();

        Ok(Config {
            registry_base_uri,
            registry_base_uri_https,
            secure_registry,
            address,
            port,
            bind_host,
            secure_bind_host,
            lookup_path,
            authorization_public_key_path,
            registry_client_identity_path,
            registry_ca_cert_path,
            registry_timeout_seconds,
            mqtt_publish_command,
        })
    }

    /// Port of the secure (token-gated) listener.
    pub fn secure_port(&self) -> u16 {
        self.port.saturating_add(1)
    }
}

fn optional_path(vars: &HashMap<String, String>, name: &str) -> Option<PathBuf> {
    vars.get(name)
        .filter(|s| !s.trim().is_empty())
        .map(PathBuf::from)
}

fn parse_bool(name: &str, value: &str) -> Result<bool, ConfigError> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(ConfigError::InvalidValue(
            name.to_string(),
            format!("'{}' is not a boolean", value),
        )),
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    fn vars(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn test_defaults() {
        let config = Config::from_vars(&HashMap::new()).unwrap();

        assert_eq!(config.registry_base_uri, DEFAULT_REGISTRY_BASE_URI);
        assert_eq!(config.registry_base_uri_https, DEFAULT_REGISTRY_BASE_URI_HTTPS);
        assert!(!config.secure_registry);
        assert_eq!(config.address, "10.0.0.11");
        assert_eq!(config.port, 8452);
        assert_eq!(config.secure_port(), 8453);
        assert_eq!(config.lookup_path, PathBuf::from(DEFAULT_LOOKUP_PATH));
        assert!(config.authorization_public_key_path.is_none());
        assert_eq!(config.registry_timeout_seconds, DEFAULT_REGISTRY_TIMEOUT_SECONDS);
        assert!(config.mqtt_publish_command.is_none());
    }

    #[test]
    fn test_secure_listener_binds_loopback_by_default() {
        let config = Config::from_vars(&vars(&[("PROVIDER_BIND_HOST", "0.0.0.0")])).unwrap();
        assert_eq!(config.bind_host, "0.0.0.0");
        assert_eq!(config.secure_bind_host, "127.0.0.1");

        let config =
            Config::from_vars(&vars(&[("PROVIDER_SECURE_BIND_HOST", "10.0.0.11")])).unwrap();
        assert_eq!(config.secure_bind_host, "10.0.0.11");
    }

    #[test]
    fn test_empty_ipv4_falls_back_to_ipv6() {
        let config = Config::from_vars(&vars(&[
            ("PROVIDER_ADDRESS", ""),
            ("PROVIDER_ADDRESS6", "[fe80::1]"),
        ]))
        .unwrap();

        assert_eq!(config.address, "[fe80::1]");
    }

    #[test]
    fn test_no_address_at_all_is_rejected() {
        let result = Config::from_vars(&vars(&[
            ("PROVIDER_ADDRESS", ""),
            ("PROVIDER_ADDRESS6", " "),
        ]));

        assert!(matches!(result, Err(ConfigError::InvalidValue(name, _)) if name == "PROVIDER_ADDRESS"));
    }

    #[test]
    fn test_invalid_port() {
        let result = Config::from_vars(&vars(&[("PROVIDER_PORT", "http")]));
        assert!(matches!(result, Err(ConfigError::InvalidValue(name, _)) if name == "PROVIDER_PORT"));

        let result = Config::from_vars(&vars(&[("PROVIDER_PORT", "65535")]));
        assert!(result.is_err(), "no room for the secure port");
    }

    #[test]
    fn test_secure_registry_flag() {
        let config = Config::from_vars(&vars(&[("PROVIDER_SECURE_REGISTRY", "true")])).unwrap();
        assert!(config.secure_registry);

        let result = Config::from_vars(&vars(&[("PROVIDER_SECURE_REGISTRY", "maybe")]));
        assert!(result.is_err());
    }

    #[test]
    fn test_registry_uri_must_be_http() {
        let result = Config::from_vars(&vars(&[("SR_BASE_URI", "ftp://registry/")]));
        assert!(matches!(result, Err(ConfigError::InvalidValue(name, _)) if name == "SR_BASE_URI"));
    }

    #[test]
    fn test_registry_timeout_bounds() {
        let config = Config::from_vars(&vars(&[("REGISTRY_TIMEOUT_SECONDS", "3")])).unwrap();
        assert_eq!(config.registry_timeout_seconds, 3);

        assert!(Config::from_vars(&vars(&[("REGISTRY_TIMEOUT_SECONDS", "0")])).is_err());
        assert!(Config::from_vars(&vars(&[("REGISTRY_TIMEOUT_SECONDS", "301")])).is_err());
    }

    #[test]
    fn test_empty_optional_paths_are_none() {
        let config = Config::from_vars(&vars(&[
            ("AUTHORIZATION_PUBLIC_KEY_PATH", ""),
            ("MQTT_PUBLISH_COMMAND", "  "),
        ]))
        .unwrap();

        assert!(config.authorization_public_key_path.is_none());
        assert!(config.mqtt_publish_command.is_none());
    }

    #[test]
    fn test_debug_redacts_key_paths() {
        let config = Config::from_vars(&vars(&[
            ("AUTHORIZATION_PUBLIC_KEY_PATH", "/etc/keys/authorization.pub"),
            ("REGISTRY_CLIENT_IDENTITY_PATH", "/etc/keys/client.pem"),
        ]))
        .unwrap();

        let debug = format!("{:?}", config);
        assert!(!debug.contains("/etc/keys/authorization.pub"));
        assert!(!debug.contains("/etc/keys/client.pem"));
        assert!(debug.contains("[REDACTED]"));
    }
}
