//! Configuration for the sprinkler bridge
//!
//! A single TOML file with an `[mqtt]` and a `[relays]` section. Every field
//! has a default, so the bridge also runs with no file at all, taking the
//! broker host from the environment. Secrets never live in the file: it
//! names the environment variables that hold them.

use crate::relay::{RelayMap, RelayMapError};
use crate::transport::mqtt::Credentials;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;
use uuid::Uuid;

/// Paths searched, in order, when no configuration file is given
pub const DEFAULT_CONFIG_PATHS: &[&str] = &["sprinkler-bridge.toml", "config/sprinkler-bridge.toml"];

const DEFAULT_MQTT_PORT: u16 = 1883;
const DEFAULT_MQTTS_PORT: u16 = 8883;

/// rumqttc rejects keep-alive intervals shorter than this
const MIN_KEEP_ALIVE_SECS: u64 = 5;

/// Main bridge configuration structure
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(default)]
pub struct BridgeConfig {
    pub mqtt: MqttSection,
    pub relays: RelaySection,
}

/// MQTT section
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct MqttSection {
    /// Broker URL (`mqtt://host:port` or `mqtts://host:port`); overrides the host env var
    #[serde(skip_serializing_if = "Option::is_none")]
    pub broker_url: Option<String>,
    /// Environment variable containing the broker host name
    pub broker_host_env: String,
    /// Broker port used with the host env var
    pub port: u16,
    /// Command topic
    pub topic: String,
    /// Client identifier prefix; a per-process suffix is appended
    pub client_id_prefix: String,
    /// Environment variable containing username
    #[serde(skip_serializing_if = "Option::is_none")]
    pub username_env: Option<String>,
    /// Environment variable containing password
    #[serde(skip_serializing_if = "Option::is_none")]
    pub password_env: Option<String>,
    pub keep_alive_secs: u64,
    /// How long one connect attempt waits for the broker's acknowledgement
    pub connect_timeout_secs: u64,
    /// Fixed delay between failed connection attempts
    pub reconnect_delay_secs: u64,
    pub fail_fast_on_initial_connect: bool,
    pub ignore_retained: bool,
}

impl Default for MqttSection {
    fn default() -> Self {
        Self {
            broker_url: None,
            broker_host_env: "MQTT_BROKER_HOST".to_string(),
            port: DEFAULT_MQTT_PORT,
            topic: "rpi-sprinkler/relays/set".to_string(),
            client_id_prefix: "rpi-sprinkler".to_string(),
            username_env: Some("MQTT_USERNAME".to_string()),
            password_env: Some("MQTT_PASSWORD".to_string()),
            keep_alive_secs: 60,
            connect_timeout_secs: 10,
            reconnect_delay_secs: 15,
            fail_fast_on_initial_connect: false,
            ignore_retained: false,
        }
    }
}

/// Relay section: relay number (as a string key) to BCM GPIO line
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct RelaySection {
    pub pins: BTreeMap<String, u8>,
}

impl Default for RelaySection {
    fn default() -> Self {
        Self {
            pins: RelayMap::pi_relay_6()
                .iter()
                .map(|(relay, pin)| (relay.to_string(), pin.get()))
                .collect(),
        }
    }
}

/// Where to reach the broker
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BrokerEndpoint {
    pub host: String,
    pub port: u16,
    pub tls: bool,
}

impl BrokerEndpoint {
    /// Parse a `mqtt://` / `mqtts://` broker URL
    pub fn parse(broker_url: &str) -> Result<Self, ConfigError> {
        let url = url::Url::parse(broker_url)
            .map_err(|e| ConfigError::InvalidBrokerUrl(format!("{broker_url}: {e}")))?;

        let (tls, default_port) = match url.scheme() {
            "mqtt" | "tcp" => (false, DEFAULT_MQTT_PORT),
            "mqtts" | "ssl" => (true, DEFAULT_MQTTS_PORT),
            scheme => {
                return Err(ConfigError::InvalidBrokerUrl(format!(
                    "{broker_url}: unsupported scheme '{scheme}'"
                )))
            }
        };

        let host = url
            .host_str()
            .filter(|host| !host.is_empty())
            .ok_or_else(|| ConfigError::InvalidBrokerUrl(format!("{broker_url}: missing host")))?;

        Ok(Self {
            host: host.to_string(),
            port: url.port().unwrap_or(default_port),
            tls,
        })
    }
}

/// Configuration loading errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    FileRead(#[from] std::io::Error),
    #[error("Failed to parse TOML: {0}")]
    TomlParse(#[from] toml::de::Error),
    #[error("Failed to render TOML: {0}")]
    TomlRender(#[from] toml::ser::Error),
    #[error("Invalid relay number: {0}")]
    InvalidRelay(String),
    #[error("Invalid relay map: {0}")]
    RelayMap(#[from] RelayMapError),
    #[error("Invalid command topic: {0}")]
    InvalidTopic(String),
    #[error("Invalid broker URL: {0}")]
    InvalidBrokerUrl(String),
    #[error("No broker configured: set broker_url or the {0} environment variable")]
    MissingBroker(String),
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
}

impl BridgeConfig {
    /// Load configuration from a TOML file and validate it
    pub fn load_from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml_str(&content)
    }

    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        let config: BridgeConfig = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Load the explicit path if given, else the first default path that
    /// exists, else built-in defaults. Returns the file actually used.
    pub fn discover(explicit: Option<&Path>) -> Result<(Self, Option<PathBuf>), ConfigError> {
        if let Some(path) = explicit {
            return Ok((Self::load_from_file(path)?, Some(path.to_path_buf())));
        }

        for candidate in DEFAULT_CONFIG_PATHS {
            let path = Path::new(candidate);
            if path.is_file() {
                return Ok((Self::load_from_file(path)?, Some(path.to_path_buf())));
            }
        }

        let config = Self::default();
        config.validate()?;
        Ok((config, None))
    }

    /// Check invariants that do not depend on the environment
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.relays.relay_map()?;
        self.mqtt.validate()
    }

    pub fn to_toml_string(&self) -> Result<String, ConfigError> {
        Ok(toml::to_string_pretty(self)?)
    }
}

impl MqttSection {
    fn validate(&self) -> Result<(), ConfigError> {
        validate_topic(&self.topic)?;

        if let Some(url) = &self.broker_url {
            BrokerEndpoint::parse(url)?;
        }
        if self.client_id_prefix.trim().is_empty() {
            return Err(ConfigError::InvalidConfig(
                "client_id_prefix must not be empty".to_string(),
            ));
        }
        if self.reconnect_delay_secs == 0 {
            return Err(ConfigError::InvalidConfig(
                "reconnect_delay_secs must be greater than zero".to_string(),
            ));
        }
        if self.connect_timeout_secs == 0 {
            return Err(ConfigError::InvalidConfig(
                "connect_timeout_secs must be greater than zero".to_string(),
            ));
        }
        if self.keep_alive_secs < MIN_KEEP_ALIVE_SECS {
            return Err(ConfigError::InvalidConfig(format!(
                "keep_alive_secs must be at least {MIN_KEEP_ALIVE_SECS}"
            )));
        }
        Ok(())
    }

    pub fn reconnect_delay(&self) -> Duration {
        Duration::from_secs(self.reconnect_delay_secs)
    }

    pub fn keep_alive(&self) -> Duration {
        Duration::from_secs(self.keep_alive_secs)
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_secs)
    }

    /// Resolve the broker from `broker_url`, or from the host env var and `port`
    pub fn resolve_endpoint(&self) -> Result<BrokerEndpoint, ConfigError> {
        if let Some(url) = &self.broker_url {
            return BrokerEndpoint::parse(url);
        }

        let host = std::env::var(&self.broker_host_env)
            .ok()
            .map(|host| host.trim().to_string())
            .filter(|host| !host.is_empty())
            .ok_or_else(|| ConfigError::MissingBroker(self.broker_host_env.clone()))?;

        Ok(BrokerEndpoint {
            host,
            port: self.port,
            tls: false,
        })
    }

    /// Credentials from the environment; `None` when no username is set
    pub fn credentials(&self) -> Option<Credentials> {
        let username = get_env_var_optional(self.username_env.as_ref())?;
        let password = get_env_var_optional(self.password_env.as_ref()).unwrap_or_default();
        Some(Credentials { username, password })
    }

    /// `{prefix}-{4 random digits}`
    pub fn client_id(&self) -> String {
        let suffix = 1000 + Uuid::new_v4().as_u128() % 9000;
        format!("{}-{}", self.client_id_prefix, suffix)
    }
}

impl RelaySection {
    /// Build the validated relay map
    pub fn relay_map(&self) -> Result<RelayMap, ConfigError> {
        let entries = self
            .pins
            .iter()
            .map(|(relay, pin)| {
                relay
                    .trim()
                    .parse::<u8>()
                    .map(|relay| (relay, *pin))
                    .map_err(|_| ConfigError::InvalidRelay(relay.clone()))
            })
            .collect::<Result<Vec<_>, _>>()?;

        Ok(RelayMap::new(entries)?)
    }
}

fn get_env_var_optional(env_var_name: Option<&String>) -> Option<String> {
    env_var_name.and_then(|name| std::env::var(name).ok())
}

fn validate_topic(topic: &str) -> Result<(), ConfigError> {
    if topic.is_empty() {
        return Err(ConfigError::InvalidTopic("topic must not be empty".to_string()));
    }
    if topic.contains(['+', '#']) {
        return Err(ConfigError::InvalidTopic(format!(
            "'{topic}' must not contain wildcards"
        )));
    }
    Ok(())
}
