//! Integration tests for configuration loading from disk

use sprinkler_bridge::config::{BridgeConfig, ConfigError};
use sprinkler_bridge::relay::{PinId, RelayId, RelayMapError};
use std::io::Write;
use std::path::Path;
use tempfile::NamedTempFile;

fn write_config(content: &str) -> NamedTempFile {
    let mut temp_file = NamedTempFile::new().unwrap();
    writeln!(temp_file, "{content}").unwrap();
    temp_file
}

#[test]
fn test_load_valid_config_file() {
    let temp_file = write_config(
        r#"
[mqtt]
broker_url = "mqtt://broker.local:1884"
topic = "garden/relays/set"
client_id_prefix = "garden-bridge"
username_env = "GARDEN_MQTT_USER"
password_env = "GARDEN_MQTT_PASS"
keep_alive_secs = 30
reconnect_delay_secs = 20
ignore_retained = true

[relays.pins]
1 = 17
2 = 27
3 = 22
"#,
    );

    let config = BridgeConfig::load_from_file(temp_file.path()).unwrap();

    assert_eq!(config.mqtt.topic, "garden/relays/set");
    assert_eq!(config.mqtt.client_id_prefix, "garden-bridge");
    assert_eq!(config.mqtt.keep_alive_secs, 30);
    assert_eq!(config.mqtt.reconnect_delay_secs, 20);
    assert!(config.mqtt.ignore_retained);

    let endpoint = config.mqtt.resolve_endpoint().unwrap();
    assert_eq!(endpoint.host, "broker.local");
    assert_eq!(endpoint.port, 1884);
    assert!(!endpoint.tls);

    let relays = config.relays.relay_map().unwrap();
    assert_eq!(relays.len(), 3);
    assert_eq!(relays.physical_output_for(RelayId::new(2)), Some(PinId::new(27)));
    assert_eq!(relays.describe_range(), "1-3");
}

#[test]
fn test_empty_file_loads_pi_relay_defaults() {
    let temp_file = write_config("");

    let config = BridgeConfig::load_from_file(temp_file.path()).unwrap();

    assert_eq!(config, BridgeConfig::default());
    assert_eq!(config.mqtt.topic, "rpi-sprinkler/relays/set");
    assert_eq!(config.mqtt.reconnect_delay_secs, 15);
    let pins: Vec<u8> = config
        .relays
        .relay_map()
        .unwrap()
        .pins()
        .map(|pin| pin.get())
        .collect();
    assert_eq!(pins, vec![5, 6, 13, 19, 26, 21]);
}

#[test]
fn test_partial_mqtt_section_keeps_other_defaults() {
    let temp_file = write_config(
        r#"
[mqtt]
topic = "backyard/set"
"#,
    );

    let config = BridgeConfig::load_from_file(temp_file.path()).unwrap();

    assert_eq!(config.mqtt.topic, "backyard/set");
    assert_eq!(config.mqtt.port, 1883);
    assert_eq!(config.mqtt.broker_host_env, "MQTT_BROKER_HOST");
    assert_eq!(config.relays, BridgeConfig::default().relays);
}

#[test]
fn test_duplicate_pins_fail_to_load() {
    let temp_file = write_config(
        r#"
[relays.pins]
1 = 17
2 = 17
"#,
    );

    let result = BridgeConfig::load_from_file(temp_file.path());

    assert!(matches!(
        result,
        Err(ConfigError::RelayMap(RelayMapError::DuplicatePin { .. }))
    ));
}

#[test]
fn test_wildcard_topic_fails_to_load() {
    let temp_file = write_config(
        r#"
[mqtt]
topic = "rpi-sprinkler/#"
"#,
    );

    let result = BridgeConfig::load_from_file(temp_file.path());

    assert!(matches!(result, Err(ConfigError::InvalidTopic(_))));
}

#[test]
fn test_malformed_toml_reports_parse_error() {
    let temp_file = write_config("[mqtt\ntopic = ");

    let result = BridgeConfig::load_from_file(temp_file.path());

    assert!(matches!(result, Err(ConfigError::TomlParse(_))));
}

#[test]
fn test_missing_file_reports_read_error() {
    let result = BridgeConfig::load_from_file(Path::new("/nonexistent/sprinkler-bridge.toml"));

    assert!(matches!(result, Err(ConfigError::FileRead(_))));
}

#[test]
fn test_discover_prefers_explicit_path() {
    let temp_file = write_config(
        r#"
[mqtt]
topic = "explicit/set"
"#,
    );

    let (config, source) = BridgeConfig::discover(Some(temp_file.path())).unwrap();

    assert_eq!(config.mqtt.topic, "explicit/set");
    assert_eq!(source.as_deref(), Some(temp_file.path()));
}

#[test]
fn test_discover_explicit_missing_path_is_an_error() {
    let result = BridgeConfig::discover(Some(Path::new("/nonexistent/bridge.toml")));

    assert!(matches!(result, Err(ConfigError::FileRead(_))));
}
