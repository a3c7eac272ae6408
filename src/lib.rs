//! Sprinkler Bridge - MQTT to GPIO relay bridge
//!
//! Receives relay commands on one MQTT topic and drives a fixed set of
//! relay-controlled outputs (irrigation valves) on a Raspberry Pi.
//!
//! # Overview
//!
//! - Relay map and output controller that keep every line in a known state
//! - Decode-then-validate command parsing with per-target partial success
//! - MQTT session supervision with an unbounded fixed-delay reconnect loop
//! - A single shutdown path that switches every relay off
//!
//! # Quick Start
//!
//! ```rust
//! use sprinkler_bridge::command::{Command, CommandParser};
//! use sprinkler_bridge::relay::{RelayId, RelayMap, RelayState};
//!
//! let relays = RelayMap::pi_relay_6();
//! let command = CommandParser::parse(br#"{"type":"single","relay":3,"state":"ON"}"#, &relays);
//!
//! assert_eq!(
//!     command,
//!     Command::Single {
//!         relay: RelayId::new(3),
//!         state: RelayState::On
//!     }
//! );
//! ```

pub mod command;
pub mod config;
pub mod error;
pub mod gpio;
pub mod lifecycle;
pub mod observability;
pub mod relay;
pub mod testing;
pub mod transport;

pub use command::{Command, CommandDispatcher, CommandError, CommandParser, DispatchReport};
pub use config::{BridgeConfig, ConfigError};
pub use error::{BridgeError, BridgeResult};
pub use gpio::{Gpio, OutputLevel};
pub use lifecycle::{wait_for_shutdown_signal, BridgeLifecycle, ShutdownReason};
pub use relay::{OutputController, PinId, RelayId, RelayMap, RelayState};
pub use transport::mqtt::{ConnectionSupervisor, MqttSession};
