//! MQTT transport for relay commands
//!
//! This module separates pure functions from I/O operations:
//!
//! - [`connection`] - Pure connection state machine, reconnect policy, options
//! - [`message_handler`] - Pure event routing and topic filtering
//! - [`session`] - rumqttc client and event loop (impure I/O)
//! - [`supervisor`] - Reconnect loop and re-subscription over any transport
//!
//! # Usage
//!
//! ```rust,no_run
//! use sprinkler_bridge::config::MqttSection;
//! use sprinkler_bridge::transport::mqtt::{ConnectionSupervisor, MqttSession, ReconnectPolicy};
//!
//! # tokio_test::block_on(async {
//! let config = MqttSection::default();
//! let session = MqttSession::from_config(&config)?;
//! let mut supervisor =
//!     ConnectionSupervisor::new(session, ReconnectPolicy::from_config(&config), &config.topic);
//! supervisor.start().await?;
//! let message = supervisor.next_message().await;
//! println!("{}", String::from_utf8_lossy(&message.payload));
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! # });
//! ```

pub mod connection;
pub mod message_handler;
pub mod session;
pub mod supervisor;

pub use connection::{
    configure_mqtt_options, ConnectionEvent, ConnectionState, Credentials, MqttError,
    ReconnectPolicy,
};
pub use message_handler::{EventRoute, MessageHandler};
pub use session::MqttSession;
pub use supervisor::{ConnectionSupervisor, SupervisorError};
