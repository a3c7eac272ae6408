//! Pure connection state management for the MQTT session
//!
//! This module contains the connection state machine, the reconnect policy,
//! and construction of rumqttc options from configuration.

use crate::config::{BrokerEndpoint, MqttSection};
use rumqttc::v5::MqttOptions;
use rumqttc::Transport as RumqttcTransport;
use std::time::Duration;
use thiserror::Error;
use tracing::{error, info, warn};

/// Connection state owned by the supervisor
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum ConnectionState {
    /// Initial state, nothing attempted yet
    #[default]
    Disconnected,
    /// Initial connect in progress (attempt count)
    Connecting(u32),
    /// Session established and command topic subscribed
    Connected,
    /// Session lost, retrying (attempt count)
    Reconnecting(u32),
}

/// Events that drive [`ConnectionState`] transitions
#[derive(Debug, Clone, PartialEq)]
pub enum ConnectionEvent {
    /// Initial connect attempt started
    ConnectStarted(u32),
    /// Broker acknowledged the session and the subscription was issued
    SessionEstablished,
    /// Collaborator reported a disconnect, for any reason
    DisconnectDetected(String),
    /// A reconnect attempt started
    ReconnectStarted(u32),
    /// The initial connect failed and no retry will follow
    GaveUp(String),
}

impl ConnectionState {
    /// Next state after an event (pure function)
    pub fn on_event(&self, event: &ConnectionEvent) -> ConnectionState {
        match event {
            ConnectionEvent::ConnectStarted(attempt) => ConnectionState::Connecting(*attempt),
            ConnectionEvent::SessionEstablished => ConnectionState::Connected,
            ConnectionEvent::DisconnectDetected(_) => match self {
                // A failed initial attempt keeps us in the initial connect loop
                ConnectionState::Connecting(attempt) => ConnectionState::Connecting(*attempt),
                ConnectionState::Reconnecting(attempt) => ConnectionState::Reconnecting(*attempt),
                _ => ConnectionState::Reconnecting(0),
            },
            ConnectionEvent::ReconnectStarted(attempt) => ConnectionState::Reconnecting(*attempt),
            ConnectionEvent::GaveUp(_) => ConnectionState::Disconnected,
        }
    }

    pub fn is_connected(&self) -> bool {
        matches!(self, ConnectionState::Connected)
    }

    /// Log a state transition
    pub fn log_transition(from: &ConnectionState, to: &ConnectionState) {
        match (from, to) {
            (ConnectionState::Connecting(_), ConnectionState::Connected) => {
                info!("Connected to the MQTT broker");
            }
            (ConnectionState::Reconnecting(attempt), ConnectionState::Connected) => {
                info!(
                    attempts = attempt,
                    "Successfully reconnected to the MQTT broker after {} tries", attempt
                );
            }
            (ConnectionState::Connected, ConnectionState::Reconnecting(_)) => {
                warn!("MQTT session lost, entering reconnect loop");
            }
            (_, ConnectionState::Disconnected) => {
                error!("MQTT connection abandoned");
            }
            _ => {
                tracing::debug!("MQTT connection state: {:?} -> {:?}", from, to);
            }
        }
    }
}

/// Fixed-delay, unbounded retry policy
#[derive(Debug, Clone, PartialEq)]
pub struct ReconnectPolicy {
    /// Delay between consecutive failed attempts
    pub delay: Duration,
    /// Return an error if the very first connect fails instead of retrying
    pub fail_fast_on_initial_connect: bool,
}

impl Default for ReconnectPolicy {
    fn default() -> Self {
        Self {
            delay: Duration::from_secs(15),
            fail_fast_on_initial_connect: false,
        }
    }
}

impl ReconnectPolicy {
    pub fn from_config(config: &MqttSection) -> Self {
        Self {
            delay: config.reconnect_delay(),
            fail_fast_on_initial_connect: config.fail_fast_on_initial_connect,
        }
    }
}

/// MQTT transport errors
#[derive(Debug, Error)]
pub enum MqttError {
    #[error("Connection failed: {0}")]
    ConnectionFailed(String),
    #[error("Connection timed out after {0:?} without ConnAck")]
    ConnAckTimeout(Duration),
    #[error("Disconnected: {0}")]
    Disconnected(String),
    #[error("Subscription to {topic} failed: {reason}")]
    SubscriptionFailed { topic: String, reason: String },
    #[error("Invalid broker URL: {0}")]
    InvalidBrokerUrl(String),
    #[error("Client request failed: {0}")]
    ClientRequest(String),
}

/// Credentials resolved from the environment at connection time
#[derive(Clone, PartialEq, Default)]
pub struct Credentials {
    pub username: String,
    pub password: String,
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .field("password", &"***")
            .finish()
    }
}

/// Build rumqttc options for one session (pure apart from TLS setup)
pub fn configure_mqtt_options(
    client_id: &str,
    endpoint: &BrokerEndpoint,
    credentials: Option<&Credentials>,
    keep_alive: Duration,
) -> MqttOptions {
    let mut mqtt_options = MqttOptions::new(client_id, endpoint.host.as_str(), endpoint.port);

    if endpoint.tls {
        mqtt_options.set_transport(RumqttcTransport::tls_with_default_config());
    }

    if let Some(credentials) = credentials {
        mqtt_options.set_credentials(&credentials.username, &credentials.password);
    }

    mqtt_options.set_keep_alive(keep_alive);
    mqtt_options
}
