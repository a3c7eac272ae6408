//! Transport layer for inbound relay commands
//!
//! This module provides the transport abstraction consumed by the
//! connection supervisor, and its MQTT implementation.

pub mod mqtt;
pub mod sleeper;

pub use sleeper::{Sleeper, TokioSleeper};

/// A publish received on a subscribed topic
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InboundMessage {
    pub topic: String,
    pub payload: Vec<u8>,
    pub retain: bool,
}

/// What the transport yields to its consumer
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportEvent {
    /// Inbound publish
    Message(InboundMessage),
    /// The session ended for any reason (network, broker disconnect, protocol error)
    Disconnected(String),
}

/// Transport trait for the command channel
///
/// This trait provides an abstraction over the broker session so the
/// reconnect supervisor can be driven by a scripted transport in tests.
/// Implementations perform exactly one attempt per call; retry policy
/// belongs to the caller.
#[async_trait::async_trait]
pub trait Transport: Send {
    type Error: std::error::Error + Send + Sync + 'static;

    /// Establish the first session, returning once the broker acknowledges it
    async fn connect(&mut self) -> Result<(), Self::Error>;

    /// One attempt to re-establish a lost session
    async fn reconnect(&mut self) -> Result<(), Self::Error>;

    /// Subscribe to the command topic on the current session
    async fn subscribe(&mut self, topic: &str) -> Result<(), Self::Error>;

    /// Wait for the next inbound message or session loss
    async fn next_event(&mut self) -> TransportEvent;

    /// Best-effort disconnect from the broker
    async fn disconnect(&mut self) -> Result<(), Self::Error>;
}
