//! Keeps the command subscription alive across broker outages
//!
//! The supervisor owns a [`Transport`] and hands the lifecycle one
//! command message at a time. Session loss is never surfaced: it retries
//! with a fixed delay until a session is re-established and the command
//! topic is subscribed again, then resumes delivery.

use super::connection::{ConnectionEvent, ConnectionState, ReconnectPolicy};
use super::message_handler::MessageHandler;
use crate::mqtt_span;
use crate::transport::{InboundMessage, Sleeper, TokioSleeper, Transport, TransportEvent};
use thiserror::Error;
use tracing::{error, info, warn, Instrument};

#[derive(Debug, Error, PartialEq)]
pub enum SupervisorError {
    #[error("Initial connection to the MQTT broker failed: {0}")]
    InitialConnect(String),
}

pub struct ConnectionSupervisor<T: Transport, S: Sleeper = TokioSleeper> {
    transport: T,
    sleeper: S,
    policy: ReconnectPolicy,
    topic: String,
    ignore_retained: bool,
    state: ConnectionState,
}

impl<T: Transport> ConnectionSupervisor<T, TokioSleeper> {
    pub fn new(transport: T, policy: ReconnectPolicy, topic: impl Into<String>) -> Self {
        Self::with_sleeper(transport, TokioSleeper, policy, topic)
    }
}

impl<T: Transport, S: Sleeper> ConnectionSupervisor<T, S> {
    pub fn with_sleeper(
        transport: T,
        sleeper: S,
        policy: ReconnectPolicy,
        topic: impl Into<String>,
    ) -> Self {
        Self {
            transport,
            sleeper,
            policy,
            topic: topic.into(),
            ignore_retained: false,
            state: ConnectionState::Disconnected,
        }
    }

    /// Drop retained publishes instead of treating them as commands
    pub fn ignore_retained(mut self, ignore: bool) -> Self {
        self.ignore_retained = ignore;
        self
    }

    pub fn state(&self) -> &ConnectionState {
        &self.state
    }

    pub fn topic(&self) -> &str {
        &self.topic
    }

    /// Establish the first session and subscribe to the command topic
    ///
    /// Retries with the policy delay until it succeeds, unless the policy
    /// asks to fail fast, in which case the first failure is returned.
    pub async fn start(&mut self) -> Result<(), SupervisorError> {
        let mut attempt: u32 = 1;
        loop {
            self.transition(ConnectionEvent::ConnectStarted(attempt));

            let reason = match self.transport.connect().await {
                Ok(()) => match self.subscribe_command_topic().await {
                    Ok(()) => {
                        self.transition(ConnectionEvent::SessionEstablished);
                        return Ok(());
                    }
                    Err(reason) => reason,
                },
                Err(e) => e.to_string(),
            };

            if self.policy.fail_fast_on_initial_connect {
                error!(attempt, reason = %reason, "Initial connection to the MQTT broker failed");
                self.transition(ConnectionEvent::GaveUp(reason.clone()));
                return Err(SupervisorError::InitialConnect(reason));
            }

            warn!(
                attempt,
                reason = %reason,
                delay_ms = self.policy.delay.as_millis() as u64,
                "Failed to connect to the MQTT broker, retrying in {:?}",
                self.policy.delay
            );
            self.transition(ConnectionEvent::DisconnectDetected(reason));
            self.sleeper.sleep(self.policy.delay).await;
            attempt = attempt.saturating_add(1);
        }
    }

    /// Wait for the next command message
    ///
    /// Messages on other topics (and retained ones, if configured) are
    /// dropped. A lost session blocks here until it is restored.
    pub async fn next_message(&mut self) -> InboundMessage {
        loop {
            match self.transport.next_event().await {
                TransportEvent::Message(message) => {
                    if MessageHandler::should_process_message(
                        &message.topic,
                        message.retain,
                        &self.topic,
                        self.ignore_retained,
                    ) {
                        return message;
                    }
                }
                TransportEvent::Disconnected(reason) => {
                    warn!(reason = %reason, "Disconnected from the MQTT broker");
                    self.reconnect(reason)
                        .instrument(mqtt_span!(operation = "reconnect"))
                        .await;
                }
            }
        }
    }

    /// Best-effort disconnect; errors are logged and swallowed
    pub async fn disconnect(&mut self) {
        if self.state.is_connected() {
            if let Err(e) = self.transport.disconnect().await {
                warn!("Error disconnecting from the MQTT broker: {}", e);
            }
        }
        self.state = ConnectionState::Disconnected;
    }

    /// Retry until a session is established and the topic re-subscribed
    ///
    /// The first attempt is immediate; every failure waits the policy delay.
    async fn reconnect(&mut self, reason: String) {
        self.transition(ConnectionEvent::DisconnectDetected(reason));

        let mut attempt: u32 = 1;
        loop {
            self.transition(ConnectionEvent::ReconnectStarted(attempt));
            info!(attempt, "Attempting to reconnect to the MQTT broker");

            let failure = match self.transport.reconnect().await {
                Ok(()) => match self.subscribe_command_topic().await {
                    Ok(()) => {
                        self.transition(ConnectionEvent::SessionEstablished);
                        return;
                    }
                    Err(reason) => reason,
                },
                Err(e) => e.to_string(),
            };

            warn!(
                attempt,
                reason = %failure,
                delay_ms = self.policy.delay.as_millis() as u64,
                "Reconnection failed, retrying in {:?}",
                self.policy.delay
            );
            self.transition(ConnectionEvent::DisconnectDetected(failure));
            self.sleeper.sleep(self.policy.delay).await;
            attempt = attempt.saturating_add(1);
        }
    }

    async fn subscribe_command_topic(&mut self) -> Result<(), String> {
        self.transport
            .subscribe(&self.topic)
            .await
            .map_err(|e| e.to_string())
    }

    fn transition(&mut self, event: ConnectionEvent) {
        let next = self.state.on_event(&event);
        if next != self.state {
            ConnectionState::log_transition(&self.state, &next);
            self.state = next;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{MockSleeper, MockTransport, TransportCall};
    use std::time::Duration;

    const TOPIC: &str = "rpi-sprinkler/relays/set";

    fn supervisor(
        policy: ReconnectPolicy,
    ) -> (
        ConnectionSupervisor<MockTransport, MockSleeper>,
        MockTransport,
        MockSleeper,
    ) {
        let transport = MockTransport::new();
        let sleeper = MockSleeper::new();
        let supervisor =
            ConnectionSupervisor::with_sleeper(transport.clone(), sleeper.clone(), policy, TOPIC);
        (supervisor, transport, sleeper)
    }

    #[tokio::test]
    async fn test_start_connects_and_subscribes() {
        let (mut supervisor, transport, sleeper) = supervisor(ReconnectPolicy::default());

        supervisor.start().await.unwrap();

        assert_eq!(
            transport.calls(),
            vec![
                TransportCall::Connect,
                TransportCall::Subscribe(TOPIC.to_string())
            ]
        );
        assert!(supervisor.state().is_connected());
        assert_eq!(sleeper.sleep_count(), 0);
    }

    #[tokio::test]
    async fn test_start_retries_with_fixed_delay() {
        let (mut supervisor, transport, sleeper) = supervisor(ReconnectPolicy::default());
        transport.fail_connects(3, "connection refused");

        supervisor.start().await.unwrap();

        assert_eq!(transport.connect_attempts(), 4);
        assert_eq!(sleeper.sleeps(), vec![Duration::from_secs(15); 3]);
        assert_eq!(transport.subscriptions(), vec![TOPIC.to_string()]);
    }

    #[tokio::test]
    async fn test_start_fail_fast() {
        let policy = ReconnectPolicy {
            fail_fast_on_initial_connect: true,
            ..ReconnectPolicy::default()
        };
        let (mut supervisor, transport, sleeper) = supervisor(policy);
        transport.fail_connects(1, "no route to host");

        let result = supervisor.start().await;

        assert!(matches!(result, Err(SupervisorError::InitialConnect(reason)) if reason.contains("no route")));
        assert_eq!(supervisor.state(), &ConnectionState::Disconnected);
        assert_eq!(sleeper.sleep_count(), 0);
    }

    #[tokio::test]
    async fn test_next_message_filters_other_topics() {
        let (mut supervisor, transport, _) = supervisor(ReconnectPolicy::default());
        supervisor.start().await.unwrap();

        transport.push_message("rpi-sprinkler/relays/status", b"ignored", false);
        transport.push_message(TOPIC, b"command", false);

        let message = supervisor.next_message().await;
        assert_eq!(message.payload, b"command".to_vec());
    }

    #[tokio::test]
    async fn test_ignore_retained() {
        let (supervisor, transport, _) = supervisor(ReconnectPolicy::default());
        let mut supervisor = supervisor.ignore_retained(true);
        supervisor.start().await.unwrap();

        transport.push_message(TOPIC, b"stale", true);
        transport.push_message(TOPIC, b"fresh", false);

        assert_eq!(supervisor.next_message().await.payload, b"fresh".to_vec());
    }

    #[tokio::test]
    async fn test_reconnect_after_failures_resubscribes() {
        let (mut supervisor, transport, sleeper) = supervisor(ReconnectPolicy::default());
        supervisor.start().await.unwrap();

        transport.fail_reconnects(2, "broker down");
        transport.push_disconnect("connection reset");
        transport.push_message(TOPIC, b"after", false);

        let message = supervisor.next_message().await;

        assert_eq!(message.payload, b"after".to_vec());
        assert_eq!(transport.reconnect_attempts(), 3);
        assert_eq!(sleeper.sleep_count(), 2);
        assert_eq!(
            transport.subscriptions(),
            vec![TOPIC.to_string(), TOPIC.to_string()]
        );
        assert!(supervisor.state().is_connected());
    }

    #[tokio::test]
    async fn test_failed_resubscribe_counts_as_failed_attempt() {
        let (mut supervisor, transport, sleeper) = supervisor(ReconnectPolicy::default());
        supervisor.start().await.unwrap();

        transport.fail_subscribes(1, "session closed");
        transport.push_disconnect("keep alive timeout");
        transport.push_message(TOPIC, b"ok", false);

        supervisor.next_message().await;

        assert_eq!(transport.reconnect_attempts(), 2);
        assert_eq!(sleeper.sleep_count(), 1);
    }

    #[tokio::test]
    async fn test_disconnect_only_when_connected() {
        let (mut supervisor, transport, _) = supervisor(ReconnectPolicy::default());
        supervisor.disconnect().await;
        assert!(!transport.calls().contains(&TransportCall::Disconnect));

        supervisor.start().await.unwrap();
        supervisor.disconnect().await;
        assert!(transport.calls().contains(&TransportCall::Disconnect));
        assert_eq!(supervisor.state(), &ConnectionState::Disconnected);
    }
}
