//! rumqttc-backed implementation of [`Transport`]
//!
//! Owns the `AsyncClient`/`EventLoop` pair and polls it in the caller's
//! task. Every method makes a single attempt; the supervisor decides when
//! to retry.

use super::connection::{configure_mqtt_options, Credentials, MqttError};
use super::message_handler::{EventRoute, MessageHandler};
use crate::config::{BrokerEndpoint, MqttSection};
use crate::transport::{InboundMessage, Transport, TransportEvent};
use rumqttc::v5::mqttbytes::QoS;
use rumqttc::v5::{AsyncClient, EventLoop};
use std::time::Duration;
use tracing::{debug, info, trace};

/// Capacity of the request channel between client and event loop
const REQUEST_CHANNEL_CAPACITY: usize = 10;

/// Upper bound on flushing the DISCONNECT packet during shutdown
const DISCONNECT_FLUSH_TIMEOUT: Duration = Duration::from_secs(2);

pub struct MqttSession {
    client: AsyncClient,
    event_loop: EventLoop,
    endpoint: BrokerEndpoint,
    connect_timeout: Duration,
}

impl MqttSession {
    pub fn new(
        client_id: &str,
        endpoint: BrokerEndpoint,
        credentials: Option<Credentials>,
        keep_alive: Duration,
        connect_timeout: Duration,
    ) -> Self {
        let options =
            configure_mqtt_options(client_id, &endpoint, credentials.as_ref(), keep_alive);
        let (client, event_loop) = AsyncClient::new(options, REQUEST_CHANNEL_CAPACITY);

        Self {
            client,
            event_loop,
            endpoint,
            connect_timeout,
        }
    }

    /// Build a session from the `[mqtt]` section, resolving the broker and
    /// credentials from the environment
    pub fn from_config(config: &MqttSection) -> Result<Self, MqttError> {
        let endpoint = config
            .resolve_endpoint()
            .map_err(|e| MqttError::InvalidBrokerUrl(e.to_string()))?;
        let client_id = config.client_id();

        info!(
            client_id = %client_id,
            host = %endpoint.host,
            port = endpoint.port,
            tls = endpoint.tls,
            "Configured MQTT session"
        );

        Ok(Self::new(
            &client_id,
            endpoint,
            config.credentials(),
            config.keep_alive(),
            config.connect_timeout(),
        ))
    }

    /// Poll the event loop until the broker acknowledges the session
    async fn wait_for_connack(&mut self) -> Result<(), MqttError> {
        let timeout = self.connect_timeout;
        let event_loop = &mut self.event_loop;

        let result = tokio::time::timeout(timeout, async {
            loop {
                match event_loop.poll().await {
                    Ok(event) => match MessageHandler::route_mqtt_event(&event) {
                        EventRoute::ConnectionAcknowledged => return Ok(()),
                        EventRoute::Disconnected(reason) => {
                            return Err(MqttError::Disconnected(reason))
                        }
                        other => trace!("Event before ConnAck: {:?}", other),
                    },
                    Err(e) => return Err(MqttError::ConnectionFailed(e.to_string())),
                }
            }
        })
        .await;

        match result {
            Ok(outcome) => outcome,
            Err(_) => Err(MqttError::ConnAckTimeout(timeout)),
        }
    }
}

#[async_trait::async_trait]
impl Transport for MqttSession {
    type Error = MqttError;

    async fn connect(&mut self) -> Result<(), Self::Error> {
        debug!(
            host = %self.endpoint.host,
            port = self.endpoint.port,
            "Connecting to MQTT broker"
        );
        self.wait_for_connack().await
    }

    async fn reconnect(&mut self) -> Result<(), Self::Error> {
        // rumqttc re-dials on the next poll after a connection error
        self.wait_for_connack().await
    }

    async fn subscribe(&mut self, topic: &str) -> Result<(), Self::Error> {
        self.client
            .subscribe(topic, QoS::AtLeastOnce)
            .await
            .map_err(|e| MqttError::SubscriptionFailed {
                topic: topic.to_string(),
                reason: e.to_string(),
            })?;
        info!(topic = %topic, "Subscribed to command topic");
        Ok(())
    }

    async fn next_event(&mut self) -> TransportEvent {
        loop {
            let event = match self.event_loop.poll().await {
                Ok(event) => event,
                Err(e) => return TransportEvent::Disconnected(e.to_string()),
            };

            match MessageHandler::route_mqtt_event(&event) {
                EventRoute::MessageReceived {
                    topic,
                    payload,
                    retain,
                } => {
                    return TransportEvent::Message(InboundMessage {
                        topic,
                        payload,
                        retain,
                    })
                }
                EventRoute::Disconnected(reason) => return TransportEvent::Disconnected(reason),
                EventRoute::SubscriptionConfirmed {
                    packet_id,
                    return_codes,
                } => {
                    debug!(packet_id, return_codes = %return_codes, "Subscription acknowledged");
                }
                EventRoute::ConnectionAcknowledged => debug!("Unexpected ConnAck on live session"),
                EventRoute::InfrastructureEvent(description) => {
                    trace!("MQTT infrastructure event: {}", description)
                }
                EventRoute::OutgoingEvent => {}
            }
        }
    }

    async fn disconnect(&mut self) -> Result<(), Self::Error> {
        self.client
            .disconnect()
            .await
            .map_err(|e| MqttError::ClientRequest(e.to_string()))?;

        // Drive the event loop so the DISCONNECT packet reaches the broker
        let event_loop = &mut self.event_loop;
        let flushed = tokio::time::timeout(DISCONNECT_FLUSH_TIMEOUT, async {
            while event_loop.poll().await.is_ok() {}
        })
        .await;

        if flushed.is_err() {
            debug!("Timed out flushing MQTT disconnect");
        }
        info!("Disconnected from MQTT broker");
        Ok(())
    }
}
