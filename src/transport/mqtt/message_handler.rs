//! Pure message routing for rumqttc events
//!
//! Maps raw rumqttc v5 events onto the few cases the session cares about,
//! and decides whether an inbound publish is a command for this bridge.

use rumqttc::v5::mqttbytes::v5::Packet;
use rumqttc::v5::Event;
use tracing::debug;

/// Pure routing decisions based on MQTT events
pub struct MessageHandler;

impl MessageHandler {
    /// Route an MQTT event to the appropriate handler (pure routing decision)
    pub fn route_mqtt_event(event: &Event) -> EventRoute {
        match event {
            Event::Incoming(incoming) => match incoming {
                Packet::ConnAck(_) => EventRoute::ConnectionAcknowledged,
                Packet::Publish(publish) => EventRoute::MessageReceived {
                    topic: String::from_utf8_lossy(&publish.topic).to_string(),
                    payload: publish.payload.to_vec(),
                    retain: publish.retain,
                },
                Packet::Disconnect(disconnect) => {
                    EventRoute::Disconnected(format!("broker sent disconnect: {disconnect:?}"))
                }
                Packet::SubAck(suback) => EventRoute::SubscriptionConfirmed {
                    packet_id: suback.pkid,
                    return_codes: format!("{:?}", suback.return_codes),
                },
                other => EventRoute::InfrastructureEvent(format!("{other:?}")),
            },
            Event::Outgoing(_) => EventRoute::OutgoingEvent,
        }
    }

    /// Decide whether an inbound publish should be parsed as a command (pure function)
    pub fn should_process_message(
        topic: &str,
        retain: bool,
        expected_topic: &str,
        ignore_retained: bool,
    ) -> bool {
        if topic != expected_topic {
            debug!("Topic mismatch: expected {}, got {}", expected_topic, topic);
            return false;
        }

        if retain && ignore_retained {
            debug!("Ignoring retained message on topic: {}", topic);
            return false;
        }

        true
    }
}

/// Routing decisions for MQTT events
#[derive(Debug, Clone, PartialEq)]
pub enum EventRoute {
    /// Broker acknowledged the connection
    ConnectionAcknowledged,
    /// Message received on a subscribed topic
    MessageReceived {
        topic: String,
        payload: Vec<u8>,
        retain: bool,
    },
    /// Broker ended the session
    Disconnected(String),
    /// Subscription acknowledged
    SubscriptionConfirmed {
        packet_id: u16,
        return_codes: String,
    },
    /// Infrastructure event (PingResp, etc.)
    InfrastructureEvent(String),
    /// Outgoing event (handled by rumqttc)
    OutgoingEvent,
}
