//! Bridge lifecycle: one run loop, one exit path
//!
//! [`BridgeLifecycle::run`] initializes the relays, brings up the MQTT
//! session, and dispatches commands until the shutdown future resolves or
//! startup fails. Whatever ends the loop, every relay is switched off and
//! the GPIO released before `run` returns.

use crate::command::CommandDispatcher;
use crate::gpio::Gpio;
use crate::transport::mqtt::ConnectionSupervisor;
use crate::transport::{Sleeper, TokioSleeper, Transport};
use crate::{command_span, lifecycle_span};
use std::future::Future;
use std::pin::Pin;
use std::time::Duration;
use tracing::{error, info, warn, Instrument};

/// Upper bound on the courtesy broker disconnect at shutdown
const DISCONNECT_TIMEOUT: Duration = Duration::from_secs(5);

/// Why the bridge stopped
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ShutdownReason {
    /// SIGINT / Ctrl-C
    Interrupt,
    /// SIGTERM
    Terminate,
    /// Startup or runtime failure on the main control path
    Fatal(String),
}

pub struct BridgeLifecycle<T: Transport, G: Gpio, S: Sleeper = TokioSleeper> {
    supervisor: ConnectionSupervisor<T, S>,
    dispatcher: CommandDispatcher<G>,
}

impl<T: Transport, G: Gpio, S: Sleeper> BridgeLifecycle<T, G, S> {
    pub fn new(supervisor: ConnectionSupervisor<T, S>, dispatcher: CommandDispatcher<G>) -> Self {
        Self {
            supervisor,
            dispatcher,
        }
    }

    /// Run until `shutdown` resolves or a fatal error occurs
    ///
    /// Relays are reset and the GPIO released on every path.
    pub async fn run<F>(mut self, shutdown: F) -> ShutdownReason
    where
        F: Future<Output = ShutdownReason>,
    {
        let span = lifecycle_span!(topic = %self.supervisor.topic());
        async move {
            info!("Starting GPIO to MQTT bridge");

            tokio::pin!(shutdown);
            let reason = self.serve(shutdown).await;
            self.stop(&reason).await;
            reason
        }
        .instrument(span)
        .await
    }

    async fn serve<F>(&mut self, mut shutdown: Pin<&mut F>) -> ShutdownReason
    where
        F: Future<Output = ShutdownReason>,
    {
        if let Err(e) = self.dispatcher.controller_mut().initialize() {
            error!("Failed to initialize GPIO: {}", e);
            return ShutdownReason::Fatal(e.to_string());
        }

        tokio::select! {
            reason = shutdown.as_mut() => return reason,
            started = self.supervisor.start() => {
                if let Err(e) = started {
                    error!("{}", e);
                    return ShutdownReason::Fatal(e.to_string());
                }
            }
        }

        info!(topic = %self.supervisor.topic(), "Bridge running, waiting for commands");

        loop {
            tokio::select! {
                reason = shutdown.as_mut() => return reason,
                message = self.supervisor.next_message() => {
                    let span = command_span!(topic = %message.topic, retain = message.retain);
                    let report = span.in_scope(|| self.dispatcher.handle_payload(&message.payload));
                    tracing::debug!(
                        applied = report.applied,
                        rejected = report.rejected,
                        failed = report.failed,
                        "Command dispatched"
                    );
                }
            }
        }
    }

    async fn stop(&mut self, reason: &ShutdownReason) {
        match reason {
            ShutdownReason::Interrupt => info!("Received interrupt, shutting down"),
            ShutdownReason::Terminate => info!("Received SIGTERM, shutting down"),
            ShutdownReason::Fatal(e) => error!("Unexpected error: {}, shutting down", e),
        }

        // Outputs first: the broker is irrelevant once valves are closed
        self.dispatcher.controller_mut().shutdown();

        if tokio::time::timeout(DISCONNECT_TIMEOUT, self.supervisor.disconnect())
            .await
            .is_err()
        {
            warn!("Timed out disconnecting from the MQTT broker");
        }

        info!("Exiting GPIO to MQTT bridge");
    }
}

/// Resolve on the first SIGINT (Ctrl-C) or SIGTERM
pub async fn wait_for_shutdown_signal() -> ShutdownReason {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};

        let mut sigterm = match signal(SignalKind::terminate()) {
            Ok(sigterm) => sigterm,
            Err(e) => {
                warn!("Failed to install SIGTERM handler: {}", e);
                return wait_for_ctrl_c().await;
            }
        };

        tokio::select! {
            reason = wait_for_ctrl_c() => reason,
            _ = sigterm.recv() => ShutdownReason::Terminate,
        }
    }

    #[cfg(not(unix))]
    {
        wait_for_ctrl_c().await
    }
}

async fn wait_for_ctrl_c() -> ShutdownReason {
    match tokio::signal::ctrl_c().await {
        Ok(()) => ShutdownReason::Interrupt,
        Err(e) => ShutdownReason::Fatal(format!("failed to listen for Ctrl-C: {e}")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gpio::OutputLevel;
    use crate::relay::{OutputController, PinId, RelayMap};
    use crate::testing::{MockGpio, MockSleeper, MockTransport, TransportCall};
    use crate::transport::mqtt::ReconnectPolicy;

    const TOPIC: &str = "rpi-sprinkler/relays/set";

    fn lifecycle(
        policy: ReconnectPolicy,
    ) -> (
        BridgeLifecycle<MockTransport, MockGpio, MockSleeper>,
        MockTransport,
        MockGpio,
    ) {
        let transport = MockTransport::new();
        let gpio = MockGpio::new();
        let supervisor = ConnectionSupervisor::with_sleeper(
            transport.clone(),
            MockSleeper::new(),
            policy,
            TOPIC,
        );
        let dispatcher =
            CommandDispatcher::new(OutputController::new(RelayMap::pi_relay_6(), gpio.clone()));
        (
            BridgeLifecycle::new(supervisor, dispatcher),
            transport,
            gpio,
        )
    }

    async fn shutdown_when_drained(transport: MockTransport) -> ShutdownReason {
        while transport.pending_events() > 0 {
            tokio::task::yield_now().await;
        }
        // Let the last message finish dispatching
        tokio::task::yield_now().await;
        ShutdownReason::Interrupt
    }

    #[tokio::test]
    async fn test_commands_applied_then_all_off_on_interrupt() {
        let (lifecycle, transport, gpio) = lifecycle(ReconnectPolicy::default());
        transport.push_message(TOPIC, br#"{"type":"single","relay":2,"state":"on"}"#, false);

        let reason = lifecycle.run(shutdown_when_drained(transport.clone())).await;

        assert_eq!(reason, ShutdownReason::Interrupt);
        assert!(gpio
            .writes()
            .contains(&(PinId::new(6), OutputLevel::High)));
        for pin in RelayMap::pi_relay_6().pins() {
            assert_eq!(gpio.level(pin), Some(OutputLevel::Low));
        }
        assert_eq!(gpio.release_count(), 1);
        assert!(transport.calls().contains(&TransportCall::Disconnect));
    }

    #[tokio::test]
    async fn test_fail_fast_initial_connect_still_resets() {
        let policy = ReconnectPolicy {
            fail_fast_on_initial_connect: true,
            ..ReconnectPolicy::default()
        };
        let (lifecycle, transport, gpio) = lifecycle(policy);
        transport.fail_connects(1, "connection refused");

        let reason = lifecycle.run(std::future::pending()).await;

        assert!(matches!(reason, ShutdownReason::Fatal(msg) if msg.contains("connection refused")));
        for pin in RelayMap::pi_relay_6().pins() {
            assert_eq!(gpio.level(pin), Some(OutputLevel::Low));
        }
        assert_eq!(gpio.release_count(), 1);
        assert!(!transport.calls().contains(&TransportCall::Disconnect));
    }

    #[tokio::test]
    async fn test_shutdown_during_initial_connect() {
        let (lifecycle, transport, gpio) = lifecycle(ReconnectPolicy::default());
        // Endless failures keep the supervisor in its retry loop
        transport.fail_connects(10_000, "broker unreachable");

        let reason = lifecycle
            .run(async {
                tokio::task::yield_now().await;
                ShutdownReason::Terminate
            })
            .await;

        assert_eq!(reason, ShutdownReason::Terminate);
        assert_eq!(gpio.release_count(), 1);
    }
}
