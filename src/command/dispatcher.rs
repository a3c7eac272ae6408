//! Applies validated commands to the output controller
//!
//! Dispatch never fails: payload and per-target errors are logged as
//! warnings and skipped, and GPIO failures on one target do not stop its
//! siblings. The returned [`DispatchReport`] is for logging and tests.

use super::parser::{Command, CommandError, CommandParser};
use crate::gpio::Gpio;
use crate::relay::{OutputController, RelayError, RelayId, RelayState};
use tracing::{error, info, warn};

/// Outcome of one dispatched payload
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DispatchReport {
    /// Successful output writes
    pub applied: usize,
    /// Validation problems logged as warnings (whole message or single target)
    pub rejected: usize,
    /// Targets whose GPIO write failed
    pub failed: usize,
}

pub struct CommandDispatcher<G: Gpio> {
    controller: OutputController<G>,
}

impl<G: Gpio> CommandDispatcher<G> {
    pub fn new(controller: OutputController<G>) -> Self {
        Self { controller }
    }

    pub fn controller_mut(&mut self) -> &mut OutputController<G> {
        &mut self.controller
    }

    pub fn into_controller(self) -> OutputController<G> {
        self.controller
    }

    /// Parse a raw payload and apply it
    pub fn handle_payload(&mut self, payload: &[u8]) -> DispatchReport {
        info!(
            payload = %String::from_utf8_lossy(payload),
            "Received message on subscribed topic"
        );
        let command = CommandParser::parse(payload, self.controller.relay_map());
        self.dispatch(command)
    }

    /// Apply a validated command
    pub fn dispatch(&mut self, command: Command) -> DispatchReport {
        let mut report = DispatchReport::default();

        match command {
            Command::Single { relay, state } => {
                self.apply(relay, state, &mut report);
            }
            Command::Multi {
                relays,
                state,
                rejected,
            } => {
                for e in &rejected {
                    Self::reject(e, &mut report);
                }
                for relay in relays {
                    self.apply(relay, state, &mut report);
                }
            }
            Command::Invalid(e) => Self::reject(&e, &mut report),
            Command::Rejected(errors) => {
                for e in &errors {
                    Self::reject(e, &mut report);
                }
            }
        }

        report
    }

    fn apply(&mut self, relay: RelayId, state: RelayState, report: &mut DispatchReport) {
        match self.controller.set(relay, state) {
            Ok(()) => report.applied += 1,
            // Already logged by the controller
            Err(RelayError::UnknownRelay(_)) => report.rejected += 1,
            Err(e) => {
                error!(relay = %relay, state = %state, "Failed to apply relay state: {}", e);
                report.failed += 1;
            }
        }
    }

    fn reject(e: &CommandError, report: &mut DispatchReport) {
        warn!("{}", e);
        report.rejected += 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gpio::OutputLevel;
    use crate::relay::{PinId, RelayMap};
    use crate::testing::MockGpio;

    fn dispatcher() -> (CommandDispatcher<MockGpio>, MockGpio) {
        let gpio = MockGpio::new();
        let handle = gpio.clone();
        let mut controller = OutputController::new(RelayMap::pi_relay_6(), gpio);
        controller.initialize().unwrap();
        handle.clear_calls();
        (CommandDispatcher::new(controller), handle)
    }

    #[test]
    fn test_single_payload_writes_mapped_pin() {
        let (mut dispatcher, gpio) = dispatcher();

        let report = dispatcher.handle_payload(br#"{"type":"single","relay":3,"state":"ON"}"#);

        assert_eq!(report.applied, 1);
        assert_eq!(gpio.writes(), vec![(PinId::new(13), OutputLevel::High)]);
    }

    #[test]
    fn test_multi_payload_partial_success() {
        let (mut dispatcher, gpio) = dispatcher();

        let report = dispatcher.handle_payload(br#"{"type":"multi","relay":[1,9],"state":"off"}"#);

        assert_eq!(
            report,
            DispatchReport {
                applied: 1,
                rejected: 1,
                failed: 0
            }
        );
        assert_eq!(gpio.writes(), vec![(PinId::new(5), OutputLevel::Low)]);
    }

    #[test]
    fn test_unknown_state_writes_nothing() {
        let (mut dispatcher, gpio) = dispatcher();

        let report =
            dispatcher.handle_payload(br#"{"type":"single","relay":1,"state":"sideways"}"#);

        assert_eq!(report.applied, 0);
        assert_eq!(report.rejected, 1);
        assert!(gpio.writes().is_empty());
    }

    #[test]
    fn test_multi_unknown_state_reports_each_problem() {
        let (mut dispatcher, gpio) = dispatcher();

        let report = dispatcher.handle_payload(br#"{"type":"multi","relay":[1,9],"state":"half"}"#);

        // Relay 9 is out of range, relay 1 is skipped for its state
        assert_eq!(
            report,
            DispatchReport {
                applied: 0,
                rejected: 2,
                failed: 0
            }
        );
        assert!(gpio.writes().is_empty());
    }

    #[test]
    fn test_gpio_failure_does_not_stop_siblings() {
        let (mut dispatcher, gpio) = dispatcher();
        gpio.fail_writes_to(PinId::new(6));

        let report = dispatcher.handle_payload(br#"{"type":"multi","relay":[1,2,3],"state":"on"}"#);

        assert_eq!(report.applied, 2);
        assert_eq!(report.failed, 1);
        assert_eq!(gpio.level(PinId::new(5)), Some(OutputLevel::High));
        assert_eq!(gpio.level(PinId::new(13)), Some(OutputLevel::High));
    }

    #[test]
    fn test_unmapped_relay_in_command_is_rejected() {
        let (mut dispatcher, gpio) = dispatcher();

        // Bypass the parser to hit the controller's own guard
        let report = dispatcher.dispatch(Command::Single {
            relay: RelayId::new(42),
            state: RelayState::On,
        });

        assert_eq!(report.rejected, 1);
        assert!(gpio.calls().is_empty());
    }

    #[test]
    fn test_dispatcher_survives_garbage_then_handles_next_message() {
        let (mut dispatcher, gpio) = dispatcher();

        let first = dispatcher.handle_payload(b"\x00\x01garbage");
        let second = dispatcher.handle_payload(br#"{"type":"single","relay":6,"state":"on"}"#);

        assert_eq!(first.applied, 0);
        assert_eq!(second.applied, 1);
        assert_eq!(gpio.writes(), vec![(PinId::new(21), OutputLevel::High)]);
    }
}
