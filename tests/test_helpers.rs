//! Test helpers and utilities for integration tests

use sprinkler_bridge::command::CommandDispatcher;
use sprinkler_bridge::relay::{OutputController, RelayMap};
use sprinkler_bridge::testing::MockGpio;

pub const COMMAND_TOPIC: &str = "rpi-sprinkler/relays/set";

/// Dispatcher over an initialized PiRelay-6 controller, plus a handle to
/// its GPIO with the initialization calls cleared
#[allow(dead_code)]
pub fn initialized_dispatcher() -> (CommandDispatcher<MockGpio>, MockGpio) {
    let gpio = MockGpio::new();
    let mut controller = OutputController::new(RelayMap::pi_relay_6(), gpio.clone());
    controller
        .initialize()
        .expect("mock GPIO never fails initialization");
    gpio.clear_calls();
    (CommandDispatcher::new(controller), gpio)
}

#[allow(dead_code)]
pub fn single(relay: impl std::fmt::Display, state: &str) -> Vec<u8> {
    format!(r#"{{"type":"single","relay":{relay},"state":"{state}"}}"#).into_bytes()
}

#[allow(dead_code)]
pub fn multi(relays: &[i64], state: &str) -> Vec<u8> {
    let list = relays
        .iter()
        .map(|r| r.to_string())
        .collect::<Vec<_>>()
        .join(",");
    format!(r#"{{"type":"multi","relay":[{list}],"state":"{state}"}}"#).into_bytes()
}
