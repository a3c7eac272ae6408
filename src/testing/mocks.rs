//! Mock implementations for testing
//!
//! Provides mock Gpio, Transport, and Sleeper implementations so the
//! controller, supervisor, and lifecycle can be exercised without relay
//! hardware or a broker. Every mock is a cheap `Clone` handle over shared
//! state: hand one clone to the code under test and keep the other to
//! script behavior and inspect the recorded calls.

use crate::gpio::{Gpio, OutputLevel};
use crate::relay::PinId;
use crate::transport::{InboundMessage, Sleeper, Transport, TransportEvent};
use async_trait::async_trait;
use std::collections::{BTreeMap, HashSet, VecDeque};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;
use thiserror::Error;
use tokio::sync::Notify;

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// A call observed by [`MockGpio`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GpioCall {
    Configure(PinId),
    Write(PinId, OutputLevel),
    Release,
}

#[derive(Debug, Error)]
#[error("mock GPIO write to pin {0} failed")]
pub struct MockGpioError(pub PinId);

#[derive(Debug, Default)]
struct GpioState {
    calls: Vec<GpioCall>,
    levels: BTreeMap<PinId, OutputLevel>,
    failing: HashSet<PinId>,
}

/// Mock GPIO that records every call and tracks line levels
#[derive(Debug, Clone, Default)]
pub struct MockGpio {
    state: Arc<Mutex<GpioState>>,
}

impl MockGpio {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every call in order, failed writes included
    pub fn calls(&self) -> Vec<GpioCall> {
        lock(&self.state).calls.clone()
    }

    /// Attempted writes in order
    pub fn writes(&self) -> Vec<(PinId, OutputLevel)> {
        lock(&self.state)
            .calls
            .iter()
            .filter_map(|call| match call {
                GpioCall::Write(pin, level) => Some((*pin, *level)),
                _ => None,
            })
            .collect()
    }

    pub fn clear_calls(&self) {
        lock(&self.state).calls.clear();
    }

    /// Last level successfully written to a line
    pub fn level(&self, pin: PinId) -> Option<OutputLevel> {
        lock(&self.state).levels.get(&pin).copied()
    }

    /// Make subsequent writes to `pin` fail, leaving its level unchanged
    pub fn fail_writes_to(&self, pin: PinId) {
        lock(&self.state).failing.insert(pin);
    }

    pub fn release_count(&self) -> usize {
        lock(&self.state)
            .calls
            .iter()
            .filter(|call| matches!(call, GpioCall::Release))
            .count()
    }
}

impl Gpio for MockGpio {
    type Error = MockGpioError;

    fn configure_output(&mut self, pin: PinId) -> Result<(), Self::Error> {
        lock(&self.state).calls.push(GpioCall::Configure(pin));
        Ok(())
    }

    fn write(&mut self, pin: PinId, level: OutputLevel) -> Result<(), Self::Error> {
        let mut state = lock(&self.state);
        state.calls.push(GpioCall::Write(pin, level));
        if state.failing.contains(&pin) {
            return Err(MockGpioError(pin));
        }
        state.levels.insert(pin, level);
        Ok(())
    }

    fn release(&mut self) {
        lock(&self.state).calls.push(GpioCall::Release);
    }
}

/// A call observed by [`MockTransport`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportCall {
    Connect,
    Reconnect,
    Subscribe(String),
    Disconnect,
}

#[derive(Debug, Error)]
#[error("mock transport failure: {0}")]
pub struct MockTransportError(pub String);

#[derive(Debug, Default)]
struct TransportScript {
    connect_results: VecDeque<Result<(), String>>,
    reconnect_results: VecDeque<Result<(), String>>,
    subscribe_results: VecDeque<Result<(), String>>,
    events: VecDeque<TransportEvent>,
    calls: Vec<TransportCall>,
}

/// Scripted transport
///
/// Connection results are consumed in order and default to success once
/// the script runs out. `next_event` pends until an event is pushed.
#[derive(Debug, Clone, Default)]
pub struct MockTransport {
    script: Arc<Mutex<TransportScript>>,
    events_ready: Arc<Notify>,
}

impl MockTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fail the next `count` connect attempts
    pub fn fail_connects(&self, count: usize, reason: &str) {
        let mut script = lock(&self.script);
        for _ in 0..count {
            script.connect_results.push_back(Err(reason.to_string()));
        }
    }

    /// Fail the next `count` reconnect attempts
    pub fn fail_reconnects(&self, count: usize, reason: &str) {
        let mut script = lock(&self.script);
        for _ in 0..count {
            script.reconnect_results.push_back(Err(reason.to_string()));
        }
    }

    /// Fail the next `count` subscribe requests
    pub fn fail_subscribes(&self, count: usize, reason: &str) {
        let mut script = lock(&self.script);
        for _ in 0..count {
            script.subscribe_results.push_back(Err(reason.to_string()));
        }
    }

    pub fn push_message(&self, topic: &str, payload: &[u8], retain: bool) {
        self.push_event(TransportEvent::Message(InboundMessage {
            topic: topic.to_string(),
            payload: payload.to_vec(),
            retain,
        }));
    }

    pub fn push_disconnect(&self, reason: &str) {
        self.push_event(TransportEvent::Disconnected(reason.to_string()));
    }

    pub fn push_event(&self, event: TransportEvent) {
        lock(&self.script).events.push_back(event);
        self.events_ready.notify_one();
    }

    pub fn calls(&self) -> Vec<TransportCall> {
        lock(&self.script).calls.clone()
    }

    pub fn connect_attempts(&self) -> usize {
        self.count(|call| matches!(call, TransportCall::Connect))
    }

    pub fn reconnect_attempts(&self) -> usize {
        self.count(|call| matches!(call, TransportCall::Reconnect))
    }

    pub fn subscriptions(&self) -> Vec<String> {
        lock(&self.script)
            .calls
            .iter()
            .filter_map(|call| match call {
                TransportCall::Subscribe(topic) => Some(topic.clone()),
                _ => None,
            })
            .collect()
    }

    pub fn pending_events(&self) -> usize {
        lock(&self.script).events.len()
    }

    fn count(&self, predicate: impl Fn(&TransportCall) -> bool) -> usize {
        lock(&self.script)
            .calls
            .iter()
            .filter(|call| predicate(call))
            .count()
    }

    fn record(
        &self,
        call: TransportCall,
        results: impl FnOnce(&mut TransportScript) -> &mut VecDeque<Result<(), String>>,
    ) -> Result<(), MockTransportError> {
        let mut script = lock(&self.script);
        script.calls.push(call);
        results(&mut *script)
            .pop_front()
            .unwrap_or(Ok(()))
            .map_err(MockTransportError)
    }
}

#[async_trait]
impl Transport for MockTransport {
    type Error = MockTransportError;

    async fn connect(&mut self) -> Result<(), Self::Error> {
        self.record(TransportCall::Connect, |s| &mut s.connect_results)
    }

    async fn reconnect(&mut self) -> Result<(), Self::Error> {
        self.record(TransportCall::Reconnect, |s| &mut s.reconnect_results)
    }

    async fn subscribe(&mut self, topic: &str) -> Result<(), Self::Error> {
        self.record(TransportCall::Subscribe(topic.to_string()), |s| {
            &mut s.subscribe_results
        })
    }

    async fn next_event(&mut self) -> TransportEvent {
        loop {
            let next = lock(&self.script).events.pop_front();
            if let Some(event) = next {
                return event;
            }
            self.events_ready.notified().await;
        }
    }

    async fn disconnect(&mut self) -> Result<(), Self::Error> {
        lock(&self.script).calls.push(TransportCall::Disconnect);
        Ok(())
    }
}

/// Sleeper that records requested delays and returns immediately
#[derive(Debug, Clone, Default)]
pub struct MockSleeper {
    sleeps: Arc<Mutex<Vec<Duration>>>,
}

impl MockSleeper {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn sleeps(&self) -> Vec<Duration> {
        lock(&self.sleeps).clone()
    }

    pub fn sleep_count(&self) -> usize {
        lock(&self.sleeps).len()
    }
}

#[async_trait]
impl Sleeper for MockSleeper {
    async fn sleep(&self, duration: Duration) {
        lock(&self.sleeps).push(duration);
        tokio::task::yield_now().await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mock_gpio_failed_write_keeps_level() {
        let mut gpio = MockGpio::new();
        let pin = PinId::new(5);
        gpio.write(pin, OutputLevel::High).unwrap();
        gpio.fail_writes_to(pin);

        assert!(gpio.write(pin, OutputLevel::Low).is_err());
        assert_eq!(gpio.level(pin), Some(OutputLevel::High));
        assert_eq!(gpio.writes().len(), 2);
    }

    #[tokio::test]
    async fn test_mock_transport_consumes_script_in_order() {
        let handle = MockTransport::new();
        handle.fail_connects(1, "refused");
        let mut transport = handle.clone();

        assert!(transport.connect().await.is_err());
        assert!(transport.connect().await.is_ok());
        assert_eq!(handle.connect_attempts(), 2);
    }

    #[tokio::test]
    async fn test_mock_transport_delivers_pushed_events() {
        let handle = MockTransport::new();
        let mut transport = handle.clone();

        let pending = tokio::spawn(async move { transport.next_event().await });
        tokio::task::yield_now().await;
        handle.push_disconnect("network");

        assert_eq!(
            pending.await.unwrap(),
            TransportEvent::Disconnected("network".to_string())
        );
    }

    #[tokio::test]
    async fn test_mock_sleeper_records_durations() {
        let sleeper = MockSleeper::new();
        sleeper.sleep(Duration::from_secs(15)).await;
        assert_eq!(sleeper.sleeps(), vec![Duration::from_secs(15)]);
    }
}
