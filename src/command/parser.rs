//! Decode-then-validate step for inbound relay commands
//!
//! Payloads are JSON objects of the form
//! `{"type": "single" | "multi", "relay": <int> | [<int>, ...], "state": "on" | "off"}`.
//! Unknown fields are ignored. Parsing never fails outright: every problem is
//! reported through [`Command::Invalid`] or, for per-target problems in a
//! `multi` command, through the `rejected` list of [`Command::Multi`] or
//! [`Command::Rejected`].

use crate::relay::{RelayId, RelayMap, RelayState};
use serde::Deserialize;
use serde_json::Value;
use thiserror::Error;

/// Validation failures for a single inbound payload
#[derive(Debug, Clone, Error, PartialEq)]
pub enum CommandError {
    #[error("Malformed payload: {0}")]
    MalformedPayload(String),
    #[error("Unknown command type: {0}")]
    UnknownCommandType(String),
    #[error("Relay {relay} is not in the valid range ({valid})")]
    RelayOutOfRange { relay: String, valid: String },
    #[error("Unknown state: {0}")]
    UnknownState(String),
}

/// Validated command, consumed immediately by the dispatcher
#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    /// One relay, fully validated
    Single { relay: RelayId, state: RelayState },
    /// Validated subset of a multi-relay command
    ///
    /// `relays` holds the in-range targets in payload order; `rejected`
    /// holds one error per out-of-range element.
    Multi {
        relays: Vec<RelayId>,
        state: RelayState,
        rejected: Vec<CommandError>,
    },
    /// Nothing to apply
    Invalid(CommandError),
    /// Multi-relay command with nothing to apply, one error per problem
    ///
    /// Produced when the state is unknown: each out-of-range element and
    /// each in-range target skipped because of the state is listed.
    Rejected(Vec<CommandError>),
}

#[derive(Debug, Deserialize)]
struct RawCommand {
    #[serde(rename = "type")]
    kind: Value,
    relay: Value,
    state: Value,
}

/// Pure payload parsing against a relay map
pub struct CommandParser;

impl CommandParser {
    /// Parse and validate a raw payload
    pub fn parse(payload: &[u8], relays: &RelayMap) -> Command {
        let raw = match serde_json::from_slice::<RawCommand>(payload) {
            Ok(raw) => raw,
            Err(e) => return Command::Invalid(CommandError::MalformedPayload(e.to_string())),
        };

        match raw.kind.as_str() {
            Some("single") => Self::parse_single(&raw, relays),
            Some("multi") => Self::parse_multi(&raw, relays),
            Some(other) => Command::Invalid(CommandError::UnknownCommandType(other.to_string())),
            None => Command::Invalid(CommandError::UnknownCommandType(raw.kind.to_string())),
        }
    }

    fn parse_single(raw: &RawCommand, relays: &RelayMap) -> Command {
        let relay = match Self::resolve_relay(&raw.relay, relays) {
            Ok(relay) => relay,
            Err(e) => return Command::Invalid(e),
        };

        match Self::parse_state(&raw.state) {
            Ok(state) => Command::Single { relay, state },
            Err(e) => Command::Invalid(e),
        }
    }

    fn parse_multi(raw: &RawCommand, relays: &RelayMap) -> Command {
        let elements = match &raw.relay {
            Value::Array(elements) if !elements.is_empty() => elements,
            Value::Array(_) => {
                return Command::Invalid(CommandError::MalformedPayload(
                    "multi command requires at least one relay".to_string(),
                ))
            }
            other => {
                return Command::Invalid(CommandError::MalformedPayload(format!(
                    "multi command requires a relay list, got {other}"
                )))
            }
        };

        let mut targets = Vec::with_capacity(elements.len());
        let mut rejected = Vec::new();
        for element in elements {
            match Self::resolve_relay(element, relays) {
                Ok(relay) => targets.push(relay),
                Err(e) => rejected.push(e),
            }
        }

        match Self::parse_state(&raw.state) {
            Ok(state) => Command::Multi {
                relays: targets,
                state,
                rejected,
            },
            Err(e) => {
                // The state applies to every target, so each in-range one is skipped
                rejected.extend(targets.iter().map(|_| e.clone()));
                Command::Rejected(rejected)
            }
        }
    }

    fn resolve_relay(value: &Value, relays: &RelayMap) -> Result<RelayId, CommandError> {
        value
            .as_u64()
            .and_then(|raw| relays.lookup(raw))
            .ok_or_else(|| CommandError::RelayOutOfRange {
                relay: value.to_string(),
                valid: relays.describe_range(),
            })
    }

    fn parse_state(value: &Value) -> Result<RelayState, CommandError> {
        value
            .as_str()
            .and_then(RelayState::parse)
            .ok_or_else(|| {
                CommandError::UnknownState(match value {
                    Value::String(s) => s.clone(),
                    other => other.to_string(),
                })
            })
    }
}
