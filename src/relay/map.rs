//! Static mapping from logical relay numbers to physical GPIO lines
//!
//! The map is built once from configuration and never mutated, so it can be
//! shared freely between readers.

use std::collections::BTreeMap;
use std::fmt;
use thiserror::Error;

/// Logical relay number as used in command payloads (1-based)
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct RelayId(u8);

impl RelayId {
    pub fn new(id: u8) -> Self {
        Self(id)
    }

    pub fn get(self) -> u8 {
        self.0
    }
}

impl fmt::Display for RelayId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Hardware line number understood by the GPIO backend (BCM numbering)
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct PinId(u8);

impl PinId {
    pub fn new(pin: u8) -> Self {
        Self(pin)
    }

    pub fn get(self) -> u8 {
        self.0
    }
}

impl fmt::Display for PinId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Errors raised while building or querying the relay map
#[derive(Debug, Error, PartialEq)]
pub enum RelayMapError {
    #[error("Relay map must contain at least one relay")]
    Empty,
    #[error("Relay numbers start at 1, got {0}")]
    ZeroRelayId(u8),
    #[error("Relay {relay} reuses pin {pin}, already assigned to relay {existing}")]
    DuplicatePin {
        relay: RelayId,
        pin: PinId,
        existing: RelayId,
    },
    #[error("Relay numbers must run from 1 without gaps, relay {missing} is missing before relay {found}")]
    MissingRelay { missing: RelayId, found: RelayId },
}

/// Bijective relay → pin mapping
#[derive(Debug, Clone, PartialEq)]
pub struct RelayMap {
    pins: BTreeMap<RelayId, PinId>,
}

impl RelayMap {
    /// Build a map from `(relay, pin)` pairs
    ///
    /// Relays must cover `1..=N` exactly and no two relays may share a pin.
    pub fn new<I>(entries: I) -> Result<Self, RelayMapError>
    where
        I: IntoIterator<Item = (u8, u8)>,
    {
        let mut pins = BTreeMap::new();
        let mut owners: BTreeMap<PinId, RelayId> = BTreeMap::new();

        for (relay, pin) in entries {
            if relay == 0 {
                return Err(RelayMapError::ZeroRelayId(relay));
            }
            let relay = RelayId::new(relay);
            let pin = PinId::new(pin);

            if let Some(existing) = owners.get(&pin) {
                if *existing != relay {
                    return Err(RelayMapError::DuplicatePin {
                        relay,
                        pin,
                        existing: *existing,
                    });
                }
            }

            // A relay listed twice keeps its last pin; release the old one
            if let Some(previous) = pins.insert(relay, pin) {
                owners.remove(&previous);
            }
            owners.insert(pin, relay);
        }

        if pins.is_empty() {
            return Err(RelayMapError::Empty);
        }

        // Keys are sorted and start at 1 or above, so the first mismatch is the gap
        for (expected, relay) in (1..=u8::MAX).zip(pins.keys()) {
            if relay.get() != expected {
                return Err(RelayMapError::MissingRelay {
                    missing: RelayId::new(expected),
                    found: *relay,
                });
            }
        }

        Ok(Self { pins })
    }

    /// The six-relay PiRelay-6 HAT wiring (physical pins 29, 31, 33, 35, 37, 40)
    pub fn pi_relay_6() -> Self {
        Self {
            pins: [(1, 5), (2, 6), (3, 13), (4, 19), (5, 26), (6, 21)]
                .into_iter()
                .map(|(relay, pin)| (RelayId::new(relay), PinId::new(pin)))
                .collect(),
        }
    }

    /// Resolve a relay to its physical line
    pub fn physical_output_for(&self, relay: RelayId) -> Option<PinId> {
        self.pins.get(&relay).copied()
    }

    /// Resolve a raw relay number taken from a payload
    pub fn lookup(&self, raw: u64) -> Option<RelayId> {
        let id = u8::try_from(raw).ok().map(RelayId::new)?;
        self.pins.contains_key(&id).then_some(id)
    }

    /// All physical lines in relay order
    pub fn pins(&self) -> impl Iterator<Item = PinId> + '_ {
        self.pins.values().copied()
    }

    /// All `(relay, pin)` pairs in relay order
    pub fn iter(&self) -> impl Iterator<Item = (RelayId, PinId)> + '_ {
        self.pins.iter().map(|(relay, pin)| (*relay, *pin))
    }

    pub fn len(&self) -> usize {
        self.pins.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pins.is_empty()
    }

    /// Human-readable range for log messages, e.g. `1-6`
    pub fn describe_range(&self) -> String {
        let first = self.pins.keys().next();
        let last = self.pins.keys().next_back();
        match (first, last) {
            (Some(first), Some(last)) if first == last => first.to_string(),
            (Some(first), Some(last)) => format!("{first}-{last}"),
            _ => "none".to_string(),
        }
    }
}

impl Default for RelayMap {
    fn default() -> Self {
        Self::pi_relay_6()
    }
}
