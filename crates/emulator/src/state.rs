//! Connection state machine
//!
//! The emulated device is either plugged into the host (`Connected`) or not.
//! Transitions are looked up in a fixed table; anything missing from the
//! table is an invalid transition and changes nothing.

use crate::error::{EmulatorError, Result};
use std::fmt;

/// Device connection state
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum DeviceState {
    #[default]
    Disconnected,
    Connected,
}

impl fmt::Display for DeviceState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Disconnected => f.write_str("disconnected"),
            Self::Connected => f.write_str("connected"),
        }
    }
}

/// State machine trigger
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Trigger {
    Connect,
    Disconnect,
}

impl fmt::Display for Trigger {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Connect => f.write_str("connect"),
            Self::Disconnect => f.write_str("disconnect"),
        }
    }
}

/// (from, trigger) -> to
const TRANSITIONS: [(DeviceState, Trigger, DeviceState); 2] = [
    (
        DeviceState::Disconnected,
        Trigger::Connect,
        DeviceState::Connected,
    ),
    (
        DeviceState::Connected,
        Trigger::Disconnect,
        DeviceState::Disconnected,
    ),
];

/// Resolve the state `trigger` leads to from `state`
pub fn transition(state: DeviceState, trigger: Trigger) -> Result<DeviceState> {
    TRANSITIONS
        .iter()
        .find(|(from, on, _)| *from == state && *on == trigger)
        .map(|(_, _, to)| *to)
        .ok_or(EmulatorError::InvalidTransition { state, trigger })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_initial_state() {
        assert_eq!(DeviceState::default(), DeviceState::Disconnected);
    }

    #[test]
    fn test_valid_transitions() {
        assert_eq!(
            transition(DeviceState::Disconnected, Trigger::Connect).unwrap(),
            DeviceState::Connected
        );
        assert_eq!(
            transition(DeviceState::Connected, Trigger::Disconnect).unwrap(),
            DeviceState::Disconnected
        );
    }

    #[test]
    fn test_no_self_transitions() {
        for (state, trigger) in [
            (DeviceState::Connected, Trigger::Connect),
            (DeviceState::Disconnected, Trigger::Disconnect),
        ] {
            let err = transition(state, trigger).unwrap_err();
            assert!(matches!(
                err,
                EmulatorError::InvalidTransition { state: s, trigger: t } if s == state && t == trigger
            ));
        }
    }
}
