//! Emulator error types

use crate::state::{DeviceState, Trigger};
use protocol::{MessageKind, ProtocolError};
use thiserror::Error;

/// Errors raised by the emulated device
///
/// None of these are retried internally: each one means a caller or a
/// collaborator broke its contract.
#[derive(Debug, Error)]
pub enum EmulatorError {
    /// A device class field could not be read as a byte-sized integer
    #[error("Configuration error: {field} = {value:?}: {reason}")]
    Configuration {
        field: &'static str,
        value: String,
        reason: String,
    },

    /// Envelope with the wrong origin, or a kind that disagrees with its content
    #[error("Protocol violation: {0}")]
    ProtocolViolation(#[from] ProtocolError),

    /// Inbound envelope the device has no handling for
    #[error("Unsupported inbound message: {content} ({kind})")]
    UnsupportedMessage {
        kind: MessageKind,
        content: &'static str,
    },

    /// State machine trigger fired from a state that does not accept it
    #[error("Invalid transition: cannot {trigger} while {state}")]
    InvalidTransition { state: DeviceState, trigger: Trigger },

    /// `tick` or `dispatch_request` called from inside a request handler
    #[error("Cannot {operation} while a request is being dispatched")]
    NestedDispatch { operation: &'static str },
}

impl EmulatorError {
    pub(crate) fn configuration(
        field: &'static str,
        value: impl Into<String>,
        reason: impl Into<String>,
    ) -> Self {
        Self::Configuration {
            field,
            value: value.into(),
            reason: reason.into(),
        }
    }
}

/// Type alias for emulator results
pub type Result<T> = std::result::Result<T, EmulatorError>;

#[cfg(test)]
mod tests {
    use super::*;
    use protocol::Origin;

    #[test]
    fn test_invalid_transition_display() {
        let err = EmulatorError::InvalidTransition {
            state: DeviceState::Disconnected,
            trigger: Trigger::Disconnect,
        };
        assert_eq!(
            err.to_string(),
            "Invalid transition: cannot disconnect while disconnected"
        );
    }

    #[test]
    fn test_violation_wraps_protocol_error() {
        let err: EmulatorError = ProtocolError::UnexpectedOrigin {
            expected: Origin::Host,
            actual: Origin::Device,
        }
        .into();
        assert!(matches!(err, EmulatorError::ProtocolViolation(_)));
        assert!(err.to_string().starts_with("Protocol violation"));
    }

    #[test]
    fn test_nested_dispatch_display() {
        let err = EmulatorError::NestedDispatch { operation: "tick" };
        assert_eq!(
            err.to_string(),
            "Cannot tick while a request is being dispatched"
        );
    }

    #[test]
    fn test_configuration_display() {
        let err = EmulatorError::configuration("subclass", "abc", "not an integer");
        assert_eq!(
            err.to_string(),
            "Configuration error: subclass = \"abc\": not an integer"
        );
    }
}
