//! Test utilities for the USB device emulator
//!
//! Provides envelope and request builders shared by the test suites.
//!
//! # Example
//!
//! ```
//! use common::test_utils::{get_descriptor, host_request};
//! use protocol::{Endpoint, descriptor_type};
//!
//! let envelope = host_request(Endpoint::CONTROL, get_descriptor(descriptor_type::DEVICE, 0));
//! assert!(envelope.validate().is_ok());
//! ```

use protocol::{
    Content, ControlRequest, Direction, Endpoint, Envelope, GetDescriptor, ManagementContent,
    MessageKind, NewDevice, TransferContent, TransferType,
};

/// wLength used by the builders: large enough for any test descriptor
pub const TEST_MAX_LENGTH: u16 = 0xFF;

/// GET_DESCRIPTOR request for `(descriptor_type, index)` accepting up to
/// [`TEST_MAX_LENGTH`] bytes
pub fn get_descriptor(descriptor_type: u8, index: u8) -> ControlRequest {
    GetDescriptor::new(descriptor_type, index, TEST_MAX_LENGTH).into()
}

/// Request transfer content on `endpoint`
pub fn request_content(endpoint: Endpoint, request: ControlRequest) -> TransferContent {
    TransferContent::Request { endpoint, request }
}

/// Host-originated request envelope
pub fn host_request(endpoint: Endpoint, request: ControlRequest) -> Envelope {
    Envelope::from_host(request_content(endpoint, request))
}

/// Interrupt IN endpoint with the given number
pub fn interrupt_in(number: u8) -> Endpoint {
    Endpoint::new(number, TransferType::Interrupt, Direction::DeviceToHost)
}

/// EP`number`, otherwise identical to the control endpoint
pub fn control_endpoint(number: u8) -> Endpoint {
    Endpoint {
        number,
        ..Endpoint::CONTROL
    }
}

/// Host envelope carrying content the device never accepts inbound
pub fn host_reset() -> Envelope {
    Envelope::from_host(ManagementContent::Reset)
}

/// Envelope whose discriminator disagrees with its payload
pub fn mislabelled(mut envelope: Envelope) -> Envelope {
    envelope.kind = match envelope.kind {
        MessageKind::Data => MessageKind::Management,
        MessageKind::Management => MessageKind::Data,
    };
    envelope
}

/// Extract the NewDevice snapshot from a management envelope
pub fn expect_new_device(envelope: &Envelope) -> &NewDevice {
    match &envelope.content {
        Content::Management(ManagementContent::NewDevice(new_device)) => new_device,
        other => panic!("Expected NewDevice, got {:?}", other),
    }
}

/// Extract the response bytes from a transfer envelope
pub fn expect_response(envelope: &Envelope) -> &[u8] {
    match &envelope.content {
        Content::Transfer(TransferContent::Response { response, .. }) => response,
        other => panic!("Expected Response, got {:?}", other),
    }
}
