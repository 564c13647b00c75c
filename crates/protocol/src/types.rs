//! USB type definitions carried inside envelopes
//!
//! This module defines the endpoint addressing, the 8-byte control setup
//! packet and the typed control requests derived from it. Only the fields
//! needed to answer EP0 descriptor requests are modelled beyond the raw
//! setup packet.

use crate::error::{ProtocolError, Result};
use byteorder::{ByteOrder, LittleEndian, ReadBytesExt};
use serde::{Deserialize, Serialize};
use std::io::Cursor;

/// Length of a USB control setup packet in bytes
pub const SETUP_PACKET_LEN: usize = 8;

/// Standard request codes (bRequest), USB 2.0 section 9.4
pub mod request {
    pub const GET_STATUS: u8 = 0;
    pub const CLEAR_FEATURE: u8 = 1;
    pub const SET_FEATURE: u8 = 3;
    pub const SET_ADDRESS: u8 = 5;
    pub const GET_DESCRIPTOR: u8 = 6;
    pub const SET_DESCRIPTOR: u8 = 7;
    pub const GET_CONFIGURATION: u8 = 8;
    pub const SET_CONFIGURATION: u8 = 9;
}

/// Descriptor type codes (high byte of wValue in descriptor requests)
pub mod descriptor_type {
    pub const DEVICE: u8 = 0x01;
    pub const CONFIGURATION: u8 = 0x02;
    pub const STRING: u8 = 0x03;
    pub const INTERFACE: u8 = 0x04;
    pub const ENDPOINT: u8 = 0x05;
    pub const DEVICE_QUALIFIER: u8 = 0x06;
    pub const OTHER_SPEED_CONFIGURATION: u8 = 0x07;
    pub const HID: u8 = 0x21;
    pub const REPORT: u8 = 0x22;
}

/// bmRequestType bit fields
pub mod request_type {
    pub const DIR_OUT: u8 = 0 << 7;
    pub const DIR_IN: u8 = 1 << 7;

    pub const TYPE_MASK: u8 = 0b0110_0000;
    pub const TYPE_STANDARD: u8 = 0 << 5;
    pub const TYPE_CLASS: u8 = 1 << 5;
    pub const TYPE_VENDOR: u8 = 2 << 5;

    pub const RECIPIENT_DEVICE: u8 = 0;
    pub const RECIPIENT_INTERFACE: u8 = 1;
}

/// USB device speed
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "kebab-case")]
pub enum DeviceSpeed {
    /// Low speed - 1.5 Mbps (USB 1.0)
    Low,
    /// Full speed - 12 Mbps (USB 1.1)
    Full,
    /// High speed - 480 Mbps (USB 2.0)
    #[default]
    High,
    /// SuperSpeed - 5 Gbps (USB 3.0)
    Super,
    /// SuperSpeed+ - 10 Gbps (USB 3.1)
    SuperPlus,
}

/// Endpoint transfer type, using the bmAttributes numbering
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TransferType {
    Control = 0,
    Isochronous = 1,
    Bulk = 2,
    Interrupt = 3,
}

/// Transfer direction as seen by the proxy link
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Direction {
    HostToDevice = 0,
    DeviceToHost = 1,
}

/// Endpoint a transfer targets
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Endpoint {
    /// Endpoint number (0-15)
    pub number: u8,
    pub transfer_type: TransferType,
    pub direction: Direction,
}

impl Endpoint {
    /// EP0, control, host-to-device: the only endpoint the emulator answers on
    pub const CONTROL: Endpoint = Endpoint {
        number: 0,
        transfer_type: TransferType::Control,
        direction: Direction::HostToDevice,
    };

    pub fn new(number: u8, transfer_type: TransferType, direction: Direction) -> Self {
        Self {
            number,
            transfer_type,
            direction,
        }
    }

    /// Whether this is the EP0 host-to-device control endpoint
    pub fn is_control(&self) -> bool {
        *self == Self::CONTROL
    }
}

/// Raw USB control setup packet
///
/// Layout (little-endian):
/// ```text
/// [bmRequestType: u8][bRequest: u8][wValue: u16][wIndex: u16][wLength: u16]
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SetupPacket {
    pub request_type: u8,
    pub request: u8,
    pub value: u16,
    pub index: u16,
    pub length: u16,
}

impl SetupPacket {
    /// Parse a setup packet from the first 8 bytes of `bytes`
    pub fn parse(bytes: &[u8]) -> Result<Self> {
        if bytes.len() < SETUP_PACKET_LEN {
            return Err(ProtocolError::BufferTooSmall {
                needed: SETUP_PACKET_LEN,
                available: bytes.len(),
            });
        }

        let mut cursor = Cursor::new(bytes);
        Ok(Self {
            request_type: cursor.read_u8()?,
            request: cursor.read_u8()?,
            value: cursor.read_u16::<LittleEndian>()?,
            index: cursor.read_u16::<LittleEndian>()?,
            length: cursor.read_u16::<LittleEndian>()?,
        })
    }

    /// Serialize to the on-bus 8-byte layout
    pub fn to_bytes(&self) -> [u8; SETUP_PACKET_LEN] {
        let mut buf = [0u8; SETUP_PACKET_LEN];
        buf[0] = self.request_type;
        buf[1] = self.request;
        LittleEndian::write_u16(&mut buf[2..4], self.value);
        LittleEndian::write_u16(&mut buf[4..6], self.index);
        LittleEndian::write_u16(&mut buf[6..8], self.length);
        buf
    }

    /// Whether the data stage (if any) flows device-to-host
    pub fn direction_in(&self) -> bool {
        self.request_type & request_type::DIR_IN != 0
    }

    fn is_standard(&self) -> bool {
        self.request_type & request_type::TYPE_MASK == request_type::TYPE_STANDARD
    }
}

/// GET_DESCRIPTOR / SET_DESCRIPTOR request fields
///
/// Both standard descriptor requests share this layout; `request` tells
/// them apart.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct GetDescriptor {
    pub request_type: u8,
    /// bRequest (6 for GET_DESCRIPTOR)
    pub request: u8,
    pub descriptor_type: u8,
    pub descriptor_index: u8,
    /// Language ID for string descriptors, zero otherwise
    pub language_id: u16,
    /// Maximum number of bytes the host accepts
    pub length: u16,
}

impl GetDescriptor {
    /// Standard device-recipient GET_DESCRIPTOR request
    pub fn new(descriptor_type: u8, descriptor_index: u8, length: u16) -> Self {
        Self {
            request_type: request_type::DIR_IN
                | request_type::TYPE_STANDARD
                | request_type::RECIPIENT_DEVICE,
            request: request::GET_DESCRIPTOR,
            descriptor_type,
            descriptor_index,
            language_id: 0,
            length,
        }
    }

    pub fn with_language(mut self, language_id: u16) -> Self {
        self.language_id = language_id;
        self
    }
}

/// Control request carried by a transfer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ControlRequest {
    /// Standard descriptor request
    GetDescriptor(GetDescriptor),
    /// Any other setup packet, kept raw
    Other(SetupPacket),
}

impl ControlRequest {
    /// Classify a raw setup packet
    pub fn from_setup(setup: SetupPacket) -> Self {
        let descriptor_request =
            setup.request == request::GET_DESCRIPTOR || setup.request == request::SET_DESCRIPTOR;
        if !(setup.is_standard() && descriptor_request) {
            return Self::Other(setup);
        }

        let [descriptor_index, descriptor_type] = setup.value.to_le_bytes();
        Self::GetDescriptor(GetDescriptor {
            request_type: setup.request_type,
            request: setup.request,
            descriptor_type,
            descriptor_index,
            language_id: setup.index,
            length: setup.length,
        })
    }

    /// Parse raw setup bytes straight into a typed request
    pub fn parse(bytes: &[u8]) -> Result<Self> {
        SetupPacket::parse(bytes).map(Self::from_setup)
    }

    /// Rebuild the raw setup packet
    pub fn to_setup(&self) -> SetupPacket {
        match self {
            Self::GetDescriptor(req) => SetupPacket {
                request_type: req.request_type,
                request: req.request,
                value: u16::from_le_bytes([req.descriptor_index, req.descriptor_type]),
                index: req.language_id,
                length: req.length,
            },
            Self::Other(setup) => *setup,
        }
    }

    /// bRequest of the underlying setup packet
    pub fn request(&self) -> u8 {
        match self {
            Self::GetDescriptor(req) => req.request,
            Self::Other(setup) => setup.request,
        }
    }
}

impl From<GetDescriptor> for ControlRequest {
    fn from(req: GetDescriptor) -> Self {
        Self::GetDescriptor(req)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_get_device_descriptor() {
        // Linux enumeration's first request
        let bytes = [0x80, 0x06, 0x00, 0x01, 0x00, 0x00, 0x40, 0x00];
        let req = ControlRequest::parse(&bytes).unwrap();

        let ControlRequest::GetDescriptor(get) = req else {
            panic!("Expected GetDescriptor, got {:?}", req);
        };
        assert_eq!(get.request, request::GET_DESCRIPTOR);
        assert_eq!(get.descriptor_type, descriptor_type::DEVICE);
        assert_eq!(get.descriptor_index, 0);
        assert_eq!(get.length, 64);
    }

    #[test]
    fn test_string_descriptor_language() {
        let bytes = [0x80, 0x06, 0x02, 0x03, 0x09, 0x04, 0xff, 0x00];
        let ControlRequest::GetDescriptor(get) = ControlRequest::parse(&bytes).unwrap() else {
            panic!("Expected GetDescriptor");
        };
        assert_eq!(get.descriptor_type, descriptor_type::STRING);
        assert_eq!(get.descriptor_index, 2);
        assert_eq!(get.language_id, 0x0409);
        assert_eq!(get.length, 255);
    }

    #[test]
    fn test_set_configuration_is_other() {
        let bytes = [0x00, 0x09, 0x01, 0x00, 0x00, 0x00, 0x00, 0x00];
        let req = ControlRequest::parse(&bytes).unwrap();
        assert!(matches!(req, ControlRequest::Other(_)));
        assert_eq!(req.request(), request::SET_CONFIGURATION);
    }

    #[test]
    fn test_class_request_with_descriptor_code_is_other() {
        // HID GET_REPORT uses bRequest 1, but a class request numbered 6 must
        // not be mistaken for GET_DESCRIPTOR either
        let bytes = [0xa1, 0x06, 0x00, 0x22, 0x00, 0x00, 0x40, 0x00];
        assert!(matches!(
            ControlRequest::parse(&bytes).unwrap(),
            ControlRequest::Other(_)
        ));
    }

    #[test]
    fn test_setup_bytes_preserved() {
        let bytes = [0x80, 0x06, 0x00, 0x02, 0x00, 0x00, 0x09, 0x00];
        let req = ControlRequest::parse(&bytes).unwrap();
        assert_eq!(req.to_setup().to_bytes(), bytes);
    }

    #[test]
    fn test_short_setup_packet() {
        let result = SetupPacket::parse(&[0x80, 0x06, 0x00]);
        assert!(matches!(
            result,
            Err(ProtocolError::BufferTooSmall {
                needed: 8,
                available: 3
            })
        ));
    }

    #[test]
    fn test_control_endpoint() {
        assert!(Endpoint::CONTROL.is_control());
        assert!(!Endpoint::new(1, TransferType::Control, Direction::HostToDevice).is_control());
        assert!(!Endpoint::new(0, TransferType::Control, Direction::DeviceToHost).is_control());
        assert!(!Endpoint::new(0, TransferType::Bulk, Direction::HostToDevice).is_control());
    }

    #[test]
    fn test_new_get_descriptor_direction() {
        let req = ControlRequest::from(GetDescriptor::new(descriptor_type::CONFIGURATION, 0, 9));
        assert!(req.to_setup().direction_in());
    }
}
