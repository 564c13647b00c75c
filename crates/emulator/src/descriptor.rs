//! Standard USB descriptor layouts
//!
//! Fixed-layout descriptors as defined in USB 2.0 chapter 9.6, serialized
//! little-endian. A configuration serializes together with all of its
//! interfaces and endpoints, which is what a host receives for
//! GET_DESCRIPTOR(CONFIGURATION).

use crate::class::DeviceClass;
use protocol::{DeviceSpeed, descriptor_type};
use thiserror::Error;

pub const DEVICE_DESCRIPTOR_LEN: usize = 18;
pub const CONFIGURATION_DESCRIPTOR_LEN: usize = 9;
pub const INTERFACE_DESCRIPTOR_LEN: usize = 9;
pub const ENDPOINT_DESCRIPTOR_LEN: usize = 7;

/// US English, the only language the emulator advertises
pub const LANGUAGE_EN_US: u16 = 0x0409;

/// Longest string a string descriptor can hold, in UTF-16 code units
pub const MAX_STRING_UNITS: usize = (u8::MAX as usize - 2) / 2;

/// Configuration attribute bit that must always be set
const ATTRIBUTES_RESERVED: u8 = 0x80;
pub const ATTRIBUTES_SELF_POWERED: u8 = 0x40;
pub const ATTRIBUTES_REMOTE_WAKEUP: u8 = 0x20;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum InvalidDescriptor {
    #[error("unexpected descriptor length {0}")]
    UnexpectedLength(usize),
    #[error("unexpected descriptor type {0:#04x}")]
    UnexpectedType(u8),
}

/// Device descriptor
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DeviceDescriptor {
    /// bcdUSB
    pub usb_version: u16,
    pub class: DeviceClass,
    pub max_packet_size_0: u8,
    pub vendor_id: u16,
    pub product_id: u16,
    /// bcdDevice
    pub device_version: u16,
    pub manufacturer_index: u8,
    pub product_index: u8,
    pub serial_number_index: u8,
    pub num_configurations: u8,
}

impl DeviceDescriptor {
    /// Descriptor for a device of `class` running at `speed`
    ///
    /// bcdUSB and the EP0 packet size follow from the speed; IDs and string
    /// indices are left zero.
    pub fn new(class: DeviceClass, speed: DeviceSpeed) -> Self {
        let (usb_version, max_packet_size_0) = match speed {
            DeviceSpeed::Low => (0x0110, 8),
            DeviceSpeed::Full => (0x0110, 64),
            DeviceSpeed::High => (0x0200, 64),
            // SuperSpeed encodes the EP0 size as an exponent: 2^9 = 512
            DeviceSpeed::Super => (0x0300, 9),
            DeviceSpeed::SuperPlus => (0x0310, 9),
        };

        Self {
            usb_version,
            class,
            max_packet_size_0,
            vendor_id: 0,
            product_id: 0,
            device_version: 0x0100,
            manufacturer_index: 0,
            product_index: 0,
            serial_number_index: 0,
            num_configurations: 1,
        }
    }

    pub fn to_bytes(&self) -> [u8; DEVICE_DESCRIPTOR_LEN] {
        let [usb_lo, usb_hi] = self.usb_version.to_le_bytes();
        let [vid_lo, vid_hi] = self.vendor_id.to_le_bytes();
        let [pid_lo, pid_hi] = self.product_id.to_le_bytes();
        let [dev_lo, dev_hi] = self.device_version.to_le_bytes();
        [
            DEVICE_DESCRIPTOR_LEN as u8,
            descriptor_type::DEVICE,
            usb_lo,
            usb_hi,
            self.class.class,
            self.class.subclass,
            self.class.protocol,
            self.max_packet_size_0,
            vid_lo,
            vid_hi,
            pid_lo,
            pid_hi,
            dev_lo,
            dev_hi,
            self.manufacturer_index,
            self.product_index,
            self.serial_number_index,
            self.num_configurations,
        ]
    }

    pub fn parse(buf: &[u8]) -> Result<Self, InvalidDescriptor> {
        if buf.len() != DEVICE_DESCRIPTOR_LEN || buf[0] as usize != DEVICE_DESCRIPTOR_LEN {
            return Err(InvalidDescriptor::UnexpectedLength(buf.len()));
        }
        if buf[1] != descriptor_type::DEVICE {
            return Err(InvalidDescriptor::UnexpectedType(buf[1]));
        }

        let u16_at = |i: usize| u16::from_le_bytes([buf[i], buf[i + 1]]);
        Ok(Self {
            usb_version: u16_at(2),
            class: DeviceClass::new(buf[4], buf[5], buf[6]),
            max_packet_size_0: buf[7],
            vendor_id: u16_at(8),
            product_id: u16_at(10),
            device_version: u16_at(12),
            manufacturer_index: buf[14],
            product_index: buf[15],
            serial_number_index: buf[16],
            num_configurations: buf[17],
        })
    }
}

/// Endpoint descriptor
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EndpointDescriptor {
    /// bEndpointAddress, direction in bit 7
    pub address: u8,
    /// bmAttributes, transfer type in bits 0-1
    pub attributes: u8,
    pub max_packet_size: u16,
    pub interval: u8,
}

impl EndpointDescriptor {
    fn write(&self, out: &mut Vec<u8>) {
        out.push(ENDPOINT_DESCRIPTOR_LEN as u8);
        out.push(descriptor_type::ENDPOINT);
        out.push(self.address);
        out.push(self.attributes);
        out.extend_from_slice(&self.max_packet_size.to_le_bytes());
        out.push(self.interval);
    }
}

/// Interface descriptor with its endpoints
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InterfaceDescriptor {
    pub number: u8,
    pub alternate_setting: u8,
    pub class: DeviceClass,
    pub string_index: u8,
    pub endpoints: Vec<EndpointDescriptor>,
}

impl InterfaceDescriptor {
    pub fn new(number: u8, class: DeviceClass) -> Self {
        Self {
            number,
            alternate_setting: 0,
            class,
            string_index: 0,
            endpoints: Vec::new(),
        }
    }

    pub fn with_endpoint(mut self, endpoint: EndpointDescriptor) -> Self {
        self.endpoints.push(endpoint);
        self
    }

    fn total_len(&self) -> usize {
        INTERFACE_DESCRIPTOR_LEN + self.endpoints.len() * ENDPOINT_DESCRIPTOR_LEN
    }

    fn write(&self, out: &mut Vec<u8>) {
        out.push(INTERFACE_DESCRIPTOR_LEN as u8);
        out.push(descriptor_type::INTERFACE);
        out.push(self.number);
        out.push(self.alternate_setting);
        out.push(self.endpoints.len() as u8);
        out.push(self.class.class);
        out.push(self.class.subclass);
        out.push(self.class.protocol);
        out.push(self.string_index);
        for endpoint in &self.endpoints {
            endpoint.write(out);
        }
    }
}

/// Configuration descriptor with its interfaces
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfigurationDescriptor {
    /// bConfigurationValue used by SET_CONFIGURATION
    pub value: u8,
    pub string_index: u8,
    /// bmAttributes without the reserved bit 7, which is always set
    pub attributes: u8,
    /// bMaxPower in 2 mA units
    pub max_power: u8,
    pub interfaces: Vec<InterfaceDescriptor>,
}

impl ConfigurationDescriptor {
    /// Bus-powered, 100 mA, one interface without endpoints beyond EP0
    pub fn single_interface(class: DeviceClass) -> Self {
        Self {
            value: 1,
            string_index: 0,
            attributes: 0,
            max_power: 50,
            interfaces: vec![InterfaceDescriptor::new(0, class)],
        }
    }

    /// wTotalLength: this descriptor plus everything nested in it
    pub fn total_len(&self) -> usize {
        CONFIGURATION_DESCRIPTOR_LEN
            + self
                .interfaces
                .iter()
                .map(InterfaceDescriptor::total_len)
                .sum::<usize>()
    }

    /// Number of distinct interface numbers (alternate settings share one)
    fn num_interfaces(&self) -> u8 {
        let mut numbers: Vec<u8> = self.interfaces.iter().map(|i| i.number).collect();
        numbers.sort_unstable();
        numbers.dedup();
        numbers.len() as u8
    }

    pub fn to_bytes(&self) -> Vec<u8> {
        let total_len = self.total_len();
        let mut out = Vec::with_capacity(total_len);
        out.push(CONFIGURATION_DESCRIPTOR_LEN as u8);
        out.push(descriptor_type::CONFIGURATION);
        out.extend_from_slice(&(total_len as u16).to_le_bytes());
        out.push(self.num_interfaces());
        out.push(self.value);
        out.push(self.string_index);
        out.push(ATTRIBUTES_RESERVED | self.attributes);
        out.push(self.max_power);
        for interface in &self.interfaces {
            interface.write(&mut out);
        }
        out
    }
}

/// String descriptor zero: the supported language IDs
pub fn language_table(languages: &[u16]) -> Vec<u8> {
    let mut out = Vec::with_capacity(2 + languages.len() * 2);
    out.push((2 + languages.len() * 2) as u8);
    out.push(descriptor_type::STRING);
    for language in languages {
        out.extend_from_slice(&language.to_le_bytes());
    }
    out
}

/// UTF-16LE string descriptor
///
/// Text beyond [`MAX_STRING_UNITS`] code units does not fit in a descriptor
/// and is cut off.
pub fn string_descriptor(text: &str) -> Vec<u8> {
    let units: Vec<u16> = text.encode_utf16().take(MAX_STRING_UNITS).collect();
    let mut out = Vec::with_capacity(2 + units.len() * 2);
    out.push((2 + units.len() * 2) as u8);
    out.push(descriptor_type::STRING);
    for unit in units {
        out.extend_from_slice(&unit.to_le_bytes());
    }
    out
}
