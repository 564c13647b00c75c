//! USB device class triple

use crate::error::{EmulatorError, Result};
use serde::{Deserialize, Serialize};
use std::fmt;

/// bDeviceClass / bDeviceSubClass / bDeviceProtocol
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DeviceClass {
    pub class: u8,
    pub subclass: u8,
    pub protocol: u8,
}

impl DeviceClass {
    /// Class defined per interface
    pub const PER_INTERFACE: DeviceClass = DeviceClass::new(0x00, 0x00, 0x00);
    /// HID boot keyboard (interface-level triple)
    pub const HID_BOOT_KEYBOARD: DeviceClass = DeviceClass::new(0x03, 0x01, 0x01);
    /// Mass storage, SCSI transparent, bulk-only
    pub const MASS_STORAGE_BOT: DeviceClass = DeviceClass::new(0x08, 0x06, 0x50);
    /// Vendor specific
    pub const VENDOR: DeviceClass = DeviceClass::new(0xff, 0x00, 0x00);

    pub const fn new(class: u8, subclass: u8, protocol: u8) -> Self {
        Self {
            class,
            subclass,
            protocol,
        }
    }

    /// Build a class triple from numeric-looking text
    ///
    /// Each field accepts a decimal or `0x`-prefixed hexadecimal integer in
    /// `0..=255`, with surrounding whitespace and a leading `+` tolerated.
    /// The first field that does not convert fails the whole construction.
    pub fn parse(class: &str, subclass: &str, protocol: &str) -> Result<Self> {
        Ok(Self {
            class: parse_field("class", class)?,
            subclass: parse_field("subclass", subclass)?,
            protocol: parse_field("protocol", protocol)?,
        })
    }
}

impl fmt::Display for DeviceClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{:02x}:{:02x}:{:02x}",
            self.class, self.subclass, self.protocol
        )
    }
}

/// Convert one numeric-looking class field to a byte
pub fn parse_field(field: &'static str, value: &str) -> Result<u8> {
    let text = value.trim();
    let text = text.strip_prefix('+').unwrap_or(text);

    let parsed = match text
        .strip_prefix("0x")
        .or_else(|| text.strip_prefix("0X"))
    {
        Some(hex) => u64::from_str_radix(hex, 16),
        None => text.parse::<u64>(),
    }
    .map_err(|_| EmulatorError::configuration(field, value, "not a non-negative integer"))?;

    u8::try_from(parsed)
        .map_err(|_| EmulatorError::configuration(field, value, "out of range 0..=255"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_decimal_and_hex() {
        let class = DeviceClass::parse("3", " 0x01 ", "+1").unwrap();
        assert_eq!(class, DeviceClass::HID_BOOT_KEYBOARD);
    }

    #[test]
    fn test_parse_uppercase_hex() {
        assert_eq!(parse_field("class", "0XFF").unwrap(), 0xff);
    }

    #[test]
    fn test_non_numeric_rejected() {
        let err = DeviceClass::parse("3", "keyboard", "1").unwrap_err();
        let EmulatorError::Configuration { field, value, .. } = err else {
            panic!("Expected Configuration error, got {:?}", err);
        };
        assert_eq!(field, "subclass");
        assert_eq!(value, "keyboard");
    }

    #[test]
    fn test_negative_rejected() {
        assert!(matches!(
            parse_field("class", "-1"),
            Err(EmulatorError::Configuration { .. })
        ));
    }

    #[test]
    fn test_out_of_range_rejected() {
        let err = parse_field("protocol", "256").unwrap_err();
        assert!(err.to_string().contains("out of range"));
    }

    #[test]
    fn test_empty_rejected() {
        assert!(parse_field("class", "   ").is_err());
        assert!(parse_field("class", "0x").is_err());
    }

    #[test]
    fn test_display() {
        assert_eq!(DeviceClass::MASS_STORAGE_BOT.to_string(), "08:06:50");
    }
}
