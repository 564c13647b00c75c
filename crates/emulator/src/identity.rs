//! Static descriptor identity of the emulated device
//!
//! The identity is the set of descriptor byte buffers the device answers
//! GET_DESCRIPTOR with, keyed by descriptor type and index. It never changes
//! after construction.

use crate::class::DeviceClass;
use crate::descriptor::{
    ConfigurationDescriptor, DeviceDescriptor, LANGUAGE_EN_US, language_table, string_descriptor,
};
use protocol::{DeviceSpeed, GetDescriptor, NewDevice, descriptor_type};
use std::collections::BTreeMap;
use tracing::warn;

/// Linux Foundation vendor ID, as used by gadget drivers
pub const DEFAULT_VENDOR_ID: u16 = 0x1d6b;
/// "Multifunction Composite Gadget"
pub const DEFAULT_PRODUCT_ID: u16 = 0x0104;

pub const DEFAULT_MANUFACTURER: &str = "usb-emulator";
pub const DEFAULT_PRODUCT: &str = "Emulated USB Device";
pub const DEFAULT_SERIAL_NUMBER: &str = "0001";

/// Lookup key for a stored descriptor
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct DescriptorKey {
    pub descriptor_type: u8,
    pub index: u8,
}

impl DescriptorKey {
    pub const fn new(descriptor_type: u8, index: u8) -> Self {
        Self {
            descriptor_type,
            index,
        }
    }
}

/// Descriptor set of the emulated device
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceIdentity {
    speed: DeviceSpeed,
    descriptors: BTreeMap<DescriptorKey, Vec<u8>>,
}

impl DeviceIdentity {
    pub fn builder(device: DeviceDescriptor) -> IdentityBuilder {
        IdentityBuilder {
            speed: DeviceSpeed::default(),
            device,
            configurations: Vec::new(),
            strings: BTreeMap::new(),
            raw: Vec::new(),
        }
    }

    /// Default identity for a device of `class`
    ///
    /// High speed, placeholder vendor/product IDs, one configuration with a
    /// single interface of the same class, and manufacturer, product and
    /// serial number strings.
    pub fn for_class(class: DeviceClass) -> Self {
        let speed = DeviceSpeed::default();
        let mut device = DeviceDescriptor::new(class, speed);
        device.vendor_id = DEFAULT_VENDOR_ID;
        device.product_id = DEFAULT_PRODUCT_ID;
        device.manufacturer_index = 1;
        device.product_index = 2;
        device.serial_number_index = 3;

        Self::builder(device)
            .speed(speed)
            .configuration(ConfigurationDescriptor::single_interface(class))
            .string(1, DEFAULT_MANUFACTURER)
            .string(2, DEFAULT_PRODUCT)
            .string(3, DEFAULT_SERIAL_NUMBER)
            .build()
    }

    pub fn speed(&self) -> DeviceSpeed {
        self.speed
    }

    /// Stored bytes for `(descriptor_type, index)`
    pub fn descriptor(&self, descriptor_type: u8, index: u8) -> Option<&[u8]> {
        self.descriptors
            .get(&DescriptorKey::new(descriptor_type, index))
            .map(Vec::as_slice)
    }

    /// Decoded device descriptor, if one is stored and well formed
    pub fn device_descriptor(&self) -> Option<DeviceDescriptor> {
        self.descriptor(descriptor_type::DEVICE, 0)
            .and_then(|bytes| DeviceDescriptor::parse(bytes).ok())
    }

    /// Snapshot announced to the host when the device connects
    pub fn to_new_identity(&self) -> NewDevice {
        let owned = |ty| self.descriptor(ty, 0).map(<[u8]>::to_vec).unwrap_or_default();
        NewDevice {
            speed: self.speed,
            device: owned(descriptor_type::DEVICE),
            configuration: owned(descriptor_type::CONFIGURATION),
        }
    }

    /// Resolve a descriptor request to the bytes to send back
    ///
    /// The answer is cut to the request's wLength, as a real device would.
    /// `None` means this identity has no such descriptor.
    pub fn from_request(&self, request: &GetDescriptor) -> Option<Vec<u8>> {
        let bytes = self.descriptor(request.descriptor_type, request.descriptor_index)?;
        let len = bytes.len().min(request.length as usize);
        Some(bytes[..len].to_vec())
    }
}

/// Assembles a [`DeviceIdentity`] from typed descriptors
#[derive(Debug, Clone)]
pub struct IdentityBuilder {
    speed: DeviceSpeed,
    device: DeviceDescriptor,
    configurations: Vec<ConfigurationDescriptor>,
    strings: BTreeMap<u8, String>,
    raw: Vec<(DescriptorKey, Vec<u8>)>,
}

impl IdentityBuilder {
    pub fn speed(mut self, speed: DeviceSpeed) -> Self {
        self.speed = speed;
        self
    }

    /// Append a configuration; indices follow insertion order
    pub fn configuration(mut self, configuration: ConfigurationDescriptor) -> Self {
        self.configurations.push(configuration);
        self
    }

    /// Set string `index`; index 0 is the language table and cannot be set
    pub fn string(mut self, index: u8, text: impl Into<String>) -> Self {
        if index == 0 {
            warn!("String index 0 is reserved for the language table, ignoring");
            return self;
        }
        self.strings.insert(index, text.into());
        self
    }

    /// Store raw descriptor bytes, e.g. a HID report descriptor
    ///
    /// Raw entries are applied last and replace generated ones.
    pub fn descriptor(mut self, descriptor_type: u8, index: u8, bytes: Vec<u8>) -> Self {
        self.raw
            .push((DescriptorKey::new(descriptor_type, index), bytes));
        self
    }

    pub fn build(self) -> DeviceIdentity {
        let mut descriptors = BTreeMap::new();

        let mut device = self.device;
        if !self.configurations.is_empty() {
            device.num_configurations = self.configurations.len() as u8;
        }
        descriptors.insert(
            DescriptorKey::new(descriptor_type::DEVICE, 0),
            device.to_bytes().to_vec(),
        );

        for (index, configuration) in self.configurations.iter().enumerate() {
            descriptors.insert(
                DescriptorKey::new(descriptor_type::CONFIGURATION, index as u8),
                configuration.to_bytes(),
            );
        }

        if !self.strings.is_empty() {
            descriptors.insert(
                DescriptorKey::new(descriptor_type::STRING, 0),
                language_table(&[LANGUAGE_EN_US]),
            );
        }
        for (index, text) in &self.strings {
            descriptors.insert(
                DescriptorKey::new(descriptor_type::STRING, *index),
                string_descriptor(text),
            );
        }

        for (key, bytes) in self.raw {
            descriptors.insert(key, bytes);
        }

        DeviceIdentity {
            speed: self.speed,
            descriptors,
        }
    }
}
