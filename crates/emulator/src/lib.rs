//! USB device emulation engine
//!
//! Emulates the device side of a USB connection. An emulated [`Device`]
//! presents a fixed descriptor identity, walks a two-state connection
//! machine, and exchanges [`protocol::Envelope`]s with a host through two
//! FIFO queues. The device is tick driven: a link driver pushes host
//! envelopes in, calls [`Device::tick`], and forwards whatever the device
//! queued for the host.
//!
//! The engine answers EP0 GET_DESCRIPTOR on its own. Everything else is left
//! to [`RequestHandler`]s registered on the device, which see every inbound
//! request in registration order.
//!
//! # Example
//!
//! ```
//! use emulator::{Device, DeviceClass, DeviceLink};
//! use protocol::{Endpoint, Envelope, GetDescriptor, TransferContent, descriptor_type};
//!
//! let mut device = Device::new(DeviceClass::MASS_STORAGE_BOT);
//! device
//!     .device_push_inbound_packet(Envelope::from_host(TransferContent::Request {
//!         endpoint: Endpoint::CONTROL,
//!         request: GetDescriptor::new(descriptor_type::DEVICE, 0, 18).into(),
//!     }))
//!     .unwrap();
//!
//! device.device_tick().unwrap();
//!
//! // NewDevice announcement, then the device descriptor
//! assert!(device.device_pop_outbound_packet().is_some());
//! assert!(device.device_pop_outbound_packet().is_some());
//! assert!(!device.device_has_outbound_packet());
//! ```

pub mod class;
pub mod config;
pub mod descriptor;
pub mod device;
pub mod error;
pub mod handler;
pub mod host_link;
pub mod identity;
pub mod link;
pub mod queue;
pub mod state;

pub use class::DeviceClass;
pub use config::EmulatorConfig;
pub use device::Device;
pub use error::{EmulatorError, Result};
pub use handler::{DescriptorRequestHandler, HandlerResult, RequestHandler};
pub use identity::{DeviceIdentity, IdentityBuilder};
pub use link::DeviceLink;
pub use queue::PacketQueue;
pub use state::{DeviceState, Trigger};
