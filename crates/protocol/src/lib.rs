//! Protocol library for the USB device emulator
//!
//! This crate defines the messages exchanged between an emulated USB device
//! and the host-facing side of the proxy link: EP0 control requests and
//! responses, device arrival/reset management messages, and the envelope
//! that wraps them. It also provides postcard serialization with
//! length-prefixed framing and protocol versioning.
//!
//! # Example
//!
//! ```
//! use protocol::{Endpoint, Envelope, GetDescriptor, Message, TransferContent};
//! use protocol::{decode_framed, descriptor_type, encode_framed};
//!
//! // Host asks for the device descriptor on EP0
//! let request = Envelope::from_host(TransferContent::Request {
//!     endpoint: Endpoint::CONTROL,
//!     request: GetDescriptor::new(descriptor_type::DEVICE, 0, 18).into(),
//! });
//!
//! let framed = encode_framed(&Message::new(request.clone())).unwrap();
//! let decoded = decode_framed(&framed).unwrap();
//! assert_eq!(decoded.envelope, request);
//! ```

pub mod codec;
pub mod error;
pub mod messages;
pub mod types;
pub mod version;

pub use codec::{
    MAX_FRAME_SIZE, decode_framed, decode_message, encode_framed, encode_message, read_framed,
    validate_version, write_framed,
};

#[cfg(feature = "async")]
pub use codec::{read_framed_async, write_framed_async};
pub use error::{ProtocolError, Result};
pub use messages::{
    Content, Envelope, ManagementContent, Message, MessageKind, NewDevice, Origin,
    TransferContent,
};
pub use types::{
    ControlRequest, DeviceSpeed, Direction, Endpoint, GetDescriptor, SETUP_PACKET_LEN,
    SetupPacket, TransferType, descriptor_type, request, request_type,
};
pub use version::{CURRENT_VERSION, ProtocolVersion};
