//! Envelope definitions exchanged between the device and host sides
//!
//! Every message on the link is an [`Envelope`]: an origin, a small kind
//! discriminator and the content itself. Content is either management
//! traffic (device arrival, reset) or an EP0 transfer (request from the
//! host, response from the device).

use crate::error::{ProtocolError, Result};
use crate::types::{ControlRequest, DeviceSpeed, Endpoint};
use crate::version::{CURRENT_VERSION, ProtocolVersion};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Which side of the link produced an envelope
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Origin {
    /// Host side: the real USB host talking to the emulated device
    Host,
    /// Device side: the emulated device
    Device,
}

impl fmt::Display for Origin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Host => f.write_str("host"),
            Self::Device => f.write_str("device"),
        }
    }
}

/// Envelope discriminator
///
/// Numbered as on the proxy wire format (1 is a transfer ACK, which the
/// emulator never produces).
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MessageKind {
    Data = 0,
    Management = 2,
}

impl fmt::Display for MessageKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Data => f.write_str("data"),
            Self::Management => f.write_str("management"),
        }
    }
}

/// Identity announcement sent when the emulated device connects
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewDevice {
    pub speed: DeviceSpeed,
    /// Device descriptor (18 bytes)
    #[serde(with = "serde_bytes")]
    pub device: Vec<u8>,
    /// Configuration descriptor with its interfaces and endpoints
    #[serde(with = "serde_bytes")]
    pub configuration: Vec<u8>,
}

/// Link management content
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ManagementContent {
    /// A device was plugged in
    NewDevice(NewDevice),
    /// The device was unplugged or reset
    Reset,
}

/// EP0 transfer content
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum TransferContent {
    /// Host -> device control request
    Request {
        endpoint: Endpoint,
        request: ControlRequest,
    },
    /// Device -> host answer to a request
    Response {
        endpoint: Endpoint,
        request: ControlRequest,
        #[serde(with = "serde_bytes")]
        response: Vec<u8>,
    },
}

impl TransferContent {
    pub fn endpoint(&self) -> &Endpoint {
        match self {
            Self::Request { endpoint, .. } | Self::Response { endpoint, .. } => endpoint,
        }
    }

    pub fn request(&self) -> &ControlRequest {
        match self {
            Self::Request { request, .. } | Self::Response { request, .. } => request,
        }
    }

    fn name(&self) -> &'static str {
        match self {
            Self::Request { .. } => "request",
            Self::Response { .. } => "response",
        }
    }
}

/// Envelope payload
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Content {
    Transfer(TransferContent),
    Management(ManagementContent),
}

impl Content {
    /// The discriminator this content must travel under
    pub fn kind(&self) -> MessageKind {
        match self {
            Self::Transfer(_) => MessageKind::Data,
            Self::Management(_) => MessageKind::Management,
        }
    }

    /// Short name of the concrete variant, for diagnostics
    pub fn name(&self) -> &'static str {
        match self {
            Self::Transfer(transfer) => transfer.name(),
            Self::Management(ManagementContent::NewDevice(_)) => "new-device",
            Self::Management(ManagementContent::Reset) => "reset",
        }
    }
}

impl From<TransferContent> for Content {
    fn from(content: TransferContent) -> Self {
        Self::Transfer(content)
    }
}

impl From<ManagementContent> for Content {
    fn from(content: ManagementContent) -> Self {
        Self::Management(content)
    }
}

/// Outer wrapper for everything crossing the device/host link
///
/// Fields are public so envelopes decoded from a peer can be inspected as
/// received; use [`Envelope::validate`] before trusting `kind`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Envelope {
    pub origin: Origin,
    pub kind: MessageKind,
    pub content: Content,
}

impl Envelope {
    /// Build an envelope whose kind agrees with its content
    pub fn new(origin: Origin, content: impl Into<Content>) -> Self {
        let content = content.into();
        Self {
            origin,
            kind: content.kind(),
            content,
        }
    }

    pub fn from_host(content: impl Into<Content>) -> Self {
        Self::new(Origin::Host, content)
    }

    pub fn from_device(content: impl Into<Content>) -> Self {
        Self::new(Origin::Device, content)
    }

    /// Check the discriminator against the concrete payload
    pub fn validate(&self) -> Result<()> {
        if self.kind != self.content.kind() {
            return Err(ProtocolError::KindMismatch {
                kind: self.kind,
                content: self.content.name(),
            });
        }
        Ok(())
    }

    /// Check origin and discriminator in one go
    pub fn expect_origin(&self, expected: Origin) -> Result<()> {
        if self.origin != expected {
            return Err(ProtocolError::UnexpectedOrigin {
                expected,
                actual: self.origin,
            });
        }
        self.validate()
    }

    /// Transfer content, if this envelope carries any
    pub fn transfer(&self) -> Option<&TransferContent> {
        match &self.content {
            Content::Transfer(transfer) => Some(transfer),
            Content::Management(_) => None,
        }
    }
}

/// Versioned frame body
///
/// Wraps an envelope with the protocol version for compatibility checking.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    pub version: ProtocolVersion,
    pub envelope: Envelope,
}

impl Message {
    /// Wrap an envelope with the current protocol version
    pub fn new(envelope: Envelope) -> Self {
        Self {
            version: CURRENT_VERSION,
            envelope,
        }
    }
}
