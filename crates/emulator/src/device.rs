//! Emulated USB device
//!
//! A [`Device`] owns its identity, its connection state, one packet queue per
//! direction and the registry of request handlers. It is driven from the
//! outside: the link driver pushes host envelopes in, calls [`Device::tick`]
//! and forwards whatever comes out of the outbound queue.
//!
//! # Example
//!
//! ```
//! use emulator::{Device, DeviceClass, DeviceState};
//!
//! let mut device = Device::new(DeviceClass::VENDOR);
//! assert_eq!(device.state(), DeviceState::Disconnected);
//!
//! // The first tick plugs the device in and announces its identity
//! device.tick().unwrap();
//! assert_eq!(device.state(), DeviceState::Connected);
//! assert!(device.pop_outbound().is_some());
//! assert!(!device.has_outbound());
//! ```

use crate::class::DeviceClass;
use crate::error::{EmulatorError, Result};
use crate::handler::{DescriptorRequestHandler, HandlerResult, RequestHandler};
use crate::identity::DeviceIdentity;
use crate::queue::PacketQueue;
use crate::state::{self, DeviceState, Trigger};
use protocol::{
    Content, ControlRequest, Envelope, ManagementContent, Origin, TransferContent, request,
};
use tracing::{debug, info};

pub struct Device {
    class: DeviceClass,
    identity: DeviceIdentity,
    state: DeviceState,
    /// device -> host
    outbound: PacketQueue,
    /// host -> device
    inbound: PacketQueue,
    handlers: Vec<Box<dyn RequestHandler>>,
    /// Set while handlers run; the handler list is moved out meanwhile
    dispatching: bool,
}

impl Device {
    /// Device of `class` with the default identity for that class
    pub fn new(class: DeviceClass) -> Self {
        Self::with_identity(class, DeviceIdentity::for_class(class))
    }

    /// Device presenting a caller-supplied identity
    pub fn with_identity(class: DeviceClass, identity: DeviceIdentity) -> Self {
        Self {
            class,
            identity,
            state: DeviceState::default(),
            outbound: PacketQueue::new("outbound"),
            inbound: PacketQueue::new("inbound"),
            handlers: vec![Box::new(DescriptorRequestHandler)],
            dispatching: false,
        }
    }

    /// Device from numeric-looking class fields, see [`DeviceClass::parse`]
    pub fn from_fields(class: &str, subclass: &str, protocol: &str) -> Result<Self> {
        Ok(Self::new(DeviceClass::parse(class, subclass, protocol)?))
    }

    pub fn class(&self) -> DeviceClass {
        self.class
    }

    pub fn identity(&self) -> &DeviceIdentity {
        &self.identity
    }

    pub fn state(&self) -> DeviceState {
        self.state
    }

    pub fn is_connected(&self) -> bool {
        self.state == DeviceState::Connected
    }

    pub fn is_disconnected(&self) -> bool {
        self.state == DeviceState::Disconnected
    }

    /// Add a handler after the ones already registered
    pub fn register_handler(&mut self, handler: impl RequestHandler + 'static) {
        debug!(handler = handler.name(), "Registered request handler");
        self.handlers.push(Box::new(handler));
    }

    pub fn handler_count(&self) -> usize {
        self.handlers.len()
    }

    // State machine

    /// Plug into the host, announcing the identity
    pub fn connect(&mut self) -> Result<()> {
        self.fire(Trigger::Connect)
    }

    /// Unplug from the host
    pub fn disconnect(&mut self) -> Result<()> {
        self.fire(Trigger::Disconnect)
    }

    fn fire(&mut self, trigger: Trigger) -> Result<()> {
        let next = state::transition(self.state, trigger)?;
        match trigger {
            Trigger::Connect => self.on_connect()?,
            Trigger::Disconnect => self.on_disconnect()?,
        }
        debug!(from = %self.state, to = %next, "Device state changed");
        self.state = next;
        Ok(())
    }

    fn on_connect(&mut self) -> Result<()> {
        match self.identity.device_descriptor() {
            Some(desc) => info!(
                "Connecting emulated USB device {:04x}:{:04x} (class {})",
                desc.vendor_id, desc.product_id, self.class
            ),
            None => info!("Connecting emulated USB device (class {})", self.class),
        }
        let announcement = ManagementContent::NewDevice(self.identity.to_new_identity());
        self.send_to_host(announcement)
    }

    fn on_disconnect(&mut self) -> Result<()> {
        info!("Disconnecting emulated USB device");
        self.send_to_host(ManagementContent::Reset)
    }

    // Queues

    /// Queue an envelope for the host
    pub fn send_to_host(&mut self, content: impl Into<Content>) -> Result<()> {
        let envelope = Envelope::from_device(content);
        envelope.validate()?;
        self.outbound.push(envelope);
        Ok(())
    }

    pub fn has_outbound(&self) -> bool {
        !self.outbound.is_empty()
    }

    /// Oldest envelope waiting for the host
    pub fn pop_outbound(&mut self) -> Option<Envelope> {
        self.outbound.pop()
    }

    /// Accept an envelope from the host
    ///
    /// Only host-originated envelopes whose kind matches their content are
    /// accepted; anything else is a protocol violation and is not queued.
    pub fn push_inbound(&mut self, envelope: Envelope) -> Result<bool> {
        envelope.expect_origin(Origin::Host)?;
        self.inbound.push(envelope);
        Ok(true)
    }

    pub fn inbound_len(&self) -> usize {
        self.inbound.len()
    }

    /// Drop everything still queued in both directions
    ///
    /// Used by link drivers when the host goes away. Returns the number of
    /// envelopes dropped.
    pub fn discard_queued(&mut self) -> usize {
        let mut dropped = 0;
        while self.inbound.pop().is_some() {
            dropped += 1;
        }
        while self.outbound.pop().is_some() {
            dropped += 1;
        }
        dropped
    }

    // Dispatch

    /// Advance the device by one driver iteration
    ///
    /// Connects if disconnected, then drains the inbound queue, including
    /// anything handlers push while it is being drained. Each request is
    /// broadcast to all handlers. Any other inbound content aborts the tick
    /// with [`EmulatorError::UnsupportedMessage`].
    ///
    /// Calling it from a request handler fails with
    /// [`EmulatorError::NestedDispatch`] and leaves the queue untouched.
    pub fn tick(&mut self) -> Result<bool> {
        self.ensure_not_dispatching("tick")?;

        // Retried on every tick until the state flips
        if self.is_disconnected() {
            self.connect()?;
        }

        while let Some(envelope) = self.inbound.pop() {
            match envelope.content {
                Content::Transfer(content @ TransferContent::Request { .. }) => {
                    self.dispatch_request(&content)?;
                }
                other => {
                    return Err(EmulatorError::UnsupportedMessage {
                        kind: envelope.kind,
                        content: other.name(),
                    });
                }
            }
        }

        Ok(true)
    }

    /// Broadcast a request to every registered handler
    ///
    /// All handlers run, in registration order, unless one fails. Returns
    /// each handler's answer in the same order. Not reentrant: a handler
    /// calling it gets [`EmulatorError::NestedDispatch`].
    pub fn dispatch_request(&mut self, content: &TransferContent) -> Result<Vec<Option<bool>>> {
        self.ensure_not_dispatching("dispatch a request")?;
        self.dispatching = true;
        let mut handlers = std::mem::take(&mut self.handlers);
        let mut results = Vec::with_capacity(handlers.len());
        let mut outcome = Ok(());

        for handler in handlers.iter_mut() {
            match handler.handle_device_request(self, content) {
                Ok(result) => results.push(result),
                Err(e) => {
                    debug!(handler = handler.name(), "Request handler failed: {}", e);
                    outcome = Err(e);
                    break;
                }
            }
        }

        // Handlers registered during dispatch go after the existing ones
        handlers.append(&mut self.handlers);
        self.handlers = handlers;
        self.dispatching = false;
        outcome?;

        if !results.contains(&Some(true)) {
            debug!(
                request = ?content.request(),
                "Request not handled by any of {} handlers",
                results.len()
            );
        }
        Ok(results)
    }

    fn ensure_not_dispatching(&self, operation: &'static str) -> Result<()> {
        if self.dispatching {
            return Err(EmulatorError::NestedDispatch { operation });
        }
        Ok(())
    }

    /// Answer EP0 GET_DESCRIPTOR requests from the identity
    ///
    /// Only requests on the host-to-device control endpoint carrying a
    /// descriptor request are considered. `Some(true)` means a response was
    /// queued; `None` means nothing was done and another handler may act.
    ///
    /// The response carries at most wLength bytes of the descriptor, so a
    /// short read gets a prefix and wLength 0 gets an empty response that
    /// still counts as handled.
    pub fn handle_device_request(&mut self, content: &TransferContent) -> HandlerResult {
        let endpoint = content.endpoint();
        let ControlRequest::GetDescriptor(get) = content.request() else {
            return Ok(None);
        };
        if !endpoint.is_control() || get.request != request::GET_DESCRIPTOR {
            return Ok(None);
        }

        let Some(descriptor) = self.identity.from_request(get) else {
            debug!(
                descriptor_type = get.descriptor_type,
                index = get.descriptor_index,
                "No such descriptor"
            );
            return Ok(None);
        };

        debug!(
            descriptor_type = get.descriptor_type,
            index = get.descriptor_index,
            len = descriptor.len(),
            "Answering GET_DESCRIPTOR"
        );
        self.send_to_host(TransferContent::Response {
            endpoint: *endpoint,
            request: *content.request(),
            response: descriptor,
        })?;
        Ok(Some(true))
    }
}

impl std::fmt::Debug for Device {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Device")
            .field("class", &self.class)
            .field("state", &self.state)
            .field("outbound", &self.outbound.len())
            .field("inbound", &self.inbound.len())
            .field("handlers", &self.handlers.len())
            .field("dispatching", &self.dispatching)
            .finish()
    }
}
