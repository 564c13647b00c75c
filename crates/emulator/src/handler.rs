//! Request handler registry
//!
//! Every inbound request is broadcast to all registered handlers in
//! registration order. Each handler decides on its own whether it handled
//! the request:
//!
//! - `Ok(Some(true))`: handled (typically a response was queued)
//! - `Ok(None)`: not for this handler, no side effects
//! - `Err(_)`: fatal, aborts the current tick
//!
//! A handler that does not handle a request leaves it to the others, so a
//! fallback or fuzzing handler can pick up whatever the descriptor handler
//! could not resolve.

use crate::device::Device;
use crate::error::Result;
use protocol::TransferContent;

/// Outcome of one handler invocation
pub type HandlerResult = Result<Option<bool>>;

/// Capability implemented by anything that wants to see inbound requests
///
/// Handlers get the device mutably so they can queue responses, or push
/// further inbound requests which the running tick will also process.
/// Calling [`Device::tick`] or [`Device::dispatch_request`] from a handler
/// fails with [`EmulatorError::NestedDispatch`](crate::EmulatorError::NestedDispatch).
pub trait RequestHandler: Send {
    /// Name used in log output
    fn name(&self) -> &str {
        std::any::type_name::<Self>()
    }

    fn handle_device_request(
        &mut self,
        device: &mut Device,
        content: &TransferContent,
    ) -> HandlerResult;
}

impl<F> RequestHandler for F
where
    F: FnMut(&mut Device, &TransferContent) -> HandlerResult + Send,
{
    fn handle_device_request(
        &mut self,
        device: &mut Device,
        content: &TransferContent,
    ) -> HandlerResult {
        self(device, content)
    }
}

/// Answers EP0 GET_DESCRIPTOR requests from the device identity
///
/// Registered on every device by default.
#[derive(Debug, Default, Clone, Copy)]
pub struct DescriptorRequestHandler;

impl RequestHandler for DescriptorRequestHandler {
    fn name(&self) -> &str {
        "descriptor"
    }

    fn handle_device_request(
        &mut self,
        device: &mut Device,
        content: &TransferContent,
    ) -> HandlerResult {
        device.handle_device_request(content)
    }
}
