//! Boundary contract between a device and whatever carries its traffic
//!
//! A link driver only ever talks to the device through [`DeviceLink`]: it
//! pushes host envelopes in, ticks, and drains the outbound queue.
//! `device_decode` and `host_encode` are pass-through hooks where a
//! transport-specific transform would live; here they only check that the
//! envelope travels in the right direction.

use crate::device::Device;
use crate::error::Result;
use protocol::{Envelope, Origin};

pub trait DeviceLink {
    fn device_has_outbound_packet(&self) -> bool;

    fn device_pop_outbound_packet(&mut self) -> Option<Envelope>;

    fn device_push_inbound_packet(&mut self, envelope: Envelope) -> Result<bool>;

    /// Outbound hook, applied to envelopes leaving the device
    fn device_decode(&self, envelope: Envelope) -> Result<Envelope>;

    /// Inbound hook, applied to envelopes arriving from the host
    fn host_encode(&self, envelope: Envelope) -> Result<Envelope>;

    fn device_tick(&mut self) -> Result<bool>;
}

impl DeviceLink for Device {
    fn device_has_outbound_packet(&self) -> bool {
        self.has_outbound()
    }

    fn device_pop_outbound_packet(&mut self) -> Option<Envelope> {
        self.pop_outbound()
    }

    fn device_push_inbound_packet(&mut self, envelope: Envelope) -> Result<bool> {
        self.push_inbound(envelope)
    }

    fn device_decode(&self, envelope: Envelope) -> Result<Envelope> {
        envelope.expect_origin(Origin::Device)?;
        Ok(envelope)
    }

    fn host_encode(&self, envelope: Envelope) -> Result<Envelope> {
        envelope.expect_origin(Origin::Host)?;
        Ok(envelope)
    }

    fn device_tick(&mut self) -> Result<bool> {
        self.tick()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::class::DeviceClass;
    use crate::error::EmulatorError;
    use protocol::{Endpoint, GetDescriptor, ManagementContent, ProtocolError, TransferContent};

    fn host_request() -> Envelope {
        Envelope::from_host(TransferContent::Request {
            endpoint: Endpoint::CONTROL,
            request: GetDescriptor::new(1, 0, 18).into(),
        })
    }

    #[test]
    fn test_decode_passes_device_envelopes_through() {
        let device = Device::new(DeviceClass::VENDOR);
        let envelope = Envelope::from_device(ManagementContent::Reset);
        assert_eq!(device.device_decode(envelope.clone()).unwrap(), envelope);
    }

    #[test]
    fn test_decode_rejects_host_envelopes() {
        let device = Device::new(DeviceClass::VENDOR);
        let result = device.device_decode(host_request());
        assert!(matches!(
            result,
            Err(EmulatorError::ProtocolViolation(
                ProtocolError::UnexpectedOrigin {
                    expected: Origin::Device,
                    actual: Origin::Host
                }
            ))
        ));
    }

    #[test]
    fn test_encode_checks_origin_and_kind() {
        let device = Device::new(DeviceClass::VENDOR);
        assert_eq!(device.host_encode(host_request()).unwrap(), host_request());

        assert!(
            device
                .host_encode(Envelope::from_device(ManagementContent::Reset))
                .is_err()
        );

        let mut mislabelled = host_request();
        mislabelled.kind = protocol::MessageKind::Management;
        assert!(matches!(
            device.host_encode(mislabelled),
            Err(EmulatorError::ProtocolViolation(
                ProtocolError::KindMismatch { .. }
            ))
        ));
    }

    #[test]
    fn test_link_drives_device() {
        let mut device = Device::new(DeviceClass::VENDOR);
        assert!(!device.device_has_outbound_packet());

        assert!(device.device_push_inbound_packet(host_request()).unwrap());
        assert!(device.device_tick().unwrap());

        // NewDevice then the descriptor response
        let mut drained = Vec::new();
        while let Some(envelope) = device.device_pop_outbound_packet() {
            drained.push(device.device_decode(envelope).unwrap());
        }
        assert_eq!(drained.len(), 2);
    }
}
