//! Integration tests for the envelope protocol
//!
//! Exercises the public API the way the host link uses it: raw setup bytes
//! turned into typed requests, envelopes framed and streamed, and
//! discriminator/origin checks on what comes off the wire.

use protocol::{
    CURRENT_VERSION, Content, ControlRequest, DeviceSpeed, Direction, Endpoint, Envelope,
    ManagementContent, Message, MessageKind, NewDevice, Origin, ProtocolError, ProtocolVersion,
    TransferContent, TransferType, descriptor_type, request,
};
use protocol::{decode_framed, encode_framed, read_framed, validate_version, write_framed};
use std::io::Cursor;

fn host_request(setup: [u8; 8]) -> Envelope {
    Envelope::from_host(TransferContent::Request {
        endpoint: Endpoint::CONTROL,
        request: ControlRequest::parse(&setup).expect("Failed to parse setup packet"),
    })
}

mod setup_packets {
    use super::*;

    #[test]
    fn test_enumeration_requests_classified() {
        // Typical host enumeration: device (64), set address, device (18),
        // config header (9), full config (0x20), string zero
        let sequence: [([u8; 8], Option<(u8, u8)>); 6] = [
            ([0x80, 0x06, 0x00, 0x01, 0x00, 0x00, 0x40, 0x00], Some((1, 0))),
            ([0x00, 0x05, 0x07, 0x00, 0x00, 0x00, 0x00, 0x00], None),
            ([0x80, 0x06, 0x00, 0x01, 0x00, 0x00, 0x12, 0x00], Some((1, 0))),
            ([0x80, 0x06, 0x00, 0x02, 0x00, 0x00, 0x09, 0x00], Some((2, 0))),
            ([0x80, 0x06, 0x00, 0x02, 0x00, 0x00, 0x20, 0x00], Some((2, 0))),
            ([0x80, 0x06, 0x00, 0x03, 0x00, 0x00, 0xff, 0x00], Some((3, 0))),
        ];

        for (bytes, expected) in sequence {
            let req = ControlRequest::parse(&bytes).expect("Failed to parse");
            match (req, expected) {
                (ControlRequest::GetDescriptor(get), Some((ty, index))) => {
                    assert_eq!(get.request, request::GET_DESCRIPTOR);
                    assert_eq!(get.descriptor_type, ty);
                    assert_eq!(get.descriptor_index, index);
                }
                (ControlRequest::Other(setup), None) => {
                    assert_eq!(setup.request, request::SET_ADDRESS);
                    assert_eq!(setup.value, 7);
                }
                (req, expected) => panic!("Unexpected {:?} for {:?}", req, expected),
            }
        }
    }

    #[test]
    fn test_set_descriptor_shares_layout() {
        let bytes = [0x00, 0x07, 0x01, 0x03, 0x09, 0x04, 0x10, 0x00];
        let ControlRequest::GetDescriptor(req) = ControlRequest::parse(&bytes).unwrap() else {
            panic!("Expected descriptor request layout");
        };
        assert_eq!(req.request, request::SET_DESCRIPTOR);
        assert_eq!(req.descriptor_type, descriptor_type::STRING);
        assert_eq!(req.descriptor_index, 1);
    }
}

mod framed_stream {
    use super::*;

    #[test]
    fn test_connect_then_answer_stream() {
        let announce = Envelope::from_device(ManagementContent::NewDevice(NewDevice {
            speed: DeviceSpeed::High,
            device: vec![0x12, 0x01, 0x00, 0x02],
            configuration: vec![0x09, 0x02, 0x09, 0x00],
        }));
        let answer = Envelope::from_device(TransferContent::Response {
            endpoint: Endpoint::CONTROL,
            request: ControlRequest::parse(&[0x80, 0x06, 0x00, 0x01, 0x00, 0x00, 0x12, 0x00])
                .unwrap(),
            response: vec![0x12, 0x01, 0x00, 0x02],
        });

        let mut wire = Vec::new();
        write_framed(&mut wire, &Message::new(announce.clone())).unwrap();
        write_framed(&mut wire, &Message::new(answer.clone())).unwrap();

        let mut cursor = Cursor::new(wire);
        let first = read_framed(&mut cursor).expect("Failed to read first frame");
        let second = read_framed(&mut cursor).expect("Failed to read second frame");

        assert_eq!(first.envelope, announce);
        assert_eq!(second.envelope, answer);
        assert!(first.envelope.expect_origin(Origin::Device).is_ok());
    }

    #[test]
    fn test_frame_prefix_is_big_endian_length() {
        let framed = encode_framed(&Message::new(host_request([
            0x80, 0x06, 0x00, 0x01, 0x00, 0x00, 0x12, 0x00,
        ])))
        .unwrap();

        let length = u32::from_be_bytes([framed[0], framed[1], framed[2], framed[3]]) as usize;
        assert_eq!(length, framed.len() - 4);
    }

    #[test]
    fn test_truncated_frame_rejected() {
        let framed = encode_framed(&Message::new(host_request([
            0x80, 0x06, 0x00, 0x01, 0x00, 0x00, 0x12, 0x00,
        ])))
        .unwrap();

        let result = decode_framed(&framed[..framed.len() - 1]);
        assert!(matches!(result, Err(ProtocolError::IncompleteFrame { .. })));
    }
}

mod envelope_checks {
    use super::*;

    #[test]
    fn test_mismatched_kind_detected_after_decode() {
        let mut envelope = host_request([0x80, 0x06, 0x00, 0x01, 0x00, 0x00, 0x12, 0x00]);
        envelope.kind = MessageKind::Management;

        let decoded = decode_framed(&encode_framed(&Message::new(envelope)).unwrap()).unwrap();
        let err = decoded.envelope.validate().unwrap_err();
        assert!(err.is_violation());
        assert!(err.to_string().contains("request"));
    }

    #[test]
    fn test_host_envelope_is_not_device_envelope() {
        let envelope = host_request([0x80, 0x06, 0x00, 0x02, 0x00, 0x00, 0x09, 0x00]);
        assert!(matches!(
            envelope.expect_origin(Origin::Device),
            Err(ProtocolError::UnexpectedOrigin { .. })
        ));
    }

    #[test]
    fn test_endpoint_fields_survive() {
        let envelope = Envelope::from_host(TransferContent::Request {
            endpoint: Endpoint::new(1, TransferType::Interrupt, Direction::DeviceToHost),
            request: ControlRequest::parse(&[0xa1, 0x01, 0x00, 0x01, 0x00, 0x00, 0x08, 0x00])
                .unwrap(),
        });

        let decoded = decode_framed(&encode_framed(&Message::new(envelope)).unwrap()).unwrap();
        let Content::Transfer(transfer) = decoded.envelope.content else {
            panic!("Expected transfer content");
        };
        assert_eq!(transfer.endpoint().number, 1);
        assert_eq!(transfer.endpoint().transfer_type, TransferType::Interrupt);
        assert!(!transfer.endpoint().is_control());
    }
}

mod version_compatibility {
    use super::*;

    #[test]
    fn test_decoded_version_checked() {
        let mut msg = Message::new(Envelope::from_device(ManagementContent::Reset));
        msg.version = ProtocolVersion::new(CURRENT_VERSION.major + 1, 0, 0);

        let decoded = decode_framed(&encode_framed(&msg).unwrap()).unwrap();
        assert!(matches!(
            validate_version(&decoded.version),
            Err(ProtocolError::IncompatibleVersion { .. })
        ));
    }

    #[test]
    fn test_minor_bump_accepted() {
        let version = ProtocolVersion::new(CURRENT_VERSION.major, CURRENT_VERSION.minor + 3, 0);
        assert!(validate_version(&version).is_ok());
    }
}
