//! Envelope serialization and framing using postcard
//!
//! Envelopes travel wrapped in a versioned [`Message`], serialized with
//! postcard and length-prefixed on the host link.
//!
//! # Frame Format
//!
//! ```text
//! [Length: u32 (big-endian)][Message bytes (postcard serialized)]
//! ```
//!
//! A control response is at most 64 KiB (wLength is 16 bits), so frames are
//! capped at 128 KiB.

use crate::{CURRENT_VERSION, Message, ProtocolVersion, error::ProtocolError, error::Result};
use std::io::{Read, Write};

#[cfg(feature = "async")]
use tokio::io::{AsyncReadExt, AsyncWriteExt};

/// Maximum allowed frame size (128 KiB)
pub const MAX_FRAME_SIZE: usize = 128 * 1024;

/// Length prefix size in bytes
const LENGTH_PREFIX: usize = 4;

/// Encode a message to bytes using postcard
///
/// # Example
/// ```
/// use protocol::{Envelope, ManagementContent, Message, encode_message};
///
/// let msg = Message::new(Envelope::from_device(ManagementContent::Reset));
/// let bytes = encode_message(&msg).unwrap();
/// assert!(!bytes.is_empty());
/// ```
pub fn encode_message(message: &Message) -> Result<Vec<u8>> {
    postcard::to_allocvec(message).map_err(ProtocolError::from)
}

/// Decode a message from bytes using postcard
pub fn decode_message(bytes: &[u8]) -> Result<Message> {
    postcard::from_bytes(bytes).map_err(ProtocolError::from)
}

/// Validate protocol version compatibility
///
/// Major versions must match; minor differences are tolerated both ways.
pub fn validate_version(message_version: &ProtocolVersion) -> Result<()> {
    if message_version.major != CURRENT_VERSION.major {
        return Err(ProtocolError::IncompatibleVersion {
            major: message_version.major,
            minor: message_version.minor,
            expected_major: CURRENT_VERSION.major,
            expected_minor: CURRENT_VERSION.minor,
        });
    }
    Ok(())
}

fn check_frame_len(length: usize) -> Result<()> {
    if length > MAX_FRAME_SIZE {
        return Err(ProtocolError::FrameTooLarge {
            size: length,
            max: MAX_FRAME_SIZE,
        });
    }
    Ok(())
}

/// Encode a message with length prefix for framing
///
/// # Example
/// ```
/// use protocol::{Envelope, ManagementContent, Message, encode_framed, decode_framed};
///
/// let msg = Message::new(Envelope::from_device(ManagementContent::Reset));
/// let framed = encode_framed(&msg).unwrap();
/// let decoded = decode_framed(&framed).unwrap();
/// assert_eq!(decoded.envelope, msg.envelope);
/// ```
pub fn encode_framed(message: &Message) -> Result<Vec<u8>> {
    let message_bytes = encode_message(message)?;
    let message_len = message_bytes.len();
    check_frame_len(message_len)?;

    let mut frame = Vec::with_capacity(LENGTH_PREFIX + message_len);
    frame.extend_from_slice(&(message_len as u32).to_be_bytes());
    frame.extend_from_slice(&message_bytes);

    Ok(frame)
}

/// Decode a framed message
///
/// Expects frame format: [4-byte length (big-endian)][postcard message bytes]
pub fn decode_framed(frame: &[u8]) -> Result<Message> {
    if frame.len() < LENGTH_PREFIX {
        return Err(ProtocolError::IncompleteFrame {
            expected: LENGTH_PREFIX,
            actual: frame.len(),
        });
    }

    let length = u32::from_be_bytes([frame[0], frame[1], frame[2], frame[3]]) as usize;
    check_frame_len(length)?;

    if frame.len() < LENGTH_PREFIX + length {
        return Err(ProtocolError::IncompleteFrame {
            expected: LENGTH_PREFIX + length,
            actual: frame.len(),
        });
    }

    decode_message(&frame[LENGTH_PREFIX..LENGTH_PREFIX + length])
}

/// Write a framed message to a writer
pub fn write_framed<W: Write>(writer: &mut W, message: &Message) -> Result<()> {
    let framed = encode_framed(message)?;
    writer.write_all(&framed)?;
    Ok(())
}

/// Read a framed message from a reader
///
/// # Example
/// ```
/// use protocol::{Envelope, ManagementContent, Message, write_framed, read_framed};
/// use std::io::Cursor;
///
/// let msg = Message::new(Envelope::from_device(ManagementContent::Reset));
/// let mut buffer = Vec::new();
/// write_framed(&mut buffer, &msg).unwrap();
///
/// let mut cursor = Cursor::new(buffer);
/// let decoded = read_framed(&mut cursor).unwrap();
/// assert_eq!(decoded.envelope, msg.envelope);
/// ```
pub fn read_framed<R: Read>(reader: &mut R) -> Result<Message> {
    let mut len_bytes = [0u8; LENGTH_PREFIX];
    reader.read_exact(&mut len_bytes)?;
    let length = u32::from_be_bytes(len_bytes) as usize;
    check_frame_len(length)?;

    let mut message_bytes = vec![0u8; length];
    reader.read_exact(&mut message_bytes)?;

    decode_message(&message_bytes)
}

/// Async: write an already framed message to an async writer
#[cfg(feature = "async")]
pub async fn write_framed_async<W>(writer: &mut W, framed_bytes: &[u8]) -> Result<()>
where
    W: AsyncWriteExt + Unpin,
{
    writer.write_all(framed_bytes).await?;
    Ok(())
}

/// Async: read one frame from an async reader
///
/// Returns the complete framed message bytes (including length prefix),
/// ready for [`decode_framed`].
#[cfg(feature = "async")]
pub async fn read_framed_async<R>(reader: &mut R) -> Result<Vec<u8>>
where
    R: AsyncReadExt + Unpin,
{
    let mut len_bytes = [0u8; LENGTH_PREFIX];
    reader.read_exact(&mut len_bytes).await?;
    let length = u32::from_be_bytes(len_bytes) as usize;
    check_frame_len(length)?;

    let mut frame = vec![0u8; LENGTH_PREFIX + length];
    frame[..LENGTH_PREFIX].copy_from_slice(&len_bytes);
    reader.read_exact(&mut frame[LENGTH_PREFIX..]).await?;

    Ok(frame)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        Content, DeviceSpeed, Endpoint, Envelope, GetDescriptor, ManagementContent, NewDevice,
        TransferContent, descriptor_type,
    };
    use std::io::Cursor;

    fn descriptor_response(len: usize) -> Envelope {
        Envelope::from_device(TransferContent::Response {
            endpoint: Endpoint::CONTROL,
            request: GetDescriptor::new(descriptor_type::CONFIGURATION, 0, len as u16).into(),
            response: vec![0xAB; len],
        })
    }

    #[test]
    fn test_new_device_roundtrip() {
        let msg = Message::new(Envelope::from_device(ManagementContent::NewDevice(
            NewDevice {
                speed: DeviceSpeed::Full,
                device: vec![18, 1, 0, 2, 0, 0, 0, 64],
                configuration: vec![9, 2, 9, 0, 0, 1, 0, 0x80, 50],
            },
        )));

        let bytes = encode_message(&msg).unwrap();
        let decoded = decode_message(&bytes).unwrap();

        assert_eq!(decoded.version, CURRENT_VERSION);
        let Content::Management(ManagementContent::NewDevice(new_device)) =
            decoded.envelope.content
        else {
            panic!("Expected NewDevice, got {:?}", decoded.envelope.content);
        };
        assert_eq!(new_device.speed, DeviceSpeed::Full);
        assert_eq!(new_device.configuration.len(), 9);
    }

    #[test]
    fn test_kind_survives_encoding_unvalidated() {
        // A peer may send a mismatched envelope; decoding must not hide it
        let mut envelope = Envelope::from_device(ManagementContent::Reset);
        envelope.kind = crate::MessageKind::Data;

        let framed = encode_framed(&Message::new(envelope)).unwrap();
        let decoded = decode_framed(&framed).unwrap();
        assert!(decoded.envelope.validate().is_err());
    }

    #[test]
    fn test_largest_descriptor_fits_frame() {
        let msg = Message::new(descriptor_response(u16::MAX as usize));
        let framed = encode_framed(&msg).unwrap();
        assert!(framed.len() <= MAX_FRAME_SIZE + LENGTH_PREFIX);

        let decoded = decode_framed(&framed).unwrap();
        assert_eq!(decoded.envelope, msg.envelope);
    }

    #[test]
    fn test_framed_incomplete_frame() {
        let incomplete = vec![0, 0, 0, 10];
        let result = decode_framed(&incomplete);
        let Err(ProtocolError::IncompleteFrame { expected, actual }) = result else {
            panic!("Expected IncompleteFrame error, got {:?}", result);
        };
        assert_eq!(expected, 14);
        assert_eq!(actual, 4);
    }

    #[test]
    fn test_framed_too_large() {
        let too_large = vec![0xFF, 0xFF, 0xFF, 0xFF];
        assert!(matches!(
            decode_framed(&too_large),
            Err(ProtocolError::FrameTooLarge { .. })
        ));
    }

    #[test]
    fn test_empty_frame() {
        assert!(matches!(
            decode_framed(&[]),
            Err(ProtocolError::IncompleteFrame { .. })
        ));
    }

    #[test]
    fn test_read_framed_sequence_preserves_order() {
        let mut buffer = Vec::new();
        write_framed(
            &mut buffer,
            &Message::new(Envelope::from_device(ManagementContent::Reset)),
        )
        .unwrap();
        write_framed(&mut buffer, &Message::new(descriptor_response(18))).unwrap();

        let mut cursor = Cursor::new(buffer);
        let first = read_framed(&mut cursor).unwrap();
        let second = read_framed(&mut cursor).unwrap();
        assert!(matches!(first.envelope.content, Content::Management(_)));
        assert!(matches!(second.envelope.content, Content::Transfer(_)));
        assert!(read_framed(&mut cursor).is_err());
    }

    #[test]
    fn test_validate_version() {
        assert!(validate_version(&ProtocolVersion::new(1, 5, 0)).is_ok());
        assert!(matches!(
            validate_version(&ProtocolVersion::new(2, 0, 0)),
            Err(ProtocolError::IncompatibleVersion { .. })
        ));
    }

    #[cfg(feature = "async")]
    #[tokio::test]
    async fn test_async_read_returns_whole_frame() {
        let msg = Message::new(descriptor_response(64));
        let framed = encode_framed(&msg).unwrap();

        let mut reader = Cursor::new(framed.clone());
        let read = read_framed_async(&mut reader).await.unwrap();
        assert_eq!(read, framed);

        let mut sink = Vec::new();
        write_framed_async(&mut sink, &read).await.unwrap();
        assert_eq!(decode_framed(&sink).unwrap().envelope, msg.envelope);
    }
}
