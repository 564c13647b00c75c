//! TCP host link driver
//!
//! Serves one host at a time. Each connection carries length-prefixed
//! [`Message`] frames in both directions: host frames are version-checked and
//! pushed into the device, and after every tick the device's outbound queue
//! is flushed back to the host.
//!
//! When a host goes away the device is unplugged, so the next host gets a
//! fresh NewDevice announcement on its first tick.

use crate::device::Device;
use crate::link::DeviceLink;
use anyhow::{Context, Result};
use protocol::{
    CURRENT_VERSION, Message, ProtocolError, decode_framed, encode_framed, read_framed_async,
    validate_version, write_framed_async,
};
use std::future::Future;
use std::io::ErrorKind;
use std::time::Duration;
use tokio::io::AsyncWrite;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::{self, MissedTickBehavior};
use tracing::{debug, info, trace, warn};

/// Frames read ahead of the device
const FRAME_BUFFER: usize = 64;

/// Accept hosts on `listener` until `shutdown` resolves
pub async fn run<F>(
    listener: TcpListener,
    device: &mut Device,
    tick_interval: Duration,
    shutdown: F,
) -> Result<()>
where
    F: Future<Output = ()>,
{
    tokio::pin!(shutdown);
    info!(
        "Waiting for host on {}",
        listener.local_addr().context("Listener has no local address")?
    );

    loop {
        let accepted = tokio::select! {
            accepted = listener.accept() => Some(accepted.context("Failed to accept host connection")?),
            _ = &mut shutdown => None,
        };
        let Some((stream, peer)) = accepted else {
            info!("Shutdown requested");
            break;
        };

        info!("Host connected from {}", peer);
        if let Err(e) = stream.set_nodelay(true) {
            warn!("Failed to set TCP_NODELAY for {}: {}", peer, e);
        }

        let session = tokio::select! {
            result = serve_host(stream, &mut *device, tick_interval) => Some(result),
            _ = &mut shutdown => None,
        };
        end_session(device);

        match session {
            Some(Ok(())) => info!("Host {} disconnected", peer),
            Some(Err(e)) if is_protocol_violation(&e) => {
                warn!("Host {} broke the link protocol: {:#}", peer, e)
            }
            Some(Err(e)) => warn!("Host link to {} failed: {:#}", peer, e),
            None => {
                info!("Shutdown requested");
                break;
            }
        }
    }

    Ok(())
}

/// Whether a session ended because the host sent something it must not
fn is_protocol_violation(error: &anyhow::Error) -> bool {
    error
        .chain()
        .filter_map(|cause| cause.downcast_ref::<ProtocolError>())
        .any(ProtocolError::is_violation)
}

/// Aborts the wrapped task when dropped, including when the owning future
/// is cancelled
struct AbortOnDrop<T>(JoinHandle<T>);

impl<T> Drop for AbortOnDrop<T> {
    fn drop(&mut self) {
        self.0.abort();
    }
}

/// Unplug the device and forget traffic meant for the departed host
fn end_session(device: &mut Device) {
    if device.is_connected() {
        if let Err(e) = device.disconnect() {
            warn!("Failed to disconnect device: {}", e);
        }
    }
    let dropped = device.discard_queued();
    if dropped > 0 {
        debug!("Discarded {} queued envelopes", dropped);
    }
}

/// Drive `link` for one host connection until it closes
///
/// Returns `Ok(())` when the host closes the connection cleanly.
pub async fn serve_host<L>(stream: TcpStream, link: &mut L, tick_interval: Duration) -> Result<()>
where
    L: DeviceLink + Send,
{
    let (mut reader, mut writer) = stream.into_split();

    // read_exact is not cancel safe, so frames are read in their own task
    let (frames_tx, frames_rx) = mpsc::channel(FRAME_BUFFER);
    let _reader = AbortOnDrop(tokio::spawn(async move {
        loop {
            let frame = read_framed_async(&mut reader).await;
            let failed = frame.is_err();
            if frames_tx.send(frame).await.is_err() || failed {
                break;
            }
        }
    }));

    session_loop(link, frames_rx, &mut writer, tick_interval).await
}

async fn session_loop<L, W>(
    link: &mut L,
    mut frames_rx: mpsc::Receiver<protocol::Result<Vec<u8>>>,
    writer: &mut W,
    tick_interval: Duration,
) -> Result<()>
where
    L: DeviceLink,
    W: AsyncWrite + Unpin,
{
    let mut ticker = time::interval(tick_interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            frame = frames_rx.recv() => match frame {
                Some(Ok(bytes)) => accept_frame(link, &bytes)?,
                Some(Err(ProtocolError::Io(e))) if e.kind() == ErrorKind::UnexpectedEof => {
                    debug!("Host closed the link");
                    return Ok(());
                }
                Some(Err(e)) => return Err(e).context("Failed to read frame from host"),
                None => return Ok(()),
            },
            _ = ticker.tick() => {
                link.device_tick().context("Device tick failed")?;
                flush_outbound(link, writer).await?;
            }
        }
    }
}

/// Decode one host frame and queue it on the device
fn accept_frame<L: DeviceLink>(link: &mut L, bytes: &[u8]) -> Result<()> {
    let message = decode_framed(bytes).context("Failed to decode host frame")?;
    validate_version(&message.version)?;
    if !CURRENT_VERSION.is_compatible_with(&message.version) {
        debug!(
            "Host speaks protocol {}, newer than {}",
            message.version, CURRENT_VERSION
        );
    }
    trace!(
        "Host frame: {} bytes, {}",
        bytes.len(),
        message.envelope.content.name()
    );

    let envelope = link
        .host_encode(message.envelope)
        .context("Rejected host envelope")?;
    link.device_push_inbound_packet(envelope)
        .context("Device refused host envelope")?;
    Ok(())
}

/// Write every queued outbound envelope to the host
async fn flush_outbound<L, W>(link: &mut L, writer: &mut W) -> Result<()>
where
    L: DeviceLink,
    W: AsyncWrite + Unpin,
{
    while let Some(envelope) = link.device_pop_outbound_packet() {
        let envelope = link.device_decode(envelope)?;
        trace!("Device frame: {}", envelope.content.name());
        let framed = encode_framed(&Message::new(envelope))?;
        write_framed_async(writer, &framed)
            .await
            .context("Failed to write frame to host")?;
    }
    Ok(())
}
