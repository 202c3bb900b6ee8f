//! Background reader task for the splicer link.
//!
//! BLE notifications arrive whenever the device feels like it: replies to
//! pending commands, async splice-progress events, and image-part bursts all
//! share the one notify characteristic. A single task therefore owns the
//! transport exclusively and multiplexes the traffic: commands are submitted
//! over an `mpsc` channel and answered via `oneshot`, while unsolicited
//! [`GetAsync`](crate::opcode::Opcode::GetAsync) frames are decoded and
//! published to a `broadcast` channel.
//!
//! Reply correlation is by opcode. While a command is pending, async events
//! that interleave with the reply are still published, and frames with any
//! other opcode are tolerated for a short grace period (a stale reply to a
//! previously timed-out command may still be in flight) before the exchange
//! fails with [`ProtocolError::UnexpectedOpcode`].

use std::time::Duration;

use tokio::sync::{broadcast, mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{debug, warn};

use crate::error::{ProtocolError, Result, TransportError};
use crate::events::{self, SplicerEvent};
use crate::image::ImagePart;
use crate::opcode::Opcode;
use crate::protocol::{self, DecodeOutcome};
use crate::records::RecordMeta;
use crate::transport::Transport;

// ---------------------------------------------------------------------------
// Types
// ---------------------------------------------------------------------------

/// A request sent from the engine to the reader task.
pub(crate) enum Request {
    /// Send one command frame and wait for the reply with the given opcode.
    Exchange {
        frame: Vec<u8>,
        expect: Opcode,
        response_tx: oneshot::Sender<Result<Vec<u8>>>,
    },
    /// Send a record request and collect the record plus any image-part burst
    /// that follows it. Kept as one reader-side operation so image parts can
    /// never be mistaken for idle-time orphans between two exchanges.
    ReadRecord {
        frame: Vec<u8>,
        response_tx: oneshot::Sender<Result<(RecordMeta, Option<Vec<u8>>)>>,
    },
}

/// Handle to the background reader task.
pub(crate) struct ReaderHandle {
    pub cmd_tx: mpsc::Sender<Request>,
    /// Kept so the task is tied to the engine's lifetime.
    #[allow(dead_code)]
    pub task: JoinHandle<()>,
}

/// Timing knobs for the reader task.
pub(crate) struct ReaderConfig {
    /// How long to wait for a matching reply to a command.
    pub command_timeout: Duration,
    /// How long mismatched reply opcodes are tolerated before the exchange
    /// fails.
    pub mismatch_grace: Duration,
}

// ---------------------------------------------------------------------------
// Unsolicited frame handling
// ---------------------------------------------------------------------------

/// Decode a `GetAsync` body and publish it to subscribers.
fn publish_event(payload: &[u8], event_tx: &broadcast::Sender<SplicerEvent>) {
    match events::decode_event(payload) {
        Ok(event) => {
            debug!(?event, "async event");
            let _ = event_tx.send(event);
        }
        Err(e) => {
            warn!(%e, "undecodable async event body");
        }
    }
}

/// Drain all complete frames from the accumulation buffer while no command is
/// pending.
///
/// Async events are published; anything else is a leftover from a timed-out
/// exchange and is logged and dropped. Incomplete data stays in the buffer
/// for the next notification.
fn drain_orphans(buf: &mut Vec<u8>, event_tx: &broadcast::Sender<SplicerEvent>) {
    loop {
        match protocol::decode_frame(buf) {
            DecodeOutcome::Frame {
                opcode,
                payload,
                consumed,
            } => {
                buf.drain(..consumed);
                if opcode == Opcode::GetAsync {
                    publish_event(&payload, event_tx);
                } else {
                    debug!(?opcode, "discarding orphan frame in idle read");
                }
            }
            DecodeOutcome::Invalid { reason, consumed } => {
                buf.drain(..consumed);
                warn!(%reason, "invalid data in idle read, discarding");
            }
            DecodeOutcome::Incomplete => break,
        }
    }
}

// ---------------------------------------------------------------------------
// Spawn
// ---------------------------------------------------------------------------

/// Spawn the background reader task.
///
/// The task owns the transport exclusively. Requests are submitted via the
/// returned `ReaderHandle.cmd_tx`; async events are published to `event_tx`.
pub(crate) fn spawn_reader(
    transport: Box<dyn Transport>,
    event_tx: broadcast::Sender<SplicerEvent>,
    config: ReaderConfig,
) -> ReaderHandle {
    let (cmd_tx, cmd_rx) = mpsc::channel::<Request>(16);
    let task = tokio::spawn(reader_loop(transport, config, event_tx, cmd_rx));
    ReaderHandle { cmd_tx, task }
}

// ---------------------------------------------------------------------------
// Reader loop
// ---------------------------------------------------------------------------

/// The main loop of the background reader task.
///
/// `biased` select so a submitted command is always served before another
/// idle read is started.
async fn reader_loop(
    mut transport: Box<dyn Transport>,
    config: ReaderConfig,
    event_tx: broadcast::Sender<SplicerEvent>,
    mut cmd_rx: mpsc::Receiver<Request>,
) {
    let mut buf: Vec<u8> = Vec::new();

    loop {
        tokio::select! {
            biased;

            cmd = cmd_rx.recv() => {
                match cmd {
                    Some(Request::Exchange { frame, expect, response_tx }) => {
                        let result = exchange(
                            &mut *transport,
                            &mut buf,
                            &frame,
                            expect,
                            &config,
                            &event_tx,
                        )
                        .await;
                        let _ = response_tx.send(result);
                    }
                    Some(Request::ReadRecord { frame, response_tx }) => {
                        let result = read_record(
                            &mut *transport,
                            &mut buf,
                            &frame,
                            &config,
                            &event_tx,
                        )
                        .await;
                        let _ = response_tx.send(result);
                    }
                    None => {
                        // All senders dropped -- the engine was dropped.
                        debug!("command channel closed, exiting reader loop");
                        let _ = transport.close().await;
                        break;
                    }
                }
            }

            // Idle: pick up async events between commands.
            _ = async {
                match transport.notification(Duration::from_millis(100)).await {
                    Ok(data) => {
                        buf.extend_from_slice(&data);
                        drain_orphans(&mut buf, &event_tx);
                    }
                    Err(TransportError::Timeout) => {}
                    Err(e) => {
                        debug!(%e, "idle read failed");
                        tokio::time::sleep(Duration::from_millis(50)).await;
                    }
                }
            } => {}
        }
    }
}

// ---------------------------------------------------------------------------
// Command execution (inside the reader task)
// ---------------------------------------------------------------------------

/// Send one command frame and wait for the reply carrying `expect`.
async fn exchange(
    transport: &mut dyn Transport,
    buf: &mut Vec<u8>,
    frame: &[u8],
    expect: Opcode,
    config: &ReaderConfig,
    event_tx: &broadcast::Sender<SplicerEvent>,
) -> Result<Vec<u8>> {
    // Anything already buffered predates this command.
    drain_orphans(buf, event_tx);

    debug!("send {:02x?}", frame);
    transport
        .write(frame)
        .await
        .map_err(ProtocolError::Transport)?;

    await_reply(transport, buf, expect, config, event_tx).await
}

/// Wait for a frame with opcode `expect`, publishing interleaved async events
/// and tolerating stale replies for the mismatch grace period.
async fn await_reply(
    transport: &mut dyn Transport,
    buf: &mut Vec<u8>,
    expect: Opcode,
    config: &ReaderConfig,
    event_tx: &broadcast::Sender<SplicerEvent>,
) -> Result<Vec<u8>> {
    let deadline = Instant::now() + config.command_timeout;
    let mut mismatch: Option<(Opcode, Instant)> = None;

    loop {
        // Drain whatever is already buffered.
        loop {
            match protocol::decode_frame(buf) {
                DecodeOutcome::Frame {
                    opcode,
                    payload,
                    consumed,
                } => {
                    buf.drain(..consumed);
                    if opcode == expect {
                        debug!(?opcode, "recv {:02x?}", payload);
                        return Ok(payload);
                    }
                    if opcode == Opcode::GetAsync {
                        publish_event(&payload, event_tx);
                        continue;
                    }
                    debug!(?opcode, expected = ?expect, "mismatched reply opcode");
                    if mismatch.is_none() {
                        mismatch = Some((opcode, Instant::now()));
                    }
                }
                DecodeOutcome::Invalid { reason, consumed } => {
                    buf.drain(..consumed);
                    warn!(%reason, "invalid data while awaiting reply, discarding");
                }
                DecodeOutcome::Incomplete => break,
            }
        }

        if let Some((found, since)) = mismatch {
            if since.elapsed() >= config.mismatch_grace {
                return Err(ProtocolError::UnexpectedOpcode {
                    expected: expect,
                    found,
                });
            }
        }

        let now = Instant::now();
        if now >= deadline {
            return Err(ProtocolError::Timeout);
        }
        let mut wait = deadline - now;
        if let Some((_, since)) = mismatch {
            let grace_left = config.mismatch_grace.saturating_sub(since.elapsed());
            wait = wait.min(grace_left.max(Duration::from_millis(1)));
        }

        match transport.notification(wait).await {
            Ok(data) => buf.extend_from_slice(&data),
            Err(TransportError::Timeout) => {}
            Err(e) => return Err(ProtocolError::Transport(e)),
        }
    }
}

/// Send a record request, decode the metadata reply, and collect the image
/// part burst if the record carries one.
async fn read_record(
    transport: &mut dyn Transport,
    buf: &mut Vec<u8>,
    frame: &[u8],
    config: &ReaderConfig,
    event_tx: &broadcast::Sender<SplicerEvent>,
) -> Result<(RecordMeta, Option<Vec<u8>>)> {
    let payload = exchange(
        transport,
        buf,
        frame,
        Opcode::GetCurrentRecord,
        config,
        event_tx,
    )
    .await?;
    let meta = RecordMeta::decode(&payload).map_err(ProtocolError::Decode)?;

    if meta.image_len == 0 {
        return Ok((meta, None));
    }

    let mut compressed = Vec::with_capacity(usize::from(meta.image_len));
    loop {
        let payload = await_reply(transport, buf, Opcode::GetRecordImg, config, event_tx).await?;
        let part = ImagePart::decode(&payload).map_err(ProtocolError::Decode)?;
        if part.handle != meta.image_handle {
            return Err(ProtocolError::ImageHandle {
                expected: meta.image_handle,
                found: part.handle,
            });
        }
        debug!(part = part.part, total = part.total, "image part");
        compressed.extend_from_slice(part.data);
        if part.is_last() {
            break;
        }
    }

    if compressed.len() != usize::from(meta.image_len) {
        return Err(ProtocolError::Decode(crate::error::DecodeError::ImageSize {
            expected: usize::from(meta.image_len),
            found: compressed.len(),
        }));
    }
    Ok((meta, Some(compressed)))
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
