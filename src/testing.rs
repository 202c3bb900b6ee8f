//! Mock transport for deterministic protocol tests.
//!
//! [`MockTransport`] implements [`Transport`] with pre-loaded
//! request/notification pairs, so the engine's framing, correlation, and
//! timeout behavior can be exercised without a radio or a splicer on the
//! bench. The mock is a cheap clone over shared state: keep one clone in the
//! test to inject unsolicited notifications and inspect sent data after the
//! engine has taken ownership of the other.
//!
//! # Example
//!
//! ```
//! use ai9::testing::MockTransport;
//!
//! let mock = MockTransport::new();
//! // When the engine writes this frame, deliver this notification.
//! mock.expect(
//!     &[0x7e, 0x7e, 0x39, 0x00, 0x01, 0x55, 0x3c, 0xef, 0xaa],
//!     &[0x7e, 0x7e, 0x39, 0x00, 0x06, 0x15, 0x06, 0x1d, 0x14, 0x24, 0x2e, 0xf3, 0xf4, 0xaa],
//! );
//! ```

use std::collections::VecDeque;
use std::io;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use async_trait::async_trait;

use crate::error::TransportError;
use crate::transport::Transport;

/// A pre-loaded request and the notifications it triggers.
#[derive(Debug, Clone)]
struct Expectation {
    request: Vec<u8>,
    replies: Vec<Vec<u8>>,
}

#[derive(Debug)]
struct Inner {
    expectations: VecDeque<Expectation>,
    pending: VecDeque<Vec<u8>>,
    sent_log: Vec<Vec<u8>>,
    connected: bool,
}

/// A mock [`Transport`] backed by a script of expected writes.
///
/// Expectations are consumed in order: each `write` must match the next
/// expected request byte-for-byte, after which its notifications are queued
/// for delivery. Unsolicited notifications can be injected at any time with
/// [`push_notification`](MockTransport::push_notification).
#[derive(Debug, Clone)]
pub struct MockTransport {
    inner: Arc<Mutex<Inner>>,
}

impl MockTransport {
    /// Create a new mock transport in the connected state.
    pub fn new() -> Self {
        MockTransport {
            inner: Arc::new(Mutex::new(Inner {
                expectations: VecDeque::new(),
                pending: VecDeque::new(),
                sent_log: Vec::new(),
                connected: true,
            })),
        }
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Expect `request` to be written, then deliver `reply` as one
    /// notification.
    pub fn expect(&self, request: &[u8], reply: &[u8]) {
        self.expect_replies(request, &[reply]);
    }

    /// Expect `request` to be written, then deliver each of `replies` as a
    /// separate notification, in order.
    pub fn expect_replies(&self, request: &[u8], replies: &[&[u8]]) {
        self.lock().expectations.push_back(Expectation {
            request: request.to_vec(),
            replies: replies.iter().map(|r| r.to_vec()).collect(),
        });
    }

    /// Expect `request` to be written with no notification in response (for
    /// timeout tests).
    pub fn expect_no_reply(&self, request: &[u8]) {
        self.expect_replies(request, &[]);
    }

    /// Inject an unsolicited notification, as if the device pushed one.
    pub fn push_notification(&self, bytes: &[u8]) {
        self.lock().pending.push_back(bytes.to_vec());
    }

    /// All data written through this transport, one element per `write`.
    pub fn sent_data(&self) -> Vec<Vec<u8>> {
        self.lock().sent_log.clone()
    }

    /// Number of expectations not yet consumed.
    pub fn remaining_expectations(&self) -> usize {
        self.lock().expectations.len()
    }

    /// Flip the connected state; while disconnected, `write` and
    /// `notification` fail with [`TransportError::NotConnected`].
    pub fn set_connected(&self, connected: bool) {
        self.lock().connected = connected;
    }
}

impl Default for MockTransport {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Transport for MockTransport {
    async fn write(&mut self, data: &[u8]) -> Result<(), TransportError> {
        let mut inner = self.lock();
        if !inner.connected {
            return Err(TransportError::NotConnected);
        }
        inner.sent_log.push(data.to_vec());

        match inner.expectations.pop_front() {
            Some(expectation) => {
                if data != expectation.request.as_slice() {
                    return Err(TransportError::Io(io::Error::new(
                        io::ErrorKind::InvalidData,
                        format!(
                            "unexpected write: expected {:02x?}, got {:02x?}",
                            expectation.request, data
                        ),
                    )));
                }
                inner.pending.extend(expectation.replies);
                Ok(())
            }
            None => Err(TransportError::Io(io::Error::new(
                io::ErrorKind::InvalidData,
                "no more expectations in mock transport",
            ))),
        }
    }

    async fn notification(&mut self, timeout: Duration) -> Result<Vec<u8>, TransportError> {
        let deadline = tokio::time::Instant::now() + timeout;
        loop {
            {
                let mut inner = self.lock();
                if !inner.connected {
                    return Err(TransportError::NotConnected);
                }
                if let Some(bytes) = inner.pending.pop_front() {
                    return Ok(bytes);
                }
            }
            if tokio::time::Instant::now() >= deadline {
                return Err(TransportError::Timeout);
            }
            tokio::time::sleep(Duration::from_millis(1)).await;
        }
    }

    async fn close(&mut self) -> Result<(), TransportError> {
        let mut inner = self.lock();
        inner.connected = false;
        inner.pending.clear();
        Ok(())
    }

    fn is_connected(&self) -> bool {
        self.lock().connected
    }
}
