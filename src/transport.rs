//! Transport trait for the BLE link to the splicer.
//!
//! The [`Transport`] trait abstracts the single GATT write/notify
//! characteristic pair the device exposes. Adapter discovery, pairing, and
//! characteristic resolution are the platform BLE stack's job; the protocol
//! engine only needs to write command frames and receive notification
//! payloads in device order.
//!
//! The engine operates on a boxed `Transport` rather than a concrete BLE
//! client, so the same protocol code runs against real hardware and against
//! [`MockTransport`](crate::testing::MockTransport) in tests.

use async_trait::async_trait;
use std::time::Duration;

use crate::error::TransportError;

/// Asynchronous byte-level link to the splicer.
///
/// Implementations deliver notifications whole and in the order the device
/// emits them (FIFO per connection, no reordering or batching guarantees
/// beyond that). One notification is not necessarily one protocol frame --
/// frames may split across notifications or share one.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Write raw bytes to the device's command characteristic.
    async fn write(&mut self, data: &[u8]) -> Result<(), TransportError>;

    /// Receive the next notification payload.
    ///
    /// Waits up to `timeout` for the device to push data; returns
    /// [`TransportError::Timeout`] if nothing arrives within the deadline.
    async fn notification(&mut self, timeout: Duration) -> Result<Vec<u8>, TransportError>;

    /// Close the link.
    ///
    /// Subsequent `write` and `notification` calls should return
    /// [`TransportError::NotConnected`].
    async fn close(&mut self) -> Result<(), TransportError>;

    /// Whether the link is currently usable.
    fn is_connected(&self) -> bool;
}
