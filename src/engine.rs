//! The protocol engine: a typed command surface over the reader task.
//!
//! [`Splicer`] is the public face of the crate. It owns the background reader
//! spawned at build time, submits requests to it over an `mpsc` channel, and
//! exposes one method per device operation with decoded argument and return
//! types. Unsolicited splice-progress events are available through
//! [`Splicer::subscribe`].
//!
//! The device processes one command at a time, so the engine enforces a
//! single-in-flight discipline: a second call while one is pending fails
//! immediately with [`ProtocolError::Busy`] instead of queueing. A timed-out
//! command releases the slot; the reader discards its stale reply if one
//! arrives later.

use std::time::Duration;

use tokio::sync::{Mutex, broadcast, oneshot};
use tracing::debug;

use crate::error::{DecodeError, ProtocolError, Result};
use crate::events::SplicerEvent;
use crate::image;
use crate::opcode::Opcode;
use crate::protocol::{self, ACK, QUERY};
use crate::records::{
    AdminSettings, DateTime, FiberFunc, FiberSettings, HeatSettings, RecordMeta, decode_counter,
};
use crate::transceive::{self, ReaderConfig, ReaderHandle, Request};
use crate::transport::Transport;
use crate::types::{Mode, MotorDirection, MotorSide, motor_select};

/// Fluent builder for [`Splicer`].
///
/// All knobs have defaults tuned for a live BLE link; tests typically shorten
/// the command timeout.
pub struct SplicerBuilder {
    command_timeout: Duration,
    mismatch_grace: Duration,
    event_capacity: usize,
}

impl SplicerBuilder {
    pub fn new() -> Self {
        SplicerBuilder {
            command_timeout: Duration::from_secs(3),
            mismatch_grace: Duration::from_millis(250),
            event_capacity: 64,
        }
    }

    /// Set how long to wait for a reply to a command (default: 3s).
    pub fn command_timeout(mut self, timeout: Duration) -> Self {
        self.command_timeout = timeout;
        self
    }

    /// Set how long mismatched reply opcodes are tolerated before an
    /// exchange fails (default: 250ms).
    pub fn mismatch_grace(mut self, grace: Duration) -> Self {
        self.mismatch_grace = grace;
        self
    }

    /// Set the event broadcast channel capacity (default: 64).
    pub fn event_capacity(mut self, capacity: usize) -> Self {
        self.event_capacity = capacity;
        self
    }

    /// Build a [`Splicer`] over the given transport, spawning the background
    /// reader task.
    pub fn build(self, transport: Box<dyn Transport>) -> Splicer {
        let (event_tx, _) = broadcast::channel(self.event_capacity);
        let reader = transceive::spawn_reader(
            transport,
            event_tx.clone(),
            ReaderConfig {
                command_timeout: self.command_timeout,
                mismatch_grace: self.mismatch_grace,
            },
        );
        debug!("protocol engine started");
        Splicer {
            reader,
            event_tx,
            pending: Mutex::new(()),
            command_timeout: self.command_timeout,
        }
    }
}

impl Default for SplicerBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// A connected fusion splicer.
///
/// Constructed via [`SplicerBuilder`] (or [`Splicer::new`] for the defaults).
/// All device communication goes through the [`Transport`] provided at build
/// time; dropping the `Splicer` closes the link and stops the reader task.
pub struct Splicer {
    reader: ReaderHandle,
    event_tx: broadcast::Sender<SplicerEvent>,
    /// The single-in-flight slot. Held (via `try_lock`) for the duration of
    /// one exchange.
    pending: Mutex<()>,
    command_timeout: Duration,
}

impl Splicer {
    /// Build a `Splicer` with default settings over the given transport.
    pub fn new(transport: Box<dyn Transport>) -> Self {
        SplicerBuilder::new().build(transport)
    }

    /// Subscribe to unsolicited splice-progress events.
    ///
    /// Each subscriber gets every event from the point of subscription.
    /// Delivery is best-effort: a subscriber that falls behind the channel
    /// capacity observes a lagged error, not a stall.
    pub fn subscribe(&self) -> broadcast::Receiver<SplicerEvent> {
        self.event_tx.subscribe()
    }

    // -------------------------------------------------------------------
    // Raw exchange plumbing
    // -------------------------------------------------------------------

    /// Encode and send one command, returning the raw reply payload.
    ///
    /// Fails with [`ProtocolError::Busy`] if another command is in flight.
    pub async fn send(&self, opcode: Opcode, params: &[u8]) -> Result<Vec<u8>> {
        let _slot = self.pending.try_lock().map_err(|_| ProtocolError::Busy)?;
        self.exchange(opcode, params).await
    }

    async fn exchange(&self, opcode: Opcode, params: &[u8]) -> Result<Vec<u8>> {
        let frame = protocol::encode(opcode, params)?;
        let (response_tx, response_rx) = oneshot::channel();
        self.reader
            .cmd_tx
            .send(Request::Exchange {
                frame,
                expect: opcode.reply(),
                response_tx,
            })
            .await
            .map_err(|_| ProtocolError::Closed)?;

        // The reader enforces the command timeout; the outer margin only
        // covers the channel round trip.
        match tokio::time::timeout(
            self.command_timeout + Duration::from_millis(500),
            response_rx,
        )
        .await
        {
            Ok(Ok(result)) => result,
            Ok(Err(_)) => Err(ProtocolError::Closed),
            Err(_) => Err(ProtocolError::Timeout),
        }
    }

    /// Send a read command: the query marker as body, reply payload returned.
    async fn query(&self, opcode: Opcode) -> Result<Vec<u8>> {
        self.send(opcode, &[QUERY]).await
    }

    /// Send a write command and require the single-byte ACK reply.
    async fn command(&self, opcode: Opcode, params: &[u8]) -> Result<()> {
        let body = self.send(opcode, params).await?;
        if body == [ACK] {
            Ok(())
        } else {
            Err(ProtocolError::Rejected { opcode, body })
        }
    }

    // -------------------------------------------------------------------
    // Device state reads
    // -------------------------------------------------------------------

    /// Read the device clock.
    pub async fn datetime(&self) -> Result<DateTime> {
        let body = self.query(Opcode::GetDateTime).await?;
        Ok(DateTime::decode(&body)?)
    }

    /// Read the 16-byte fiber tuning parameter block for the given page.
    pub async fn fiber_settings(&self, page: u8) -> Result<FiberSettings> {
        let body = self.send(Opcode::GetFiberSettings, &[page]).await?;
        Ok(FiberSettings::decode(&body)?)
    }

    /// Write a fiber tuning parameter block.
    pub async fn set_fiber_settings(&self, settings: &FiberSettings) -> Result<()> {
        self.command(Opcode::SetFiberSettings, &settings.encode())
            .await
    }

    /// Read the fiber function flags.
    pub async fn fiber_func(&self) -> Result<FiberFunc> {
        let body = self.query(Opcode::GetFiberFunc).await?;
        Ok(FiberFunc::decode(&body)?)
    }

    /// Write the fiber function flags.
    pub async fn set_fiber_func(&self, func: &FiberFunc) -> Result<()> {
        self.command(Opcode::SetFiberFunc, &func.encode()).await
    }

    /// Read the heater timing table.
    pub async fn heat_time(&self) -> Result<HeatSettings> {
        let body = self.query(Opcode::GetHeatTime).await?;
        Ok(HeatSettings::decode(&body)?)
    }

    /// Write the heater timing table.
    pub async fn set_heat_time(&self, heat: &HeatSettings) -> Result<()> {
        self.command(Opcode::SetHeatTime, &heat.encode()).await
    }

    /// Read the administrative counter table.
    pub async fn fiber_admin(&self) -> Result<AdminSettings> {
        let body = self.query(Opcode::GetFiberAdmin).await?;
        Ok(AdminSettings::decode(&body)?)
    }

    /// Write the administrative counter table.
    pub async fn set_fiber_admin(&self, admin: &AdminSettings) -> Result<()> {
        self.command(Opcode::SetFiberAdmin, &admin.encode()).await
    }

    /// Read the device serial number.
    pub async fn serial(&self) -> Result<String> {
        let body = self.query(Opcode::GetSerial).await?;
        // The reply is a fixed-width field padded with NULs.
        let text = String::from_utf8_lossy(&body);
        Ok(text.trim_end_matches('\0').to_string())
    }

    /// Read the lifetime splice counter.
    pub async fn total_count(&self) -> Result<u64> {
        let body = self.query(Opcode::GetTotalCount).await?;
        Ok(decode_counter(&body)?)
    }

    /// Read the current splice counter.
    pub async fn current_count(&self) -> Result<u64> {
        let body = self.query(Opcode::GetCurrentCount).await?;
        Ok(decode_counter(&body)?)
    }

    /// Read the operating mode.
    pub async fn mode(&self) -> Result<Mode> {
        let body = self.query(Opcode::GetMode).await?;
        let code = *body.first().ok_or(DecodeError::Empty)?;
        Mode::from_code(code).ok_or_else(|| DecodeError::UnknownMode(code).into())
    }

    /// Set the operating mode.
    pub async fn set_mode(&self, mode: Mode) -> Result<()> {
        self.command(Opcode::SetMode, &[mode.code()]).await
    }

    /// Announce that a host is connected. The device shows a link indicator
    /// and starts pushing async events.
    pub async fn set_connected(&self) -> Result<()> {
        self.command(Opcode::SetConnected, &[QUERY]).await
    }

    /// Enter the factory menu on the device screen.
    pub async fn factory_menu(&self) -> Result<()> {
        self.command(Opcode::SetFactoryMenuCall, &[QUERY]).await
    }

    // -------------------------------------------------------------------
    // Splice records
    // -------------------------------------------------------------------

    /// Read the index of the most recent splice record.
    pub async fn last_record_index(&self) -> Result<u16> {
        let body = self.query(Opcode::GetRecordLast).await?;
        let value = decode_counter(&body)?;
        u16::try_from(value).map_err(|_| DecodeError::IndexRange(value).into())
    }

    /// Read one splice record by index, with its image if the device stored
    /// one.
    ///
    /// The image is decoded to raw 8-bit pixels,
    /// [`IMAGE_WIDTH`](crate::image::IMAGE_WIDTH) x
    /// [`IMAGE_HEIGHT`](crate::image::IMAGE_HEIGHT).
    pub async fn read_record(&self, index: u16) -> Result<(RecordMeta, Option<Vec<u8>>)> {
        let _slot = self.pending.try_lock().map_err(|_| ProtocolError::Busy)?;

        let frame = protocol::encode(Opcode::GetRecord, &index.to_be_bytes())?;
        let (response_tx, response_rx) = oneshot::channel();
        self.reader
            .cmd_tx
            .send(Request::ReadRecord { frame, response_tx })
            .await
            .map_err(|_| ProtocolError::Closed)?;

        // An image burst can span many notifications; give the reader a few
        // command timeouts of margin rather than one.
        let (meta, compressed) = match tokio::time::timeout(
            self.command_timeout * 4 + Duration::from_millis(500),
            response_rx,
        )
        .await
        {
            Ok(Ok(result)) => result?,
            Ok(Err(_)) => return Err(ProtocolError::Closed),
            Err(_) => return Err(ProtocolError::Timeout),
        };

        let pixels = match compressed {
            Some(data) => Some(image::decode_image(&data)?),
            None => None,
        };
        Ok((meta, pixels))
    }

    /// Mark a stored splice record as read.
    pub async fn set_record_read(&self, index: u16) -> Result<()> {
        self.command(Opcode::SetRecordRead, &index.to_be_bytes())
            .await
    }

    /// Clear the stored splice records.
    pub async fn clear_records(&self) -> Result<()> {
        self.command(Opcode::SetRecordClear, &[QUERY]).await
    }

    // -------------------------------------------------------------------
    // OPM / VFL
    // -------------------------------------------------------------------

    /// Power the optical power meter / visual fault locator section up or
    /// down.
    pub async fn set_opm_enabled(&self, enabled: bool) -> Result<()> {
        let code = if enabled { 0xaa } else { 0x55 };
        self.command(Opcode::SetOpmVflPowerdown, &[code]).await
    }

    /// Set the optical power meter display units.
    pub async fn set_opm_units(&self, units: u8) -> Result<()> {
        self.command(Opcode::SetOpmUnits, &[units]).await
    }

    /// Set the optical power meter calibration wavelength.
    pub async fn set_opm_wavelength(&self, wavelength: u8) -> Result<()> {
        self.command(Opcode::SetOpmWavelength, &[wavelength]).await
    }

    /// Set the visual fault locator mode (off, on, blinking).
    pub async fn set_vfl_mode(&self, mode: u8) -> Result<()> {
        self.command(Opcode::SetVflMode, &[mode]).await
    }

    /// Read the optical power meter. The reply layout depends on the selected
    /// units, so the raw payload is returned.
    pub async fn opm(&self) -> Result<Vec<u8>> {
        self.query(Opcode::GetOpm).await
    }

    // -------------------------------------------------------------------
    // Manual adjustment
    // -------------------------------------------------------------------

    /// Step a motor. Directions are in terms of the image on the device
    /// screen; `steps` and `speed` are raw device units.
    pub async fn move_motor(
        &self,
        side: MotorSide,
        direction: MotorDirection,
        steps: u8,
        speed: u8,
    ) -> Result<()> {
        let (motor, movement) = motor_select(side, direction);
        self.command(Opcode::MoveMotor, &[motor, movement, 0, steps, speed])
            .await
    }

    /// Reset all motors to their home position.
    pub async fn reset_motors(&self) -> Result<()> {
        self.command(Opcode::SetMotorReset, &[QUERY]).await
    }

    /// Fire a manual arc.
    pub async fn arc(&self) -> Result<()> {
        self.command(Opcode::SetArc, &[QUERY]).await
    }

    /// Run the electrode cleaning discharge.
    pub async fn clean_electrodes(&self) -> Result<()> {
        self.command(Opcode::SetClean, &[QUERY]).await
    }

    /// Continue a paused splice cycle.
    pub async fn continue_splice(&self) -> Result<()> {
        self.command(Opcode::SetContinue, &[QUERY]).await
    }
}
