//! ai9: a protocol engine for AI-series handheld fusion splicers.
//!
//! These splicers expose a framed command/response protocol over a BLE GATT
//! write/notify characteristic pair. This crate implements the wire codec,
//! the structured record and image decoders, and an async engine that
//! multiplexes command replies, splice-progress events, and image-part bursts
//! arriving on the one notification stream.
//!
//! # Key types
//!
//! - [`Splicer`] -- the typed command surface, one method per device operation
//! - [`Transport`] -- byte-level link to the device; implement it over your
//!   platform's BLE stack
//! - [`SplicerEvent`] -- unsolicited splice-progress notifications
//! - [`ProtocolError`] / [`Result`] -- error handling
//!
//! # Example
//!
//! ```no_run
//! use ai9::{Splicer, SplicerEvent};
//!
//! # async fn example(transport: Box<dyn ai9::Transport>) -> ai9::Result<()> {
//! let splicer = Splicer::new(transport);
//! let mut events = splicer.subscribe();
//!
//! splicer.set_connected().await?;
//! println!("device clock: {:?}", splicer.datetime().await?);
//!
//! while let Ok(event) = events.recv().await {
//!     if let SplicerEvent::SpliceCompleted { loss_db } = event {
//!         println!("splice done, loss {loss_db} dB");
//!         break;
//!     }
//! }
//! # Ok(())
//! # }
//! ```

pub mod engine;
pub mod error;
pub mod events;
pub mod image;
pub mod opcode;
pub mod protocol;
pub mod records;
pub mod testing;
mod transceive;
pub mod transport;
pub mod types;

// Re-export key types at the crate root.
pub use engine::{Splicer, SplicerBuilder};
pub use error::{DecodeError, EncodeError, ProtocolError, Result, TransportError};
pub use events::SplicerEvent;
pub use image::{IMAGE_HEIGHT, IMAGE_WIDTH};
pub use opcode::Opcode;
pub use records::{
    AdminSettings, DateTime, FiberFunc, FiberSettings, HeatSettings, RecordMeta,
};
pub use transport::Transport;
pub use types::{Mode, MotorDirection, MotorSide};
