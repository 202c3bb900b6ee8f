//! Unsolicited device event types.
//!
//! During a splice cycle the device pushes
//! [`GetAsync`](crate::opcode::Opcode::GetAsync) frames describing its
//! progress: lid movement, fiber placement, alignment, the arc itself, the
//! splice outcome, and heater state. The engine decodes these into
//! [`SplicerEvent`]s and delivers them through a [`tokio::sync::broadcast`]
//! channel, subscribed via [`Splicer::subscribe()`](crate::engine::Splicer::subscribe).
//!
//! Delivery is best-effort through a bounded channel; slow consumers may miss
//! events during a rapid splice sequence.

use crate::error::DecodeError;

/// An unsolicited event pushed by the splicer.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum SplicerEvent {
    /// The wind protector lid was opened.
    LidOpened,
    /// The wind protector lid was closed.
    LidClosed,
    /// The left fiber is misplaced in its V-groove.
    LeftFiberMisplaced,
    /// The right fiber is misplaced in its V-groove.
    RightFiberMisplaced,
    /// Both fibers found and aligned.
    FibersAligned,
    /// The fusion arc fired.
    Arc,
    /// The splice finished successfully.
    SpliceCompleted {
        /// Estimated splice loss in dB.
        loss_db: f32,
    },
    /// The splice failed.
    SpliceFailed,
    /// The inserted fiber is already spliced.
    FiberAlreadySpliced,
    /// The left fiber's end face or cleave angle is unacceptable.
    LeftFaceUnacceptable,
    /// Both end faces or cleave angles are unacceptable.
    BothFacesUnacceptable,
    /// No fiber was found.
    FiberNotFound,
    /// The left fiber was not found.
    LeftFiberNotFound,
    /// The right fiber was not found.
    RightFiberNotFound,
    /// The heater is warming up.
    HeaterWarmup,
    /// Heat-shrink cycle started.
    HeatStarted,
    /// Heat-shrink cycle finished.
    HeatDone,
    /// An event code not in the known table.
    Unknown {
        /// The raw event code.
        code: u8,
    },
}

/// Decode a `GetAsync` frame body (`[event code][loss]`, loss in 0.01 dB
/// units) into a [`SplicerEvent`].
pub fn decode_event(body: &[u8]) -> Result<SplicerEvent, DecodeError> {
    let code = *body.first().ok_or(DecodeError::Empty)?;
    let loss = body.get(1).copied().unwrap_or(0);
    Ok(match code {
        0x01 => SplicerEvent::LidOpened,
        0x02 => SplicerEvent::LidClosed,
        0x04 => SplicerEvent::FibersAligned,
        0x06 => SplicerEvent::Arc,
        0x07 => SplicerEvent::SpliceCompleted {
            loss_db: f32::from(loss) * 0.01,
        },
        0x08 => SplicerEvent::SpliceFailed,
        0x0d => SplicerEvent::LeftFiberMisplaced,
        0x0f => SplicerEvent::RightFiberMisplaced,
        0x11 => SplicerEvent::FiberAlreadySpliced,
        0x12 => SplicerEvent::LeftFaceUnacceptable,
        0x14 => SplicerEvent::BothFacesUnacceptable,
        0x15 => SplicerEvent::FiberNotFound,
        0x21 => SplicerEvent::HeatStarted,
        0x22 => SplicerEvent::HeatDone,
        0x31 => SplicerEvent::LeftFiberNotFound,
        0x32 => SplicerEvent::RightFiberNotFound,
        0x33 => SplicerEvent::HeaterWarmup,
        code => SplicerEvent::Unknown { code },
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn splice_success_carries_loss() {
        let event = decode_event(&[0x07, 0x02]).unwrap();
        match event {
            SplicerEvent::SpliceCompleted { loss_db } => {
                assert!((loss_db - 0.02).abs() < f32::EPSILON);
            }
            other => panic!("expected SpliceCompleted, got {other:?}"),
        }
    }

    #[test]
    fn known_codes() {
        assert_eq!(decode_event(&[0x01, 0x00]).unwrap(), SplicerEvent::LidOpened);
        assert_eq!(decode_event(&[0x02, 0x00]).unwrap(), SplicerEvent::LidClosed);
        assert_eq!(decode_event(&[0x06, 0x00]).unwrap(), SplicerEvent::Arc);
        assert_eq!(decode_event(&[0x08, 0x00]).unwrap(), SplicerEvent::SpliceFailed);
        assert_eq!(decode_event(&[0x22, 0x00]).unwrap(), SplicerEvent::HeatDone);
        assert_eq!(
            decode_event(&[0x32, 0x00]).unwrap(),
            SplicerEvent::RightFiberNotFound
        );
    }

    #[test]
    fn unknown_code_preserved() {
        assert_eq!(
            decode_event(&[0x7f, 0x00]).unwrap(),
            SplicerEvent::Unknown { code: 0x7f }
        );
    }

    #[test]
    fn missing_loss_byte_tolerated() {
        // The loss byte defaults to zero rather than failing the whole event.
        assert_eq!(
            decode_event(&[0x07]).unwrap(),
            SplicerEvent::SpliceCompleted { loss_db: 0.0 }
        );
    }

    #[test]
    fn empty_body_rejected() {
        assert_eq!(decode_event(&[]).unwrap_err(), DecodeError::Empty);
    }
}
