//! The splicer's command set.
//!
//! Every supported device command is a variant of the closed [`Opcode`] enum,
//! with its single-byte wire code as the discriminant. Adding a command is a
//! single-site change here; the codec and engine dispatch exhaustively over
//! the enum, so a new variant is compile-time checked everywhere it matters.
//!
//! Reserved/undocumented code points (firmware upgrade, factory diagnostics)
//! are deliberately not represented: a frame carrying one decodes to
//! [`DecodeError::UnknownOpcode`](crate::error::DecodeError::UnknownOpcode)
//! rather than passing through silently.

/// A device command code.
///
/// Read-type commands carry the query marker
/// ([`QUERY`](crate::protocol::QUERY)) or a small parameter block and reply
/// with a data payload; write-type commands carry parameter bytes and reply
/// with a single ACK byte ([`ACK`](crate::protocol::ACK)).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum Opcode {
    /// Write the 16-byte fiber tuning parameter block.
    SetFiberSettings = 0x10,
    /// Read the 16-byte fiber tuning parameter block. The request byte
    /// selects the parameter page.
    GetFiberSettings = 0x11,
    /// Write the 12-byte fiber function flags.
    SetFiberFunc = 0x12,
    /// Read the 12-byte fiber function flags.
    GetFiberFunc = 0x13,
    /// Write the 8-byte heater timing table.
    SetHeatTime = 0x14,
    /// Read the 8-byte heater timing table.
    GetHeatTime = 0x15,
    /// Write the 12-byte administrative counter table.
    SetFiberAdmin = 0x16,
    /// Read the 12-byte administrative counter table.
    GetFiberAdmin = 0x17,
    /// Mark a stored splice record as read (2-byte index).
    SetRecordRead = 0x21,
    /// A part of a splice image. Device-to-host only; the device pushes these
    /// after a record reply whose `image_len` is nonzero.
    GetRecordImg = 0x22,
    /// Read splice record metadata (2-byte index). Also the opcode the device
    /// uses for the reply to [`GetRecord`](Opcode::GetRecord).
    GetCurrentRecord = 0x23,
    /// Read the lifetime splice counter.
    GetTotalCount = 0x25,
    /// Read the current splice counter.
    GetCurrentCount = 0x27,
    /// Read the device serial number string.
    GetSerial = 0x35,
    /// Read the device clock (6 bytes: year-2000, month, day, hour, minute,
    /// second).
    GetDateTime = 0x39,
    /// Enter the factory menu.
    SetFactoryMenuCall = 0x41,
    /// Set the operating mode (normal / manual adjust).
    SetMode = 0x42,
    /// Read the operating mode.
    GetMode = 0x43,
    /// Announce that a host is connected.
    SetConnected = 0x45,
    /// An unsolicited device event (lid, alignment, arc, splice result,
    /// heater). Device-to-host only.
    GetAsync = 0x48,
    /// Read the index of the most recent splice record.
    GetRecordLast = 0x49,
    /// Read a splice record by 2-byte index. The device answers with a
    /// [`GetCurrentRecord`](Opcode::GetCurrentRecord) frame.
    GetRecord = 0x4a,
    /// Clear the stored splice records.
    SetRecordClear = 0x4b,
    /// Power the OPM/VFL section up (`0xaa`) or down (`0x55`).
    SetOpmVflPowerdown = 0xa0,
    /// Set the optical power meter display units.
    SetOpmUnits = 0xa1,
    /// Read the optical power meter.
    GetOpm = 0xa2,
    /// Set the visual fault locator mode.
    SetVflMode = 0xa3,
    /// Set the optical power meter calibration wavelength.
    SetOpmWavelength = 0xa4,
    /// Step a motor: 5-byte block of motor, movement, zero, steps, speed.
    MoveMotor = 0xe0,
    /// Fire a manual arc.
    SetArc = 0xe1,
    /// Reset all motors to their home position.
    SetMotorReset = 0xe2,
    /// Run the electrode cleaning discharge.
    SetClean = 0xe3,
    /// Continue a paused splice cycle.
    SetContinue = 0xe9,
}

impl Opcode {
    /// The single-byte wire code for this command.
    pub fn code(self) -> u8 {
        self as u8
    }

    /// Look up an opcode by its wire code. Returns `None` for reserved or
    /// undocumented code points.
    pub fn from_code(code: u8) -> Option<Opcode> {
        use Opcode::*;
        Some(match code {
            0x10 => SetFiberSettings,
            0x11 => GetFiberSettings,
            0x12 => SetFiberFunc,
            0x13 => GetFiberFunc,
            0x14 => SetHeatTime,
            0x15 => GetHeatTime,
            0x16 => SetFiberAdmin,
            0x17 => GetFiberAdmin,
            0x21 => SetRecordRead,
            0x22 => GetRecordImg,
            0x23 => GetCurrentRecord,
            0x25 => GetTotalCount,
            0x27 => GetCurrentCount,
            0x35 => GetSerial,
            0x39 => GetDateTime,
            0x41 => SetFactoryMenuCall,
            0x42 => SetMode,
            0x43 => GetMode,
            0x45 => SetConnected,
            0x48 => GetAsync,
            0x49 => GetRecordLast,
            0x4a => GetRecord,
            0x4b => SetRecordClear,
            0xa0 => SetOpmVflPowerdown,
            0xa1 => SetOpmUnits,
            0xa2 => GetOpm,
            0xa3 => SetVflMode,
            0xa4 => SetOpmWavelength,
            0xe0 => MoveMotor,
            0xe1 => SetArc,
            0xe2 => SetMotorReset,
            0xe3 => SetClean,
            0xe9 => SetContinue,
            _ => return None,
        })
    }

    /// The declared request payload width for this command, or `None` for
    /// opcodes that only ever appear in device-to-host frames.
    pub fn request_len(self) -> Option<usize> {
        use Opcode::*;
        Some(match self {
            SetFiberSettings => 16,
            SetFiberFunc | SetFiberAdmin => 12,
            SetHeatTime => 8,
            MoveMotor => 5,
            SetRecordRead | GetCurrentRecord | GetRecord => 2,
            GetFiberSettings | GetFiberFunc | GetHeatTime | GetFiberAdmin | GetTotalCount
            | GetCurrentCount | GetSerial | GetDateTime | SetFactoryMenuCall | SetMode
            | GetMode | SetConnected | GetRecordLast | SetRecordClear | SetOpmVflPowerdown
            | SetOpmUnits | GetOpm | SetVflMode | SetOpmWavelength | SetArc | SetMotorReset
            | SetClean | SetContinue => 1,
            GetRecordImg | GetAsync => return None,
        })
    }

    /// The opcode the device uses to answer this request.
    ///
    /// Identity for everything except [`GetRecord`](Opcode::GetRecord), which
    /// the device answers with a [`GetCurrentRecord`](Opcode::GetCurrentRecord)
    /// frame.
    pub fn reply(self) -> Opcode {
        match self {
            Opcode::GetRecord => Opcode::GetCurrentRecord,
            other => other,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn code_round_trip() {
        // Every variant must survive code() -> from_code().
        let all = [
            Opcode::SetFiberSettings,
            Opcode::GetFiberSettings,
            Opcode::SetFiberFunc,
            Opcode::GetFiberFunc,
            Opcode::SetHeatTime,
            Opcode::GetHeatTime,
            Opcode::SetFiberAdmin,
            Opcode::GetFiberAdmin,
            Opcode::SetRecordRead,
            Opcode::GetRecordImg,
            Opcode::GetCurrentRecord,
            Opcode::GetTotalCount,
            Opcode::GetCurrentCount,
            Opcode::GetSerial,
            Opcode::GetDateTime,
            Opcode::SetFactoryMenuCall,
            Opcode::SetMode,
            Opcode::GetMode,
            Opcode::SetConnected,
            Opcode::GetAsync,
            Opcode::GetRecordLast,
            Opcode::GetRecord,
            Opcode::SetRecordClear,
            Opcode::SetOpmVflPowerdown,
            Opcode::SetOpmUnits,
            Opcode::GetOpm,
            Opcode::SetVflMode,
            Opcode::SetOpmWavelength,
            Opcode::MoveMotor,
            Opcode::SetArc,
            Opcode::SetMotorReset,
            Opcode::SetClean,
            Opcode::SetContinue,
        ];
        for op in all {
            assert_eq!(Opcode::from_code(op.code()), Some(op), "{op:?}");
        }
    }

    #[test]
    fn reserved_codes_rejected() {
        // Firmware-upgrade and factory-diagnostic code points are not part of
        // the supported command set.
        for code in [0x00, 0x19, 0x20, 0x26, 0x32, 0x33, 0x34, 0x44, 0xa6, 0xf0, 0xf1, 0xf2] {
            assert_eq!(Opcode::from_code(code), None, "{code:#04x}");
        }
    }

    #[test]
    fn known_codes() {
        assert_eq!(Opcode::GetCurrentRecord.code(), 0x23);
        assert_eq!(Opcode::GetDateTime.code(), 0x39);
        assert_eq!(Opcode::MoveMotor.code(), 0xe0);
        assert_eq!(Opcode::GetAsync.code(), 0x48);
    }

    #[test]
    fn request_widths() {
        assert_eq!(Opcode::GetDateTime.request_len(), Some(1));
        assert_eq!(Opcode::MoveMotor.request_len(), Some(5));
        assert_eq!(Opcode::GetRecord.request_len(), Some(2));
        assert_eq!(Opcode::SetFiberSettings.request_len(), Some(16));
        assert_eq!(Opcode::GetAsync.request_len(), None);
        assert_eq!(Opcode::GetRecordImg.request_len(), None);
    }

    #[test]
    fn reply_mapping() {
        assert_eq!(Opcode::GetRecord.reply(), Opcode::GetCurrentRecord);
        assert_eq!(Opcode::GetCurrentRecord.reply(), Opcode::GetCurrentRecord);
        assert_eq!(Opcode::SetMode.reply(), Opcode::SetMode);
        assert_eq!(Opcode::GetDateTime.reply(), Opcode::GetDateTime);
    }
}
