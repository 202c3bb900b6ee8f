//! Structured device-state payloads and their binary layouts.
//!
//! All device telemetry is carried as fixed-layout big-endian blobs. The
//! types here are immutable snapshots decoded from exactly one reply payload;
//! each has a `decode` that must consume its input exactly (a short blob is
//! [`DecodeError::TruncatedRecord`], leftover bytes are
//! [`DecodeError::TrailingBytes`], never a partially-populated value) and an
//! `encode` that reproduces the original bytes.
//!
//! The device is the trusted source for field values: no calendar or range
//! validation is applied, only layout.

use crate::error::DecodeError;

/// A little cursor over a record payload. Tracks position so the decoders can
/// fail loudly on both short and over-long input.
struct Reader<'a> {
    buf: &'a [u8],
    pos: usize,
}

impl<'a> Reader<'a> {
    fn new(buf: &'a [u8]) -> Self {
        Reader { buf, pos: 0 }
    }

    fn take(&mut self, n: usize) -> Result<&'a [u8], DecodeError> {
        let remaining = self.buf.len() - self.pos;
        if remaining < n {
            return Err(DecodeError::TruncatedRecord {
                needed: n,
                remaining,
            });
        }
        let out = &self.buf[self.pos..self.pos + n];
        self.pos += n;
        Ok(out)
    }

    fn u8(&mut self) -> Result<u8, DecodeError> {
        Ok(self.take(1)?[0])
    }

    fn u16_be(&mut self) -> Result<u16, DecodeError> {
        let b = self.take(2)?;
        Ok(u16::from_be_bytes([b[0], b[1]]))
    }

    fn finish(self) -> Result<(), DecodeError> {
        let remaining = self.buf.len() - self.pos;
        if remaining != 0 {
            return Err(DecodeError::TrailingBytes { remaining });
        }
        Ok(())
    }
}

fn checked(buf: &[u8]) -> Result<Reader<'_>, DecodeError> {
    if buf.is_empty() {
        return Err(DecodeError::Empty);
    }
    Ok(Reader::new(buf))
}

/// The device clock, as reported by a date/time reply or embedded in a splice
/// record. The wire carries the year as an offset from 2000.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DateTime {
    /// Full year (wire byte + 2000).
    pub year: u16,
    pub month: u8,
    pub day: u8,
    pub hour: u8,
    pub minute: u8,
    pub second: u8,
}

impl DateTime {
    /// Encoded width in bytes.
    pub const WIRE_LEN: usize = 6;

    /// Decode from a 6-byte payload.
    pub fn decode(buf: &[u8]) -> Result<Self, DecodeError> {
        let mut r = checked(buf)?;
        let dt = Self::read(&mut r)?;
        r.finish()?;
        Ok(dt)
    }

    fn read(r: &mut Reader<'_>) -> Result<Self, DecodeError> {
        Ok(DateTime {
            year: 2000 + u16::from(r.u8()?),
            month: r.u8()?,
            day: r.u8()?,
            hour: r.u8()?,
            minute: r.u8()?,
            second: r.u8()?,
        })
    }

    /// Re-encode to wire bytes.
    pub fn encode(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(Self::WIRE_LEN);
        self.write(&mut out);
        out
    }

    fn write(&self, out: &mut Vec<u8>) {
        out.push(self.year.saturating_sub(2000) as u8);
        out.extend([self.month, self.day, self.hour, self.minute, self.second]);
    }
}

/// The 16-byte fiber tuning parameter block (arc power, hold times, gap
/// widths). Parameters are positional; the device documentation does not name
/// them individually.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FiberSettings {
    pub data: [u8; 16],
}

impl FiberSettings {
    /// Encoded width in bytes.
    pub const WIRE_LEN: usize = 16;

    /// Decode from a 16-byte payload.
    pub fn decode(buf: &[u8]) -> Result<Self, DecodeError> {
        let mut r = checked(buf)?;
        let s = Self::read(&mut r)?;
        r.finish()?;
        Ok(s)
    }

    fn read(r: &mut Reader<'_>) -> Result<Self, DecodeError> {
        let mut data = [0u8; 16];
        data.copy_from_slice(r.take(16)?);
        Ok(FiberSettings { data })
    }

    /// Re-encode to wire bytes.
    pub fn encode(&self) -> Vec<u8> {
        self.data.to_vec()
    }
}

/// The 12-byte fiber function flag block (auto-splice toggles, detection
/// switches). Positional, like [`FiberSettings`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FiberFunc {
    pub data: [u8; 12],
}

impl FiberFunc {
    /// Encoded width in bytes.
    pub const WIRE_LEN: usize = 12;

    /// Decode from a 12-byte payload.
    pub fn decode(buf: &[u8]) -> Result<Self, DecodeError> {
        let mut r = checked(buf)?;
        let mut data = [0u8; 12];
        data.copy_from_slice(r.take(12)?);
        r.finish()?;
        Ok(FiberFunc { data })
    }

    /// Re-encode to wire bytes.
    pub fn encode(&self) -> Vec<u8> {
        self.data.to_vec()
    }
}

/// The 8-byte heater timing table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HeatSettings {
    pub data: [u8; 8],
}

impl HeatSettings {
    /// Encoded width in bytes.
    pub const WIRE_LEN: usize = 8;

    /// Decode from an 8-byte payload.
    pub fn decode(buf: &[u8]) -> Result<Self, DecodeError> {
        let mut r = checked(buf)?;
        let mut data = [0u8; 8];
        data.copy_from_slice(r.take(8)?);
        r.finish()?;
        Ok(HeatSettings { data })
    }

    /// Re-encode to wire bytes.
    pub fn encode(&self) -> Vec<u8> {
        self.data.to_vec()
    }
}

/// The 12-byte administrative counter table: nine electrode-wear/arc
/// counters followed by three bytes observed to be zero.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AdminSettings {
    /// Electrode-wear and arc counters.
    pub et: [u8; 9],
    /// Reserved trailing bytes.
    pub zero: [u8; 3],
}

impl AdminSettings {
    /// Encoded width in bytes.
    pub const WIRE_LEN: usize = 12;

    /// Decode from a 12-byte payload.
    pub fn decode(buf: &[u8]) -> Result<Self, DecodeError> {
        let mut r = checked(buf)?;
        let s = Self::read(&mut r)?;
        r.finish()?;
        Ok(s)
    }

    fn read(r: &mut Reader<'_>) -> Result<Self, DecodeError> {
        let mut et = [0u8; 9];
        et.copy_from_slice(r.take(9)?);
        let mut zero = [0u8; 3];
        zero.copy_from_slice(r.take(3)?);
        Ok(AdminSettings { et, zero })
    }

    /// Re-encode to wire bytes.
    pub fn encode(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(Self::WIRE_LEN);
        self.write(&mut out);
        out
    }

    fn write(&self, out: &mut Vec<u8>) {
        out.extend(self.et);
        out.extend(self.zero);
    }
}

/// Metadata for one stored splice record: the device clock at splice time,
/// the splice outcome, the fiber geometry measurements, and the full settings
/// and counter state captured when the splice ran.
///
/// `image_len` is the length of the run-length-encoded splice image that the
/// device pushes (as [`Opcode::GetRecordImg`](crate::opcode::Opcode::GetRecordImg)
/// parts tagged with `image_handle`) after this reply; zero means no image
/// was stored.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordMeta {
    pub datetime: DateTime,
    /// Failure code; zero for a successful splice.
    pub failure: u8,
    /// Estimated splice loss, in 0.01 dB units.
    pub loss: u8,
    /// Cleave angles.
    pub angles: [u8; 3],
    pub face_quality: u8,
    /// Fiber core coordinate measurements.
    pub coordinates: [u16; 12],
    pub settings: FiberSettings,
    pub face_detection: u8,
    pub angle_detection: u8,
    pub autofocus: u8,
    pub admin: AdminSettings,
    /// Battery charge at splice time.
    pub charge: u8,
    /// Length of the compressed splice image, zero if none.
    pub image_len: u16,
    /// Handle tagging the image parts for this record.
    pub image_handle: u8,
}

impl RecordMeta {
    /// Encoded width in bytes.
    pub const WIRE_LEN: usize = 71;

    /// Decode from a 71-byte record payload.
    ///
    /// The decode consumes the input exactly; a short or over-long blob is an
    /// error, never a partial result.
    pub fn decode(buf: &[u8]) -> Result<Self, DecodeError> {
        let mut r = checked(buf)?;
        let datetime = DateTime::read(&mut r)?;
        let failure = r.u8()?;
        let loss = r.u8()?;
        let mut angles = [0u8; 3];
        angles.copy_from_slice(r.take(3)?);
        let face_quality = r.u8()?;
        let mut coordinates = [0u16; 12];
        for c in coordinates.iter_mut() {
            *c = r.u16_be()?;
        }
        let settings = FiberSettings::read(&mut r)?;
        let face_detection = r.u8()?;
        let angle_detection = r.u8()?;
        let autofocus = r.u8()?;
        let admin = AdminSettings::read(&mut r)?;
        let charge = r.u8()?;
        let image_len = r.u16_be()?;
        let image_handle = r.u8()?;
        r.finish()?;
        Ok(RecordMeta {
            datetime,
            failure,
            loss,
            angles,
            face_quality,
            coordinates,
            settings,
            face_detection,
            angle_detection,
            autofocus,
            admin,
            charge,
            image_len,
            image_handle,
        })
    }

    /// Re-encode to wire bytes. For every well-formed blob,
    /// `RecordMeta::decode(b)?.encode() == b`.
    pub fn encode(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(Self::WIRE_LEN);
        self.datetime.write(&mut out);
        out.push(self.failure);
        out.push(self.loss);
        out.extend(self.angles);
        out.push(self.face_quality);
        for c in self.coordinates {
            out.extend(c.to_be_bytes());
        }
        out.extend(self.settings.data);
        out.extend([self.face_detection, self.angle_detection, self.autofocus]);
        self.admin.write(&mut out);
        out.push(self.charge);
        out.extend(self.image_len.to_be_bytes());
        out.push(self.image_handle);
        out
    }
}

/// Decode a big-endian counter payload (splice counts, record indexes). The
/// device uses different widths for different counters, so any length from
/// one to eight bytes is accepted.
pub fn decode_counter(buf: &[u8]) -> Result<u64, DecodeError> {
    if buf.is_empty() {
        return Err(DecodeError::Empty);
    }
    if buf.len() > 8 {
        return Err(DecodeError::TrailingBytes {
            remaining: buf.len() - 8,
        });
    }
    Ok(buf.iter().fold(0u64, |acc, &b| (acc << 8) | u64::from(b)))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn hex(s: &str) -> Vec<u8> {
        (0..s.len())
            .step_by(2)
            .map(|i| u8::from_str_radix(&s[i..i + 2], 16).unwrap())
            .collect()
    }

    /// A record payload captured from a live device trace.
    const RECORD: &str = "15061d14242e0001000000010000000000000000000000000000000000000000\
                          000000000000641e01140c14281e0100288c8200010100070507070905040412\
                          000000550000a9";

    fn record_bytes() -> Vec<u8> {
        hex(RECORD)
    }

    // ---------------------------------------------------------------
    // DateTime
    // ---------------------------------------------------------------

    #[test]
    fn datetime_decode() {
        let dt = DateTime::decode(&hex("15061d14242e")).unwrap();
        assert_eq!(
            dt,
            DateTime {
                year: 2021,
                month: 6,
                day: 29,
                hour: 20,
                minute: 36,
                second: 46,
            }
        );
    }

    #[test]
    fn datetime_round_trip() {
        let raw = hex("15061d14242e");
        assert_eq!(DateTime::decode(&raw).unwrap().encode(), raw);
    }

    #[test]
    fn datetime_short_input() {
        let err = DateTime::decode(&hex("15061d1424")).unwrap_err();
        assert_eq!(
            err,
            DecodeError::TruncatedRecord {
                needed: 1,
                remaining: 0,
            }
        );
    }

    #[test]
    fn datetime_long_input() {
        let err = DateTime::decode(&hex("15061d14242e00")).unwrap_err();
        assert_eq!(err, DecodeError::TrailingBytes { remaining: 1 });
    }

    #[test]
    fn datetime_empty_input() {
        assert_eq!(DateTime::decode(&[]).unwrap_err(), DecodeError::Empty);
    }

    // ---------------------------------------------------------------
    // Settings blocks
    // ---------------------------------------------------------------

    #[test]
    fn fiber_settings_decode() {
        let raw = hex("0000641e01140c14281e0100288c8200");
        let s = FiberSettings::decode(&raw).unwrap();
        assert_eq!(
            s.data,
            [0, 0, 100, 30, 1, 20, 12, 20, 40, 30, 1, 0, 40, 140, 130, 0]
        );
        assert_eq!(s.encode(), raw);
    }

    #[test]
    fn fiber_func_round_trip() {
        let raw = hex("02000001010001010a010900");
        let f = FiberFunc::decode(&raw).unwrap();
        assert_eq!(f.data[0], 2);
        assert_eq!(f.encode(), raw);
    }

    #[test]
    fn heat_settings_round_trip() {
        let raw = hex("04141211100f0000");
        let h = HeatSettings::decode(&raw).unwrap();
        assert_eq!(h.data, [4, 20, 18, 17, 16, 15, 0, 0]);
        assert_eq!(h.encode(), raw);
    }

    #[test]
    fn admin_settings_decode() {
        let raw = hex("070507070905040412000000");
        let a = AdminSettings::decode(&raw).unwrap();
        assert_eq!(a.et, [7, 5, 7, 7, 9, 5, 4, 4, 18]);
        assert_eq!(a.zero, [0, 0, 0]);
        assert_eq!(a.encode(), raw);
    }

    #[test]
    fn admin_settings_wrong_length() {
        assert!(matches!(
            AdminSettings::decode(&hex("0705")).unwrap_err(),
            DecodeError::TruncatedRecord { .. }
        ));
        assert!(matches!(
            AdminSettings::decode(&hex("07050707090504041200000000")).unwrap_err(),
            DecodeError::TrailingBytes { remaining: 1 }
        ));
    }

    // ---------------------------------------------------------------
    // RecordMeta -- the full 71-byte layout, against the captured trace
    // ---------------------------------------------------------------

    #[test]
    fn record_decode_trace() {
        let raw = record_bytes();
        assert_eq!(raw.len(), RecordMeta::WIRE_LEN);

        let meta = RecordMeta::decode(&raw).unwrap();
        assert_eq!(
            meta.datetime,
            DateTime {
                year: 2021,
                month: 6,
                day: 29,
                hour: 20,
                minute: 36,
                second: 46,
            }
        );
        assert_eq!(meta.failure, 0);
        assert_eq!(meta.loss, 1);
        assert_eq!(meta.angles, [0, 0, 0]);
        assert_eq!(meta.face_quality, 1);
        assert_eq!(meta.coordinates, [0u16; 12]);
        assert_eq!(
            meta.settings.data,
            [0, 0, 100, 30, 1, 20, 12, 20, 40, 30, 1, 0, 40, 140, 130, 0]
        );
        assert_eq!(meta.face_detection, 1);
        assert_eq!(meta.angle_detection, 1);
        assert_eq!(meta.autofocus, 0);
        assert_eq!(meta.admin.et, [7, 5, 7, 7, 9, 5, 4, 4, 18]);
        assert_eq!(meta.admin.zero, [0, 0, 0]);
        assert_eq!(meta.charge, 85);
        assert_eq!(meta.image_len, 0);
        assert_eq!(meta.image_handle, 169);
    }

    #[test]
    fn record_round_trip() {
        let raw = record_bytes();
        assert_eq!(RecordMeta::decode(&raw).unwrap().encode(), raw);
    }

    #[test]
    fn record_truncated() {
        let raw = record_bytes();
        // A short blob must fail at whatever field runs dry, at every length.
        for len in 1..raw.len() {
            assert!(
                matches!(
                    RecordMeta::decode(&raw[..len]).unwrap_err(),
                    DecodeError::TruncatedRecord { .. }
                ),
                "length {len}"
            );
        }
    }

    #[test]
    fn record_trailing_bytes() {
        let mut raw = record_bytes();
        raw.push(0x00);
        assert_eq!(
            RecordMeta::decode(&raw).unwrap_err(),
            DecodeError::TrailingBytes { remaining: 1 }
        );
    }

    #[test]
    fn record_empty() {
        assert_eq!(RecordMeta::decode(&[]).unwrap_err(), DecodeError::Empty);
    }

    // ---------------------------------------------------------------
    // Counters
    // ---------------------------------------------------------------

    #[test]
    fn counter_widths() {
        assert_eq!(decode_counter(&[0x05]).unwrap(), 5);
        assert_eq!(decode_counter(&[0x00, 0x05]).unwrap(), 5);
        assert_eq!(decode_counter(&[0x01, 0x00]).unwrap(), 256);
        assert_eq!(decode_counter(&[0x00, 0x00, 0x01, 0x00]).unwrap(), 256);
    }

    #[test]
    fn counter_empty() {
        assert_eq!(decode_counter(&[]).unwrap_err(), DecodeError::Empty);
    }

    #[test]
    fn counter_too_wide() {
        let err = decode_counter(&[0u8; 9]).unwrap_err();
        assert_eq!(err, DecodeError::TrailingBytes { remaining: 1 });
    }
}
