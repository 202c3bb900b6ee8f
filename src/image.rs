//! Splice-image transfer: part reassembly and run-length decoding.
//!
//! When a record reply carries a nonzero `image_len`, the device follows it
//! with a burst of [`GetRecordImg`](crate::opcode::Opcode::GetRecordImg)
//! frames. Each part body is `[handle][total][part][data...]`; parts tagged
//! with the record's `image_handle` are concatenated in arrival order until
//! `part >= total`.
//!
//! The assembled buffer is a binary run-length encoding: big-endian 16-bit
//! words where the high bit selects the pixel value (set means white, 0xff)
//! and the low 15 bits are the run length. A decoded image is always exactly
//! [`IMAGE_WIDTH`] x [`IMAGE_HEIGHT`] one-byte pixels.

use crate::error::DecodeError;

/// Decoded splice image width in pixels.
pub const IMAGE_WIDTH: usize = 640;

/// Decoded splice image height in pixels.
pub const IMAGE_HEIGHT: usize = 480;

/// One part of a splice image, borrowed from a frame payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ImagePart<'a> {
    /// The image this part belongs to (matches `RecordMeta::image_handle`).
    pub handle: u8,
    /// Total number of parts in this image.
    pub total: u8,
    /// This part's 1-based sequence number.
    pub part: u8,
    /// Compressed image data carried by this part.
    pub data: &'a [u8],
}

impl<'a> ImagePart<'a> {
    /// Split an image-part payload into its header fields and data.
    pub fn decode(payload: &'a [u8]) -> Result<Self, DecodeError> {
        if payload.len() < 3 {
            return Err(DecodeError::TruncatedImage(payload.len()));
        }
        Ok(ImagePart {
            handle: payload[0],
            total: payload[1],
            part: payload[2],
            data: &payload[3..],
        })
    }

    /// Whether this is the final part of its image.
    pub fn is_last(&self) -> bool {
        self.part >= self.total
    }
}

/// Expand a run-length-encoded splice image into raw pixels.
///
/// Fails with [`DecodeError::TruncatedImage`] if the compressed buffer ends
/// mid-word and [`DecodeError::ImageSize`] if the runs do not expand to
/// exactly one full image.
pub fn decode_image(compressed: &[u8]) -> Result<Vec<u8>, DecodeError> {
    if compressed.len() % 2 != 0 {
        return Err(DecodeError::TruncatedImage(compressed.len()));
    }

    let expected = IMAGE_WIDTH * IMAGE_HEIGHT;
    let mut pixels = Vec::with_capacity(expected);
    for word in compressed.chunks_exact(2) {
        let word = u16::from_be_bytes([word[0], word[1]]);
        let value = if word & 0x8000 != 0 { 0xff } else { 0x00 };
        let run = usize::from(word & 0x7fff);
        pixels.resize(pixels.len() + run, value);
    }

    if pixels.len() != expected {
        return Err(DecodeError::ImageSize {
            expected,
            found: pixels.len(),
        });
    }
    Ok(pixels)
}

#[cfg(test)]
mod tests {
    use super::*;

    // ---------------------------------------------------------------
    // Part headers
    // ---------------------------------------------------------------

    #[test]
    fn part_decode() {
        let payload = [0xa9, 0x03, 0x01, 0xde, 0xad];
        let part = ImagePart::decode(&payload).unwrap();
        assert_eq!(part.handle, 0xa9);
        assert_eq!(part.total, 3);
        assert_eq!(part.part, 1);
        assert_eq!(part.data, [0xde, 0xad]);
        assert!(!part.is_last());
    }

    #[test]
    fn part_last() {
        let part = ImagePart::decode(&[0xa9, 0x03, 0x03]).unwrap();
        assert!(part.is_last());
        assert!(part.data.is_empty());
    }

    #[test]
    fn part_too_short() {
        assert_eq!(
            ImagePart::decode(&[0xa9, 0x03]).unwrap_err(),
            DecodeError::TruncatedImage(2)
        );
    }

    // ---------------------------------------------------------------
    // Run-length decoding
    // ---------------------------------------------------------------

    /// Encode runs of (white?, length) words, the inverse of decode_image.
    fn rle(runs: &[(bool, u16)]) -> Vec<u8> {
        let mut out = Vec::new();
        for &(white, len) in runs {
            let word = if white { 0x8000 | len } else { len };
            out.extend(word.to_be_bytes());
        }
        out
    }

    #[test]
    fn image_all_black() {
        // 640 * 480 = 307_200 = 9 * 0x7fff + 12_297.
        let mut runs = vec![(false, 0x7fff); 9];
        runs.push((false, 12_297));
        let pixels = decode_image(&rle(&runs)).unwrap();
        assert_eq!(pixels.len(), IMAGE_WIDTH * IMAGE_HEIGHT);
        assert!(pixels.iter().all(|&p| p == 0x00));
    }

    #[test]
    fn image_mixed_runs() {
        let mut runs = vec![(true, 100u16), (false, 200), (true, 0x7fff)];
        // Fill the remainder with max-length black runs.
        let mut left = IMAGE_WIDTH * IMAGE_HEIGHT - (100 + 200 + 0x7fff);
        while left > 0 {
            let n = left.min(0x7fff);
            runs.push((false, n as u16));
            left -= n;
        }
        let pixels = decode_image(&rle(&runs)).unwrap();
        assert_eq!(pixels.len(), IMAGE_WIDTH * IMAGE_HEIGHT);
        assert!(pixels[..100].iter().all(|&p| p == 0xff));
        assert!(pixels[100..300].iter().all(|&p| p == 0x00));
        assert!(pixels[300..300 + 0x7fff].iter().all(|&p| p == 0xff));
        assert!(pixels[300 + 0x7fff..].iter().all(|&p| p == 0x00));
    }

    #[test]
    fn image_odd_length_rejected() {
        assert_eq!(
            decode_image(&[0x80]).unwrap_err(),
            DecodeError::TruncatedImage(1)
        );
    }

    #[test]
    fn image_wrong_total_rejected() {
        // A single short run cannot fill the frame.
        let err = decode_image(&rle(&[(false, 10)])).unwrap_err();
        assert_eq!(
            err,
            DecodeError::ImageSize {
                expected: IMAGE_WIDTH * IMAGE_HEIGHT,
                found: 10,
            }
        );
    }

    #[test]
    fn image_overlong_rejected() {
        let mut runs = vec![(false, 0x7fff); 10];
        runs.push((false, 1));
        assert!(matches!(
            decode_image(&rle(&runs)).unwrap_err(),
            DecodeError::ImageSize { .. }
        ));
    }

    #[test]
    fn image_empty_input_rejected() {
        assert!(matches!(
            decode_image(&[]).unwrap_err(),
            DecodeError::ImageSize { found: 0, .. }
        ));
    }
}
