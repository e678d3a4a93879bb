// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! Output layouts written by the accelerator into caller-supplied buffers.
//!
//! All integers and floats are little-endian.
//!
//! # Detection output
//! ```text
//! ┌───────────┬──────────────────────────────────────────────┐
//! │ count u32 │ count × 16-byte region records               │
//! └───────────┴──────────────────────────────────────────────┘
//!
//! region record:
//!   0  x u16 │ 2  y u16 │ 4  width u16 │ 6  height u16
//!   8  confidence f32   │ 12 orientation u8 │ 13..16 zero
//! ```
//!
//! # Recognition output
//! ```text
//! ┌────────────────┬─────────┬──────────────────────┐
//! │ confidence f32 │ len u16 │ len bytes of UTF-8   │
//! └────────────────┴─────────┴──────────────────────┘
//! ```
//!
//! Parsers borrow the buffer and reject anything that does not match the
//! layout exactly, including confidences outside `[0, 1]`.

/// Bytes before the first region record.
pub const DETECTION_HEADER_LEN: usize = 4;
/// Size of one region record.
pub const REGION_RECORD_LEN: usize = 16;
/// Bytes before the recognized text.
pub const RECOGNITION_HEADER_LEN: usize = 6;
/// Longest text a recognition output may carry.
pub const MAX_RECOGNITION_TEXT: usize = 64;

/// Errors decoding or encoding accelerator output.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum WireError {
    #[error("output truncated: need {needed} bytes, got {got}")]
    Truncated { needed: usize, got: usize },

    #[error("output length {got} does not match the declared {expected}")]
    LengthMismatch { expected: usize, got: usize },

    #[error("confidence {0} outside [0, 1]")]
    InvalidConfidence(f32),

    #[error("unknown orientation tag {0}")]
    InvalidOrientation(u8),

    #[error("recognized text of {0} bytes exceeds the limit")]
    TextTooLong(usize),

    #[error("recognized text is not valid UTF-8")]
    InvalidUtf8,

    #[error("output buffer too small: need {needed} bytes, have {got}")]
    BufferTooSmall { needed: usize, got: usize },
}

/// Reading direction of a detected region.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Orientation {
    #[default]
    Horizontal,
    Vertical,
}

impl Orientation {
    fn from_tag(tag: u8) -> Result<Self, WireError> {
        match tag {
            0 => Ok(Orientation::Horizontal),
            1 => Ok(Orientation::Vertical),
            other => Err(WireError::InvalidOrientation(other)),
        }
    }

    fn tag(self) -> u8 {
        match self {
            Orientation::Horizontal => 0,
            Orientation::Vertical => 1,
        }
    }
}

/// One detected text region, in preprocessed-image pixels.
#[derive(Debug, Clone, Copy, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct RegionRecord {
    pub x: u16,
    pub y: u16,
    pub width: u16,
    pub height: u16,
    pub confidence: f32,
    pub orientation: Orientation,
}

fn check_confidence(confidence: f32) -> Result<f32, WireError> {
    if (0.0..=1.0).contains(&confidence) {
        Ok(confidence)
    } else {
        Err(WireError::InvalidConfidence(confidence))
    }
}

fn read_u16(bytes: &[u8], at: usize) -> u16 {
    u16::from_le_bytes([bytes[at], bytes[at + 1]])
}

fn read_f32(bytes: &[u8], at: usize) -> f32 {
    f32::from_le_bytes([bytes[at], bytes[at + 1], bytes[at + 2], bytes[at + 3]])
}

fn decode_region(record: &[u8]) -> Result<RegionRecord, WireError> {
    Ok(RegionRecord {
        x: read_u16(record, 0),
        y: read_u16(record, 2),
        width: read_u16(record, 4),
        height: read_u16(record, 6),
        confidence: check_confidence(read_f32(record, 8))?,
        orientation: Orientation::from_tag(record[12])?,
    })
}

/// A validated, borrowed detection output.
#[derive(Debug, Clone, Copy)]
pub struct DetectionOutput<'a> {
    records: &'a [u8],
}

impl<'a> DetectionOutput<'a> {
    /// Validates `bytes` as a complete detection output.
    pub fn parse(bytes: &'a [u8]) -> Result<Self, WireError> {
        if bytes.len() < DETECTION_HEADER_LEN {
            return Err(WireError::Truncated {
                needed: DETECTION_HEADER_LEN,
                got: bytes.len(),
            });
        }
        let count = u32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]) as usize;
        let expected = count
            .checked_mul(REGION_RECORD_LEN)
            .and_then(|n| n.checked_add(DETECTION_HEADER_LEN))
            .unwrap_or(usize::MAX);
        if bytes.len() != expected {
            return Err(WireError::LengthMismatch {
                expected,
                got: bytes.len(),
            });
        }

        let records = &bytes[DETECTION_HEADER_LEN..];
        for record in records.chunks_exact(REGION_RECORD_LEN) {
            decode_region(record)?;
        }
        Ok(Self { records })
    }

    pub fn len(&self) -> usize {
        self.records.len() / REGION_RECORD_LEN
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Regions in the order the accelerator reported them.
    pub fn regions(&self) -> impl Iterator<Item = RegionRecord> + 'a {
        self.records
            .chunks_exact(REGION_RECORD_LEN)
            .filter_map(|record| decode_region(record).ok())
    }
}

/// Writes `regions` as a detection output; returns the bytes written.
pub fn encode_detection(regions: &[RegionRecord], out: &mut [u8]) -> Result<usize, WireError> {
    let needed = DETECTION_HEADER_LEN + regions.len() * REGION_RECORD_LEN;
    if out.len() < needed {
        return Err(WireError::BufferTooSmall {
            needed,
            got: out.len(),
        });
    }

    out[..DETECTION_HEADER_LEN].copy_from_slice(&(regions.len() as u32).to_le_bytes());
    let body = &mut out[DETECTION_HEADER_LEN..needed];
    for (region, record) in regions.iter().zip(body.chunks_exact_mut(REGION_RECORD_LEN)) {
        record[0..2].copy_from_slice(&region.x.to_le_bytes());
        record[2..4].copy_from_slice(&region.y.to_le_bytes());
        record[4..6].copy_from_slice(&region.width.to_le_bytes());
        record[6..8].copy_from_slice(&region.height.to_le_bytes());
        record[8..12].copy_from_slice(&region.confidence.to_le_bytes());
        record[12] = region.orientation.tag();
        record[13..16].fill(0);
    }
    Ok(needed)
}

/// A validated, borrowed recognition output.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RecognitionOutput<'a> {
    pub confidence: f32,
    pub text: &'a str,
}

impl<'a> RecognitionOutput<'a> {
    pub fn parse(bytes: &'a [u8]) -> Result<Self, WireError> {
        if bytes.len() < RECOGNITION_HEADER_LEN {
            return Err(WireError::Truncated {
                needed: RECOGNITION_HEADER_LEN,
                got: bytes.len(),
            });
        }
        let confidence = check_confidence(read_f32(bytes, 0))?;
        let len = read_u16(bytes, 4) as usize;
        if len > MAX_RECOGNITION_TEXT {
            return Err(WireError::TextTooLong(len));
        }
        let text = &bytes[RECOGNITION_HEADER_LEN..];
        if text.len() != len {
            return Err(WireError::LengthMismatch {
                expected: RECOGNITION_HEADER_LEN + len,
                got: bytes.len(),
            });
        }
        let text = std::str::from_utf8(text).map_err(|_| WireError::InvalidUtf8)?;
        Ok(Self { confidence, text })
    }
}

/// Writes a recognition output; returns the bytes written.
pub fn encode_recognition(text: &str, confidence: f32, out: &mut [u8]) -> Result<usize, WireError> {
    if text.len() > MAX_RECOGNITION_TEXT {
        return Err(WireError::TextTooLong(text.len()));
    }
    let needed = RECOGNITION_HEADER_LEN + text.len();
    if out.len() < needed {
        return Err(WireError::BufferTooSmall {
            needed,
            got: out.len(),
        });
    }
    out[0..4].copy_from_slice(&confidence.to_le_bytes());
    out[4..6].copy_from_slice(&(text.len() as u16).to_le_bytes());
    out[RECOGNITION_HEADER_LEN..needed].copy_from_slice(text.as_bytes());
    Ok(needed)
}

/// Output buffer size that fits a detection of `max_regions` regions.
pub const fn detection_capacity(max_regions: usize) -> usize {
    DETECTION_HEADER_LEN + max_regions * REGION_RECORD_LEN
}

/// Number of region records a detection buffer of `len` bytes can carry.
pub const fn regions_fitting(len: usize) -> usize {
    len.saturating_sub(DETECTION_HEADER_LEN) / REGION_RECORD_LEN
}

/// Output buffer size that fits any recognition output.
pub const RECOGNITION_CAPACITY: usize = RECOGNITION_HEADER_LEN + MAX_RECOGNITION_TEXT;

#[cfg(test)]
mod tests {
    use super::*;

    fn region(confidence: f32) -> RegionRecord {
        RegionRecord {
            x: 10,
            y: 20,
            width: 100,
            height: 24,
            confidence,
            orientation: Orientation::Vertical,
        }
    }

    #[test]
    fn test_detection_layout() {
        let mut buf = [0u8; 64];
        let n = encode_detection(&[region(0.9), region(0.4)], &mut buf).unwrap();
        assert_eq!(n, 4 + 2 * 16);
        assert_eq!(&buf[0..4], &2u32.to_le_bytes());
        assert_eq!(buf[4 + 12], 1);

        let parsed = DetectionOutput::parse(&buf[..n]).unwrap();
        assert_eq!(parsed.len(), 2);
        let regions: Vec<_> = parsed.regions().collect();
        assert_eq!(regions[0], region(0.9));
        assert_eq!(regions[1].confidence, 0.4);
    }

    #[test]
    fn test_empty_detection() {
        let bytes = 0u32.to_le_bytes();
        let parsed = DetectionOutput::parse(&bytes).unwrap();
        assert!(parsed.is_empty());
        assert_eq!(parsed.regions().count(), 0);
    }

    #[test]
    fn test_detection_rejects_bad_lengths() {
        assert!(matches!(
            DetectionOutput::parse(&[1, 0]),
            Err(WireError::Truncated { .. })
        ));

        let mut buf = [0u8; 20];
        encode_detection(&[region(0.5)], &mut buf).unwrap();
        assert!(matches!(
            DetectionOutput::parse(&buf[..19]),
            Err(WireError::LengthMismatch { expected: 20, got: 19 })
        ));

        let huge = u32::MAX.to_le_bytes();
        assert!(matches!(
            DetectionOutput::parse(&huge),
            Err(WireError::LengthMismatch { .. })
        ));
    }

    #[test]
    fn test_detection_rejects_bad_fields() {
        let mut buf = [0u8; 20];
        encode_detection(&[region(1.5)], &mut buf).unwrap();
        assert_eq!(
            DetectionOutput::parse(&buf).unwrap_err(),
            WireError::InvalidConfidence(1.5)
        );

        encode_detection(&[region(0.5)], &mut buf).unwrap();
        buf[4 + 12] = 7;
        assert_eq!(
            DetectionOutput::parse(&buf).unwrap_err(),
            WireError::InvalidOrientation(7)
        );

        encode_detection(&[region(f32::NAN)], &mut buf).unwrap();
        assert!(DetectionOutput::parse(&buf).is_err());
    }

    #[test]
    fn test_recognition_layout() {
        let mut buf = [0u8; RECOGNITION_CAPACITY];
        let n = encode_recognition("出口 EXIT", 0.97, &mut buf).unwrap();
        let out = RecognitionOutput::parse(&buf[..n]).unwrap();
        assert_eq!(out.text, "出口 EXIT");
        assert_eq!(out.confidence, 0.97);
    }

    #[test]
    fn test_recognition_rejects_malformed() {
        let mut buf = [0u8; RECOGNITION_CAPACITY];
        let n = encode_recognition("abc", 0.5, &mut buf).unwrap();

        assert!(matches!(
            RecognitionOutput::parse(&buf[..n - 1]),
            Err(WireError::LengthMismatch { .. })
        ));

        buf[RECOGNITION_HEADER_LEN] = 0xFF;
        assert_eq!(
            RecognitionOutput::parse(&buf[..n]).unwrap_err(),
            WireError::InvalidUtf8
        );

        buf[4..6].copy_from_slice(&65u16.to_le_bytes());
        assert_eq!(
            RecognitionOutput::parse(&buf).unwrap_err(),
            WireError::TextTooLong(65)
        );
    }

    #[test]
    fn test_encoders_check_space() {
        let mut small = [0u8; 8];
        assert!(matches!(
            encode_detection(&[region(0.5)], &mut small),
            Err(WireError::BufferTooSmall { needed: 20, got: 8 })
        ));
        assert!(matches!(
            encode_recognition("toolong", 0.5, &mut small),
            Err(WireError::BufferTooSmall { .. })
        ));
        let long = "x".repeat(65);
        assert_eq!(
            encode_recognition(&long, 0.5, &mut [0u8; 128]).unwrap_err(),
            WireError::TextTooLong(65)
        );
    }
}
