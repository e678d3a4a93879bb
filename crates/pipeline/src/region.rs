// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! Per-cycle region and result types, and multi-region aggregation.
//!
//! Everything here is fixed-size: text lives in inline [`BoundedText`]
//! buffers and regions in a [`DetectedRegions`] array, so a cycle never
//! touches the heap.

use crate::config::MAX_REGIONS;
use accelerator::RegionRecord;
use std::fmt;

/// Longest text kept for one region.
pub const REGION_TEXT_BYTES: usize = 64;
/// Longest aggregated text for one cycle.
pub const CYCLE_TEXT_BYTES: usize = 256;

/// UTF-8 text in an inline buffer of `N` bytes.
#[derive(Clone, Copy, PartialEq, Eq)]
pub struct BoundedText<const N: usize> {
    buf: [u8; N],
    len: usize,
}

impl<const N: usize> BoundedText<N> {
    pub const fn new() -> Self {
        Self { buf: [0; N], len: 0 }
    }

    /// Appends as much of `s` as fits without splitting a character.
    /// Returns `false` if anything was cut.
    pub fn push_str(&mut self, s: &str) -> bool {
        let room = N - self.len;
        let mut take = s.len().min(room);
        while !s.is_char_boundary(take) {
            take -= 1;
        }
        self.buf[self.len..self.len + take].copy_from_slice(&s.as_bytes()[..take]);
        self.len += take;
        take == s.len()
    }

    pub fn as_str(&self) -> &str {
        // Only whole characters are ever copied in.
        std::str::from_utf8(&self.buf[..self.len]).unwrap_or_default()
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn clear(&mut self) {
        self.len = 0;
    }
}

impl<const N: usize> Default for BoundedText<N> {
    fn default() -> Self {
        Self::new()
    }
}

impl<const N: usize> fmt::Debug for BoundedText<N> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self.as_str(), f)
    }
}

impl<const N: usize> fmt::Display for BoundedText<N> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl<const N: usize> serde::Serialize for BoundedText<N> {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

/// Script of the recognized text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, serde::Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Language {
    Japanese,
    English,
    Mixed,
    #[default]
    Unknown,
}

impl Language {
    /// Classifies by the presence of kana/kanji and Latin letters.
    pub fn detect(text: &str) -> Self {
        let mut japanese = false;
        let mut latin = false;
        for c in text.chars() {
            match c {
                '\u{3040}'..='\u{30FF}' | '\u{4E00}'..='\u{9FFF}' | '\u{FF66}'..='\u{FF9F}' => {
                    japanese = true
                }
                c if c.is_ascii_alphabetic() => latin = true,
                _ => {}
            }
        }
        match (japanese, latin) {
            (true, true) => Language::Mixed,
            (true, false) => Language::Japanese,
            (false, true) => Language::English,
            (false, false) => Language::Unknown,
        }
    }
}

/// The regions reported by one detection pass, capped at [`MAX_REGIONS`].
#[derive(Debug, Clone, Copy)]
pub struct DetectedRegions {
    regions: [Option<RegionRecord>; MAX_REGIONS],
    len: usize,
    /// Regions the accelerator reported beyond the cap.
    dropped: usize,
}

impl DetectedRegions {
    pub const fn new() -> Self {
        Self {
            regions: [None; MAX_REGIONS],
            len: 0,
            dropped: 0,
        }
    }

    /// Collects at most `limit` regions (never more than [`MAX_REGIONS`]).
    pub fn collect(iter: impl IntoIterator<Item = RegionRecord>, limit: usize) -> Self {
        let limit = limit.min(MAX_REGIONS);
        let mut out = Self::new();
        for region in iter {
            if out.len < limit {
                out.regions[out.len] = Some(region);
                out.len += 1;
            } else {
                out.dropped += 1;
            }
        }
        out
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn dropped(&self) -> usize {
        self.dropped
    }

    pub fn iter(&self) -> impl Iterator<Item = &RegionRecord> {
        self.regions[..self.len].iter().flatten()
    }
}

impl Default for DetectedRegions {
    fn default() -> Self {
        Self::new()
    }
}

/// Text read from one region.
#[derive(Debug, Clone, Copy, PartialEq, serde::Serialize)]
pub struct RecognitionResult {
    pub text: BoundedText<REGION_TEXT_BYTES>,
    pub confidence: f32,
}

impl RecognitionResult {
    pub fn new(text: &str, confidence: f32) -> Self {
        let mut bounded = BoundedText::new();
        bounded.push_str(text);
        Self {
            text: bounded,
            confidence,
        }
    }
}

/// The aggregated output of one cycle, handed to the result sink.
#[derive(Debug, Clone, Copy, PartialEq, serde::Serialize)]
pub struct CycleResult {
    /// Accepted region texts joined by single spaces.
    pub text: BoundedText<CYCLE_TEXT_BYTES>,
    /// Mean confidence over accepted regions.
    pub confidence: f32,
    /// Unicode scalar values in `text`.
    pub char_count: usize,
    pub word_count: usize,
    /// Accepted regions.
    pub region_count: usize,
    /// Regions reported by detection.
    pub detected_count: usize,
    pub language: Language,
    pub frame_id: u64,
    /// Microseconds since the orchestrator started.
    pub timestamp_us: u64,
}

impl CycleResult {
    /// Accepted regions as a percentage of detected ones.
    pub fn accuracy_percent(&self) -> f32 {
        if self.detected_count == 0 {
            return 0.0;
        }
        self.region_count as f32 * 100.0 / self.detected_count as f32
    }
}

/// Folds per-region recognition results into one [`CycleResult`].
#[derive(Debug, Clone)]
pub struct Aggregator {
    min_confidence: f32,
    text: BoundedText<CYCLE_TEXT_BYTES>,
    confidence_sum: f64,
    accepted: usize,
    offered: usize,
    truncated: bool,
}

impl Aggregator {
    pub fn new(min_confidence: f32) -> Self {
        Self {
            min_confidence,
            text: BoundedText::new(),
            confidence_sum: 0.0,
            accepted: 0,
            offered: 0,
            truncated: false,
        }
    }

    /// Accepts `result` if its confidence is strictly above the minimum.
    pub fn offer(&mut self, result: &RecognitionResult) -> bool {
        self.offered += 1;
        let above = result.confidence > self.min_confidence;
        if !above {
            return false;
        }
        if self.accepted > 0 {
            self.truncated |= !self.text.push_str(" ");
        }
        self.truncated |= !self.text.push_str(result.text.as_str());
        self.confidence_sum += result.confidence as f64;
        self.accepted += 1;
        true
    }

    pub fn accepted(&self) -> usize {
        self.accepted
    }

    /// Whether the joined text hit the length bound.
    pub fn truncated(&self) -> bool {
        self.truncated
    }

    /// Builds the cycle result, or `None` if no region was accepted.
    pub fn finish(self, detected_count: usize, frame_id: u64, timestamp_us: u64) -> Option<CycleResult> {
        if self.accepted == 0 {
            return None;
        }
        let text = self.text.as_str();
        Some(CycleResult {
            char_count: text.chars().count(),
            word_count: text.split_whitespace().count(),
            language: Language::detect(text),
            text: self.text,
            confidence: (self.confidence_sum / self.accepted as f64) as f32,
            region_count: self.accepted,
            detected_count: detected_count.max(self.offered),
            frame_id,
            timestamp_us,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use accelerator::Orientation;

    #[test]
    fn test_bounded_text_truncates_on_char_boundary() {
        let mut t = BoundedText::<8>::new();
        assert!(t.push_str("abc"));
        // "日本" is 6 bytes; only one 3-byte char fits in the remaining 5.
        assert!(!t.push_str("日本"));
        assert_eq!(t.as_str(), "abc日");
        assert_eq!(t.len(), 6);
        assert!(!t.push_str("xyz"));
        assert_eq!(t.as_str(), "abc日xy");
        t.clear();
        assert!(t.is_empty());
    }

    #[test]
    fn test_language_detection() {
        assert_eq!(Language::detect("出口"), Language::Japanese);
        assert_eq!(Language::detect("カタカナ"), Language::Japanese);
        assert_eq!(Language::detect("EXIT"), Language::English);
        assert_eq!(Language::detect("出口 EXIT"), Language::Mixed);
        assert_eq!(Language::detect("123 !"), Language::Unknown);
    }

    #[test]
    fn test_aggregation_filters_and_averages() {
        let mut agg = Aggregator::new(0.5);
        assert!(agg.offer(&RecognitionResult::new("A", 0.92)));
        assert!(!agg.offer(&RecognitionResult::new("B", 0.40)));
        assert!(agg.offer(&RecognitionResult::new("C", 0.97)));

        let result = agg.finish(3, 1, 0).unwrap();
        assert_eq!(result.region_count, 2);
        assert!((result.confidence - 0.945).abs() < 1e-6);
        assert_eq!(result.text.as_str(), "A C");
        assert_eq!(result.word_count, 2);
        assert_eq!(result.char_count, 3);
        assert!((result.accuracy_percent() - 66.666_67).abs() < 1e-3);
    }

    #[test]
    fn test_threshold_is_strict() {
        let mut agg = Aggregator::new(0.5);
        assert!(!agg.offer(&RecognitionResult::new("edge", 0.5)));
        assert!(agg.finish(1, 0, 0).is_none());
    }

    #[test]
    fn test_nan_confidence_rejected() {
        let mut agg = Aggregator::new(0.5);
        assert!(!agg.offer(&RecognitionResult::new("x", f32::NAN)));
    }

    #[test]
    fn test_joined_text_is_bounded() {
        let mut agg = Aggregator::new(0.0);
        let chunk = "x".repeat(REGION_TEXT_BYTES);
        for _ in 0..MAX_REGIONS {
            agg.offer(&RecognitionResult::new(&chunk, 0.9));
        }
        assert!(agg.truncated());
        let result = agg.finish(MAX_REGIONS, 0, 0).unwrap();
        assert_eq!(result.text.len(), CYCLE_TEXT_BYTES);
        assert_eq!(result.region_count, MAX_REGIONS);
    }

    #[test]
    fn test_detected_regions_cap() {
        let r = RegionRecord {
            x: 0,
            y: 0,
            width: 1,
            height: 1,
            confidence: 0.9,
            orientation: Orientation::Horizontal,
        };
        let regions = DetectedRegions::collect(std::iter::repeat(r).take(20), 16);
        assert_eq!(regions.len(), 16);
        assert_eq!(regions.dropped(), 4);
        assert_eq!(regions.iter().count(), 16);

        let regions = DetectedRegions::collect(std::iter::repeat(r).take(5), 2);
        assert_eq!(regions.len(), 2);
    }

    #[test]
    fn test_result_serializes_text_as_string() {
        let mut agg = Aggregator::new(0.5);
        agg.offer(&RecognitionResult::new("出口", 0.97));
        let result = agg.finish(1, 9, 1234).unwrap();
        let json = serde_json::to_value(result).unwrap();
        assert_eq!(json["text"], "出口");
        assert_eq!(json["language"], "japanese");
        assert_eq!(json["frame_id"], 9);
    }
}
