//! Segment catalog loaded from a manifest.
//!
//! The catalog is the ordered, immutable list of segment descriptors
//! describing a whole asset. It resolves segment indices (including the
//! virtual init segment at `-1`) to inclusive byte ranges and presentation
//! times to segment indices.

use serde::Deserialize;
use std::fmt;

use crate::error::{Error, Result};
use crate::index::SegmentIndex;

// ---------------------------------------------------------------------------
// ByteRange
// ---------------------------------------------------------------------------

/// An inclusive byte range `[start, end]` within the source asset.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ByteRange {
    pub start: u64,
    pub end: u64,
}

impl ByteRange {
    /// Create a range. Callers guarantee `start <= end`.
    pub const fn new(start: u64, end: u64) -> Self {
        Self { start, end }
    }

    /// Number of bytes covered by the range.
    pub const fn len(&self) -> u64 {
        self.end - self.start + 1
    }

    /// Inclusive ranges always cover at least one byte.
    pub const fn is_empty(&self) -> bool {
        false
    }

    /// Value for an HTTP `Range` request header.
    pub fn header_value(&self) -> String {
        format!("bytes={}-{}", self.start, self.end)
    }
}

impl fmt::Display for ByteRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}", self.start, self.end)
    }
}

// ---------------------------------------------------------------------------
// SegmentDescriptor
// ---------------------------------------------------------------------------

/// One entry of the catalog.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SegmentDescriptor {
    /// Position in the catalog, 0-based.
    pub index: usize,
    /// First byte of the segment (inclusive).
    pub byte_start: u64,
    /// Last byte of the segment (inclusive).
    pub byte_end: u64,
    /// Presentation start time in milliseconds.
    pub time_start_ms: u64,
    /// Presentation end time in milliseconds.
    pub time_end_ms: u64,
}

impl SegmentDescriptor {
    /// Whether `seconds` falls within `[time_start, time_end]`, inclusive on
    /// both bounds.
    pub fn contains_time(&self, seconds: f64) -> bool {
        let start = self.time_start_ms as f64 / 1000.0;
        let end = self.time_end_ms as f64 / 1000.0;
        seconds >= start && seconds <= end
    }
}

// ---------------------------------------------------------------------------
// Wire format
// ---------------------------------------------------------------------------

/// A descriptor as it appears in the manifest document.
#[derive(Debug, Clone, Deserialize)]
struct SegmentRecord {
    #[serde(rename = "Start")]
    start: u64,
    #[serde(rename = "End")]
    end: u64,
    #[serde(rename = "StartTime")]
    start_time: u64,
    #[serde(rename = "EndTime")]
    end_time: u64,
}

#[derive(Debug, Deserialize)]
struct ManifestRecord {
    #[serde(rename = "Duration", default)]
    duration: Option<u64>,
    #[serde(rename = "Bitrate", default)]
    bitrate: Option<u64>,
    #[serde(rename = "Segments", default)]
    segments: Option<Vec<SegmentRecord>>,
}

/// Manifests are served either as a full document or as a bare segment list.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum ManifestDocument {
    Full(ManifestRecord),
    Bare(Vec<SegmentRecord>),
}

// ---------------------------------------------------------------------------
// Catalog
// ---------------------------------------------------------------------------

/// Ordered, immutable list of segment descriptors.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Catalog {
    segments: Vec<SegmentDescriptor>,
    duration_ms: Option<u64>,
    bitrate: Option<u64>,
}

impl Catalog {
    /// Build a catalog from `(byte_start, byte_end, time_start_ms, time_end_ms)`
    /// tuples. Indices are assigned from position.
    pub fn from_ranges(entries: impl IntoIterator<Item = (u64, u64, u64, u64)>) -> Self {
        let segments = entries
            .into_iter()
            .enumerate()
            .map(
                |(index, (byte_start, byte_end, time_start_ms, time_end_ms))| SegmentDescriptor {
                    index,
                    byte_start,
                    byte_end,
                    time_start_ms,
                    time_end_ms,
                },
            )
            .collect();

        Self {
            segments,
            duration_ms: None,
            bitrate: None,
        }
    }

    /// Parse a manifest document.
    ///
    /// Accepts either `{"Duration": .., "Bitrate": .., "Segments": [..]}` or
    /// a bare array of segments. Only JSON shape is checked; an `Index` field
    /// on a segment is ignored in favour of its position.
    pub fn from_json(json_str: &str) -> Result<Self> {
        let document: ManifestDocument = serde_json::from_str(json_str)
            .map_err(|e| Error::Manifest(format!("manifest parse error: {e}")))?;

        let (records, duration_ms, bitrate) = match document {
            ManifestDocument::Full(m) => (m.segments.unwrap_or_default(), m.duration, m.bitrate),
            ManifestDocument::Bare(records) => (records, None, None),
        };

        let mut catalog = Self::from_ranges(
            records
                .into_iter()
                .map(|r| (r.start, r.end, r.start_time, r.end_time)),
        );
        catalog.duration_ms = duration_ms;
        catalog.bitrate = bitrate;

        tracing::debug!(
            segments = catalog.len(),
            duration_ms = ?catalog.duration_ms,
            "Parsed segment catalog"
        );

        Ok(catalog)
    }

    pub fn len(&self) -> usize {
        self.segments.len()
    }

    pub fn is_empty(&self) -> bool {
        self.segments.is_empty()
    }

    /// Look up a cataloged segment. The init segment has no descriptor.
    pub fn get(&self, index: SegmentIndex) -> Option<&SegmentDescriptor> {
        index.as_position().and_then(|i| self.segments.get(i))
    }

    pub fn iter(&self) -> impl Iterator<Item = &SegmentDescriptor> {
        self.segments.iter()
    }

    /// Total duration advertised by the manifest, if any.
    pub fn duration_ms(&self) -> Option<u64> {
        self.duration_ms
    }

    /// Bitrate advertised by the manifest, if any.
    pub fn bitrate(&self) -> Option<u64> {
        self.bitrate
    }

    /// Resolve a segment index to the byte range that must be fetched.
    ///
    /// The init segment covers `[0, first.byte_start - 1]`. Any index outside
    /// `[-1, len)`, or an init segment with no bytes before the first
    /// descriptor, is [`Error::OutOfRange`].
    pub fn byte_range(&self, index: SegmentIndex) -> Result<ByteRange> {
        let out_of_range = || Error::OutOfRange {
            index,
            len: self.len(),
        };

        if index.is_init() {
            let first = self.segments.first().ok_or_else(out_of_range)?;
            if first.byte_start == 0 {
                return Err(out_of_range());
            }
            return Ok(ByteRange::new(0, first.byte_start - 1));
        }

        let segment = self.get(index).ok_or_else(out_of_range)?;
        if segment.byte_end < segment.byte_start {
            return Err(Error::Manifest(format!(
                "segment {index} has inverted byte range {}-{}",
                segment.byte_start, segment.byte_end
            )));
        }

        Ok(ByteRange::new(segment.byte_start, segment.byte_end))
    }

    /// Find the first segment, in index order, whose time span contains
    /// `seconds`.
    pub fn find_by_time(&self, seconds: f64) -> Option<SegmentIndex> {
        self.segments
            .iter()
            .find(|s| s.contains_time(seconds))
            .map(|s| SegmentIndex::from(s.index))
    }
}
