//! Typed segment index.
//!
//! A [`SegmentIndex`] is a signed position in the catalog. The value `-1`
//! names the virtual initialization segment that precedes the first
//! cataloged segment; values past the end of the catalog are representable
//! and only rejected when a byte range is resolved for them.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Position of a segment in the catalog, with `-1` for the init segment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SegmentIndex(i64);

impl SegmentIndex {
    /// The virtual initialization segment.
    pub const INIT: SegmentIndex = SegmentIndex(-1);

    /// The first cataloged segment.
    pub const FIRST: SegmentIndex = SegmentIndex(0);

    #[must_use]
    pub const fn new(value: i64) -> Self {
        Self(value)
    }

    /// Return the raw signed value.
    #[must_use]
    pub const fn get(self) -> i64 {
        self.0
    }

    #[must_use]
    pub const fn is_init(self) -> bool {
        self.0 == -1
    }

    /// The index that follows this one.
    #[must_use]
    pub const fn next(self) -> Self {
        Self(self.0.saturating_add(1))
    }

    /// Position in the catalog, if this names a cataloged segment.
    #[must_use]
    pub fn as_position(self) -> Option<usize> {
        usize::try_from(self.0).ok()
    }
}

impl Default for SegmentIndex {
    fn default() -> Self {
        Self::FIRST
    }
}

impl fmt::Display for SegmentIndex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_init() {
            f.write_str("init")
        } else {
            write!(f, "{}", self.0)
        }
    }
}

impl From<i64> for SegmentIndex {
    fn from(value: i64) -> Self {
        Self(value)
    }
}

impl From<usize> for SegmentIndex {
    fn from(value: usize) -> Self {
        Self(i64::try_from(value).unwrap_or(i64::MAX))
    }
}

impl From<SegmentIndex> for i64 {
    fn from(index: SegmentIndex) -> Self {
        index.0
    }
}
