//! The [`RangeSource`] trait: where segment bytes come from.

use async_trait::async_trait;
use bytes::Bytes;

use sp_core::{ByteRange, Error};

/// Asynchronously retrieves an inclusive byte range of the media asset.
///
/// Implementations must honour the partial-content contract: the returned
/// buffer holds exactly the bytes `range.start..=range.end`, or fewer if the
/// asset ends inside the range.
#[async_trait]
pub trait RangeSource: Send + Sync {
    /// A short name for log output (e.g. "http", "memory").
    fn name(&self) -> &'static str;

    /// Fetch the bytes covered by `range`.
    async fn fetch(&self, range: ByteRange) -> sp_core::Result<Bytes>;
}

/// Serves ranges from an asset held in memory.
#[derive(Debug, Clone)]
pub struct MemorySource {
    data: Bytes,
}

impl MemorySource {
    pub fn new(data: impl Into<Bytes>) -> Self {
        Self { data: data.into() }
    }
}

#[async_trait]
impl RangeSource for MemorySource {
    fn name(&self) -> &'static str {
        "memory"
    }

    async fn fetch(&self, range: ByteRange) -> sp_core::Result<Bytes> {
        let len = self.data.len() as u64;
        if range.start >= len {
            return Err(Error::transport(format!(
                "range {range} starts past end of {len}-byte asset"
            )));
        }

        let end = range.end.min(len - 1);
        Ok(self.data.slice(range.start as usize..=end as usize))
    }
}
