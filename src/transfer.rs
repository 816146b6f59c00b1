use crate::error::{Check, Result};
use crate::item::ItemTag;
use crate::runtime::{FileHandle, IoRuntime};

/// One bounded runtime call within a larger transfer.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Segment {
    /// Offset of the first item of this call, relative to the transfer start.
    pub item_offset: u64,
    pub count: usize,
}

/// Splits `item_count` items into calls of at most `limit` items.
///
/// Full-size segments are emitted while more than `limit` items remain; the
/// rest always goes out as one final call, even when it is empty.
pub fn segments(item_count: u64, limit: usize) -> Segments {
    Segments {
        next_offset: 0,
        remaining: item_count,
        limit: limit.max(1) as u64,
        done: false,
    }
}

#[derive(Clone, Debug)]
pub struct Segments {
    next_offset: u64,
    remaining: u64,
    limit: u64,
    done: bool,
}

impl Iterator for Segments {
    type Item = Segment;

    fn next(&mut self) -> Option<Segment> {
        if self.done {
            return None;
        }
        let count = if self.remaining > self.limit {
            self.limit
        } else {
            self.done = true;
            self.remaining
        };
        let segment = Segment {
            item_offset: self.next_offset,
            count: count as usize,
        };
        self.next_offset += count;
        self.remaining -= count;
        Some(segment)
    }
}

/// Fills `buf` with items read from `base_offset`, one bounded call at a time.
///
/// Returns the number of items the runtime actually delivered; a short count
/// means the file ended early and the tail of `buf` is left untouched.
pub async fn read_segmented<R: IoRuntime + ?Sized>(
    runtime: &R,
    handle: FileHandle,
    base_offset: u64,
    buf: &mut [u8],
    tag: ItemTag,
    limit: usize,
) -> Result<u64> {
    let item_size = tag.size();
    let item_count = (buf.len() / item_size) as u64;
    let mut delivered = 0u64;

    for segment in segments(item_count, limit) {
        let start = segment.item_offset as usize * item_size;
        let end = start + segment.count * item_size;
        let offset = base_offset + segment.item_offset * item_size as u64;
        tracing::debug!(offset, count = segment.count, "read_at");
        let read = runtime
            .read_at(handle, offset, &mut buf[start..end], segment.count, tag)
            .await
            .check("read_at")?;
        delivered += read as u64;
    }

    if delivered < item_count {
        tracing::warn!(
            requested = item_count,
            delivered,
            base_offset,
            "short read; file ended before the requested range"
        );
    }
    Ok(delivered)
}

/// Writes every item in `buf` starting at `base_offset`, one bounded call at a time.
pub async fn write_segmented<R: IoRuntime + ?Sized>(
    runtime: &R,
    handle: FileHandle,
    base_offset: u64,
    buf: &[u8],
    tag: ItemTag,
    limit: usize,
) -> Result<()> {
    let item_size = tag.size();
    let item_count = (buf.len() / item_size) as u64;

    for segment in segments(item_count, limit) {
        let start = segment.item_offset as usize * item_size;
        let end = start + segment.count * item_size;
        let offset = base_offset + segment.item_offset * item_size as u64;
        tracing::debug!(offset, count = segment.count, "write_at");
        runtime
            .write_at(handle, offset, &buf[start..end], segment.count, tag)
            .await
            .check("write_at")?;
    }
    Ok(())
}
