use std::marker::PhantomData;
use std::ops::Deref;
use std::path::Path;
use std::sync::Arc;

use crate::config::{IoConfig, TRAILER_BYTE};
use crate::error::{Check, Result};
use crate::item::{Item, encode};
use crate::partition::partition;
use crate::runtime::{IoRuntime, OpenMode};
use crate::session::{FileSession, Geometry};
use crate::transfer::write_segmented;

/// Writes this participant's share of a flat file of `T` items.
#[derive(Debug)]
pub struct ParallelWriter<T: Item, R: IoRuntime> {
    session: FileSession<R>,
    config: IoConfig,
    _item: PhantomData<T>,
}

impl<T: Item, R: IoRuntime> ParallelWriter<T, R> {
    /// Opens (creating if needed) `file_name` write-only, taking identity from the runtime.
    pub async fn open(runtime: Arc<R>, file_name: impl AsRef<Path>, config: IoConfig) -> Result<Self> {
        let ordinal = runtime.group_rank();
        let group_size = runtime.group_size();
        Self::open_as(runtime, file_name, ordinal, group_size, config).await
    }

    pub async fn open_as(
        runtime: Arc<R>,
        file_name: impl AsRef<Path>,
        ordinal: usize,
        group_size: usize,
        config: IoConfig,
    ) -> Result<Self> {
        let session = FileSession::open(
            runtime,
            file_name.as_ref(),
            OpenMode::WriteOnlyCreate,
            T::SIZE,
            ordinal,
            group_size,
        )
        .await?;
        Ok(Self {
            session,
            config,
            _item: PhantomData,
        })
    }

    /// Replaces the file contents with every participant's `items`.
    ///
    /// Collective: every participant must call this exactly once per write
    /// pass. The file total is the sum of all local lengths, and each
    /// participant writes at the offset of its balanced partition of that
    /// total. `items.len()` must therefore equal the width `partition`
    /// assigns to this ordinal; otherwise chunks overlap or leave gaps.
    ///
    /// For single-byte items with `single_byte_trailer` on (the default), the
    /// last participant also writes one `TRAILER_BYTE` after the data, so
    /// `file_size()` is `total_items + 1`. Writers that expect the file to
    /// hold the data bytes only, with `file_size() == total_items`, must turn
    /// the trailer off.
    pub async fn write_chunk(&mut self, items: &[T]) -> Result<()> {
        let handle = self.session.handle()?;
        let runtime = Arc::clone(&self.session.runtime);

        runtime.set_size(handle, 0).await.check("set_size")?;

        let local = items.len() as u64;
        let total_items = runtime.reduce_sum(local).await.check("reduce_sum")?;

        let range = partition(self.session.ordinal, self.session.group_size, total_items)?;
        if range.len() != local {
            tracing::warn!(
                ordinal = self.session.ordinal,
                local,
                expected = range.len(),
                "local chunk differs from its balanced partition; output offsets will be inconsistent"
            );
        }

        let trailer = T::SIZE == 1 && self.config.single_byte_trailer;
        let data_bytes = total_items * T::SIZE as u64;
        let file_size = data_bytes + u64::from(trailer);
        let mut geometry = Geometry::new(range, T::SIZE, file_size, total_items);
        geometry.chunk_size = local;
        self.session.set_geometry(geometry);

        write_segmented(
            &*runtime,
            handle,
            geometry.first_byte_offset,
            &encode(items),
            T::TAG,
            self.config.max_items_per_call,
        )
        .await?;

        if trailer && self.session.is_last() {
            runtime
                .write_at(handle, data_bytes, &[TRAILER_BYTE], 1, T::TAG)
                .await
                .check("write_at")?;
        }
        Ok(())
    }

    pub async fn close(self) -> Result<()> {
        self.session.close().await
    }
}

impl<T: Item, R: IoRuntime> Deref for ParallelWriter<T, R> {
    type Target = FileSession<R>;

    fn deref(&self) -> &FileSession<R> {
        &self.session
    }
}
