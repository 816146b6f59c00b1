use std::marker::PhantomData;
use std::ops::Deref;
use std::path::Path;
use std::sync::Arc;

use crate::config::IoConfig;
use crate::error::{Check, Error, Result};
use crate::item::{Item, decode};
use crate::partition::partition;
use crate::runtime::{IoRuntime, OpenMode};
use crate::session::{FileSession, Geometry};
use crate::transfer::read_segmented;

/// Reads this participant's share of a flat file of `T` items.
///
/// All participants of a group derive the same layout from the file size
/// alone, so reads need no communication.
#[derive(Debug)]
pub struct ParallelReader<T: Item, R: IoRuntime> {
    session: FileSession<R>,
    config: IoConfig,
    _item: PhantomData<T>,
}

impl<T: Item, R: IoRuntime> ParallelReader<T, R> {
    /// Opens `file_name` read-only, taking identity from the runtime.
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
            OpenMode::ReadOnly,
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

    /// Reads this participant's whole chunk.
    pub async fn read_chunk(&mut self) -> Result<Vec<T>> {
        self.read_extended(0).await
    }

    /// Reads this participant's chunk plus up to `extras` items of the next
    /// participant's chunk, so a match straddling the boundary is visible
    /// to the lower participant. The last participant gets no extras.
    pub async fn read_chunk_plus(&mut self, extras: u64) -> Result<Vec<T>> {
        self.read_extended(extras).await
    }

    pub async fn close(self) -> Result<()> {
        self.session.close().await
    }

    async fn read_extended(&mut self, extras: u64) -> Result<Vec<T>> {
        let handle = self.session.handle()?;
        let runtime = Arc::clone(&self.session.runtime);

        let file_size = runtime.get_size(handle).await.check("get_size")?;
        let data_bytes = if T::SIZE == 1 && self.config.single_byte_trailer {
            file_size.saturating_sub(1)
        } else {
            file_size
        };
        let total_items = data_bytes / T::SIZE as u64;

        let range = partition(self.session.ordinal, self.session.group_size, total_items)?
            .with_look_ahead(extras, self.session.is_last(), total_items);
        let geometry = Geometry::new(range, T::SIZE, file_size, total_items);
        self.session.set_geometry(geometry);

        let byte_len = usize::try_from(geometry.chunk_size)
            .ok()
            .and_then(|items| items.checked_mul(T::SIZE))
            .ok_or_else(|| {
                Error::Config(format!(
                    "chunk of {} items does not fit in memory",
                    geometry.chunk_size
                ))
            })?;
        let mut bytes = vec![0u8; byte_len];
        read_segmented(
            &*runtime,
            handle,
            geometry.first_byte_offset,
            &mut bytes,
            T::TAG,
            self.config.max_items_per_call,
        )
        .await?;

        Ok(decode(&bytes))
    }
}

impl<T: Item, R: IoRuntime> Deref for ParallelReader<T, R> {
    type Target = FileSession<R>;

    fn deref(&self) -> &FileSession<R> {
        &self.session
    }
}
