use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::bootstrap::Role;
use crate::error::{Check, Error, Result};
use crate::partition::PartitionRange;
use crate::runtime::{FileHandle, IoRuntime, OpenMode};

pub mod reader;
pub mod writer;

/// Layout of one participant's chunk, derived by its last read or write.
///
/// Every field is zero until that operation has run.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Geometry {
    /// Size of the file in bytes.
    pub file_size: u64,
    /// Number of items in the file (or being written to it).
    pub total_items: u64,
    /// Number of items this participant transfers.
    pub chunk_size: u64,
    pub first_item_offset: u64,
    pub first_byte_offset: u64,
}

impl Geometry {
    pub fn new(range: PartitionRange, item_size: usize, file_size: u64, total_items: u64) -> Self {
        Self {
            file_size,
            total_items,
            chunk_size: range.len(),
            first_item_offset: range.start,
            first_byte_offset: range.start * item_size as u64,
        }
    }
}

/// An open file plus this participant's identity and chunk geometry.
///
/// Readers and writers wrap a session; the session itself never moves data.
#[derive(Debug)]
pub struct FileSession<R: IoRuntime> {
    runtime: Arc<R>,
    handle: Option<FileHandle>,
    ordinal: usize,
    group_size: usize,
    item_size: usize,
    file_name: PathBuf,
    geometry: Geometry,
    role: Role,
}

impl<R: IoRuntime> FileSession<R> {
    pub(crate) async fn open(
        runtime: Arc<R>,
        file_name: &Path,
        mode: OpenMode,
        item_size: usize,
        ordinal: usize,
        group_size: usize,
    ) -> Result<Self> {
        if group_size == 0 {
            return Err(Error::Config("group size must be positive".into()));
        }
        if ordinal >= group_size {
            return Err(Error::Config(format!(
                "ordinal {ordinal} is outside a group of {group_size}"
            )));
        }

        let role = runtime.bootstrap().ensure(&*runtime, ordinal).await?;
        let handle = match runtime.open(file_name, mode).await.check("open") {
            Ok(handle) => handle,
            Err(err) => {
                if let Err(release) = runtime.bootstrap().release(&*runtime, role) {
                    tracing::warn!(ordinal, %release, "releasing bootstrap role after failed open");
                }
                return Err(err);
            }
        };
        tracing::debug!(
            ordinal,
            group_size,
            file = %file_name.display(),
            ?mode,
            "opened file session"
        );

        Ok(Self {
            runtime,
            handle: Some(handle),
            ordinal,
            group_size,
            item_size,
            file_name: file_name.to_path_buf(),
            geometry: Geometry::default(),
            role,
        })
    }

    pub fn ordinal(&self) -> usize {
        self.ordinal
    }

    pub fn group_size(&self) -> usize {
        self.group_size
    }

    pub fn is_last(&self) -> bool {
        self.ordinal + 1 == self.group_size
    }

    pub fn item_size(&self) -> usize {
        self.item_size
    }

    pub fn file_name(&self) -> &Path {
        &self.file_name
    }

    pub fn geometry(&self) -> Geometry {
        self.geometry
    }

    pub fn file_size(&self) -> u64 {
        self.geometry.file_size
    }

    pub fn total_items(&self) -> u64 {
        self.geometry.total_items
    }

    pub fn chunk_size(&self) -> u64 {
        self.geometry.chunk_size
    }

    pub fn first_item_offset(&self) -> u64 {
        self.geometry.first_item_offset
    }

    pub fn first_byte_offset(&self) -> u64 {
        self.geometry.first_byte_offset
    }

    pub fn runtime(&self) -> &R {
        &self.runtime
    }

    pub(crate) fn handle(&self) -> Result<FileHandle> {
        self.handle
            .ok_or_else(|| Error::Config(format!("{} is already closed", self.file_name.display())))
    }

    pub(crate) fn set_geometry(&mut self, geometry: Geometry) {
        tracing::debug!(ordinal = self.ordinal, ?geometry, "chunk geometry");
        self.geometry = geometry;
    }

    /// Closes the file. If this session initialized the runtime, this waits
    /// until every participant that joined the bootstrap has closed or dropped
    /// its session, then finalizes.
    pub async fn close(mut self) -> Result<()> {
        if let Some(handle) = self.handle.take() {
            self.runtime.close(handle).await.check("close")?;
        }
        let role = std::mem::replace(&mut self.role, Role::Skipped);
        self.runtime.bootstrap().teardown(&*self.runtime, role).await
    }
}

impl<R: IoRuntime> Drop for FileSession<R> {
    fn drop(&mut self) {
        if self.handle.is_some() {
            tracing::warn!(
                ordinal = self.ordinal,
                file = %self.file_name.display(),
                "file session dropped without close"
            );
        }
        let role = std::mem::replace(&mut self.role, Role::Skipped);
        if role != Role::Skipped {
            if let Err(err) = self.runtime.bootstrap().release(&*self.runtime, role) {
                tracing::warn!(ordinal = self.ordinal, %err, "releasing bootstrap role on drop");
            }
        }
    }
}
