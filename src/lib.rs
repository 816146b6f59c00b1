//! Balanced, deterministic partitioning of flat binary files across a group
//! of cooperating participants, with segmented reads and writes through a
//! distributed file-I/O runtime.
//!
//! Each participant opens the shared file, derives its own contiguous slice
//! with [`partition`], and moves only that slice. Reads need no
//! communication; writes agree on the file total with one collective sum.

mod bootstrap;
mod config;
mod error;
mod item;
mod partition;
mod session;
mod transfer;

pub mod runtime;

pub use bootstrap::{Bootstrap, Role};
pub use config::{IoConfig, MAX_ITEMS_PER_CALL, TRAILER_BYTE};
pub use error::{Error, OrAbort, Result};
pub use item::{Item, ItemTag};
pub use partition::{PartitionRange, partition};
pub use runtime::local::{LocalGroup, LocalRuntime};
pub use runtime::{ErrorClass, FileHandle, IoRuntime, OpenMode};
pub use session::reader::ParallelReader;
pub use session::writer::ParallelWriter;
pub use session::{FileSession, Geometry};
pub use transfer::{Segment, Segments, read_segmented, segments, write_segmented};
