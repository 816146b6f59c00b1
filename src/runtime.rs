use std::convert::Infallible;
use std::fmt;
use std::io;
use std::path::Path;

use async_trait::async_trait;

use crate::bootstrap::Bootstrap;
use crate::item::ItemTag;

pub mod local;

/// Outcome of a single runtime call.
pub type Status<T> = std::result::Result<T, ErrorClass>;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum OpenMode {
    ReadOnly,
    WriteOnlyCreate,
}

/// Opaque handle to a file opened through the runtime.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct FileHandle(pub u64);

/// Error classes reported by the runtime.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ErrorClass {
    File,
    NoSuchFile,
    Access,
    ReadOnly,
    Io,
    BadOffset,
    Count,
    NotInitialized,
    Other,
}

impl ErrorClass {
    pub fn description(self) -> &'static str {
        match self {
            ErrorClass::File => "invalid file handle",
            ErrorClass::NoSuchFile => "file does not exist",
            ErrorClass::Access => "permission denied",
            ErrorClass::ReadOnly => "file is read-only",
            ErrorClass::Io => "other I/O error",
            ErrorClass::BadOffset => "invalid file offset",
            ErrorClass::Count => "invalid item count argument",
            ErrorClass::NotInitialized => "runtime is not initialized",
            ErrorClass::Other => "unknown error",
        }
    }

    /// Non-zero status passed to `abort`.
    pub fn code(self) -> i32 {
        match self {
            ErrorClass::File => 27,
            ErrorClass::NoSuchFile => 42,
            ErrorClass::Access => 20,
            ErrorClass::ReadOnly => 40,
            ErrorClass::Io => 32,
            ErrorClass::BadOffset => 38,
            ErrorClass::Count => 2,
            ErrorClass::NotInitialized => 16,
            ErrorClass::Other => 15,
        }
    }

    pub fn from_io(err: &io::Error) -> Self {
        match err.kind() {
            io::ErrorKind::NotFound => ErrorClass::NoSuchFile,
            io::ErrorKind::PermissionDenied => ErrorClass::Access,
            io::ErrorKind::InvalidInput => ErrorClass::BadOffset,
            _ => ErrorClass::Io,
        }
    }
}

impl fmt::Display for ErrorClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.description())
    }
}

/// Contract of the distributed file-I/O runtime.
///
/// One value of the implementing type represents one participant: its
/// identity queries return that participant's ordinal, and collective calls
/// must be made by every participant of the group.
#[async_trait]
pub trait IoRuntime: Send + Sync {
    fn is_initialized(&self) -> bool;
    fn initialize(&self) -> Status<()>;
    fn finalize(&self) -> Status<()>;
    /// Coordination state shared by every participant of this group.
    fn bootstrap(&self) -> &Bootstrap;

    async fn open(&self, path: &Path, mode: OpenMode) -> Status<FileHandle>;
    async fn close(&self, handle: FileHandle) -> Status<()>;
    async fn get_size(&self, handle: FileHandle) -> Status<u64>;
    async fn set_size(&self, handle: FileHandle, bytes: u64) -> Status<()>;

    /// Reads up to `count` items of `tag` into `buf` starting at `offset`
    /// bytes; returns the number of whole items read. `count` never exceeds
    /// `i32::MAX`.
    async fn read_at(
        &self,
        handle: FileHandle,
        offset: u64,
        buf: &mut [u8],
        count: usize,
        tag: ItemTag,
    ) -> Status<usize>;

    async fn write_at(
        &self,
        handle: FileHandle,
        offset: u64,
        buf: &[u8],
        count: usize,
        tag: ItemTag,
    ) -> Status<()>;

    /// Collective sum over all participants; returns the same total to each.
    async fn reduce_sum(&self, local: u64) -> Status<u64>;

    fn group_rank(&self) -> usize;
    fn group_size(&self) -> usize;

    fn error_string(&self, class: ErrorClass) -> String;

    /// Terminates every participant of the group with `code`.
    fn abort(&self, code: i32) -> Infallible;
}

#[cfg(test)]
pub(crate) mod mock {
    use super::*;

    mockall::mock! {
        pub Runtime {}

        #[async_trait]
        impl IoRuntime for Runtime {
            fn is_initialized(&self) -> bool;
            fn initialize(&self) -> Status<()>;
            fn finalize(&self) -> Status<()>;
            fn bootstrap(&self) -> &Bootstrap;
            async fn open(&self, path: &Path, mode: OpenMode) -> Status<FileHandle>;
            async fn close(&self, handle: FileHandle) -> Status<()>;
            async fn get_size(&self, handle: FileHandle) -> Status<u64>;
            async fn set_size(&self, handle: FileHandle, bytes: u64) -> Status<()>;
            async fn read_at(
                &self,
                handle: FileHandle,
                offset: u64,
                buf: &mut [u8],
                count: usize,
                tag: ItemTag,
            ) -> Status<usize>;
            async fn write_at(
                &self,
                handle: FileHandle,
                offset: u64,
                buf: &[u8],
                count: usize,
                tag: ItemTag,
            ) -> Status<()>;
            async fn reduce_sum(&self, local: u64) -> Status<u64>;
            fn group_rank(&self) -> usize;
            fn group_size(&self) -> usize;
            fn error_string(&self, class: ErrorClass) -> String;
            fn abort(&self, code: i32) -> Infallible;
        }
    }

    impl std::fmt::Debug for MockRuntime {
        fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
            f.write_str("MockRuntime")
        }
    }

    /// A mock that reports an already-initialized runtime, so sessions skip
    /// bootstrap and go straight to the file calls.
    pub(crate) fn initialized(rank: usize, size: usize) -> MockRuntime {
        let mut runtime = MockRuntime::default();
        runtime.expect_is_initialized().return_const(true);
        runtime.expect_bootstrap().return_const(Bootstrap::new(size));
        runtime.expect_group_rank().return_const(rank);
        runtime.expect_group_size().return_const(size);
        runtime
            .expect_open()
            .returning(|_, _| Ok(FileHandle(1)));
        runtime.expect_close().returning(|_| Ok(()));
        runtime
    }
}
