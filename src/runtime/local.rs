//! In-process implementation of [`IoRuntime`].
//!
//! A [`LocalGroup`] stands in for a communicator: each participant gets its
//! own [`LocalRuntime`], runs as a tokio task, and opens the shared file with
//! its own descriptor. Collectives meet on a `tokio::sync::Barrier`.

use std::collections::HashMap;
use std::convert::Infallible;
use std::future::Future;
use std::io::SeekFrom;
use std::path::Path;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, OnceLock};

use async_trait::async_trait;
use futures::future::try_join_all;
use tokio::fs::{File, OpenOptions};
use tokio::io::{AsyncReadExt, AsyncSeekExt, AsyncWriteExt};
use tokio::sync::{Barrier, Mutex as AsyncMutex};

use super::{ErrorClass, FileHandle, IoRuntime, OpenMode, Status};
use crate::bootstrap::Bootstrap;
use crate::error::{Error, Result};
use crate::item::ItemTag;

static WORLD: OnceLock<LocalGroup> = OnceLock::new();

#[derive(Debug)]
struct Shared {
    size: usize,
    initialized: AtomicBool,
    finalized: AtomicBool,
    init_calls: AtomicUsize,
    finalize_calls: AtomicUsize,
    bootstrap: Bootstrap,
    reduce_barrier: Barrier,
    contributions: Mutex<Vec<u64>>,
}

/// A fixed-size group of in-process participants.
#[derive(Clone, Debug)]
pub struct LocalGroup {
    shared: Arc<Shared>,
}

impl LocalGroup {
    /// Creates a group whose runtime still needs bootstrapping.
    pub fn new(size: usize) -> Self {
        let size = size.max(1);
        Self {
            shared: Arc::new(Shared {
                size,
                initialized: AtomicBool::new(false),
                finalized: AtomicBool::new(false),
                init_calls: AtomicUsize::new(0),
                finalize_calls: AtomicUsize::new(0),
                bootstrap: Bootstrap::new(size),
                reduce_barrier: Barrier::new(size),
                contributions: Mutex::new(vec![0; size]),
            }),
        }
    }

    /// The process-wide group, created on first use.
    pub fn world(size: usize) -> Result<&'static LocalGroup> {
        let world = WORLD.get_or_init(|| LocalGroup::new(size));
        if world.size() != size {
            return Err(Error::Config(format!(
                "process group already has {} participants, asked for {size}",
                world.size()
            )));
        }
        Ok(world)
    }

    pub fn size(&self) -> usize {
        self.shared.size
    }

    pub fn init_calls(&self) -> usize {
        self.shared.init_calls.load(Ordering::Acquire)
    }

    pub fn finalize_calls(&self) -> usize {
        self.shared.finalize_calls.load(Ordering::Acquire)
    }

    pub fn participant(&self, rank: usize) -> Result<LocalRuntime> {
        if rank >= self.size() {
            return Err(Error::Config(format!(
                "rank {rank} is outside a group of {}",
                self.size()
            )));
        }
        Ok(LocalRuntime {
            rank,
            shared: Arc::clone(&self.shared),
            files: Mutex::new(HashMap::new()),
            next_handle: AtomicU64::new(1),
        })
    }

    /// Runs `body` once per participant, each on its own task, and collects
    /// the results in rank order.
    pub async fn run<F, Fut, T>(&self, body: F) -> Result<Vec<T>>
    where
        F: Fn(Arc<LocalRuntime>) -> Fut,
        Fut: Future<Output = Result<T>> + Send + 'static,
        T: Send + 'static,
    {
        let mut tasks = Vec::with_capacity(self.size());
        for rank in 0..self.size() {
            let runtime = Arc::new(self.participant(rank)?);
            tasks.push(tokio::spawn(body(runtime)));
        }
        let results = try_join_all(tasks)
            .await
            .map_err(|err| Error::Participant(err.to_string()))?;
        results.into_iter().collect()
    }
}

/// One participant's view of a [`LocalGroup`].
#[derive(Debug)]
pub struct LocalRuntime {
    rank: usize,
    shared: Arc<Shared>,
    files: Mutex<HashMap<FileHandle, Arc<AsyncMutex<File>>>>,
    next_handle: AtomicU64,
}

impl LocalRuntime {
    fn file(&self, handle: FileHandle) -> Status<Arc<AsyncMutex<File>>> {
        let files = self.files.lock().map_err(|_| ErrorClass::Other)?;
        files.get(&handle).cloned().ok_or(ErrorClass::File)
    }

    fn require_initialized(&self) -> Status<()> {
        if self.shared.initialized.load(Ordering::Acquire) {
            Ok(())
        } else {
            Err(ErrorClass::NotInitialized)
        }
    }
}

fn byte_len(buf_len: usize, count: usize, tag: ItemTag) -> Status<usize> {
    let want = count.checked_mul(tag.size()).ok_or(ErrorClass::Count)?;
    if count > i32::MAX as usize || want > buf_len {
        return Err(ErrorClass::Count);
    }
    Ok(want)
}

#[async_trait]
impl IoRuntime for LocalRuntime {
    fn is_initialized(&self) -> bool {
        self.shared.initialized.load(Ordering::Acquire)
    }

    fn initialize(&self) -> Status<()> {
        if self.shared.initialized.swap(true, Ordering::AcqRel) {
            return Err(ErrorClass::Other);
        }
        self.shared.init_calls.fetch_add(1, Ordering::AcqRel);
        Ok(())
    }

    fn finalize(&self) -> Status<()> {
        self.require_initialized()?;
        if self.shared.finalized.swap(true, Ordering::AcqRel) {
            return Err(ErrorClass::Other);
        }
        self.shared.finalize_calls.fetch_add(1, Ordering::AcqRel);
        Ok(())
    }

    fn bootstrap(&self) -> &Bootstrap {
        &self.shared.bootstrap
    }

    async fn open(&self, path: &Path, mode: OpenMode) -> Status<FileHandle> {
        self.require_initialized()?;
        if self.shared.finalized.load(Ordering::Acquire) {
            return Err(ErrorClass::NotInitialized);
        }
        let mut options = OpenOptions::new();
        match mode {
            OpenMode::ReadOnly => options.read(true),
            OpenMode::WriteOnlyCreate => options.write(true).create(true),
        };
        let file = options
            .open(path)
            .await
            .map_err(|err| ErrorClass::from_io(&err))?;

        let handle = FileHandle(self.next_handle.fetch_add(1, Ordering::AcqRel));
        self.files
            .lock()
            .map_err(|_| ErrorClass::Other)?
            .insert(handle, Arc::new(AsyncMutex::new(file)));
        tracing::trace!(rank = self.rank, path = %path.display(), ?mode, ?handle, "opened");
        Ok(handle)
    }

    async fn close(&self, handle: FileHandle) -> Status<()> {
        let file = self
            .files
            .lock()
            .map_err(|_| ErrorClass::Other)?
            .remove(&handle)
            .ok_or(ErrorClass::File)?;
        let mut file = file.lock().await;
        file.flush().await.map_err(|err| ErrorClass::from_io(&err))
    }

    async fn get_size(&self, handle: FileHandle) -> Status<u64> {
        let file = self.file(handle)?;
        let file = file.lock().await;
        let metadata = file.metadata().await.map_err(|err| ErrorClass::from_io(&err))?;
        Ok(metadata.len())
    }

    async fn set_size(&self, handle: FileHandle, bytes: u64) -> Status<()> {
        let file = self.file(handle)?;
        let file = file.lock().await;
        file.set_len(bytes).await.map_err(|err| ErrorClass::from_io(&err))
    }

    async fn read_at(
        &self,
        handle: FileHandle,
        offset: u64,
        buf: &mut [u8],
        count: usize,
        tag: ItemTag,
    ) -> Status<usize> {
        let want = byte_len(buf.len(), count, tag)?;
        let file = self.file(handle)?;
        let mut file = file.lock().await;
        file.seek(SeekFrom::Start(offset))
            .await
            .map_err(|err| ErrorClass::from_io(&err))?;

        let mut filled = 0;
        while filled < want {
            let n = file
                .read(&mut buf[filled..want])
                .await
                .map_err(|err| ErrorClass::from_io(&err))?;
            if n == 0 {
                break;
            }
            filled += n;
        }
        Ok(filled / tag.size())
    }

    async fn write_at(
        &self,
        handle: FileHandle,
        offset: u64,
        buf: &[u8],
        count: usize,
        tag: ItemTag,
    ) -> Status<()> {
        let want = byte_len(buf.len(), count, tag)?;
        let file = self.file(handle)?;
        let mut file = file.lock().await;
        file.seek(SeekFrom::Start(offset))
            .await
            .map_err(|err| ErrorClass::from_io(&err))?;
        file.write_all(&buf[..want])
            .await
            .map_err(|err| ErrorClass::from_io(&err))?;
        file.flush().await.map_err(|err| ErrorClass::from_io(&err))
    }

    async fn reduce_sum(&self, local: u64) -> Status<u64> {
        self.require_initialized()?;
        {
            let mut slots = self.shared.contributions.lock().map_err(|_| ErrorClass::Other)?;
            slots[self.rank] = local;
        }
        self.shared.reduce_barrier.wait().await;
        let total = {
            let slots = self.shared.contributions.lock().map_err(|_| ErrorClass::Other)?;
            slots.iter().sum()
        };
        // Nobody may overwrite a slot for the next reduction before everyone has summed.
        self.shared.reduce_barrier.wait().await;
        Ok(total)
    }

    fn group_rank(&self) -> usize {
        self.rank
    }

    fn group_size(&self) -> usize {
        self.shared.size
    }

    fn error_string(&self, class: ErrorClass) -> String {
        class.description().to_string()
    }

    fn abort(&self, code: i32) -> Infallible {
        tracing::error!(rank = self.rank, code, "participant group aborted");
        std::process::exit(code)
    }
}
