//! One-time runtime bootstrap and teardown for a participant group.
//!
//! The first session opened by each participant goes through [`Bootstrap::ensure`].
//! If the runtime is not yet initialized, the coordinating participant
//! (ordinal 0) initializes it while the others wait on a barrier, so no I/O
//! call is issued before initialization completes.
//!
//! Teardown has no barrier. A joined session releases its role when it is
//! closed or dropped. The initializing session finalizes the runtime, exactly
//! once, when it is closed and every joined role has been released, or
//! immediately if it is dropped without being closed.

use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use tokio::sync::{Barrier, Notify, OnceCell};

use crate::error::{Check, Error, Result};
use crate::runtime::IoRuntime;

pub const COORDINATOR: usize = 0;

/// What a session contributed to the group bootstrap.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Role {
    /// The runtime was already up, or this participant had already joined.
    Skipped,
    /// Waited at the barrier while the coordinator initialized.
    Joined,
    /// Performed initialization; responsible for teardown.
    Initialized,
}

#[derive(Debug)]
pub struct Bootstrap {
    group_size: usize,
    needed: OnceCell<bool>,
    arrived: Mutex<Vec<bool>>,
    failed: AtomicBool,
    finalized: AtomicBool,
    barrier: Barrier,
    /// Joined roles not yet released.
    pending: AtomicUsize,
    released: Notify,
}

impl Bootstrap {
    pub fn new(group_size: usize) -> Self {
        let group_size = group_size.max(1);
        Self {
            group_size,
            needed: OnceCell::new(),
            arrived: Mutex::new(vec![false; group_size]),
            failed: AtomicBool::new(false),
            finalized: AtomicBool::new(false),
            barrier: Barrier::new(group_size),
            pending: AtomicUsize::new(0),
            released: Notify::new(),
        }
    }

    pub fn group_size(&self) -> usize {
        self.group_size
    }

    pub fn is_finalized(&self) -> bool {
        self.finalized.load(Ordering::Acquire)
    }

    /// Initializes the runtime if needed, once per group.
    ///
    /// Every participant must call this before its first I/O call.
    pub async fn ensure<R: IoRuntime + ?Sized>(&self, runtime: &R, ordinal: usize) -> Result<Role> {
        if ordinal >= self.group_size {
            return Err(Error::Config(format!(
                "ordinal {ordinal} is outside a bootstrap group of {}",
                self.group_size
            )));
        }

        let needed = *self
            .needed
            .get_or_init(|| async { !runtime.is_initialized() })
            .await;
        if !needed || !self.arrive(ordinal)? {
            return Ok(Role::Skipped);
        }

        let role = if ordinal == COORDINATOR {
            match runtime.initialize() {
                Ok(()) => {
                    tracing::debug!(group_size = self.group_size, "runtime initialized");
                    Role::Initialized
                }
                Err(class) => {
                    self.failed.store(true, Ordering::Release);
                    self.barrier.wait().await;
                    return Err(Error::runtime("initialize", class));
                }
            }
        } else {
            self.pending.fetch_add(1, Ordering::AcqRel);
            Role::Joined
        };

        self.barrier.wait().await;
        if self.failed.load(Ordering::Acquire) {
            if role == Role::Joined {
                self.release_joined();
            }
            return Err(Error::Participant(
                "runtime initialization failed on the coordinating participant".into(),
            ));
        }
        Ok(role)
    }

    /// Counterpart of [`ensure`](Self::ensure), called when the session that
    /// received `role` is closed.
    ///
    /// The initializing session waits until every joined role is released,
    /// then finalizes.
    pub async fn teardown<R: IoRuntime + ?Sized>(&self, runtime: &R, role: Role) -> Result<()> {
        match role {
            Role::Skipped => Ok(()),
            Role::Joined => {
                self.release_joined();
                Ok(())
            }
            Role::Initialized => {
                self.wait_for_joined().await;
                self.finalize_once(runtime)
            }
        }
    }

    /// Releases `role` without waiting, for sessions that are dropped or fail
    /// to open. An initializing role finalizes at once; handles other
    /// participants already hold stay usable.
    pub fn release<R: IoRuntime + ?Sized>(&self, runtime: &R, role: Role) -> Result<()> {
        match role {
            Role::Skipped => Ok(()),
            Role::Joined => {
                self.release_joined();
                Ok(())
            }
            Role::Initialized => self.finalize_once(runtime),
        }
    }

    fn release_joined(&self) {
        let left = self
            .pending
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |n| n.checked_sub(1));
        if left == Ok(1) {
            self.released.notify_waiters();
        }
    }

    async fn wait_for_joined(&self) {
        loop {
            let notified = self.released.notified();
            tokio::pin!(notified);
            // Register before checking so a release in between is not missed.
            notified.as_mut().enable();
            if self.pending.load(Ordering::Acquire) == 0 {
                return;
            }
            notified.await;
        }
    }

    fn finalize_once<R: IoRuntime + ?Sized>(&self, runtime: &R) -> Result<()> {
        if !self.finalized.swap(true, Ordering::AcqRel) {
            runtime.finalize().check("finalize")?;
            tracing::debug!(group_size = self.group_size, "runtime finalized");
        }
        Ok(())
    }

    /// Marks `ordinal` as arrived; false when it had already arrived.
    fn arrive(&self, ordinal: usize) -> Result<bool> {
        let mut arrived = self
            .arrived
            .lock()
            .map_err(|_| Error::Participant("bootstrap state poisoned".into()))?;
        Ok(!std::mem::replace(&mut arrived[ordinal], true))
    }
}
