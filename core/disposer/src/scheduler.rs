// Copyright Yuzu Contributors (https://github.com/yuzu-rs)
// SPDX-License-Identifier: Apache-2.0

use std::sync::Arc;

use parking_lot::Mutex;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::debug;

type Task = Box<dyn FnOnce() + Send>;

/// Execution context handle with structured cancellation.
///
/// Scheduling after [`cancel`](Self::cancel) is a no-op; cancelling tears
/// down all outstanding work queued on the context. Handles are cheap to
/// clone and share one underlying context.
#[derive(Clone)]
pub struct Scheduler {
    inner: Arc<Inner>,
}

struct Inner {
    backend: Backend,
    token: CancellationToken,
}

enum Backend {
    /// Runs closures immediately on the calling thread.
    Inline,
    /// Serial queue drained by one task on the tokio blocking pool:
    /// submission order is delivery order, and scheduled closures may
    /// block.
    Queue(Mutex<Option<mpsc::UnboundedSender<Task>>>),
}

impl Scheduler {
    /// Scheduler that runs each closure inline on the caller's thread.
    pub fn inline() -> Self {
        Self {
            inner: Arc::new(Inner {
                backend: Backend::Inline,
                token: CancellationToken::new(),
            }),
        }
    }

    /// Serial background scheduler on the runtime's blocking pool.
    pub fn worker(handle: &tokio::runtime::Handle) -> Self {
        let (tx, mut rx) = mpsc::unbounded_channel::<Task>();
        let token = CancellationToken::new();

        let drain_token = token.clone();
        handle.spawn_blocking(move || {
            while let Some(task) = rx.blocking_recv() {
                if drain_token.is_cancelled() {
                    break;
                }
                task();
            }
        });

        Self {
            inner: Arc::new(Inner {
                backend: Backend::Queue(Mutex::new(Some(tx))),
                token,
            }),
        }
    }

    pub fn schedule(&self, task: impl FnOnce() + Send + 'static) {
        if self.inner.token.is_cancelled() {
            return;
        }
        match &self.inner.backend {
            Backend::Inline => task(),
            Backend::Queue(tx) => {
                if let Some(tx) = tx.lock().as_ref() {
                    // A closed queue only means the worker is gone already.
                    let _ = tx.send(Box::new(task));
                }
            }
        }
    }

    /// Cancels the context: queued work is discarded and later `schedule`
    /// calls are no-ops. Idempotent.
    pub fn cancel(&self) {
        if self.inner.token.is_cancelled() {
            return;
        }
        debug!("scheduler cancelled");
        self.inner.token.cancel();
        if let Backend::Queue(tx) = &self.inner.backend {
            // Dropping the sender unblocks the drain loop.
            tx.lock().take();
        }
    }

    pub fn is_cancelled(&self) -> bool {
        self.inner.token.is_cancelled()
    }
}
