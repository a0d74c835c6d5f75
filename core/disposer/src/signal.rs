// Copyright Yuzu Contributors (https://github.com/yuzu-rs)
// SPDX-License-Identifier: Apache-2.0

//! External cancellation signals.
//!
//! The pipeline does not assume any owning framework: anything able to run
//! a callback when its state transition happens can drive cancellation by
//! implementing [`CancelSignal`].

use std::sync::{Arc, Weak};

use parking_lot::Mutex;
use tokio_util::sync::CancellationToken;

/// Callback invoked once when the signal fires.
pub type SignalCallback = Box<dyn FnOnce() + Send>;

/// A single-fire cancellation source an external owner exposes to the
/// pipeline.
pub trait CancelSignal {
    /// Registers `callback` to run when the signal fires. The returned
    /// [`Registration`] deregisters on drop and must tolerate the signal
    /// having been torn down already.
    fn on_signal(&self, callback: SignalCallback) -> Registration;
}

/// Handle to a registered signal callback. Dropping it deregisters the
/// callback; after the signal fired, dropping is a no-op.
pub struct Registration {
    unregister: Option<Box<dyn FnOnce() + Send>>,
}

impl Registration {
    pub fn new(unregister: impl FnOnce() + Send + 'static) -> Self {
        Self {
            unregister: Some(Box::new(unregister)),
        }
    }

    /// Registration that has nothing to undo.
    pub fn noop() -> Self {
        Self { unregister: None }
    }

    /// Explicit deregistration, equivalent to dropping.
    pub fn unregister(self) {}
}

impl Drop for Registration {
    fn drop(&mut self) {
        if let Some(unregister) = self.unregister.take() {
            unregister();
        }
    }
}

#[derive(Default)]
struct ManualState {
    fired: bool,
    next_id: u64,
    callbacks: Vec<(u64, SignalCallback)>,
}

/// Signal fired explicitly with [`fire`](Self::fire).
///
/// This is the binding point for UI-ish owners: hook their state
/// transition to `fire()` and the bound pipelines cancel. Also the
/// deterministic choice for tests.
#[derive(Clone, Default)]
pub struct ManualSignal {
    state: Arc<Mutex<ManualState>>,
}

impl ManualSignal {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fires the signal, running all registered callbacks once. Later
    /// registrations run immediately; a second fire is a no-op.
    pub fn fire(&self) {
        let callbacks = {
            let mut state = self.state.lock();
            if state.fired {
                return;
            }
            state.fired = true;
            std::mem::take(&mut state.callbacks)
        };
        for (_, callback) in callbacks {
            callback();
        }
    }

    pub fn is_fired(&self) -> bool {
        self.state.lock().fired
    }
}

impl CancelSignal for ManualSignal {
    fn on_signal(&self, callback: SignalCallback) -> Registration {
        let id = {
            let mut state = self.state.lock();
            if state.fired {
                drop(state);
                callback();
                return Registration::noop();
            }
            let id = state.next_id;
            state.next_id += 1;
            state.callbacks.push((id, callback));
            id
        };

        let state = Arc::downgrade(&self.state);
        Registration::new(move || {
            if let Some(state) = Weak::upgrade(&state) {
                state.lock().callbacks.retain(|(cb_id, _)| *cb_id != id);
            }
        })
    }
}

/// Signal driven by a [`CancellationToken`]; the callback runs on the
/// provided tokio runtime.
pub struct TokenSignal {
    token: CancellationToken,
    handle: tokio::runtime::Handle,
}

impl TokenSignal {
    pub fn new(token: CancellationToken, handle: tokio::runtime::Handle) -> Self {
        Self { token, handle }
    }

    pub fn token(&self) -> &CancellationToken {
        &self.token
    }
}

impl CancelSignal for TokenSignal {
    fn on_signal(&self, callback: SignalCallback) -> Registration {
        let token = self.token.clone();
        let waiter = self.handle.spawn(async move {
            token.cancelled().await;
            callback();
        });
        Registration::new(move || waiter.abort())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    #[test]
    fn manual_signal_fires_once() {
        let signal = ManualSignal::new();
        let hits = Arc::new(AtomicUsize::new(0));

        let h = hits.clone();
        let reg = signal.on_signal(Box::new(move || {
            h.fetch_add(1, Ordering::SeqCst);
        }));

        signal.fire();
        signal.fire();
        drop(reg);

        assert_eq!(hits.load(Ordering::SeqCst), 1);
        assert!(signal.is_fired());
    }

    #[test]
    fn dropped_registration_does_not_fire() {
        let signal = ManualSignal::new();
        let hits = Arc::new(AtomicUsize::new(0));

        let h = hits.clone();
        let reg = signal.on_signal(Box::new(move || {
            h.fetch_add(1, Ordering::SeqCst);
        }));
        drop(reg);
        signal.fire();

        assert_eq!(hits.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn late_registration_runs_immediately() {
        let signal = ManualSignal::new();
        signal.fire();

        let hits = Arc::new(AtomicUsize::new(0));
        let h = hits.clone();
        let _reg = signal.on_signal(Box::new(move || {
            h.fetch_add(1, Ordering::SeqCst);
        }));

        assert_eq!(hits.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn token_signal_runs_callback_on_cancel() {
        let token = CancellationToken::new();
        let signal = TokenSignal::new(token.clone(), tokio::runtime::Handle::current());
        let (tx, rx) = tokio::sync::oneshot::channel();

        let mut tx = Some(tx);
        let _reg = signal.on_signal(Box::new(move || {
            if let Some(tx) = tx.take() {
                let _ = tx.send(());
            }
        }));

        token.cancel();
        tokio::time::timeout(Duration::from_secs(5), rx)
            .await
            .expect("callback did not run")
            .expect("sender dropped");
    }
}
