// Copyright Yuzu Contributors (https://github.com/yuzu-rs)
// SPDX-License-Identifier: Apache-2.0

//! Single-use, cancellable event pipelines.
//!
//! A [`Disposer`] produces exactly one event sequence
//! `on_start → (call | on_error) → on_end(state)` towards an [`Accepter`].
//! Combinators wrap a pipeline into a new one that owns its upstream;
//! [`Disposer::subscribe`] consumes the pipeline and triggers transmission,
//! so the single-use contract is enforced by move semantics.

pub mod accepter;
pub mod disposer;
pub mod scheduler;
pub mod signal;

mod nodes;

pub use accepter::{Accepter, CallbackAccepter, EndState, Event};
pub use disposer::Disposer;
pub use scheduler::Scheduler;
pub use signal::{CancelSignal, ManualSignal, Registration, TokenSignal};

/// Error payload carried by `on_error` events.
///
/// The pipeline is agnostic to what failed upstream; producers box their
/// concrete error type and observers may downcast it back.
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;
