// Copyright Yuzu Contributors (https://github.com/yuzu-rs)
// SPDX-License-Identifier: Apache-2.0

use std::sync::Arc;

use parking_lot::Mutex;

use crate::BoxError;

/// Terminal classification delivered with every `on_end`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EndState {
    /// Transmission ran to completion, with a value or an error.
    Normal,
    /// Transmission was cancelled before completion.
    Cancelled,
}

/// The four-callback sink a [`Disposer`](crate::Disposer) transmits events to.
///
/// Ordering contract: `on_start` fires at most once and before `call` or
/// `on_error`; `on_end` fires exactly once, after `call` or `on_error`, and
/// is the only callback guaranteed to fire on cancellation.
pub trait Accepter<T>: Send {
    fn on_start(&mut self);

    fn call(&mut self, value: T);

    fn on_error(&mut self, error: BoxError);

    fn on_end(&mut self, state: EndState);
}

/// One pipeline event, dispatched by a single match.
pub enum Event<T> {
    Start,
    Call(T),
    Error(BoxError),
    End(EndState),
}

impl<T> Event<T> {
    pub fn dispatch(self, accepter: &mut dyn Accepter<T>) {
        match self {
            Event::Start => accepter.on_start(),
            Event::Call(value) => accepter.call(value),
            Event::Error(error) => accepter.on_error(error),
            Event::End(state) => accepter.on_end(state),
        }
    }
}

impl<T> std::fmt::Debug for Event<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Event::Start => write!(f, "Start"),
            Event::Call(_) => write!(f, "Call"),
            Event::Error(e) => write!(f, "Error({e})"),
            Event::End(state) => write!(f, "End({state:?})"),
        }
    }
}

/// Shared slot holding the downstream accepter of an in-flight node.
///
/// Nodes that can be cancelled from another context (scheduler hops, cancel
/// bindings, end observers) route events through a slot: delivering `on_end`
/// empties the slot, so a cancellation racing with normal completion
/// produces exactly one terminal event, whichever side gets there first.
pub(crate) struct AccepterSlot<T> {
    inner: Arc<Mutex<Option<Box<dyn Accepter<T>>>>>,
}

impl<T> Clone for AccepterSlot<T> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
        }
    }
}

impl<T: Send + 'static> AccepterSlot<T> {
    pub(crate) fn new(accepter: Box<dyn Accepter<T>>) -> Self {
        Self {
            inner: Arc::new(Mutex::new(Some(accepter))),
        }
    }

    pub(crate) fn empty() -> Self {
        Self {
            inner: Arc::new(Mutex::new(None)),
        }
    }

    pub(crate) fn put(&self, accepter: Box<dyn Accepter<T>>) {
        *self.inner.lock() = Some(accepter);
    }

    /// Releases the held accepter without delivering an event.
    pub(crate) fn take(&self) -> Option<Box<dyn Accepter<T>>> {
        self.inner.lock().take()
    }

    /// Forwards one event to the held accepter, if any. A terminal event
    /// releases the accepter so later terminals are no-ops.
    pub(crate) fn dispatch(&self, event: Event<T>) {
        let mut guard = self.inner.lock();
        match event {
            Event::End(state) => {
                if let Some(mut accepter) = guard.take() {
                    drop(guard);
                    accepter.on_end(state);
                }
            }
            other => {
                if let Some(accepter) = guard.as_mut() {
                    other.dispatch(accepter.as_mut());
                }
            }
        }
    }

    /// Delivers the terminal event, releasing the accepter. No-op when the
    /// slot already emptied.
    pub(crate) fn finish(&self, state: EndState) {
        self.dispatch(Event::End(state));
    }
}

impl<T: Send + 'static> Accepter<T> for AccepterSlot<T> {
    fn on_start(&mut self) {
        self.dispatch(Event::Start);
    }

    fn call(&mut self, value: T) {
        self.dispatch(Event::Call(value));
    }

    fn on_error(&mut self, error: BoxError) {
        self.dispatch(Event::Error(error));
    }

    fn on_end(&mut self, state: EndState) {
        self.dispatch(Event::End(state));
    }
}

type StartFn = Box<dyn FnMut() + Send>;
type ErrorFn = Box<dyn FnMut(&BoxError) + Send>;
type EndFn = Box<dyn FnMut(EndState) + Send>;

/// Closure-based [`Accepter`] for callers that do not want a dedicated type.
pub struct CallbackAccepter<T> {
    start: Option<StartFn>,
    value: Option<Box<dyn FnMut(T) + Send>>,
    error: Option<ErrorFn>,
    end: Option<EndFn>,
}

impl<T: Send> CallbackAccepter<T> {
    pub fn new() -> Self {
        Self {
            start: None,
            value: None,
            error: None,
            end: None,
        }
    }

    pub fn on_start(mut self, f: impl FnMut() + Send + 'static) -> Self {
        self.start = Some(Box::new(f));
        self
    }

    pub fn on_value(mut self, f: impl FnMut(T) + Send + 'static) -> Self {
        self.value = Some(Box::new(f));
        self
    }

    pub fn on_error(mut self, f: impl FnMut(&BoxError) + Send + 'static) -> Self {
        self.error = Some(Box::new(f));
        self
    }

    pub fn on_end(mut self, f: impl FnMut(EndState) + Send + 'static) -> Self {
        self.end = Some(Box::new(f));
        self
    }
}

impl<T: Send> Accepter<T> for CallbackAccepter<T> {
    fn on_start(&mut self) {
        if let Some(f) = self.start.as_mut() {
            f();
        }
    }

    fn call(&mut self, value: T) {
        if let Some(f) = self.value.as_mut() {
            f(value);
        }
    }

    fn on_error(&mut self, error: BoxError) {
        if let Some(f) = self.error.as_mut() {
            f(&error);
        }
    }

    fn on_end(&mut self, state: EndState) {
        if let Some(f) = self.end.as_mut() {
            f(state);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Recording(Vec<&'static str>);

    impl Accepter<i32> for Recording {
        fn on_start(&mut self) {
            self.0.push("start");
        }
        fn call(&mut self, _: i32) {
            self.0.push("call");
        }
        fn on_error(&mut self, _: BoxError) {
            self.0.push("error");
        }
        fn on_end(&mut self, _: EndState) {
            self.0.push("end");
        }
    }

    #[test]
    fn slot_delivers_terminal_event_once() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = {
            let seen = seen.clone();
            CallbackAccepter::new().on_end(move |state| seen.lock().push(state))
        };

        let slot: AccepterSlot<i32> = AccepterSlot::new(Box::new(sink));
        slot.finish(EndState::Cancelled);
        slot.finish(EndState::Normal);

        assert_eq!(*seen.lock(), vec![EndState::Cancelled]);
    }

    #[test]
    fn slot_drops_events_after_release() {
        let slot = AccepterSlot::new(Box::new(Recording(Vec::new())));
        slot.finish(EndState::Normal);
        // Nothing left to deliver to; must not panic.
        slot.dispatch(Event::Call(1));
        slot.dispatch(Event::Start);
    }
}
