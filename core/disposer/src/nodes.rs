// Copyright Yuzu Contributors (https://github.com/yuzu-rs)
// SPDX-License-Identifier: Apache-2.0

//! Node implementations backing the [`Disposer`] combinators.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use parking_lot::Mutex;
use tracing::debug;

use crate::BoxError;
use crate::accepter::{Accepter, AccepterSlot, EndState, Event};
use crate::disposer::{Disposer, Node};
use crate::scheduler::Scheduler;
use crate::signal::{CancelSignal, Registration};

type ProduceFn<T> = Box<dyn FnOnce() -> Result<T, BoxError> + Send>;
type TransformFn<T, R> = Box<dyn FnOnce(T) -> Disposer<R> + Send>;

/// Leaf node: the event source. The only node that synthesizes an error
/// from its own execution.
pub(crate) struct CreateNode<T> {
    produce: Option<ProduceFn<T>>,
}

impl<T: Send + 'static> CreateNode<T> {
    pub(crate) fn new(produce: impl FnOnce() -> Result<T, BoxError> + Send + 'static) -> Self {
        Self {
            produce: Some(Box::new(produce)),
        }
    }
}

impl<T: Send + 'static> Node<T> for CreateNode<T> {
    fn transmit(&mut self, mut accepter: Box<dyn Accepter<T>>) {
        let Some(produce) = self.produce.take() else {
            // Cancelled (or already spent): no events.
            return;
        };

        accepter.on_start();
        match produce() {
            Ok(value) => accepter.call(value),
            Err(error) => accepter.on_error(error),
        }
        accepter.on_end(EndState::Normal);
    }

    fn cancel(&mut self) {
        if self.produce.take().is_some() {
            debug!("pipeline cancelled before the source transmitted");
        }
    }
}

/// Converts the upstream value into a follow-up pipeline whose
/// `on_start`/`on_end` are suppressed.
pub(crate) struct ConvertNode<T, R: Send + 'static> {
    upstream: Option<Box<dyn Node<T>>>,
    transform: Option<TransformFn<T, R>>,
}

impl<T: Send + 'static, R: Send + 'static> ConvertNode<T, R> {
    pub(crate) fn new(
        upstream: Box<dyn Node<T>>,
        transform: impl FnOnce(T) -> Disposer<R> + Send + 'static,
    ) -> Self {
        Self {
            upstream: Some(upstream),
            transform: Some(Box::new(transform)),
        }
    }
}

impl<T: Send + 'static, R: Send + 'static> Node<R> for ConvertNode<T, R> {
    fn transmit(&mut self, accepter: Box<dyn Accepter<R>>) {
        if let (Some(mut upstream), Some(transform)) = (self.upstream.take(), self.transform.take())
        {
            upstream.transmit(Box::new(ConvertAccepter {
                downstream: Some(accepter),
                transform: Some(transform),
            }));
        }
    }

    fn cancel(&mut self) {
        if let Some(mut upstream) = self.upstream.take() {
            upstream.cancel();
        }
        self.transform = None;
    }
}

struct ConvertAccepter<T, R: Send + 'static> {
    downstream: Option<Box<dyn Accepter<R>>>,
    transform: Option<TransformFn<T, R>>,
}

impl<T: Send + 'static, R: Send + 'static> Accepter<T> for ConvertAccepter<T, R> {
    fn on_start(&mut self) {
        if let Some(downstream) = self.downstream.as_mut() {
            downstream.on_start();
        }
    }

    fn call(&mut self, value: T) {
        let Some(transform) = self.transform.take() else {
            return;
        };
        let Some(downstream) = self.downstream.take() else {
            return;
        };

        // The inner pipeline is transmitted on the current context. Its
        // start/end framing is dropped; this node's own on_start/on_end
        // remain the single framing the subscriber sees.
        let mut inner = transform(value);
        let slot = AccepterSlot::empty();
        slot.put(downstream);
        inner.node.transmit(Box::new(SuppressFrame { slot: slot.clone() }));
        self.downstream = slot.take();
    }

    fn on_error(&mut self, error: BoxError) {
        if let Some(downstream) = self.downstream.as_mut() {
            downstream.on_error(error);
        }
    }

    fn on_end(&mut self, state: EndState) {
        if let Some(downstream) = self.downstream.as_mut() {
            downstream.on_end(state);
        }
    }
}

/// Forwards `call` and `on_error` only; the framing events of a converted
/// sub-pipeline are discarded.
struct SuppressFrame<R> {
    slot: AccepterSlot<R>,
}

impl<R: Send + 'static> Accepter<R> for SuppressFrame<R> {
    fn on_start(&mut self) {}

    fn call(&mut self, value: R) {
        self.slot.dispatch(Event::Call(value));
    }

    fn on_error(&mut self, error: BoxError) {
        self.slot.dispatch(Event::Error(error));
    }

    fn on_end(&mut self, _state: EndState) {}
}

type StartFn = Box<dyn FnMut() + Send>;
type ErrorFn = Box<dyn FnMut(&BoxError) + Send>;
type EndFn = Box<dyn FnMut(EndState) + Send>;

/// One side-effecting observer attached to a single event type.
pub(crate) enum EventAction {
    Start(StartFn),
    Error(ErrorFn),
    End(EndFn),
}

/// Node carrying an [`EventAction`] observer.
pub(crate) struct ActionNode<T> {
    upstream: Option<Box<dyn Node<T>>>,
    action: Option<EventAction>,
    slot: Option<AccepterSlot<T>>,
    cancelled: bool,
}

impl<T: Send + 'static> ActionNode<T> {
    pub(crate) fn new(upstream: Box<dyn Node<T>>, action: EventAction) -> Self {
        Self {
            upstream: Some(upstream),
            action: Some(action),
            slot: None,
            cancelled: false,
        }
    }
}

impl<T: Send + 'static> Node<T> for ActionNode<T> {
    fn transmit(&mut self, accepter: Box<dyn Accepter<T>>) {
        if self.cancelled {
            return;
        }
        let Some(mut upstream) = self.upstream.take() else {
            return;
        };

        let slot = AccepterSlot::new(Box::new(ActionAccepter {
            downstream: accepter,
            action: self.action.take(),
        }));
        self.slot = Some(slot.clone());
        upstream.transmit(Box::new(slot));
    }

    fn cancel(&mut self) {
        if self.cancelled {
            return;
        }
        self.cancelled = true;

        if let Some(mut upstream) = self.upstream.take() {
            upstream.cancel();
        }
        if let Some(slot) = self.slot.take() {
            // In-flight: run the end observer and terminate downstream.
            slot.finish(EndState::Cancelled);
        } else if let Some(EventAction::End(mut f)) = self.action.take() {
            // Not yet transmitted: the end observer still fires.
            f(EndState::Cancelled);
        }
    }
}

struct ActionAccepter<T> {
    downstream: Box<dyn Accepter<T>>,
    action: Option<EventAction>,
}

impl<T: Send + 'static> Accepter<T> for ActionAccepter<T> {
    fn on_start(&mut self) {
        self.downstream.on_start();
        if let Some(EventAction::Start(f)) = self.action.as_mut() {
            f();
        }
    }

    fn call(&mut self, value: T) {
        self.downstream.call(value);
    }

    fn on_error(&mut self, error: BoxError) {
        if let Some(EventAction::Error(f)) = self.action.as_mut() {
            f(&error);
        }
        self.downstream.on_error(error);
    }

    fn on_end(&mut self, state: EndState) {
        self.downstream.on_end(state);
        if let Some(EventAction::End(f)) = self.action.as_mut() {
            f(state);
        }
    }
}

type SharedNode<T> = Arc<Mutex<Option<Box<dyn Node<T>>>>>;

/// Hops transmission onto one scheduler and downstream callbacks onto
/// another.
pub(crate) struct SchedulerNode<T> {
    upstream: SharedNode<T>,
    disposer_scheduler: Scheduler,
    accepter_scheduler: Scheduler,
    slot: Option<AccepterSlot<T>>,
    cancelled: bool,
}

impl<T: Send + 'static> SchedulerNode<T> {
    pub(crate) fn new(
        upstream: Box<dyn Node<T>>,
        disposer_scheduler: Scheduler,
        accepter_scheduler: Scheduler,
    ) -> Self {
        Self {
            upstream: Arc::new(Mutex::new(Some(upstream))),
            disposer_scheduler,
            accepter_scheduler,
            slot: None,
            cancelled: false,
        }
    }
}

impl<T: Send + 'static> Node<T> for SchedulerNode<T> {
    fn transmit(&mut self, mut accepter: Box<dyn Accepter<T>>) {
        if self.cancelled {
            accepter.on_end(EndState::Cancelled);
            return;
        }

        let slot = AccepterSlot::new(accepter);
        self.slot = Some(slot.clone());

        let hop = ScheduledAccepter {
            scheduler: self.accepter_scheduler.clone(),
            slot,
        };
        let upstream = self.upstream.clone();
        self.disposer_scheduler.schedule(move || {
            let node = upstream.lock().take();
            if let Some(mut node) = node {
                node.transmit(Box::new(hop));
            }
        });
    }

    fn cancel(&mut self) {
        if self.cancelled {
            return;
        }
        self.cancelled = true;
        debug!("scheduler node cancelled");

        if let Some(mut node) = self.upstream.lock().take() {
            node.cancel();
        }
        if let Some(slot) = self.slot.take() {
            // Delivered inline: the accepter scheduler is about to be torn
            // down and the terminal event must not be dropped with it.
            slot.finish(EndState::Cancelled);
        }
        self.disposer_scheduler.cancel();
        self.accepter_scheduler.cancel();
    }
}

/// Re-dispatches each event onto the accepter scheduler, in event order.
struct ScheduledAccepter<T> {
    scheduler: Scheduler,
    slot: AccepterSlot<T>,
}

impl<T: Send + 'static> ScheduledAccepter<T> {
    fn hop(&self, event: Event<T>) {
        let slot = self.slot.clone();
        self.scheduler.schedule(move || slot.dispatch(event));
    }
}

impl<T: Send + 'static> Accepter<T> for ScheduledAccepter<T> {
    fn on_start(&mut self) {
        self.hop(Event::Start);
    }

    fn call(&mut self, value: T) {
        self.hop(Event::Call(value));
    }

    fn on_error(&mut self, error: BoxError) {
        self.hop(Event::Error(error));
    }

    fn on_end(&mut self, state: EndState) {
        self.hop(Event::End(state));
    }
}

/// Cancels the pipeline when an external signal fires; deregisters once
/// transmission completed normally.
pub(crate) struct CancelBindNode<T> {
    upstream: SharedNode<T>,
    slot: AccepterSlot<T>,
    cancelled: Arc<AtomicBool>,
    registration: Option<Registration>,
}

impl<T: Send + 'static> CancelBindNode<T> {
    pub(crate) fn new(upstream: Box<dyn Node<T>>, signal: &dyn CancelSignal) -> Self {
        let upstream: SharedNode<T> = Arc::new(Mutex::new(Some(upstream)));
        let slot = AccepterSlot::empty();
        let cancelled = Arc::new(AtomicBool::new(false));

        let registration = signal.on_signal(Box::new({
            let upstream = upstream.clone();
            let slot = slot.clone();
            let cancelled = cancelled.clone();
            move || {
                if cancelled.swap(true, Ordering::SeqCst) {
                    return;
                }
                debug!("cancel signal fired, tearing down pipeline");
                if let Some(mut node) = upstream.lock().take() {
                    node.cancel();
                }
                slot.finish(EndState::Cancelled);
            }
        }));

        Self {
            upstream,
            slot,
            cancelled,
            registration: Some(registration),
        }
    }
}

impl<T: Send + 'static> Node<T> for CancelBindNode<T> {
    fn transmit(&mut self, mut accepter: Box<dyn Accepter<T>>) {
        if self.cancelled.load(Ordering::SeqCst) {
            accepter.on_end(EndState::Cancelled);
            return;
        }

        self.slot.put(accepter);
        let forward = DeregisterOnEnd {
            slot: self.slot.clone(),
            registration: self.registration.take(),
        };
        let node = self.upstream.lock().take();
        if let Some(mut node) = node {
            node.transmit(Box::new(forward));
        }
    }

    fn cancel(&mut self) {
        if self.cancelled.swap(true, Ordering::SeqCst) {
            return;
        }
        self.registration = None;
        if let Some(mut node) = self.upstream.lock().take() {
            node.cancel();
        }
        self.slot.finish(EndState::Cancelled);
    }
}

/// Forwards everything into the shared slot and drops the signal
/// registration on the terminal event.
struct DeregisterOnEnd<T> {
    slot: AccepterSlot<T>,
    registration: Option<Registration>,
}

impl<T: Send + 'static> Accepter<T> for DeregisterOnEnd<T> {
    fn on_start(&mut self) {
        self.slot.dispatch(Event::Start);
    }

    fn call(&mut self, value: T) {
        self.slot.dispatch(Event::Call(value));
    }

    fn on_error(&mut self, error: BoxError) {
        self.slot.dispatch(Event::Error(error));
    }

    fn on_end(&mut self, state: EndState) {
        self.registration = None;
        self.slot.dispatch(Event::End(state));
    }
}
