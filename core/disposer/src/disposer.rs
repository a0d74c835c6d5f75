// Copyright Yuzu Contributors (https://github.com/yuzu-rs)
// SPDX-License-Identifier: Apache-2.0

use crate::BoxError;
use crate::accepter::{Accepter, EndState};
use crate::nodes::{ActionNode, CancelBindNode, ConvertNode, CreateNode, EventAction, SchedulerNode};
use crate::scheduler::Scheduler;
use crate::signal::CancelSignal;

/// Internal producer contract. Every node owns at most one upstream node and
/// releases it (`Option::take`) once transmission or cancellation consumed
/// it, keeping the chain acyclic and single-owner.
pub(crate) trait Node<T>: Send {
    /// Transmits the single event sequence into `accepter`. Called at most
    /// once; a second call is a silent no-op by construction because
    /// [`Disposer::subscribe`] consumes the pipeline.
    fn transmit(&mut self, accepter: Box<dyn Accepter<T>>);

    /// Cancels the node and its owned upstream. Idempotent.
    fn cancel(&mut self);
}

/// A single-use, cancellable producer of one
/// `on_start → (call | on_error) → on_end` event sequence.
///
/// Pipelines are assembled top-down by combinators, each consuming `self`
/// and returning a node that owns the previous one, and are fired exactly
/// once with [`subscribe`](Self::subscribe).
pub struct Disposer<T: Send + 'static> {
    pub(crate) node: Box<dyn Node<T>>,
}

impl<T: Send + 'static> Disposer<T> {
    pub(crate) fn from_node(node: impl Node<T> + 'static) -> Self {
        Self {
            node: Box::new(node),
        }
    }

    /// Leaf pipeline holding a plain value.
    pub fn create(value: T) -> Self {
        Self::defer(move || Ok(value))
    }

    /// Leaf pipeline running `produce` at transmission time.
    ///
    /// This is how a blocking call is wrapped: the closure runs inside the
    /// leaf's `call` phase on whatever context transmission happens on, and
    /// an `Err` is funnelled into `on_error`. The terminal event is always
    /// `on_end(Normal)`; only cancellation yields `Cancelled`.
    pub fn defer(produce: impl FnOnce() -> Result<T, BoxError> + Send + 'static) -> Self {
        Self::from_node(CreateNode::new(produce))
    }

    /// Converts the produced value into a follow-up pipeline.
    ///
    /// The inner pipeline is transmitted on the current context with its
    /// `on_start`/`on_end` suppressed: this node stays the one source of
    /// the start/end framing, so nested conversions cannot duplicate
    /// lifecycle events.
    pub fn convert<R: Send + 'static>(
        self,
        transform: impl FnOnce(T) -> Disposer<R> + Send + 'static,
    ) -> Disposer<R> {
        Disposer::from_node(ConvertNode::new(self.node, transform))
    }

    /// Applies an arbitrary whole-pipeline transform, used to splice in a
    /// reusable block of combinators as one unit.
    pub fn wrap<R: Send + 'static>(self, transform: impl FnOnce(Disposer<T>) -> Disposer<R>) -> Disposer<R> {
        transform(self)
    }

    /// Observes the `on_start` event without altering the value.
    pub fn do_start(self, f: impl FnMut() + Send + 'static) -> Self {
        Self::from_node(ActionNode::new(self.node, EventAction::Start(Box::new(f))))
    }

    /// Observes `on_error` events without altering the value.
    pub fn do_error(self, f: impl FnMut(&BoxError) + Send + 'static) -> Self {
        Self::from_node(ActionNode::new(self.node, EventAction::Error(Box::new(f))))
    }

    /// Observes the terminal event. The closure still fires with
    /// [`EndState::Cancelled`] when the node is cancelled before
    /// transmission.
    pub fn do_end(self, f: impl FnMut(EndState) + Send + 'static) -> Self {
        Self::from_node(ActionNode::new(self.node, EventAction::End(Box::new(f))))
    }

    /// Hops the pipeline between execution contexts: upstream transmission
    /// runs on `disposer_scheduler`, every downstream callback is
    /// re-dispatched onto `accepter_scheduler` in event order.
    pub fn schedule_on(self, disposer_scheduler: Scheduler, accepter_scheduler: Scheduler) -> Self {
        Self::from_node(SchedulerNode::new(
            self.node,
            disposer_scheduler,
            accepter_scheduler,
        ))
    }

    /// Cancels this pipeline when `signal` fires.
    ///
    /// The registration is removed once transmission completes normally;
    /// a signal arriving afterwards is a no-op. Cancellation delivers one
    /// `on_end(Cancelled)` to a subscribed accepter.
    pub fn bind_cancel(self, signal: &dyn CancelSignal) -> Self {
        Self::from_node(CancelBindNode::new(self.node, signal))
    }

    /// Terminal operation: consumes the pipeline and transmits into
    /// `accepter`.
    pub fn subscribe(mut self, accepter: impl Accepter<T> + 'static) {
        self.node.transmit(Box::new(accepter));
    }

    /// Cancels the pipeline without transmitting it. Idempotent; a
    /// cancelled leaf transmits nothing when subscribed later, while nodes
    /// carrying end observers still deliver one `on_end(Cancelled)`.
    pub fn cancel(&mut self) {
        self.node.cancel();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::accepter::CallbackAccepter;
    use crate::signal::ManualSignal;
    use parking_lot::Mutex;
    use std::sync::Arc;
    use std::time::Duration;
    use tracing_test::traced_test;

    #[derive(Clone, Debug, PartialEq)]
    enum Seen {
        Start,
        Call(i32),
        Error(String),
        End(EndState),
    }

    #[derive(Clone, Default)]
    struct Recorder {
        events: Arc<Mutex<Vec<Seen>>>,
    }

    impl Recorder {
        fn events(&self) -> Vec<Seen> {
            self.events.lock().clone()
        }
    }

    impl Accepter<i32> for Recorder {
        fn on_start(&mut self) {
            self.events.lock().push(Seen::Start);
        }
        fn call(&mut self, value: i32) {
            self.events.lock().push(Seen::Call(value));
        }
        fn on_error(&mut self, error: BoxError) {
            self.events.lock().push(Seen::Error(error.to_string()));
        }
        fn on_end(&mut self, state: EndState) {
            self.events.lock().push(Seen::End(state));
        }
    }

    #[test]
    fn create_emits_start_call_end() {
        let recorder = Recorder::default();
        Disposer::create(42).subscribe(recorder.clone());

        assert_eq!(
            recorder.events(),
            vec![Seen::Start, Seen::Call(42), Seen::End(EndState::Normal)]
        );
    }

    #[test]
    fn failing_leaf_emits_error_then_normal_end() {
        let recorder = Recorder::default();
        Disposer::<i32>::defer(|| Err("boom".into())).subscribe(recorder.clone());

        assert_eq!(
            recorder.events(),
            vec![
                Seen::Start,
                Seen::Error("boom".to_string()),
                Seen::End(EndState::Normal)
            ]
        );
    }

    #[test]
    fn convert_suppresses_inner_framing() {
        let recorder = Recorder::default();
        Disposer::create(20)
            .convert(|n| Disposer::create(n * 2 + 2))
            .subscribe(recorder.clone());

        // One start, one end: the inner pipeline's framing is dropped.
        assert_eq!(
            recorder.events(),
            vec![Seen::Start, Seen::Call(42), Seen::End(EndState::Normal)]
        );
    }

    #[test]
    fn convert_propagates_inner_error() {
        let recorder = Recorder::default();
        Disposer::create(1)
            .convert(|_| Disposer::<i32>::defer(|| Err("inner".into())))
            .subscribe(recorder.clone());

        assert_eq!(
            recorder.events(),
            vec![
                Seen::Start,
                Seen::Error("inner".to_string()),
                Seen::End(EndState::Normal)
            ]
        );
    }

    #[test]
    fn wrap_splices_whole_pipeline_transform() {
        let recorder = Recorder::default();
        let starts = Arc::new(Mutex::new(0));
        let s = starts.clone();

        Disposer::create(7)
            .wrap(move |d| d.do_start(move || *s.lock() += 1))
            .subscribe(recorder.clone());

        assert_eq!(*starts.lock(), 1);
        assert_eq!(
            recorder.events(),
            vec![Seen::Start, Seen::Call(7), Seen::End(EndState::Normal)]
        );
    }

    #[traced_test]
    #[test]
    fn cancelling_an_untransmitted_leaf_is_logged() {
        let mut pipeline = Disposer::create(1);
        pipeline.cancel();
        // Idempotent: the second cancel finds nothing left to tear down.
        pipeline.cancel();
        assert!(logs_contain(
            "pipeline cancelled before the source transmitted"
        ));
    }

    #[test]
    fn do_end_fires_cancelled_before_transmission() {
        let states = Arc::new(Mutex::new(Vec::new()));
        let s = states.clone();
        let mut pipeline = Disposer::create(1).do_end(move |state| s.lock().push(state));

        pipeline.cancel();
        pipeline.cancel();

        assert_eq!(*states.lock(), vec![EndState::Cancelled]);
    }

    #[test]
    fn do_error_observes_without_consuming() {
        let recorder = Recorder::default();
        let seen = Arc::new(Mutex::new(Vec::new()));
        let s = seen.clone();

        Disposer::<i32>::defer(|| Err("oops".into()))
            .do_error(move |e| s.lock().push(e.to_string()))
            .subscribe(recorder.clone());

        assert_eq!(*seen.lock(), vec!["oops".to_string()]);
        assert_eq!(
            recorder.events(),
            vec![
                Seen::Start,
                Seen::Error("oops".to_string()),
                Seen::End(EndState::Normal)
            ]
        );
    }

    #[test]
    fn bound_signal_cancels_with_single_cancelled_end() {
        let signal = ManualSignal::new();
        let recorder = Recorder::default();

        // Leaf never produces: transmission stalls until the signal fires.
        let (tx, rx) = std::sync::mpsc::channel::<i32>();
        let pipeline = Disposer::defer(move || Ok(rx.recv().unwrap_or(0)));
        let bound = pipeline.bind_cancel(&signal);

        // Fire before subscribing: the node is already cancelled and the
        // subscriber still receives its terminal event.
        signal.fire();
        bound.subscribe(recorder.clone());
        drop(tx);

        assert_eq!(recorder.events(), vec![Seen::End(EndState::Cancelled)]);
    }

    #[test]
    fn completed_pipeline_ignores_late_signal() {
        let signal = ManualSignal::new();
        let recorder = Recorder::default();

        Disposer::create(5)
            .bind_cancel(&signal)
            .subscribe(recorder.clone());
        signal.fire();

        assert_eq!(
            recorder.events(),
            vec![Seen::Start, Seen::Call(5), Seen::End(EndState::Normal)]
        );
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn schedule_on_preserves_event_order() {
        let handle = tokio::runtime::Handle::current();
        let recorder = Recorder::default();
        let (done_tx, done_rx) = tokio::sync::oneshot::channel();

        let mut done_tx = Some(done_tx);
        Disposer::defer(|| Ok(9))
            .schedule_on(Scheduler::worker(&handle), Scheduler::worker(&handle))
            .do_end(move |_| {
                // Runs on the accepter scheduler after the recorder saw End.
                if let Some(tx) = done_tx.take() {
                    let _ = tx.send(());
                }
            })
            .subscribe(recorder.clone());

        tokio::time::timeout(Duration::from_secs(5), done_rx)
            .await
            .expect("pipeline did not finish")
            .expect("done signal dropped");
        assert_eq!(
            recorder.events(),
            vec![Seen::Start, Seen::Call(9), Seen::End(EndState::Normal)]
        );
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn signal_cancels_in_flight_transmission() {
        let handle = tokio::runtime::Handle::current();
        let signal = ManualSignal::new();
        let recorder = Recorder::default();

        let (release_tx, release_rx) = std::sync::mpsc::channel::<i32>();
        let (started_tx, started_rx) = std::sync::mpsc::channel::<()>();
        Disposer::defer(move || {
            let _ = started_tx.send(());
            Ok(release_rx.recv().unwrap_or(0))
        })
        .schedule_on(Scheduler::worker(&handle), Scheduler::inline())
        .bind_cancel(&signal)
        .subscribe(recorder.clone());

        // The leaf is blocked mid-call on the worker when the signal fires.
        started_rx
            .recv_timeout(Duration::from_secs(5))
            .expect("leaf did not start");
        signal.fire();
        assert_eq!(
            recorder.events(),
            vec![Seen::Start, Seen::End(EndState::Cancelled)]
        );

        // Releasing the blocked call must not resurrect the pipeline: the
        // value and the normal end are dropped, not delivered late.
        release_tx.send(7).expect("worker gone");
        std::thread::sleep(Duration::from_millis(100));
        assert_eq!(
            recorder.events(),
            vec![Seen::Start, Seen::End(EndState::Cancelled)]
        );
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn cancelling_scheduled_pipeline_delivers_cancelled_end() {
        let handle = tokio::runtime::Handle::current();
        let recorder = Recorder::default();

        // The leaf blocks until released so cancellation wins the race.
        let (release_tx, release_rx) = std::sync::mpsc::channel::<()>();
        let mut pipeline = Disposer::defer(move || {
            let _ = release_rx.recv();
            Ok(1)
        })
        .schedule_on(Scheduler::worker(&handle), Scheduler::inline());

        pipeline.cancel();
        pipeline.cancel();
        drop(release_tx);

        assert_eq!(recorder.events(), Vec::<Seen>::new());
        // A subscription after cancellation still sees the terminal event.
        pipeline.subscribe(recorder.clone());
        assert_eq!(recorder.events(), vec![Seen::End(EndState::Cancelled)]);
    }
}

