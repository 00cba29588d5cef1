//! Ordered FIFO of admitted utterances; enforces at-most-one in flight.
//!
//! See spec.md §4.4. Grounded on `fae::pipeline::coordinator`'s use of
//! `Arc<Mutex<..>>` shared state mutated from one logical context, plus a
//! `tokio::spawn`ed task for the one genuinely asynchronous step (the
//! settle delay between utterances).

use crate::sink::SinkAdapter;
use crate::utterance::Utterance;
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use uuid::Uuid;

/// Delay between one utterance completing and the next being dispatched,
/// so sink backends don't coalesce adjacent utterances (§4.4). Fixed, not
/// configurable in the core.
pub const SETTLE_DELAY: Duration = Duration::from_millis(120);

struct Inner {
    pending: VecDeque<Utterance>,
    in_flight_id: Option<Uuid>,
}

/// Single-consumer utterance queue. Cheap to clone (shares state via `Arc`).
#[derive(Clone)]
pub struct Queue {
    inner: Arc<Mutex<Inner>>,
    sink: Arc<dyn SinkAdapter>,
    settle_delay: Duration,
}

impl Queue {
    pub fn new(sink: Arc<dyn SinkAdapter>) -> Self {
        Self::with_settle_delay(sink, SETTLE_DELAY)
    }

    /// Construct with an explicit settle delay. Exposed for tests only;
    /// production code should use [`Queue::new`], which uses the fixed
    /// spec.md-mandated delay.
    pub fn with_settle_delay(sink: Arc<dyn SinkAdapter>, settle_delay: Duration) -> Self {
        Self {
            inner: Arc::new(Mutex::new(Inner {
                pending: VecDeque::new(),
                in_flight_id: None,
            })),
            sink,
            settle_delay,
        }
    }

    /// O(1), non-blocking. If nothing is in flight, dispatches immediately;
    /// otherwise the utterance waits at the back of the queue.
    pub fn enqueue(&self, utterance: Utterance) {
        {
            let mut inner = self.inner.lock().expect("queue mutex poisoned");
            inner.pending.push_back(utterance);
        }
        advance(self.inner.clone(), self.sink.clone(), self.settle_delay);
    }

    /// Text of every utterance currently pending (not yet dispatched).
    /// Used by [`crate::policy::admit`]'s queue-dedup check.
    pub fn pending_texts(&self) -> Vec<String> {
        let inner = self.inner.lock().expect("queue mutex poisoned");
        inner.pending.iter().map(|u| u.text.clone()).collect()
    }

    pub fn pending_len(&self) -> usize {
        self.inner.lock().expect("queue mutex poisoned").pending.len()
    }

    pub fn is_in_flight(&self) -> bool {
        self.inner.lock().expect("queue mutex poisoned").in_flight_id.is_some()
    }

    /// Invokes the sink's cancel affordance, drops all pending utterances,
    /// and clears in-flight state. Any completion callback that later
    /// fires for the just-cancelled utterance is ignored (§5).
    pub fn cancel(&self) {
        self.sink.cancel();
        let mut inner = self.inner.lock().expect("queue mutex poisoned");
        inner.pending.clear();
        inner.in_flight_id = None;
    }
}

/// If nothing is in flight and something is pending, pop and dispatch it.
fn advance(inner: Arc<Mutex<Inner>>, sink: Arc<dyn SinkAdapter>, settle_delay: Duration) {
    let next = {
        let mut guard = inner.lock().expect("queue mutex poisoned");
        if guard.in_flight_id.is_some() {
            None
        } else {
            let next = guard.pending.pop_front();
            if let Some(u) = &next {
                guard.in_flight_id = Some(u.id);
            }
            next
        }
    };
    if let Some(utterance) = next {
        dispatch(inner, sink, settle_delay, utterance);
    }
}

fn dispatch(inner: Arc<Mutex<Inner>>, sink: Arc<dyn SinkAdapter>, settle_delay: Duration, utterance: Utterance) {
    let id = utterance.id;
    let inner_for_completion = inner.clone();
    let sink_for_completion = sink.clone();

    sink.deliver(
        &utterance,
        Box::new(move |result| {
            if let Err(e) = &result {
                tracing::warn!(error = %e, "sink delivery failed; advancing queue anyway");
            }
            let inner = inner_for_completion.clone();
            let sink = sink_for_completion.clone();
            tokio::spawn(async move {
                let still_current = {
                    let mut guard = inner.lock().expect("queue mutex poisoned");
                    if guard.in_flight_id == Some(id) {
                        guard.in_flight_id = None;
                        true
                    } else {
                        false
                    }
                };
                if !still_current {
                    // Stale completion for a cancelled utterance: idempotent, no-op.
                    return;
                }
                tokio::time::sleep(settle_delay).await;
                advance(inner, sink, settle_delay);
            });
        }),
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::classifier::{FinalClassification, Severity};
    use crate::config::Prosody;
    use crate::error::Result;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Instant;
    use tokio::sync::Mutex as AsyncMutex;

    fn utterance(text: &str, key: u64) -> Utterance {
        Utterance::new(
            text.to_string(),
            FinalClassification {
                kind: "Error".to_string(),
                severity: Severity::Normal,
                stable_key: key,
            },
            Instant::now(),
            None,
            Prosody::default(),
        )
    }

    /// A sink that records delivery order and completes after a short delay.
    struct RecordingSink {
        order: Arc<AsyncMutex<Vec<String>>>,
        concurrent_in_flight: Arc<AtomicUsize>,
        max_concurrent: Arc<AtomicUsize>,
    }

    impl SinkAdapter for RecordingSink {
        fn deliver(&self, utterance: &Utterance, on_complete: Box<dyn FnOnce(Result<()>) + Send>) {
            let order = self.order.clone();
            let text = utterance.text.clone();
            let concurrent = self.concurrent_in_flight.clone();
            let max_concurrent = self.max_concurrent.clone();
            let now = concurrent.fetch_add(1, Ordering::SeqCst) + 1;
            max_concurrent.fetch_max(now, Ordering::SeqCst);
            tokio::spawn(async move {
                tokio::time::sleep(Duration::from_millis(10)).await;
                order.lock().await.push(text);
                concurrent.fetch_sub(1, Ordering::SeqCst);
                on_complete(Ok(()));
            });
        }

        fn cancel(&self) {}

        fn list_voices(&self) -> Vec<String> {
            vec![]
        }
    }

    #[tokio::test]
    async fn delivers_in_admission_order() {
        let order = Arc::new(AsyncMutex::new(Vec::new()));
        let sink = Arc::new(RecordingSink {
            order: order.clone(),
            concurrent_in_flight: Arc::new(AtomicUsize::new(0)),
            max_concurrent: Arc::new(AtomicUsize::new(0)),
        });
        let queue = Queue::with_settle_delay(sink, Duration::from_millis(5));

        queue.enqueue(utterance("a", 1));
        queue.enqueue(utterance("b", 2));
        queue.enqueue(utterance("c", 3));

        tokio::time::sleep(Duration::from_millis(200)).await;

        assert_eq!(*order.lock().await, vec!["a", "b", "c"]);
    }

    #[tokio::test]
    async fn never_more_than_one_in_flight() {
        let order = Arc::new(AsyncMutex::new(Vec::new()));
        let max_concurrent = Arc::new(AtomicUsize::new(0));
        let sink = Arc::new(RecordingSink {
            order,
            concurrent_in_flight: Arc::new(AtomicUsize::new(0)),
            max_concurrent: max_concurrent.clone(),
        });
        let queue = Queue::with_settle_delay(sink, Duration::from_millis(5));

        for i in 0..5 {
            queue.enqueue(utterance(&format!("u{i}"), i));
        }

        tokio::time::sleep(Duration::from_millis(300)).await;
        assert_eq!(max_concurrent.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn cancel_empties_queue_and_ignores_late_completion() {
        let order = Arc::new(AsyncMutex::new(Vec::new()));
        let sink = Arc::new(RecordingSink {
            order: order.clone(),
            concurrent_in_flight: Arc::new(AtomicUsize::new(0)),
            max_concurrent: Arc::new(AtomicUsize::new(0)),
        });
        let queue = Queue::with_settle_delay(sink, Duration::from_millis(5));

        queue.enqueue(utterance("a", 1));
        queue.enqueue(utterance("b", 2));
        // "a" is in flight (10ms delivery delay); cancel before it completes.
        queue.cancel();

        assert_eq!(queue.pending_len(), 0);
        assert!(!queue.is_in_flight());

        tokio::time::sleep(Duration::from_millis(100)).await;
        // The in-flight completion for "a" still fires, but must not
        // resurrect "b" or appear to still be in flight.
        assert!(!queue.is_in_flight());
        assert_eq!(queue.pending_len(), 0);
    }

    #[tokio::test]
    async fn pending_texts_reflects_queue_dedup_surface() {
        let order = Arc::new(AsyncMutex::new(Vec::new()));
        let sink = Arc::new(RecordingSink {
            order,
            concurrent_in_flight: Arc::new(AtomicUsize::new(0)),
            max_concurrent: Arc::new(AtomicUsize::new(0)),
        });
        let queue = Queue::with_settle_delay(sink, Duration::from_millis(5));

        queue.enqueue(utterance("first", 1)); // dispatched immediately, not "pending"
        queue.enqueue(utterance("second", 2));
        queue.enqueue(utterance("third", 3));

        assert_eq!(queue.pending_texts(), vec!["second", "third"]);
    }
}
