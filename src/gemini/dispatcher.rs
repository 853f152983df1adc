/**
 * ============================================================================
 * GEMINI DISPATCHER MODULE
 * ============================================================================
 *
 * PURPOSE: Serialized, rate-limited queue for every call to the Gemini API
 *
 * GUARANTEES:
 * - Strict FIFO, one request in flight at a time
 * - At least `min_interval` between the starts of consecutive dispatches
 * - A failed item rejects its own result and the queue keeps draining
 * - At most one drain loop (Idle/Draining check-and-set)
 *
 * ARCHITECTURE:
 * - One Dispatcher per process, cloned as a handle
 * - enqueue() appends and, if Idle, spawns the drain task
 * - Each item settles a oneshot channel wrapped by `Dispatched<T>`
 * - Loading/error state published through a watch channel
 *
 * Items are never cancelled once queued. Dropping a `Dispatched` only
 * discards the result; the network call still happens.
 *
 * ============================================================================
 */

use crate::gemini::types::{DispatcherStatus, GeminiError, QueueStats, UNKNOWN_ERROR_MESSAGE};
use futures_util::future::BoxFuture;
use futures_util::FutureExt;
use std::collections::VecDeque;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::pin::Pin;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::task::{Context, Poll};
use std::time::Duration;
use tokio::sync::{oneshot, watch};
use tokio::time::{sleep, Instant};
use uuid::Uuid;

// =============================================================================
// Types
// =============================================================================

/// Deferred network call. Resolves to the error message on failure.
type Job = Box<dyn FnOnce() -> BoxFuture<'static, Option<String>> + Send>;

struct QueueItem {
    id: Uuid,
    execute: Job,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum DrainPhase {
    Idle,
    Draining,
}

struct DispatcherState {
    queue: VecDeque<QueueItem>,
    phase: DrainPhase,
    last_dispatch: Option<Instant>,
    stats: QueueStats,
}

struct Inner {
    state: Mutex<DispatcherState>,
    min_interval: Duration,
    status: watch::Sender<DispatcherStatus>,
}

/**
 * Handle to the process-wide request queue
 * Cloning shares the same queue, drain loop and status
 */
#[derive(Clone)]
pub struct Dispatcher {
    inner: Arc<Inner>,
}

/**
 * Result of one enqueued operation
 * Resolves once the operation has run and settled
 */
pub struct Dispatched<T> {
    id: Uuid,
    rx: oneshot::Receiver<Result<T, GeminiError>>,
}

impl<T> Dispatched<T> {
    pub fn id(&self) -> Uuid {
        self.id
    }
}

impl<T> Future for Dispatched<T> {
    type Output = Result<T, GeminiError>;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        // Sender dropped without a value only if the operation panicked
        Pin::new(&mut self.get_mut().rx)
            .poll(cx)
            .map(|settled| settled.unwrap_or(Err(GeminiError::Unknown)))
    }
}

// =============================================================================
// Public API
// =============================================================================

impl Dispatcher {
    pub fn new(min_interval: Duration) -> Self {
        let (status, _) = watch::channel(DispatcherStatus::default());

        Self {
            inner: Arc::new(Inner {
                state: Mutex::new(DispatcherState {
                    queue: VecDeque::new(),
                    phase: DrainPhase::Idle,
                    last_dispatch: None,
                    stats: QueueStats::default(),
                }),
                min_interval,
                status,
            }),
        }
    }

    pub fn min_interval(&self) -> Duration {
        self.inner.min_interval
    }

    /**
     * Queue an operation for dispatch
     * Must be called from within a Tokio runtime (the drain loop is spawned)
     *
     * # Arguments
     * * `operation` - Performs exactly one network call when invoked
     *
     * # Returns
     * Future resolving to the operation's result, or its normalized error
     */
    pub fn enqueue<T, F, Fut>(&self, operation: F) -> Dispatched<T>
    where
        T: Send + 'static,
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = Result<T, GeminiError>> + Send + 'static,
    {
        let id = Uuid::new_v4();
        let (tx, rx) = oneshot::channel();

        let execute: Job = Box::new(move || {
            Box::pin(async move {
                let result = operation().await.map_err(GeminiError::normalized);
                let failure = result.as_ref().err().map(|e| e.to_string());
                // Caller may have lost interest; the call still counted
                let _ = tx.send(result);
                failure
            })
        });

        let start_drain = {
            let mut state = self.inner.lock_state();
            state.queue.push_back(QueueItem { id, execute });
            state.stats.jobs_submitted += 1;
            state.stats.jobs_pending += 1;

            let start = state.phase == DrainPhase::Idle;
            if start {
                state.phase = DrainPhase::Draining;
                state.stats.drain_starts += 1;
            }

            let pending = state.stats.jobs_pending;
            self.inner.status.send_modify(|s| s.pending = pending);
            start
        };

        log::info!("[DISPATCHER] Queued request {}", id);

        if start_drain {
            let inner = self.inner.clone();
            tokio::spawn(async move {
                drain(inner).await;
            });
        }

        Dispatched { id, rx }
    }

    pub fn status(&self) -> DispatcherStatus {
        self.inner.status.borrow().clone()
    }

    /// Watch loading/error changes
    pub fn subscribe(&self) -> watch::Receiver<DispatcherStatus> {
        self.inner.status.subscribe()
    }

    pub fn stats(&self) -> QueueStats {
        self.inner.lock_state().stats.clone()
    }

    pub fn clear_error(&self) {
        self.inner.lock_state().stats.last_error = None;
        self.inner.status.send_modify(|s| s.last_error = None);
    }

    pub fn is_draining(&self) -> bool {
        self.inner.lock_state().phase == DrainPhase::Draining
    }
}

impl Inner {
    fn lock_state(&self) -> MutexGuard<'_, DispatcherState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

// =============================================================================
// Drain Loop
// =============================================================================

/**
 * Time still to wait before the next dispatch may start
 * Only the most recent dispatch matters; zero means go now
 */
fn remaining_delay(last_dispatch: Option<Instant>, now: Instant, min_interval: Duration) -> Option<Duration> {
    let elapsed = now.saturating_duration_since(last_dispatch?);
    let remaining = min_interval.saturating_sub(elapsed);
    (!remaining.is_zero()).then_some(remaining)
}

async fn drain(inner: Arc<Inner>) {
    log::info!("[DISPATCHER] Drain loop started");

    loop {
        let delay = {
            let mut state = inner.lock_state();
            if state.queue.is_empty() {
                state.phase = DrainPhase::Idle;
                break;
            }
            remaining_delay(state.last_dispatch, Instant::now(), inner.min_interval)
        };

        if let Some(delay) = delay {
            log::debug!("[DISPATCHER] Rate limit: waiting {}ms", delay.as_millis());
            sleep(delay).await;
        }

        let item = {
            let mut state = inner.lock_state();
            match state.queue.pop_front() {
                Some(item) => {
                    state.last_dispatch = Some(Instant::now());
                    state.stats.last_error = None;
                    item
                }
                None => {
                    state.phase = DrainPhase::Idle;
                    break;
                }
            }
        };

        inner.status.send_modify(|s| {
            s.is_loading = true;
            s.last_error = None;
        });

        log::info!("[DISPATCHER] ▶ Dispatching request {}", item.id);
        // A panicking operation drops its sender, so its caller sees Unknown
        let failure = match AssertUnwindSafe((item.execute)()).catch_unwind().await {
            Ok(failure) => failure,
            Err(_) => {
                log::error!("[DISPATCHER] Request {} panicked", item.id);
                Some(UNKNOWN_ERROR_MESSAGE.to_string())
            }
        };

        let pending = {
            let mut state = inner.lock_state();
            state.stats.jobs_pending = state.stats.jobs_pending.saturating_sub(1);
            match &failure {
                Some(message) => {
                    state.stats.jobs_failed += 1;
                    state.stats.last_error = Some(message.clone());
                }
                None => state.stats.jobs_completed += 1,
            }
            state.stats.jobs_pending
        };

        match &failure {
            Some(message) => log::error!("[DISPATCHER] Request {} failed: {}", item.id, message),
            None => log::info!("[DISPATCHER] ✓ Request {} completed", item.id),
        }

        inner.status.send_modify(|s| {
            s.is_loading = false;
            s.last_error = failure;
            s.pending = pending;
        });
    }

    log::info!("[DISPATCHER] Queue empty, drain loop stopped");
}

// =============================================================================
// Tests
// =============================================================================
