//! One-shot timer scheduling for delayed transitions.
//!
//! The interpreter treats its scheduler as an injected dependency so tests
//! can run on deterministic virtual time. [`ThreadTimers`] is the default:
//! each scheduled timer parks a thread until the deadline or cancellation.
//! [`ManualTimers`] only moves when told to via [`ManualTimers::advance`].
//!
//! Cancellation is best-effort everywhere: a callback that has already
//! raced past its cancel still runs, and callers are expected to re-check
//! their own state before acting (the interpreter re-checks occupancy under
//! its lock).

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, RecvTimeoutError};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Duration;
use tracing::trace;

/// Callback invoked when a timer fires.
pub type TimerCallback = Box<dyn FnOnce() + Send>;

/// One-shot scheduler with fire-and-cancel semantics.
pub trait TimerService: Send + Sync {
    /// Arrange for `callback` to run once after `delay`. The returned handle
    /// cancels the timer when dropped or explicitly cancelled.
    fn schedule(&self, delay: Duration, callback: TimerCallback) -> TimerHandle;
}

/// Handle to a scheduled timer.
///
/// Dropping the handle cancels the timer, so owning a handle is owning the
/// pending callback.
pub struct TimerHandle {
    cancel: Box<dyn Fn() + Send>,
}

impl TimerHandle {
    /// Wrap a cancellation hook. Implementors of [`TimerService`] call this.
    pub fn new(cancel: impl Fn() + Send + 'static) -> Self {
        Self {
            cancel: Box::new(cancel),
        }
    }

    /// Cancel the timer without waiting for the drop.
    pub fn cancel(&self) {
        (self.cancel)();
    }
}

impl Drop for TimerHandle {
    fn drop(&mut self) {
        (self.cancel)();
    }
}

impl std::fmt::Debug for TimerHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TimerHandle").finish_non_exhaustive()
    }
}

/// Thread-backed timers.
///
/// Each schedule spawns a short-lived thread that waits on a channel;
/// cancellation wakes the thread before the deadline and the callback is
/// dropped unrun.
#[derive(Clone, Copy, Debug, Default)]
pub struct ThreadTimers;

impl TimerService for ThreadTimers {
    fn schedule(&self, delay: Duration, callback: TimerCallback) -> TimerHandle {
        let (tx, rx) = mpsc::sync_channel::<()>(1);
        trace!(delay_ms = delay.as_millis() as u64, "timer scheduled");
        thread::spawn(move || match rx.recv_timeout(delay) {
            Err(RecvTimeoutError::Timeout) => callback(),
            Ok(()) | Err(RecvTimeoutError::Disconnected) => {}
        });
        TimerHandle::new(move || {
            let _ = tx.try_send(());
        })
    }
}

/// Deterministic timers for tests: the clock only moves via [`advance`].
///
/// Due callbacks run in deadline order (insertion order on ties) and may
/// themselves schedule further timers, which fire in the same `advance`
/// call if their deadlines fall inside it.
///
/// [`advance`]: ManualTimers::advance
///
/// # Example
///
/// ```rust
/// use statecraft::timer::{ManualTimers, TimerService};
/// use std::sync::atomic::{AtomicBool, Ordering};
/// use std::sync::Arc;
/// use std::time::Duration;
///
/// let timers = ManualTimers::new();
/// let fired = Arc::new(AtomicBool::new(false));
/// let flag = fired.clone();
/// let _handle = timers.schedule(
///     Duration::from_millis(50),
///     Box::new(move || flag.store(true, Ordering::SeqCst)),
/// );
///
/// timers.advance(Duration::from_millis(49));
/// assert!(!fired.load(Ordering::SeqCst));
/// timers.advance(Duration::from_millis(1));
/// assert!(fired.load(Ordering::SeqCst));
/// ```
#[derive(Clone, Default)]
pub struct ManualTimers {
    inner: Arc<Mutex<ManualInner>>,
}

#[derive(Default)]
struct ManualInner {
    now: Duration,
    next_seq: u64,
    entries: Vec<ManualEntry>,
}

struct ManualEntry {
    deadline: Duration,
    seq: u64,
    cancelled: Arc<AtomicBool>,
    callback: Option<TimerCallback>,
}

impl ManualTimers {
    pub fn new() -> Self {
        Self::default()
    }

    /// Current virtual time.
    pub fn now(&self) -> Duration {
        self.lock().now
    }

    /// Number of scheduled timers that are neither fired nor cancelled.
    pub fn pending(&self) -> usize {
        self.lock()
            .entries
            .iter()
            .filter(|e| e.callback.is_some() && !e.cancelled.load(Ordering::SeqCst))
            .count()
    }

    /// Move the clock forward, firing every due callback in deadline order.
    ///
    /// Callbacks run outside the internal lock, so they may schedule or
    /// cancel timers freely.
    pub fn advance(&self, by: Duration) {
        let target = self.lock().now + by;
        self.fire_due(target);
        self.lock().now = target;
        self.gc();
    }

    fn fire_due(&self, target: Duration) {
        loop {
            let next = {
                let mut inner = self.lock();
                let due = inner
                    .entries
                    .iter()
                    .enumerate()
                    .filter(|(_, e)| {
                        e.deadline <= target
                            && e.callback.is_some()
                            && !e.cancelled.load(Ordering::SeqCst)
                    })
                    .min_by_key(|(_, e)| (e.deadline, e.seq))
                    .map(|(i, _)| i);
                match due {
                    Some(i) => {
                        let deadline = inner.entries[i].deadline;
                        let callback = inner.entries[i].callback.take();
                        inner.now = deadline.max(inner.now);
                        callback
                    }
                    None => None,
                }
            };
            match next {
                Some(callback) => callback(),
                None => break,
            }
        }
    }

    fn gc(&self) {
        self.lock()
            .entries
            .retain(|e| e.callback.is_some() && !e.cancelled.load(Ordering::SeqCst));
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, ManualInner> {
        self.inner
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
    }
}

impl TimerService for ManualTimers {
    fn schedule(&self, delay: Duration, callback: TimerCallback) -> TimerHandle {
        let cancelled = Arc::new(AtomicBool::new(false));
        {
            let mut inner = self.lock();
            let deadline = inner.now + delay;
            let seq = inner.next_seq;
            inner.next_seq += 1;
            inner.entries.push(ManualEntry {
                deadline,
                seq,
                cancelled: cancelled.clone(),
                callback: Some(callback),
            });
        }
        TimerHandle::new(move || cancelled.store(true, Ordering::SeqCst))
    }
}

impl std::fmt::Debug for ManualTimers {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ManualTimers")
            .field("now", &self.now())
            .field("pending", &self.pending())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;

    #[test]
    fn manual_timer_fires_at_deadline() {
        let timers = ManualTimers::new();
        let fired = Arc::new(AtomicBool::new(false));
        let flag = fired.clone();
        let _handle = timers.schedule(
            Duration::from_millis(100),
            Box::new(move || flag.store(true, Ordering::SeqCst)),
        );

        timers.advance(Duration::from_millis(99));
        assert!(!fired.load(Ordering::SeqCst));
        timers.advance(Duration::from_millis(1));
        assert!(fired.load(Ordering::SeqCst));
        assert_eq!(timers.pending(), 0);
    }

    #[test]
    fn dropping_handle_cancels() {
        let timers = ManualTimers::new();
        let fired = Arc::new(AtomicBool::new(false));
        let flag = fired.clone();
        let handle = timers.schedule(
            Duration::from_millis(10),
            Box::new(move || flag.store(true, Ordering::SeqCst)),
        );
        drop(handle);

        timers.advance(Duration::from_millis(50));
        assert!(!fired.load(Ordering::SeqCst));
    }

    #[test]
    fn explicit_cancel_stops_firing() {
        let timers = ManualTimers::new();
        let fired = Arc::new(AtomicBool::new(false));
        let flag = fired.clone();
        let handle = timers.schedule(
            Duration::from_millis(10),
            Box::new(move || flag.store(true, Ordering::SeqCst)),
        );
        handle.cancel();

        timers.advance(Duration::from_millis(50));
        assert!(!fired.load(Ordering::SeqCst));
    }

    #[test]
    fn due_timers_fire_in_deadline_order() {
        let timers = ManualTimers::new();
        let order = Arc::new(Mutex::new(Vec::new()));

        for (delay, label) in [(30u64, "b"), (10, "a"), (50, "c")] {
            let order = order.clone();
            // handles leak on purpose: forget cancels-on-drop
            std::mem::forget(timers.schedule(
                Duration::from_millis(delay),
                Box::new(move || order.lock().unwrap().push(label)),
            ));
        }

        timers.advance(Duration::from_millis(100));
        assert_eq!(*order.lock().unwrap(), vec!["a", "b", "c"]);
    }

    #[test]
    fn callback_may_schedule_followup_within_advance() {
        let timers = ManualTimers::new();
        let count = Arc::new(AtomicUsize::new(0));

        let inner_timers = timers.clone();
        let inner_count = count.clone();
        std::mem::forget(timers.schedule(
            Duration::from_millis(10),
            Box::new(move || {
                inner_count.fetch_add(1, Ordering::SeqCst);
                let c = inner_count.clone();
                std::mem::forget(inner_timers.schedule(
                    Duration::from_millis(10),
                    Box::new(move || {
                        c.fetch_add(1, Ordering::SeqCst);
                    }),
                ));
            }),
        ));

        timers.advance(Duration::from_millis(25));
        assert_eq!(count.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn thread_timer_fires_and_cancels() {
        let timers = ThreadTimers;
        let fired = Arc::new(AtomicBool::new(false));

        let flag = fired.clone();
        let handle = timers.schedule(
            Duration::from_millis(20),
            Box::new(move || flag.store(true, Ordering::SeqCst)),
        );
        thread::sleep(Duration::from_millis(80));
        assert!(fired.load(Ordering::SeqCst));
        drop(handle);

        let cancelled_fired = Arc::new(AtomicBool::new(false));
        let flag = cancelled_fired.clone();
        let handle = timers.schedule(
            Duration::from_millis(50),
            Box::new(move || flag.store(true, Ordering::SeqCst)),
        );
        handle.cancel();
        thread::sleep(Duration::from_millis(100));
        assert!(!cancelled_fired.load(Ordering::SeqCst));
    }
}
