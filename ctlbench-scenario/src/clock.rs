//! Time sources that drive scenario loops.
//!
//! A [`Clock`] tells time, schedules delayed calls and runs the continuations of in-flight
//! requests. Scenarios never read the system time directly, which allows them to be driven
//! deterministically:
//!
//! - [`ManualClock`] is a virtual clock that only moves when [`ManualClock::advance`] is called.
//!   All scheduled calls and spawned continuations run on the advancing thread, in order.
//! - [`TokioClock`] follows the tokio runtime's clock and runs everything on the runtime.

use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::task::{Context, Poll};
use std::time::Duration;

use futures::StreamExt;
use futures::future::BoxFuture;
use futures::stream::FuturesUnordered;
use futures::task::{self, ArcWake};
use tokio::runtime::Handle;
use tokio::task::AbortHandle;
use tokio::time::Instant;

/// A call scheduled with [`Clock::call_later`].
pub type Callback = Box<dyn FnOnce() + Send + 'static>;

/// Identifies a call scheduled with [`Clock::call_later`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TimerId(u64);

/// A time source that drives scenario loops.
pub trait Clock: fmt::Debug + Send + Sync + 'static {
    /// Returns the time elapsed since the clock's epoch.
    fn now(&self) -> Duration;

    /// Schedules `callback` to run once `delay` has elapsed.
    fn call_later(&self, delay: Duration, callback: Callback) -> TimerId;

    /// Cancels a scheduled call.
    ///
    /// Cancelling a call that has already run or was already cancelled has no effect.
    fn cancel(&self, id: TimerId);

    /// Runs `task` to completion in the background.
    ///
    /// The task is never cancelled. A task that never completes is simply never polled to the
    /// end, which is how dropped requests are modeled.
    fn spawn(&self, task: BoxFuture<'static, ()>);
}

/// Wake flag for tasks spawned on a [`ManualClock`].
#[derive(Debug, Default)]
struct WakeFlag(AtomicBool);

impl ArcWake for WakeFlag {
    fn wake_by_ref(arc_self: &Arc<Self>) {
        arc_self.0.store(true, Ordering::SeqCst);
    }
}

#[derive(Default)]
struct Schedule {
    now: Duration,
    next_id: u64,
    calls: BTreeMap<(Duration, TimerId), Callback>,
}

/// A virtual clock that only advances when told to.
///
/// Scheduled calls fire in order of their deadline, and calls with equal deadlines fire in the
/// order they were scheduled. Spawned tasks are polled immediately and again after every call
/// that fires, so a task that completes without waiting on anything external finishes before
/// the next scheduled call runs.
#[derive(Default)]
pub struct ManualClock {
    schedule: Mutex<Schedule>,
    tasks: Mutex<FuturesUnordered<BoxFuture<'static, ()>>>,
    incoming: Mutex<Vec<BoxFuture<'static, ()>>>,
    woken: Arc<WakeFlag>,
}

impl ManualClock {
    /// Creates a new clock at time zero.
    pub fn new() -> Self {
        Self::default()
    }

    /// Moves time forward by `amount`, running every call that becomes due.
    ///
    /// Calls scheduled by a running callback fire during the same advance if their deadline
    /// falls within it. While a call runs, [`Clock::now`] reports its deadline.
    pub fn advance(&self, amount: Duration) {
        let target = self.schedule.lock().unwrap().now + amount;

        loop {
            let callback = {
                let mut schedule = self.schedule.lock().unwrap();
                match schedule.calls.first_entry() {
                    Some(entry) if entry.key().0 <= target => {
                        let ((deadline, _), callback) = entry.remove_entry();
                        schedule.now = schedule.now.max(deadline);
                        callback
                    }
                    _ => {
                        schedule.now = target;
                        break;
                    }
                }
            };

            callback();
            self.run_until_stalled();
        }
    }

    /// Advances the clock by each of the given amounts in turn.
    pub fn pump(&self, amounts: impl IntoIterator<Item = Duration>) {
        for amount in amounts {
            self.advance(amount);
        }
    }

    /// Returns the number of scheduled calls that have not run yet.
    pub fn pending_calls(&self) -> usize {
        self.schedule.lock().unwrap().calls.len()
    }

    /// Returns the number of spawned tasks that have not completed yet.
    pub fn pending_tasks(&self) -> usize {
        let queued = self.incoming.lock().unwrap().len();
        queued + self.tasks.lock().unwrap().len()
    }

    /// Polls spawned tasks until none of them can make progress.
    ///
    /// This runs automatically on [`spawn`](Clock::spawn) and after every fired call. Call it
    /// directly after completing something a task waits on from outside the clock.
    pub fn run_until_stalled(&self) {
        // Tasks spawned from within a task end up in `incoming` and are picked up below.
        let Ok(mut tasks) = self.tasks.try_lock() else {
            return;
        };

        let waker = task::waker(Arc::clone(&self.woken));
        let mut cx = Context::from_waker(&waker);

        loop {
            tasks.extend(self.incoming.lock().unwrap().drain(..));
            self.woken.0.store(false, Ordering::SeqCst);

            match tasks.poll_next_unpin(&mut cx) {
                Poll::Ready(Some(())) => continue,
                Poll::Ready(None) | Poll::Pending => {
                    if !self.woken.0.load(Ordering::SeqCst)
                        && self.incoming.lock().unwrap().is_empty()
                    {
                        break;
                    }
                }
            }
        }
    }
}

impl Clock for ManualClock {
    fn now(&self) -> Duration {
        self.schedule.lock().unwrap().now
    }

    fn call_later(&self, delay: Duration, callback: Callback) -> TimerId {
        let mut schedule = self.schedule.lock().unwrap();
        let id = TimerId(schedule.next_id);
        schedule.next_id += 1;
        let deadline = schedule.now + delay;
        schedule.calls.insert((deadline, id), callback);
        id
    }

    fn cancel(&self, id: TimerId) {
        self.schedule
            .lock()
            .unwrap()
            .calls
            .retain(|&(_, scheduled), _| scheduled != id);
    }

    fn spawn(&self, task: BoxFuture<'static, ()>) {
        self.incoming.lock().unwrap().push(task);
        self.run_until_stalled();
    }
}

impl fmt::Debug for ManualClock {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ManualClock")
            .field("now", &self.now())
            .field("pending_calls", &self.pending_calls())
            .finish_non_exhaustive()
    }
}

/// A clock backed by the tokio runtime.
///
/// Time is measured with [`tokio::time::Instant`], so a runtime with paused time (see
/// [`tokio::time::pause`]) drives this clock as well.
#[derive(Debug)]
pub struct TokioClock {
    epoch: Instant,
    handle: Handle,
    next_id: AtomicU64,
    timers: Arc<Mutex<HashMap<TimerId, AbortHandle>>>,
}

impl TokioClock {
    /// Creates a clock on the current tokio runtime.
    ///
    /// # Panics
    ///
    /// Panics when called outside of a tokio runtime.
    pub fn new() -> Self {
        Self::with_handle(Handle::current())
    }

    /// Creates a clock that schedules onto the given runtime.
    pub fn with_handle(handle: Handle) -> Self {
        Self {
            epoch: Instant::now(),
            handle,
            next_id: AtomicU64::new(0),
            timers: Arc::new(Mutex::new(HashMap::new())),
        }
    }
}

impl Clock for TokioClock {
    fn now(&self) -> Duration {
        self.epoch.elapsed()
    }

    fn call_later(&self, delay: Duration, callback: Callback) -> TimerId {
        let id = TimerId(self.next_id.fetch_add(1, Ordering::Relaxed));

        // Hold the lock while spawning so the timer cannot remove itself before it is inserted.
        let mut timers = self.timers.lock().unwrap();
        let registry = Arc::clone(&self.timers);
        let handle = self.handle.spawn(async move {
            tokio::time::sleep(delay).await;
            registry.lock().unwrap().remove(&id);
            callback();
        });
        timers.insert(id, handle.abort_handle());

        id
    }

    fn cancel(&self, id: TimerId) {
        if let Some(handle) = self.timers.lock().unwrap().remove(&id) {
            handle.abort();
        }
    }

    fn spawn(&self, task: BoxFuture<'static, ()>) {
        self.handle.spawn(task);
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::AtomicUsize;

    use futures::FutureExt;
    use futures::channel::oneshot;

    use super::*;

    fn recorder() -> (Arc<Mutex<Vec<&'static str>>>, impl Fn(&'static str) -> Callback) {
        let log = Arc::new(Mutex::new(Vec::new()));
        let make = {
            let log = Arc::clone(&log);
            move |name: &'static str| -> Callback {
                let log = Arc::clone(&log);
                Box::new(move || log.lock().unwrap().push(name))
            }
        };
        (log, make)
    }

    #[test]
    fn manual_clock_starts_at_zero() {
        let clock = ManualClock::new();
        assert_eq!(clock.now(), Duration::ZERO);

        clock.advance(Duration::from_millis(1500));
        assert_eq!(clock.now(), Duration::from_millis(1500));
    }

    #[test]
    fn calls_fire_in_deadline_then_schedule_order() {
        let clock = ManualClock::new();
        let (log, call) = recorder();

        clock.call_later(Duration::from_secs(2), call("late"));
        clock.call_later(Duration::from_secs(1), call("first"));
        clock.call_later(Duration::from_secs(1), call("second"));

        clock.advance(Duration::from_millis(999));
        assert!(log.lock().unwrap().is_empty());

        clock.advance(Duration::from_millis(1));
        assert_eq!(*log.lock().unwrap(), ["first", "second"]);

        clock.advance(Duration::from_secs(5));
        assert_eq!(*log.lock().unwrap(), ["first", "second", "late"]);
        assert_eq!(clock.pending_calls(), 0);
    }

    #[test]
    fn cancelled_calls_never_fire() {
        let clock = ManualClock::new();
        let (log, call) = recorder();

        let id = clock.call_later(Duration::from_secs(1), call("cancelled"));
        clock.call_later(Duration::from_secs(1), call("kept"));
        clock.cancel(id);
        // Cancelling twice is harmless.
        clock.cancel(id);

        clock.advance(Duration::from_secs(1));
        assert_eq!(*log.lock().unwrap(), ["kept"]);
    }

    #[test]
    fn rescheduled_calls_fire_within_one_advance() {
        let clock = Arc::new(ManualClock::new());
        let fired = Arc::new(AtomicUsize::new(0));

        fn tick(clock: Arc<ManualClock>, fired: Arc<AtomicUsize>) {
            fired.fetch_add(1, Ordering::SeqCst);
            let next = Arc::clone(&clock);
            clock.call_later(Duration::from_secs(1), Box::new(move || tick(next, fired)));
        }

        let (c, f) = (Arc::clone(&clock), Arc::clone(&fired));
        clock.call_later(Duration::from_secs(1), Box::new(move || tick(c, f)));

        clock.advance(Duration::from_secs(3));
        assert_eq!(fired.load(Ordering::SeqCst), 3);
        assert_eq!(clock.pending_calls(), 1);
    }

    #[test]
    fn callbacks_observe_their_deadline() {
        let clock = Arc::new(ManualClock::new());
        let seen = Arc::new(Mutex::new(None));

        let (c, s) = (Arc::clone(&clock), Arc::clone(&seen));
        clock.call_later(
            Duration::from_millis(250),
            Box::new(move || *s.lock().unwrap() = Some(c.now())),
        );

        clock.advance(Duration::from_secs(1));
        assert_eq!(*seen.lock().unwrap(), Some(Duration::from_millis(250)));
        assert_eq!(clock.now(), Duration::from_secs(1));
    }

    #[test]
    fn ready_tasks_complete_on_spawn() {
        let clock = ManualClock::new();
        let done = Arc::new(AtomicBool::new(false));

        let flag = Arc::clone(&done);
        clock.spawn(async move { flag.store(true, Ordering::SeqCst) }.boxed());

        assert!(done.load(Ordering::SeqCst));
        assert_eq!(clock.pending_tasks(), 0);
    }

    #[test]
    fn pending_tasks_resume_when_woken() {
        let clock = ManualClock::new();
        let (tx, rx) = oneshot::channel::<()>();
        let done = Arc::new(AtomicBool::new(false));

        let flag = Arc::clone(&done);
        clock.spawn(
            async move {
                rx.await.ok();
                flag.store(true, Ordering::SeqCst);
            }
            .boxed(),
        );
        assert!(!done.load(Ordering::SeqCst));
        assert_eq!(clock.pending_tasks(), 1);

        tx.send(()).unwrap();
        clock.run_until_stalled();
        assert!(done.load(Ordering::SeqCst));
    }

    #[test]
    fn never_completing_tasks_do_not_block_the_clock() {
        let clock = ManualClock::new();
        clock.spawn(futures::future::pending().boxed());

        clock.advance(Duration::from_secs(10));
        assert_eq!(clock.now(), Duration::from_secs(10));
        assert_eq!(clock.pending_tasks(), 1);
    }

    #[test]
    #[should_panic(expected = "PoisonError")]
    fn panicked_tasks_poison_the_clock() {
        let clock = ManualClock::new();
        let spawn = std::panic::AssertUnwindSafe(|| {
            clock.spawn(async { panic!("task failed") }.boxed());
        });
        assert!(std::panic::catch_unwind(spawn).is_err());

        clock.pending_tasks();
    }

    #[tokio::test(start_paused = true)]
    async fn tokio_clock_runs_calls_after_delay() {
        let clock = TokioClock::new();
        let (tx, rx) = oneshot::channel();

        clock.call_later(
            Duration::from_secs(3),
            Box::new(move || {
                tx.send(()).ok();
            }),
        );

        rx.await.unwrap();
        assert!(clock.now() >= Duration::from_secs(3));
    }

    #[tokio::test(start_paused = true)]
    async fn tokio_clock_cancels_calls() {
        let clock = TokioClock::new();
        let fired = Arc::new(AtomicBool::new(false));

        let flag = Arc::clone(&fired);
        let id = clock.call_later(
            Duration::from_secs(1),
            Box::new(move || flag.store(true, Ordering::SeqCst)),
        );
        clock.cancel(id);

        tokio::time::sleep(Duration::from_secs(2)).await;
        assert!(!fired.load(Ordering::SeqCst));
        assert!(clock.timers.lock().unwrap().is_empty());
    }
}
