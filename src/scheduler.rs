//! Delayed message dispatch
//!
//! The [`Scheduler`] hands the emissions of a plan to a [`Timer`] as one
//! ordered sequence. Each runs once its delay (measured from the `schedule`
//! call) has passed, and emissions with strictly increasing delays run in
//! that order. Nothing is awaited on the caller's side, and there is no
//! cancellation: a scheduled message goes out unless the process exits
//! first.
//!
//! Two timers are provided:
//! - [`TokioTimer`]: one tokio task per sequence, sleeping to each deadline
//! - [`ManualClock`]: a virtual clock that only moves when told to, for tests

use crate::sink::Sink;
use crate::value::OscArg;
use crate::OscError;
use log::debug;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::runtime::Handle;
use tokio::sync::Notify;
use tokio::time::Instant;

/// Deferred unit of work handed to a [`Timer`]
pub type Task = Box<dyn FnOnce() + Send + 'static>;

/// One message of a plan: its arguments and when to send them
#[derive(Debug, Clone, PartialEq)]
pub struct ScheduledEmission {
    /// Delay from the moment the plan is scheduled
    pub delay: Duration,
    pub payload: Vec<OscArg>,
}

impl ScheduledEmission {
    pub fn new(delay: Duration, payload: Vec<OscArg>) -> Self {
        Self { delay, payload }
    }

    /// Emission sent without delay
    pub fn immediate(payload: Vec<OscArg>) -> Self {
        Self::new(Duration::ZERO, payload)
    }
}

/// "Run this after N" capability
pub trait Timer: Send + Sync {
    fn schedule_after(&self, delay: Duration, task: Task);

    /// Run `tasks` one after another, each once its own delay from now has
    /// passed
    ///
    /// Delays must be non-decreasing. The default hands every task to
    /// [`Timer::schedule_after`], which is enough for timers that order
    /// equal deadlines by submission.
    fn schedule_sequence(&self, tasks: Vec<(Duration, Task)>) {
        for (delay, task) in tasks {
            self.schedule_after(delay, task);
        }
    }
}

/// Dispatches emissions to a sink through a [`Timer`]
#[derive(Clone)]
pub struct Scheduler {
    timer: Arc<dyn Timer>,
}

impl Scheduler {
    pub fn new(timer: Arc<dyn Timer>) -> Self {
        Self { timer }
    }

    /// Schedule every emission for `path` and return immediately
    ///
    /// Returns the longest delay scheduled, i.e. how long until the last
    /// message is due. Emissions go out in delay order; equal delays keep
    /// the order they were given in.
    pub fn schedule<I>(&self, path: &str, emissions: I, sink: Arc<dyn Sink>) -> Duration
    where
        I: IntoIterator<Item = ScheduledEmission>,
    {
        let path: Arc<str> = Arc::from(path);

        let mut tasks: Vec<(Duration, Task)> = emissions
            .into_iter()
            .map(|ScheduledEmission { delay, payload }| {
                let path = Arc::clone(&path);
                let sink = Arc::clone(&sink);
                let task: Task = Box::new(move || sink.send(&path, &payload));
                (delay, task)
            })
            .collect();
        // stable, so ties stay in step order
        tasks.sort_by_key(|(delay, _)| *delay);

        let count = tasks.len();
        let horizon = tasks.last().map_or(Duration::ZERO, |(delay, _)| *delay);
        self.timer.schedule_sequence(tasks);

        debug!("Scheduled {} message(s) for {} over {:?}", count, path, horizon);
        horizon
    }
}

struct InFlight {
    count: AtomicUsize,
    idle: Notify,
}

/// Decrements the in-flight count when a timer task finishes or is dropped
struct InFlightGuard(Arc<InFlight>);

impl Drop for InFlightGuard {
    fn drop(&mut self) {
        if self.0.count.fetch_sub(1, Ordering::AcqRel) == 1 {
            self.0.idle.notify_waiters();
        }
    }
}

/// Timer backed by the tokio runtime
#[derive(Clone)]
pub struct TokioTimer {
    handle: Handle,
    in_flight: Arc<InFlight>,
}

impl TokioTimer {
    /// Timer on the runtime the caller is running in
    ///
    /// # Errors
    ///
    /// Returns an error when called outside a tokio runtime
    pub fn new() -> Result<Self, OscError> {
        let handle = Handle::try_current().map_err(|e| OscError::Runtime(e.to_string()))?;
        Ok(Self::with_handle(handle))
    }

    pub fn with_handle(handle: Handle) -> Self {
        Self {
            handle,
            in_flight: Arc::new(InFlight {
                count: AtomicUsize::new(0),
                idle: Notify::new(),
            }),
        }
    }

    /// Number of scheduled tasks that have not run yet
    pub fn pending(&self) -> usize {
        self.in_flight.count.load(Ordering::Acquire)
    }

    /// Wait until every scheduled task has run
    pub async fn idle(&self) {
        loop {
            // registered before the check so a wakeup in between is not lost
            let notified = self.in_flight.idle.notified();
            if self.pending() == 0 {
                return;
            }
            notified.await;
        }
    }
}

impl Timer for TokioTimer {
    fn schedule_after(&self, delay: Duration, task: Task) {
        self.in_flight.count.fetch_add(1, Ordering::AcqRel);
        let guard = InFlightGuard(Arc::clone(&self.in_flight));

        self.handle.spawn(async move {
            let _guard = guard;
            if !delay.is_zero() {
                tokio::time::sleep(delay).await;
            }
            task();
        });
    }

    fn schedule_sequence(&self, tasks: Vec<(Duration, Task)>) {
        if tasks.is_empty() {
            return;
        }

        let base = Instant::now();
        self.in_flight.count.fetch_add(tasks.len(), Ordering::AcqRel);
        let steps: Vec<_> = tasks
            .into_iter()
            .map(|(delay, task)| (delay, task, InFlightGuard(Arc::clone(&self.in_flight))))
            .collect();

        // one task per sequence, so steps cannot race each other across workers
        self.handle.spawn(async move {
            for (delay, task, guard) in steps {
                if !delay.is_zero() {
                    tokio::time::sleep_until(base + delay).await;
                }
                task();
                drop(guard);
            }
        });
    }
}

struct PendingTask {
    due: Duration,
    seq: u64,
    task: Task,
}

#[derive(Default)]
struct ClockState {
    now: Duration,
    next_seq: u64,
    pending: Vec<PendingTask>,
}

/// Virtual clock: tasks run only when [`ManualClock::advance`] passes their
/// due time, in due order (ties in scheduling order)
#[derive(Default)]
pub struct ManualClock {
    state: Mutex<ClockState>,
}

impl ManualClock {
    pub fn new() -> Self {
        Self::default()
    }

    /// Time elapsed on this clock
    pub fn now(&self) -> Duration {
        self.lock().now
    }

    /// Number of tasks not yet run
    pub fn pending(&self) -> usize {
        self.lock().pending.len()
    }

    /// Move the clock forward, running every task that falls due
    ///
    /// Returns how many tasks ran. Tasks may schedule further tasks; those
    /// also run if they fall due within the window.
    pub fn advance(&self, by: Duration) -> usize {
        let target = self.lock().now + by;
        let mut fired = 0;

        loop {
            let next = {
                let mut state = self.lock();
                let earliest = state
                    .pending
                    .iter()
                    .enumerate()
                    .filter(|(_, p)| p.due <= target)
                    .min_by_key(|(_, p)| (p.due, p.seq))
                    .map(|(i, _)| i);

                match earliest {
                    Some(i) => {
                        let pending = state.pending.swap_remove(i);
                        state.now = pending.due;
                        Some(pending.task)
                    }
                    None => {
                        state.now = target;
                        None
                    }
                }
            };

            match next {
                // the lock is released before running the task
                Some(task) => {
                    task();
                    fired += 1;
                }
                None => return fired,
            }
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, ClockState> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl Timer for ManualClock {
    fn schedule_after(&self, delay: Duration, task: Task) {
        let mut state = self.lock();
        let due = state.now + delay;
        let seq = state.next_seq;
        state.next_seq += 1;
        state.pending.push(PendingTask { due, seq, task });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ramp::{plan_float_ramp, plan_integer_ramp};
    use crate::sink::RecordingSink;

    fn ms(n: u64) -> Duration {
        Duration::from_millis(n)
    }

    #[test]
    fn test_manual_clock_fires_in_due_order() {
        let clock = ManualClock::new();
        let log = Arc::new(Mutex::new(Vec::new()));

        for (delay, tag) in [(30, "c"), (10, "a"), (20, "b"), (10, "a2")] {
            let log = Arc::clone(&log);
            clock.schedule_after(ms(delay), Box::new(move || log.lock().unwrap().push(tag)));
        }

        assert_eq!(clock.advance(ms(15)), 2);
        assert_eq!(*log.lock().unwrap(), vec!["a", "a2"]);
        assert_eq!(clock.now(), ms(15));

        assert_eq!(clock.advance(ms(100)), 2);
        assert_eq!(*log.lock().unwrap(), vec!["a", "a2", "b", "c"]);
        assert_eq!(clock.pending(), 0);
    }

    #[test]
    fn test_schedule_returns_before_dispatch() {
        let clock = Arc::new(ManualClock::new());
        let scheduler = Scheduler::new(clock.clone());
        let sink = Arc::new(RecordingSink::new());

        let horizon = scheduler.schedule("/fader", plan_integer_ramp(0, 5, 1000).emissions(), sink.clone());

        assert_eq!(horizon, ms(1000));
        assert!(sink.messages().is_empty());
        assert_eq!(clock.pending(), 6);
    }

    #[test]
    fn test_each_emission_fires_at_its_delay() {
        let clock = Arc::new(ManualClock::new());
        let scheduler = Scheduler::new(clock.clone());
        let sink = Arc::new(RecordingSink::new());

        scheduler.schedule("/fader", plan_integer_ramp(0, 5, 1000).emissions(), sink.clone());

        // the first step is due immediately
        assert_eq!(clock.advance(Duration::ZERO), 1);
        assert_eq!(clock.advance(ms(199)), 0);
        assert_eq!(clock.advance(ms(1)), 1);
        assert_eq!(clock.advance(ms(800)), 4);

        let values: Vec<_> = sink.messages().into_iter().map(|m| m.args).collect();
        assert_eq!(
            values,
            (0..=5).map(|v| vec![OscArg::Int(v)]).collect::<Vec<_>>()
        );
        assert!(sink.messages().iter().all(|m| m.path == "/fader"));
    }

    #[test]
    fn test_overlapping_schedules_interleave() {
        let clock = Arc::new(ManualClock::new());
        let scheduler = Scheduler::new(clock.clone());
        let sink = Arc::new(RecordingSink::new());

        scheduler.schedule("/a", plan_integer_ramp(0, 2, 200).emissions(), sink.clone());
        clock.advance(ms(50));
        scheduler.schedule("/b", plan_integer_ramp(10, 12, 200).emissions(), sink.clone());
        clock.advance(ms(1000));

        let paths: Vec<_> = sink.messages().into_iter().map(|m| m.path).collect();
        // /a at 0,100,200 and /b at 50,150,250
        assert_eq!(paths, vec!["/a", "/b", "/a", "/b", "/a", "/b"]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_tokio_timer_waits_for_delay() {
        let timer = Arc::new(TokioTimer::new().unwrap());
        let scheduler = Scheduler::new(timer.clone());
        let sink = Arc::new(RecordingSink::new());

        let start = tokio::time::Instant::now();
        let horizon = scheduler.schedule("/fader", plan_integer_ramp(0, 4, 400).emissions(), sink.clone());
        assert_eq!(horizon, ms(400));
        assert_eq!(timer.pending(), 5);

        timer.idle().await;

        assert_eq!(timer.pending(), 0);
        assert!(start.elapsed() >= ms(400));
        let values: Vec<_> = sink.messages().into_iter().map(|m| m.args).collect();
        assert_eq!(
            values,
            (0..=4).map(|v| vec![OscArg::Int(v)]).collect::<Vec<_>>()
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_tokio_timer_counts_down_per_step() {
        let timer = Arc::new(TokioTimer::new().unwrap());
        let scheduler = Scheduler::new(timer.clone());
        let sink = Arc::new(RecordingSink::new());

        scheduler.schedule("/fader", plan_integer_ramp(0, 4, 400).emissions(), sink.clone());
        tokio::time::sleep(ms(250)).await;

        // steps at 0, 100 and 200 are out, 300 and 400 still pending
        assert_eq!(sink.messages().len(), 3);
        assert_eq!(timer.pending(), 2);

        timer.idle().await;
        assert_eq!(sink.messages().len(), 5);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_tokio_timer_keeps_step_order_across_workers() {
        let timer = Arc::new(TokioTimer::new().unwrap());
        let scheduler = Scheduler::new(timer.clone());
        let sink = Arc::new(RecordingSink::new());

        // 0.2ms per step, well below the timer resolution
        let plan = plan_float_ramp(0.0, 1.0, 200, 3);
        scheduler.schedule("/fader", plan.emissions(), sink.clone());
        timer.idle().await;

        let received: Vec<_> = sink.messages().into_iter().map(|m| m.args).collect();
        let expected: Vec<_> = plan.emissions().map(|e| e.payload).collect();
        assert_eq!(received.len(), 1001);
        assert_eq!(received, expected);
    }

    #[test]
    fn test_schedule_sorts_out_of_order_emissions() {
        let clock = Arc::new(ManualClock::new());
        let scheduler = Scheduler::new(clock.clone());
        let sink = Arc::new(RecordingSink::new());

        let horizon = scheduler.schedule(
            "/x",
            vec![
                ScheduledEmission::new(ms(20), vec![OscArg::Int(2)]),
                ScheduledEmission::immediate(vec![OscArg::Int(0)]),
                ScheduledEmission::new(ms(10), vec![OscArg::Int(1)]),
            ],
            sink.clone(),
        );
        assert_eq!(horizon, ms(20));

        clock.advance(ms(20));
        let values: Vec<_> = sink.messages().into_iter().map(|m| m.args).collect();
        assert_eq!(
            values,
            (0..=2).map(|v| vec![OscArg::Int(v)]).collect::<Vec<_>>()
        );
    }

    #[tokio::test]
    async fn test_tokio_timer_idle_without_tasks() {
        let timer = TokioTimer::new().unwrap();
        timer.idle().await;
        assert_eq!(timer.pending(), 0);
    }

    #[test]
    fn test_tokio_timer_requires_runtime() {
        assert!(TokioTimer::new().is_err());
    }
}
