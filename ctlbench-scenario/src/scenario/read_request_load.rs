//! A scenario that keeps the control service busy with read requests.

use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard, Weak};
use std::time::Duration;

use async_trait::async_trait;
use futures::FutureExt;

use crate::client::ControlServiceClient;
use crate::clock::{Clock, TimerId};
use crate::cluster::BenchmarkCluster;
use crate::error::{RequestRateTooLow, Result, ScenarioError};
use crate::rate::{DEFAULT_WINDOW_SIZE, RateMeasurer};
use crate::scenario::{Maintained, MaintainedSignal, Scenario, ScenarioState};

/// Default time between two evaluations of the achieved request rate.
pub const DEFAULT_CHECK_INTERVAL: Duration = Duration::from_secs(10);

/// Default time between two batches of requests.
pub const DEFAULT_REQUEST_INTERVAL: Duration = Duration::from_secs(1);

/// A builder for a [`ReadRequestLoadScenario`].
#[derive(Debug)]
pub struct ReadRequestLoadScenarioBuilder {
    clock: Arc<dyn Clock>,
    client: Arc<dyn ControlServiceClient>,
    target_rate: f64,
    check_interval: Duration,
    request_interval: Duration,
    window_size: usize,
}

impl ReadRequestLoadScenarioBuilder {
    /// Time between two evaluations of the achieved request rate.
    pub fn check_interval(mut self, interval: Duration) -> Self {
        self.check_interval = interval;
        self
    }

    /// Time between two batches of requests.
    ///
    /// Each batch carries as many requests as the target rate calls for over this interval.
    pub fn request_interval(mut self, interval: Duration) -> Self {
        self.request_interval = interval;
        self
    }

    /// Number of seconds the achieved request rate is averaged over.
    pub fn window_size(mut self, window_size: usize) -> Self {
        self.window_size = window_size;
        self
    }

    /// Creates the scenario.
    pub fn build(self) -> Result<ReadRequestLoadScenario> {
        if !self.target_rate.is_finite() || self.target_rate < 0.0 {
            return Err(ScenarioError::InvalidConfig(format!(
                "target rate must be a non-negative number, got {}",
                self.target_rate
            )));
        }
        if self.check_interval.is_zero() || self.request_interval.is_zero() {
            return Err(ScenarioError::InvalidConfig(
                "check and request intervals must be greater than zero".into(),
            ));
        }

        let measurer = RateMeasurer::with_window_size(Arc::clone(&self.clock), self.window_size)?;
        let (signal, maintained) = MaintainedSignal::new();

        let controller = Controller {
            clock: self.clock,
            client: self.client,
            target_rate: self.target_rate,
            check_interval: self.check_interval,
            request_interval: self.request_interval,
            state: Mutex::new(ControllerState {
                lifecycle: ScenarioState::NotStarted,
                started_at: Duration::ZERO,
                request_ticks: 0,
                monitor_ticks: 0,
                measurer,
                signal,
                request_timer: None,
                monitor_timer: None,
                request_credit: 0.0,
            }),
        };

        Ok(ReadRequestLoadScenario {
            controller: Arc::new(controller),
            maintained,
        })
    }
}

/// Issues read requests to the control service at a target rate.
///
/// Requests are issued in batches without waiting for earlier requests to complete. Every
/// request that completes successfully is counted, and the rate of completions is checked
/// periodically. As soon as a check finds it below the target rate, the
/// [`maintained`](Scenario::maintained) signal fails with [`RequestRateTooLow`]. Requests that
/// are never answered are not retried; they only lower the measured rate.
///
/// The scenario keeps issuing requests after the signal has failed, until it is stopped.
pub struct ReadRequestLoadScenario {
    controller: Arc<Controller>,
    maintained: Maintained,
}

impl fmt::Debug for ReadRequestLoadScenario {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ReadRequestLoadScenario")
            .field("controller", &self.controller)
            .finish_non_exhaustive()
    }
}

impl ReadRequestLoadScenario {
    /// Creates a scenario requesting `target_rate` node listings per second from the cluster's
    /// control service, checking the achieved rate every `check_interval`.
    pub fn new(
        clock: Arc<dyn Clock>,
        cluster: &BenchmarkCluster,
        target_rate: f64,
        check_interval: Duration,
    ) -> Result<Self> {
        Self::builder(clock, cluster, target_rate)
            .check_interval(check_interval)
            .build()
    }

    /// Constructs a new scenario builder.
    pub fn builder(
        clock: Arc<dyn Clock>,
        cluster: &BenchmarkCluster,
        target_rate: f64,
    ) -> ReadRequestLoadScenarioBuilder {
        ReadRequestLoadScenarioBuilder {
            clock,
            client: cluster.control_service(),
            target_rate,
            check_interval: DEFAULT_CHECK_INTERVAL,
            request_interval: DEFAULT_REQUEST_INTERVAL,
            window_size: DEFAULT_WINDOW_SIZE,
        }
    }

    /// The number of requests per second the scenario must sustain.
    pub fn target_rate(&self) -> f64 {
        self.controller.target_rate
    }

    /// The current lifecycle state.
    pub fn state(&self) -> ScenarioState {
        self.controller.lock().lifecycle
    }

    /// The most recently measured rate of completed requests.
    ///
    /// `NaN` until enough history has been gathered.
    pub fn rate(&self) -> f64 {
        self.controller.lock().measurer.rate()
    }
}

#[async_trait]
impl Scenario for ReadRequestLoadScenario {
    async fn start(&self) -> Result<()> {
        {
            let mut state = self.controller.lock();
            if state.lifecycle != ScenarioState::NotStarted {
                return Err(ScenarioError::AlreadyStarted);
            }
            state.lifecycle = ScenarioState::Running;
            state.started_at = self.controller.clock.now();
        }

        tracing::info!(
            target_rate = self.controller.target_rate,
            check_interval = ?self.controller.check_interval,
            "starting read request load"
        );

        // Requests go first so that a check at the same instant sees their completions.
        self.controller.request_step();
        self.controller.monitor_step();

        Ok(())
    }

    fn maintained(&self) -> Maintained {
        self.maintained.clone()
    }

    async fn stop(&self) -> Result<()> {
        let mut state = self.controller.lock();
        if state.lifecycle != ScenarioState::Running {
            return Err(ScenarioError::NotRunning);
        }
        state.lifecycle = ScenarioState::Stopped;

        let timers = [state.request_timer.take(), state.monitor_timer.take()];
        for timer in timers.into_iter().flatten() {
            self.controller.clock.cancel(timer);
        }

        let failed = state.signal.is_settled();
        state.signal.succeed();
        drop(state);

        tracing::info!(failed, "stopped read request load");
        Ok(())
    }
}

/// Shared between the scenario handle and its scheduled steps.
#[derive(Debug)]
struct Controller {
    clock: Arc<dyn Clock>,
    client: Arc<dyn ControlServiceClient>,
    target_rate: f64,
    check_interval: Duration,
    request_interval: Duration,
    state: Mutex<ControllerState>,
}

#[derive(Debug)]
struct ControllerState {
    lifecycle: ScenarioState,
    /// Clock time at which the scenario was started. Steps are scheduled relative to it.
    started_at: Duration,
    request_ticks: u32,
    monitor_ticks: u32,
    measurer: RateMeasurer,
    signal: MaintainedSignal,
    request_timer: Option<TimerId>,
    monitor_timer: Option<TimerId>,
    /// Requests owed to the target rate that did not fit into a whole batch yet.
    request_credit: f64,
}

impl Controller {
    fn lock(&self) -> MutexGuard<'_, ControllerState> {
        // NB: A poisoned lock means a step panicked, which leaves nothing to recover.
        self.state.lock().unwrap()
    }

    /// Issues one batch of requests and schedules the next one.
    fn request_step(self: &Arc<Self>) {
        let batch = {
            let mut state = self.lock();
            if state.lifecycle != ScenarioState::Running {
                return;
            }

            let delay =
                self.next_delay(state.started_at, self.request_interval, &mut state.request_ticks);
            let this = Arc::downgrade(self);
            state.request_timer = Some(self.clock.call_later(
                delay,
                Box::new(move || Self::upgrade(&this, Self::request_step)),
            ));

            state.request_credit += self.target_rate * self.request_interval.as_secs_f64();
            let batch = state.request_credit.floor();
            state.request_credit -= batch;
            batch as u64
        };

        tracing::trace!(requests = batch, "issuing read requests");
        for _ in 0..batch {
            self.issue_request();
        }
    }

    /// Sends a single request and counts it once it completes.
    fn issue_request(self: &Arc<Self>) {
        let this = Arc::downgrade(self);
        let client = Arc::clone(&self.client);

        let request = async move {
            let result = client.list_nodes().await;
            let Some(this) = this.upgrade() else {
                return;
            };

            match result {
                Ok(_) => this.lock().measurer.new_sample(),
                Err(error) => tracing::debug!(
                    error = &error as &dyn std::error::Error,
                    "read request failed"
                ),
            }
        };

        self.clock.spawn(request.boxed());
    }

    /// Compares the achieved rate against the target and schedules the next check.
    fn monitor_step(self: &Arc<Self>) {
        let mut state = self.lock();
        if state.lifecycle != ScenarioState::Running {
            return;
        }

        let delay =
            self.next_delay(state.started_at, self.check_interval, &mut state.monitor_ticks);
        let this = Arc::downgrade(self);
        state.monitor_timer = Some(self.clock.call_later(
            delay,
            Box::new(move || Self::upgrade(&this, Self::monitor_step)),
        ));

        let rate = state.measurer.rate();
        tracing::debug!(rate, target_rate = self.target_rate, "checking request rate");

        // An unknown rate compares false and is never a failure.
        if rate < self.target_rate && !state.signal.is_settled() {
            tracing::warn!(
                actual = rate,
                target = self.target_rate,
                "request rate dropped below target"
            );
            state.signal.fail(RequestRateTooLow {
                target: self.target_rate,
                actual: rate,
            });
        }
    }

    /// Time until the next tick of a loop that runs every `interval` since `started_at`.
    ///
    /// Ticks are planned on a fixed grid, so a step that fires late does not delay the ones after
    /// it. A step that is already overdue runs immediately.
    fn next_delay(&self, started_at: Duration, interval: Duration, ticks: &mut u32) -> Duration {
        *ticks = ticks.saturating_add(1);
        let deadline = started_at.saturating_add(interval.saturating_mul(*ticks));
        deadline.saturating_sub(self.clock.now())
    }

    fn upgrade(this: &Weak<Self>, step: fn(&Arc<Self>)) {
        if let Some(this) = this.upgrade() {
            step(&this);
        }
    }
}
