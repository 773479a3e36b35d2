//! Load scenarios and their lifecycle.
//!
//! A [`Scenario`] puts a cluster under a particular kind of load. It is started once, reports
//! through [`Scenario::maintained`] whether it keeps meeting its obligations, and is stopped
//! once. Scenarios cannot be restarted.

use std::fmt::Debug;

use async_trait::async_trait;
use futures::FutureExt;
use futures::channel::oneshot;
use futures::future::{self, BoxFuture, Shared};

use crate::error::{RequestRateTooLow, Result};

mod no_load;
mod read_request_load;

pub use no_load::NoLoadScenario;
pub use read_request_load::{ReadRequestLoadScenario, ReadRequestLoadScenarioBuilder};

/// Signals whether a scenario keeps meeting its obligations.
///
/// The future stays pending while the scenario runs as expected. It resolves to `Ok(())` when
/// the scenario is stopped, and to an error as soon as the scenario falls short. It settles at
/// most once, and all clones observe the same outcome. Use [`Shared::ptr_eq`] to check whether
/// two handles belong to the same signal.
pub type Maintained = Shared<BoxFuture<'static, Result<(), RequestRateTooLow>>>;

/// Lifecycle of a scenario.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ScenarioState {
    /// Created but not started yet.
    NotStarted,
    /// Generating load.
    Running,
    /// Stopped. This state is terminal.
    Stopped,
}

/// A kind of load that can be put on a cluster.
#[async_trait]
pub trait Scenario: Debug + Send + Sync {
    /// Starts generating load.
    ///
    /// Resolves once the load has been set up, without waiting for it to reach a steady state.
    /// Fails with [`ScenarioError::AlreadyStarted`](crate::ScenarioError::AlreadyStarted) if the
    /// scenario was started before.
    async fn start(&self) -> Result<()>;

    /// Returns the signal for whether the scenario keeps meeting its obligations.
    ///
    /// Every call returns a handle to the same signal.
    fn maintained(&self) -> Maintained;

    /// Stops generating load.
    ///
    /// Resolves the [`maintained`](Self::maintained) signal successfully unless it has already
    /// failed. Fails with [`ScenarioError::NotRunning`](crate::ScenarioError::NotRunning) if the
    /// scenario is not running.
    async fn stop(&self) -> Result<()>;
}

/// The settling half of a [`Maintained`] signal.
#[derive(Debug)]
pub(crate) struct MaintainedSignal {
    sender: Option<oneshot::Sender<Result<(), RequestRateTooLow>>>,
}

impl MaintainedSignal {
    /// Creates an unsettled signal and the future observing it.
    pub(crate) fn new() -> (Self, Maintained) {
        let (sender, receiver) = oneshot::channel();

        let maintained = receiver
            .then(|settled| match settled {
                Ok(outcome) => future::ready(outcome).left_future(),
                // Nothing can settle the signal anymore.
                Err(oneshot::Canceled) => future::pending().right_future(),
            })
            .boxed()
            .shared();

        let signal = Self {
            sender: Some(sender),
        };
        (signal, maintained)
    }

    /// Returns `true` once the signal has been settled either way.
    pub(crate) fn is_settled(&self) -> bool {
        self.sender.is_none()
    }

    /// Resolves the signal successfully, unless it is already settled.
    pub(crate) fn succeed(&mut self) {
        self.settle(Ok(()));
    }

    /// Fails the signal, unless it is already settled.
    pub(crate) fn fail(&mut self, error: RequestRateTooLow) {
        self.settle(Err(error));
    }

    fn settle(&mut self, outcome: Result<(), RequestRateTooLow>) {
        if let Some(sender) = self.sender.take() {
            // Sending only fails when nobody holds the signal anymore.
            sender.send(outcome).ok();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn too_low() -> RequestRateTooLow {
        RequestRateTooLow {
            target: 5.0,
            actual: 4.4,
        }
    }

    #[test]
    fn pending_until_settled() {
        let (_signal, maintained) = MaintainedSignal::new();
        assert_eq!(maintained.now_or_never(), None);
    }

    #[test]
    fn settles_only_once() {
        let (mut signal, maintained) = MaintainedSignal::new();

        signal.fail(too_low());
        assert!(signal.is_settled());
        signal.succeed();

        assert_eq!(maintained.clone().now_or_never(), Some(Err(too_low())));
        assert_eq!(maintained.now_or_never(), Some(Err(too_low())));
    }

    #[test]
    fn stays_pending_when_dropped_unsettled() {
        let (signal, maintained) = MaintainedSignal::new();
        drop(signal);
        assert_eq!(maintained.now_or_never(), None);
    }
}
