use std::fmt;
use std::sync::Mutex;

use async_trait::async_trait;

use crate::error::{Result, ScenarioError};
use crate::scenario::{Maintained, MaintainedSignal, Scenario, ScenarioState};

/// A scenario that puts no load on the cluster.
///
/// Serves as a baseline for measurements taken under load. Its [`maintained`](Scenario::maintained)
/// signal never fails and resolves when the scenario is stopped.
pub struct NoLoadScenario {
    state: Mutex<(ScenarioState, MaintainedSignal)>,
    maintained: Maintained,
}

impl fmt::Debug for NoLoadScenario {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NoLoadScenario")
            .field("state", &self.state())
            .finish_non_exhaustive()
    }
}

impl NoLoadScenario {
    /// Creates a scenario that has not been started yet.
    pub fn new() -> Self {
        let (signal, maintained) = MaintainedSignal::new();
        Self {
            state: Mutex::new((ScenarioState::NotStarted, signal)),
            maintained,
        }
    }

    /// The current lifecycle state.
    pub fn state(&self) -> ScenarioState {
        self.state.lock().unwrap().0
    }
}

impl Default for NoLoadScenario {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Scenario for NoLoadScenario {
    async fn start(&self) -> Result<()> {
        let mut state = self.state.lock().unwrap();
        if state.0 != ScenarioState::NotStarted {
            return Err(ScenarioError::AlreadyStarted);
        }
        state.0 = ScenarioState::Running;
        Ok(())
    }

    fn maintained(&self) -> Maintained {
        self.maintained.clone()
    }

    async fn stop(&self) -> Result<()> {
        let mut state = self.state.lock().unwrap();
        if state.0 != ScenarioState::Running {
            return Err(ScenarioError::NotRunning);
        }
        state.0 = ScenarioState::Stopped;
        state.1.succeed();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use futures::FutureExt;

    use super::*;

    #[test]
    fn maintained_until_stopped() {
        let scenario = NoLoadScenario::new();

        scenario.start().now_or_never().unwrap().unwrap();
        assert_eq!(scenario.maintained().now_or_never(), None);

        scenario.stop().now_or_never().unwrap().unwrap();
        assert_eq!(scenario.maintained().now_or_never(), Some(Ok(())));
        assert_eq!(scenario.state(), ScenarioState::Stopped);
    }

    #[test]
    fn lifecycle_misuse_is_reported() {
        let scenario = NoLoadScenario::new();

        let early_stop = scenario.stop().now_or_never().unwrap();
        assert_eq!(early_stop, Err(ScenarioError::NotRunning));

        scenario.start().now_or_never().unwrap().unwrap();
        let restart = scenario.start().now_or_never().unwrap();
        assert_eq!(restart, Err(ScenarioError::AlreadyStarted));

        scenario.stop().now_or_never().unwrap().unwrap();
        let second_stop = scenario.stop().now_or_never().unwrap();
        assert_eq!(second_stop, Err(ScenarioError::NotRunning));
    }
}
