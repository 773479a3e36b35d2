use std::iter::repeat_n;
use std::sync::Arc;
use std::time::Duration;

use ctlbench_scenario::clock::{ManualClock, TokioClock};
use ctlbench_scenario::{
    FakeControlService, ReadRequestLoadScenario, RequestRateTooLow, Scenario, ScenarioError,
    ScenarioState,
};
use ctlbench_test::clients::RequestDroppingControlService;
use ctlbench_test::cluster::{make_cluster, nodes};
use futures::FutureExt;
use futures::future::Shared;

const SECOND: Duration = Duration::from_secs(1);

/// Seconds it takes until the first full window of requests has been measured.
///
/// With the default five second window, samples in six distinct seconds are needed before the
/// rate is known. The first requests are issued immediately on start, so the sixth second
/// begins after five advances; one more makes sure a check has run with a full window.
const WARMUP_STEPS: usize = 6;

#[test]
fn read_request_load_succeeds() {
    ctlbench_test::tracing::init();

    let clock = Arc::new(ManualClock::new());
    let cluster = make_cluster(Arc::new(FakeControlService::new(nodes())));
    let scenario = ReadRequestLoadScenario::new(clock.clone(), &cluster, 5.0, SECOND).unwrap();

    scenario.start().now_or_never().unwrap().unwrap();
    clock.pump(repeat_n(SECOND, WARMUP_STEPS));

    assert_eq!(scenario.rate(), 5.0);
    assert_eq!(scenario.maintained().now_or_never(), None);

    scenario.stop().now_or_never().unwrap().unwrap();
    assert_eq!(scenario.maintained().now_or_never(), Some(Ok(())));
    assert_eq!(scenario.state(), ScenarioState::Stopped);
}

#[test]
fn scenario_fails_when_rate_drops() {
    ctlbench_test::tracing::init();

    let clock = Arc::new(ManualClock::new());
    let service = Arc::new(RequestDroppingControlService::new(nodes()));
    let cluster = make_cluster(service.clone());
    let scenario = ReadRequestLoadScenario::new(clock.clone(), &cluster, 5.0, SECOND).unwrap();

    scenario.start().now_or_never().unwrap().unwrap();
    clock.pump(repeat_n(SECOND, WARMUP_STEPS));
    let before_failure = scenario.maintained();
    assert_eq!(before_failure.clone().now_or_never(), None);

    service.set_drop_requests(true);
    clock.pump(repeat_n(SECOND, 3));
    assert!(service.dropped() > 0);

    let Some(Err(RequestRateTooLow { target, actual })) = scenario.maintained().now_or_never()
    else {
        panic!("expected the scenario to fail");
    };
    assert_eq!(target, 5.0);
    assert!(actual < target);

    // Both handles refer to the same, already failed signal.
    let after_failure = scenario.maintained();
    assert!(Shared::ptr_eq(&before_failure, &after_failure));
    assert_eq!(
        before_failure.now_or_never(),
        after_failure.clone().now_or_never()
    );

    // Stopping keeps the failure in place.
    clock.pump(repeat_n(SECOND, 3));
    scenario.stop().now_or_never().unwrap().unwrap();
    assert!(matches!(after_failure.now_or_never(), Some(Err(_))));
}

#[test]
fn first_shortfall_is_reported() {
    let clock = Arc::new(ManualClock::new());
    let service = Arc::new(RequestDroppingControlService::new(nodes()));
    let cluster = make_cluster(service.clone());
    let scenario = ReadRequestLoadScenario::new(clock.clone(), &cluster, 5.0, SECOND).unwrap();

    scenario.start().now_or_never().unwrap().unwrap();
    clock.pump(repeat_n(SECOND, WARMUP_STEPS));

    // Of the five requests in the next second, the first, third and fifth are dropped.
    service.set_drop_requests(true);
    clock.advance(SECOND);

    let expected = RequestRateTooLow {
        target: 5.0,
        actual: 4.4,
    };
    assert_eq!(scenario.maintained().now_or_never(), Some(Err(expected.clone())));

    // Later, lower rates do not replace the first failure.
    clock.pump(repeat_n(SECOND, 5));
    assert!(scenario.rate() < 4.4);
    assert_eq!(scenario.maintained().now_or_never(), Some(Err(expected)));
}

#[test]
fn insufficient_history_is_not_a_failure() {
    let clock = Arc::new(ManualClock::new());
    let service = Arc::new(RequestDroppingControlService::new(nodes()));
    service.set_drop_requests(true);
    let cluster = make_cluster(service.clone());
    let scenario = ReadRequestLoadScenario::new(clock.clone(), &cluster, 2.0, SECOND).unwrap();

    scenario.start().now_or_never().unwrap().unwrap();
    clock.pump(repeat_n(SECOND, 3));

    // One answered request per second is not enough history to know the rate yet.
    assert!(scenario.rate().is_nan());
    assert_eq!(scenario.maintained().now_or_never(), None);
    assert!(clock.pending_tasks() > 0);

    scenario.stop().now_or_never().unwrap().unwrap();
    assert_eq!(scenario.maintained().now_or_never(), Some(Ok(())));
}

#[test]
fn lifecycle_misuse_is_reported() {
    let clock = Arc::new(ManualClock::new());
    let cluster = make_cluster(Arc::new(FakeControlService::new(nodes())));
    let scenario = ReadRequestLoadScenario::new(clock.clone(), &cluster, 5.0, SECOND).unwrap();

    let stop = scenario.stop().now_or_never().unwrap();
    assert_eq!(stop, Err(ScenarioError::NotRunning));
    assert_eq!(scenario.state(), ScenarioState::NotStarted);

    scenario.start().now_or_never().unwrap().unwrap();
    let restart = scenario.start().now_or_never().unwrap();
    assert_eq!(restart, Err(ScenarioError::AlreadyStarted));

    scenario.stop().now_or_never().unwrap().unwrap();
    let stop = scenario.stop().now_or_never().unwrap();
    assert_eq!(stop, Err(ScenarioError::NotRunning));

    // A stopped scenario cannot be started again.
    let restart = scenario.start().now_or_never().unwrap();
    assert_eq!(restart, Err(ScenarioError::AlreadyStarted));
    assert_eq!(clock.pending_calls(), 0);
}

#[tokio::test(start_paused = true)]
async fn read_request_load_on_tokio_clock() {
    ctlbench_test::tracing::init();

    let clock = Arc::new(TokioClock::new());
    let cluster = make_cluster(Arc::new(FakeControlService::new(nodes())));
    let scenario = ReadRequestLoadScenario::new(clock, &cluster, 5.0, SECOND).unwrap();

    scenario.start().await.unwrap();
    tokio::time::sleep(SECOND * 8 + Duration::from_millis(500)).await;

    assert_eq!(scenario.rate(), 5.0);
    assert_eq!(scenario.maintained().now_or_never(), None);

    scenario.stop().await.unwrap();
    assert_eq!(scenario.maintained().await, Ok(()));
}
