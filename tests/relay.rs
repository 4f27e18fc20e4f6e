mod common;

use board_align::pipeline::RejectActuator;
use board_align::relay::{
    BackoffPolicy, RelayConfig, RelayConnectionState, RelayController, RelayError, RelayProtocol,
    TriggerOutcome,
};
use common::mock_relay::{test_config, MockRelay};
use crossbeam_channel::Receiver;
use std::thread;
use std::time::{Duration, Instant};

fn wait_for(
    states: &Receiver<RelayConnectionState>,
    wanted: RelayConnectionState,
) -> Vec<RelayConnectionState> {
    let deadline = Instant::now() + Duration::from_secs(3);
    let mut seen = Vec::new();
    loop {
        let state = states
            .recv_deadline(deadline)
            .unwrap_or_else(|_| panic!("never reached {wanted}; saw {seen:?}"));
        seen.push(state);
        if state == wanted {
            return seen;
        }
    }
}

fn connected(relay: &MockRelay) -> RelayController {
    connected_with(test_config(), relay)
}

fn connected_with(config: RelayConfig, relay: &MockRelay) -> RelayController {
    common::init_logging();
    let controller = RelayController::spawn(config, relay.connector()).unwrap();
    let states = controller.subscribe();
    controller.connect("/dev/ttyMOCK0", 9600).unwrap();
    wait_for(&states, RelayConnectionState::Connected);
    controller
}

#[test]
fn trigger_while_disconnected_is_not_ready_and_silent() {
    let relay = MockRelay::new();
    let controller = RelayController::spawn(test_config(), relay.connector()).unwrap();
    assert_eq!(controller.current_state(), RelayConnectionState::Disconnected);
    assert_eq!(
        controller.trigger(Duration::from_millis(50)),
        TriggerOutcome::NotReady
    );
    assert!(relay.log().opens.is_empty());
    assert!(relay.writes().is_empty());
}

#[test]
fn connect_handshakes_with_a_ping() {
    let relay = MockRelay::new();
    let controller = connected(&relay);
    let protocol = RelayProtocol::default();
    assert_eq!(relay.writes(), vec![protocol.ping.clone()]);
    assert_eq!(relay.log().open_handles, 1);
    drop(controller);
    assert_eq!(relay.log().open_handles, 0);
}

#[test]
fn pulse_asserts_then_deasserts() {
    let relay = MockRelay::new();
    let controller = connected(&relay);
    let protocol = RelayProtocol::default();

    assert_eq!(
        controller.trigger(Duration::from_millis(30)),
        TriggerOutcome::Fired
    );
    thread::sleep(Duration::from_millis(150));
    let writes = relay.writes();
    assert_eq!(&writes[1..], &[protocol.on.clone(), protocol.off.clone()]);
    assert_eq!(controller.current_state(), RelayConnectionState::Connected);
}

#[test]
fn overlapping_trigger_is_rejected_as_busy() {
    let relay = MockRelay::new();
    let controller = connected(&relay);

    assert!(controller.trigger(Duration::from_millis(200)).is_fired());
    assert_eq!(
        controller.trigger(Duration::from_millis(200)),
        TriggerOutcome::Busy
    );
    thread::sleep(Duration::from_millis(350));
    assert!(controller.trigger(Duration::from_millis(10)).is_fired());
    let ons = relay
        .writes()
        .iter()
        .filter(|w| **w == RelayProtocol::default().on)
        .count();
    assert_eq!(ons, 2);
}

#[test]
fn release_cuts_an_active_pulse_short() {
    let relay = MockRelay::new();
    let controller = connected(&relay);
    let protocol = RelayProtocol::default();

    assert!(controller.trigger(Duration::from_secs(5)).is_fired());
    thread::sleep(Duration::from_millis(50));
    let start = Instant::now();
    controller.release().unwrap();
    assert!(start.elapsed() < Duration::from_secs(1), "{:?}", start.elapsed());

    assert_eq!(controller.current_state(), RelayConnectionState::Disconnected);
    assert_eq!(relay.last_write(), Some(protocol.off.clone()));
    assert_eq!(relay.log().open_handles, 0);
    assert_eq!(
        controller.trigger(Duration::from_millis(10)),
        TriggerOutcome::NotReady
    );
}

#[test]
fn failed_opens_back_off_then_connect() {
    common::init_logging();
    let relay = MockRelay::failing_opens(3);
    let controller = RelayController::spawn(test_config(), relay.connector()).unwrap();
    let states = controller.subscribe();
    controller.connect("/dev/ttyMOCK0", 9600).unwrap();
    let seen = wait_for(&states, RelayConnectionState::Connected);
    assert!(seen.contains(&RelayConnectionState::Faulted), "{seen:?}");

    let opens = relay.log().opens.clone();
    assert_eq!(opens.len(), 4);
    let expected = [40u64, 80, 160];
    for (pair, min_ms) in opens.windows(2).zip(expected) {
        let gap = pair[1] - pair[0];
        assert!(
            gap >= Duration::from_millis(min_ms),
            "gap {gap:?} shorter than {min_ms} ms"
        );
    }
}

#[test]
fn retries_stop_after_max_attempts() {
    let relay = MockRelay::failing_opens(100);
    let config = RelayConfig {
        backoff: BackoffPolicy {
            initial_ms: 20,
            max_ms: 20,
            multiplier: 1.0,
            max_attempts: Some(2),
        },
        ..test_config()
    };
    let controller = RelayController::spawn(config, relay.connector()).unwrap();
    controller.connect("/dev/ttyMOCK0", 9600).unwrap();
    thread::sleep(Duration::from_millis(300));
    assert_eq!(relay.log().opens.len(), 2);
    assert_eq!(controller.current_state(), RelayConnectionState::Faulted);
}

#[test]
fn write_failure_faults_the_relay() {
    let relay = MockRelay::new();
    let controller = connected(&relay);
    let states = controller.subscribe();
    relay.log().fail_writes = true;

    assert!(matches!(
        controller.trigger(Duration::from_millis(20)),
        TriggerOutcome::Failed(_)
    ));
    wait_for(&states, RelayConnectionState::Faulted);
    controller.release().unwrap();
    assert_eq!(controller.current_state(), RelayConnectionState::Disconnected);
    assert_eq!(relay.log().open_handles, 0);
}

#[test]
fn self_test_runs_every_cycle() {
    let relay = MockRelay::new();
    let controller = connected(&relay);
    let protocol = RelayProtocol::default();

    let done = controller
        .self_test(3, Duration::from_millis(10), Duration::from_millis(10))
        .unwrap();
    assert_eq!(done, 3);
    let pulses = &relay.writes()[1..];
    assert_eq!(pulses.len(), 6);
    for pair in pulses.chunks(2) {
        assert_eq!(pair, &[protocol.on.clone(), protocol.off.clone()]);
    }
}

#[test]
fn self_test_needs_a_connection() {
    let relay = MockRelay::new();
    let controller = RelayController::spawn(test_config(), relay.connector()).unwrap();
    assert_eq!(
        controller.self_test(1, Duration::from_millis(1), Duration::from_millis(1)),
        Err(RelayError::NotConnected)
    );
}

#[test]
fn reject_pulse_lasts_the_configured_trigger_duration() {
    let relay = MockRelay::new();
    let config = RelayConfig {
        trigger_duration_ms: 250,
        ..test_config()
    };
    let controller = connected_with(config, &relay);
    let protocol = RelayProtocol::default();

    assert!(RejectActuator::reject(&controller).is_fired());
    thread::sleep(Duration::from_millis(120));
    assert_eq!(relay.last_write(), Some(protocol.on.clone()));
    thread::sleep(Duration::from_millis(300));
    assert_eq!(relay.last_write(), Some(protocol.off.clone()));
}

#[test]
fn trigger_gives_up_while_the_worker_is_stuck() {
    let relay = MockRelay::new();
    let config = RelayConfig {
        io_timeout_ms: 100,
        health_check_interval_ms: 50,
        ..test_config()
    };
    let controller = connected_with(config, &relay);
    let protocol = RelayProtocol::default();

    // The next health ping hangs in its write for 300 ms.
    relay.log().write_delay = Some(Duration::from_millis(300));
    thread::sleep(Duration::from_millis(150));
    let start = Instant::now();
    let outcome = controller.trigger(Duration::from_millis(20));
    assert!(matches!(outcome, TriggerOutcome::Failed(_)), "{outcome:?}");
    assert!(start.elapsed() < Duration::from_millis(250), "{:?}", start.elapsed());

    relay.log().write_delay = None;
    thread::sleep(Duration::from_millis(500));
    // The late pulse was dropped, not fired after the fact.
    assert!(!relay.writes().contains(&protocol.on));
    assert_eq!(controller.current_state(), RelayConnectionState::Connected);
    assert!(controller.trigger(Duration::from_millis(10)).is_fired());
}

#[test]
fn continuous_test_runs_until_stopped() {
    let relay = MockRelay::new();
    let controller = connected(&relay);
    let protocol = RelayProtocol::default();

    let done = controller
        .continuous_test(
            Duration::from_secs(10),
            Duration::from_millis(20),
            Duration::from_millis(20),
        )
        .unwrap();
    thread::sleep(Duration::from_millis(150));
    assert_eq!(
        controller.trigger(Duration::from_millis(10)),
        TriggerOutcome::Busy
    );

    let start = Instant::now();
    controller.stop_test().unwrap();
    let cycles = done.recv_timeout(Duration::from_secs(1)).unwrap().unwrap();
    assert!(start.elapsed() < Duration::from_millis(500));
    assert!(cycles >= 2, "{cycles}");
    assert_eq!(relay.last_write(), Some(protocol.off.clone()));
    assert!(controller.trigger(Duration::from_millis(10)).is_fired());
}

#[test]
fn continuous_test_ends_after_its_duration() {
    let relay = MockRelay::new();
    let controller = connected(&relay);

    let done = controller
        .continuous_test(
            Duration::from_millis(150),
            Duration::from_millis(20),
            Duration::from_millis(20),
        )
        .unwrap();
    let cycles = done.recv_timeout(Duration::from_secs(2)).unwrap().unwrap();
    assert!((2..=6).contains(&cycles), "{cycles}");
    assert_eq!(controller.current_state(), RelayConnectionState::Connected);
}
