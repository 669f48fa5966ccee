mod common;

use std::cell::RefCell;
use std::rc::Rc;
use std::time::Duration;

use serde_json::{json, Value};

use common::{ClientLog, Event, MockClient, RecordingListener};
use vertminer_stratum::{Algorithm, FailoverStrategy, Strategy};

fn failover(pools: usize, retries: u32) -> (FailoverStrategy, Vec<Rc<RefCell<ClientLog>>>) {
    let mut strategy = FailoverStrategy::new(retries, Duration::from_secs(1), false);
    let mut logs = Vec::new();

    for id in 0..pools {
        let log = Rc::new(RefCell::new(ClientLog::default()));
        strategy.add(Box::new(MockClient::new(id, common::pool(id), log.clone())));
        logs.push(log);
    }

    (strategy, logs)
}

#[test]
fn settings_are_propagated_to_clients() {
    let (_strategy, logs) = failover(2, 3);

    let log = logs[0].borrow();
    assert_eq!(log.retries, Some(3));
    assert_eq!(log.retry_pause_ms, Some(1_000));
    assert_eq!(log.quiet, Some(false));
}

#[test]
fn zero_retry_defers_next_connect_to_tick() {
    let (mut strategy, logs) = failover(2, 0);
    let mut listener = RecordingListener::default();

    strategy.connect();
    assert_eq!(logs[0].borrow().connects, 1);

    // Primary fails (e.g. synchronous DNS error). Nothing may be
    // connected from inside the callback.
    strategy.on_close(0, 0, &mut listener);
    assert_eq!(logs[1].borrow().connects, 0);
    assert_eq!(logs[0].borrow().disconnects, 1);

    // The backup connects on the next tick, exactly once.
    strategy.tick(1_000, &mut listener);
    assert_eq!(logs[1].borrow().connects, 1);
    strategy.tick(2_000, &mut listener);
    assert_eq!(logs[1].borrow().connects, 1);

    strategy.on_login_success(1, &mut listener);
    assert_eq!(logs[0].borrow().disconnects, 2);
    assert_eq!(listener.actives(), vec![1]);
    assert!(strategy.is_active());
    assert_eq!(strategy.client().unwrap().id(), 1);
}

#[test]
fn lower_pool_cannot_steal_active_slot_during_cascade() {
    let (mut strategy, logs) = failover(2, 0);
    let mut listener = RecordingListener::default();

    strategy.connect();
    strategy.on_close(0, 0, &mut listener);
    strategy.tick(1_000, &mut listener);

    // The primary flaps back up while the backup is still connecting.
    strategy.on_login_success(0, &mut listener);
    assert_eq!(logs[0].borrow().disconnects, 2);
    assert!(listener.actives().is_empty());
    assert!(!strategy.is_active());

    // Its close events are equally stale; no new connect gets scheduled.
    let backup_connects = logs[1].borrow().connects;
    strategy.on_close(0, 0, &mut listener);
    assert_eq!(logs[0].borrow().disconnects, 3);
    strategy.tick(2_000, &mut listener);
    assert_eq!(logs[1].borrow().connects, backup_connects);

    // The backup is still honored.
    strategy.on_login_success(1, &mut listener);
    assert_eq!(listener.actives(), vec![1]);
}

#[test]
fn exhausting_all_pools_wraps_to_primary() {
    let (mut strategy, logs) = failover(3, 0);
    let mut listener = RecordingListener::default();

    strategy.connect();

    strategy.on_close(0, 0, &mut listener);
    strategy.tick(1_000, &mut listener);
    assert_eq!(logs[1].borrow().connects, 1);

    strategy.on_close(1, 0, &mut listener);
    assert_eq!(logs[0].borrow().disconnects, 2);
    assert_eq!(logs[1].borrow().disconnects, 1);
    strategy.tick(2_000, &mut listener);
    assert_eq!(logs[2].borrow().connects, 1);

    strategy.on_close(2, 0, &mut listener);
    strategy.tick(3_000, &mut listener);
    assert_eq!(logs[0].borrow().connects, 2);

    // The wrap resets suppression, so the primary wins again.
    strategy.on_login_success(0, &mut listener);
    assert_eq!(listener.actives(), vec![0]);
    assert!(strategy.is_active());
}

#[test]
fn nonzero_retries_let_primary_reconnect_in_place() {
    let (mut strategy, logs) = failover(2, 2);
    let mut listener = RecordingListener::default();

    strategy.connect();

    // Below the retry budget the client handles reconnection itself.
    strategy.on_close(0, 1, &mut listener);
    assert_eq!(logs[1].borrow().connects, 0);

    // At the budget the cascade advances, synchronously in this mode.
    strategy.on_close(0, 2, &mut listener);
    assert_eq!(logs[1].borrow().connects, 1);

    // Late events from the abandoned primary change nothing further.
    strategy.on_close(0, 5, &mut listener);
    assert_eq!(logs[1].borrow().connects, 1);
}

#[test]
fn explicit_disconnect_is_ignored() {
    let (mut strategy, logs) = failover(2, 0);
    let mut listener = RecordingListener::default();

    strategy.connect();
    strategy.on_close(0, -1, &mut listener);
    assert_eq!(logs[0].borrow().disconnects, 0);

    strategy.tick(1_000, &mut listener);
    assert_eq!(logs[1].borrow().connects, 0);
    assert!(listener.events.is_empty());

    strategy.on_login_success(0, &mut listener);
    strategy.on_close(0, -1, &mut listener);
    assert!(strategy.is_active());
    assert_eq!(listener.pauses(), 0);
}

#[test]
fn active_pool_close_pauses_workers() {
    let (mut strategy, _logs) = failover(2, 0);
    let mut listener = RecordingListener::default();

    strategy.connect();
    strategy.on_login_success(0, &mut listener);
    assert!(strategy.is_active());

    strategy.on_close(0, 0, &mut listener);
    assert!(!strategy.is_active());
    assert_eq!(listener.pauses(), 1);
}

#[test]
fn jobs_from_non_active_pools_are_dropped() {
    let (mut strategy, _logs) = failover(2, 0);
    let mut listener = RecordingListener::default();

    strategy.connect();
    strategy.on_login_success(0, &mut listener);

    strategy.on_job_received(1, &common::job("stray"), &Value::Null, &mut listener);
    assert!(listener.jobs().is_empty());

    strategy.on_job_received(0, &common::job("j1"), &Value::Null, &mut listener);
    assert_eq!(listener.jobs(), vec!["j1"]);
}

#[test]
fn stop_is_idempotent_and_allows_reconnect() {
    let (mut strategy, logs) = failover(2, 0);
    let mut listener = RecordingListener::default();

    strategy.connect();
    strategy.on_login_success(0, &mut listener);

    strategy.stop(&mut listener);
    assert_eq!(listener.pauses(), 1);
    assert!(!strategy.is_active());
    assert!(logs.iter().all(|log| log.borrow().disconnects >= 1));

    strategy.stop(&mut listener);
    assert_eq!(listener.pauses(), 1);

    // Round trip: the cascade restarts at the primary.
    strategy.connect();
    assert_eq!(logs[0].borrow().connects, 2);
    strategy.on_login_success(0, &mut listener);
    assert_eq!(listener.actives(), vec![0, 0]);
    assert!(strategy.is_active());
}

#[test]
fn resume_reemits_current_job_with_null_params() {
    let mut strategy = FailoverStrategy::new(0, Duration::from_secs(1), false);
    let log = Rc::new(RefCell::new(ClientLog::default()));
    strategy.add(Box::new(
        MockClient::new(0, common::pool(0), log.clone()).with_job(common::job("current")),
    ));

    let mut listener = RecordingListener::default();

    // Not active yet: nothing to re-emit.
    strategy.resume(&mut listener);
    assert!(listener.events.is_empty());

    strategy.connect();
    strategy.on_login_success(0, &mut listener);
    strategy.resume(&mut listener);
    assert_eq!(listener.jobs(), vec!["current"]);
}

#[test]
fn submit_routes_to_active_pool_only() {
    let (mut strategy, logs) = failover(2, 0);
    let mut listener = RecordingListener::default();

    assert_eq!(strategy.submit(&common::job_result()), -1);

    strategy.connect();
    strategy.on_login_success(1, &mut listener);
    assert_eq!(strategy.submit(&common::job_result()), 1);
    assert_eq!(logs[1].borrow().submits, 1);
    assert_eq!(logs[0].borrow().submits, 0);
}

#[test]
fn login_result_and_verify_events_are_forwarded() {
    let (mut strategy, _logs) = failover(2, 0);
    let mut listener = RecordingListener::default();

    let mut params = json!({});
    strategy.on_login(0, &mut params, &mut listener);

    strategy.on_result_accepted(0, &common::submit_result(7), None, &mut listener);

    let mut ok = true;
    strategy.on_verify_algorithm(0, Algorithm::Verthash, &mut ok, &mut listener);
    assert!(ok);

    assert_eq!(
        listener.events,
        vec![
            Event::Login,
            Event::ResultAccepted(7),
            Event::VerifyAlgorithm(Algorithm::Verthash),
        ]
    );
}

#[test]
fn ticks_are_forwarded_to_every_client() {
    let (mut strategy, logs) = failover(3, 0);
    let mut listener = RecordingListener::default();

    strategy.tick(123, &mut listener);
    for log in &logs {
        let log = log.borrow();
        assert_eq!(log.ticks, 1);
        assert_eq!(log.last_tick, 123);
    }
}
