use super::*;
use crate::error::LibraryError;
use crate::models::ProcessingStatus;
use crate::test_support::ScriptedStatusClient;

const INTERVAL: Duration = Duration::from_secs(1);

type Batches = Arc<Mutex<Vec<Vec<StatusUpdate>>>>;

fn recorder() -> (StatusCallback, Batches) {
    let batches: Batches = Arc::new(Mutex::new(Vec::new()));
    let sink = batches.clone();
    let callback: StatusCallback =
        Arc::new(move |updates: Vec<StatusUpdate>| lock(&sink).push(updates));
    (callback, batches)
}

fn coordinator(client: &Arc<ScriptedStatusClient>) -> (PollingCoordinator, Batches) {
    let (callback, batches) = recorder();
    let coordinator = PollingCoordinator::new(client.clone(), INTERVAL, callback);
    (coordinator, batches)
}

fn ids(values: &[&str]) -> Vec<String> {
    values.iter().map(|v| v.to_string()).collect()
}

async fn advance(ms: u64) {
    tokio::time::sleep(Duration::from_millis(ms)).await;
}

#[tokio::test(start_paused = true)]
async fn polls_immediately_then_every_interval() {
    let client = Arc::new(ScriptedStatusClient::new());
    client.push_ok(vec![StatusUpdate::new("doc1", ProcessingStatus::Processing, 50)]);
    client.push_ok(vec![StatusUpdate::new("doc1", ProcessingStatus::Ready, 100)]);
    let (coordinator, batches) = coordinator(&client);

    coordinator.reconfigure(&ids(&["doc1", "doc2"]), true);
    advance(10).await;
    assert_eq!(client.call_count(), 1);
    assert_eq!(client.calls()[0], ids(&["doc1", "doc2"]));
    assert_eq!(lock(&batches).len(), 1);
    assert_eq!(coordinator.phase(), PollPhase::Scheduled);

    advance(1000).await;
    assert_eq!(client.call_count(), 2);
    assert_eq!(
        lock(&batches)[1],
        vec![StatusUpdate::new("doc1", ProcessingStatus::Ready, 100)]
    );
}

#[tokio::test(start_paused = true)]
async fn disabled_or_empty_targets_never_poll() {
    let client = Arc::new(ScriptedStatusClient::new());
    let (coordinator, batches) = coordinator(&client);

    coordinator.reconfigure(&ids(&["doc1"]), false);
    coordinator.reconfigure(&[], true);
    advance(5000).await;

    assert_eq!(client.call_count(), 0);
    assert!(lock(&batches).is_empty());
    assert_eq!(coordinator.phase(), PollPhase::Idle);
    assert!(coordinator.subscribe(Vec::new()).is_none());
}

#[tokio::test(start_paused = true)]
async fn failed_cycle_keeps_the_schedule() {
    let client = Arc::new(ScriptedStatusClient::new());
    client.push_err(LibraryError::transport());
    client.push_ok(vec![StatusUpdate::new("doc1", ProcessingStatus::Processing, 60)]);
    let (coordinator, batches) = coordinator(&client);

    coordinator.reconfigure(&ids(&["doc1"]), true);
    advance(10).await;
    assert_eq!(client.call_count(), 1);
    assert!(lock(&batches).is_empty());

    advance(1000).await;
    assert_eq!(client.call_count(), 2);
    assert_eq!(lock(&batches).len(), 1);
}

#[tokio::test(start_paused = true)]
async fn slow_requests_never_overlap() {
    let client = Arc::new(ScriptedStatusClient::new());
    client.set_delay(Duration::from_secs(5));
    let (coordinator, _batches) = coordinator(&client);

    coordinator.reconfigure(&ids(&["doc1"]), true);
    advance(4000).await;
    assert_eq!(client.call_count(), 1);
    assert_eq!(coordinator.phase(), PollPhase::Polling);

    // First request settles at 5s; the next one waits a full interval.
    advance(1500).await;
    assert_eq!(client.call_count(), 1);
    assert_eq!(coordinator.phase(), PollPhase::Scheduled);

    advance(1000).await;
    assert_eq!(client.call_count(), 2);

    advance(20_000).await;
    assert_eq!(client.in_flight.max(), 1);
}

#[tokio::test(start_paused = true)]
async fn stop_discards_the_in_flight_result() {
    let client = Arc::new(ScriptedStatusClient::new());
    client.hold_requests();
    client.push_ok(vec![StatusUpdate::new("doc1", ProcessingStatus::Ready, 100)]);
    let (coordinator, batches) = coordinator(&client);

    coordinator.reconfigure(&ids(&["doc1"]), true);
    advance(10).await;
    assert_eq!(coordinator.phase(), PollPhase::Polling);

    coordinator.stop();
    assert_eq!(coordinator.phase(), PollPhase::Idle);
    client.release(1);
    advance(5000).await;

    assert_eq!(client.call_count(), 1);
    assert!(lock(&batches).is_empty());
}

#[tokio::test(start_paused = true)]
async fn dropping_a_subscription_disposes_it() {
    let client = Arc::new(ScriptedStatusClient::new());
    let (coordinator, _batches) = coordinator(&client);

    let subscription = coordinator.subscribe(ids(&["doc1"])).unwrap();
    let mut phases = subscription.phase_changes();
    advance(10).await;
    assert_eq!(client.call_count(), 1);

    drop(subscription);
    phases.wait_for(|phase| *phase == PollPhase::Idle).await.unwrap();
    advance(5000).await;
    assert_eq!(client.call_count(), 1);
}

#[tokio::test(start_paused = true)]
async fn new_target_set_restarts_immediately_and_drops_old_results() {
    let client = Arc::new(ScriptedStatusClient::new());
    client.echo(42);
    client.hold_requests();
    let (coordinator, batches) = coordinator(&client);

    coordinator.reconfigure(&ids(&["doc1"]), true);
    advance(500).await;
    coordinator.reconfigure(&ids(&["doc2"]), true);
    advance(10).await;
    assert_eq!(client.calls(), vec![ids(&["doc1"]), ids(&["doc2"])]);

    client.release(2);
    advance(10).await;
    assert_eq!(
        *lock(&batches),
        vec![vec![StatusUpdate::new("doc2", ProcessingStatus::Processing, 42)]]
    );
    assert_eq!(coordinator.target_ids(), ids(&["doc2"]));
}

#[tokio::test(start_paused = true)]
async fn reconfiguration_resets_the_clock() {
    let client = Arc::new(ScriptedStatusClient::new());
    let (coordinator, _batches) = coordinator(&client);

    coordinator.reconfigure(&ids(&["doc1"]), true);
    advance(500).await;
    coordinator.reconfigure(&ids(&["doc2"]), true);
    advance(10).await;
    assert_eq!(client.call_count(), 2);

    // doc1's old phase would have fired at 1000ms.
    advance(600).await;
    assert_eq!(client.call_count(), 2);

    advance(500).await;
    assert_eq!(client.call_count(), 3);
    assert_eq!(client.calls()[2], ids(&["doc2"]));
}

#[tokio::test(start_paused = true)]
async fn identical_target_set_keeps_phase() {
    let client = Arc::new(ScriptedStatusClient::new());
    let (coordinator, _batches) = coordinator(&client);

    coordinator.reconfigure(&ids(&["doc1"]), true);
    advance(500).await;
    coordinator.reconfigure(&ids(&["doc1"]), true);
    advance(100).await;
    assert_eq!(client.call_count(), 1);

    advance(500).await;
    assert_eq!(client.call_count(), 2);
}

#[tokio::test(start_paused = true)]
async fn delivers_to_the_current_callback() {
    let client = Arc::new(ScriptedStatusClient::new());
    client.echo(10);
    let (coordinator, first) = coordinator(&client);

    coordinator.reconfigure(&ids(&["doc1"]), true);
    advance(10).await;
    assert_eq!(lock(&first).len(), 1);

    let (replacement, second) = recorder();
    coordinator.set_callback(replacement);
    advance(1000).await;

    assert_eq!(lock(&first).len(), 1);
    assert_eq!(lock(&second).len(), 1);
}
