mod common;

use common::{snap, ScriptedService, Step};
use medvault_client::batch::Batch;
use medvault_client::service::{percent, ProgressSnapshot};
use medvault_client::tracker::{
    track, Observation, PollOptions, ProgressTracker, Subscription, Subscriptions, TrackOutcome,
    TrackerState,
};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio_util::sync::CancellationToken;

fn fast() -> PollOptions {
    PollOptions {
        interval: Duration::from_millis(1),
        backoff_max: Duration::from_millis(4),
        max_consecutive_failures: 0,
    }
}

fn raw(processed: u64, total: u64) -> ProgressSnapshot {
    ProgressSnapshot {
        batch_id: "b1".into(),
        processed,
        total,
        results: Vec::new(),
    }
}

#[test]
fn percent_guards_zero_total() {
    assert_eq!(percent(0, 0), 0);
    assert_eq!(percent(2, 5), 40);
    assert_eq!(percent(1, 3), 33);
    assert_eq!(percent(2, 3), 67);
    assert_eq!(percent(5, 5), 100);
}

#[test]
fn completes_once_and_not_on_zero_total() {
    let mut t = ProgressTracker::new();
    assert!(t.subscribe(Batch::new("b1", 0, 0)));

    assert!(matches!(t.observe(&raw(0, 0)), Observation::Progress(p) if p.percent == 0));
    assert!(matches!(t.observe(&raw(2, 5)), Observation::Progress(p) if p.percent == 40));
    assert!(matches!(t.observe(&raw(2, 5)), Observation::Progress(_)));
    assert!(matches!(t.observe(&raw(5, 5)), Observation::Completed(b) if b.processed == 5));
    assert_eq!(t.state(), &TrackerState::Done("b1".into()));
    assert_eq!(t.observe(&raw(5, 5)), Observation::Ignored);
}

#[test]
fn duplicate_subscribe_is_noop() {
    let mut t = ProgressTracker::new();
    assert!(t.subscribe(Batch::new("b1", 2, 0)));
    assert!(!t.subscribe(Batch::new("b1", 2, 0)));
    t.observe(&raw(2, 2));
    assert!(!t.subscribe(Batch::new("b1", 2, 0)));
    assert_eq!(t.observe(&raw(2, 2)), Observation::Ignored);

    assert!(t.subscribe(Batch::new("b2", 1, 0)));
    assert_eq!(t.state(), &TrackerState::Polling("b2".into()));
}

#[test]
fn snapshots_for_other_batches_are_ignored() {
    let mut t = ProgressTracker::new();
    t.subscribe(Batch::new("b1", 1, 0));
    let mut other = raw(1, 1);
    other.batch_id = "zzz".into();
    assert_eq!(t.observe(&other), Observation::Ignored);
}

#[test]
fn idle_tracker_ignores_everything() {
    let mut t = ProgressTracker::new();
    assert_eq!(t.observe(&raw(1, 1)), Observation::Ignored);
    t.subscribe(Batch::new("b1", 1, 0));
    t.unsubscribe();
    assert_eq!(t.state(), &TrackerState::Idle);
    assert_eq!(t.observe(&raw(1, 1)), Observation::Ignored);
}

#[test]
fn backoff_doubles_and_caps() {
    let opts = PollOptions {
        interval: Duration::from_millis(100),
        backoff_max: Duration::from_millis(500),
        max_consecutive_failures: 0,
    };
    assert_eq!(opts.backoff(0), Duration::from_millis(100));
    assert_eq!(opts.backoff(1), Duration::from_millis(200));
    assert_eq!(opts.backoff(2), Duration::from_millis(400));
    assert_eq!(opts.backoff(3), Duration::from_millis(500));
    assert_eq!(opts.backoff(40), Duration::from_millis(500));
}

#[tokio::test]
async fn track_fires_callback_once_on_completion() {
    let svc = ScriptedService::new(
        "b1",
        vec![
            snap("b1", 0, 0, &[]),
            snap("b1", 2, 5, &["a.pdf", "b.pdf"]),
            snap("b1", 5, 5, &["a.pdf", "b.pdf", "c.pdf", "d.pdf", "e.pdf"]),
        ],
    );
    let mut t = ProgressTracker::new();
    t.subscribe(Batch::new("b1", 5, 0));

    let mut seen = Vec::new();
    let mut done_calls = 0;
    let outcome = track(
        &svc,
        &mut t,
        &fast(),
        &CancellationToken::new(),
        |p| seen.push((p.processed, p.total)),
        |b| {
            done_calls += 1;
            assert_eq!(b.results.len(), 5);
        },
    )
    .await;

    assert!(matches!(outcome, TrackOutcome::Completed(ref b) if b.id == "b1"));
    assert_eq!(done_calls, 1);
    assert_eq!(seen, vec![(0, 5), (2, 5)]);
    assert_eq!(svc.poll_count(), 3);
}

#[tokio::test]
async fn failed_polls_are_retried() {
    let svc = ScriptedService::new(
        "b1",
        vec![Step::Fail(503), Step::Fail(502), snap("b1", 1, 1, &["a.pdf"])],
    );
    let mut t = ProgressTracker::new();
    t.subscribe(Batch::new("b1", 1, 0));

    let outcome = track(&svc, &mut t, &fast(), &CancellationToken::new(), |_| {}, |_| {}).await;
    assert!(matches!(outcome, TrackOutcome::Completed(_)));
    assert_eq!(svc.poll_count(), 3);
}

#[tokio::test]
async fn gives_up_after_configured_failures() {
    let svc = ScriptedService::new("b1", vec![Step::Fail(500)]);
    let mut t = ProgressTracker::new();
    t.subscribe(Batch::new("b1", 1, 0));
    let opts = PollOptions {
        max_consecutive_failures: 3,
        ..fast()
    };

    let mut fired = false;
    let outcome = track(&svc, &mut t, &opts, &CancellationToken::new(), |_| {}, |_| fired = true).await;
    assert_eq!(outcome, TrackOutcome::Abandoned { failures: 3 });
    assert!(!fired);
    assert_eq!(t.state(), &TrackerState::Idle);
}

#[tokio::test]
async fn cancelled_before_start_never_polls() {
    let svc = ScriptedService::new("b1", vec![snap("b1", 1, 1, &["a.pdf"])]);
    let mut t = ProgressTracker::new();
    t.subscribe(Batch::new("b1", 1, 0));
    let cancel = CancellationToken::new();
    cancel.cancel();

    let mut fired = false;
    let outcome = track(&svc, &mut t, &fast(), &cancel, |_| {}, |_| fired = true).await;
    assert_eq!(outcome, TrackOutcome::Cancelled);
    assert!(!fired);
    assert_eq!(svc.poll_count(), 0);
}

#[tokio::test]
async fn done_tracker_does_not_poll_again() {
    let svc = ScriptedService::new("b1", vec![snap("b1", 1, 1, &["a.pdf"])]);
    let mut t = ProgressTracker::new();
    t.subscribe(Batch::new("b1", 1, 0));
    t.observe(&raw(1, 1));

    let outcome = track(&svc, &mut t, &fast(), &CancellationToken::new(), |_| {}, |_| {}).await;
    assert_eq!(outcome, TrackOutcome::Inactive);
    assert_eq!(svc.poll_count(), 0);
}

#[tokio::test]
async fn dropping_subscription_stops_polling() {
    let svc = Arc::new(ScriptedService::new("b1", vec![snap("b1", 0, 3, &[])]));
    let done = Arc::new(AtomicUsize::new(0));
    let done_cb = Arc::clone(&done);
    let root = CancellationToken::new();

    let sub = Subscription::spawn(
        &Arc::new(Subscriptions::new()),
        Arc::clone(&svc),
        Batch::new("b1", 3, 0),
        fast(),
        &root,
        |_| {},
        move |_| {
            done_cb.fetch_add(1, Ordering::SeqCst);
        },
    );
    tokio::time::sleep(Duration::from_millis(20)).await;
    drop(sub);
    tokio::time::sleep(Duration::from_millis(20)).await;
    let after_drop = svc.poll_count();
    tokio::time::sleep(Duration::from_millis(30)).await;

    assert!(after_drop > 0);
    assert_eq!(svc.poll_count(), after_drop);
    assert_eq!(done.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn parent_cancellation_reaches_subscription() {
    let svc = Arc::new(ScriptedService::new("b1", vec![snap("b1", 1, 3, &["a.pdf"])]));
    let root = CancellationToken::new();
    let progress = Arc::new(Mutex::new(Vec::new()));
    let progress_cb = Arc::clone(&progress);

    let sub = Subscription::spawn(
        &Arc::new(Subscriptions::new()),
        svc,
        Batch::new("b1", 3, 0),
        fast(),
        &root,
        move |p| progress_cb.lock().unwrap().push(p.percent),
        |_| panic!("must not complete"),
    );
    tokio::time::sleep(Duration::from_millis(10)).await;
    root.cancel();

    assert_eq!(sub.join().await, TrackOutcome::Cancelled);
    assert!(progress.lock().unwrap().iter().all(|&p| p == 33));
}

#[tokio::test]
async fn second_subscription_for_same_batch_never_completes() {
    let svc = Arc::new(ScriptedService::new("b1", vec![snap("b1", 1, 1, &["a.pdf"])]));
    let registry = Arc::new(Subscriptions::new());
    let root = CancellationToken::new();
    let done = Arc::new(AtomicUsize::new(0));

    let spawn = |done: Arc<AtomicUsize>| {
        Subscription::spawn(
            &registry,
            Arc::clone(&svc),
            Batch::new("b1", 1, 0),
            fast(),
            &root,
            |_| {},
            move |_| {
                done.fetch_add(1, Ordering::SeqCst);
            },
        )
    };
    let first = spawn(Arc::clone(&done));
    let second = spawn(Arc::clone(&done));

    assert!(matches!(first.join().await, TrackOutcome::Completed(_)));
    assert_eq!(second.join().await, TrackOutcome::Inactive);
    assert_eq!(done.load(Ordering::SeqCst), 1);

    let third = spawn(Arc::clone(&done));
    assert_eq!(third.join().await, TrackOutcome::Inactive);
    assert_eq!(done.load(Ordering::SeqCst), 1);
    assert_eq!(svc.poll_count(), 1);
    assert!(registry.is_claimed("b1"));
}

#[tokio::test]
async fn cancelled_batch_can_be_subscribed_again() {
    let svc = Arc::new(ScriptedService::new(
        "b1",
        vec![snap("b1", 0, 1, &[]), snap("b1", 0, 1, &[]), snap("b1", 1, 1, &["a.pdf"])],
    ));
    let registry = Arc::new(Subscriptions::new());
    let root = CancellationToken::new();

    let first = Subscription::spawn(
        &registry,
        Arc::clone(&svc),
        Batch::new("b1", 1, 0),
        PollOptions {
            interval: Duration::from_secs(5),
            ..fast()
        },
        &root,
        |_| {},
        |_| panic!("cancelled before completion"),
    );
    tokio::time::sleep(Duration::from_millis(10)).await;
    first.cancel();
    assert_eq!(first.join().await, TrackOutcome::Cancelled);
    assert!(!registry.is_claimed("b1"));

    let second = Subscription::spawn(
        &registry,
        Arc::clone(&svc),
        Batch::new("b1", 1, 0),
        fast(),
        &root,
        |_| {},
        |_| {},
    );
    assert!(matches!(second.join().await, TrackOutcome::Completed(_)));
}
