//! Integration tests for the crawl health tracker.
//!
//! Every scenario runs against both the in-memory store and SQLite, so the
//! two backends are held to the same behaviour.

mod common;

use chrono::{Duration, Utc};
use common::{fail, start_at, succeed};
use crawl_health::{
    ErrorKind, EventCounts, HealthStore, HealthTier, HealthTracker, RunStatus, SkipDecision,
};

async fn round_trip<S: HealthStore>(tracker: HealthTracker<S>) {
    let id = tracker.start_run("first-avenue").await.unwrap();

    let run = tracker.get_run(id).await.unwrap().unwrap();
    assert_eq!(run.status, RunStatus::Running);
    assert!(tracker.get_health("first-avenue").await.unwrap().is_none());

    tracker.complete_failure(id, "timeout").await.unwrap();

    let health = tracker.get_health("first-avenue").await.unwrap().unwrap();
    assert_eq!(health.total_crawls, 1);
    assert_eq!(health.successful_crawls, 0);
    assert_eq!(health.consecutive_failures, 1);
    assert_eq!(health.last_error_kind, Some(ErrorKind::Timeout));
    assert!(health.last_failure_at.is_some());
    assert!(health.last_success_at.is_none());

    let run = tracker.get_run(id).await.unwrap().unwrap();
    assert_eq!(run.status, RunStatus::Failed);
    assert_eq!(run.error_message.as_deref(), Some("timeout"));
    assert!(run.completed_at.is_some());
    assert!(run.duration_secs.unwrap() >= 0.0);
}

async fn success_records_counts<S: HealthStore>(tracker: HealthTracker<S>) {
    let id = tracker.start_run("walker").await.unwrap();
    tracker
        .complete_success(id, EventCounts::new(42, 7, 3))
        .await
        .unwrap();

    let run = tracker.get_run(id).await.unwrap().unwrap();
    assert_eq!(run.status, RunStatus::Success);
    assert_eq!(
        (run.events_found, run.events_new, run.events_updated),
        (42, 7, 3)
    );
    assert!(run.error_kind.is_none());

    let health = tracker.get_health("walker").await.unwrap().unwrap();
    assert_eq!(health.health_score, 100.0);
    assert_eq!(health.successful_crawls, 1);
}

async fn reset_on_success<S: HealthStore>(tracker: HealthTracker<S>) {
    for _ in 0..6 {
        fail(&tracker, "cedar", "Connection refused").await;
    }
    assert_eq!(
        tracker
            .get_health("cedar")
            .await
            .unwrap()
            .unwrap()
            .consecutive_failures,
        6
    );

    succeed(&tracker, "cedar").await;

    let health = tracker.get_health("cedar").await.unwrap().unwrap();
    assert_eq!(health.consecutive_failures, 0);
    assert_eq!(health.total_crawls, 7);
    assert_eq!(health.successful_crawls, 1);
    // 100 - 6*5 + 5
    assert_eq!(health.health_score, 75.0);
}

async fn penalty_asymmetry<S: HealthStore>(tracker: HealthTracker<S>) {
    fail(&tracker, "permanent", "Failed to parse HTML").await;
    fail(&tracker, "transient", "Request timed out").await;

    let permanent = tracker.get_health("permanent").await.unwrap().unwrap();
    let transient = tracker.get_health("transient").await.unwrap().unwrap();
    assert_eq!(permanent.health_score, 85.0);
    assert_eq!(transient.health_score, 95.0);
}

async fn score_stays_clamped<S: HealthStore>(tracker: HealthTracker<S>) {
    for _ in 0..10 {
        fail(&tracker, "broken", "403 Forbidden").await;
        let score = tracker
            .get_health("broken")
            .await
            .unwrap()
            .unwrap()
            .health_score;
        assert!((0.0..=100.0).contains(&score), "score {}", score);
    }
    let health = tracker.get_health("broken").await.unwrap().unwrap();
    assert_eq!(health.health_score, 0.0);

    for _ in 0..30 {
        succeed(&tracker, "broken").await;
    }
    let health = tracker.get_health("broken").await.unwrap().unwrap();
    assert_eq!(health.health_score, 100.0);
}

async fn duplicate_completion_ignored<S: HealthStore>(tracker: HealthTracker<S>) {
    let id = tracker.start_run("dup").await.unwrap();
    assert!(tracker
        .complete_success(id, EventCounts::default())
        .await
        .unwrap()
        .is_some());
    assert!(tracker
        .complete_failure(id, "429 Too Many Requests")
        .await
        .unwrap()
        .is_none());

    let health = tracker.get_health("dup").await.unwrap().unwrap();
    assert_eq!(health.total_crawls, 1);
    assert_eq!(health.consecutive_failures, 0);
    assert_eq!(
        tracker.get_run(id).await.unwrap().unwrap().status,
        RunStatus::Success
    );
}

async fn transient_streak_exemption<S: HealthStore>(tracker: HealthTracker<S>) {
    for _ in 0..7 {
        fail(&tracker, "slow", "Operation timed out").await;
    }
    assert_eq!(
        tracker.should_skip("slow").await.unwrap(),
        SkipDecision::allow()
    );

    for _ in 0..6 {
        fail(&tracker, "changed", "Operation timed out").await;
    }
    fail(&tracker, "changed", "Selector .event-card matched nothing").await;
    assert_eq!(
        tracker.should_skip("changed").await.unwrap(),
        SkipDecision::skip("consecutive_failures=7")
    );
}

async fn quarantine_on_low_score<S: HealthStore>(tracker: HealthTracker<S>) {
    for _ in 0..7 {
        fail(&tracker, "dead", "401 Unauthorized").await;
    }
    let decision = tracker.should_skip("dead").await.unwrap();
    assert!(decision.skip);
    assert_eq!(decision.reason, "health_score=0.00");

    let health = tracker.get_health("dead").await.unwrap().unwrap();
    assert_eq!(health.tier(), HealthTier::Quarantined);
}

async fn unknown_source_defaults<S: HealthStore>(tracker: HealthTracker<S>) {
    assert_eq!(
        tracker.recommended_delay("never-seen").await.unwrap(),
        std::time::Duration::from_secs(1)
    );
    assert_eq!(
        tracker.should_skip("never-seen").await.unwrap(),
        SkipDecision::allow()
    );
    assert_eq!(tracker.recommended_workers().await.unwrap(), 2);
}

async fn delay_follows_streak<S: HealthStore>(tracker: HealthTracker<S>) {
    let delays = [2, 2, 5, 5, 10, 10];
    for expected in delays {
        fail(&tracker, "flaky", "DNS lookup failed").await;
        assert_eq!(
            tracker.recommended_delay("flaky").await.unwrap().as_secs(),
            expected
        );
    }
    succeed(&tracker, "flaky").await;
    assert_eq!(tracker.recommended_delay("flaky").await.unwrap().as_secs(), 1);
}

async fn acute_override<S: HealthStore>(tracker: HealthTracker<S>) {
    for i in 0..11 {
        succeed(&tracker, &format!("venue-{}", i)).await;
    }
    for i in 0..4 {
        fail(
            &tracker,
            &format!("socket-{}", i),
            "OSError: [Errno 24] Too many open files",
        )
        .await;
    }

    // Average health is well above 70, so the chronic stage alone says 4.
    assert_eq!(tracker.recommended_workers().await.unwrap(), 1);
}

async fn chronic_workers<S: HealthStore>(tracker: HealthTracker<S>) {
    succeed(&tracker, "good").await;
    assert_eq!(tracker.recommended_workers().await.unwrap(), 4);

    for _ in 0..4 {
        fail(&tracker, "bad", "json decode error").await;
    }
    // (100 + 40) / 2 = 70, not below 70
    assert_eq!(tracker.recommended_workers().await.unwrap(), 4);

    fail(&tracker, "bad", "json decode error").await;
    // (100 + 25) / 2 = 62.5
    assert_eq!(tracker.recommended_workers().await.unwrap(), 3);
}

async fn listing_order<S: HealthStore>(tracker: HealthTracker<S>) {
    succeed(&tracker, "a").await;
    for _ in 0..2 {
        fail(&tracker, "b", "parse error").await;
    }
    for _ in 0..4 {
        fail(&tracker, "c", "connection reset by peer").await;
    }

    let all: Vec<String> = tracker
        .get_all_health()
        .await
        .unwrap()
        .into_iter()
        .map(|h| h.source_key)
        .collect();
    // b = 70, c = 80, a = 100
    assert_eq!(all, vec!["b", "c", "a"]);

    let unhealthy: Vec<(String, u32)> = tracker
        .unhealthy_sources(2)
        .await
        .unwrap()
        .into_iter()
        .map(|h| (h.source_key, h.consecutive_failures))
        .collect();
    assert_eq!(unhealthy, vec![("c".to_string(), 4), ("b".to_string(), 2)]);
}

async fn retention<S: HealthStore>(tracker: HealthTracker<S>) {
    let now = Utc::now();
    let old = start_at(&tracker, "archive", now - Duration::days(45)).await;
    tracker
        .complete_success(old, EventCounts::default())
        .await
        .unwrap();
    let older = start_at(&tracker, "archive", now - Duration::days(31)).await;
    tracker.complete_failure(older, "bot detected").await.unwrap();
    let recent = start_at(&tracker, "archive", now - Duration::days(29)).await;
    tracker
        .complete_success(recent, EventCounts::default())
        .await
        .unwrap();
    succeed(&tracker, "fresh").await;

    let health_before = tracker.get_all_health().await.unwrap();

    let deleted = tracker.cleanup(30).await.unwrap();
    assert_eq!(deleted, 2);

    assert!(tracker.get_run(old).await.unwrap().is_none());
    assert!(tracker.get_run(older).await.unwrap().is_none());
    assert!(tracker.get_run(recent).await.unwrap().is_some());

    assert_eq!(tracker.get_all_health().await.unwrap(), health_before);
}

async fn stale_run_reconciliation<S: HealthStore>(tracker: HealthTracker<S>) {
    let stuck = start_at(&tracker, "hung", Utc::now() - Duration::minutes(180)).await;
    let live = tracker.start_run("hung").await.unwrap();

    let closed = tracker
        .reconcile_stale_runs(Duration::minutes(120))
        .await
        .unwrap();
    assert_eq!(closed, 1);

    let stuck = tracker.get_run(stuck).await.unwrap().unwrap();
    assert_eq!(stuck.status, RunStatus::Failed);
    assert_eq!(stuck.error_kind, Some(ErrorKind::Timeout));
    assert_eq!(
        stuck.error_message.as_deref(),
        Some("run abandoned: timed out after 120 minutes without completion")
    );
    assert_eq!(
        tracker.get_run(live).await.unwrap().unwrap().status,
        RunStatus::Running
    );

    // A second sweep finds nothing new.
    assert_eq!(
        tracker
            .reconcile_stale_runs(Duration::minutes(120))
            .await
            .unwrap(),
        0
    );
}

async fn summary<S: HealthStore>(tracker: HealthTracker<S>) {
    succeed(&tracker, "a").await;
    succeed(&tracker, "a").await;
    fail(&tracker, "b", "HTTP 429").await;
    fail(&tracker, "c", "captcha required").await;
    tracker.start_run("d").await.unwrap();

    let summary = tracker.system_summary().await.unwrap();
    assert_eq!(summary.today.total, 5);
    assert_eq!(summary.today.succeeded, 2);
    assert_eq!(summary.today.failed, 2);
    assert_eq!(summary.today.running, 1);
    assert_eq!(summary.success_rate, 0.5);
    assert_eq!(summary.errors_by_kind.get(&ErrorKind::RateLimit), Some(&1));
    assert_eq!(summary.errors_by_kind.get(&ErrorKind::Captcha), Some(&1));
    assert_eq!(summary.tracked_sources, 3);
    assert_eq!(summary.tiers.healthy, 3);
    assert_eq!(summary.recommended_workers, 4);
}

async fn summary_bands_include_quarantined<S: HealthStore>(tracker: HealthTracker<S>) {
    for _ in 0..7 {
        fail(&tracker, "locked-out", "401 Unauthorized").await;
    }
    for i in 0..4 {
        fail(
            &tracker,
            &format!("socket-{}", i),
            "[Errno 24] Too many open files",
        )
        .await;
    }

    let summary = tracker.system_summary().await.unwrap();
    assert_eq!(summary.tiers.unhealthy, 1);
    assert_eq!(summary.tiers.quarantined, 1);
    assert_eq!(summary.tiers.healthy, 4);
    // 11 runs in the window, 4 socket failures
    assert_eq!(summary.recommended_workers, 1);
    assert_eq!(
        summary.recommended_workers,
        tracker.recommended_workers().await.unwrap()
    );
}

async fn concurrent_completions<S: HealthStore + 'static>(tracker: HealthTracker<S>) {
    let mut handles = Vec::new();
    for i in 0..20 {
        let tracker = tracker.clone();
        handles.push(tokio::spawn(async move {
            let id = tracker.start_run("busy").await.unwrap();
            if i % 2 == 0 {
                tracker
                    .complete_success(id, EventCounts::default())
                    .await
                    .unwrap();
            } else {
                tracker.complete_failure(id, "timed out").await.unwrap();
            }
        }));
    }
    for handle in handles {
        handle.await.unwrap();
    }

    let health = tracker.get_health("busy").await.unwrap().unwrap();
    assert_eq!(health.total_crawls, 20);
    assert_eq!(health.successful_crawls, 10);
}

macro_rules! backend_tests {
    ($($name:ident),* $(,)?) => {
        mod memory {
            $(
                #[tokio::test]
                async fn $name() {
                    super::$name(super::common::memory_tracker()).await;
                }
            )*
        }

        mod sqlite {
            $(
                #[tokio::test]
                async fn $name() {
                    super::$name(super::common::sqlite_tracker().await).await;
                }
            )*
        }
    };
}

backend_tests!(
    round_trip,
    success_records_counts,
    reset_on_success,
    penalty_asymmetry,
    score_stays_clamped,
    duplicate_completion_ignored,
    transient_streak_exemption,
    quarantine_on_low_score,
    unknown_source_defaults,
    delay_follows_streak,
    acute_override,
    chronic_workers,
    listing_order,
    retention,
    stale_run_reconciliation,
    summary,
    summary_bands_include_quarantined,
    concurrent_completions,
);
