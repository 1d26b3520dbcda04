//! Integration tests for the dispatcher.
//!
//! These drive whole cycles and queue messages against `MemoryStore` and
//! `MockExtractor`, checking job state, counters, stored records and the
//! settings bookkeeping after each step.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use scrape_pipeline::{
    submit_crawl, submit_urls,
    testing::{fast_settings, sample_extracted, MemoryStore, MockExtractor},
    Dispatcher, ExtractionError, JobId, JobStatus, JobStore, MessageOutcome, ScrapeJob,
    ScrapeMessage, ScraperSettings, SettingsStore, SkipReason, UrlStatus,
};
use tokio_util::sync::CancellationToken;

const A: &str = "https://a.example/program";
const B: &str = "https://b.example/program";
const C: &str = "https://c.example/program";

/// Helper: store with the given settings and a mock that knows A, B and C.
fn setup(settings: ScraperSettings) -> (Arc<MemoryStore>, MockExtractor, Dispatcher) {
    let store = Arc::new(MemoryStore::with_settings(settings));
    let mock = MockExtractor::new()
        .with_record(A, sample_extracted("Alpha Forum"))
        .with_record(B, sample_extracted("Beta Forum"))
        .with_record(C, sample_extracted("Gamma Forum"));
    let dispatcher = Dispatcher::new(store.clone(), Arc::new(mock.clone()));
    (store, mock, dispatcher)
}

fn urls(list: &[&str]) -> Vec<String> {
    list.iter().map(|u| u.to_string()).collect()
}

async fn job(store: &MemoryStore, id: JobId) -> ScrapeJob {
    store.get_job(id).await.unwrap().unwrap()
}

fn assert_consistent(job: &ScrapeJob) {
    assert!(
        job.counters_consistent(),
        "counters out of sync: processed={} successful={} failed={} total={}",
        job.processed_urls,
        job.successful_urls,
        job.failed_urls,
        job.total_urls
    );
    let completed = job.status == JobStatus::Completed;
    let done = job.all_entries_terminal() && job.processed_urls >= job.total_urls;
    assert_eq!(completed, done, "completed status disagrees with entry states");
}

fn minutes(t: DateTime<Utc>, m: i64) -> DateTime<Utc> {
    t + chrono::Duration::minutes(m)
}

#[tokio::test]
async fn test_batches_are_spread_over_cycles() {
    let (store, mock, dispatcher) = setup(ScraperSettings {
        batch_size: 2,
        ..fast_settings()
    });
    let submitted = submit_urls(&*store, urls(&[A, B, C])).await.unwrap();
    let t0 = Utc::now();

    let first = dispatcher.run_cycle(t0).await.unwrap();
    assert!(first.ran());
    assert_eq!(first.tallies.processed, 2);

    let after_first = job(&store, submitted.id).await;
    assert_eq!(after_first.status, JobStatus::Processing);
    assert_eq!(after_first.processed_urls, 2);
    assert_eq!(after_first.urls[2].status, UrlStatus::Pending);
    assert_consistent(&after_first);
    assert_eq!(mock.extract_calls(), urls(&[A, B]));

    let second = dispatcher.run_cycle(minutes(t0, 5)).await.unwrap();
    assert_eq!(second.tallies.processed, 1);
    assert_eq!(second.jobs_completed, 1);

    let done = job(&store, submitted.id).await;
    assert_eq!(done.status, JobStatus::Completed);
    assert_eq!(done.processed_urls, 3);
    assert_eq!(done.successful_urls, 3);
    assert_eq!(done.progress(), 100);
    assert_consistent(&done);
    assert!(done.urls.iter().all(|e| e.program_id.is_some()));

    let programs = store.programs().await;
    assert_eq!(programs.len(), 3);
    assert!(programs.iter().all(|p| p.draft));
    assert_eq!(programs[0].record.source_urls, vec![A.to_string()]);

    let settings = store.load_settings().await.unwrap();
    assert_eq!(settings.last_run, Some(minutes(t0, 5)));
    assert_eq!(settings.total_processed, 3);
    assert_eq!(settings.total_successful, 3);
    assert_eq!(settings.total_failed, 0);
}

#[tokio::test]
async fn test_disabled_scraper_changes_nothing() {
    let (store, mock, dispatcher) = setup(ScraperSettings {
        enabled: false,
        ..fast_settings()
    });
    let submitted = submit_urls(&*store, urls(&[A])).await.unwrap();

    let report = dispatcher.run_cycle(Utc::now()).await.unwrap();
    assert_eq!(report.skipped, Some(SkipReason::Disabled));
    assert_eq!(report.summary(), "Automatic processing is disabled");

    assert_eq!(job(&store, submitted.id).await, submitted);
    assert_eq!(mock.extract_call_count(), 0);
    assert_eq!(store.load_settings().await.unwrap().last_run, None);
}

#[tokio::test]
async fn test_cycle_before_frequency_elapsed_is_a_noop() {
    let (store, mock, dispatcher) = setup(ScraperSettings {
        batch_size: 1,
        ..fast_settings()
    });
    let submitted = submit_urls(&*store, urls(&[A, B])).await.unwrap();
    let t0 = Utc::now();

    dispatcher.run_cycle(t0).await.unwrap();
    let after_first = job(&store, submitted.id).await;

    let early = dispatcher.run_cycle(minutes(t0, 1)).await.unwrap();
    assert!(matches!(
        early.skipped,
        Some(SkipReason::NotDue {
            frequency_minutes: 5,
            ..
        })
    ));
    assert!(early.summary().starts_with("Skipping - only 1.0 minutes"));

    assert_eq!(job(&store, submitted.id).await, after_first);
    assert_eq!(mock.extract_call_count(), 1);
    assert_eq!(store.load_settings().await.unwrap().last_run, Some(t0));
}

#[tokio::test]
async fn test_service_error_fails_only_that_url() {
    let store = Arc::new(MemoryStore::with_settings(fast_settings()));
    let failing = "https://down.example/program";
    let mock = MockExtractor::new()
        .with_record(A, sample_extracted("Alpha Forum"))
        .with_service_error(failing, 500, "upstream exploded")
        .with_record(C, sample_extracted("Gamma Forum"));
    let dispatcher = Dispatcher::new(store.clone(), Arc::new(mock));
    let submitted = submit_urls(&*store, urls(&[A, failing, C])).await.unwrap();

    let report = dispatcher.run_cycle(Utc::now()).await.unwrap();
    assert_eq!(report.tallies.failed, 1);
    assert_eq!(report.tallies.successful, 2);

    let done = job(&store, submitted.id).await;
    assert_eq!(done.status, JobStatus::Completed);
    assert_eq!(done.failed_urls, 1);
    assert_eq!(done.urls[1].status, UrlStatus::Failed);
    assert!(done.urls[1].program_id.is_none());
    let error = done.urls[1].error.as_deref().unwrap();
    assert!(error.contains("500"));
    assert!(error.contains("upstream exploded"));
    assert_consistent(&done);
}

#[tokio::test]
async fn test_validation_and_storage_failures_are_per_url() {
    let store = Arc::new(MemoryStore::with_settings(fast_settings()));
    let mut incomplete = sample_extracted("Incomplete");
    incomplete.address = None;
    incomplete.zip_code = Some("12".into());
    let mock = MockExtractor::new()
        .with_record(A, incomplete)
        .with_record(B, sample_extracted("Unwritable"))
        .with_timeout(C);
    store.fail_writes_for("Unwritable").await;
    let dispatcher = Dispatcher::new(store.clone(), Arc::new(mock));
    let submitted = submit_urls(&*store, urls(&[A, B, C])).await.unwrap();

    dispatcher.run_cycle(Utc::now()).await.unwrap();

    let done = job(&store, submitted.id).await;
    assert_eq!(done.status, JobStatus::Completed);
    assert_eq!(done.failed_urls, 3);
    let errors: Vec<&str> = done
        .urls
        .iter()
        .map(|e| e.error.as_deref().unwrap_or_default())
        .collect();
    assert!(errors[0].contains("Missing required field: address"));
    assert!(errors[0].contains("Invalid zipCode format"));
    assert!(errors[1].contains("Unwritable"));
    assert!(errors[2].contains("timed out"));
    assert_eq!(store.program_count().await, 0);
}

#[tokio::test]
async fn test_last_run_is_stamped_even_without_jobs() {
    let (store, _mock, dispatcher) = setup(fast_settings());
    let now = Utc::now();

    let report = dispatcher.run_cycle(now).await.unwrap();
    assert!(report.ran());
    assert_eq!(report.jobs_selected, 0);
    assert_eq!(report.summary(), "No pending jobs to process");
    assert_eq!(store.load_settings().await.unwrap().last_run, Some(now));
}

#[tokio::test]
async fn test_max_concurrent_jobs_picks_oldest() {
    let (store, mock, dispatcher) = setup(ScraperSettings {
        max_concurrent_jobs: 1,
        ..fast_settings()
    });
    let older = submit_urls(&*store, urls(&[A])).await.unwrap();
    let mut newer = ScrapeJob::for_urls(urls(&[B]));
    newer.created_at = older.created_at + chrono::Duration::seconds(1);
    store.create_job(&newer).await.unwrap();

    let report = dispatcher.run_cycle(Utc::now()).await.unwrap();
    assert_eq!(report.jobs_selected, 1);
    assert_eq!(mock.extract_calls(), urls(&[A]));
    assert_eq!(job(&store, older.id).await.status, JobStatus::Completed);
    assert_eq!(job(&store, newer.id).await.status, JobStatus::Queued);
}

#[tokio::test]
async fn test_crawl_discovery_feeds_entries() {
    let store = Arc::new(MemoryStore::with_settings(fast_settings()));
    let root = "https://network.example";
    let mock = MockExtractor::new()
        .with_discovery(root, urls(&[A, B, A]))
        .with_record(A, sample_extracted("Alpha Forum"))
        .with_record(B, sample_extracted("Beta Forum"));
    let dispatcher = Dispatcher::new(store.clone(), Arc::new(mock.clone()));
    let submitted = submit_crawl(&*store, root).await.unwrap();

    dispatcher.run_cycle(Utc::now()).await.unwrap();

    let done = job(&store, submitted.id).await;
    assert_eq!(mock.discover_calls(), urls(&[root]));
    assert_eq!(done.total_urls, 2);
    assert_eq!(done.successful_urls, 2);
    assert_eq!(done.status, JobStatus::Completed);
    assert_consistent(&done);
}

#[tokio::test]
async fn test_empty_discovery_completes_the_job() {
    let store = Arc::new(MemoryStore::with_settings(fast_settings()));
    let root = "https://empty.example";
    let mock = MockExtractor::new().with_discovery(root, Vec::new());
    let dispatcher = Dispatcher::new(store.clone(), Arc::new(mock));
    let submitted = submit_crawl(&*store, root).await.unwrap();

    let report = dispatcher.run_cycle(Utc::now()).await.unwrap();
    assert_eq!(report.jobs_completed, 1);

    let done = job(&store, submitted.id).await;
    assert_eq!(done.status, JobStatus::Completed);
    assert_eq!(done.progress(), 0);
}

#[tokio::test]
async fn test_discovery_failure_fails_only_that_job() {
    let store = Arc::new(MemoryStore::with_settings(fast_settings()));
    let root = "https://broken.example";
    let mock = MockExtractor::new()
        .with_discovery_error(root, || ExtractionError::Service {
            status: 503,
            body: "crawler offline".to_string(),
        })
        .with_record(A, sample_extracted("Alpha Forum"));
    let dispatcher = Dispatcher::new(store.clone(), Arc::new(mock));

    let crawl = submit_crawl(&*store, root).await.unwrap();
    let mut extract = ScrapeJob::for_urls(urls(&[A]));
    extract.created_at = crawl.created_at + chrono::Duration::seconds(1);
    store.create_job(&extract).await.unwrap();

    let report = dispatcher.run_cycle(Utc::now()).await.unwrap();
    assert_eq!(report.jobs_failed, 1);
    assert_eq!(report.jobs_completed, 1);

    let failed = job(&store, crawl.id).await;
    assert_eq!(failed.status, JobStatus::Failed);
    let log = failed.error_log.as_deref().unwrap();
    assert!(log.contains("crawl discovery failed"));
    assert!(log.contains("crawler offline"));

    assert_eq!(job(&store, extract.id).await.status, JobStatus::Completed);
}

#[tokio::test]
async fn test_terminal_jobs_are_never_reopened() {
    let (store, mock, dispatcher) = setup(fast_settings());
    let mut failed = ScrapeJob::for_urls(urls(&[A]));
    failed.status = JobStatus::Failed;
    failed.error_log = Some("aborted".to_string());
    store.create_job(&failed).await.unwrap();

    dispatcher.run_cycle(Utc::now()).await.unwrap();
    let outcome = dispatcher
        .process_message(&ScrapeMessage::extract(failed.id, A), Utc::now())
        .await
        .unwrap();

    assert_eq!(outcome, MessageOutcome::AlreadySettled);
    assert_eq!(job(&store, failed.id).await, failed);
    assert_eq!(mock.extract_call_count(), 0);
}

#[tokio::test(start_paused = true)]
async fn test_delay_applies_between_urls() {
    let (store, _mock, dispatcher) = setup(ScraperSettings {
        delay_between_requests_seconds: 2,
        ..ScraperSettings::default()
    });
    submit_urls(&*store, urls(&[A, B, C])).await.unwrap();

    let started = tokio::time::Instant::now();
    let report = dispatcher.run_cycle(Utc::now()).await.unwrap();

    assert_eq!(report.tallies.processed, 3);
    let elapsed = started.elapsed();
    assert!(elapsed >= Duration::from_secs(4), "elapsed {:?}", elapsed);
    assert!(elapsed < Duration::from_secs(5), "elapsed {:?}", elapsed);
}

#[tokio::test(start_paused = true)]
async fn test_shutdown_interrupts_the_delay() {
    let store = Arc::new(MemoryStore::with_settings(ScraperSettings {
        delay_between_requests_seconds: 60,
        ..ScraperSettings::default()
    }));
    let mock = MockExtractor::new()
        .with_record(A, sample_extracted("Alpha Forum"))
        .with_record(B, sample_extracted("Beta Forum"));
    let token = CancellationToken::new();
    let dispatcher = Dispatcher::new(store.clone(), Arc::new(mock.clone()))
        .with_shutdown(token.clone());
    let submitted = submit_urls(&*store, urls(&[A, B])).await.unwrap();

    let canceller = tokio::spawn(async move {
        tokio::time::sleep(Duration::from_secs(10)).await;
        token.cancel();
    });
    let report = dispatcher.run_cycle(Utc::now()).await.unwrap();
    canceller.await.unwrap();

    assert!(report.interrupted);
    assert_eq!(mock.extract_calls(), urls(&[A]));

    let partial = job(&store, submitted.id).await;
    assert_eq!(partial.status, JobStatus::Processing);
    assert_eq!(partial.urls[1].status, UrlStatus::Pending);
    assert_consistent(&partial);
}

// ============================================================================
// Queue messages
// ============================================================================

#[tokio::test]
async fn test_messages_process_one_url_each() {
    let (store, mock, dispatcher) = setup(fast_settings());
    let submitted = submit_urls(&*store, urls(&[A, B])).await.unwrap();
    let messages = ScrapeMessage::for_job(&submitted);
    assert_eq!(messages.len(), 2);

    let first = dispatcher.process_message(&messages[0], Utc::now()).await.unwrap();
    assert!(matches!(first, MessageOutcome::Processed(t) if t.successful == 1));
    let partial = job(&store, submitted.id).await;
    assert_eq!(partial.status, JobStatus::Processing);
    assert_consistent(&partial);

    dispatcher.process_message(&messages[1], Utc::now()).await.unwrap();
    let done = job(&store, submitted.id).await;
    assert_eq!(done.status, JobStatus::Completed);
    assert_consistent(&done);
    assert_eq!(mock.extract_call_count(), 2);
    assert_eq!(store.load_settings().await.unwrap().total_processed, 2);
}

#[tokio::test]
async fn test_unsettled_messages_cover_only_remaining_work() {
    let (store, _mock, dispatcher) = setup(fast_settings());
    let submitted = submit_urls(&*store, urls(&[A, B, C])).await.unwrap();
    dispatcher
        .process_message(&ScrapeMessage::extract(submitted.id, A), Utc::now())
        .await
        .unwrap();

    let partial = job(&store, submitted.id).await;
    assert_eq!(
        ScrapeMessage::for_unsettled(&partial),
        vec![
            ScrapeMessage::extract(submitted.id, B),
            ScrapeMessage::extract(submitted.id, C),
        ]
    );

    let crawl = submit_crawl(&*store, "https://root.example").await.unwrap();
    assert_eq!(
        ScrapeMessage::for_unsettled(&crawl),
        vec![ScrapeMessage::crawl(crawl.id, "https://root.example")]
    );

    for message in ScrapeMessage::for_unsettled(&partial) {
        dispatcher.process_message(&message, Utc::now()).await.unwrap();
    }
    let done = job(&store, submitted.id).await;
    assert_eq!(done.status, JobStatus::Completed);
    assert!(ScrapeMessage::for_unsettled(&done).is_empty());
}

#[tokio::test]
async fn test_redelivered_message_for_settled_url_is_acknowledged() {
    let (store, mock, dispatcher) = setup(fast_settings());
    let submitted = submit_urls(&*store, urls(&[A, B])).await.unwrap();
    let message = ScrapeMessage::extract(submitted.id, A);

    dispatcher.process_message(&message, Utc::now()).await.unwrap();
    let again = dispatcher.process_message(&message, Utc::now()).await.unwrap();

    assert_eq!(again, MessageOutcome::AlreadySettled);
    assert!(again.is_ack());
    assert_eq!(mock.extract_call_count(), 1);
    assert_eq!(store.program_count().await, 1);

    let partial = job(&store, submitted.id).await;
    assert_eq!(partial.processed_urls, 1);
    assert_consistent(&partial);
}

#[tokio::test]
async fn test_redelivery_after_lost_settle_updates_instead_of_creating() {
    let (store, mock, dispatcher) = setup(fast_settings());
    let submitted = submit_urls(&*store, urls(&[A])).await.unwrap();
    let message = ScrapeMessage::extract(submitted.id, A);

    // The record was stored but the job write that settles the entry was lost
    let mut crashed = job(&store, submitted.id).await;
    dispatcher.process_message(&message, Utc::now()).await.unwrap();
    let stored = store.programs().await;
    assert_eq!(stored.len(), 1);
    crashed.status = JobStatus::Processing;
    crashed.urls[0].status = UrlStatus::Processing;
    store.save_job(&crashed).await.unwrap();

    let outcome = dispatcher.process_message(&message, Utc::now()).await.unwrap();
    assert!(matches!(outcome, MessageOutcome::Processed(_)));
    assert_eq!(mock.extract_call_count(), 2);

    let programs = store.programs().await;
    assert_eq!(programs.len(), 1);
    assert_eq!(programs[0].id, stored[0].id);

    let done = job(&store, submitted.id).await;
    assert_eq!(done.status, JobStatus::Completed);
    assert_eq!(done.processed_urls, 1);
    assert_eq!(done.urls[0].program_id, Some(stored[0].id));
    assert_consistent(&done);
}

#[tokio::test]
async fn test_message_outcomes_for_unusual_input() {
    let (store, _mock, dispatcher) = setup(fast_settings());
    let submitted = submit_urls(&*store, urls(&[A])).await.unwrap();

    let unknown_job = ScrapeMessage::extract(JobId::new(), A);
    assert_eq!(
        dispatcher.process_message(&unknown_job, Utc::now()).await.unwrap(),
        MessageOutcome::Dropped
    );

    let unknown_url = ScrapeMessage::extract(submitted.id, "https://elsewhere.example");
    assert_eq!(
        dispatcher.process_message(&unknown_url, Utc::now()).await.unwrap(),
        MessageOutcome::Dropped
    );

    let mut settings = store.load_settings().await.unwrap();
    settings.enabled = false;
    store.save_settings(&settings).await.unwrap();

    let deferred = dispatcher
        .process_message(&ScrapeMessage::extract(submitted.id, A), Utc::now())
        .await
        .unwrap();
    assert_eq!(deferred, MessageOutcome::Deferred);
    assert!(!deferred.is_ack());
    assert_eq!(job(&store, submitted.id).await, submitted);
}

#[tokio::test]
async fn test_crawl_message_discovers_and_processes_everything() {
    let store = Arc::new(MemoryStore::with_settings(ScraperSettings {
        batch_size: 1,
        ..fast_settings()
    }));
    let root = "https://network.example";
    let mock = MockExtractor::new()
        .with_discovery(root, urls(&[A, B, C]))
        .with_record(A, sample_extracted("Alpha Forum"))
        .with_record(B, sample_extracted("Beta Forum"))
        .with_record(C, sample_extracted("Gamma Forum"));
    let dispatcher = Dispatcher::new(store.clone(), Arc::new(mock));
    let submitted = submit_crawl(&*store, root).await.unwrap();

    let messages = ScrapeMessage::for_job(&submitted);
    assert_eq!(messages, vec![ScrapeMessage::crawl(submitted.id, root)]);

    let outcome = dispatcher.process_message(&messages[0], Utc::now()).await.unwrap();
    assert!(matches!(outcome, MessageOutcome::Processed(t) if t.processed == 3));

    let done = job(&store, submitted.id).await;
    assert_eq!(done.status, JobStatus::Completed);
    assert_eq!(done.total_urls, 3);
    assert_consistent(&done);
}
