#![allow(clippy::disallowed_methods)]

mod common;

use std::error::Error;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Duration;

use common::{FlakyStore, coordinator, memory_frontier, surreal_frontier};
use db::{DbError, DocumentStore, QueueCoordinator};
use frontier_core::{QueueEntry, ResultRecord};
use serde_json::json;
use workers::{
    FnHandler, HandlerFuture, HandlerRegistry, Outcome, WorkerConfig, WorkerPool, WorkerTally,
    start_workers,
};

type TestResult = Result<(), Box<dyn Error>>;

fn fast_config(concurrency: usize) -> WorkerConfig {
    WorkerConfig::default()
        .with_concurrency(concurrency)
        .with_poll_interval(Duration::from_millis(1))
        .with_idle_backoff(Duration::from_millis(10))
        .with_handler_timeout(Some(Duration::from_secs(5)))
}

/// Poll the supervisor until `done` holds for its tally.
async fn wait_for(
    pool: &WorkerPool,
    done: impl Fn(&WorkerTally) -> bool,
) -> Result<WorkerTally, Box<dyn Error>> {
    let waited = tokio::time::timeout(Duration::from_secs(10), async {
        loop {
            let tally = pool.tally().await?;
            if done(&tally) {
                return Ok::<_, Box<dyn Error>>(tally);
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await;

    match waited {
        Ok(tally) => tally,
        Err(_) => Err(format!("workers stalled at {:?}", pool.tally().await?).into()),
    }
}

async fn assert_no_live_claims<S: DocumentStore>(frontier: &QueueCoordinator<S>) -> TestResult {
    let stats = frontier.stats().await?;
    assert_eq!(stats.queue.pending, 0, "{stats:?}");
    assert_eq!(stats.queue.busy, 0, "{stats:?}");
    Ok(())
}

async fn pool_drains_the_frontier<S: DocumentStore>(frontier: QueueCoordinator<S>) -> TestResult {
    for i in 0..12 {
        frontier.enqueue(&format!("ok-{i}.com")).await?;
    }
    for i in 0..3 {
        frontier.enqueue(&format!("bad-{i}.com")).await?;
    }
    frontier.enqueue("flaky.com").await?;

    let flaked = Arc::new(AtomicBool::new(false));
    let handler = {
        let flaked = flaked.clone();
        FnHandler::new(move |entry: &QueueEntry| {
            let key = entry.key.clone();
            let flaked = flaked.clone();
            Box::pin(async move {
                if key.starts_with("bad-") {
                    return Ok(Outcome::Rejected);
                }
                if key == "flaky.com" && !flaked.swap(true, Ordering::SeqCst) {
                    return Err("connection reset".to_string());
                }
                Ok(Outcome::Processed(
                    ResultRecord::new(key.clone()).with_field("status", 200),
                ))
            }) as HandlerFuture
        })
    };

    let pool = start_workers(
        frontier.clone(),
        HandlerRegistry::new(handler),
        fast_config(3),
    )
    .await?;

    let tally = wait_for(&pool, |t| t.settled() >= 16).await?;
    assert_eq!(tally.completed, 13);
    assert_eq!(tally.rejected, 3);
    assert_eq!(tally.handler_failures, 1);
    assert_eq!(tally.store_errors, 0);

    let stats = pool.stats().await?;
    assert_eq!(stats.results.processed, 13);
    assert_eq!(stats.queue.rejected, 3);
    assert_no_live_claims(&frontier).await?;

    let record = frontier
        .results()
        .get("flaky.com")
        .await?
        .ok_or("flaky.com has no record")?;
    assert_eq!(record.field("status"), Some(&json!(200)));

    pool.shutdown().await?;
    Ok(())
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn pool_drains_a_memory_frontier() -> TestResult {
    pool_drains_the_frontier(memory_frontier().await?).await
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn pool_drains_a_surreal_frontier() -> TestResult {
    pool_drains_the_frontier(surreal_frontier().await?).await
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn routing_keys_pick_the_handler() -> TestResult {
    let frontier = memory_frontier().await?;
    frontier.enqueue_routed("news.com", "news").await?;
    frontier.enqueue_routed("shop.com", "shop").await?;
    frontier.enqueue("plain.com").await?;

    let news_calls = Arc::new(AtomicUsize::new(0));
    let news = {
        let calls = news_calls.clone();
        FnHandler::new(move |entry: &QueueEntry| {
            calls.fetch_add(1, Ordering::SeqCst);
            let record = ResultRecord::new(entry.key.clone()).with_field("kind", "news");
            Box::pin(async move { Ok(Outcome::Processed(record)) }) as HandlerFuture
        })
    };
    let fallback = FnHandler::new(|entry: &QueueEntry| {
        // Handlers may return a record under another key; the entry key wins.
        let record = ResultRecord::new(format!("https://{}", entry.key));
        Box::pin(async move { Ok(Outcome::Processed(record)) }) as HandlerFuture
    });

    let mut registry = HandlerRegistry::new(fallback);
    registry.route("news", news);

    let pool = start_workers(frontier.clone(), registry, fast_config(2)).await?;
    let tally = wait_for(&pool, |t| t.settled() >= 3).await?;
    pool.shutdown().await?;

    assert_eq!(tally.completed, 3);
    assert_eq!(news_calls.load(Ordering::SeqCst), 1);

    let news = frontier.results().get("news.com").await?.ok_or("news.com missing")?;
    assert_eq!(news.field("kind"), Some(&json!("news")));
    // Unrouted "shop" falls back like the empty routing key.
    assert!(frontier.results().is_processed("shop.com").await?);
    assert!(frontier.results().is_processed("plain.com").await?);
    assert!(!frontier.results().is_processed("https://plain.com").await?);
    assert_no_live_claims(&frontier).await?;
    Ok(())
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn aborted_and_timed_out_entries_are_released() -> TestResult {
    let frontier = memory_frontier().await?;
    frontier.enqueue_routed("slow.com", "slow").await?;
    frontier.enqueue_routed("abort.com", "abort").await?;

    let slow_attempts = Arc::new(AtomicUsize::new(0));
    let abort_attempts = Arc::new(AtomicUsize::new(0));

    let slow = {
        let attempts = slow_attempts.clone();
        FnHandler::new(move |entry: &QueueEntry| {
            let first = attempts.fetch_add(1, Ordering::SeqCst) == 0;
            let key = entry.key.clone();
            Box::pin(async move {
                if first {
                    tokio::time::sleep(Duration::from_secs(30)).await;
                }
                Ok(Outcome::Processed(ResultRecord::new(key)))
            }) as HandlerFuture
        })
    };
    let abort = {
        let attempts = abort_attempts.clone();
        FnHandler::new(move |entry: &QueueEntry| {
            let again = attempts.fetch_add(1, Ordering::SeqCst) > 0;
            let key = entry.key.clone();
            Box::pin(async move {
                if again {
                    Ok(Outcome::Processed(ResultRecord::new(key)))
                } else {
                    Ok(Outcome::Aborted)
                }
            }) as HandlerFuture
        })
    };
    let unused = FnHandler::new(|_entry: &QueueEntry| {
        Box::pin(async { Err("no handler".to_string()) }) as HandlerFuture
    });

    let mut registry = HandlerRegistry::new(unused);
    registry.route("slow", slow);
    registry.route("abort", abort);

    let config = fast_config(2).with_handler_timeout(Some(Duration::from_millis(50)));
    let pool = start_workers(frontier.clone(), registry, config).await?;
    let tally = wait_for(&pool, |t| t.settled() >= 2).await?;
    pool.shutdown().await?;

    assert_eq!(tally.completed, 2);
    assert_eq!(tally.released, 1);
    assert_eq!(tally.handler_failures, 1);
    assert_eq!(slow_attempts.load(Ordering::SeqCst), 2);
    assert_eq!(abort_attempts.load(Ordering::SeqCst), 2);
    assert_no_live_claims(&frontier).await?;
    Ok(())
}

#[tokio::test]
async fn zero_concurrency_is_refused() -> TestResult {
    let frontier = memory_frontier().await?;
    let handler = FnHandler::new(|_entry: &QueueEntry| {
        Box::pin(async { Ok(Outcome::Aborted) }) as HandlerFuture
    });

    let started = start_workers(
        frontier,
        HandlerRegistry::new(handler),
        WorkerConfig::default().with_concurrency(0),
    )
    .await;
    assert!(matches!(started, Err(workers::WorkerError::InvalidConfig(_))));
    Ok(())
}

fn reject_bad_keys() -> HandlerRegistry {
    HandlerRegistry::new(FnHandler::new(|entry: &QueueEntry| {
        let key = entry.key.clone();
        Box::pin(async move {
            if key.starts_with("bad") {
                Ok(Outcome::Rejected)
            } else {
                Ok(Outcome::Processed(ResultRecord::new(key)))
            }
        }) as HandlerFuture
    }))
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn retryable_settle_failures_are_retried() -> TestResult {
    let store = FlakyStore::new();
    let frontier = coordinator(store.clone()).await?;
    frontier.enqueue("ok.com").await?;
    frontier.enqueue("bad.com").await?;

    store.fail_next_delete(DbError::Unavailable("store restarting".into()));
    store.fail_next_update(DbError::Conflict("write conflict".into()));

    let config = fast_config(1).with_settle_retries(3);
    let pool = start_workers(frontier.clone(), reject_bad_keys(), config).await?;
    let tally = wait_for(&pool, |t| t.settled() >= 2).await?;
    pool.shutdown().await?;

    assert_eq!(tally.completed, 1);
    assert_eq!(tally.rejected, 1);
    assert_eq!(tally.store_errors, 0);

    let stats = frontier.stats().await?;
    assert_eq!(stats.results.processed, 1);
    assert_eq!(stats.queue.rejected, 1);
    assert_no_live_claims(&frontier).await?;
    Ok(())
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn failed_settle_releases_the_claim() -> TestResult {
    let store = FlakyStore::new();
    let frontier = coordinator(store.clone()).await?;
    frontier.enqueue("ok.com").await?;

    // Not retryable: the result is written, the removal fails once.
    store.fail_next_delete(DbError::Query("disk full".into()));

    let pool = start_workers(frontier.clone(), reject_bad_keys(), fast_config(1)).await?;
    let tally = wait_for(&pool, |t| t.completed >= 1).await?;
    pool.shutdown().await?;

    assert_eq!(tally.store_errors, 1);
    assert_eq!(tally.completed, 1);

    let stats = frontier.stats().await?;
    assert_eq!(stats.results.processed, 1);
    assert_eq!(stats.queue.total(), 0);
    Ok(())
}
