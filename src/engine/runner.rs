use crate::auth::AuthResolver;
use crate::engine::aggregator::Aggregator;
use crate::engine::dispatcher::Dispatcher;
use crate::engine::stats::Counters;
use crate::engine::worker::{Worker, WorkerContext};
use crate::error::ProbeError;
use crate::http::create_client;
use crate::types::{Job, ProbeConfig, RunSummary, Sample};
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::{Mutex, mpsc};
use tokio::task::{JoinError, JoinSet};
use tokio_util::sync::CancellationToken;
use tracing::instrument::WithSubscriber;

const MAX_QUEUE_CAPACITY: usize = 1 << 20;

/// Execute one probe run and block until it completes or is cancelled.
///
/// Events go to the subscriber current when this future is polled; spawned
/// tasks inherit it.
pub async fn run(
    cancel_token: CancellationToken,
    config: ProbeConfig,
) -> Result<RunSummary, ProbeError> {
    let client = create_client(config.concurrency, config.connect_timeout)
        .map_err(ProbeError::Client)?;

    let mut resolver = AuthResolver::new(client.clone(), config.auth.clone(), config.timeout);
    if let Some(ttl) = config.token_cache_ttl {
        resolver = resolver.with_token_cache(ttl);
    }
    resolver.preflight(&config.endpoints)?;

    let total_jobs = config.total_jobs();
    let job_capacity = config
        .queue_capacity
        .unwrap_or(total_jobs)
        .clamp(1, MAX_QUEUE_CAPACITY);
    let sample_capacity = total_jobs.clamp(1, MAX_QUEUE_CAPACITY);

    let (job_tx, job_rx) = mpsc::channel::<Job>(job_capacity);
    let (sample_tx, sample_rx) = mpsc::channel::<Sample>(sample_capacity);
    let jobs = Arc::new(Mutex::new(job_rx));
    let counters = Arc::new(Mutex::new(Counters::default()));

    tracing::info!(
        concurrency = config.concurrency,
        total_requests = config.total_requests,
        endpoints = config.endpoints.len(),
        total_jobs,
        "Starting probe"
    );
    let start = Instant::now();

    let aggregator_handle = tokio::spawn(Aggregator::new(sample_rx).run().with_current_subscriber());

    let context = Arc::new(WorkerContext {
        client,
        resolver,
        delay: config.delay,
        timeout: config.timeout,
    });

    let mut workers = JoinSet::new();
    for id in 0..config.concurrency {
        let worker = Worker::new(
            id,
            context.clone(),
            jobs.clone(),
            sample_tx.clone(),
            counters.clone(),
            cancel_token.clone(),
        );
        workers.spawn(worker.run().with_current_subscriber());
    }
    drop(jobs);

    let dispatcher = Dispatcher::new(
        config.endpoints.clone(),
        config.total_requests,
        job_tx,
        cancel_token.clone(),
    );
    let dispatcher_handle = tokio::spawn(dispatcher.run().with_current_subscriber());

    // Close the result queue once, after every worker has exited.
    let finalizer = tokio::spawn(
        async move {
            while let Some(result) = workers.join_next().await {
                if let Err(e) = result {
                    tracing::error!(error = %e, "Worker task failed");
                }
            }
            drop(sample_tx);
            tracing::debug!("All workers finished, closing result channel");
        }
        .with_current_subscriber(),
    );

    let latency = joined(aggregator_handle.await, "aggregator");
    joined(finalizer.await, "finalizer");
    let dispatched = joined(dispatcher_handle.await, "dispatcher").unwrap_or_default();
    let elapsed = start.elapsed();

    let counters = counters.lock().await;
    let latency = latency.as_ref();
    let summary = RunSummary {
        dispatched,
        succeeded: counters.succeeded,
        failed: counters.failed,
        samples: latency.map(|l| l.count()).unwrap_or(0),
        latency: latency.and_then(|l| l.summary()),
        elapsed,
        cancelled: cancel_token.is_cancelled(),
        errors: counters.errors.clone(),
        status_codes: counters.status_codes.clone(),
    };

    log_summary(&summary);
    Ok(summary)
}

fn joined<T>(result: Result<T, JoinError>, task: &'static str) -> Option<T> {
    result
        .inspect_err(|e| tracing::error!(task, error = %e, "Task failed"))
        .ok()
}

fn log_summary(summary: &RunSummary) {
    if summary.cancelled {
        tracing::warn!(
            dispatched = summary.dispatched,
            processed = summary.processed(),
            "Probe run was cancelled"
        );
    }

    match summary.average() {
        Some(average) => tracing::info!(
            total_requests = summary.processed(),
            successful_requests = summary.succeeded,
            failed_requests = summary.failed,
            duration = ?summary.elapsed,
            avg_response_time = ?average,
            "Test completed"
        ),
        None => tracing::warn!(
            failed_requests = summary.failed,
            duration = ?summary.elapsed,
            "No requests were successful"
        ),
    }
}
