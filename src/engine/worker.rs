use crate::auth::AuthResolver;
use crate::engine::stats::Counters;
use crate::http::{USER_AGENT, execute_request};
use crate::types::{AuthHeader, DelayPolicy, Endpoint, Job, Sample};
use reqwest::Client;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{Mutex, mpsc};
use tokio_util::sync::CancellationToken;

/// Read-only state every worker in a run shares.
pub struct WorkerContext {
    pub client: Client,
    pub resolver: AuthResolver,
    pub delay: DelayPolicy,
    pub timeout: Duration,
}

pub struct Worker {
    id: u32,
    context: Arc<WorkerContext>,
    jobs: Arc<Mutex<mpsc::Receiver<Job>>>,
    sample_tx: mpsc::Sender<Sample>,
    counters: Arc<Mutex<Counters>>,
    cancel_token: CancellationToken,
}

impl Worker {
    pub fn new(
        id: u32,
        context: Arc<WorkerContext>,
        jobs: Arc<Mutex<mpsc::Receiver<Job>>>,
        sample_tx: mpsc::Sender<Sample>,
        counters: Arc<Mutex<Counters>>,
        cancel_token: CancellationToken,
    ) -> Self {
        Self {
            id,
            context,
            jobs,
            sample_tx,
            counters,
            cancel_token,
        }
    }

    pub async fn run(self) {
        tracing::debug!(worker_id = self.id, "Worker started");

        loop {
            let job = tokio::select! {
                biased;

                _ = self.cancel_token.cancelled() => {
                    tracing::warn!(worker_id = self.id, "Worker stopped due to cancellation");
                    return;
                }
                job = next_job(&self.jobs) => job,
            };

            let Some(endpoint) = job else {
                tracing::debug!(worker_id = self.id, "Worker finished");
                return;
            };

            tracing::debug!(worker_id = self.id, url = %endpoint.url, "Worker processing request");
            self.process(&endpoint).await;
        }
    }

    // Once started, a job runs to completion; only its own timeout bounds it.
    async fn process(&self, endpoint: &Endpoint) {
        let outcome = match self.context.resolver.resolve(endpoint).await {
            Ok(auth) => {
                let headers = merge_headers(endpoint, auth);
                execute_request(
                    &self.context.client,
                    endpoint,
                    &headers,
                    &self.context.delay,
                    self.context.timeout,
                )
                .await
            }
            Err(e) => Err(e),
        };

        match outcome {
            Ok(sample) => {
                self.counters.lock().await.record_success();
                let _ = self.sample_tx.send(sample).await;
            }
            Err(e) => {
                self.counters.lock().await.record_failure(&e);
            }
        }
    }
}

async fn next_job(jobs: &Mutex<mpsc::Receiver<Job>>) -> Option<Job> {
    jobs.lock().await.recv().await
}

/// Static endpoint headers, then the auth header, then the User-Agent.
/// Later entries win on name collisions.
pub fn merge_headers(endpoint: &Endpoint, auth: Option<AuthHeader>) -> Vec<(String, String)> {
    let mut headers: Vec<(String, String)> = endpoint
        .headers
        .iter()
        .map(|(k, v)| (k.clone(), v.clone()))
        .collect();

    if let Some(auth) = auth {
        headers.push((auth.name, auth.value));
    }
    headers.push(("User-Agent".to_string(), USER_AGENT.to_string()));
    headers
}
