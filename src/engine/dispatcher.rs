use crate::types::{Endpoint, Job};
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

/// Offers `repetitions × endpoints` jobs, repetition-major.
pub struct Dispatcher {
    endpoints: Vec<Arc<Endpoint>>,
    repetitions: u32,
    job_tx: mpsc::Sender<Job>,
    cancel_token: CancellationToken,
}

impl Dispatcher {
    pub fn new(
        endpoints: Vec<Arc<Endpoint>>,
        repetitions: u32,
        job_tx: mpsc::Sender<Job>,
        cancel_token: CancellationToken,
    ) -> Self {
        Self {
            endpoints,
            repetitions,
            job_tx,
            cancel_token,
        }
    }

    /// Returns the number of jobs enqueued. The queue closes when this returns.
    pub async fn run(self) -> u64 {
        let mut dispatched = 0u64;

        for _ in 0..self.repetitions {
            for endpoint in &self.endpoints {
                tokio::select! {
                    biased;

                    _ = self.cancel_token.cancelled() => {
                        tracing::warn!(dispatched, "Job queue stopped due to cancellation");
                        return dispatched;
                    }
                    sent = self.job_tx.send(endpoint.clone()) => {
                        if sent.is_err() {
                            tracing::warn!(dispatched, "Job queue closed before dispatch finished");
                            return dispatched;
                        }
                        dispatched += 1;
                        tracing::debug!(method = %endpoint.method, url = %endpoint.url, "Job added to queue");
                    }
                }
            }
        }

        tracing::debug!(dispatched, "Job queue closed");
        dispatched
    }
}
