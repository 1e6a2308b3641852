use crate::engine::stats::LatencyStats;
use crate::types::Sample;
use tokio::sync::mpsc;

pub struct Aggregator {
    stats: LatencyStats,
    sample_rx: mpsc::Receiver<Sample>,
}

impl Aggregator {
    pub fn new(sample_rx: mpsc::Receiver<Sample>) -> Self {
        Self {
            stats: LatencyStats::new(),
            sample_rx,
        }
    }

    /// Drain samples until every sender is gone.
    pub async fn run(mut self) -> LatencyStats {
        while let Some(sample) = self.sample_rx.recv().await {
            self.stats.record(&sample);
        }
        self.stats
    }
}
