//! Concurrent hop count batches

use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::{mpsc, Semaphore};
use tracing::{info, warn};

use crate::hops::{CancelToken, HopCounter};
use crate::records::{TestInputRecord, TestOutputRecord};
use crate::resolver::LinkSource;
use crate::FirstLinkOptions;

/// Runs one hop count per test record on a bounded pool of blocking workers.
///
/// Results are collected in completion order and put back into input order
/// by the position of their record, so the output always has one record per
/// input record, duplicates included.
pub struct BatchRunner {
    links: Arc<dyn LinkSource>,
    hop_limit: u8,
    concurrency: usize,
    deadline: Option<Duration>,
    cancel: CancelToken,
}

impl BatchRunner {
    pub fn new(links: Arc<dyn LinkSource>, options: &FirstLinkOptions) -> Self {
        Self {
            links,
            hop_limit: options.hop_limit,
            concurrency: options.concurrency.max(1),
            deadline: options.batch_deadline,
            cancel: CancelToken::new(),
        }
    }

    /// Share a cancellation token with the caller, e.g. to stop on Ctrl-C
    pub fn with_cancel(mut self, cancel: CancelToken) -> Self {
        self.cancel = cancel;
        self
    }

    pub fn cancel_token(&self) -> CancelToken {
        self.cancel.clone()
    }

    /// Count the hops of every record and judge them against their expectation
    pub async fn run(&self, input: &[TestInputRecord]) -> Vec<TestOutputRecord> {
        let started = Instant::now();
        // deadlines only cancel this run, the runner's token still reaches it
        let cancel = self.cancel.child();
        let (sender, mut receiver) = mpsc::channel::<(usize, TestOutputRecord)>(input.len().max(1));

        let aggregator = tokio::spawn(async move {
            let mut pool = Vec::new();
            while let Some(done) = receiver.recv().await {
                pool.push(done);
            }
            pool
        });

        let watchdog = self.deadline.map(|deadline| {
            let cancel = cancel.clone();
            tokio::spawn(async move {
                tokio::time::sleep(deadline).await;
                warn!(?deadline, "batch deadline elapsed, cancelling running hop counts");
                cancel.cancel();
            })
        });

        let permits = Arc::new(Semaphore::new(self.concurrency));
        for (index, record) in input.iter().cloned().enumerate() {
            let sender = sender.clone();
            let permits = Arc::clone(&permits);
            let links = Arc::clone(&self.links);
            let cancel = cancel.clone();
            let limit = self.hop_limit;
            tokio::spawn(async move {
                let Ok(_permit) = permits.acquire_owned().await else {
                    return;
                };
                let output = count_record(links, limit, cancel, record).await;
                // the aggregator only stops once every sender is gone
                let _ = sender.send((index, output)).await;
            });
        }
        // the stream closes when the last task drops its sender
        drop(sender);

        let pool = match aggregator.await {
            Ok(pool) => pool,
            Err(e) => {
                warn!(error = %e, "result aggregation failed");
                Vec::new()
            }
        };
        if let Some(watchdog) = watchdog {
            watchdog.abort();
        }

        let output = reassemble(input, pool);
        info!(
            records = output.len(),
            successes = output.iter().filter(|record| record.is_success()).count(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "batch finished"
        );
        output
    }
}

async fn count_record(
    links: Arc<dyn LinkSource>,
    limit: u8,
    cancel: CancelToken,
    record: TestInputRecord,
) -> TestOutputRecord {
    let job = record.clone();
    let counted = tokio::task::spawn_blocking(move || {
        HopCounter::new(links, limit)
            .with_cancel(cancel)
            .count(&job.lang, &job.source, &job.target)
    })
    .await;

    match counted {
        Ok(Err(e)) => {
            warn!(record = %record, error = %e, "hop count failed");
            TestOutputRecord::from_hop_count(record, Err(e))
        }
        Ok(hops) => TestOutputRecord::from_hop_count(record, hops),
        Err(e) => TestOutputRecord::errored(record, format!("hop count task failed: {}", e)),
    }
}

/// Put completed results back into input order by their record position
fn reassemble(
    input: &[TestInputRecord],
    pool: Vec<(usize, TestOutputRecord)>,
) -> Vec<TestOutputRecord> {
    let mut slots: Vec<Option<TestOutputRecord>> = vec![None; input.len()];
    for (index, record) in pool {
        if let Some(slot) = slots.get_mut(index) {
            *slot = Some(record);
        }
    }
    input
        .iter()
        .zip(slots)
        .map(|(record, slot)| {
            slot.unwrap_or_else(|| TestOutputRecord::errored(record.clone(), "no result reported"))
        })
        .collect()
}
