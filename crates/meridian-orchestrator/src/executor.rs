//! Bounded concurrent agent dispatch
//!
//! Every dispatchable agent receives one execution request per cycle.
//! Concurrency is capped by a semaphore. The deadline is shared by the whole
//! batch, so an agent queued behind busy workers gets only what is left of it.
//! An execution still running at the deadline is cancelled and recorded as a
//! failed, timed-out outcome.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use meridian_common::{AgentKind, AgentOutcome, ExecutionRequest};
use tokio::sync::{mpsc, Semaphore};
use tokio::time::Instant;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::strategy::StrategyAgent;

/// One agent's work for the current cycle
pub struct Dispatch {
    pub agent_id: Uuid,
    pub kind: AgentKind,
    pub dna_id: Uuid,
    pub instance: Arc<dyn StrategyAgent>,
    pub request: ExecutionRequest,
}

/// Run all jobs with at most `max_workers` in flight, all bounded by `timeout` from now
///
/// Always returns exactly one outcome per job, in job order.
pub async fn dispatch(jobs: Vec<Dispatch>, max_workers: usize, timeout: Duration) -> Vec<AgentOutcome> {
    if jobs.is_empty() {
        return Vec::new();
    }

    let deadline = Instant::now() + timeout;
    let permits = max_workers.min(jobs.len()).max(1);
    let semaphore = Arc::new(Semaphore::new(permits));
    let (tx, mut rx) = mpsc::channel::<(usize, AgentOutcome)>(jobs.len());

    let expected: Vec<(Uuid, AgentKind, Uuid)> = jobs.iter().map(|j| (j.agent_id, j.kind, j.dna_id)).collect();

    for (slot, job) in jobs.into_iter().enumerate() {
        let semaphore = semaphore.clone();
        let tx = tx.clone();
        tokio::spawn(async move {
            let Ok(_permit) = semaphore.acquire_owned().await else {
                return;
            };
            let started = Instant::now();
            let outcome = match tokio::time::timeout_at(deadline, job.instance.execute(job.request)).await {
                Ok(Ok(report)) => AgentOutcome {
                    agent_id: job.agent_id,
                    kind: job.kind,
                    dna_id: job.dna_id,
                    report,
                    latency: started.elapsed(),
                    timed_out: false,
                },
                Ok(Err(e)) => {
                    warn!(agent_id = %job.agent_id, kind = %job.kind, error = %e, "Agent execution failed");
                    AgentOutcome::failed(job.agent_id, job.kind, job.dna_id, started.elapsed(), false)
                }
                Err(_) => {
                    warn!(agent_id = %job.agent_id, kind = %job.kind, "Agent missed cycle deadline");
                    AgentOutcome::failed(job.agent_id, job.kind, job.dna_id, started.elapsed(), true)
                }
            };
            let _ = tx.send((slot, outcome)).await;
        });
    }
    drop(tx);

    let mut received: HashMap<usize, AgentOutcome> = HashMap::with_capacity(expected.len());
    while let Some((slot, outcome)) = rx.recv().await {
        received.insert(slot, outcome);
    }

    expected
        .into_iter()
        .enumerate()
        .map(|(slot, (agent_id, kind, dna_id))| {
            received.remove(&slot).unwrap_or_else(|| {
                // task panicked before reporting
                warn!(agent_id = %agent_id, "Agent task ended without a report");
                AgentOutcome::failed(agent_id, kind, dna_id, Duration::ZERO, false)
            })
        })
        .inspect(|o| debug!(agent_id = %o.agent_id, success = o.report.is_success(), "Agent outcome"))
        .collect()
}
