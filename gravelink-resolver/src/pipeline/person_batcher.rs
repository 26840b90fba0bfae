//! Person resolution batcher
//!
//! Memorials whose record is resolved gather here until enough are pending to
//! fill a bulk attachments call, or until the batch interval elapses. At most
//! one deadline is armed at a time, and a new arrival never pushes it back.

use super::context::PipelineContext;
use crate::api::ApiError;
use gravelink_common::{IdStatus, ResolverEvent};
use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::{sleep_until, Instant};
use tracing::{debug, info, warn};

#[derive(Clone)]
pub(crate) struct PersonBatcher {
    tx: mpsc::UnboundedSender<String>,
}

impl PersonBatcher {
    pub fn spawn(ctx: Arc<PipelineContext>) -> (Self, JoinHandle<()>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let handle = tokio::spawn(run(ctx, rx));
        (Self { tx }, handle)
    }

    pub fn enqueue(&self, memorial_id: &str) -> bool {
        self.tx.send(memorial_id.to_string()).is_ok()
    }
}

/// Insertion-ordered set of memorial IDs awaiting the person stage
#[derive(Debug, Default)]
struct PendingBatch {
    order: VecDeque<String>,
    members: HashSet<String>,
}

impl PendingBatch {
    fn insert(&mut self, memorial_id: String) -> bool {
        if self.members.insert(memorial_id.clone()) {
            self.order.push_back(memorial_id);
            true
        } else {
            false
        }
    }

    fn take(&mut self, max: usize) -> Vec<String> {
        let count = max.min(self.order.len());
        let batch: Vec<String> = self.order.drain(..count).collect();
        for id in &batch {
            self.members.remove(id);
        }
        batch
    }

    fn drain(&mut self) -> Vec<String> {
        self.members.clear();
        self.order.drain(..).collect()
    }

    fn len(&self) -> usize {
        self.order.len()
    }

    fn is_empty(&self) -> bool {
        self.order.is_empty()
    }
}

async fn run(ctx: Arc<PipelineContext>, mut rx: mpsc::UnboundedReceiver<String>) {
    let min = ctx.config.min_person_batch_size.max(1);
    let max = ctx.config.max_person_batch_size.max(min);
    let interval = ctx.config.person_batch_interval();

    let mut pending = PendingBatch::default();
    let mut deadline: Option<Instant> = None;

    info!(min, max, interval_ms = interval.as_millis() as u64, "Person batcher started");

    loop {
        // Evaluated even when the branch is disabled, so it must not panic
        let timer = sleep_until(deadline.unwrap_or_else(Instant::now));

        tokio::select! {
            received = rx.recv() => match received {
                Some(memorial_id) => {
                    if !pending.insert(memorial_id.clone()) {
                        debug!(memorial_id = %memorial_id, "Already batched");
                    }
                    if pending.len() >= min {
                        flush_while(&ctx, &mut pending, min, max).await;
                    }
                }
                None => {
                    // Shutting down: whatever is pending still gets its lookup
                    flush_while(&ctx, &mut pending, 1, max).await;
                    break;
                }
            },
            _ = timer, if deadline.is_some() => {
                deadline = None;
                debug!(pending = pending.len(), "Batch interval elapsed");
                flush_while(&ctx, &mut pending, 1, max).await;
            }
        }

        if pending.is_empty() {
            deadline = None;
        } else if deadline.is_none() {
            deadline = Some(Instant::now() + interval);
        }
    }

    info!("Person batcher stopped");
}

/// Flush batches of up to `max` while at least `threshold` are pending
async fn flush_while(
    ctx: &PipelineContext,
    pending: &mut PendingBatch,
    threshold: usize,
    max: usize,
) {
    while !pending.is_empty() && pending.len() >= threshold {
        let batch = pending.take(max);
        if !flush(ctx, batch, pending).await {
            break;
        }
    }
}

/// One bulk lookup. Returns `false` when the pending set was abandoned.
async fn flush(ctx: &PipelineContext, batch: Vec<String>, pending: &mut PendingBatch) -> bool {
    if !ctx.is_authenticated().await {
        let mut dropped = batch;
        dropped.extend(pending.drain());
        warn!(
            dropped = dropped.len(),
            "No authenticated session, dropping pending person lookups"
        );
        ctx.event_bus.emit_lossy(ResolverEvent::AuthenticationRequired {
            pending: dropped.len(),
        });
        for memorial_id in &dropped {
            ctx.end(memorial_id).await;
        }
        return false;
    }

    // record ID -> memorials waiting on it
    let mut waiting: HashMap<String, Vec<String>> = HashMap::new();
    let mut record_ids = Vec::new();
    for memorial_id in batch {
        let snapshot = ctx.snapshot(&memorial_id).await;
        match snapshot.as_ref().and_then(|r| r.record_id()) {
            Some(record_id) => {
                if !waiting.contains_key(record_id) {
                    record_ids.push(record_id.to_string());
                }
                waiting
                    .entry(record_id.to_string())
                    .or_default()
                    .push(memorial_id);
            }
            None => {
                debug!(memorial_id = %memorial_id, "Record no longer resolved, skipping");
                ctx.end(&memorial_id).await;
            }
        }
    }

    if record_ids.is_empty() {
        return true;
    }

    info!(records = record_ids.len(), "Flushing person batch");

    match ctx.authenticated.persons_for_records(&record_ids).await {
        Ok(persons) => {
            for (record_id, memorial_ids) in waiting {
                let status = match persons.get(&record_id) {
                    Some(person_id) => IdStatus::Resolved(person_id.clone()),
                    None => IdStatus::Absent,
                };
                for memorial_id in memorial_ids {
                    if let Err(e) = ctx.apply_person(&memorial_id, status.clone()).await {
                        ctx.report_failure(&memorial_id, &e);
                    }
                    ctx.end(&memorial_id).await;
                }
            }
        }
        Err(e) => {
            if matches!(e, ApiError::AuthenticationRequired) {
                let count = waiting.values().map(Vec::len).sum();
                ctx.event_bus
                    .emit_lossy(ResolverEvent::AuthenticationRequired { pending: count });
            }
            for memorial_ids in waiting.into_values() {
                for memorial_id in memorial_ids {
                    ctx.report_api_failure(&memorial_id, &e);
                    ctx.end(&memorial_id).await;
                }
            }
        }
    }

    true
}
