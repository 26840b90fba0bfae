//! Record resolution queue
//!
//! Single consumer: memorial IDs are looked up strictly one at a time so the
//! anonymous search endpoint never sees parallel traffic from us. Enqueueing
//! an ID that is already pending is a no-op.

use super::context::PipelineContext;
use super::person_batcher::PersonBatcher;
use std::collections::HashSet;
use std::sync::{Arc, Mutex};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

pub(crate) struct RecordQueue {
    tx: mpsc::UnboundedSender<String>,
    pending: Arc<Mutex<HashSet<String>>>,
}

impl RecordQueue {
    pub fn spawn(ctx: Arc<PipelineContext>, batcher: PersonBatcher) -> (Self, JoinHandle<()>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let pending = Arc::new(Mutex::new(HashSet::new()));
        let handle = tokio::spawn(run(ctx, batcher, rx, Arc::clone(&pending)));
        (Self { tx, pending }, handle)
    }

    /// Queue a memorial for the record stage
    ///
    /// Returns `false` if it was already pending or the worker has stopped.
    pub fn enqueue(&self, memorial_id: &str) -> bool {
        {
            let Ok(mut pending) = self.pending.lock() else {
                return false;
            };
            if !pending.insert(memorial_id.to_string()) {
                debug!(memorial_id = %memorial_id, "Already queued");
                return false;
            }
        }

        if self.tx.send(memorial_id.to_string()).is_err() {
            warn!(memorial_id = %memorial_id, "Record queue closed");
            if let Ok(mut pending) = self.pending.lock() {
                pending.remove(memorial_id);
            }
            return false;
        }
        true
    }

    pub fn pending_len(&self) -> usize {
        self.pending.lock().map(|p| p.len()).unwrap_or(0)
    }
}

async fn run(
    ctx: Arc<PipelineContext>,
    batcher: PersonBatcher,
    mut rx: mpsc::UnboundedReceiver<String>,
    pending: Arc<Mutex<HashSet<String>>>,
) {
    info!("Record queue worker started");

    while let Some(memorial_id) = rx.recv().await {
        process(&ctx, &batcher, &memorial_id).await;
        if let Ok(mut pending) = pending.lock() {
            pending.remove(&memorial_id);
        }
    }

    info!("Record queue worker stopped");
}

async fn process(ctx: &PipelineContext, batcher: &PersonBatcher, memorial_id: &str) {
    let record = match ctx.load(memorial_id).await {
        Ok(record) => record,
        Err(e) => {
            ctx.report_failure(memorial_id, &e);
            ctx.release(memorial_id).await;
            return;
        }
    };

    let needs_record = record.record.is_unresolved();
    let authenticated = ctx.is_authenticated().await;
    if !needs_record && !(record.awaiting_person() && authenticated) {
        // Resolved by a refresh while it sat in the queue
        ctx.release(memorial_id).await;
        return;
    }

    ctx.begin(memorial_id);

    let record = if needs_record {
        match ctx.lookup_record(memorial_id).await {
            Ok(record) => record,
            Err(e) => {
                ctx.report_failure(memorial_id, &e);
                ctx.end(memorial_id).await;
                return;
            }
        }
    } else {
        record
    };

    // The session may have appeared during the search
    if record.awaiting_person() && ctx.is_authenticated().await {
        if batcher.enqueue(memorial_id) {
            // The batcher emits the end event once the person stage settles
            return;
        }
        warn!(memorial_id = %memorial_id, "Person batcher unavailable");
    }

    ctx.end(memorial_id).await;
}
