//! Memorial resolution pipeline
//!
//! Entry point for presentation layers. A memorial ID goes through two
//! stages:
//!
//! 1. **Record stage**: anonymous search for the archive record indexing the
//!    memorial, one ID at a time ([`record_queue`])
//! 2. **Person stage**: authenticated bulk lookup of the person attached to
//!    that record, in batches ([`person_batcher`])
//!
//! Progress is announced on an [`EventBus`]: `UpdateStarted` when work on an
//! ID begins, `DataChanged` after every persisted change, `UpdateEnded` once
//! no further work on the ID is pending.
//!
//! # Example
//!
//! ```no_run
//! use gravelink_resolver::{MemorialPipeline, ResolverConfig};
//! use gravelink_resolver::store::InMemoryStore;
//! use gravelink_resolver::transport::ReqwestTransport;
//! use std::sync::Arc;
//!
//! # async fn demo() -> Result<(), Box<dyn std::error::Error>> {
//! let config = ResolverConfig::default();
//! let transport = Arc::new(ReqwestTransport::new(config.request_timeout())?);
//! let pipeline = MemorialPipeline::new(config, transport, Arc::new(InMemoryStore::new()))?;
//!
//! let mut events = pipeline.subscribe();
//! let record = pipeline.resolve("12345").await?;
//! println!("{:?}", record.record);
//! # let _ = events.recv().await;
//! # Ok(())
//! # }
//! ```

mod context;
mod person_batcher;
pub mod policy;
mod record_queue;

pub use policy::{MultipleMatchesPolicy, SearchMatchPolicy, SearchOutcome};

use crate::api::{AnonymousApiClient, AuthenticatedApiClient};
use crate::config::ResolverConfig;
use crate::error::{ResolverError, ResolverResult};
use crate::links::{self, LinkState};
use crate::store::MemorialStore;
use crate::transport::HttpTransport;
use context::PipelineContext;
use gravelink_common::{EventBus, MemorialRecord, ResolverEvent};
use person_batcher::PersonBatcher;
use record_queue::RecordQueue;
use std::sync::Arc;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

/// Builder for [`MemorialPipeline`]
pub struct PipelineBuilder {
    config: ResolverConfig,
    transport: Arc<dyn HttpTransport>,
    store: Arc<dyn MemorialStore>,
    policy: Option<Arc<dyn SearchMatchPolicy>>,
    event_bus: Option<EventBus>,
}

impl PipelineBuilder {
    /// Replace the default multiple-matches heuristic
    pub fn search_policy(mut self, policy: Arc<dyn SearchMatchPolicy>) -> Self {
        self.policy = Some(policy);
        self
    }

    /// Publish on an existing bus instead of a private one
    pub fn event_bus(mut self, event_bus: EventBus) -> Self {
        self.event_bus = Some(event_bus);
        self
    }

    /// Validate the config and start both workers
    ///
    /// Must be called from within a Tokio runtime.
    pub fn build(self) -> gravelink_common::Result<MemorialPipeline> {
        self.config.validate()?;

        let policy: Arc<dyn SearchMatchPolicy> = match self.policy {
            Some(policy) => policy,
            None => Arc::new(MultipleMatchesPolicy {
                max_plausible_matches: self.config.max_plausible_matches,
            }),
        };
        let event_bus = self
            .event_bus
            .unwrap_or_else(|| EventBus::new(self.config.event_capacity));

        let anonymous = AnonymousApiClient::new(
            Arc::clone(&self.transport),
            Arc::clone(&self.store),
            &self.config,
        );
        let authenticated = AuthenticatedApiClient::new(
            Arc::clone(&self.transport),
            Arc::clone(&self.store),
            &self.config,
        );

        let ctx = Arc::new(PipelineContext::new(
            self.store,
            anonymous,
            authenticated,
            policy,
            event_bus,
            self.config,
        ));

        let (batcher, batcher_handle) = PersonBatcher::spawn(Arc::clone(&ctx));
        let (record_queue, queue_handle) = RecordQueue::spawn(Arc::clone(&ctx), batcher);

        info!(
            collection = ctx.config.source_collection.collection_id(),
            "Memorial pipeline started"
        );

        Ok(MemorialPipeline {
            ctx,
            record_queue,
            workers: vec![queue_handle, batcher_handle],
        })
    }
}

/// Facade over both resolution stages
pub struct MemorialPipeline {
    ctx: Arc<PipelineContext>,
    record_queue: RecordQueue,
    workers: Vec<JoinHandle<()>>,
}

impl MemorialPipeline {
    pub fn builder(
        config: ResolverConfig,
        transport: Arc<dyn HttpTransport>,
        store: Arc<dyn MemorialStore>,
    ) -> PipelineBuilder {
        PipelineBuilder {
            config,
            transport,
            store,
            policy: None,
            event_bus: None,
        }
    }

    /// Pipeline with the default search policy and a private event bus
    pub fn new(
        config: ResolverConfig,
        transport: Arc<dyn HttpTransport>,
        store: Arc<dyn MemorialStore>,
    ) -> gravelink_common::Result<Self> {
        Self::builder(config, transport, store).build()
    }

    pub fn subscribe(&self) -> broadcast::Receiver<ResolverEvent> {
        self.ctx.event_bus.subscribe()
    }

    pub fn event_bus(&self) -> &EventBus {
        &self.ctx.event_bus
    }

    pub fn config(&self) -> &ResolverConfig {
        &self.ctx.config
    }

    /// Current state of a memorial, scheduling whatever work it still needs
    ///
    /// Never waits on the network. Calling it again for the same ID while work
    /// is outstanding schedules nothing new.
    pub async fn resolve(&self, memorial_id: &str) -> ResolverResult<MemorialRecord> {
        let record = self.ctx.load(memorial_id).await?;
        if record.in_flight {
            return Ok(record);
        }

        let needs_work = record.record.is_unresolved()
            || (record.awaiting_person() && self.ctx.is_authenticated().await);
        if !needs_work {
            return Ok(record);
        }

        if !self.ctx.claim(memorial_id).await {
            return self.snapshot_or(record, memorial_id).await;
        }

        if !self.record_queue.enqueue(memorial_id) {
            self.ctx.release(memorial_id).await;
            return Err(ResolverError::Closed);
        }
        debug!(memorial_id = %memorial_id, "Queued for resolution");

        self.snapshot_or(record, memorial_id).await
    }

    /// Run both stages for one memorial immediately, bypassing the queues
    ///
    /// The record lookup runs even if the record is already settled. The
    /// person lookup runs only if a record was found and a session exists.
    ///
    /// If a queued lookup already owns the memorial, the refresh still runs
    /// but leaves `UpdateStarted`/`UpdateEnded` and `in_flight` to that
    /// lookup.
    pub async fn force_refresh(&self, memorial_id: &str) -> ResolverResult<MemorialRecord> {
        self.ctx.load(memorial_id).await?;
        let owned = self.ctx.claim(memorial_id).await;
        if owned {
            self.ctx.begin(memorial_id);
        }
        info!(memorial_id = %memorial_id, owned, "Refreshing memorial");

        let result = self.refresh_stages(memorial_id).await;
        if let Err(e) = &result {
            self.ctx.report_failure(memorial_id, e);
        }

        if owned {
            self.ctx.end(memorial_id).await;
        }
        match result {
            Ok(_) => self.ctx.load(memorial_id).await,
            Err(e) => Err(e),
        }
    }

    async fn refresh_stages(&self, memorial_id: &str) -> ResolverResult<MemorialRecord> {
        let record = self.ctx.lookup_record(memorial_id).await?;
        if record.record.is_resolved() && self.ctx.is_authenticated().await {
            return self.ctx.lookup_person(memorial_id).await;
        }
        Ok(record)
    }

    /// Snapshot without scheduling anything
    pub async fn memorial(&self, memorial_id: &str) -> Option<MemorialRecord> {
        self.ctx.snapshot(memorial_id).await
    }

    pub async fn link_state(&self, memorial_id: &str) -> LinkState {
        match self.ctx.snapshot(memorial_id).await {
            Some(record) => LinkState::for_record(&record),
            None => LinkState::Searching,
        }
    }

    /// Manual archive search for a memorial
    pub fn search_url(&self, memorial_id: &str) -> String {
        links::search_url(self.ctx.config.source_collection, memorial_id)
    }

    /// Memorials waiting for the record stage
    pub fn queued_records(&self) -> usize {
        self.record_queue.pending_len()
    }

    /// Stop accepting work and wait for both workers to drain
    pub async fn shutdown(self) {
        let MemorialPipeline {
            ctx: _ctx,
            record_queue,
            workers,
        } = self;
        // Closing the record queue closes the batcher behind it
        drop(record_queue);

        for handle in workers {
            if let Err(e) = handle.await {
                warn!(error = %e, "Pipeline worker ended abnormally");
            }
        }
        info!("Memorial pipeline stopped");
    }

    async fn snapshot_or(
        &self,
        fallback: MemorialRecord,
        memorial_id: &str,
    ) -> ResolverResult<MemorialRecord> {
        Ok(self.ctx.snapshot(memorial_id).await.unwrap_or(fallback))
    }
}
