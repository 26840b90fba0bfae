//! State shared by the facade and both workers
//!
//! All per-memorial state lives in one map keyed by memorial ID. The lock is
//! never held across network I/O; every mutation is written through to the
//! store and announced on the event bus.

use super::policy::{SearchMatchPolicy, SearchOutcome};
use crate::api::{AnonymousApiClient, ApiError, AuthenticatedApiClient};
use crate::config::ResolverConfig;
use crate::error::{ResolverError, ResolverResult};
use crate::store::MemorialStore;
use gravelink_common::{EventBus, IdStatus, MemorialRecord, ResolverEvent};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{error, info, warn};

pub(crate) struct PipelineContext {
    pub store: Arc<dyn MemorialStore>,
    pub anonymous: AnonymousApiClient,
    pub authenticated: AuthenticatedApiClient,
    pub policy: Arc<dyn SearchMatchPolicy>,
    pub event_bus: EventBus,
    pub config: ResolverConfig,
    memorials: Mutex<HashMap<String, MemorialRecord>>,
}

impl PipelineContext {
    pub fn new(
        store: Arc<dyn MemorialStore>,
        anonymous: AnonymousApiClient,
        authenticated: AuthenticatedApiClient,
        policy: Arc<dyn SearchMatchPolicy>,
        event_bus: EventBus,
        config: ResolverConfig,
    ) -> Self {
        Self {
            store,
            anonymous,
            authenticated,
            policy,
            event_bus,
            config,
            memorials: Mutex::new(HashMap::new()),
        }
    }

    /// Cached record, else stored record, else a fresh default
    pub async fn load(&self, memorial_id: &str) -> ResolverResult<MemorialRecord> {
        if let Some(record) = self.snapshot(memorial_id).await {
            return Ok(record);
        }

        let loaded = self.store.get(memorial_id).await?;
        let mut memorials = self.memorials.lock().await;
        // Another task may have loaded it while the store call was pending
        let record = memorials
            .entry(memorial_id.to_string())
            .or_insert_with(|| {
                tracing::debug!(memorial_id = %memorial_id, "Adding memorial");
                let mut record = loaded.unwrap_or_else(|| MemorialRecord::new(memorial_id));
                record.id = memorial_id.to_string();
                record
            });
        Ok(record.clone())
    }

    pub async fn snapshot(&self, memorial_id: &str) -> Option<MemorialRecord> {
        self.memorials.lock().await.get(memorial_id).cloned()
    }

    /// Mark a memorial as having work outstanding.
    ///
    /// Returns `false` when it already had.
    pub async fn claim(&self, memorial_id: &str) -> bool {
        let mut memorials = self.memorials.lock().await;
        match memorials.get_mut(memorial_id) {
            Some(record) if !record.in_flight => {
                record.in_flight = true;
                true
            }
            Some(_) => false,
            None => {
                let mut record = MemorialRecord::new(memorial_id);
                record.in_flight = true;
                memorials.insert(memorial_id.to_string(), record);
                true
            }
        }
    }

    /// Clear the in-flight mark without announcing anything
    pub async fn release(&self, memorial_id: &str) {
        if let Some(record) = self.memorials.lock().await.get_mut(memorial_id) {
            record.in_flight = false;
        }
    }

    pub fn begin(&self, memorial_id: &str) {
        self.event_bus.emit_lossy(ResolverEvent::UpdateStarted {
            memorial_id: memorial_id.to_string(),
        });
    }

    pub async fn end(&self, memorial_id: &str) {
        self.release(memorial_id).await;
        self.event_bus.emit_lossy(ResolverEvent::UpdateEnded {
            memorial_id: memorial_id.to_string(),
        });
    }

    /// Apply a mutation, persist it, announce it
    async fn commit<F>(&self, memorial_id: &str, mutate: F) -> ResolverResult<MemorialRecord>
    where
        F: FnOnce(&mut MemorialRecord),
    {
        let record = {
            let mut memorials = self.memorials.lock().await;
            let record = memorials
                .entry(memorial_id.to_string())
                .or_insert_with(|| MemorialRecord::new(memorial_id));
            mutate(record);
            record.clone()
        };

        self.store.set(memorial_id, &record).await?;
        self.event_bus.emit_lossy(ResolverEvent::DataChanged {
            memorial_id: memorial_id.to_string(),
            record: record.clone(),
        });
        Ok(record)
    }

    /// Record stage: search, classify, persist
    ///
    /// A rate-limit symptom rotates the anonymous session and leaves the
    /// record untouched.
    pub async fn lookup_record(&self, memorial_id: &str) -> ResolverResult<MemorialRecord> {
        let collection_id = self.config.source_collection.collection_id();
        let matches = self
            .anonymous
            .search_records(memorial_id, collection_id)
            .await?;

        let status = match self.policy.classify(&matches) {
            SearchOutcome::Absent => IdStatus::Absent,
            SearchOutcome::Resolved(record_id) => IdStatus::Resolved(record_id),
            SearchOutcome::RateLimitSuspected { matches } => {
                warn!(
                    memorial_id = %memorial_id,
                    matches,
                    "Search returned multiple records, rotating anonymous session"
                );
                if let Err(e) = self.anonymous.refresh_session().await {
                    warn!(error = %e, "Anonymous session refresh failed");
                }
                return Err(ResolverError::RateLimitSuspected {
                    memorial_id: memorial_id.to_string(),
                    matches,
                });
            }
        };

        info!(memorial_id = %memorial_id, record = ?status, "Record lookup complete");
        self.commit(memorial_id, |record| record.set_record(status)).await
    }

    /// Person stage outcome for one memorial
    ///
    /// Ignored (returns the unchanged record) unless the record is resolved.
    pub async fn apply_person(
        &self,
        memorial_id: &str,
        status: IdStatus,
    ) -> ResolverResult<MemorialRecord> {
        let current = self.load(memorial_id).await?;
        if !current.record.is_resolved() {
            warn!(memorial_id = %memorial_id, "Person outcome for unresolved record ignored");
            return Ok(current);
        }
        self.commit(memorial_id, |record| {
            record.set_person(status);
        })
        .await
    }

    /// Single-record person lookup (explicit refresh path)
    pub async fn lookup_person(&self, memorial_id: &str) -> ResolverResult<MemorialRecord> {
        let record = self.load(memorial_id).await?;
        let Some(record_id) = record.record_id() else {
            return Ok(record);
        };

        let status = match self.authenticated.person_for_record(record_id).await? {
            Some(person_id) => IdStatus::Resolved(person_id),
            None => IdStatus::Absent,
        };
        info!(memorial_id = %memorial_id, person = ?status, "Person lookup complete");
        self.apply_person(memorial_id, status).await
    }

    /// Unreadable session slot counts as logged out
    pub async fn is_authenticated(&self) -> bool {
        match self.authenticated.has_session().await {
            Ok(present) => present,
            Err(e) => {
                warn!(error = %e, "Could not read authenticated session");
                false
            }
        }
    }

    /// Log a per-memorial failure and surface it to subscribers
    pub fn report_failure(&self, memorial_id: &str, err: &ResolverError) {
        error!(memorial_id = %memorial_id, error = %err, "Memorial lookup failed");
        self.event_bus.emit_lossy(ResolverEvent::ResolutionFailed {
            memorial_id: memorial_id.to_string(),
            message: err.to_string(),
        });
        if err.is_authentication_required() {
            self.event_bus
                .emit_lossy(ResolverEvent::AuthenticationRequired { pending: 1 });
        }
    }

    pub fn report_api_failure(&self, memorial_id: &str, err: &ApiError) {
        error!(memorial_id = %memorial_id, error = %err, "Memorial lookup failed");
        self.event_bus.emit_lossy(ResolverEvent::ResolutionFailed {
            memorial_id: memorial_id.to_string(),
            message: err.to_string(),
        });
    }
}
