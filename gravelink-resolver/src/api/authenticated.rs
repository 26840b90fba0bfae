//! Authenticated archive API client
//!
//! Person lookups need the signed-in user's session, which is supplied from
//! outside (the browser login) and never refreshed here. When the archive
//! rejects it, the stored session is cleared so the presentation layer can
//! prompt for a new login.

use super::error::{ApiError, ApiResult};
use super::models::{first_person, record_ark, BulkSourceAttachmentsResponse, SourceAttachment};
use super::throttle::RequestThrottle;
use crate::config::ResolverConfig;
use crate::store::MemorialStore;
use crate::transport::{HttpRequest, HttpResponse, HttpTransport, RequestBody};
use gravelink_common::{Session, SessionKind};
use serde_json::json;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, info, warn};

pub const ATTACHMENTS_PATH: &str = "/service/tree/links/sources/attachments";
pub const BULK_ATTACHMENTS_PATH: &str = "/service/tree/links/sources/attachments/bulk";

pub struct AuthenticatedApiClient {
    transport: Arc<dyn HttpTransport>,
    store: Arc<dyn MemorialStore>,
    throttle: RequestThrottle,
    base_url: String,
}

impl AuthenticatedApiClient {
    pub fn new(
        transport: Arc<dyn HttpTransport>,
        store: Arc<dyn MemorialStore>,
        config: &ResolverConfig,
    ) -> Self {
        Self {
            transport,
            store,
            throttle: RequestThrottle::new(
                config.min_response_latency(),
                config.max_requests_per_second,
            ),
            base_url: config.base_url().to_string(),
        }
    }

    /// True when an authenticated session is stored
    pub async fn has_session(&self) -> ApiResult<bool> {
        Ok(self
            .store
            .get_session(SessionKind::Authenticated)
            .await?
            .is_some())
    }

    /// Attached person for each record, in one round trip
    ///
    /// Records without an attached person are absent from the map.
    pub async fn persons_for_records(
        &self,
        record_ids: &[String],
    ) -> ApiResult<HashMap<String, String>> {
        if record_ids.is_empty() {
            return Ok(HashMap::new());
        }

        let url = format!("{}{}", self.base_url, BULK_ATTACHMENTS_PATH);
        let body = json!({
            "uris": record_ids.iter().map(|id| record_ark(id)).collect::<Vec<_>>(),
        });
        debug!(records = record_ids.len(), "Bulk person lookup");

        let response = self
            .execute(|token| {
                HttpRequest::post(url.clone(), RequestBody::Json(body.clone())).bearer(token)
            })
            .await?;

        let parsed: BulkSourceAttachmentsResponse = if response.body.trim().is_empty() {
            BulkSourceAttachmentsResponse::default()
        } else {
            serde_json::from_str(&response.body)
                .map_err(|e| ApiError::Parse(format!("bulk attachments response: {}", e)))?
        };

        let mut persons = parsed.persons_by_record();
        persons.retain(|record_id, _| record_ids.contains(record_id));

        info!(
            requested = record_ids.len(),
            found = persons.len(),
            "Bulk person lookup complete"
        );
        Ok(persons)
    }

    /// Source attachments of a single record
    pub async fn attachments_for_record(&self, record_id: &str) -> ApiResult<Vec<SourceAttachment>> {
        let url = format!("{}{}", self.base_url, ATTACHMENTS_PATH);
        let uri = record_ark(record_id);

        let response = self
            .execute(|token| {
                HttpRequest::get(url.clone())
                    .query("uri", uri.clone())
                    .bearer(token)
            })
            .await?;

        if response.body.trim().is_empty() {
            return Ok(Vec::new());
        }
        serde_json::from_str(&response.body)
            .map_err(|e| ApiError::Parse(format!("attachments response: {}", e)))
    }

    /// First person attached to a single record
    pub async fn person_for_record(&self, record_id: &str) -> ApiResult<Option<String>> {
        let attachments = self.attachments_for_record(record_id).await?;
        Ok(first_person(&attachments))
    }

    async fn session(&self) -> ApiResult<Session> {
        self.store
            .get_session(SessionKind::Authenticated)
            .await?
            .ok_or(ApiError::AuthenticationRequired)
    }

    /// One call with the stored session
    ///
    /// Timeouts and 429s get one more attempt with the same session.
    /// 401/403 clears the session and is never retried.
    async fn execute<F>(&self, build: F) -> ApiResult<HttpResponse>
    where
        F: Fn(&str) -> HttpRequest,
    {
        let session = self.session().await?;

        let mut result = self.attempt(build(session.token.as_str())).await;
        if let Err(err) = &result {
            if err.is_transient() || err.status() == Some(429) {
                warn!(error = %err, "Authenticated request failed, retrying once");
                result = self.attempt(build(session.token.as_str())).await;
            }
        }

        match result {
            Err(err) if err.is_auth_failure() => {
                warn!(error = %err, "Authenticated session rejected, clearing it");
                self.store
                    .set_session(SessionKind::Authenticated, None)
                    .await?;
                Err(ApiError::AuthenticationRequired)
            }
            other => other,
        }
    }

    async fn attempt(&self, request: HttpRequest) -> ApiResult<HttpResponse> {
        let response = self.throttle.run(self.transport.execute(request)).await?;
        if response.ok() {
            Ok(response)
        } else {
            Err(ApiError::from_response(&response))
        }
    }
}
