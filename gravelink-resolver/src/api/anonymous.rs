//! Anonymous archive API client
//!
//! Record search works without a signed-in user, but still needs a bearer
//! token from an unauthenticated token exchange. The client owns that
//! token's lifecycle:
//! - fetched on first use
//! - replaced once older than the freshness window, or after a fixed
//!   number of requests
//! - replaced and the call retried once on 401/403/429 or a timeout

use super::error::{ApiError, ApiResult};
use super::models::{SearchRecordsResponse, TokenResponse};
use super::throttle::RequestThrottle;
use crate::config::ResolverConfig;
use crate::store::MemorialStore;
use crate::transport::{HttpRequest, HttpResponse, HttpTransport, RequestBody};
use chrono::Utc;
use gravelink_common::{Session, SessionKind};
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

pub const TOKEN_PATH: &str = "/service/ident/cis/cis-web/oauth2/v3/token";
pub const SEARCH_PATH: &str = "/service/search/hr/v2/personas";

const RETRY_STATUSES: [u16; 3] = [401, 403, 429];

pub struct AnonymousApiClient {
    transport: Arc<dyn HttpTransport>,
    store: Arc<dyn MemorialStore>,
    throttle: RequestThrottle,
    base_url: String,
    client_id: String,
    ip_address: String,
    session_max_age: Duration,
    refresh_after_requests: u32,
    requests_since_refresh: AtomicU32,
    /// Serializes session checks so concurrent callers share one refresh
    session_lock: Mutex<()>,
}

impl AnonymousApiClient {
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
            client_id: config.client_id.clone(),
            ip_address: config.ip_address.clone(),
            session_max_age: config.anonymous_session_max_age(),
            refresh_after_requests: config.anonymous_refresh_after_requests,
            requests_since_refresh: AtomicU32::new(0),
            session_lock: Mutex::new(()),
        }
    }

    /// Replace the stored anonymous session unconditionally
    pub async fn refresh_session(&self) -> ApiResult<Session> {
        let _guard = self.session_lock.lock().await;
        self.fetch_session().await
    }

    /// Search for records matching an external ID within a collection
    ///
    /// Returns matched record IDs in response order.
    pub async fn search_records(
        &self,
        external_id: &str,
        collection_id: &str,
    ) -> ApiResult<Vec<String>> {
        let url = format!("{}{}", self.base_url, SEARCH_PATH);
        debug!(external_id = %external_id, collection_id = %collection_id, "Searching records");

        let response = self
            .execute_with_retry(|token| {
                HttpRequest::get(url.clone())
                    .query("q.externalRecordId", external_id)
                    .query("f.collectionId", collection_id)
                    .bearer(token)
            })
            .await?;

        if response.body.trim().is_empty() {
            return Ok(Vec::new());
        }
        let parsed: SearchRecordsResponse = serde_json::from_str(&response.body)
            .map_err(|e| ApiError::Parse(format!("search response: {}", e)))?;
        Ok(parsed.record_ids())
    }

    /// Current session, fetching a new one when missing, stale or worn out
    async fn current_session(&self) -> ApiResult<Session> {
        let _guard = self.session_lock.lock().await;

        let used = self.requests_since_refresh.load(Ordering::SeqCst);
        let worn_out = self.refresh_after_requests > 0 && used >= self.refresh_after_requests;

        match self.store.get_session(SessionKind::Anonymous).await? {
            Some(session) if !worn_out && session.is_fresh(self.session_max_age, Utc::now()) => {
                Ok(session)
            }
            Some(_) => {
                debug!(requests = used, "Anonymous session stale, replacing it");
                self.fetch_session().await
            }
            None => self.fetch_session().await,
        }
    }

    /// Token exchange. Caller holds `session_lock`.
    async fn fetch_session(&self) -> ApiResult<Session> {
        info!("Getting a new anonymous session");

        let request = HttpRequest::post(
            format!("{}{}", self.base_url, TOKEN_PATH),
            RequestBody::Form(vec![
                (
                    "grant_type".to_string(),
                    "unauthenticated_session".to_string(),
                ),
                ("ip_address".to_string(), self.ip_address.clone()),
                ("client_id".to_string(), self.client_id.clone()),
            ]),
        );

        let response = self.transport.execute(request).await?;
        if !response.ok() {
            return Err(ApiError::from_response(&response));
        }

        let token: TokenResponse = serde_json::from_str(&response.body)
            .map_err(|e| ApiError::Parse(format!("token response: {}", e)))?;
        let session = Session::issue(token.access_token);

        self.store
            .set_session(SessionKind::Anonymous, Some(session.clone()))
            .await?;
        self.requests_since_refresh.store(0, Ordering::SeqCst);

        Ok(session)
    }

    async fn execute_with_retry<F>(&self, build: F) -> ApiResult<HttpResponse>
    where
        F: Fn(&str) -> HttpRequest,
    {
        let session = self.current_session().await?;

        match self.attempt(build(session.token.as_str())).await {
            Ok(response) => return Ok(response),
            Err(err) if Self::is_retryable(&err) => {
                warn!(error = %err, "Anonymous request failed, refreshing session and retrying once");
            }
            Err(err) => return Err(err),
        }

        let session = self.refresh_session().await?;
        self.attempt(build(session.token.as_str())).await
    }

    async fn attempt(&self, request: HttpRequest) -> ApiResult<HttpResponse> {
        self.requests_since_refresh.fetch_add(1, Ordering::SeqCst);

        let response = self.throttle.run(self.transport.execute(request)).await?;
        if response.ok() {
            Ok(response)
        } else {
            Err(ApiError::from_response(&response))
        }
    }

    fn is_retryable(err: &ApiError) -> bool {
        err.is_transient()
            || err
                .status()
                .map(|status| RETRY_STATUSES.contains(&status))
                .unwrap_or(false)
    }
}
