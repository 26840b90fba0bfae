//! Scripted archive transport
//!
//! Stands in for the archive's HTTP API. Each endpoint answers from a queue
//! of scripted responses first, then from a default derived from the fixture
//! data (search matches per memorial, person per record).

use async_trait::async_trait;
use gravelink_resolver::api::anonymous::{SEARCH_PATH, TOKEN_PATH};
use gravelink_resolver::api::authenticated::{ATTACHMENTS_PATH, BULK_ATTACHMENTS_PATH};
use gravelink_resolver::api::models::record_ark;
use gravelink_resolver::transport::{
    HttpRequest, HttpResponse, HttpTransport, RequestBody, TransportError,
};
use serde_json::json;
use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Endpoint {
    Token,
    Search,
    Bulk,
    Attachments,
    Other,
}

impl Endpoint {
    pub fn of(url: &str) -> Self {
        if url.ends_with(TOKEN_PATH) {
            Endpoint::Token
        } else if url.ends_with(SEARCH_PATH) {
            Endpoint::Search
        } else if url.ends_with(BULK_ATTACHMENTS_PATH) {
            Endpoint::Bulk
        } else if url.ends_with(ATTACHMENTS_PATH) {
            Endpoint::Attachments
        } else {
            Endpoint::Other
        }
    }
}

#[derive(Default)]
pub struct MockTransport {
    scripted: Mutex<HashMap<Endpoint, VecDeque<HttpResponse>>>,
    matches: Mutex<HashMap<String, Vec<String>>>,
    persons: Mutex<HashMap<String, String>>,
    requests: Mutex<Vec<HttpRequest>>,
    tokens_issued: AtomicUsize,
}

impl MockTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Search for `memorial_id` returns these record IDs
    pub fn with_matches(self, memorial_id: &str, record_ids: &[&str]) -> Self {
        self.matches.lock().unwrap().insert(
            memorial_id.to_string(),
            record_ids.iter().map(|id| id.to_string()).collect(),
        );
        self
    }

    /// Record `record_id` has `person_id` attached
    pub fn with_person(self, record_id: &str, person_id: &str) -> Self {
        self.persons
            .lock()
            .unwrap()
            .insert(record_id.to_string(), person_id.to_string());
        self
    }

    /// Next call to `endpoint` gets this response instead of the default
    pub fn push_response(&self, endpoint: Endpoint, response: HttpResponse) {
        self.scripted
            .lock()
            .unwrap()
            .entry(endpoint)
            .or_default()
            .push_back(response);
    }

    pub fn requests(&self) -> Vec<HttpRequest> {
        self.requests.lock().unwrap().clone()
    }

    pub fn requests_to(&self, endpoint: Endpoint) -> Vec<HttpRequest> {
        self.requests()
            .into_iter()
            .filter(|r| Endpoint::of(&r.url) == endpoint)
            .collect()
    }

    pub fn count(&self, endpoint: Endpoint) -> usize {
        self.requests_to(endpoint).len()
    }

    /// Ark URIs sent in each bulk call
    pub fn bulk_batches(&self) -> Vec<Vec<String>> {
        self.requests_to(Endpoint::Bulk)
            .into_iter()
            .map(|r| match r.body {
                Some(RequestBody::Json(body)) => body["uris"]
                    .as_array()
                    .map(|uris| {
                        uris.iter()
                            .filter_map(|u| u.as_str().map(str::to_string))
                            .collect()
                    })
                    .unwrap_or_default(),
                _ => Vec::new(),
            })
            .collect()
    }

    fn default_response(&self, endpoint: Endpoint, request: &HttpRequest) -> HttpResponse {
        match endpoint {
            Endpoint::Token => {
                let n = self.tokens_issued.fetch_add(1, Ordering::SeqCst) + 1;
                HttpResponse::new(
                    200,
                    json!({"access_token": format!("anon-{}", n), "token_type": "Bearer"})
                        .to_string(),
                )
            }
            Endpoint::Search => {
                let memorial_id = request.query_value("q.externalRecordId").unwrap_or("");
                let matches = self.matches.lock().unwrap();
                let entries: Vec<_> = matches
                    .get(memorial_id)
                    .map(|ids| ids.iter().map(|id| json!({"id": id})).collect())
                    .unwrap_or_default();
                HttpResponse::new(200, json!({ "entries": entries }).to_string())
            }
            Endpoint::Bulk => {
                let uris: Vec<String> = match &request.body {
                    Some(RequestBody::Json(body)) => body["uris"]
                        .as_array()
                        .map(|uris| {
                            uris.iter()
                                .filter_map(|u| u.as_str().map(str::to_string))
                                .collect()
                        })
                        .unwrap_or_default(),
                    _ => Vec::new(),
                };
                let persons = self.persons.lock().unwrap();
                let mut map = serde_json::Map::new();
                for (record_id, person_id) in persons.iter() {
                    let ark = record_ark(record_id);
                    if uris.contains(&ark) {
                        map.insert(ark, json!([{"persons": [{"entityId": person_id}]}]));
                    }
                }
                HttpResponse::new(200, json!({ "attachedSourcesMap": map }).to_string())
            }
            Endpoint::Attachments => {
                let uri = request.query_value("uri").unwrap_or("");
                let persons = self.persons.lock().unwrap();
                let attachments: Vec<_> = persons
                    .iter()
                    .filter(|(record_id, _)| record_ark(record_id) == uri)
                    .map(|(_, person_id)| json!({"persons": [{"entityId": person_id}]}))
                    .collect();
                HttpResponse::new(200, json!(attachments).to_string())
            }
            Endpoint::Other => HttpResponse::new(404, "not found"),
        }
    }
}

#[async_trait]
impl HttpTransport for MockTransport {
    async fn execute(&self, request: HttpRequest) -> Result<HttpResponse, TransportError> {
        let endpoint = Endpoint::of(&request.url);
        self.requests.lock().unwrap().push(request.clone());

        let scripted = self
            .scripted
            .lock()
            .unwrap()
            .get_mut(&endpoint)
            .and_then(|queue| queue.pop_front());

        Ok(scripted.unwrap_or_else(|| self.default_response(endpoint, &request)))
    }
}
