//! Archive API payloads
//!
//! Only the fields the pipeline reads are modelled. Everything optional in the
//! upstream documents is an explicit `Option` or defaults to empty.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Prefix of a record's persistent ark URI
pub const RECORD_ARK_PREFIX: &str = "https://www.familysearch.org/ark:/61903/1:1:";

/// Identity service token exchange response
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct TokenResponse {
    pub access_token: String,
}

/// Record search response
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct SearchRecordsResponse {
    #[serde(default)]
    pub entries: Vec<SearchRecordsEntry>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct SearchRecordsEntry {
    pub id: String,
}

impl SearchRecordsResponse {
    /// Matched record IDs in response order
    pub fn record_ids(&self) -> Vec<String> {
        self.entries.iter().map(|e| e.id.clone()).collect()
    }
}

/// A source attachment on a record
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct SourceAttachment {
    #[serde(default)]
    pub persons: Vec<AttachedPerson>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct AttachedPerson {
    #[serde(rename = "entityId")]
    pub entity_id: String,
}

/// First attached person across a record's attachments
pub fn first_person(attachments: &[SourceAttachment]) -> Option<String> {
    attachments
        .iter()
        .flat_map(|a| a.persons.iter())
        .map(|p| p.entity_id.clone())
        .next()
}

/// Bulk attachment lookup response
///
/// Keys are record ark URIs (some deployments return bare record IDs).
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct BulkSourceAttachmentsResponse {
    #[serde(rename = "attachedSourcesMap", default)]
    pub attached_sources_map: HashMap<String, Vec<SourceAttachment>>,
}

impl BulkSourceAttachmentsResponse {
    /// Record ID → first attached person ID; records without a person are omitted
    pub fn persons_by_record(&self) -> HashMap<String, String> {
        self.attached_sources_map
            .iter()
            .filter_map(|(key, attachments)| {
                first_person(attachments).map(|person| (record_id_from_key(key), person))
            })
            .collect()
    }
}

/// Ark URI for a record ID
pub fn record_ark(record_id: &str) -> String {
    format!("{}{}", RECORD_ARK_PREFIX, record_id)
}

fn record_id_from_key(key: &str) -> String {
    key.strip_prefix(RECORD_ARK_PREFIX).unwrap_or(key).to_string()
}
