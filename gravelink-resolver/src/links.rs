//! Archive URLs for a memorial
//!
//! Pure string construction, no I/O. The search URL is the fallback a user
//! can open when automated resolution fails or is still pending.

use crate::api::models::RECORD_ARK_PREFIX;
use crate::config::SourceCollection;
use gravelink_common::{IdStatus, MemorialRecord};

pub const SEARCH_RESULTS_URL: &str = "https://www.familysearch.org/en/search/record/results";
pub const PERSON_DETAILS_URL: &str = "https://www.familysearch.org/tree/person/details/";

/// Manual search for a memorial in the archive's index of the source site
///
/// The memorial ID is inserted verbatim.
pub fn search_url(collection: SourceCollection, memorial_id: &str) -> String {
    format!(
        "{}?f.collectionId={}&q.externalRecordId={}&click-first-result=true",
        SEARCH_RESULTS_URL,
        collection.collection_id(),
        memorial_id
    )
}

pub fn record_url(record_id: &str) -> String {
    format!("{}{}", RECORD_ARK_PREFIX, record_id)
}

pub fn person_url(person_id: &str) -> String {
    format!("{}{}", PERSON_DETAILS_URL, person_id)
}

/// What a presentation layer should show for a memorial
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LinkState {
    /// Work outstanding, or not yet attempted
    Searching,
    /// Best available link: person page, else record page
    Found(String),
    /// Archive has no matching record
    NotFound,
}

impl LinkState {
    pub fn for_record(record: &MemorialRecord) -> Self {
        if record.in_flight {
            return LinkState::Searching;
        }
        match (&record.record, &record.person) {
            (IdStatus::Unresolved, _) => LinkState::Searching,
            (IdStatus::Absent, _) => LinkState::NotFound,
            (IdStatus::Resolved(_), IdStatus::Resolved(person_id)) => {
                LinkState::Found(person_url(person_id))
            }
            (IdStatus::Resolved(record_id), _) => LinkState::Found(record_url(record_id)),
        }
    }
}

/// Person page if known, else record page, else the manual search
pub fn best_link(record: &MemorialRecord, collection: SourceCollection) -> String {
    match (record.person_id(), record.record_id()) {
        (Some(person_id), _) => person_url(person_id),
        (None, Some(record_id)) => record_url(record_id),
        (None, None) => search_url(collection, &record.id),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_search_url_findagrave() {
        assert_eq!(
            search_url(SourceCollection::FindAGrave, "12345"),
            "https://www.familysearch.org/en/search/record/results\
             ?f.collectionId=2221801&q.externalRecordId=12345&click-first-result=true"
        );
    }

    #[test]
    fn test_search_url_is_verbatim() {
        let url = search_url(SourceCollection::BillionGraves, "a b&c");
        assert!(url.contains("f.collectionId=2026973"));
        assert!(url.contains("q.externalRecordId=a b&c&"));
    }

    #[test]
    fn test_link_state_progression() {
        let mut record = MemorialRecord::new("42");
        assert_eq!(LinkState::for_record(&record), LinkState::Searching);

        record.set_record(IdStatus::Absent);
        assert_eq!(LinkState::for_record(&record), LinkState::NotFound);

        record.set_record(IdStatus::Resolved("ABCD-123".to_string()));
        assert_eq!(
            LinkState::for_record(&record),
            LinkState::Found(record_url("ABCD-123"))
        );

        record.set_person(IdStatus::Resolved("LXYZ-999".to_string()));
        assert_eq!(
            LinkState::for_record(&record),
            LinkState::Found(
                "https://www.familysearch.org/tree/person/details/LXYZ-999".to_string()
            )
        );

        record.in_flight = true;
        assert_eq!(LinkState::for_record(&record), LinkState::Searching);
    }

    #[test]
    fn test_best_link_falls_back_to_search() {
        let record = MemorialRecord::new("777");
        assert_eq!(
            best_link(&record, SourceCollection::FindAGrave),
            search_url(SourceCollection::FindAGrave, "777")
        );
    }
}
