//! Memorial resolution data model
//!
//! A memorial moves through two lookup stages: the record stage (external
//! memorial ID → archive record ID) and the person stage (record ID → attached
//! tree person). Each stage is tracked by an [`IdStatus`], which carries the
//! resolved identifier inside the `Resolved` variant so an identifier can never
//! exist without the matching status.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

/// Resolution state of one lookup stage
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(tag = "status", content = "id", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum IdStatus {
    /// Not yet looked up (or the last lookup failed)
    #[default]
    Unresolved,
    /// Looked up and known not to exist
    Absent,
    /// Looked up and found
    Resolved(String),
}

impl IdStatus {
    pub fn is_unresolved(&self) -> bool {
        matches!(self, IdStatus::Unresolved)
    }

    pub fn is_resolved(&self) -> bool {
        matches!(self, IdStatus::Resolved(_))
    }

    /// Resolved identifier, if any
    pub fn id(&self) -> Option<&str> {
        match self {
            IdStatus::Resolved(id) => Some(id.as_str()),
            _ => None,
        }
    }
}

/// Cached resolution state for one external memorial ID
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MemorialRecord {
    /// Source website's memorial identifier
    pub id: String,
    /// Record stage
    #[serde(default)]
    pub record: IdStatus,
    /// Person stage; leaves `Unresolved` only once `record` is `Resolved`
    #[serde(default)]
    pub person: IdStatus,
    /// Work is currently running for this memorial (runtime only, never persisted)
    #[serde(skip)]
    pub in_flight: bool,
}

impl MemorialRecord {
    /// Default record for a memorial seen for the first time
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            record: IdStatus::Unresolved,
            person: IdStatus::Unresolved,
            in_flight: false,
        }
    }

    pub fn record_id(&self) -> Option<&str> {
        self.record.id()
    }

    pub fn person_id(&self) -> Option<&str> {
        self.person.id()
    }

    /// Record found but person stage still open
    pub fn awaiting_person(&self) -> bool {
        self.record.is_resolved() && self.person.is_unresolved()
    }

    /// Apply a record-stage outcome.
    ///
    /// Moving the record away from `Resolved` reopens the person stage, since
    /// a person can only be attached to a resolved record.
    pub fn set_record(&mut self, status: IdStatus) {
        if !status.is_resolved() || self.record != status {
            self.person = IdStatus::Unresolved;
        }
        self.record = status;
    }

    /// Apply a person-stage outcome. Ignored unless the record is resolved.
    pub fn set_person(&mut self, status: IdStatus) -> bool {
        if !self.record.is_resolved() {
            return false;
        }
        self.person = status;
        true
    }
}

/// Trust level of a session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionKind {
    Anonymous,
    Authenticated,
}

/// Bearer credential with its issue time
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Session {
    pub token: String,
    pub issued_at: DateTime<Utc>,
}

impl Session {
    /// Session issued now
    pub fn issue(token: impl Into<String>) -> Self {
        Self {
            token: token.into(),
            issued_at: Utc::now(),
        }
    }

    /// Age of the session at `now` (zero for clock skew into the future)
    pub fn age(&self, now: DateTime<Utc>) -> Duration {
        (now - self.issued_at).max(Duration::zero())
    }

    /// True while the session is younger than `max_age`
    pub fn is_fresh(&self, max_age: std::time::Duration, now: DateTime<Utc>) -> bool {
        match Duration::from_std(max_age) {
            Ok(max_age) => self.age(now) < max_age,
            Err(_) => true,
        }
    }
}
