//! Search response classification
//!
//! The search endpoint should return at most one record per external ID.
//! Under load it has been seen returning unrelated records instead, so an
//! implausible match count is read as a rate-limit symptom rather than data.
//! That heuristic is not part of any upstream contract, hence a trait.

/// Outcome of classifying a search response
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SearchOutcome {
    Absent,
    Resolved(String),
    RateLimitSuspected { matches: usize },
}

pub trait SearchMatchPolicy: Send + Sync {
    fn classify(&self, matches: &[String]) -> SearchOutcome;
}

/// Default policy: more than `max_plausible_matches` results is a rate-limit symptom
#[derive(Debug, Clone, Copy)]
pub struct MultipleMatchesPolicy {
    pub max_plausible_matches: usize,
}

impl Default for MultipleMatchesPolicy {
    fn default() -> Self {
        Self {
            max_plausible_matches: 1,
        }
    }
}

impl SearchMatchPolicy for MultipleMatchesPolicy {
    fn classify(&self, matches: &[String]) -> SearchOutcome {
        match matches.first() {
            None => SearchOutcome::Absent,
            Some(_) if matches.len() > self.max_plausible_matches.max(1) => {
                SearchOutcome::RateLimitSuspected {
                    matches: matches.len(),
                }
            }
            Some(first) => SearchOutcome::Resolved(first.clone()),
        }
    }
}
