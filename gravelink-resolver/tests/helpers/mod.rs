//! Test Helper Utilities
//!
//! Shared utilities for testing gravelink-resolver

#![allow(dead_code)]

pub mod log_capture;
pub mod mock_transport;

pub use log_capture::{capture_logs, LogCapture};
pub use mock_transport::{Endpoint, MockTransport};

use gravelink_common::ResolverEvent;
use gravelink_resolver::ResolverConfig;
use std::time::Duration;
use tokio::sync::broadcast;

/// Config with pacing disabled so tests run at full speed
pub fn fast_config() -> ResolverConfig {
    ResolverConfig {
        min_response_latency_ms: 0,
        max_requests_per_second: 1_000,
        ..ResolverConfig::default()
    }
}

/// Drain events until `UpdateEnded` has been seen for every ID in `ids`
///
/// Returns every event received, in order.
pub async fn collect_until_ended(
    rx: &mut broadcast::Receiver<ResolverEvent>,
    ids: &[&str],
    timeout: Duration,
) -> Vec<ResolverEvent> {
    let mut events = Vec::new();
    let mut remaining: Vec<String> = ids.iter().map(|id| id.to_string()).collect();

    let result = tokio::time::timeout(timeout, async {
        while !remaining.is_empty() {
            match rx.recv().await {
                Ok(event) => {
                    if let ResolverEvent::UpdateEnded { memorial_id } = &event {
                        remaining.retain(|id| id != memorial_id);
                    }
                    events.push(event);
                }
                Err(broadcast::error::RecvError::Lagged(_)) => continue,
                Err(broadcast::error::RecvError::Closed) => break,
            }
        }
    })
    .await;

    assert!(
        result.is_ok(),
        "Timed out waiting for UpdateEnded; still pending: {:?}",
        remaining
    );
    events
}

pub fn count_events(events: &[ResolverEvent], memorial_id: &str, kind: &str) -> usize {
    events
        .iter()
        .filter(|e| e.memorial_id() == Some(memorial_id))
        .filter(|e| event_kind(e) == kind)
        .count()
}

pub fn event_kind(event: &ResolverEvent) -> &'static str {
    match event {
        ResolverEvent::UpdateStarted { .. } => "started",
        ResolverEvent::DataChanged { .. } => "changed",
        ResolverEvent::UpdateEnded { .. } => "ended",
        ResolverEvent::ResolutionFailed { .. } => "failed",
        ResolverEvent::AuthenticationRequired { .. } => "auth",
    }
}
