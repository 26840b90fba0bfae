//! gravelink-resolver library interface
//!
//! Resolves grave-memorial IDs from a source website to the genealogy
//! archive's record and person identifiers. See [`pipeline`] for the flow.

pub mod api;
pub mod config;
pub mod error;
pub mod links;
pub mod pipeline;
pub mod store;
pub mod transport;

pub use crate::config::{ResolverConfig, SourceCollection};
pub use crate::error::{ResolverError, ResolverResult};
pub use crate::links::{best_link, person_url, record_url, search_url, LinkState};
pub use crate::pipeline::{
    MemorialPipeline, MultipleMatchesPolicy, PipelineBuilder, SearchMatchPolicy, SearchOutcome,
};
pub use crate::store::{InMemoryStore, MemorialStore};
pub use crate::transport::{HttpTransport, ReqwestTransport};

pub use gravelink_common::{EventBus, IdStatus, MemorialRecord, ResolverEvent, Session, SessionKind};
