//! # gravelink common library
//!
//! Shared code for the gravelink crates:
//! - Memorial and session data model
//! - Lifecycle event types (ResolverEvent) and EventBus
//! - Configuration file loading
//! - Tracing setup

pub mod config;
pub mod error;
pub mod events;
pub mod logging;
pub mod models;

pub use error::{Error, Result};
pub use events::{EventBus, ResolverEvent};
pub use models::{IdStatus, MemorialRecord, Session, SessionKind};
