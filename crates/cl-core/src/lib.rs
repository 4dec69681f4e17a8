//! cl-core: Core abstractions and configuration for codelab
//!
//! This crate provides the shared session types, the transport and
//! presentation seams, configuration, and the persisted display identity
//! used by the client runtime and the CLI.

pub mod config;
pub mod error;
pub mod identity;
pub mod traits;
pub mod types;

pub use identity::DisplayIdentity;
pub use types::{Controls, SessionState};
