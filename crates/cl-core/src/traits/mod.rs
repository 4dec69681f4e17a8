//! Core trait definitions

mod presentation;
mod transport;

pub use presentation::Presentation;
pub use transport::{Transport, TransportEvent, TransportEvents};
