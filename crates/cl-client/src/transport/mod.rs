//! Transport implementations for reaching the remote executor

mod link;
mod polling;
mod reconnect;
mod socket;

pub use reconnect::ExponentialBackoff;
pub use socket::SocketIoTransport;
