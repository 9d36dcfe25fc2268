//! Outbound backend channels: TLS credentials and the dialed pool.

pub mod pool;
pub mod tls;

pub use pool::{Backend, BackendAddrs, BackendPool};
pub use tls::{ChannelError, ChannelFactory, TlsMode};
