//! Per-client rate limiting: token buckets, the client registry, and the
//! background sweep that evicts idle clients.

mod bucket;
mod registry;
mod sweeper;

pub use bucket::TokenBucket;
pub use registry::ClientRegistry;
pub use sweeper::{ExpirySweeper, SweeperHandle};
