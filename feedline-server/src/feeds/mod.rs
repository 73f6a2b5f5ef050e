//! Adapter around the remote feed service.

mod client;
mod error;
mod memory;

pub use client::{FeedService, HttpFeedService, HttpFeedServiceConfig};
pub use error::{FeedResult, FeedServiceError};
pub use memory::{Fault, InMemoryFeedService};
