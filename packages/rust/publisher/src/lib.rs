//! Publishing-platform collaborator and the batched publish cycle.
//!
//! [`PublishingPlatform`] only moves bytes: every HTTP status comes back as an
//! `Ok` [`PlatformResponse`]. [`BatchPublisher`] owns the classification of
//! those responses into per-batch outcomes.

mod batch;
mod client;

pub use batch::{BatchPolicy, BatchPublisher, classify};
pub use client::{DudaClient, PlatformResponse, PublishingPlatform};
