//! Timeout enforcement.
//!
//! # Responsibilities
//! - Wrap every outbound call with a deadline
//! - Turn an elapsed deadline into a distinct upstream error
//!
//! # Design Decisions
//! - Uses Tokio's timeout facilities on top of the HTTP client's own timeout
//! - Single attempt; callers fall back instead of retrying

use std::future::Future;
use std::time::Duration;
use tokio::time::timeout;

use crate::chain::types::{UpstreamError, UpstreamResult};

/// Run `fut` with a hard deadline.
pub async fn with_deadline<T, F>(deadline: Duration, fut: F) -> UpstreamResult<T>
where
    F: Future<Output = UpstreamResult<T>>,
{
    match timeout(deadline, fut).await {
        Ok(result) => result,
        Err(_) => Err(UpstreamError::Timeout(deadline.as_secs())),
    }
}
