//! Resilience subsystem.
//!
//! # Data Flow
//! ```text
//! Request to an external source:
//!     → timeouts.rs (enforce request deadline)
//!     → On failure: caller serves cache or a synthesized default
//! ```
//!
//! # Design Decisions
//! - Timeouts are non-negotiable; every external call has a deadline
//! - No automatic retries: one attempt, then fallback

pub mod timeouts;
