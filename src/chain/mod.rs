//! Chain data subsystem.
//!
//! # Data Flow
//! ```text
//! caller (address, network, offline)
//!     → gateway.rs (fresh cache? offline? live? degrade)
//!         → cache.rs (persistent TTL store, ignore-TTL read path)
//!         → client.rs (per-network HTTP source, shape normalization)
//!     → Lookup<T> tagged with its DataSource
//!
//! caller (network, offline)
//!     → fees.rs (in-memory cache → fee source → heuristic fallback)
//! ```
//!
//! # Design Decisions
//! - Every outbound call is single-attempt with a hard deadline
//! - Transport failures are absorbed here and never reach callers
//! - Degraded answers are tagged, so "empty" and "unknown" stay distinct

pub mod cache;
pub mod client;
pub mod fees;
pub mod gateway;
pub mod types;

pub use cache::BlockchainCache;
pub use client::ChainClient;
pub use fees::{FeeEstimate, FeeEstimator, FeeSource};
pub use gateway::{ChainGateway, UtxoSource};
pub use types::{
    Availability, Balance, DataSource, Lookup, Network, TransactionStatus, TxState, Utxo,
};
