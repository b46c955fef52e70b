//! Bitcoin transaction lifecycle engine with a resilient chain-data cache.
//!
//! # Architecture Overview
//!
//! ```text
//!   caller
//!     │
//!     ▼
//!  ┌──────────────────────────── WalletService ────────────────────────────┐
//!  │                                                                        │
//!  │  keys::resolver ──▶ keys::provider ◀── tx::signer                      │
//!  │  keys::generate ─┘        (secp256k1)                                  │
//!  │                                                                        │
//!  │  tx::builder        tx::validator ──▶ chain::gateway ──▶ chain::client │
//!  │                                             │                          │
//!  │  chain::fees                                ▼                          │
//!  │                                       chain::cache (JSON file)         │
//!  │                                                                        │
//!  │  Cross-cutting: config · observability · resilience · error            │
//!  └────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Every outbound call has a deadline and a non-network fallback, so the
//! engine keeps working offline against cached data.

pub mod chain;
pub mod config;
pub mod error;
pub mod keys;
pub mod observability;
pub mod resilience;
pub mod service;
pub mod tx;

pub use config::WalletConfig;
pub use error::{WalletError, WalletResult};
pub use service::WalletService;
