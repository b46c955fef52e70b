//! Transaction lifecycle subsystem.
//!
//! # Data Flow
//! ```text
//! TxInputSpec[] + TxOutputSpec[]
//!     → builder.rs (request checks → unsigned v2 tx, implied fee, placeholder on failure)
//!     → signer.rs (load key → provider signs → before/after comparison)
//!     → validator.rs (structure → funds via gateway UTXOs or hints)
//! ```
//!
//! # Design Decisions
//! - Transactions travel as hex; nothing here is persisted
//! - Construction and signing failures degrade into flagged results
//! - Only malformed requests surface as errors

pub mod builder;
pub mod signer;
pub mod types;
pub mod validator;

pub use builder::TransactionBuilder;
pub use signer::TransactionSigner;
pub use types::{
    BuildResult, PrevoutSpec, SignResult, TxInputSpec, TxOutputSpec, ValidationDetails,
    ValidationReport,
};
pub use validator::TransactionValidator;
