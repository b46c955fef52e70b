//! Key and address subsystem.
//!
//! # Data Flow
//! ```text
//! caller key string
//!     → resolver.rs (ImportMethod::ORDER: private key → extended key → seed)
//!     → provider.rs (render format; on failure ScriptFormat::fallback())
//!     → DerivedAddress { address, effective format }
//!
//! KeyRequest → generate.rs (entropy | BIP39 | BIP32) → resolver → KeyMaterial
//! ```
//!
//! # Design Decisions
//! - Cryptography sits behind the `KeyProvider` / `SigningProvider` traits
//! - Capability gaps are typed errors that drive an explicit fallback table
//! - Key material is never persisted and only ever logged masked

pub mod generate;
pub mod provider;
pub mod resolver;

pub use generate::{GenerationMethod, KeyGenerator, KeyMaterial, KeyRequest};
pub use provider::{
    ImportMethod, KeyProvider, ProviderError, ScriptFormat, Secp256k1Provider, SigningProvider,
};
pub use resolver::{load_key, AddressResolver, DerivedAddress};
