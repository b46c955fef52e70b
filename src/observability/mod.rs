//! Observability subsystem.
//!
//! # Data Flow
//! ```text
//! All subsystems produce:
//!     → logging.rs (structured log events, masked secrets)
//!     → metrics.rs (counters, gauges)
//!
//! Consumers:
//!     → stderr via tracing-subscriber (binary only)
//!     → whatever `metrics` recorder the host installs
//! ```

pub mod logging;
pub mod metrics;
