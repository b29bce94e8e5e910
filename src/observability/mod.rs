//! Observability subsystem.
//!
//! # Data Flow
//! ```text
//! HTTP layer and forwarder produce:
//!     → logging.rs (structured log events via tracing)
//!     → metrics.rs (counters, histograms)
//!
//! Consumers:
//!     → stdout (pretty or JSON lines)
//!     → Metrics endpoint (Prometheus scrape, optional)
//! ```
//!
//! # Design Decisions
//! - Request ID is attached to every forwarding log line
//! - Metrics are off by default

pub mod logging;
pub mod metrics;
