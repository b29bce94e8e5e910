//! Request forwarding subsystem.
//!
//! # Data Flow
//! ```text
//! ProxyRequest (JSON envelope)
//!     → forwarder.rs prepare (validate, build URL/headers/body)
//!     → query.rs (form-encode queryParams, render header values)
//!     → forwarder.rs execute (one upstream call)
//!     → UpstreamResponse | ForwardError
//!     → error.rs (status + JSON envelope for the caller)
//! ```

pub mod envelope;
pub mod error;
pub mod forwarder;
pub mod query;

pub use envelope::{OutboundRequest, ProxyRequest, ProxyResponse, UpstreamResponse};
pub use error::{ForwardError, SetupError};
pub use forwarder::Forwarder;
