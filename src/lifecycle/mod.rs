//! Lifecycle management subsystem.
//!
//! # Data Flow
//! ```text
//! Shutdown (shutdown.rs):
//!     trigger() → every subscriber wakes → server stops accepting → drains
//!
//! Signals (signals.rs):
//!     SIGTERM/SIGINT → main triggers Shutdown
//! ```

pub mod shutdown;
pub mod signals;

pub use shutdown::Shutdown;
