//! Hookline command-line host
//!
//! Dispatches lifecycle events to the project's hooks and inspects their
//! configuration.

pub mod logging;
pub mod output;
pub mod router;
