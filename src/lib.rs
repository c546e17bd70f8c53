//! Live terminal dashboard for Hyperliquid perpetuals.
//!
//! Three threads share one state block:
//! - the UI thread drives the frame loop and key handling ([`app`]),
//! - a streaming worker owns the persistent websocket ([`worker::stream`]),
//! - a polling worker fetches account state over HTTP ([`worker::poll`]).
//!
//! Rendering is double-buffered cell diffing ([`render`]); cancellation of a
//! blocked websocket receive is a forced `shutdown()` of its published file
//! descriptor ([`transport::shutdown_fd`]).

pub mod actions;
pub mod app;
pub mod error;
pub mod frame;
pub mod render;
pub mod state;
pub mod term;
pub mod transport;
pub mod worker;

pub use error::Error;
pub use state::{Shared, Snapshot};
