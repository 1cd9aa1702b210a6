//! Command-line host for weft applications.
//!
//! The binary serves the bundled demo over axum; the library half exposes
//! the HTTP edge, the demo pages and logging setup so they can be tested
//! without a socket.

pub mod demo;
pub mod logging;
pub mod server;
