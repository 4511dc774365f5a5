//! rtbeat Control - tempo dispatch to lighting controllers
//!
//! This crate turns a debounced BPM into messages for external controllers:
//! - **HTTP**: authenticated beat generator endpoint, retried once on 401
//! - **OSC**: fire-and-forget messages to any number of UDP receivers
//! - **Transforms**: per-target value mapping (PLAIN, HALF, GMA3)
//!
//! ## Feature Flags
//!
//! - `http` (default): blocking HTTP client (requires `reqwest`)
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use rtbeat_control::{DispatchTarget, Dispatcher, SinkOptions, TransformMode};
//!
//! # fn main() -> rtbeat_control::Result<()> {
//! let targets = vec![
//!     DispatchTarget::message("192.168.1.20", 8000, "/gma3/Page1/Fader201", TransformMode::Gma3),
//!     DispatchTarget::message("192.168.1.30", 9000, "/wled/bpm", TransformMode::Plain),
//! ];
//! let dispatcher = Dispatcher::from_targets(&targets, &SinkOptions::default())?;
//! dispatcher.dispatch(128);
//! # Ok(())
//! # }
//! ```

#![allow(missing_docs)]

/// Error types
pub mod error;
/// HTTP beat generator sink
pub mod http;
/// OSC message sink
pub mod osc;
/// Sink variants and fan-out
pub mod sink;
/// Target configuration
pub mod target;
/// Per-target value transforms
pub mod transform;

// Re-exports
pub use error::{DispatchError, InvalidValueError, Result};
pub use http::{BeatRequest, BodyEncoding, HttpSink, HttpTransport};
pub use osc::OscSink;
pub use sink::{DispatchReport, DispatchSink, Dispatcher, Route, SinkOptions};
pub use target::DispatchTarget;
pub use transform::TransformMode;

#[cfg(feature = "http")]
pub use http::ReqwestTransport;
