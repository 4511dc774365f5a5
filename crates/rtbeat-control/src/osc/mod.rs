//! OSC message targets
//!
//! Each target receives one message per tempo change: the configured address
//! with a single float argument, e.g. `/wled/bpm ,f 128.0`. There is no
//! acknowledgment and no retry.

pub mod sender;
pub mod types;

pub use sender::OscSink;
