//! Dispatch sinks and fan-out
//!
//! A [`DispatchSink`] is a tagged variant over the supported protocols with a
//! shared `send` capability. The [`Dispatcher`] owns one sink per configured
//! target and delivers every tempo change to all of them independently.

use crate::error::{DispatchError, Result};
use crate::http::{BodyEncoding, HttpSink};
use crate::osc::OscSink;
use crate::target::DispatchTarget;
use std::time::Duration;
use tracing::{debug, warn};

/// Options shared by all sinks built from configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SinkOptions {
    /// Upper bound on a single HTTP request
    pub http_timeout: Duration,
    /// Body encoding for HTTP targets
    pub body_encoding: BodyEncoding,
}

impl Default for SinkOptions {
    fn default() -> Self {
        Self {
            http_timeout: Duration::from_millis(2000),
            body_encoding: BodyEncoding::Form,
        }
    }
}

/// Protocol-specific sender
#[derive(Debug)]
pub enum DispatchSink {
    Http(HttpSink),
    Osc(OscSink),
}

impl DispatchSink {
    /// Build the sink for a target
    pub fn for_target(target: &DispatchTarget, options: &SinkOptions) -> Result<Self> {
        target.validate().map_err(DispatchError::InvalidTarget)?;

        match target {
            DispatchTarget::Http { api_key, .. } => {
                let url = target
                    .endpoint_url()
                    .ok_or_else(|| DispatchError::InvalidTarget(target.name()))?;
                Ok(DispatchSink::Http(HttpSink::new(
                    url,
                    api_key.clone(),
                    options.body_encoding,
                    http_transport(options)?,
                )))
            }
            DispatchTarget::Message {
                host, port, path, ..
            } => Ok(DispatchSink::Osc(OscSink::new(host, *port, path)?)),
        }
    }

    /// Send an already transformed value
    pub fn send(&self, value: f32) -> Result<()> {
        match self {
            DispatchSink::Http(sink) => sink.send(value),
            DispatchSink::Osc(sink) => sink.send(value),
        }
    }
}

#[cfg(feature = "http")]
fn http_transport(options: &SinkOptions) -> Result<Box<dyn crate::http::HttpTransport>> {
    Ok(Box::new(crate::http::ReqwestTransport::new(
        options.http_timeout,
    )?))
}

#[cfg(not(feature = "http"))]
fn http_transport(_options: &SinkOptions) -> Result<Box<dyn crate::http::HttpTransport>> {
    Err(DispatchError::InvalidTarget(
        "HTTP targets require the `http` feature".to_string(),
    ))
}

/// A target together with the sink that serves it
#[derive(Debug)]
pub struct Route {
    pub target: DispatchTarget,
    pub sink: DispatchSink,
}

/// Outcome of one fan-out round
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DispatchReport {
    /// Targets that accepted the value
    pub sent: usize,
    /// Targets whose transform rejected the value
    pub skipped: usize,
    /// Targets whose send failed
    pub failed: usize,
}

impl DispatchReport {
    pub fn all_ok(&self) -> bool {
        self.skipped == 0 && self.failed == 0
    }
}

/// Fan-out over all configured targets
#[derive(Debug, Default)]
pub struct Dispatcher {
    routes: Vec<Route>,
}

impl Dispatcher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build sinks for every target. Fails on the first target that cannot
    /// be set up; this only happens at startup.
    pub fn from_targets(targets: &[DispatchTarget], options: &SinkOptions) -> Result<Self> {
        let mut dispatcher = Self::new();
        for target in targets {
            let sink = DispatchSink::for_target(target, options)?;
            dispatcher.push(target.clone(), sink);
        }
        Ok(dispatcher)
    }

    /// Add a route
    pub fn push(&mut self, target: DispatchTarget, sink: DispatchSink) {
        self.routes.push(Route { target, sink });
    }

    pub fn routes(&self) -> &[Route] {
        &self.routes
    }

    pub fn len(&self) -> usize {
        self.routes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.routes.is_empty()
    }

    /// Transform and send `bpm` to every target.
    ///
    /// Each target is attempted regardless of what happened to the others.
    /// Errors are logged, never returned.
    pub fn dispatch(&self, bpm: i64) -> DispatchReport {
        let mut report = DispatchReport::default();

        for route in &self.routes {
            let mode = route.target.mode();
            let value = match mode.apply(bpm as f32) {
                Ok(value) => value,
                Err(e) => {
                    warn!("Skipping {}: {}", route.target.name(), e);
                    report.skipped += 1;
                    continue;
                }
            };

            match route.sink.send(value) {
                Ok(()) => {
                    debug!("{} <- {:.2} ({} BPM)", route.target.name(), value, bpm);
                    report.sent += 1;
                }
                Err(e) => {
                    warn!("Dispatch to {} failed: {}", route.target.name(), e);
                    report.failed += 1;
                }
            }
        }

        report
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::http::{BeatRequest, HttpTransport};
    use crate::transform::TransformMode;
    use std::net::UdpSocket;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    struct FixedStatus {
        status: u16,
        calls: Arc<AtomicUsize>,
    }

    impl HttpTransport for FixedStatus {
        fn post(&self, _request: &BeatRequest<'_>) -> Result<u16> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(self.status)
        }
    }

    fn http_route(status: u16) -> (DispatchTarget, DispatchSink, Arc<AtomicUsize>) {
        let calls = Arc::new(AtomicUsize::new(0));
        let target = DispatchTarget::http("http://aurora", "key");
        let sink = DispatchSink::Http(HttpSink::new(
            target.endpoint_url().unwrap(),
            "key",
            BodyEncoding::Form,
            Box::new(FixedStatus {
                status,
                calls: calls.clone(),
            }),
        ));
        (target, sink, calls)
    }

    #[test]
    fn test_failure_does_not_block_other_targets() {
        let mut dispatcher = Dispatcher::new();
        let (t1, s1, c1) = http_route(204);
        let (t2, s2, c2) = http_route(500);
        let (t3, s3, c3) = http_route(204);
        dispatcher.push(t1, s1);
        dispatcher.push(t2, s2);
        dispatcher.push(t3, s3);

        let report = dispatcher.dispatch(128);

        assert_eq!(c1.load(Ordering::SeqCst), 1);
        assert_eq!(c2.load(Ordering::SeqCst), 1);
        assert_eq!(c3.load(Ordering::SeqCst), 1);
        assert_eq!(
            report,
            DispatchReport {
                sent: 2,
                skipped: 0,
                failed: 1
            }
        );
    }

    #[test]
    fn test_invalid_transform_skips_only_that_target() {
        let receiver = UdpSocket::bind("127.0.0.1:0").unwrap();
        let port = receiver.local_addr().unwrap().port();

        let mut dispatcher = Dispatcher::new();
        let gma3 = DispatchTarget::message("127.0.0.1", port, "/gma3", TransformMode::Gma3);
        let gma3_sink = DispatchSink::for_target(&gma3, &SinkOptions::default()).unwrap();
        dispatcher.push(gma3, gma3_sink);
        let (t, s, calls) = http_route(204);
        dispatcher.push(t, s);

        let report = dispatcher.dispatch(0);

        assert_eq!(report.skipped, 1);
        assert_eq!(report.sent, 1);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert!(!report.all_ok());
    }

    #[test]
    fn test_osc_targets_receive_transformed_values() {
        let plain_rx = UdpSocket::bind("127.0.0.1:0").unwrap();
        let half_rx = UdpSocket::bind("127.0.0.1:0").unwrap();
        for rx in [&plain_rx, &half_rx] {
            rx.set_read_timeout(Some(Duration::from_secs(2))).unwrap();
        }

        let targets = vec![
            DispatchTarget::message(
                "127.0.0.1",
                plain_rx.local_addr().unwrap().port(),
                "/plain",
                TransformMode::Plain,
            ),
            DispatchTarget::message(
                "127.0.0.1",
                half_rx.local_addr().unwrap().port(),
                "/half",
                TransformMode::Half,
            ),
        ];
        let dispatcher = Dispatcher::from_targets(&targets, &SinkOptions::default()).unwrap();
        assert_eq!(dispatcher.len(), 2);

        let report = dispatcher.dispatch(120);
        assert!(report.all_ok());

        let mut buf = [0u8; rosc::decoder::MTU];
        let (n, _) = plain_rx.recv_from(&mut buf).unwrap();
        let (_, packet) = rosc::decoder::decode_udp(&buf[..n]).unwrap();
        assert_eq!(crate::osc::types::first_float(&packet), Some(120.0));

        let (n, _) = half_rx.recv_from(&mut buf).unwrap();
        let (_, packet) = rosc::decoder::decode_udp(&buf[..n]).unwrap();
        assert_eq!(crate::osc::types::first_float(&packet), Some(60.0));
    }

    #[test]
    fn test_invalid_target_rejected_at_build() {
        let targets = vec![DispatchTarget::message("127.0.0.1", 0, "/x", TransformMode::Plain)];
        let err = Dispatcher::from_targets(&targets, &SinkOptions::default()).unwrap_err();
        assert!(matches!(err, DispatchError::InvalidTarget(_)));
    }
}
