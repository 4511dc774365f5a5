//! Blocking until the user interrupts
//!
//! One primitive with two backends, chosen once at startup:
//! - [`ShutdownWait::Signal`] parks the control thread on ctrl-c
//! - [`ShutdownWait::Poll`] sleeps in a loop and checks a flag set by a
//!   background ctrl-c listener (Windows)
//!
//! Both also return when a [`ShutdownTrigger`] fires.

use std::sync::atomic::{AtomicBool, Ordering};
use std::future::Future;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::Notify;
use tracing::debug;

use crate::error::{CoreError, Result};

/// Poll interval of the Windows backend
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(200);

#[derive(Debug, Default)]
struct TriggerInner {
    requested: AtomicBool,
    notify: Notify,
}

/// Programmatic shutdown request, cheap to clone
#[derive(Debug, Clone, Default)]
pub struct ShutdownTrigger {
    inner: Arc<TriggerInner>,
}

impl ShutdownTrigger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Request shutdown. Later calls have no further effect.
    pub fn trigger(&self) {
        if !self.inner.requested.swap(true, Ordering::AcqRel) {
            self.inner.notify.notify_one();
        }
    }

    pub fn is_triggered(&self) -> bool {
        self.inner.requested.load(Ordering::Acquire)
    }

    /// Resolves once [`trigger`](Self::trigger) has been called
    pub async fn triggered(&self) {
        while !self.is_triggered() {
            self.inner.notify.notified().await;
        }
    }
}

/// Why the wait returned
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShutdownReason {
    /// Ctrl-C
    Interrupt,
    /// [`ShutdownTrigger::trigger`]
    Triggered,
}

/// How the control thread blocks until shutdown
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShutdownWait {
    /// Block on the ctrl-c signal
    Signal,
    /// Sleep-and-check loop
    Poll { interval: Duration },
}

impl ShutdownWait {
    /// `Poll` on Windows, `Signal` elsewhere
    pub fn for_platform() -> Self {
        if cfg!(windows) {
            Self::Poll {
                interval: DEFAULT_POLL_INTERVAL,
            }
        } else {
            Self::Signal
        }
    }

    /// Block the calling thread until ctrl-c or `trigger` fires
    pub fn wait(&self, trigger: &ShutdownTrigger) -> Result<ShutdownReason> {
        debug!("Waiting for shutdown ({:?})", self);
        match *self {
            Self::Signal => wait_for_signal(trigger),
            Self::Poll { interval } => poll_until_triggered(trigger, interval),
        }
    }
}

fn wait_for_signal(trigger: &ShutdownTrigger) -> Result<ShutdownReason> {
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .map_err(|e| CoreError::Shutdown(format!("Failed to start signal runtime: {}", e)))?;

    runtime.block_on(async {
        tokio::select! {
            result = tokio::signal::ctrl_c() => result
                .map(|()| ShutdownReason::Interrupt)
                .map_err(|e| CoreError::Shutdown(format!("Failed to listen for ctrl-c: {}", e))),
            _ = trigger.triggered() => Ok(ShutdownReason::Triggered),
        }
    })
}

fn poll_until_triggered(trigger: &ShutdownTrigger, interval: Duration) -> Result<ShutdownReason> {
    poll_with_listener(trigger, interval, tokio::signal::ctrl_c())
}

/// Poll loop around an interrupt listener running on a background runtime.
///
/// A listener error ends the wait with [`CoreError::Shutdown`].
fn poll_with_listener<F>(
    trigger: &ShutdownTrigger,
    interval: Duration,
    listener: F,
) -> Result<ShutdownReason>
where
    F: Future<Output = std::io::Result<()>> + Send + 'static,
{
    let runtime = tokio::runtime::Builder::new_multi_thread()
        .worker_threads(1)
        .enable_all()
        .build()
        .map_err(|e| CoreError::Shutdown(format!("Failed to start signal runtime: {}", e)))?;

    let interrupted = Arc::new(AtomicBool::new(false));
    let failure: Arc<Mutex<Option<String>>> = Arc::new(Mutex::new(None));
    {
        let interrupted = interrupted.clone();
        let failure = failure.clone();
        let trigger = trigger.clone();
        runtime.spawn(async move {
            match listener.await {
                Ok(()) => {
                    interrupted.store(true, Ordering::Release);
                    trigger.trigger();
                }
                Err(e) => {
                    if let Ok(mut slot) = failure.lock() {
                        *slot = Some(e.to_string());
                    }
                }
            }
        });
    }

    let error = loop {
        if let Some(message) = failure.lock().ok().and_then(|mut slot| slot.take()) {
            break Some(message);
        }
        if trigger.is_triggered() {
            break None;
        }
        std::thread::sleep(interval);
    };
    runtime.shutdown_background();

    if let Some(message) = error {
        return Err(CoreError::Shutdown(format!(
            "Failed to listen for ctrl-c: {}",
            message
        )));
    }
    if interrupted.load(Ordering::Acquire) {
        Ok(ShutdownReason::Interrupt)
    } else {
        Ok(ShutdownReason::Triggered)
    }
}
