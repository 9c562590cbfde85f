//! Cross-thread stop signalling for the event loop.

use std::io::{ErrorKind, Read, Write};
use std::os::unix::net::UnixStream;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, OnceLock};

use tracing::{debug, warn};

/// State shared between a server and its stop handles.
#[derive(Debug, Default)]
pub(crate) struct Shared {
    running: AtomicBool,
    stop: AtomicBool,
    connections: AtomicUsize,
    wake_tx: OnceLock<UnixStream>,
}

impl Shared {
    pub(crate) fn is_running(&self) -> bool {
        self.running.load(Ordering::Acquire)
    }

    pub(crate) fn stop_requested(&self) -> bool {
        self.stop.load(Ordering::Acquire)
    }

    pub(crate) fn connection_count(&self) -> usize {
        self.connections.load(Ordering::Relaxed)
    }

    pub(crate) fn set_connection_count(&self, count: usize) {
        self.connections.store(count, Ordering::Relaxed);
    }

    /// Install the write end of the wake channel. Only the first call wins.
    pub(crate) fn install_waker(&self, wake_tx: UnixStream) -> bool {
        self.wake_tx.set(wake_tx).is_ok()
    }

    /// Arm a fresh run.
    ///
    /// Clears any stop left from the previous run and discards stale wake
    /// bytes before marking the loop as running.
    pub(crate) fn begin_run(&self, wake_rx: &UnixStream) {
        self.stop.store(false, Ordering::Release);
        drain_wake(wake_rx);
        self.running.store(true, Ordering::Release);
    }

    pub(crate) fn end_run(&self) {
        self.set_connection_count(0);
        self.running.store(false, Ordering::Release);
        self.stop.store(false, Ordering::Release);
    }

    fn request_stop(&self) {
        if !self.is_running() {
            debug!("Stop requested while not running, ignoring");
            return;
        }

        self.stop.store(true, Ordering::Release);

        let Some(wake_tx) = self.wake_tx.get() else {
            return;
        };
        match (&*wake_tx).write(&[1]) {
            Ok(_) => {}
            // Buffer full means a wakeup is already pending
            Err(e) if e.kind() == ErrorKind::WouldBlock => {}
            Err(e) => warn!(error = %e, "Failed to signal wake channel"),
        }
    }
}

/// Read and discard everything pending on the wake channel.
pub(crate) fn drain_wake(wake_rx: &UnixStream) {
    let mut buf = [0u8; 64];
    loop {
        match (&*wake_rx).read(&mut buf) {
            Ok(0) => break,
            Ok(_) => continue,
            Err(e) if e.kind() == ErrorKind::Interrupted => continue,
            Err(_) => break,
        }
    }
}

/// Handle for stopping a running server from another thread.
///
/// Cheap to clone. Stopping is idempotent and never blocks; a stop requested
/// while no run is active is ignored rather than remembered.
#[derive(Debug, Clone)]
pub struct StopHandle {
    shared: Arc<Shared>,
}

impl StopHandle {
    pub(crate) fn new(shared: Arc<Shared>) -> Self {
        Self { shared }
    }

    /// Ask the event loop to exit.
    ///
    /// Takes effect at the loop's next wakeup or before its next connection
    /// dispatch. A handler call in progress is never interrupted.
    pub fn request_stop(&self) {
        self.shared.request_stop();
    }

    /// Whether a run loop is currently active.
    pub fn is_running(&self) -> bool {
        self.shared.is_running()
    }

    /// Open connections in the current run.
    pub fn connection_count(&self) -> usize {
        self.shared.connection_count()
    }
}
