use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use crossbeam_channel::{Receiver, RecvTimeoutError};

use crate::models::error::CaptureError;

/// A capture thread that is always joined before its owner goes away.
///
/// Stopping clears the shared running flag and waits up to `stop_timeout` for
/// the thread to finish. A thread that overruns the deadline is logged and
/// detached: leaking it is preferred over tearing down state it still uses.
pub struct CaptureWorker<T: Send + 'static> {
    name: String,
    running: Arc<AtomicBool>,
    stop_timeout: Duration,
    handle: Option<JoinHandle<T>>,
    exited: Receiver<()>,
}

impl<T: Send + 'static> CaptureWorker<T> {
    pub fn spawn<F>(
        name: &str,
        running: Arc<AtomicBool>,
        stop_timeout: Duration,
        body: F,
    ) -> Result<Self, CaptureError>
    where
        F: FnOnce() -> T + Send + 'static,
    {
        let (exit_tx, exit_rx) = crossbeam_channel::bounded(1);

        let handle = thread::Builder::new()
            .name(name.to_string())
            .spawn(move || {
                let output = body();
                let _ = exit_tx.send(());
                output
            })
            .map_err(|e| CaptureError::ThreadCreationFailure(format!("failed to spawn {}: {}", name, e)))?;

        Ok(Self {
            name: name.to_string(),
            running,
            stop_timeout,
            handle: Some(handle),
            exited: exit_rx,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// True once the thread body has returned (or was already stopped).
    pub fn is_finished(&self) -> bool {
        self.handle.as_ref().map_or(true, |h| h.is_finished())
    }

    /// Signal the thread to exit and wait for its result.
    ///
    /// Returns `None` if the thread panicked, overran the stop timeout, or was
    /// already stopped.
    pub fn stop(&mut self) -> Option<T> {
        self.running.store(false, Ordering::Release);
        let handle = self.handle.take()?;

        match self.exited.recv_timeout(self.stop_timeout) {
            // Disconnected means the body unwound without signalling.
            Ok(()) | Err(RecvTimeoutError::Disconnected) => match handle.join() {
                Ok(output) => Some(output),
                Err(_) => {
                    log::error!("{} panicked", self.name);
                    None
                }
            },
            Err(RecvTimeoutError::Timeout) => {
                log::error!(
                    "{} did not exit within {:?}; leaking the thread",
                    self.name,
                    self.stop_timeout
                );
                None
            }
        }
    }
}

impl<T: Send + 'static> Drop for CaptureWorker<T> {
    fn drop(&mut self) {
        if self.handle.is_some() {
            let _ = self.stop();
        }
    }
}
