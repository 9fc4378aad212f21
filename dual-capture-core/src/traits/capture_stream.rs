use crate::models::error::CaptureError;

/// The only surface a capture stream exposes to the session orchestrator.
pub trait CaptureStream: Send {
    /// Start capturing. On error nothing is left running or allocated.
    fn start(&mut self) -> Result<(), CaptureError>;

    /// Stop capturing and finalize the output file. Never fails; calling it
    /// before `start` or more than once is a no-op.
    fn stop(&mut self);

    fn is_running(&self) -> bool;
}
