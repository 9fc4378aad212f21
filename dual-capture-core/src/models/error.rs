use thiserror::Error;

/// Errors that can occur while starting or running a capture stream.
///
/// Every variant is reported synchronously from `start()`. Once a stream is
/// running, errors are only forwarded to the `CaptureDelegate`.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CaptureError {
    /// No default device exists, or the device is busy.
    #[error("endpoint unavailable: {0}")]
    EndpointUnavailable(String),

    /// The driver refused the negotiated PCM format.
    #[error("format rejected: {0}")]
    FormatRejected(String),

    /// The output file could not be created or written.
    #[error("i/o failure: {0}")]
    IoFailure(String),

    #[error("thread creation failed: {0}")]
    ThreadCreationFailure(String),

    /// The requested operation is not valid in the current lifecycle state.
    #[error("invalid state: {0}")]
    InvalidState(String),
}

impl CaptureError {
    pub(crate) fn io(context: &str, err: std::io::Error) -> Self {
        Self::IoFailure(format!("{}: {}", context, err))
    }
}

/// Describe the calling thread's most recent OS error (`GetLastError` / `errno`).
///
/// For diagnostics only; never called on the real-time buffer path.
pub fn format_last_platform_error() -> String {
    let err = std::io::Error::last_os_error();
    match err.raw_os_error() {
        Some(0) | None => "no error".to_string(),
        Some(_) => err.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn io_failure_keeps_context() {
        let err = CaptureError::io("cannot create out.wav", std::io::Error::from(std::io::ErrorKind::NotFound));
        match err {
            CaptureError::IoFailure(msg) => assert!(msg.starts_with("cannot create out.wav: ")),
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn platform_error_describes_failed_call() {
        assert!(std::fs::File::open("/nonexistent/dual_capture/missing").is_err());
        let message = format_last_platform_error();
        assert!(!message.is_empty());
        assert_ne!(message, "no error");
    }
}
