/// Per-stream counters collected by a `LogDelegate`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CaptureDiagnostics {
    pub buffers: u64,
    pub bytes: u64,
    pub silent_buffers: u64,
    pub discontinuities: u64,
    pub errors: u64,
}
