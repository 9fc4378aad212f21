pub mod capture_session;
pub mod coordinator;
pub mod log_delegate;
