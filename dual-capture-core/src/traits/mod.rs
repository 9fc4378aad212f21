pub mod capture_delegate;
pub mod capture_engine;
pub mod capture_stream;
pub mod endpoint;
pub mod engine_factory;
