pub mod metadata;
pub mod output;
pub mod stream_encoder;
