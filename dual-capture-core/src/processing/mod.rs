pub mod buffer_pool;
pub mod wav_format;
