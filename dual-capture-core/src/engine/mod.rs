pub mod callback;
pub mod polling;
pub mod worker;
