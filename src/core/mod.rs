pub mod config;
pub mod errors;
pub mod log;
pub mod types;
