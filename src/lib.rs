pub mod config;
pub mod error;
pub mod fetch;
pub mod metrics;
pub mod process;
pub mod relay;
pub mod source;
