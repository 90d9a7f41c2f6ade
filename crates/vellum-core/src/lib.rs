//! Configuration and service bootstrap for the `vellum` binary.

pub mod bootstrap;
pub mod config;

pub use config::Config;
