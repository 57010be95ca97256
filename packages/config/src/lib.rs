// ABOUTME: Environment driven configuration for the tutor engine
// ABOUTME: Exposes variable names and a validated EngineConfig loaded from the process env

pub mod constants;
pub mod settings;

pub use settings::{ConfigError, EngineConfig, RemoteEndpoint};
