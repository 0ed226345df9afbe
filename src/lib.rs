pub mod config;
pub mod core;
pub mod errors;
pub mod gateway;
pub mod utils;

// Re-export commonly used items for convenience
pub use config::{BridgeConfig, ConfigOverrides};
pub use crate::core::*;
pub use errors::{BridgeError, BridgeResult};
pub use gateway::Gateway;
