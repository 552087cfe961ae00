//! Data models module
//!
//! - `constants` - Configuration keys and defaults
//! - `config` - Configuration management
//! - `response` - JSON response envelope

pub mod config;
pub mod constants;
pub mod response;

pub use config::Configuration;
pub use constants::*;
pub use response::Result;
