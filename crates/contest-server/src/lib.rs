//! Contest Server - command line front end
//!
//! Loads configuration, sets up logging, opens the configured record store and
//! dispatches one command to `ContestService`, printing a JSON envelope.

pub mod cli; // Command line arguments
pub mod command; // Command dispatch
pub mod model; // Configuration and response models
pub mod startup; // Logging setup

pub use cli::{Cli, Command};
pub use model::Configuration;
