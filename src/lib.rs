pub mod cli;
pub mod client;
pub mod error;
pub mod models;
pub mod server;
pub mod services;
pub mod sources;

pub use cli::{Cli, Commands};
pub use models::{Config, OutputFormat};
