mod config;
mod index;
mod search;
mod serve;
mod stats;
mod status;

pub use config::ConfigCommand;
pub use index::IndexCommand;
pub use search::SearchArgs;
pub use serve::ServeArgs;
pub use stats::StatsArgs;

pub use config::handle_config;
pub use index::handle_index;
pub use search::handle_search;
pub use serve::handle_serve;
pub use stats::handle_stats;
pub use status::handle_status;
