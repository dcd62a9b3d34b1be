//! MongoDB connector.

mod config;
mod connector;

pub use config::MongoConfig;
pub use connector::{connect_from_config, ping};

// Re-export MongoDB types for convenience
pub use mongodb::{Client, Collection, Database};
