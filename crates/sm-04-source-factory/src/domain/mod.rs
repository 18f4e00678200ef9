//! Source domain: configuration, record layout, errors.

pub mod config;
pub mod errors;
pub mod schema;

pub use config::{
    stream_time, AggregatedConfig, ComoteConfig, Destination, OscBridgeConfig, RiotConfig,
    SourceConfig, SourceType, StreamPlayerConfig, MAX_FORCED_PERIOD_MS,
};
pub use errors::{Result, SourceError};
pub use schema::{fields, initial_values, source_schema, Control};
