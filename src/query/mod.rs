//! Backend query construction
//!
//! Turns an alert's declarative filter (keyword, time window, result cap)
//! plus the current instant into an Elasticsearch search request.

pub mod builder;
pub mod duration;

pub use builder::{
    build, daily_indices, max_time_window, IndexPattern, QueryOptions, SearchQuery,
    DEFAULT_RESULT_SIZE, MAX_TIME_WINDOW_DAYS, TIMESTAMP_FIELD,
};
pub use duration::parse_duration;
