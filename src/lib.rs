pub mod cache;
pub mod config;
pub mod gateway;
pub mod listings;
pub mod logging;
pub mod query;
