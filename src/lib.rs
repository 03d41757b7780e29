pub mod client;
pub mod config;
pub mod context;
pub mod errors;
pub mod models;
pub mod pipeline;
pub mod poll;
pub mod staleness;
pub mod stages;
pub mod ui;
