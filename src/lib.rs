pub mod config;
pub mod download;
pub mod error;
pub mod fetch;
pub mod grid;
pub mod output;
pub mod pipeline;
