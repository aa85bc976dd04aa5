pub mod analytics;
pub mod api;
pub mod config;
pub mod error;
pub mod identity;
pub mod refresh;
pub mod render;
pub mod storage;
pub mod types;
pub mod visitor;
