pub mod apis;
pub mod catalog;
pub mod config;
pub mod constants;
pub mod enrich;
pub mod error;
pub mod extract;
pub mod logging;
pub mod normalize;
pub mod pipeline;
pub mod storage;
pub mod tags;
pub mod time;
pub mod types;
pub mod xml;

// Layered boundaries for application ports and infrastructure
pub mod app;
pub mod infra;
