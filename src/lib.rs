pub mod app;
pub mod app_config;
pub mod config;
pub mod error;
pub mod exchange;
pub mod portfolio;
pub mod rebalance;
