pub mod config;
pub mod delivery;
pub mod error;
pub mod models;
pub mod plugin;
