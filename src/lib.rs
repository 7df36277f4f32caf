pub mod catalog;
pub mod config;
pub mod constants;
pub mod engine;
pub mod error;
pub mod map;
pub mod pathfinding;
pub mod rng;
pub mod server_protocol;
pub mod server_utils;
pub mod snapshot;
pub mod types;
