pub mod config;
pub mod database;
pub mod discovery;
pub mod errors;
pub mod graph;
pub mod services;
pub mod task;
