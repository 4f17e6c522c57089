pub mod app;
pub mod config;
pub mod database;
pub mod error;
pub mod health;
pub mod logging;
pub mod state;
pub mod users;
