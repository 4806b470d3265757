pub mod backend;
pub mod commands;
pub mod config;
pub mod console;
pub mod logging;
pub mod registry;
pub mod services;
pub mod store;
pub mod utils;
