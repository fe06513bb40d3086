pub mod backend;
pub mod chat;
pub mod config;
mod config_env;
pub mod crawl;
pub mod models;
pub mod repos;
