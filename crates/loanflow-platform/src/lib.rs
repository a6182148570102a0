pub mod config;
pub mod db;

pub use config::ServiceConfig;
pub use db::connect_database;
