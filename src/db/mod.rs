pub mod connection;
pub mod db_manager;
pub mod filters;
pub mod models;
pub mod queries;
pub mod repository;
pub mod schema;
