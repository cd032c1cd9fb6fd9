pub mod config;
pub mod domain;
pub mod error;
pub mod handlers;
pub mod middleware;
pub mod repositories;
pub mod routes;
pub mod scheduler;
pub mod utils;
