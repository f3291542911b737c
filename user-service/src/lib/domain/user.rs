pub mod authorization;
pub mod cache_aside;
pub mod errors;
pub mod models;
pub mod ports;
pub mod service;
