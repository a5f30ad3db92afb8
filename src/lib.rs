pub mod api;
pub mod auth;
pub mod config;
pub mod errors;
pub mod models;
pub mod repository;
pub mod services;
