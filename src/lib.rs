pub mod config;
pub mod error;
pub mod export;
pub mod gemini;
pub mod generator;
pub mod models;
pub mod prompt;
pub mod routes;
pub mod session;
pub mod settings;
