//! Axum-powered chat service for the Newsroom blogging assistant.

pub mod config;
pub mod error;
pub mod routes;
pub mod state;
pub mod telemetry;
