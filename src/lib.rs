pub mod app;
pub mod cache;
pub mod client;
pub mod config;
pub mod error;
pub mod facade;
pub mod handlers;
pub mod models;
pub mod routes;
pub mod session;

#[cfg(test)]
mod test_support;

// Re-export key functions for convenience
pub use app::{create_app, init_tracing};
pub use facade::{FacadeReply, Intent, UnifiedFacade};
