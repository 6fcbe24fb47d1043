// Core modules
pub mod config;
pub mod render;
pub mod services;
pub mod state;
pub mod types;
pub mod web;

// Re-exports
pub use state::AppState;
pub use types::{AppError, AppResult};
