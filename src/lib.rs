//! User-account service: registration, login with signed session
//! tokens, and profile lookup behind a bearer-token extractor.

pub mod app;
pub mod auth;
pub mod avatar;
pub mod config;
pub mod error;
pub mod state;

pub use app::build_app;
pub use config::AppConfig;
pub use error::{AppError, AppResult};
pub use state::AppState;
