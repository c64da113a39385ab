//! User accounts: signup, profile view and profile edit.

pub mod handlers;
pub mod service;
pub mod validation;

pub use service::UserService;
