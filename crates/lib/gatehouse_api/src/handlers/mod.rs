//! Request handlers.

pub mod app;
pub mod health;
pub mod roles;
pub mod users;
