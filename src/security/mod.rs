//! Request authentication.

mod auth;

pub use auth::BearerAuth;
