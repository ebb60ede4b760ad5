//! Domain models for the connector.

pub mod oauth;
pub mod user;

pub use oauth::OAuthApplication;
pub use user::User;
