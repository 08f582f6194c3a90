pub mod auth;
pub mod dumps;
