// handlers/public/mod.rs - Handlers reachable without a session
//
// Every input here is untrusted; validate before touching the repositories.
pub mod auth;
