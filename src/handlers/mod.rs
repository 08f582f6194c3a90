// handlers/mod.rs - Two-tier handler layout
//
// Public (no session) -> Protected (session required, see middleware::require_auth)
pub mod public; // /api/register, /api/login, /api/logout
pub mod protected; // /api/user, /api/brain-dumps
