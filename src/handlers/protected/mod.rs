// handlers/protected/mod.rs - Handlers behind require_auth
//
// Each handler receives the resolved `Identity` through `Extension`; the
// middleware has already rejected unauthenticated requests.
pub mod brain_dumps;
pub mod user;
