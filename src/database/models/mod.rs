pub mod brain_dump;
pub mod user;

pub use brain_dump::BrainDump;
pub use user::{derive_initials, NewUser, PublicUser, User, DEFAULT_PLAN};
