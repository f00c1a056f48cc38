//! Token secrets, issued sessions, and the single credential record owned by the broker.

pub mod record;
pub mod secret;
pub mod session;
