//! Database record structures matching table schemas.

pub mod roles;
pub mod users;
