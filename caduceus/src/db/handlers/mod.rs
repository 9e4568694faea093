//! Repository implementations for database access.

pub mod roles;
pub mod users;

pub use roles::Roles;
pub use users::Users;
