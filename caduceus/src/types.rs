//! Common type definitions.
//!
//! Entity identifiers are integers wrapped in type aliases for readability:
//!
//! - [`UserId`]: user account identifier
//! - [`RoleId`]: role identifier
//! - [`PermissionId`]: application permission identifier

// Type aliases for IDs
pub type UserId = i64;
pub type RoleId = i32;
pub type PermissionId = i32;
