//! Database layer for data persistence and access.
//!
//! This module implements the data access layer using SQLx with PostgreSQL,
//! following the repository pattern: each entity has a repository in
//! [`handlers`] that encapsulates its queries, operating on record structs
//! from [`models`].
//!
//! Repositories borrow a `PgConnection`; multi-statement operations open
//! their own transaction on it. Queries use the runtime query API so the
//! crate builds without a live database.
//!
//! Migrations live in `migrations/` and are exposed through
//! [`crate::migrator`].

pub mod errors;
pub mod handlers;
pub mod models;
