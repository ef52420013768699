//! Identity provider access (users, roles, grants, metadata).

pub mod client;

pub use client::IdentityClient;
