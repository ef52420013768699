//! Relational mirror of the transfer ledger.

pub mod store;

pub use store::MirrorStore;
