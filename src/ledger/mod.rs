//! The transfer ledger: row codec, lifecycle transitions, and the derived
//! monthly statement sheets.

pub mod codec;
pub mod statement;
pub mod transfers;
