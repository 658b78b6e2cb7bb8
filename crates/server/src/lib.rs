//! TCP front-end for BrineDB.
//!
//! The binary (`brine-server`) binds a listener and spawns one thread per
//! connection; `conn::serve` is the per-connection protocol loop.

pub mod conn;
