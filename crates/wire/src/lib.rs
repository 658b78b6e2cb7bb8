//! Redis-wire front-end for BrineDB.
//!
//! - `resp`: RESP2 frame parsing and reply encoding
//! - `dispatch`: the command table mapping RESP commands onto engine calls

pub mod dispatch;
pub mod resp;

pub use dispatch::Dispatcher;
pub use resp::{encode_command, parse_command, parse_reply, FrameError, Reply};
