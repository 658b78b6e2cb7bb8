//! Command dispatch: RESP command arrays onto engine operations.
//!
//! Supported commands: PING, SET, GET, DEL, KEYS. Anything else replies
//! `-ERR unknown command '<name>'`. Arity violations reply the
//! conventional `wrong number of arguments` error and leave the engine
//! untouched.

use crate::resp::Reply;
use brine_engine::Engine;
use std::sync::Arc;
use tracing::debug;

/// Maps command arrays to engine calls and builds the RESP reply.
pub struct Dispatcher {
    engine: Arc<Engine>,
}

impl Dispatcher {
    /// Dispatcher over a shared engine.
    pub fn new(engine: Arc<Engine>) -> Self {
        Dispatcher { engine }
    }

    /// Execute one command and produce its reply.
    pub fn dispatch(&self, command: &[Vec<u8>]) -> Reply {
        let Some(name_bytes) = command.first() else {
            return Reply::error("ERR empty command");
        };
        let name = String::from_utf8_lossy(name_bytes).to_ascii_uppercase();
        debug!(command = %name, args = command.len() - 1, "dispatch");

        match name.as_str() {
            "PING" => self.ping(&command[1..]),
            "SET" => self.set(&command[1..]),
            "GET" => self.get(&command[1..]),
            "DEL" => self.del(&command[1..]),
            "KEYS" => self.keys(&command[1..]),
            _ => Reply::error(format!("ERR unknown command '{name}'")),
        }
    }

    fn ping(&self, args: &[Vec<u8>]) -> Reply {
        match args {
            [] => Reply::Simple("PONG".into()),
            [message] => Reply::Bulk(message.clone()),
            _ => wrong_arity("ping"),
        }
    }

    fn set(&self, args: &[Vec<u8>]) -> Reply {
        let [key, value] = args else {
            return wrong_arity("set");
        };
        match self.engine.put(key, value) {
            Ok(()) => Reply::Simple("OK".into()),
            Err(e) => Reply::error(format!("ERR {e}")),
        }
    }

    fn get(&self, args: &[Vec<u8>]) -> Reply {
        let [key] = args else {
            return wrong_arity("get");
        };
        match self.engine.get(key) {
            Ok(Some(value)) => Reply::Bulk(value),
            Ok(None) => Reply::NullBulk,
            Err(e) => Reply::error(format!("ERR {e}")),
        }
    }

    fn del(&self, args: &[Vec<u8>]) -> Reply {
        if args.is_empty() {
            return wrong_arity("del");
        }
        let mut removed = 0i64;
        for key in args {
            match self.engine.remove(key) {
                Ok(true) => removed += 1,
                Ok(false) => {}
                Err(e) => return Reply::error(format!("ERR {e}")),
            }
        }
        Reply::Integer(removed)
    }

    /// `KEYS *` lists everything; a trailing `*` turns the pattern into a
    /// prefix scan; any other pattern is used as an exact prefix. Full
    /// glob matching is not supported.
    fn keys(&self, args: &[Vec<u8>]) -> Reply {
        let [pattern] = args else {
            return wrong_arity("keys");
        };
        let prefix: &[u8] = if pattern == b"*" {
            b""
        } else if pattern.last() == Some(&b'*') {
            &pattern[..pattern.len() - 1]
        } else {
            pattern
        };

        match self.engine.scan(prefix) {
            Ok(scan) => Reply::Array(scan.map(|(key, _)| Reply::Bulk(key)).collect()),
            Err(e) => Reply::error(format!("ERR {e}")),
        }
    }
}

fn wrong_arity(command: &str) -> Reply {
    Reply::error(format!(
        "ERR wrong number of arguments for '{command}' command"
    ))
}
