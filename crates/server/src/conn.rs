//! Per-connection serving loop.
//!
//! Reads raw bytes into a pending buffer and drains complete command
//! frames from it, so pipelined commands are answered back to back. A
//! protocol violation closes the connection; a clean EOF just ends the
//! loop.

use brine_wire::{parse_command, Dispatcher};
use std::io::{Read, Write};
use std::net::TcpStream;
use std::sync::Arc;
use tracing::{debug, warn};

const READ_CHUNK: usize = 8192;

/// Serve one client until EOF or protocol error.
pub fn serve(mut stream: TcpStream, dispatcher: Arc<Dispatcher>) {
    let peer = stream
        .peer_addr()
        .map(|a| a.to_string())
        .unwrap_or_else(|_| "<unknown>".into());
    debug!(%peer, "connection accepted");

    let mut pending: Vec<u8> = Vec::new();
    let mut chunk = [0u8; READ_CHUNK];

    loop {
        let n = match stream.read(&mut chunk) {
            Ok(0) => break,
            Ok(n) => n,
            Err(e) => {
                debug!(%peer, "read failed: {e}");
                break;
            }
        };
        pending.extend_from_slice(&chunk[..n]);

        let mut consumed = 0;
        loop {
            match parse_command(&pending[consumed..]) {
                Ok(Some((command, used))) => {
                    consumed += used;
                    let reply = dispatcher.dispatch(&command);
                    if let Err(e) = stream.write_all(&reply.to_bytes()) {
                        debug!(%peer, "write failed: {e}");
                        return;
                    }
                }
                Ok(None) => break,
                Err(e) => {
                    warn!(%peer, "protocol error: {e}");
                    return;
                }
            }
        }
        if consumed > 0 {
            pending.drain(..consumed);
        }
    }

    debug!(%peer, "connection closed");
}
