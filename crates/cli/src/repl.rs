//! Interactive loop: read a line, send the command, print the reply.

use crate::format::format_reply;
use crate::parse::split_args;
use brine_wire::{encode_command, parse_reply, Reply};
use rustyline::error::ReadlineError;
use rustyline::DefaultEditor;
use std::io::{Read, Write};
use std::net::TcpStream;

/// Run the REPL against `host:port` until quit or EOF.
pub fn run(host: &str, port: u16) -> Result<(), String> {
    let mut stream = TcpStream::connect((host, port))
        .map_err(|e| format!("Could not connect to {host}:{port}: {e}"))?;
    let mut editor =
        DefaultEditor::new().map_err(|e| format!("Failed to initialize line editor: {e}"))?;

    let prompt = format!("{host}:{port}> ");
    loop {
        match editor.readline(&prompt) {
            Ok(line) => {
                let line = line.trim();
                if line.is_empty() {
                    continue;
                }
                let _ = editor.add_history_entry(line);

                if line.eq_ignore_ascii_case("quit") || line.eq_ignore_ascii_case("exit") {
                    return Ok(());
                }

                let Some(args) = split_args(line) else {
                    println!("(error) unbalanced quotes in input");
                    continue;
                };
                if args.is_empty() {
                    continue;
                }

                match exchange(&mut stream, &args) {
                    Ok(reply) => println!("{}", format_reply(&reply)),
                    Err(e) => return Err(format!("Connection lost: {e}")),
                }
            }
            Err(ReadlineError::Interrupted) => continue,
            Err(ReadlineError::Eof) => return Ok(()),
            Err(e) => return Err(format!("Input error: {e}")),
        }
    }
}

/// Send one command and block for its reply.
fn exchange(stream: &mut TcpStream, args: &[Vec<u8>]) -> std::io::Result<Reply> {
    stream.write_all(&encode_command(args))?;

    let mut pending: Vec<u8> = Vec::new();
    let mut chunk = [0u8; 4096];
    loop {
        match parse_reply(&pending) {
            Ok(Some((reply, _))) => return Ok(reply),
            Ok(None) => {}
            Err(e) => {
                return Err(std::io::Error::new(
                    std::io::ErrorKind::InvalidData,
                    e.to_string(),
                ))
            }
        }
        let n = stream.read(&mut chunk)?;
        if n == 0 {
            return Err(std::io::Error::new(
                std::io::ErrorKind::UnexpectedEof,
                "server closed the connection",
            ));
        }
        pending.extend_from_slice(&chunk[..n]);
    }
}
