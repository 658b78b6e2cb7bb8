//! BrineDB client binary.
//!
//! `brine-cli -h HOST -p PORT` connects to a running server and starts a
//! redis-cli style REPL. Exit code 0 on a clean quit, 1 when the initial
//! connection fails.

mod format;
mod parse;
mod repl;

use clap::{value_parser, Arg, ArgAction, Command};
use std::process;

fn main() {
    // -h is taken by the host flag, as redis-cli does it, so the
    // auto-generated short help flag is disabled.
    let matches = Command::new("brine-cli")
        .about("Interactive client for BrineDB servers")
        .disable_help_flag(true)
        .arg(
            Arg::new("host")
                .short('h')
                .long("host")
                .help("Server hostname")
                .default_value("127.0.0.1"),
        )
        .arg(
            Arg::new("port")
                .short('p')
                .long("port")
                .help("Server port")
                .value_parser(value_parser!(u16))
                .default_value("6379"),
        )
        .arg(
            Arg::new("help")
                .long("help")
                .help("Print help")
                .action(ArgAction::Help),
        )
        .get_matches();

    let host = matches.get_one::<String>("host").expect("has default");
    let port = *matches.get_one::<u16>("port").expect("has default");

    match repl::run(host, port) {
        Ok(()) => {}
        Err(e) => {
            eprintln!("{e}");
            process::exit(1);
        }
    }
}
