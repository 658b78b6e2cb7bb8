//! BrineDB server binary.
//!
//! `brine-server [PORT] [DATA_DIR]` opens the engine, binds a listener,
//! and serves the Redis-wire protocol with one thread per connection.
//! Exit code 0 on clean shutdown, 1 on startup failure.

use brine_engine::Engine;
use brine_server::conn;
use brine_wire::Dispatcher;
use clap::{value_parser, Arg, Command};
use std::net::TcpListener;
use std::process;
use std::sync::Arc;
use std::thread;
use tracing::{error, info, warn};

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .init();

    let matches = Command::new("brine-server")
        .about("Durable transactional key-value server speaking the Redis wire protocol")
        .arg(
            Arg::new("port")
                .help("TCP port to listen on")
                .value_parser(value_parser!(u16))
                .default_value("6379"),
        )
        .arg(
            Arg::new("data-dir")
                .help("Directory for the store snapshot and WAL")
                .default_value("./data"),
        )
        .arg(
            Arg::new("host")
                .long("host")
                .help("Address to bind")
                .default_value("0.0.0.0"),
        )
        .get_matches();

    let port = *matches.get_one::<u16>("port").expect("has default");
    let data_dir = matches.get_one::<String>("data-dir").expect("has default");
    let host = matches.get_one::<String>("host").expect("has default");

    let engine = match Engine::open(data_dir) {
        Ok(engine) => Arc::new(engine),
        Err(e) => {
            error!("failed to open engine at {data_dir}: {e}");
            process::exit(1);
        }
    };
    let dispatcher = Arc::new(Dispatcher::new(Arc::clone(&engine)));

    let listener = match TcpListener::bind((host.as_str(), port)) {
        Ok(listener) => listener,
        Err(e) => {
            error!("failed to bind {host}:{port}: {e}");
            process::exit(1);
        }
    };
    info!("listening on {host}:{port}, data dir {data_dir}");

    for stream in listener.incoming() {
        match stream {
            Ok(stream) => {
                let dispatcher = Arc::clone(&dispatcher);
                thread::spawn(move || conn::serve(stream, dispatcher));
            }
            Err(e) => warn!("accept failed: {e}"),
        }
    }
}
