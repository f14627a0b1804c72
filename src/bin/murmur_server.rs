//! Murmur Server Binary
//!
//! Usage:
//!   cargo run --release --bin murmur_server -- <PORT> [--host ADDR] [--buffer BYTES]
//!
//! Logging is controlled with `RUST_LOG` (default: `info`).

use clap::Parser;
use tracing::{error, info};

use murmur::config::ServerConfig;
use murmur::network::Server;
use murmur::shutdown::install_interrupt_handler;
use murmur::Error;

fn init_tracing() {
    use tracing_subscriber::{fmt, EnvFilter};

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init();
}

fn run(config: ServerConfig) -> murmur::Result<()> {
    install_interrupt_handler()?;
    let mut server = Server::bind(&config)?;
    server.run()
}

fn main() {
    init_tracing();
    let config = ServerConfig::parse();

    match run(config) {
        Ok(()) => {}
        Err(Error::Interrupted) => {
            info!("interrupted");
            std::process::exit(1);
        }
        Err(e) => {
            error!("fatal: {}", e);
            std::process::exit(-1);
        }
    }
}
