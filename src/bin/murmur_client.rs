//! Murmur Client Binary
//!
//! Usage:
//!   cargo run --release --bin murmur_client -- <HOST> <PORT> [--buffer BYTES]
//!
//! Commands, one per line:
//!   users                 list connected users
//!   name;<name>           pick a display name
//!   all;<text>            send to everyone
//!   uni;<user>;<text>     send to one user
//!   exit                  quit

use clap::Parser;
use tracing::{error, info};

use murmur::config::ClientConfig;
use murmur::network::Client;
use murmur::shutdown::install_interrupt_handler;
use murmur::Error;

fn init_tracing() {
    use tracing_subscriber::{fmt, EnvFilter};

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    let _ = fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .try_init();
}

fn run(config: ClientConfig) -> murmur::Result<()> {
    install_interrupt_handler()?;
    let mut client = Client::connect(&config)?;
    let stdout = std::io::stdout();
    let mut out = stdout.lock();
    client.run(&mut out)
}

fn main() {
    init_tracing();
    let config = ClientConfig::parse();

    match run(config) {
        Ok(()) => {}
        Err(Error::Interrupted) => info!("interrupted"),
        Err(e) => {
            error!("fatal: {}", e);
            std::process::exit(-1);
        }
    }
}
