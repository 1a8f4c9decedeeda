//! Reference server binary: binds a UDP socket and echoes clock-sync probes.

use std::net::SocketAddr;

use driftsync::wire::DEFAULT_PORT;
use driftsync::{CreateError, Server};
use tracing::info;

fn main() -> Result<(), CreateError> {
    let mut bind: SocketAddr = ([0, 0, 0, 0], DEFAULT_PORT).into();
    let mut verbose = false;

    let mut args = std::env::args().skip(1);
    while let Some(arg) = args.next() {
        match arg.as_str() {
            "-v" | "--verbose" => verbose = true,
            "--bind" => {
                let value = args.next().expect("--bind requires an address");
                bind = value.parse().map_err(CreateError::Address)?;
            }
            other => {
                eprintln!("unrecognized argument: {other}");
                std::process::exit(2);
            }
        }
    }
    if verbose && std::env::var("RUST_LOG").is_err() {
        std::env::set_var("RUST_LOG", "driftsync=trace");
    }
    tracing_subscriber::fmt::init();

    let server = Server::bind(bind)?;
    info!(addr = %server.local_addr().unwrap(), "driftsyncd listening");
    server.run();
    Ok(())
}
