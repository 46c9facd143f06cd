use std::{
    error::Error,
    net::{IpAddr, SocketAddr, TcpStream},
    path::PathBuf,
    sync::Arc,
    time::Duration,
};

use clap::Parser;
use log::{info, warn};
use roster::{
    Dispatcher, Listener, ListenerConfig, Store,
    protocol::DEFAULT_PORT,
};

#[derive(Debug, Parser)]
#[command(version, about, long_about = None)]
struct Cli {
    /// Address to listen on
    #[arg(long, default_value = "0.0.0.0")]
    bind: IpAddr,
    /// Port to listen on
    #[arg(long, default_value_t = DEFAULT_PORT)]
    port: u16,
    /// Path to the SQLite database file
    #[arg(long, default_value = "ORM.db")]
    db: PathBuf,
    /// Pending connections queued by the socket
    #[arg(long, default_value_t = 5)]
    backlog: i32,
    /// Exit without waiting for open sessions
    #[arg(long)]
    no_join: bool,
    /// Seconds to wait for open sessions on shutdown
    #[arg(long)]
    join_timeout: Option<u64>,
}

fn main() -> Result<(), Box<dyn Error>> {
    env_logger::init();

    let cli = Cli::parse();
    let store = Store::open(cli.db.clone())?;
    info!("using database {}", store.path().display());

    let config = ListenerConfig {
        backlog: cli.backlog,
        verify_join: !cli.no_join,
        join_timeout: cli.join_timeout.map(Duration::from_secs),
    };
    let listener = Listener::bind(SocketAddr::new(cli.bind, cli.port), config)?;

    let stop = listener.stop_handle();
    let address = listener.local_addr();
    ctrlc::set_handler(move || {
        info!("shutting down");
        stop.stop_listening();
        // Unblock the pending accept.
        let local = SocketAddr::new(loopback(address.ip()), address.port());
        if let Err(e) = TcpStream::connect(local) {
            warn!("failed to wake listener: {e}");
        }
    })?;

    listener.listen(Arc::new(Dispatcher::new(store)))?;
    Ok(())
}

fn loopback(ip: IpAddr) -> IpAddr {
    match ip {
        IpAddr::V4(v4) if v4.is_unspecified() => IpAddr::from([127, 0, 0, 1]),
        IpAddr::V6(v6) if v6.is_unspecified() => IpAddr::from([0u16, 0, 0, 0, 0, 0, 0, 1]),
        ip => ip,
    }
}
