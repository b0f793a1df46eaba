use clap::Parser;
use relink::Endpoint;
use tokio::net::TcpStream;

/// Demo echo endpoint: receives a payload through the switch and sends
/// it straight back to whoever spoke.
#[derive(Parser, Debug)]
#[command(version, about)]
struct Args {
    /// Switch address.
    #[arg(default_value = "localhost:4004")]
    addr: String,
}

const ID: u8 = b's';

#[tokio::main]
async fn main() -> relink::Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let args = Args::parse();

    let stream = TcpStream::connect(&args.addr).await?;
    let mut endpoint = Endpoint::new(stream, ID);
    endpoint.announce().await?;
    log::info!("registered as <{}> with {}", ID as char, args.addr);

    loop {
        let (data, peer) = endpoint.recv(None).await?;
        log::info!(
            "received {} bytes from <{}>, echoing back",
            data.len(),
            peer as char
        );
        // echo in one chunk; an empty line degenerates to answering a ping
        if let Err(e) = endpoint.send(peer, &data, data.len() as u16, 3).await {
            log::error!("echo to <{}> failed: {e}", peer as char);
        }
    }
}
