use std::io::Write as _;

use clap::Parser;
use relink::Endpoint;
use tokio::io::AsyncBufReadExt;
use tokio::net::TcpStream;

/// Demo REPL endpoint: sends each stdin line to the echo server
/// through the switch and prints what comes back.
#[derive(Parser, Debug)]
#[command(version, about)]
struct Args {
    /// Switch address.
    #[arg(default_value = "localhost:4004")]
    addr: String,
}

const ID: u8 = b'c';
const ECHO_SERVER: u8 = b's';

#[tokio::main]
async fn main() -> relink::Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let args = Args::parse();

    let stream = TcpStream::connect(&args.addr).await?;
    let mut endpoint = Endpoint::new(stream, ID);
    endpoint.announce().await?;
    log::info!("registered as <{}> with {}", ID as char, args.addr);

    let mut lines = tokio::io::BufReader::new(tokio::io::stdin()).lines();
    loop {
        print!("-> ");
        std::io::stdout().flush()?;
        let Some(line) = lines.next_line().await? else {
            break;
        };
        if let Err(e) = endpoint.send(ECHO_SERVER, line.as_bytes(), 1, 10).await {
            eprintln!("{e}");
            continue;
        }
        match endpoint.recv(None).await {
            Ok((data, from)) => {
                println!("<{}> {}", from as char, String::from_utf8_lossy(&data));
            }
            Err(e) => eprintln!("{e}"),
        }
    }
    Ok(())
}
