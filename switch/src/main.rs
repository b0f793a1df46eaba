use clap::Parser;
use switch::{Profile, Switch};
use tokio::net::TcpListener;

/// Forwarding switch: routes frames between endpoints by id and
/// degrades the link as configured.
#[derive(Parser, Debug)]
#[command(version, about)]
struct Args {
    /// Port to listen on.
    #[arg(default_value_t = 4004)]
    port: u16,

    /// Percentage of forwarded frames to drop.
    #[arg(long, default_value_t = 0, value_parser = clap::value_parser!(u8).range(0..=100))]
    drop: u8,

    /// Percentage of forwarded frames to corrupt.
    #[arg(long, default_value_t = 0, value_parser = clap::value_parser!(u8).range(0..=100))]
    corrupt: u8,

    /// Shuffle queued frames before each delivery.
    #[arg(long)]
    jitter: bool,
}

#[tokio::main]
async fn main() -> std::io::Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let args = Args::parse();

    let listener = TcpListener::bind(("0.0.0.0", args.port)).await?;
    log::info!(
        "switch listening on port {} (drop {}%, corrupt {}%, jitter {})",
        args.port,
        args.drop,
        args.corrupt,
        args.jitter
    );
    let profile = Profile {
        drop_percent: args.drop,
        corrupt_percent: args.corrupt,
        jitter: args.jitter,
    };
    Switch::new(profile).serve(listener).await
}
