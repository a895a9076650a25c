mod game;
mod input;
mod network;

use clap::Parser;
use log::info;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Server address to connect to
    #[arg(short = 's', long, default_value = "127.0.0.1:8080")]
    server: String,

    /// Session code to subscribe to
    #[arg(short = 'c', long, default_value = "ABCD")]
    code: String,

    /// Display name used when joining
    #[arg(short = 'n', long, default_value = "Player")]
    name: String,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init();

    if std::env::var("RUST_LOG").is_err() {
        eprintln!("Set RUST_LOG=info for detailed logging");
    }

    let args = Args::parse();
    let code = args.code.to_uppercase();

    info!("Connecting to {}", args.server);
    info!("Session code: {}", code);

    let mut client = network::Client::new(&args.server, code, args.name).await?;
    client.run().await?;

    Ok(())
}
