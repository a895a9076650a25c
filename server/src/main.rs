use clap::Parser;
use log::info;
use server::network::Server;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Server IP address to bind to
    #[arg(short = 'H', long, default_value = "127.0.0.1")]
    host: String,

    /// Server port to listen on
    #[arg(short, long, default_value = "8080")]
    port: u16,

    /// Maximum number of concurrent sessions
    #[arg(short = 'm', long, default_value = "256")]
    max_sessions: usize,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init();

    if std::env::var("RUST_LOG").is_err() {
        eprintln!("Set RUST_LOG=info for detailed logging");
    }

    let args = Args::parse();
    let address = format!("{}:{}", args.host, args.port);

    info!("Starting session server on {}", address);
    info!("Session capacity: {}", args.max_sessions);

    let mut server = Server::new(&address, args.max_sessions).await?;
    server.run().await?;

    Ok(())
}
