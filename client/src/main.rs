use clap::Parser;
use client::network::Client;
use log::info;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Server host or IP address
    #[arg(short = 's', long, default_value = "127.0.0.1")]
    server: String,

    /// Server port
    #[arg(short = 'p', long, default_value_t = shared::DEFAULT_PORT)]
    port: u16,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();

    let args = Args::parse();
    let address = format!("{}:{}", args.server, args.port);

    info!("Connecting to {}", address);
    println!("Type your answer and press Enter. /quit leaves the game.");

    let client = Client::new(&address).await?;
    client.run().await?;

    Ok(())
}
