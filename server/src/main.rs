use clap::Parser;
use log::info;
use server::config::GameConfig;
use server::network::Server;
use server::words::CsvWordSource;
use std::path::PathBuf;
use std::time::Duration;

/// Impostor word game server
#[derive(Parser, Debug)]
#[clap(author, version, about)]
struct Args {
    /// Address to bind to
    #[clap(short = 'H', long, default_value = "0.0.0.0")]
    host: String,

    /// Port to listen on
    #[clap(short, long, default_value_t = shared::DEFAULT_PORT)]
    port: u16,

    /// Players needed to start the first game, also the connection limit
    #[clap(short = 'j', long, default_value_t = 10, value_parser = clap::value_parser!(u32).range(3..))]
    max_players: u32,

    /// Rounds of word submissions per game
    #[clap(short = 'r', long, default_value_t = 3, value_parser = clap::value_parser!(u32).range(1..))]
    max_rounds: u32,

    /// Seconds a player has to submit a word
    #[clap(short = 't', long, default_value_t = 30, value_parser = clap::value_parser!(u64).range(1..))]
    play_timeout: u64,

    /// Seconds the voting phase lasts
    #[clap(short = 'T', long, default_value_t = 60, value_parser = clap::value_parser!(u64).range(1..))]
    vote_timeout: u64,

    /// Seconds between the results and the next game
    #[clap(short = 'c', long, default_value_t = 60)]
    cooldown: u64,

    /// Word corpus, one comma separated group per line
    #[clap(short = 'w', long, default_value = "data/words.csv")]
    words: PathBuf,

    /// Enable debug logging
    #[clap(short, long)]
    debug: bool,
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    let default_level = if args.debug { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_level))
        .init();

    let config = GameConfig {
        max_players: args.max_players as usize,
        max_rounds: args.max_rounds,
        play_timeout: Duration::from_secs(args.play_timeout),
        vote_timeout: Duration::from_secs(args.vote_timeout),
        results_cooldown: Duration::from_secs(args.cooldown),
        ..GameConfig::default()
    };

    let words = CsvWordSource::load(&args.words)?;
    let address = format!("{}:{}", args.host, args.port);
    let server = Server::new(&address, config, Box::new(words)).await?;

    server.run().await?;
    info!("Server stopped");
    Ok(())
}
