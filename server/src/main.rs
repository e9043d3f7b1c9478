use clap::Parser;
use env_logger::Env;
use log::info;
use server::config::{ServerArgs, ServerConfig};
use server::network::Server;

/// Main-method of the application.
/// Parses command-line arguments, binds the listener and runs the front until Ctrl+C.
#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::Builder::from_env(Env::default().default_filter_or("info")).init();

    let config = ServerConfig::from(ServerArgs::parse());
    info!(
        "Board {}x{}, {}ms ticks, {} slots ({} AI)",
        config.game.width,
        config.game.height,
        config.game.tick_rate_ms(),
        config.game.max_players,
        config.game.ai_players
    );

    let server = Server::bind(config).await?;

    tokio::select! {
        result = server.run() => result?,
        _ = tokio::signal::ctrl_c() => {
            info!("Received Ctrl+C, shutting down...");
        }
    }

    Ok(())
}
