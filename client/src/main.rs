use clap::Parser;
use client::autopilot;
use client::game::ClientGameState;
use client::input::{read_commands, DirectionSink};
use client::network::{Client, ClientConfig};
use env_logger::Env;
use log::info;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::BufReader;
use tokio::sync::RwLock;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Server address to connect to
    #[arg(short = 's', long, default_value = "127.0.0.1:8080")]
    server: String,

    /// Player name; the server picks one when empty
    #[arg(short = 'n', long, default_value = "")]
    name: String,

    /// Queue again whenever a game ends
    #[arg(short = 'r', long)]
    rejoin: bool,

    /// Print the view to stdout after every tick
    #[arg(long)]
    show: bool,

    /// Let the built-in AI steer; typed commands still work
    #[arg(short = 'a', long)]
    autopilot: bool,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::Builder::from_env(Env::default().default_filter_or("info")).init();

    let args = Args::parse();

    info!("Connecting to: {}", args.server);
    info!("Controls: w/a/s/d (or up/left/down/right) then Enter, 'join <name>', 'quit'");

    let client = Client::connect(
        &args.server,
        ClientConfig {
            name: args.name,
            rejoin: args.rejoin,
            ..ClientConfig::default()
        },
    )
    .await?;

    let (sink, intents) = DirectionSink::channel();
    tokio::spawn(read_commands(BufReader::new(tokio::io::stdin()), sink.clone()));
    if args.show {
        tokio::spawn(show_view(client.state()));
    }
    if args.autopilot {
        tokio::spawn(autopilot::run(client.state(), sink, Duration::from_millis(20)));
    }

    client.run(intents).await?;
    Ok(())
}

/// Prints the window whenever a new tick has been applied.
async fn show_view(state: Arc<RwLock<ClientGameState>>) {
    let mut last_tick = None;
    let mut poll = tokio::time::interval(Duration::from_millis(50));
    loop {
        poll.tick().await;
        let state = state.read().await;
        let Some(view) = state.snapshot() else {
            continue;
        };
        if last_tick == Some(view.tick) {
            continue;
        }
        last_tick = Some(view.tick);
        let leader = view.leaderboard[0];
        println!(
            "tick {} | score {} ({:.2}%) | leader {} with {}\n{}",
            view.tick,
            view.score,
            view.coverage(),
            view.name(leader.0).unwrap_or("-"),
            leader.1,
            view.render_ascii()
        );
    }
}
