//! Inspect and drive the media sessions of this machine from a terminal.

use std::{error::Error, path::PathBuf, pin::pin, time::Duration};

use clap::{Parser, Subcommand, ValueEnum};
use futures::StreamExt;
use nowplaying::{
    config::Config,
    services::{
        MediaService, Update,
        media::{LoopMode, fallback_display_name},
    },
    tracing_config,
};
use tracing::info;

/// Commands run on a spawned task, give it a moment before the runtime stops.
const COMMAND_SETTLE: Duration = Duration::from_millis(300);

#[derive(Parser)]
#[command(name = "nowplaying-debug")]
#[command(about = "Inspect and control OS media sessions")]
struct Cli {
    /// Configuration file, defaults to the user config
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Clone, Copy, ValueEnum)]
enum Repeat {
    None,
    Track,
    Playlist,
    Cycle,
}

#[derive(Subcommand)]
enum Commands {
    /// Print the snapshot of the active session
    Status,
    /// List every tracked session
    List,
    /// Print a snapshot after every change until interrupted
    Watch,
    /// Start playback
    Play,
    /// Pause playback
    Pause,
    /// Toggle between playing and paused
    PlayPause,
    /// Stop playback
    Stop,
    /// Skip to the next track
    Next,
    /// Skip to the previous track
    Previous,
    /// Toggle shuffle, or set it explicitly
    Shuffle { state: Option<bool> },
    /// Change the loop mode
    Repeat {
        #[arg(value_enum, default_value = "cycle")]
        mode: Repeat,
    },
    /// Seek relative to the current position
    Seek {
        /// Offset in seconds, negative to go back
        #[arg(allow_hyphen_values = true)]
        offset: f64,
    },
    /// Jump to an absolute position in seconds
    Position { seconds: f64 },
    /// Print the configuration JSON schema
    Schema,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    let cli = Cli::parse();

    if let Commands::Schema = cli.command {
        let schema = schemars::schema_for!(Config);
        println!("{}", serde_json::to_string_pretty(&schema)?);
        return Ok(());
    }

    let config = match &cli.config {
        Some(path) => Config::load_from(path)?,
        None => Config::load()?,
    };
    tracing_config::init(config.general.log_level)?;

    let service = MediaService::start_native(config.media).await?;

    match cli.command {
        Commands::Status => match service.get_update().await {
            Some(update) => println!("{}", render(&update)?),
            None => println!("No active session"),
        },
        Commands::List => list(&service).await,
        Commands::Watch => watch(&service).await?,
        Commands::Play => service.play(),
        Commands::Pause => service.pause(),
        Commands::PlayPause => service.play_pause(),
        Commands::Stop => service.stop(),
        Commands::Next => service.next(),
        Commands::Previous => service.previous(),
        Commands::Shuffle { state: None } => service.toggle_shuffle(),
        Commands::Shuffle { state: Some(state) } => service.set_shuffle(state),
        Commands::Repeat { mode } => match mode {
            Repeat::Cycle => service.cycle_repeat_mode(),
            Repeat::None => service.set_repeat_mode(LoopMode::None),
            Repeat::Track => service.set_repeat_mode(LoopMode::Track),
            Repeat::Playlist => service.set_repeat_mode(LoopMode::Playlist),
        },
        Commands::Seek { offset } => service.seek_relative((offset * 1_000_000.0) as i64),
        Commands::Position { seconds } => service.set_position(seconds),
        Commands::Schema => {}
    }

    tokio::time::sleep(COMMAND_SETTLE).await;
    service.shutdown().await;
    Ok(())
}

async fn list(service: &MediaService) {
    let active = service.active_app();
    let system = service.system_session();

    let sessions = service.sessions().await;
    if sessions.is_empty() {
        println!("No sessions");
        return;
    }

    for app_id in sessions {
        let name = service.display_name_for(&app_id).await;
        let mut markers = String::new();
        if active.as_ref() == Some(&app_id) {
            markers.push_str(" [active]");
        }
        if system.as_ref() == Some(&app_id) {
            markers.push_str(" [system]");
        }

        if name == fallback_display_name(&app_id) {
            println!("{app_id}{markers}");
        } else {
            println!("{app_id} ({name}){markers}");
        }
    }
}

async fn watch(service: &MediaService) -> Result<(), Box<dyn Error>> {
    let mut updates = pin!(service.updates());

    loop {
        tokio::select! {
            update = updates.next() => {
                let Some(update) = update else {
                    break;
                };
                match update {
                    Some(update) => println!("{}", render(&update)?),
                    None => println!("No active session"),
                }
            }
            _ = tokio::signal::ctrl_c() => {
                info!("Interrupted");
                break;
            }
        }
    }

    Ok(())
}

/// JSON rendering with the art bytes replaced by their size.
fn render(update: &Update) -> Result<String, serde_json::Error> {
    let mut value = serde_json::to_value(update)?;

    if let Some(art) = value
        .get_mut("metadata")
        .and_then(|metadata| metadata.get_mut("artData"))
        .and_then(|art| art.as_object_mut())
        && let Some(data) = art.get("data").and_then(|data| data.as_array())
    {
        let size = data.len();
        art.insert("data".to_string(), format!("<{size} bytes>").into());
    }

    serde_json::to_string_pretty(&value)
}
