use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use drawing_pad::config::Config;
use drawing_pad::gallery::{DrawingApi, FileStorage, Gallery, OfflineApi, StoreKind};
use drawing_pad::logging::init_logging;
use drawing_pad::script::{Player, Script};
use drawing_pad::DrawingSession;
use std::path::{Path, PathBuf};

#[derive(Parser)]
#[command(name = "drawing-pad")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Replay drawing scripts and manage saved drawings", long_about = None)]
struct Cli {
    /// Enable debug logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Configuration file (TOML)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Replay a JSON action script and write the final surface
    Replay {
        script: PathBuf,

        /// Output PNG; defaults to the dated export name
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Also write every history snapshot into this directory
        #[arg(long)]
        frames: Option<PathBuf>,
    },

    /// Inspect or clear saved drawings
    Gallery {
        #[command(subcommand)]
        action: GalleryAction,
    },
}

#[derive(Subcommand)]
enum GalleryAction {
    /// List saved drawings, newest first
    List,
    /// Remove all saved drawings
    Clear,
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose)?;

    let config = match &cli.config {
        Some(path) => Config::load_from_file(path)
            .with_context(|| format!("failed to load config {}", path.display()))?,
        None => Config::default(),
    };

    match cli.command {
        Commands::Replay { script, output, frames } => {
            replay(&config, &script, output.as_deref(), frames.as_deref())
        }
        Commands::Gallery { action } => {
            let mut gallery = open_gallery(&config)?;
            match action {
                GalleryAction::List => list(&gallery),
                GalleryAction::Clear => {
                    gallery.clear()?;
                    println!("All drawings cleared");
                    Ok(())
                }
            }
        }
    }
}

fn replay(
    config: &Config,
    script_path: &Path,
    output: Option<&Path>,
    frames: Option<&Path>,
) -> Result<()> {
    let script = Script::from_file(script_path)?;
    println!("Loaded {} actions from {}", script.actions.len(), script_path.display());

    let session = DrawingSession::new(config)?;
    let mut player = Player::new(session, open_gallery(config)?);
    player.run(&script)?;

    let (default_name, bytes) = player.session.export_png(chrono::Utc::now())?;
    let output = output.map(Path::to_path_buf).unwrap_or_else(|| PathBuf::from(default_name));
    std::fs::write(&output, bytes)
        .with_context(|| format!("failed to write {}", output.display()))?;
    println!("Wrote {}", output.display());

    if let Some(dir) = frames {
        std::fs::create_dir_all(dir)?;
        let history = player.session.history();
        for (i, snapshot) in history.iter().enumerate() {
            let path = dir.join(format!("frame_{:06}.png", i));
            snapshot.decode()?.save(&path)?;
        }
        println!("Saved {} history frames to {}", history.len(), dir.display());
    }
    Ok(())
}

fn list(gallery: &Gallery) -> Result<()> {
    let (drawings, kind) = gallery.list();
    let source = match kind {
        StoreKind::Remote => "service",
        StoreKind::Local => "local store",
    };
    if drawings.is_empty() {
        println!("No saved drawings ({})", source);
        return Ok(());
    }

    println!("{} drawings ({})", drawings.len(), source);
    for drawing in drawings.iter().rev() {
        println!(
            "{:<16} {:<24} {}x{}  {}",
            drawing.id.as_deref().unwrap_or("-"),
            drawing.name,
            drawing.width,
            drawing.height,
            drawing.created_date.format("%Y-%m-%d %H:%M"),
        );
    }
    Ok(())
}

fn open_gallery(config: &Config) -> Result<Gallery> {
    let dir = config.storage.resolve_local_dir()?;
    let local = FileStorage::new(dir).with_compression(config.storage.compress);
    Ok(Gallery::new(remote_api(config), Box::new(local)))
}

#[cfg(feature = "network")]
fn remote_api(config: &Config) -> Box<dyn DrawingApi> {
    match &config.storage.api_base {
        Some(base) => Box::new(drawing_pad::gallery::HttpApi::new(base.clone())),
        None => Box::new(OfflineApi),
    }
}

#[cfg(not(feature = "network"))]
fn remote_api(config: &Config) -> Box<dyn DrawingApi> {
    if config.storage.api_base.is_some() {
        tracing::warn!("api_base is set but the network feature is disabled; saving locally");
    }
    Box::new(OfflineApi)
}
