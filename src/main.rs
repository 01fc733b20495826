use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use colored::Colorize;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use tidalsync::catalog::SourceCatalog;
use tidalsync::sync::{CheckpointStore, FileTransferLog, RunOptions, TransferEngine};
use tidalsync::{Config, LibraryStore, SpotifyClient, SyncTuning, TidalClient};

#[derive(Parser)]
#[command(name = "tidalsync")]
#[command(about = "Resumable Spotify to Tidal playlist sync")]
#[command(version)]
struct Cli {
    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Transfer all your Spotify playlists to Tidal, resuming from any
    /// existing checkpoint
    Transfer {
        /// Ignore any existing checkpoint and start over
        #[arg(long)]
        fresh: bool,

        /// Only transfer playlists that are not already synced on Tidal
        #[arg(long)]
        sync_only: bool,

        /// Checkpoint file location
        #[arg(long, default_value = "transfer_checkpoint.json")]
        checkpoint_file: PathBuf,

        /// Track library file location
        #[arg(long, default_value = "track_library.jsonl")]
        library_file: PathBuf,

        /// Tidal client ID (or set TIDAL_CLIENT_ID env var)
        #[arg(long, env = "TIDAL_CLIENT_ID")]
        tidal_client_id: String,

        /// Tidal client secret (or set TIDAL_CLIENT_SECRET env var)
        #[arg(long, env = "TIDAL_CLIENT_SECRET")]
        tidal_client_secret: String,
    },

    /// Show the state of the current checkpoint
    Status {
        /// Checkpoint file location
        #[arg(long, default_value = "transfer_checkpoint.json")]
        checkpoint_file: PathBuf,
    },

    /// Delete the current checkpoint so the next transfer starts fresh
    Reset {
        /// Checkpoint file location
        #[arg(long, default_value = "transfer_checkpoint.json")]
        checkpoint_file: PathBuf,
    },

    /// List all your Spotify playlists
    ListPlaylists,

    /// Show track library match statistics
    LibraryStats {
        /// Track library file location
        #[arg(long, default_value = "track_library.jsonl")]
        library_file: PathBuf,

        /// Write tracks unavailable on Tidal to this file
        #[arg(long)]
        export_unavailable: Option<PathBuf>,
    },

    /// Show setup guide
    Setup,
}

fn setup_tracing(verbose: bool) {
    let filter = if verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::new("info")
    };

    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(filter)
        .init();
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    setup_tracing(cli.verbose);

    match cli.command {
        Commands::Transfer {
            fresh,
            sync_only,
            checkpoint_file,
            library_file,
            tidal_client_id,
            tidal_client_secret,
        } => {
            transfer(
                fresh,
                sync_only,
                &checkpoint_file,
                &library_file,
                &tidal_client_id,
                &tidal_client_secret,
            )
            .await?;
        }
        Commands::Status { checkpoint_file } => {
            status(&checkpoint_file)?;
        }
        Commands::Reset { checkpoint_file } => {
            reset(&checkpoint_file)?;
        }
        Commands::ListPlaylists => {
            list_playlists().await?;
        }
        Commands::LibraryStats {
            library_file,
            export_unavailable,
        } => {
            library_stats(&library_file, export_unavailable.as_deref())?;
        }
        Commands::Setup => {
            show_setup_guide();
        }
    }

    Ok(())
}

async fn transfer(
    fresh: bool,
    sync_only: bool,
    checkpoint_file: &Path,
    library_file: &Path,
    tidal_client_id: &str,
    tidal_client_secret: &str,
) -> Result<()> {
    println!("{}", "Spotify to Tidal Playlist Sync".cyan().bold());
    println!("{}", "=".repeat(50));

    let config = load_validated_config()?;

    let spotify = SpotifyClient::new(&config)
        .await
        .context("Failed to connect to Spotify")?;
    let tidal = TidalClient::new(tidal_client_id, tidal_client_secret)
        .await
        .context("Failed to connect to Tidal")?;

    let library = LibraryStore::open(library_file).context("Failed to open track library")?;
    let checkpoints = CheckpointStore::new(checkpoint_file);
    let log_dir = checkpoint_file.parent().unwrap_or(Path::new("."));
    let log = FileTransferLog::for_current_run(log_dir).context("Failed to open transfer log")?;
    println!("Transfer log: {}", log.path().display());

    let options = RunOptions {
        fresh_start: fresh,
        sync_only,
    };
    let mut engine = TransferEngine::new(
        spotify,
        tidal,
        library,
        checkpoints,
        Arc::new(log),
        SyncTuning::default(),
        options,
    );

    let summary = engine.run().await.context("Transfer failed")?;
    summary.print();

    println!("\n{}", engine.library().summary().cyan());

    Ok(())
}

fn status(checkpoint_file: &Path) -> Result<()> {
    println!("{}", "Checkpoint Status".cyan().bold());
    println!("{}", "=".repeat(50));

    let store = CheckpointStore::new(checkpoint_file);
    match store.read_summary().context("Failed to read checkpoint")? {
        Some(summary) => println!("{}", summary),
        None => println!(
            "{}",
            "No checkpoint found - the next transfer starts fresh".yellow()
        ),
    }

    Ok(())
}

fn reset(checkpoint_file: &Path) -> Result<()> {
    let store = CheckpointStore::new(checkpoint_file);
    if store.reset().context("Failed to delete checkpoint")? {
        println!("{}", "Checkpoint deleted".green());
    } else {
        println!("{}", "No checkpoint to delete".yellow());
    }

    Ok(())
}

async fn list_playlists() -> Result<()> {
    println!("{}", "Your Spotify Playlists".cyan().bold());
    println!("{}", "=".repeat(50));

    let config = load_validated_config()?;

    let spotify = SpotifyClient::new(&config)
        .await
        .context("Failed to connect to Spotify")?;

    let playlists = spotify
        .list_owned_playlists()
        .await
        .context("Failed to fetch playlists")?;

    if playlists.is_empty() {
        println!("{}", "No playlists found".yellow());
        return Ok(());
    }

    for (i, playlist) in playlists.iter().enumerate() {
        println!(
            "{:2}. {} ({} tracks)",
            i + 1,
            playlist.name.green(),
            playlist.track_count
        );
    }

    println!(
        "\n{}",
        format!("Total: {} playlists", playlists.len()).cyan()
    );

    Ok(())
}

fn library_stats(library_file: &Path, export_unavailable: Option<&Path>) -> Result<()> {
    println!("{}", "Track Library Statistics".cyan().bold());
    println!("{}", "=".repeat(50));

    let library = LibraryStore::open(library_file).context("Failed to open track library")?;

    if library.is_empty() {
        println!("{}", "Track library is empty".yellow());
        return Ok(());
    }

    let stats = library.compute_stats(None);
    println!("Total tracks: {}", stats.total());
    println!("Available on Tidal: {}", stats.available.to_string().green());
    println!(
        "Unavailable on Tidal: {}",
        stats.unavailable.to_string().red()
    );
    println!("Not yet searched: {}", stats.unknown.to_string().yellow());
    println!("Match rate: {:.1}%", stats.match_rate());

    if let Some(output) = export_unavailable {
        let count = library
            .export_unavailable(output)
            .context("Failed to export unavailable tracks")?;
        println!(
            "\nWrote {} unavailable tracks to {}",
            count,
            output.display()
        );
    }

    Ok(())
}

fn load_validated_config() -> Result<Config> {
    let config = Config::from_env().context("Failed to load configuration")?;

    let missing = config.get_missing_config();
    if !missing.is_empty() {
        println!("{}", "Missing configuration:".red());
        for item in &missing {
            println!("   - {}", item);
        }
        println!(
            "\n{}",
            "Please copy .env.example to .env and fill in your credentials.".yellow()
        );
        std::process::exit(1);
    }

    Ok(config)
}

fn show_setup_guide() {
    println!("{}", "Spotify to Tidal Sync Setup Guide".cyan().bold());
    println!("{}", "=".repeat(50));

    println!("\n{}", "1. Spotify API Setup".yellow());
    println!("   - Go to https://developer.spotify.com/dashboard/");
    println!("   - Create a new app");
    println!("   - Copy your Client ID and Client Secret");
    println!("   - Add 'http://127.0.0.1:8080/callback' as a redirect URI");

    println!("\n{}", "2. Tidal API Setup".yellow());
    println!("   - Go to https://developer.tidal.com/");
    println!("   - Create a new application");
    println!("   - Copy your Client ID and Client Secret");

    println!("\n{}", "3. Configuration".yellow());
    println!("   - Create a .env file with:");
    println!("     SPOTIFY_CLIENT_ID=your_spotify_client_id");
    println!("     SPOTIFY_CLIENT_SECRET=your_spotify_client_secret");
    println!("     SPOTIFY_REDIRECT_URI=http://127.0.0.1:8080/callback");
    println!("     TIDAL_CLIENT_ID=your_tidal_client_id");
    println!("     TIDAL_CLIENT_SECRET=your_tidal_client_secret");

    println!("\n{}", "4. Usage".yellow());
    println!("   - tidalsync list-playlists        (to see your playlists)");
    println!("   - tidalsync transfer              (to sync everything, resumable)");
    println!("   - tidalsync transfer --sync-only  (to skip already synced playlists)");
    println!("   - tidalsync status                (to inspect the checkpoint)");
    println!("   - tidalsync library-stats         (to see match statistics)");

    println!("\n{}", "Ready to start syncing!".green());
}
