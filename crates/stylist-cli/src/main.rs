//! Virtual Stylist CLI
//!
//! Main entry point for generating styled outfits from a clothing photo.

use std::net::SocketAddr;
use std::path::Path;
use std::process::ExitCode;
use std::sync::Arc;

use clap::Parser;
use stylist_genai::{GeminiClient, OutfitStyle};
use stylist_orchestrator::{
    api_key_from_env, create_router, gallery, AppState, Config, EditDecision, OutfitSlot,
    SlotStatus, Studio, StudioEvent, StudioSnapshot,
};
use tokio::net::TcpListener;
use tokio::sync::broadcast::{
    self,
    error::{RecvError, TryRecvError},
};
use tracing_subscriber::EnvFilter;

/// Default port for the HTTP API server.
const DEFAULT_PORT: u16 = 3000;

/// Virtual Stylist - AI Outfit Generator
///
/// Renders a 3D fashion model wearing the uploaded clothing item in three
/// styles (Casual, Business, Night Out), with optional text edits per style.
#[derive(Parser, Debug)]
#[command(name = "stylist")]
#[command(version, about, long_about = None)]
struct Args {
    /// Path to the clothing photo (JPG, PNG, WEBP or GIF)
    #[arg(value_name = "IMAGE")]
    image: Option<String>,

    /// Path to configuration file (default: stylist.json in current directory)
    #[arg(short, long, value_name = "FILE")]
    config: Option<String>,

    /// Output directory for generated outfits
    #[arg(short, long, value_name = "DIR")]
    output_dir: Option<String>,

    /// Enable verbose output (sets log level to debug)
    #[arg(short, long)]
    verbose: bool,

    /// Port for the HTTP API server
    #[arg(short, long, default_value_t = DEFAULT_PORT)]
    port: u16,

    /// Serve the HTTP/WebSocket API instead of running a single batch
    #[arg(long)]
    serve: bool,

    /// Edit a generated outfit after generation, e.g. `casual="add a hat"`
    #[arg(long = "edit", value_name = "STYLE=INSTRUCTION", value_parser = parse_edit)]
    edits: Vec<(OutfitStyle, String)>,
}

#[tokio::main]
async fn main() -> ExitCode {
    let args = Args::parse();

    // Priority: RUST_LOG env var > --verbose flag > default (info)
    let filter = if args.verbose {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("debug"))
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
    };

    tracing_subscriber::fmt().with_env_filter(filter).init();

    tracing::info!("Virtual Stylist starting");
    tracing::debug!(config = ?args.config, "Config file");
    tracing::debug!(output_dir = ?args.output_dir, "Output directory");

    match run(args).await {
        Ok(true) => ExitCode::SUCCESS,
        Ok(false) => ExitCode::from(1),
        Err(e) => {
            eprintln!("Error: {e}");
            ExitCode::from(1)
        }
    }
}

/// Runs one session.
///
/// Returns `Ok(false)` when a batch finished but not every outfit succeeded.
async fn run(args: Args) -> anyhow::Result<bool> {
    let mut config = load_config(args.config.as_deref())?;

    if let Some(ref output_dir) = args.output_dir {
        config.output_dir.clone_from(output_dir);
    }

    // Re-validate after overrides
    config.validate()?;

    print_config(&config);

    // The credential is read once and handed to the single client
    let api_key = api_key_from_env()?;
    let client = GeminiClient::new(config.gemini_options(api_key))?;
    let studio = Studio::new(Arc::new(client), &config);

    if args.serve {
        if let Some(ref image) = args.image {
            let snapshot = studio.upload_file(image)?;
            print_upload(&snapshot);
        }
        serve(config, studio, args.port).await?;
        return Ok(true);
    }

    let Some(image) = args.image else {
        anyhow::bail!(
            "No image given\n\nSuggestion: Pass a clothing photo (e.g. `stylist jacket.jpg`) or start the API with --serve"
        );
    };

    run_batch(&config, &studio, &image, &args.edits).await
}

/// Uploads, generates every style, applies edits, and exports the gallery.
async fn run_batch(
    config: &Config,
    studio: &Studio,
    image: &str,
    edits: &[(OutfitStyle, String)],
) -> anyhow::Result<bool> {
    let snapshot = studio.upload_file(image)?;
    print_upload(&snapshot);

    // Subscribe before dispatching so no result is missed
    let mut events = studio.broadcaster().subscribe();

    println!();
    println!("Generating outfits...");
    println!("Press Ctrl+C to stop");
    studio.generate_all()?;
    let mut snapshot = watch_until_settled(studio, &mut events).await?;

    for (style, instruction) in edits {
        println!();
        println!("Editing {style}: {instruction}");
        match studio.edit_outfit(*style, instruction) {
            EditDecision::Dispatched => {
                snapshot = watch_until_settled(studio, &mut events).await?;
            }
            EditDecision::EmptyInstruction => println!("  Skipped: empty instruction"),
            EditDecision::NoImage => println!("  Skipped: no {style} outfit to edit"),
            EditDecision::Busy => println!("  Skipped: {style} is still generating"),
        }
    }

    println!();
    let manifest = gallery::export(&snapshot, Path::new(&config.output_dir))?;
    println!(
        "Saved {} outfit(s) to {}",
        manifest.written(),
        config.output_dir
    );

    println!();
    print_summary(&snapshot);

    Ok(snapshot.outfits.all_succeeded())
}

/// Prints each outfit as it resolves until no style is generating.
async fn watch_until_settled(
    studio: &Studio,
    events: &mut broadcast::Receiver<StudioEvent>,
) -> anyhow::Result<StudioSnapshot> {
    loop {
        let snapshot = studio.snapshot();
        if !snapshot.outfits.any_busy() {
            // The last result commits before its event is read.
            for slot in drain_updates(events) {
                print_slot(&slot);
            }
            return Ok(snapshot);
        }

        tokio::select! {
            Ok(()) = tokio::signal::ctrl_c() => {
                tracing::info!("Received Ctrl+C, shutting down");
                anyhow::bail!("Interrupted while outfits were generating");
            }
            event = events.recv() => {
                match event {
                    Ok(StudioEvent::OutfitUpdated(payload)) => print_slot(&payload.slot),
                    Ok(_) => {}
                    Err(RecvError::Lagged(n)) => {
                        tracing::warn!(missed = n, "Missed studio events");
                    }
                    Err(RecvError::Closed) => return Ok(studio.snapshot()),
                }
            }
        }
    }
}

/// Takes the slots announced by events already queued on `events`.
fn drain_updates(events: &mut broadcast::Receiver<StudioEvent>) -> Vec<OutfitSlot> {
    let mut slots = Vec::new();
    loop {
        match events.try_recv() {
            Ok(StudioEvent::OutfitUpdated(payload)) => slots.push(payload.slot),
            Ok(_) => {}
            Err(TryRecvError::Lagged(n)) => {
                tracing::warn!(missed = n, "Missed studio events");
            }
            Err(TryRecvError::Empty | TryRecvError::Closed) => return slots,
        }
    }
}

/// Serves the HTTP/WebSocket API until Ctrl+C.
async fn serve(config: Config, studio: Studio, port: u16) -> anyhow::Result<()> {
    let addr: SocketAddr = ([127, 0, 0, 1], port).into();
    println!();
    println!("Starting HTTP API server on {addr}...");

    let router = create_router(AppState::new(config, studio));
    let listener = TcpListener::bind(addr).await.map_err(|e| {
        anyhow::anyhow!(
            "Failed to bind to {addr}: {e}\n\nSuggestion: Try a different port with --port"
        )
    })?;

    println!("HTTP API server running on http://{addr}");
    println!("Press Ctrl+C to stop");

    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    println!("Server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::warn!(error = %e, "Failed to listen for Ctrl+C");
        std::future::pending::<()>().await;
    }
    tracing::info!("Received Ctrl+C, shutting down");
}

/// Loads configuration from the specified path or default location.
fn load_config(config_path: Option<&str>) -> anyhow::Result<Config> {
    match config_path {
        Some(path_str) => {
            let path = Path::new(path_str);
            if !path.exists() {
                anyhow::bail!(
                    "Config file not found: '{}'\n\nSuggestion: Check the path or remove the --config flag to use defaults",
                    path.display()
                );
            }
            Config::load_from_file(path).map_err(|e| anyhow::anyhow!("{e}"))
        }
        None => Config::load().map_err(|e| anyhow::anyhow!("{e}")),
    }
}

/// Parses a `STYLE=INSTRUCTION` pair for `--edit`.
fn parse_edit(value: &str) -> Result<(OutfitStyle, String), String> {
    let (style, instruction) = value
        .split_once('=')
        .ok_or_else(|| format!("expected STYLE=INSTRUCTION, got '{value}'"))?;
    let style = style.parse::<OutfitStyle>().map_err(|e| e.to_string())?;
    Ok((style, instruction.to_string()))
}

/// Prints the loaded configuration.
fn print_config(config: &Config) {
    println!("Configuration loaded:");
    println!("  Model: {}", config.model);
    println!("  API base URL: {}", config.api_base_url);
    println!("  Output directory: {}", config.output_dir);
    println!("  Max upload size: {} KB", config.max_upload_bytes / 1024);
}

/// Prints details of the uploaded image.
fn print_upload(snapshot: &StudioSnapshot) {
    if let Some(upload) = &snapshot.upload {
        println!();
        println!("Image uploaded:");
        println!(
            "  Source: {}",
            upload.source.as_deref().unwrap_or("<upload>")
        );
        println!("  Format: {}", upload.format);
        println!("  Size: {} bytes", upload.size_bytes);
    }
}

/// Prints one resolved outfit.
fn print_slot(slot: &OutfitSlot) {
    match slot.status {
        SlotStatus::Success => println!("  {}: ready", slot.style),
        SlotStatus::Error => println!(
            "  {}: {}",
            slot.style,
            slot.error_message.as_deref().unwrap_or("failed")
        ),
        SlotStatus::Idle | SlotStatus::Generating => {
            tracing::debug!(style = %slot.style, status = %slot.status, "Outfit pending");
        }
    }
}

/// Prints a summary of every outfit.
fn print_summary(snapshot: &StudioSnapshot) {
    println!("=== Virtual Stylist Summary ===");
    for slot in snapshot.outfits.iter() {
        println!("{:<10} {}", slot.style.label(), slot.status);
    }

    let succeeded = snapshot
        .outfits
        .iter()
        .filter(|slot| slot.status == SlotStatus::Success)
        .count();
    println!("Succeeded: {succeeded}/{}", OutfitStyle::ALL.len());
}
