use std::path::PathBuf;

use clap::{Parser, Subcommand};
use lemuria_assets::AvatarCatalog;
use lemuria_render::DebugTextRenderer;
use lemuria_scene::{ClientConfig, LocalSession, SceneLoop};
use lemuria_tools::{DemoWorld, SceneInspector, demo_loader};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "lemuria-cli", about = "CLI tool for the Lemuria client core")]
struct Cli {
    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    /// Client config file (JSON)
    #[arg(long)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Print version and the effective client config
    Info,
    /// Run the demo world headless and print the last frame
    Simulate {
        /// Number of ticks to run
        #[arg(short, long, default_value = "120")]
        ticks: u64,
        /// Instances per pool, overriding the config
        #[arg(short, long)]
        capacity: Option<u32>,
        /// Side of the tree grid
        #[arg(short, long, default_value = "8")]
        grid: u32,
        /// Remote users walking around
        #[arg(short, long, default_value = "3")]
        users: usize,
        /// Hold the forward key for the whole run
        #[arg(long)]
        walk: bool,
    },
    /// List the avatars of an avatars.dat catalog
    Avatars {
        /// Path to avatars.dat
        file: PathBuf,
    },
}

/// Frames per second the headless run pretends to render at.
const SIM_RATE: f32 = 60.0;
/// Ticks between two transport snapshots.
const SNAPSHOT_EVERY: u64 = 30;

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let filter = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(filter))
        .init();

    let config = match &cli.config {
        Some(path) => ClientConfig::load(path)?,
        None => ClientConfig::default(),
    };

    match cli.command {
        Commands::Info => {
            println!("lemuria-cli v{}", env!("CARGO_PKG_VERSION"));
            println!("{}", config.to_json()?);
        }
        Commands::Simulate {
            ticks,
            capacity,
            grid,
            users,
            walk,
        } => {
            let config = ClientConfig {
                pool_capacity: capacity.unwrap_or(config.pool_capacity),
                ..config
            };
            simulate(config, ticks, grid, users, walk)?;
        }
        Commands::Avatars { file } => {
            let catalog = AvatarCatalog::load(&file)?;
            println!("{} avatars in {}", catalog.len(), file.display());
            for (index, entry) in catalog.entries().iter().enumerate() {
                println!("  {index:>3}  {:<20} {}", entry.name, entry.geometry);
            }
        }
    }

    Ok(())
}

fn simulate(config: ClientConfig, ticks: u64, grid: u32, users: usize, walk: bool) -> anyhow::Result<()> {
    println!("Simulating {ticks} ticks: grid={grid}x{grid} users={users} capacity={}", config.pool_capacity);

    let session = LocalSession::logged_in("cli");
    let (mut scene, mut token) = SceneLoop::create_scene(&session, config, (1280, 720), demo_loader())?;
    let world = DemoWorld::new(grid, users, &[]);
    for command in world.populate() {
        scene.enqueue(command);
    }
    if walk {
        scene.input_mut().handle_key("ArrowUp", true);
    }

    let mut renderer = DebugTextRenderer::new();
    let mut last_frame = String::new();
    let mut rejected = 0;
    for tick in 0..ticks {
        if tick % SNAPSHOT_EVERY == 0 {
            for command in world.snapshots(tick as f32 / SIM_RATE) {
                scene.enqueue(command);
            }
        }
        let report = scene.advance(token, 1.0 / SIM_RATE, &mut renderer)?;
        for rejection in &report.rejections {
            println!("rejected {} ({}): {}", rejection.id, rejection.asset, rejection.error);
        }
        rejected += report.rejections.len();
        token = report.next;
        last_frame = report.output;
    }

    print!("{last_frame}");
    println!("{}", SceneInspector::summary(&scene));
    println!("Uploads: {}  Rejected spawns: {rejected}", renderer.uploads());

    scene.teardown();
    Ok(())
}
