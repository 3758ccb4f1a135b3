//! CLI tool to edit truck side layouts stored in an Automerge file.
//!
//! Usage:
//!   sidelayout --store truck.automerge import --input layout.json
//!   sidelayout --store truck.automerge add-door --side left
//!   sidelayout --store truck.automerge mirror --from left --to right
//!   sidelayout --store truck.automerge export --side right --output-dir drawings/

mod input;

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing::info;

use input::InputLayout;
use sidelayout::layout::SystemClock;
use sidelayout::{EngineConfig, LayoutChange, LayoutEngine, LayoutStore, Side, Transfer};

#[derive(Parser, Debug)]
#[command(
    name = "sidelayout",
    about = "Plan door layouts of truck body sides and export drawings",
    version
)]
struct Args {
    /// Automerge store file (created on first write)
    #[arg(short, long, env = "SIDELAYOUT_STORE")]
    store: PathBuf,

    /// JSON engine config (partial, camelCase keys)
    #[arg(short, long)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Import side snapshots from a JSON file
    Import {
        #[arg(short, long)]
        input: PathBuf,
    },
    /// Print the segments of a side
    Show {
        #[arg(long, value_parser = parse_side)]
        side: Side,
    },
    /// Add a door to a side using the automatic placement
    AddDoor {
        #[arg(long, value_parser = parse_side)]
        side: Side,
        /// Door width in cm (defaults to the configured width)
        #[arg(long)]
        width: Option<f64>,
        /// Door opening height in cm (defaults to the configured height)
        #[arg(long)]
        height: Option<f64>,
    },
    /// Copy one side's layout onto another
    Copy {
        #[arg(long, value_parser = parse_side)]
        from: Side,
        #[arg(long, value_parser = parse_side)]
        to: Side,
    },
    /// Mirror one side's layout onto another
    Mirror {
        #[arg(long, value_parser = parse_side)]
        from: Side,
        #[arg(long, value_parser = parse_side)]
        to: Side,
    },
    /// Write the SVG drawing of a side
    Export {
        #[arg(long, value_parser = parse_side)]
        side: Side,
        #[arg(short, long, default_value = ".")]
        output_dir: PathBuf,
        /// Prefix for the file name, usually the task name
        #[arg(long)]
        prefix: Option<String>,
    },
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "sidelayout=info".into()),
        )
        .init();

    let args = Args::parse();

    // 1. Load config
    let mut config = match &args.config {
        Some(path) => {
            let json = std::fs::read_to_string(path).context("Failed to read config file")?;
            EngineConfig::from_json(&json).context("Failed to parse config")?
        }
        None => EngineConfig::default(),
    };

    if let Command::Export { prefix: Some(prefix), .. } = &args.command {
        config = config.with_task_prefix(prefix.clone());
    }

    // 2. Open the store
    let store = open_store(&args.store)?;

    // 3. Run the command
    match args.command {
        Command::Import { input } => import(store, &input, &args.store),
        command => run(store, config, command, &args.store),
    }
}

fn open_store(path: &Path) -> Result<LayoutStore> {
    if path.exists() {
        let bytes = std::fs::read(path).context("Failed to read store file")?;
        LayoutStore::from_bytes(&bytes).context("Failed to load store")
    } else {
        LayoutStore::new().context("Failed to create store")
    }
}

fn write_store(store: &mut LayoutStore, path: &Path) -> Result<()> {
    std::fs::write(path, store.save()).context("Failed to write store file")?;
    info!(path = %path.display(), "store saved");
    Ok(())
}

fn import(mut store: LayoutStore, input: &Path, store_path: &Path) -> Result<()> {
    let json = std::fs::read_to_string(input).context("Failed to read input file")?;
    let layout: InputLayout = serde_json::from_str(&json).context("Failed to parse JSON")?;

    let version = store.version().context("Failed to read store")? + 1;
    let snapshots = layout.snapshots();
    if snapshots.is_empty() {
        anyhow::bail!("No side with layoutSections in {}", input.display());
    }
    for (side, snapshot) in snapshots {
        store
            .put_change(&LayoutChange { side, version, snapshot })
            .with_context(|| format!("Failed to store side {}", side))?;
        println!("Imported {}", side);
    }
    write_store(&mut store, store_path)
}

fn run(mut store: LayoutStore, config: EngineConfig, command: Command, store_path: &Path) -> Result<()> {
    let snapshots = store.snapshots().context("Failed to read store")?;
    let mut engine = LayoutEngine::with_clock(store, SystemClock, config);
    engine
        .load_snapshots(snapshots)
        .context("Failed to load snapshots")?;

    let modified = match command {
        Command::Import { .. } => anyhow::bail!("import does not run against the engine"),
        Command::Show { side } => {
            show(&engine, side);
            false
        }
        Command::AddDoor { side, width, height } => {
            engine.select_side(side).context("Failed to select side")?;
            let width = width.unwrap_or(engine.config().door_width);
            let height = height.unwrap_or(engine.config().door_height);
            let id = engine
                .add_door_with(width, height)
                .context("Failed to add door")?;
            if let Some(door) = engine.state(side).door(&id) {
                println!("Added door {} at {} cm ({} cm wide)", door.id, door.position, door.width);
            }
            true
        }
        Command::Copy { from, to } => {
            engine
                .transfer(from, to, Transfer::Copy)
                .context("Failed to copy side")?;
            println!("Copied {} onto {}", from, to);
            true
        }
        Command::Mirror { from, to } => {
            engine
                .transfer(from, to, Transfer::Mirror)
                .context("Failed to mirror side")?;
            println!("Mirrored {} onto {}", from, to);
            true
        }
        Command::Export { side, output_dir, .. } => {
            let file = engine.export_file(side).context("Failed to render drawing")?;
            std::fs::create_dir_all(&output_dir).context("Failed to create output directory")?;
            let path = output_dir.join(&file.file_name);
            std::fs::write(&path, &file.contents).context("Failed to write drawing")?;
            println!("Wrote {}", path.display());
            false
        }
    };

    if let Some(error) = engine.last_save_error() {
        anyhow::bail!("Failed to persist change: {}", error);
    }
    if modified {
        write_store(engine.sink_mut(), store_path)?;
    }
    Ok(())
}

fn show(engine: &LayoutEngine<LayoutStore>, side: Side) {
    let state = engine.state(side);
    println!(
        "{} ({}): {} x {} cm, {} door(s)",
        side.label(),
        side,
        state.total_width,
        state.height,
        state.doors.len()
    );
    for (index, segment) in engine.segments(side).iter().enumerate() {
        let kind = if segment.is_door() { "door" } else { "panel" };
        print!(
            "  {:>2}  {:<5} {:>7} .. {:<7} width {}",
            index, kind, segment.start, segment.end, segment.width
        );
        match &segment.door {
            Some(door) => println!("  height {}", door.door_height),
            None => println!(),
        }
    }
}

fn parse_side(value: &str) -> Result<Side, String> {
    value.parse::<Side>().map_err(|e| e.to_string())
}
