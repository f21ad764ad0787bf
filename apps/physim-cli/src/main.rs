use anyhow::Context;
use clap::{Parser, Subcommand};
use physim_kernel::{EngineConfig, Session, SimulationState};
use physim_render::{DebugTextRenderer, RenderView, Renderer};
use physim_document::GenericNode;
use physim_schema::{SchemaDocument, Violation};
use std::path::{Path, PathBuf};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "physim", about = "Parse, validate and run physics scenarios")]
struct Cli {
    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Print engine version and crate info
    Info,
    /// Parse a scenario and print its tree as JSON
    Parse {
        file: PathBuf,
    },
    /// Check a scenario against a schema and list every violation
    Validate {
        file: PathBuf,
        /// JSON schema to use instead of the bundled scenario schema
        #[arg(short, long)]
        schema: Option<PathBuf>,
    },
    /// Load a scenario and step it
    Run {
        file: PathBuf,
        /// Number of steps to take
        #[arg(short = 'n', long, default_value = "60")]
        steps: u64,
        /// Step size in seconds (defaults to one fixed tick)
        #[arg(long)]
        dt: Option<f64>,
        /// Engine configuration (YAML)
        #[arg(short, long)]
        config: Option<PathBuf>,
        /// Print one JSON snapshot per line instead of text
        #[arg(long)]
        json: bool,
        /// Include energy diagnostics in text output
        #[arg(long)]
        energy: bool,
    },
}

fn read(path: &Path) -> anyhow::Result<String> {
    std::fs::read_to_string(path).with_context(|| format!("reading {}", path.display()))
}

fn load_schema(path: Option<&Path>) -> anyhow::Result<SchemaDocument> {
    let schema = match path {
        Some(path) => SchemaDocument::from_json_str(&read(path)?)
            .with_context(|| format!("compiling schema {}", path.display()))?,
        None => SchemaDocument::scenario()?,
    };
    Ok(schema)
}

/// One report line, with the offending value when the path resolves.
fn describe(violation: &Violation, tree: &GenericNode) -> anyhow::Result<String> {
    Ok(match tree.at(&violation.path) {
        Some(found) => format!("{violation} (found {})", serde_json::to_string(found)?),
        None => violation.to_string(),
    })
}

fn print_state(
    session: &Session,
    state: &SimulationState,
    renderer: &DebugTextRenderer,
    view: &RenderView,
    json: bool,
) -> anyhow::Result<()> {
    if json {
        println!("{}", serde_json::to_string(state)?);
    } else {
        print!("{}", renderer.render(session.world(), state, view));
    }
    Ok(())
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let filter = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(filter))
        .init();

    match cli.command {
        Commands::Info => {
            println!("physim v{}", env!("CARGO_PKG_VERSION"));
            println!("common: {}", physim_common::crate_info());
            println!("document: {}", physim_document::crate_info());
            println!("schema: {}", physim_schema::crate_info());
            println!("kernel: {}", physim_kernel::crate_info());
            println!("render: {}", physim_render::crate_info());
        }
        Commands::Parse { file } => {
            let tree = physim_document::parse(&read(&file)?)
                .with_context(|| format!("cannot open scenario {}", file.display()))?;
            println!("{}", serde_json::to_string_pretty(&tree)?);
        }
        Commands::Validate { file, schema } => {
            let schema = load_schema(schema.as_deref())?;
            let tree = physim_document::parse(&read(&file)?)
                .with_context(|| format!("cannot open scenario {}", file.display()))?;
            let report = physim_schema::validate(&tree, &schema);
            if report.is_valid() {
                println!("{}: OK", file.display());
            } else {
                for violation in report.iter() {
                    println!("{}", describe(violation, &tree)?);
                }
                anyhow::bail!("{}: {} violation(s)", file.display(), report.len());
            }
        }
        Commands::Run {
            file,
            steps,
            dt,
            config,
            json,
            energy,
        } => {
            let config = match config {
                Some(path) => EngineConfig::load(&path)
                    .with_context(|| format!("loading config {}", path.display()))?,
                None => EngineConfig::default(),
            };
            let schema = SchemaDocument::scenario()?;
            let mut session = Session::load(&read(&file)?, &schema, config)
                .with_context(|| format!("loading {}", file.display()))?;
            tracing::info!(steps, "running");

            let renderer = DebugTextRenderer { energy };
            let view = session
                .world()
                .bounds()
                .map(|b| RenderView::framing(b.rect))
                .unwrap_or_default();
            print_state(&session, session.state(), &renderer, &view, json)?;
            for _ in 0..steps {
                match dt {
                    Some(dt) => session.step_by(dt)?,
                    None => session.tick()?,
                };
                print_state(&session, session.state(), &renderer, &view, json)?;
            }
        }
    }

    Ok(())
}
