use std::path::{Path, PathBuf};

use anyhow::Context;
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use tracker::config;
use tracker::writeback::{Controller, ControllerOptions};
use tracker_ontology::rdf;

#[derive(Parser)]
#[command(name = "tracker")]
#[command(about = "Desktop metadata indexer and search engine", version)]
struct Cli {
    /// Path to a tracker.toml configuration file
    #[arg(long, global = true)]
    config: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Backup indexed content
    Backup,

    /// Run the writeback daemon until it idles out
    Daemon {
        /// Seconds of idleness before exiting; 0 keeps the daemon alive
        #[arg(long)]
        shutdown_timeout: Option<u64>,
    },

    /// Import a data set into the index
    Import { files: Vec<PathBuf> },

    /// Show information known about local files or items indexed
    Info { items: Vec<String> },

    /// Build the ontology registry and write its persisted form
    Index {
        /// Directory holding .ontology source files
        #[arg(long, default_value = "ontologies")]
        ontology_dir: PathBuf,

        /// Where to write the registry dump
        #[arg(long)]
        output: Option<PathBuf>,
    },

    /// Reset the index and start over
    Reset {
        /// Remove the whole data directory, not just the registry dump
        #[arg(long)]
        hard: bool,
    },

    /// Restore the index from a previous backup
    Restore { input: Option<PathBuf> },

    /// Search the index by RDF class
    Search { terms: Vec<String> },

    /// Query and update the index using SPARQL
    Sparql { query: Option<String> },

    /// Show statistical information about indexed content
    Stats,

    /// Show the index status
    Status,

    /// Create, list or delete tags
    Tag { tags: Vec<String> },

    /// Show the version in use
    Version,
}

fn init_logging(config: &config::Config) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(config.logging.level.clone()));
    let builder = tracing_subscriber::fmt().with_env_filter(filter);
    if config.logging.format == "compact" {
        builder.compact().init();
    } else {
        builder.init();
    }
}

fn ontology_files(dir: &Path) -> anyhow::Result<Vec<PathBuf>> {
    let mut files: Vec<PathBuf> = std::fs::read_dir(dir)
        .with_context(|| format!("cannot read ontology directory {}", dir.display()))?
        .filter_map(|entry| entry.ok())
        .map(|entry| entry.path())
        .filter(|path| {
            matches!(
                path.extension().and_then(|e| e.to_str()),
                Some("ontology") | Some("ttl")
            )
        })
        .collect();
    // Ontology files apply in name order
    files.sort();
    Ok(files)
}

fn cmd_index(
    config: &config::Config,
    ontology_dir: &Path,
    output: Option<PathBuf>,
) -> anyhow::Result<()> {
    let files = ontology_files(ontology_dir)?;
    if files.is_empty() {
        anyhow::bail!("no ontology files found in {}", ontology_dir.display());
    }

    let registry = rdf::load_from_files(&files)?;

    let output = output.unwrap_or_else(|| {
        Path::new(&config.storage.data_dir).join("ontologies.json")
    });
    if let Some(parent) = output.parent() {
        std::fs::create_dir_all(parent)?;
    }
    registry.write_to(&output)?;

    println!(
        "Loaded {} classes, {} properties, {} namespaces from {} files",
        registry.classes().len(),
        registry.properties().len(),
        registry.namespaces().len(),
        files.len()
    );
    println!("Registry written to {}", output.display());
    Ok(())
}

fn cmd_daemon(config: &config::Config, shutdown_timeout: Option<u64>) -> anyhow::Result<()> {
    let mut options = ControllerOptions::from_config(&config.writeback);
    if let Some(timeout) = shutdown_timeout {
        options.shutdown_timeout = timeout;
    }

    let controller = Controller::start(options)?;
    tracing::info!("writeback daemon running (pid {})", std::process::id());
    controller.wait();

    std::process::exit(0);
}

fn cmd_reset(config: &config::Config, hard: bool) -> anyhow::Result<()> {
    let data_dir = Path::new(&config.storage.data_dir);

    if hard {
        if data_dir.exists() {
            std::fs::remove_dir_all(data_dir)?;
            println!("Removed {}", data_dir.display());
        }
        return Ok(());
    }

    let dump = data_dir.join("ontologies.json");
    if dump.exists() {
        std::fs::remove_file(&dump)?;
        println!("Removed {}", dump.display());
    }
    Ok(())
}

fn not_implemented(what: &str) -> anyhow::Result<()> {
    eprintln!("tracker: '{what}' is not available in this build");
    Ok(())
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let config = config::load(cli.config.as_deref())?;
    init_logging(&config);

    match cli.command {
        Commands::Index {
            ontology_dir,
            output,
        } => cmd_index(&config, &ontology_dir, output),
        Commands::Daemon { shutdown_timeout } => cmd_daemon(&config, shutdown_timeout),
        Commands::Reset { hard } => cmd_reset(&config, hard),
        Commands::Version => {
            println!("tracker {}", env!("CARGO_PKG_VERSION"));
            Ok(())
        }
        Commands::Backup => not_implemented("backup"),
        Commands::Import { .. } => not_implemented("import"),
        Commands::Info { .. } => not_implemented("info"),
        Commands::Restore { .. } => not_implemented("restore"),
        Commands::Search { .. } => not_implemented("search"),
        Commands::Sparql { .. } => not_implemented("sparql"),
        Commands::Stats => not_implemented("stats"),
        Commands::Status => not_implemented("status"),
        Commands::Tag { .. } => not_implemented("tag"),
    }
}
