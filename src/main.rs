//! semantica CLI: transfer-path tracing over a SPARQL store.

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use miette::{IntoDiagnostic, Result};

use semantica::config::SemanticaConfig;
use semantica::engine::Engine;
use semantica::graph::BoundTerm;
use semantica::paths::SemanticaPaths;
use semantica::trace::TraceParams;
use semantica::transfer::PathCollection;

#[derive(Parser)]
#[command(name = "semantica", version, about = "Trace token transfer paths in a SPARQL store")]
struct Cli {
    /// Config file (defaults to $XDG_CONFIG_HOME/semantica/semantica.toml).
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Remote SPARQL endpoint URL; overrides the config and the embedded store.
    #[arg(long, global = true)]
    endpoint: Option<String>,

    /// Root directory for config and store, instead of the XDG locations.
    #[arg(long, global = true)]
    data_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create the data directory and a default config file.
    Init,

    /// Load transfers from a JSON file into the embedded store.
    Ingest {
        /// JSON array of transfer records.
        #[arg(long)]
        file: PathBuf,
    },

    /// Trace transfer paths.
    Trace {
        /// Hops to follow after each seed transfer.
        #[arg(long)]
        max_depth: Option<i64>,

        /// Maximum number of paths to return.
        #[arg(long)]
        max_total_paths: Option<i64>,

        /// Origin party (requires --contract-address).
        #[arg(long)]
        start_party: Option<String>,

        /// Token contract (requires --start-party).
        #[arg(long)]
        contract_address: Option<String>,

        /// Print the paths as JSON.
        #[arg(long)]
        json: bool,
    },

    /// Run a raw SELECT query and print the rows.
    Sparql {
        /// SPARQL SELECT query text.
        query: String,
    },

    /// Show backend info.
    Info,
}

fn main() -> Result<()> {
    miette::set_hook(Box::new(|_| {
        Box::new(
            miette::MietteHandlerOpts::new()
                .terminal_links(true)
                .unicode(true)
                .context_lines(3)
                .build(),
        )
    }))
    .ok(); // Ignore error if hook already set (e.g., in tests)

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    let paths = match &cli.data_dir {
        Some(dir) => SemanticaPaths::rooted_at(dir),
        None => SemanticaPaths::resolve()?,
    };
    let config_path = cli.config.clone().unwrap_or_else(|| paths.config_file());

    let mut config = SemanticaConfig::load(&config_path)?;
    config.apply_env()?;
    if let Some(endpoint) = cli.endpoint {
        config.store.endpoint = Some(endpoint);
    }
    if let Some(dir) = &cli.data_dir {
        config.store.data_dir = Some(paths.store_dir());
        tracing::debug!(root = %dir.display(), "using explicit data directory");
    }

    match cli.command {
        Commands::Init => {
            paths.ensure_dirs()?;
            if !config_path.exists() {
                config.save(&config_path)?;
                println!("Wrote default config to {}", config_path.display());
            }
            let engine = Engine::new(config, &paths)?;
            println!("Initialized semantica at {}", paths.data_dir.display());
            println!("{}", engine.info()?);
        }

        Commands::Ingest { file } => {
            let engine = Engine::new(config, &paths)?;
            let count = engine.ingest_file(&file)?;
            println!("Ingested {count} transfers from {}", file.display());
            println!("{}", engine.info()?);
        }

        Commands::Trace {
            max_depth,
            max_total_paths,
            start_party,
            contract_address,
            json,
        } => {
            let engine = Engine::new(config, &paths)?;
            let params = TraceParams {
                max_depth,
                max_total_paths,
                start_party,
                contract_address,
            };
            let found = engine.trace_params(&params)?;
            if json {
                println!("{}", serde_json::to_string_pretty(&found).into_diagnostic()?);
            } else {
                print_paths(&found);
            }
        }

        Commands::Sparql { query } => {
            let engine = Engine::new(config, &paths)?;
            let outcome = engine.sparql(&query)?;
            for row in &outcome.data {
                let cells: Vec<String> = row
                    .iter()
                    .map(|(var, term)| match term {
                        BoundTerm::Iri { value } => format!("?{var}=<{value}>"),
                        BoundTerm::Bnode { value } => format!("?{var}=_:{value}"),
                        BoundTerm::Literal { value, .. } => format!("?{var}={value:?}"),
                    })
                    .collect();
                println!("{}", cells.join("  "));
            }
            println!("{} rows in {}", outcome.data.len(), outcome.execution_time());
        }

        Commands::Info => {
            let engine = Engine::new(config, &paths)?;
            println!("{}", engine.info()?);
        }
    }

    Ok(())
}

fn print_paths(found: &PathCollection) {
    if found.is_empty() {
        println!("No transfer paths found.");
        return;
    }
    println!(
        "{} paths, {} transfers:",
        found.len(),
        found.transfer_count()
    );
    for (i, path) in found.iter().enumerate() {
        println!("  path {} ({} hops):", i + 1, path.hops());
        for record in path.records() {
            println!(
                "    {} {} -> {} amount={} contract={} tx={}",
                record.timestamp,
                record.from,
                record.to,
                record.amount,
                record.contract_address,
                record.tx
            );
        }
    }
}
