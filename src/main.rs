use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing_subscriber::EnvFilter;
use workshop_filter::config::FilterConfig;
use workshop_filter::core::{
    copy_filtered, default_patterns_as_text, expand_includes, list_filtered_relative_paths_async,
    ContentFilter,
};

#[derive(Parser, Debug)]
#[command(name = "workshop-filter", version, about = "Filter and stage workshop content folders")]
struct Cli {
    /// `;`-separated exclusion patterns, overriding the configuration file
    #[arg(long, global = true)]
    patterns: Option<String>,

    /// Configuration file to use instead of the platform default
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// List the files of a content folder that would be published
    List {
        root: PathBuf,
        /// Print the listing as a JSON array
        #[arg(long)]
        json: bool,
    },
    /// Tell for each relative path whether it would be published
    Check {
        root: PathBuf,
        #[arg(required = true)]
        paths: Vec<String>,
    },
    /// Copy the publishable files of a folder into another folder
    Copy { source: PathBuf, destination: PathBuf },
    /// Stage a filtered copy for an item, print where it went, then clean it up
    Stage {
        item_id: String,
        source: PathBuf,
        /// Leave the staged copy on disk
        #[arg(long)]
        keep: bool,
    },
    /// Expand @include("...") lines of a text file
    Expand {
        file: PathBuf,
        /// Directory include paths are resolved against (defaults to the file's directory)
        #[arg(long)]
        root: Option<PathBuf>,
    },
    /// Print the built-in exclusion patterns
    Defaults,
}

fn load_config(cli: &Cli) -> FilterConfig {
    let mut config = match FilterConfig::load(cli.config.as_deref()) {
        Ok(config) => config,
        Err(e) => {
            tracing::warn!("Could not load configuration ({}), using defaults", e);
            FilterConfig::default()
        }
    };
    if let Some(patterns) = &cli.patterns {
        config.excluded_patterns = patterns.clone();
    }
    config
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    let config = load_config(&cli);
    let filter = Arc::new(config.build_filter());

    match cli.command {
        Command::List { root, json } => {
            let listing = list_filtered_relative_paths_async(Arc::clone(&filter), root).await?;
            if json {
                println!("{}", serde_json::to_string_pretty(&listing)?);
            } else {
                for path in listing {
                    println!("{path}");
                }
            }
        }
        Command::Check { root, paths } => {
            for path in paths {
                let verdict = if filter.should_include(&path, Some(&root)) {
                    "include"
                } else {
                    "exclude"
                };
                println!("{verdict}\t{path}");
            }
        }
        Command::Copy {
            source,
            destination,
        } => {
            let summary = copy_filtered(&filter, &source, &destination)
                .with_context(|| format!("copying {} to {}", source.display(), destination.display()))?;
            println!("{}", serde_json::to_string_pretty(&summary)?);
        }
        Command::Stage {
            item_id,
            source,
            keep,
        } => stage(&config, filter, &item_id, &source, keep)?,
        Command::Expand { file, root } => {
            let text = fs::read_to_string(&file)
                .with_context(|| format!("reading {}", file.display()))?;
            let root = root
                .or_else(|| file.parent().map(PathBuf::from))
                .unwrap_or_default();
            print!("{}", expand_includes(&text, &root));
        }
        Command::Defaults => println!("{}", default_patterns_as_text()),
    }

    Ok(())
}

fn stage(
    config: &FilterConfig,
    filter: Arc<ContentFilter>,
    item_id: &str,
    source: &Path,
    keep: bool,
) -> Result<()> {
    let manager = config.build_staging_manager(filter);
    let Some(context) = manager.enter(Some(item_id), source) else {
        anyhow::bail!("could not stage {}; see the log for details", source.display());
    };

    let staged = manager.resolve_content_folder(item_id, Some(&context), source);
    manager.exit(context);

    if let Some(record) = manager.record(item_id) {
        println!("{}", serde_json::to_string_pretty(&record)?);
    } else {
        println!("{}", staged.display());
    }

    if !keep {
        let summary = manager.cleanup_all();
        tracing::info!("Cleanup: {:?}", summary);
    }
    Ok(())
}
