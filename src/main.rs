use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};

use micrograph_indexer::config::IndexerConfig;
use micrograph_indexer::data::filter;
use micrograph_indexer::data::index::ImageIndex;
use micrograph_indexer::data::loader;
use micrograph_indexer::data::model::{BucketTag, ImageId, ParsedFilename};
use micrograph_indexer::data::parser;
use micrograph_indexer::data::vocabulary::IdentifierToken;
use micrograph_indexer::slides;
use micrograph_indexer::state::SharedIndex;
use micrograph_indexer::IndexError;

#[derive(Parser)]
#[command(name = "micrograph-indexer")]
#[command(about = "Group microscope images by filename for slide generation", long_about = None)]
struct Cli {
    /// TOML config file
    #[arg(short, long, default_value = "indexer.toml", global = true)]
    config: PathBuf,

    /// Index state file (overrides the config)
    #[arg(short, long, global = true)]
    state: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Show how filenames are read, without indexing them
    Parse {
        filenames: Vec<String>,
    },

    /// Add every supported image under a folder to the index
    Scan {
        directory: PathBuf,
    },

    /// Add the images listed in a CSV or JSON manifest
    Import {
        manifest: PathBuf,
    },

    /// List groups in numeric order
    Groups,

    /// Show one group
    Group {
        key: String,
    },

    /// List grouped images of one type
    Type {
        identifier: IdentifierToken,
    },

    /// Search filenames, types and group keys
    Search {
        query: String,
    },

    /// Index statistics as JSON
    Stats,

    /// Slide plan as JSON
    Slides {
        /// Only these labels (e.g. 0001, MAP3, SPEC2)
        #[arg(short, long)]
        include: Vec<String>,
    },

    /// Move an image to another group (blank label removes the group)
    Regroup {
        id: u64,
        label: String,
    },

    /// Override an image's type
    Retype {
        id: u64,
        identifier: IdentifierToken,
    },

    /// Remove an image from the index
    Remove {
        id: u64,
    },

    /// Parse every stored filename again
    Reindex,
}

fn main() {
    env_logger::init();
    let cli = Cli::parse();

    if let Err(e) = run(cli) {
        eprintln!("Error: {e:#}");
        std::process::exit(1);
    }
}

fn run(cli: Cli) -> Result<()> {
    let config = IndexerConfig::load(&cli.config)?;
    let state_path = cli.state.unwrap_or_else(|| config.state_file.clone());

    match cli.command {
        Commands::Parse { filenames } => {
            for name in &filenames {
                print_parse(&parser::parse(name));
            }
            Ok(())
        }
        command => run_indexed(command, &config, &state_path),
    }
}

/// Commands that open the saved index. Edits are written back afterwards.
fn run_indexed(command: Commands, config: &IndexerConfig, state_path: &Path) -> Result<()> {
    let shared = SharedIndex::new(open_index(state_path)?);
    let mut dirty = true;

    match command {
        Commands::Scan { directory } => {
            let files = loader::scan_directory(&directory, config)?;
            let first = shared.next_id()?.0;
            for (offset, path) in (0u64..).zip(files) {
                let id = first.checked_add(offset).ok_or(IndexError::IdsExhausted)?;
                let name = path.to_string_lossy();
                let (parsed, outcome) = shared.ingest(ImageId(id), &name)?;
                print_parse(&parsed);
                if outcome.conflict {
                    println!("    ! {} already held an image of this type", outcome.placement);
                }
            }
        }
        Commands::Import { manifest } => {
            let records = loader::load_manifest(&manifest)?;
            let (filed, failed) = shared.ingest_all(&records)?;
            let conflicts = filed.iter().filter(|(_, o)| o.conflict).count();
            println!("{} filed, {conflicts} conflicts, {} rejected", filed.len(), failed.len());
            for (id, err) in failed {
                println!("    ! {id}: {err}");
            }
        }
        Commands::Regroup { id, label } => {
            let outcome = shared.regroup(ImageId(id), &label)?;
            println!("{id} → {}", outcome.placement);
        }
        Commands::Retype { id, identifier } => {
            let outcome = shared.retype(ImageId(id), identifier)?;
            println!("{id} → {}", outcome.placement);
        }
        Commands::Remove { id } => {
            let entry = shared.remove(ImageId(id))?;
            println!("removed {} ({})", entry.id, entry.filename());
        }
        Commands::Reindex => {
            let mut index = shared.snapshot()?;
            let changed = index.reparse_all();
            shared.import_state(index.export_state())?;
            println!("{changed} of {} images changed", index.len());
        }
        read_only => {
            dirty = false;
            report(&shared.snapshot()?, read_only)?;
        }
    }

    if dirty {
        loader::save_state(state_path, &shared.export_state()?)?;
    }
    Ok(())
}

fn open_index(path: &Path) -> Result<ImageIndex> {
    let state = loader::load_state_or_default(path)?;
    ImageIndex::from_state(state).with_context(|| format!("loading {}", path.display()))
}

fn report(index: &ImageIndex, command: Commands) -> Result<()> {
    match command {
        Commands::Groups => {
            for g in filter::list_groups(index) {
                let types: Vec<&str> = g.identifiers.iter().map(|t| t.name()).collect();
                println!(
                    "{:>8}  {} members [{}], {} ungrouped",
                    g.key.to_string(),
                    g.member_count,
                    types.join(" "),
                    g.ungrouped_count
                );
            }
            let unmatched = index.unmatched();
            if !unmatched.is_empty() {
                println!("{:>8}  {} images without a group", "-", unmatched.len());
            }
        }
        Commands::Group { key } => {
            let group = filter::require_group(index, &key)?;
            for entry in group.entries() {
                let tag = entry.parsed.identifier.map_or("unclassified", IdentifierToken::name);
                println!("{:>6}  {:<14}  {}", entry.id.to_string(), tag, entry.filename());
            }
        }
        Commands::Type { identifier } => {
            for (key, id) in filter::filter_by_type(index, identifier) {
                println!("{:>8}  {id}", key.to_string());
            }
            for id in filter::unmatched(index, BucketTag::Identifier(identifier)) {
                println!("{:>8}  {id}", "-");
            }
        }
        Commands::Search { query } => {
            for id in filter::search(index, &query) {
                if let Some(entry) = index.get(id) {
                    println!("{:>6}  {}", id.to_string(), entry.filename());
                }
            }
        }
        Commands::Stats => {
            println!("{}", serde_json::to_string_pretty(&filter::statistics(index))?);
        }
        Commands::Slides { include } => {
            let include = (!include.is_empty()).then_some(include);
            let plan = slides::plan_slides(index, include.as_deref());
            println!("{}", serde_json::to_string_pretty(&plan)?);
        }
        _ => {}
    }
    Ok(())
}

fn print_parse(parsed: &ParsedFilename) {
    println!(
        "{:<50} → group {:>6} | type {:<14} | {:?}",
        parsed.raw_name,
        parsed.group_key.as_ref().map_or("-".to_string(), |k| k.to_string()),
        parsed.identifier.map_or("-", IdentifierToken::name),
        parsed.confidence
    );
}
