//! Command-line interface for assetline.
//!
//! Provides commands for tracking assets through the pipeline, editing the
//! dependency graph, importing folders and inspecting stored state.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing::debug;

use crate::config;
use crate::core::{seed_demo_assets, FileSlot, PipelineEngine};
use crate::domain::{Asset, AssetPatch, NewAsset, DEFAULT_HISTORY_LIMIT};
use crate::ingest::{import_files, FolderScanner};

/// assetline - Track 3D game assets through a production pipeline
#[derive(Parser, Debug)]
#[command(name = "assetline")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Register a new asset
    Add {
        /// Display name
        name: String,

        /// Asset type id (defaults to the pipeline default)
        #[arg(short = 't', long = "type")]
        asset_type: Option<String>,

        /// Starting stage id (defaults to the first stage)
        #[arg(short, long)]
        stage: Option<String>,

        /// Free-form notes
        #[arg(short, long)]
        notes: Option<String>,

        /// Asset ids this asset depends on
        #[arg(short, long = "depends-on")]
        depends_on: Vec<String>,
    },

    /// List assets
    List {
        /// Only show assets in this stage
        #[arg(short, long)]
        stage: Option<String>,
    },

    /// Show details of an asset
    Show {
        /// Asset ID
        id: String,
    },

    /// Move an asset to the next stage
    Advance {
        /// Asset ID
        id: String,
    },

    /// Move an asset to a specific stage
    Move {
        /// Asset ID
        id: String,

        /// Target stage id
        stage: String,

        /// Skip the transition rules
        #[arg(short, long)]
        force: bool,
    },

    /// Check whether a move is allowed
    CanMove {
        /// Asset ID
        id: String,

        /// Target stage id
        stage: String,
    },

    /// Edit an asset's descriptive fields
    Update {
        /// Asset ID
        id: String,

        #[arg(long)]
        name: Option<String>,

        #[arg(short = 't', long = "type")]
        asset_type: Option<String>,

        #[arg(short, long)]
        notes: Option<String>,

        /// Metadata as key=value (replaces all metadata)
        #[arg(short, long = "meta")]
        meta: Vec<String>,
    },

    /// Delete an asset
    Delete {
        /// Asset ID
        id: String,
    },

    /// Add a dependency edge
    Depend {
        /// Dependent asset ID
        id: String,

        /// Asset it depends on
        on: String,
    },

    /// Remove a dependency edge
    Undepend {
        /// Dependent asset ID
        id: String,

        /// Asset it depends on
        on: String,
    },

    /// List assets that can become dependencies
    Candidates {
        /// Asset ID
        id: String,
    },

    /// Print the dependency graph as JSON
    Graph,

    /// Show pipeline statistics
    Stats,

    /// Show recent activity
    History {
        /// Maximum number of entries to show
        #[arg(short, long, default_value_t = DEFAULT_HISTORY_LIMIT)]
        limit: usize,
    },

    /// List pipeline stages
    Stages,

    /// Import production files from a folder
    Import {
        /// Folder to scan
        dir: PathBuf,

        /// Only list what would be imported
        #[arg(long)]
        dry_run: bool,
    },

    /// Add sample assets
    Seed,

    /// Delete all stored pipeline data
    Clear,

    /// Show resolved configuration (debug)
    Config,
}

impl Cli {
    /// Execute the CLI command
    pub async fn execute(self) -> Result<()> {
        match self.command {
            Commands::Add {
                name,
                asset_type,
                stage,
                notes,
                depends_on,
            } => add_asset(name, asset_type, stage, notes, depends_on).await,
            Commands::List { stage } => list_assets(stage).await,
            Commands::Show { id } => show_asset(&id).await,
            Commands::Advance { id } => advance_asset(&id).await,
            Commands::Move { id, stage, force } => move_asset(&id, &stage, force).await,
            Commands::CanMove { id, stage } => can_move(&id, &stage).await,
            Commands::Update {
                id,
                name,
                asset_type,
                notes,
                meta,
            } => update_asset(&id, name, asset_type, notes, meta).await,
            Commands::Delete { id } => delete_asset(&id).await,
            Commands::Depend { id, on } => add_dependency(&id, &on).await,
            Commands::Undepend { id, on } => remove_dependency(&id, &on).await,
            Commands::Candidates { id } => list_candidates(&id).await,
            Commands::Graph => print_graph().await,
            Commands::Stats => show_stats().await,
            Commands::History { limit } => show_history(limit).await,
            Commands::Stages => list_stages().await,
            Commands::Import { dir, dry_run } => import_folder(&dir, dry_run).await,
            Commands::Seed => seed().await,
            Commands::Clear => clear().await,
            Commands::Config => show_config().await,
        }
    }
}

/// Open the engine over the configured data directory
fn open_engine() -> Result<PipelineEngine> {
    let pipeline = config::config()?.load_pipeline()?;
    let data_dir = config::data_dir()?;
    let slot = FileSlot::open(&data_dir)
        .with_context(|| format!("Failed to open data directory: {}", data_dir.display()))?;
    debug!(dir = %slot.dir().display(), "Opened data directory");

    Ok(PipelineEngine::open(pipeline, slot)?)
}

/// Look up an asset or fail with a readable message
fn require<'a>(engine: &'a PipelineEngine, id: &str) -> Result<&'a Asset> {
    engine
        .get_asset(id)
        .with_context(|| format!("Asset not found: {}", id))
}

fn stage_label(engine: &PipelineEngine, stage: &str) -> String {
    engine
        .get_stage(stage)
        .map(|s| s.name.clone())
        .unwrap_or_else(|| stage.to_string())
}

async fn add_asset(
    name: String,
    asset_type: Option<String>,
    stage: Option<String>,
    notes: Option<String>,
    depends_on: Vec<String>,
) -> Result<()> {
    let mut engine = open_engine()?;

    let mut input = NewAsset::named(name);
    if let Some(t) = asset_type {
        input = input.with_type(t);
    }
    if let Some(s) = stage {
        input = input.with_stage(s);
    }
    if let Some(n) = notes {
        input = input.with_notes(n);
    }
    for dep in depends_on {
        input = input.with_dependency(dep);
    }

    let asset = engine.create_asset(input)?;
    println!("{}", asset.id);
    eprintln!(
        "[Created '{}' in {}]",
        asset.name,
        stage_label(&engine, &asset.stage)
    );
    Ok(())
}

async fn list_assets(stage: Option<String>) -> Result<()> {
    let engine = open_engine()?;

    let assets = match stage {
        Some(ref s) => {
            if engine.get_stage(s).is_none() {
                anyhow::bail!("Unknown stage: {}", s);
            }
            engine.list_assets_by_stage(s)
        }
        None => engine.list_assets(),
    };

    if assets.is_empty() {
        println!("No assets found");
        return Ok(());
    }

    println!(
        "{:<40} {:<24} {:<12} {:<14} {:>4}",
        "ID", "NAME", "TYPE", "STAGE", "DEPS"
    );
    println!("{}", "-".repeat(98));

    for asset in assets {
        let name = if asset.name.chars().count() > 22 {
            format!("{}...", asset.name.chars().take(19).collect::<String>())
        } else {
            asset.name.clone()
        };
        println!(
            "{:<40} {:<24} {:<12} {:<14} {:>4}",
            asset.id,
            name,
            asset.asset_type,
            asset.stage,
            asset.dependencies.len()
        );
    }

    Ok(())
}

async fn show_asset(id: &str) -> Result<()> {
    let engine = open_engine()?;
    let asset = require(&engine, id)?;

    println!("ID:      {}", asset.id);
    println!("Name:    {}", asset.name);
    println!("Type:    {}", asset.asset_type);
    println!("Stage:   {}", stage_label(&engine, &asset.stage));
    println!("Created: {}", asset.created_at.format("%Y-%m-%d %H:%M:%S"));
    println!("Updated: {}", asset.updated_at.format("%Y-%m-%d %H:%M:%S"));
    if !asset.notes.is_empty() {
        println!("Notes:   {}", asset.notes);
    }

    if !asset.dependencies.is_empty() {
        println!("\nDepends on:");
        for dep in &asset.dependencies {
            let name = engine.get_asset(dep.as_str()).map(|d| d.name.as_str());
            println!("  {} ({})", dep, name.unwrap_or("?"));
        }
    }

    if !asset.metadata.is_empty() {
        println!("\nMetadata:");
        for (key, value) in &asset.metadata {
            println!("  {}: {}", key, value);
        }
    }

    println!("\nStage history:");
    for event in &asset.history {
        match event.from {
            Some(ref from) => println!(
                "  {}  {} -> {}",
                event.timestamp.format("%Y-%m-%d %H:%M"),
                from,
                event.stage
            ),
            None => println!(
                "  {}  created in {}",
                event.timestamp.format("%Y-%m-%d %H:%M"),
                event.stage
            ),
        }
    }

    Ok(())
}

async fn advance_asset(id: &str) -> Result<()> {
    let mut engine = open_engine()?;
    let from = require(&engine, id)?.stage.clone();

    match engine.advance_stage(id)? {
        Some(asset) => println!(
            "{}: {} -> {}",
            asset.name,
            stage_label(&engine, &from),
            stage_label(&engine, &asset.stage)
        ),
        None => println!("Already at the final stage ({})", stage_label(&engine, &from)),
    }

    Ok(())
}

async fn move_asset(id: &str, stage: &str, force: bool) -> Result<()> {
    let mut engine = open_engine()?;
    let from = require(&engine, id)?.stage.clone();

    if engine.get_stage(stage).is_none() {
        anyhow::bail!("Unknown stage: {}", stage);
    }
    if !force && !engine.can_transition(id, stage) {
        anyhow::bail!(
            "Moving from '{}' to '{}' is not allowed (use --force to override)",
            from,
            stage
        );
    }

    if let Some(asset) = engine.transition_to(id, stage)? {
        println!(
            "{}: {} -> {}",
            asset.name,
            stage_label(&engine, &from),
            stage_label(&engine, &asset.stage)
        );
    }

    Ok(())
}

async fn can_move(id: &str, stage: &str) -> Result<()> {
    let engine = open_engine()?;
    require(&engine, id)?;

    if engine.can_transition(id, stage) {
        println!("yes");
    } else {
        println!("no");
    }
    Ok(())
}

async fn update_asset(
    id: &str,
    name: Option<String>,
    asset_type: Option<String>,
    notes: Option<String>,
    meta: Vec<String>,
) -> Result<()> {
    let mut engine = open_engine()?;

    let mut patch = AssetPatch::default();
    if let Some(n) = name {
        patch = patch.name(n);
    }
    if let Some(t) = asset_type {
        patch = patch.asset_type(t);
    }
    if let Some(n) = notes {
        patch = patch.notes(n);
    }
    if !meta.is_empty() {
        patch = patch.metadata(parse_metadata(&meta)?);
    }
    if patch.is_empty() {
        anyhow::bail!("Nothing to update");
    }

    match engine.update_asset(id, patch)? {
        Some(asset) => println!("Updated {}", asset.id),
        None => anyhow::bail!("Asset not found: {}", id),
    }
    Ok(())
}

/// Parse `key=value` pairs; values that parse as JSON keep their type
fn parse_metadata(pairs: &[String]) -> Result<crate::domain::Metadata> {
    pairs
        .iter()
        .map(|pair| -> Result<(String, serde_json::Value)> {
            let (key, value) = pair
                .split_once('=')
                .with_context(|| format!("Expected key=value, got '{}'", pair))?;
            let value = serde_json::from_str(value)
                .unwrap_or_else(|_| serde_json::Value::String(value.to_string()));
            Ok((key.to_string(), value))
        })
        .collect()
}

async fn delete_asset(id: &str) -> Result<()> {
    let mut engine = open_engine()?;

    if !engine.delete_asset(id)? {
        anyhow::bail!("Asset not found: {}", id);
    }
    println!("Deleted {}", id);
    Ok(())
}

async fn add_dependency(id: &str, on: &str) -> Result<()> {
    let mut engine = open_engine()?;

    if let Err(rejection) = engine.check_dependency(id, on) {
        anyhow::bail!("Cannot add dependency: {}", rejection);
    }
    engine.add_dependency(id, on)?;
    println!("{} now depends on {}", id, on);
    Ok(())
}

async fn remove_dependency(id: &str, on: &str) -> Result<()> {
    let mut engine = open_engine()?;

    if !engine.remove_dependency(id, on)? {
        anyhow::bail!("{} does not depend on {}", id, on);
    }
    println!("Removed dependency {} -> {}", id, on);
    Ok(())
}

async fn list_candidates(id: &str) -> Result<()> {
    let engine = open_engine()?;
    require(&engine, id)?;

    let candidates = engine.dependency_candidates(id);
    if candidates.is_empty() {
        println!("No candidates");
        return Ok(());
    }

    for asset in candidates {
        println!("{:<40} {}", asset.id, asset.name);
    }
    Ok(())
}

async fn print_graph() -> Result<()> {
    let engine = open_engine()?;
    let graph = engine.build_graph_snapshot();
    println!("{}", serde_json::to_string_pretty(&graph)?);
    Ok(())
}

async fn show_stats() -> Result<()> {
    let engine = open_engine()?;
    let stats = engine.get_stats();

    println!("Total assets: {}", stats.total);
    println!(
        "Completed:    {} ({:.0}%)",
        stats.completed,
        stats.completion_ratio() * 100.0
    );

    println!("\nBy stage:");
    for stage in engine.list_stages() {
        let count = stats.by_stage.get(&stage.id).copied().unwrap_or_default();
        println!("  {:<14} {:>4}", stage.name, count);
    }

    println!("\nBy type:");
    for asset_type in engine.list_asset_types() {
        let count = stats
            .by_type
            .get(&asset_type.id)
            .copied()
            .unwrap_or_default();
        println!("  {:<14} {:>4}", asset_type.name, count);
    }

    Ok(())
}

async fn show_history(limit: usize) -> Result<()> {
    let engine = open_engine()?;
    let entries = engine.get_history(limit);

    if entries.is_empty() {
        println!("No activity yet");
        return Ok(());
    }

    println!("{:<20} {:<12} {:<24} {}", "TIME", "ACTION", "ASSET", "DETAIL");
    println!("{}", "-".repeat(80));

    for entry in entries {
        let detail = match (&entry.from, &entry.to) {
            (Some(from), Some(to)) => format!("{} -> {}", from, to),
            _ => String::new(),
        };
        println!(
            "{:<20} {:<12} {:<24} {}",
            entry.timestamp.format("%Y-%m-%d %H:%M:%S"),
            entry.action,
            entry.asset_name,
            detail
        );
    }

    Ok(())
}

async fn list_stages() -> Result<()> {
    let engine = open_engine()?;
    let pipeline = engine.pipeline();

    println!("{} (v{})", pipeline.name, pipeline.version);
    println!();
    for (i, stage) in pipeline.stages().iter().enumerate() {
        let next: Vec<&str> = pipeline
            .transitions
            .iter()
            .filter(|t| t.from == stage.id)
            .map(|t| t.to.as_str())
            .collect();
        println!(
            "{:>2}. {:<12} {:<14} {}",
            i + 1,
            stage.id,
            stage.name,
            if next.is_empty() {
                String::new()
            } else {
                format!("-> {}", next.join(", "))
            }
        );
    }

    Ok(())
}

async fn import_folder(dir: &std::path::Path, dry_run: bool) -> Result<()> {
    let cfg = config::config()?;
    let scanner = FolderScanner::new(cfg.import.clone())?;
    let scan = scanner.scan(dir).await?;

    if scan.files.is_empty() {
        println!(
            "No files matching [{}] found in {}",
            scanner.config().extensions.join(", "),
            dir.display()
        );
        return Ok(());
    }

    let mut engine = open_engine()?;

    if dry_run {
        for file in &scan.files {
            let stage = file
                .stage_for(engine.pipeline())
                .unwrap_or_else(|| engine.pipeline().first_stage().id.clone());
            println!("{:<12} {}", stage, file.relative_path());
        }
        eprintln!("\n[{} files would be imported]", scan.files.len());
        return Ok(());
    }

    let report = import_files(&mut engine, &scan.files)?;

    println!("Imported {} assets from {}", report.count(), dir.display());
    for (stage, count) in &report.by_stage {
        println!("  {:<14} {:>4}", stage_label(&engine, stage), count);
    }
    if scan.errors > 0 {
        eprintln!("[{} entries could not be read]", scan.errors);
    }

    Ok(())
}

async fn seed() -> Result<()> {
    let mut engine = open_engine()?;
    let ids = seed_demo_assets(&mut engine)?;
    println!("Added {} demo assets", ids.len());
    Ok(())
}

async fn clear() -> Result<()> {
    let mut engine = open_engine()?;
    let count = engine.len();
    engine.clear()?;
    println!("Cleared {} assets", count);
    Ok(())
}

async fn show_config() -> Result<()> {
    let cfg = config::config()?;

    println!("assetline configuration");
    println!();
    println!(
        "Config file: {}",
        cfg.config_file
            .as_ref()
            .map(|p| p.display().to_string())
            .unwrap_or_else(|| "(none - using defaults)".to_string())
    );
    println!();
    println!("Paths:");
    println!("  Home:     {}", cfg.home.display());
    println!("  Data:     {}", cfg.data_dir.display());
    println!(
        "  Pipeline: {}",
        cfg.pipeline_file
            .as_ref()
            .map(|p| p.display().to_string())
            .unwrap_or_else(|| "(built-in)".to_string())
    );
    println!();
    println!("Import:");
    println!("  Extensions: {}", cfg.import.extensions.join(", "));
    if cfg.import.ignore.is_empty() {
        println!("  Ignore:     (none)");
    } else {
        println!("  Ignore:     {}", cfg.import.ignore.join(", "));
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_metadata() {
        let meta = parse_metadata(&[
            "polycount=12000".to_string(),
            "artist=Sam".to_string(),
            "lod=true".to_string(),
        ])
        .unwrap();

        assert_eq!(meta["polycount"], 12000);
        assert_eq!(meta["artist"], "Sam");
        assert_eq!(meta["lod"], true);
        assert!(parse_metadata(&["broken".to_string()]).is_err());
    }

    #[test]
    fn test_cli_parses_move() {
        let cli = Cli::try_parse_from(["assetline", "move", "asset_1", "uv", "--force"]).unwrap();
        assert!(matches!(
            cli.command,
            Commands::Move { ref id, ref stage, force: true } if id == "asset_1" && stage == "uv"
        ));
    }

    #[test]
    fn test_cli_history_default_limit() {
        let cli = Cli::try_parse_from(["assetline", "history"]).unwrap();
        assert!(matches!(cli.command, Commands::History { limit } if limit == DEFAULT_HISTORY_LIMIT));
    }
}
