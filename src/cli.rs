use crate::config::Config;
use crate::merge::{EmitOptions, OutputFormat};
use crate::session::MergeSession;
use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use std::collections::BTreeMap;
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "modpack-merger")]
#[command(about = "Merge Minecraft modpacks into one archive or index pack", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum EmitFormat {
    /// Self-contained zip with every file at its original path
    Archive,
    /// modrinth.index.json plus overrides/ for local files
    Index,
}

impl From<EmitFormat> for OutputFormat {
    fn from(format: EmitFormat) -> Self {
        match format {
            EmitFormat::Archive => OutputFormat::FullArchive,
            EmitFormat::Index => OutputFormat::Index,
        }
    }
}

#[derive(Subcommand)]
pub enum Commands {
    /// Merge packs in priority order and write the result
    Merge {
        /// Pack archives, highest priority first
        #[arg(value_name = "PACK", required = true)]
        packs: Vec<PathBuf>,

        /// Output file
        #[arg(short, long)]
        output: PathBuf,

        #[arg(long, value_enum, default_value = "archive")]
        format: EmitFormat,

        /// versionId for index output (defaults to today's date)
        #[arg(long)]
        version_id: Option<String>,

        /// Pack name for index output (defaults to the head pack's name)
        #[arg(long)]
        name: Option<String>,

        /// Skip the deep (metadata-fetching) analysis before emitting
        #[arg(long)]
        quick: bool,
    },

    /// Show how a single pack archive is classified
    Inspect {
        #[arg(value_name = "PACK")]
        pack: PathBuf,
    },

    /// Report conflicts, compatibility and dependency issues without emitting
    Analyze {
        #[arg(value_name = "PACK", required = true)]
        packs: Vec<PathBuf>,

        /// Fetch and parse mod metadata for the full report
        #[arg(long)]
        deep: bool,
    },
}

/// Run CLI command
pub async fn run_cli(cli: Cli, config: Config) -> Result<()> {
    match cli.command {
        Commands::Merge {
            packs,
            output,
            format,
            version_id,
            name,
            quick,
        } => merge_command(config, packs, output, format.into(), version_id, name, quick).await,
        Commands::Inspect { pack } => inspect_command(config, pack).await,
        Commands::Analyze { packs, deep } => analyze_command(config, packs, deep).await,
    }
}

/// Load every pack, in order. A rejected archive is logged and skipped;
/// already-loaded packs stay loaded.
async fn load_all(session: &mut MergeSession, packs: &[PathBuf]) -> Result<()> {
    for path in packs {
        match session.load_pack(path).await {
            Ok(Some(_)) => {}
            Ok(None) => tracing::warn!("skipping {}: duplicate pack name", path.display()),
            Err(e) => tracing::error!("rejected {}: {e}", path.display()),
        }
    }
    if session.packs().is_empty() {
        anyhow::bail!("no packs could be loaded");
    }
    Ok(())
}

async fn merge_command(
    config: Config,
    packs: Vec<PathBuf>,
    output: PathBuf,
    format: OutputFormat,
    version_id: Option<String>,
    name: Option<String>,
    quick: bool,
) -> Result<()> {
    let mut session = MergeSession::new(config)?;
    load_all(&mut session, &packs).await?;

    let report = session.quick_analysis();
    if !report.is_compatible() {
        for issue in &report.compatibility {
            tracing::error!("{}", issue.message);
        }
        anyhow::bail!("packs are incompatible; merge aborted");
    }

    if quick {
        report_conflicts(&report.conflicts);
    } else {
        tracing::info!("Analyzing mod metadata...");
        let deep = session.deep_analysis().await?;
        report_conflicts(&deep.conflicts);
        report_dependencies(&deep.dependencies);
    }

    let head = session.head().context("no packs loaded")?;
    let options = EmitOptions {
        format,
        version_id: version_id
            .unwrap_or_else(|| chrono::Utc::now().format("%Y.%m.%d").to_string()),
        name: name.unwrap_or_else(|| head.name.clone()),
    };

    let emit_report = session
        .emit(&options, &output, |pct| tracing::debug!("emit progress {pct}%"))
        .await?;

    tracing::info!("✓ Merge complete!");
    tracing::info!("  Output: {}", emit_report.path.display());
    tracing::info!("  Size: {} bytes", emit_report.size);
    tracing::info!("  SHA256: {}", emit_report.sha256);
    tracing::info!(
        "  Files: {} local, {} remote",
        emit_report.local_files,
        emit_report.remote_files
    );
    Ok(())
}

async fn inspect_command(config: Config, pack: PathBuf) -> Result<()> {
    let mut session = MergeSession::new(config)?;
    session
        .load_pack(&pack)
        .await
        .with_context(|| format!("failed to load {}", pack.display()))?;

    let loaded = session.head().context("pack did not load")?;
    tracing::info!("Pack: {}", loaded.name);
    tracing::info!("  Type: {:?}", loaded.kind);
    tracing::info!("  Minecraft: {}", loaded.minecraft_version);
    tracing::info!("  Loader: {}", loaded.loader);

    let mut counts: BTreeMap<&str, usize> = BTreeMap::new();
    let mut remote = 0usize;
    for file in session.files() {
        *counts.entry(file.category.as_str()).or_insert(0) += 1;
        if file.origin.is_remote() {
            remote += 1;
        }
    }
    tracing::info!("  Files: {} total, {} remote", session.files().len(), remote);
    for (category, count) in counts {
        tracing::info!("    {category}: {count}");
    }
    Ok(())
}

async fn analyze_command(config: Config, packs: Vec<PathBuf>, deep: bool) -> Result<()> {
    let mut session = MergeSession::new(config)?;
    load_all(&mut session, &packs).await?;

    let report = session.quick_analysis();
    for issue in &report.compatibility {
        tracing::warn!("{}", issue.message);
    }

    let report = if deep && report.is_compatible() {
        tracing::info!("Analyzing mod metadata...");
        session.deep_analysis().await?
    } else {
        if deep {
            tracing::warn!("skipping deep analysis: packs are incompatible");
        }
        report
    };

    report_conflicts(&report.conflicts);
    report_dependencies(&report.dependencies);

    let excluded = session.files().iter().filter(|f| !f.enabled).count();
    tracing::info!(
        "{} files across {} packs, {} excluded",
        session.files().len(),
        session.packs().len(),
        excluded
    );
    Ok(())
}

fn report_conflicts(conflicts: &[crate::models::ConflictRecord]) {
    for conflict in conflicts {
        match conflict.resolution {
            crate::models::ConflictResolution::KeepOther => {
                tracing::warn!(
                    "excluded {} in favor of {}",
                    conflict.file_name,
                    conflict.other_file
                );
            }
            crate::models::ConflictResolution::KeepThis => {
                tracing::info!(
                    "kept {} over older {}",
                    conflict.file_name,
                    conflict.other_file
                );
            }
        }
    }
}

fn report_dependencies(issues: &[crate::models::DependencyIssue]) {
    for issue in issues {
        match &issue.present_version {
            Some(present) => tracing::warn!(
                "{} requires {} {} but {} is present",
                issue.required_by,
                issue.mod_id,
                issue.required_range,
                present
            ),
            None => tracing::warn!(
                "{} requires {} {} which is missing",
                issue.required_by,
                issue.mod_id,
                issue.required_range
            ),
        }
    }
}
