//! treesync - folder synchronization and versioned incremental backup
//!
//! Keeps a destination folder consistent with a source folder, optionally mirroring
//! deletions and keeping overwritten files under a timestamped backup suffix.

mod display;

use anyhow::{bail, Context, Result};
use clap::{Args, Parser, Subcommand};
use console::style;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::info;
use treesync_config::{Config, ConfigLoader};
use treesync_sync::{exclude_extensions, KeyValueStore, PropertiesFileStore, Synchronizer};
use treesync_types::SyncPolicy;

/// treesync - folder synchronization and versioned incremental backup
#[derive(Parser, Debug)]
#[command(
    name = "treesync",
    version = env!("CARGO_PKG_VERSION"),
    about = "Folder synchronization and versioned incremental backup",
    long_about = "treesync copies new and changed files from a source folder to a destination folder.\n\
                  It can mirror deletions, keep old versions under a .bkYYYYMMDDHHMM suffix,\n\
                  and report what a run would do without touching the disk."
)]
struct Cli {
    /// Enable debug logging
    #[arg(short, long)]
    debug: bool,

    /// Quiet mode - minimal output
    #[arg(short, long)]
    quiet: bool,

    /// Verbose mode - detailed output
    #[arg(short, long)]
    verbose: bool,

    /// Configuration file path
    #[arg(short, long)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Synchronize a destination folder with a source folder
    Sync(SyncArgs),
    /// Show the statistics recorded by the previous run of a pair
    Stats {
        /// Source directory
        source: PathBuf,
        /// Destination directory
        destination: PathBuf,
        /// Statistics file
        #[arg(long)]
        stats_file: Option<PathBuf>,
    },
    /// Show or generate configuration
    Config {
        /// Show default configuration
        #[arg(long)]
        default: bool,
        /// Write the default configuration to this file
        #[arg(long, value_name = "PATH")]
        generate: Option<PathBuf>,
    },
}

#[derive(Args, Debug)]
struct SyncArgs {
    /// Source directory
    source: PathBuf,
    /// Destination directory
    destination: PathBuf,
    /// Name prefixed to every log line of this run
    #[arg(long)]
    name: Option<String>,
    /// Dry run - show what would be done
    #[arg(long)]
    dry_run: bool,
    /// Delete destination entries no longer in the source
    #[arg(long)]
    delete: bool,
    /// Keep overwritten and deleted entries under a backup suffix
    #[arg(long)]
    keep_versions: bool,
    /// Do not copy because of a size difference
    #[arg(long)]
    no_size_check: bool,
    /// Do not copy because of a modification date difference
    #[arg(long)]
    no_date_check: bool,
    /// Ignore modification date differences up to this many milliseconds
    #[arg(long, value_name = "N")]
    tolerance_ms: Option<u64>,
    /// Only create destination folders that receive files
    #[arg(long)]
    only_dirs_with_content: bool,
    /// Skip files with this extension (repeatable)
    #[arg(long, value_name = "EXT")]
    exclude_ext: Vec<String>,
    /// Print the files consistent with the destination after the run
    #[arg(long)]
    list_synced: bool,
    /// Statistics file
    #[arg(long, value_name = "PATH")]
    stats_file: Option<PathBuf>,
}

impl SyncArgs {
    /// Configured policy with command line switches applied on top
    fn policy(&self, config: &Config) -> SyncPolicy {
        let mut policy = config.policy.to_sync_policy();
        policy.simulate |= self.dry_run;
        policy.delete_stale |= self.delete;
        policy.preserve_old_versions |= self.keep_versions;
        policy.create_dirs_only_with_content |= self.only_dirs_with_content;
        policy.track_synchronized_files |= self.list_synced;
        if self.no_size_check {
            policy.copy_if_sizes_differ = false;
        }
        if self.no_date_check {
            policy.copy_if_dates_differ = false;
        }
        if let Some(tolerance) = self.tolerance_ms {
            policy.date_tolerance_millis = tolerance;
        }
        policy
    }

    fn excluded_extensions(&self, config: &Config) -> Vec<String> {
        config
            .policy
            .exclude_extensions
            .iter()
            .chain(&self.exclude_ext)
            .cloned()
            .collect()
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let config = match &cli.config {
        Some(path) => ConfigLoader::load_from_file(path)
            .with_context(|| format!("Failed to load configuration from {}", path.display()))?,
        None => ConfigLoader::load_default().context("Failed to load configuration")?,
    };

    init_logging(&cli, &config)?;

    info!("treesync v{} starting", env!("CARGO_PKG_VERSION"));

    match cli.command {
        Commands::Sync(args) => sync_command(args, &config, cli.quiet).await,
        Commands::Stats {
            source,
            destination,
            stats_file,
        } => stats_command(source, destination, stats_file, &config).await,
        Commands::Config { default, generate } => config_command(default, generate, &config),
    }
}

fn log_level<'a>(cli: &Cli, config: &'a Config) -> &'a str {
    if cli.debug {
        "debug"
    } else if cli.verbose {
        "info"
    } else if cli.quiet {
        "error"
    } else {
        &config.logging.level
    }
}

fn init_logging(cli: &Cli, config: &Config) -> Result<()> {
    use tracing_subscriber::{fmt, EnvFilter};

    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(log_level(cli, config)))
        .context("Invalid log filter")?;

    let builder = fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_thread_ids(false)
        .with_thread_names(false);

    if config.logging.json_format {
        builder.json().init();
    } else {
        builder.init();
    }

    Ok(())
}

fn statistics_store(
    stats_file: Option<PathBuf>,
    config: &Config,
) -> Option<Arc<dyn KeyValueStore>> {
    match stats_file {
        Some(path) => Some(Arc::new(PropertiesFileStore::new(path))),
        None if config.statistics.enabled => {
            Some(Arc::new(PropertiesFileStore::new(&config.statistics.file)))
        }
        None => None,
    }
}

fn open_session(name: Option<&str>, source: &Path, destination: &Path) -> Result<Synchronizer> {
    let session = match name {
        Some(name) => Synchronizer::with_name(name, source, destination),
        None => Synchronizer::new(source, destination),
    };
    session.with_context(|| {
        format!(
            "Cannot synchronize {} with {}",
            source.display(),
            destination.display()
        )
    })
}

async fn sync_command(args: SyncArgs, config: &Config, quiet: bool) -> Result<()> {
    let mut session = open_session(args.name.as_deref(), &args.source, &args.destination)?;

    let policy = args.policy(config);
    session
        .set_policy(policy)
        .set_statistics_store(statistics_store(args.stats_file.clone(), config))
        .set_progress_interval(config.progress.interval())
        .set_copy_progress_interval(config.progress.copy_progress_interval());

    let excluded = args.excluded_extensions(config);
    if !excluded.is_empty() {
        session.set_custom_filter(exclude_extensions(excluded));
    }

    if !quiet {
        println!(
            "{} Synchronizing {} with {}",
            style("⟲").blue().bold(),
            style(session.source().display()).cyan(),
            style(session.destination().display()).cyan()
        );
        display::display_policy(&policy);
        display::display_info(&session.previous_run_summary().await);
        if policy.simulate {
            display::display_info("Dry run mode - no changes will be made");
        }
    }

    let report = session.sync().await?;
    report.log();

    if !quiet {
        display::display_report(&report);
    }

    if args.list_synced {
        for file in session.synchronized_files().await {
            println!("{}", file.display());
        }
    }

    if !report.errors.is_empty() {
        bail!("{} entries could not be synchronized", report.errors.count());
    }
    Ok(())
}

async fn stats_command(
    source: PathBuf,
    destination: PathBuf,
    stats_file: Option<PathBuf>,
    config: &Config,
) -> Result<()> {
    let mut session = open_session(None, &source, &destination)?;
    let Some(store) = statistics_store(stats_file, config) else {
        display::display_warning("Statistics are disabled in the configuration");
        return Ok(());
    };
    session.set_statistics_store(Some(store));

    let statistics = session.previous_statistics().await;
    display::display_statistics(&session.previous_run_summary().await, &statistics);
    Ok(())
}

fn config_command(default: bool, generate: Option<PathBuf>, config: &Config) -> Result<()> {
    if let Some(path) = generate {
        ConfigLoader::generate_default_config(&path)
            .with_context(|| format!("Failed to write {}", path.display()))?;
        display::display_success(&format!("Default configuration written to {}", path.display()));
        return Ok(());
    }

    if default {
        println!("{} Default configuration:", style("⚙").blue().bold());
        print!("{}", serde_yaml::to_string(&Config::default())?);
    } else {
        println!("{} Current configuration:", style("⚙").blue().bold());
        match ConfigLoader::config_exists() {
            Some(path) => println!("# loaded from {}", path.display()),
            None => display::display_info("No configuration file found, using defaults"),
        }
        print!("{}", serde_yaml::to_string(config)?);
    }
    Ok(())
}
