//! CLI command definitions, routing, and tracing setup.

use std::path::{Path, PathBuf};

use clap::{Parser, Subcommand, ValueEnum};
use color_eyre::eyre::{Result, eyre};
use coursemap_core::ProgressReporter;
use coursemap_shared::{AppConfig, ServeConfig, init_config, load_config, load_config_from};
use coursemap_storage::Storage;
use indicatif::{ProgressBar, ProgressStyle};
use tracing::info;

// ---------------------------------------------------------------------------
// CLI structure
// ---------------------------------------------------------------------------

/// coursemap: course catalog scraper and prerequisite API.
#[derive(Parser)]
#[command(
    name = "coursemap",
    version,
    about = "Scrape a university course catalog into SQLite and serve it as a JSON API.",
    long_about = None,
)]
pub(crate) struct Cli {
    /// Log format: text (default) or json.
    #[arg(long, default_value = "text", global = true)]
    pub log_format: LogFormat,

    /// Verbosity level (-v, -vv).
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Config file to use instead of ~/.coursemap/coursemap.toml.
    #[arg(long, global = true, env = "COURSEMAP_CONFIG")]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

/// Log output format.
#[derive(Clone, Debug, ValueEnum)]
pub(crate) enum LogFormat {
    Text,
    Json,
}

/// What a scrape run ingests.
#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
pub(crate) enum ScrapeTarget {
    Courses,
    Majors,
    All,
}

/// Top-level CLI subcommands.
#[derive(Subcommand)]
pub(crate) enum Command {
    /// Fetch catalog pages and store courses and/or major requirements.
    Scrape {
        /// courses, majors, or all.
        target: ScrapeTarget,

        /// Database file (defaults to [database].path).
        #[arg(long)]
        db: Option<PathBuf>,
    },

    /// Start the read-only JSON API.
    Serve {
        /// Bind address.
        #[arg(long)]
        host: Option<String>,

        /// Bind port.
        #[arg(short, long)]
        port: Option<u16>,

        /// Database file (defaults to [database].path).
        #[arg(long)]
        db: Option<PathBuf>,
    },

    /// Configuration management.
    Config {
        /// Config subcommand.
        #[command(subcommand)]
        action: ConfigAction,
    },
}

/// Config subcommands.
#[derive(Subcommand)]
pub(crate) enum ConfigAction {
    /// Initialize config file with defaults.
    Init,
    /// Show resolved configuration.
    Show,
}

// ---------------------------------------------------------------------------
// Tracing setup
// ---------------------------------------------------------------------------

/// Initialize tracing based on CLI flags.
pub(crate) fn init_tracing(cli: &Cli) {
    use tracing_subscriber::{EnvFilter, fmt};

    let filter = match cli.verbose {
        0 => "coursemap=info",
        1 => "coursemap=debug",
        _ => "coursemap=trace",
    };

    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter));

    match cli.log_format {
        LogFormat::Text => {
            fmt().with_env_filter(env_filter).with_target(false).init();
        }
        LogFormat::Json => {
            fmt().json().with_env_filter(env_filter).init();
        }
    }
}

// ---------------------------------------------------------------------------
// Command dispatch
// ---------------------------------------------------------------------------

/// Run the CLI command.
pub(crate) async fn run(cli: Cli) -> Result<()> {
    let config_path = cli.config.as_deref();
    match cli.command {
        Command::Scrape { target, db } => cmd_scrape(config_path, target, db).await,
        Command::Serve { host, port, db } => cmd_serve(config_path, host, port, db).await,
        Command::Config { action } => match action {
            ConfigAction::Init => cmd_config_init(),
            ConfigAction::Show => cmd_config_show(config_path),
        },
    }
}

fn resolve_config(path: Option<&Path>) -> Result<AppConfig> {
    Ok(match path {
        Some(p) => load_config_from(p)?,
        None => load_config()?,
    })
}

// ---------------------------------------------------------------------------
// Command handlers
// ---------------------------------------------------------------------------

async fn cmd_scrape(
    config_path: Option<&Path>,
    target: ScrapeTarget,
    db: Option<PathBuf>,
) -> Result<()> {
    let mut config = resolve_config(config_path)?;
    if let Some(db) = db {
        config.database.path = db;
    }

    info!(?target, db = %config.database.path.display(), "starting scrape");
    let storage = Storage::open(&config.database.path).await?;

    if matches!(target, ScrapeTarget::Courses | ScrapeTarget::All) {
        let reporter = CliProgress::new();
        let stats = coursemap_core::scrape_courses(&config, &storage, &reporter).await?;
        reporter.finish();
        println!();
        println!("  Courses stored:   {}", stats.total);
        println!("  Added:            {}", stats.added);
        println!("  Changed:          {}", stats.changed);
        println!("  Unchanged:        {}", stats.unchanged);
    }

    if matches!(target, ScrapeTarget::Majors | ScrapeTarget::All) {
        if config.majors.is_empty() {
            return Err(eyre!("no [[majors]] configured; run `coursemap config init`"));
        }
        let reporter = CliProgress::new();
        let all = coursemap_core::scrape_majors(&config, &storage, &reporter).await?;
        reporter.finish();
        println!();
        for (source, stats) in config.majors.iter().zip(&all) {
            println!(
                "  {} (id {}): {} new, {} existing requirements",
                source.name, stats.major_id, stats.inserted, stats.existing
            );
        }
    }

    println!("  Database:         {}", config.database.path.display());
    println!();
    Ok(())
}

async fn cmd_serve(
    config_path: Option<&Path>,
    host: Option<String>,
    port: Option<u16>,
    db: Option<PathBuf>,
) -> Result<()> {
    let config = resolve_config(config_path)?;
    let mut serve = ServeConfig::from(&config);
    if let Some(host) = host {
        serve.host = host;
    }
    if let Some(port) = port {
        serve.port = port;
    }
    if let Some(db) = db {
        serve.db_path = db;
    }

    coursemap_api::serve(&serve).await?;
    Ok(())
}

fn cmd_config_init() -> Result<()> {
    let path = init_config()?;
    println!("Config initialized at: {}", path.display());
    Ok(())
}

fn cmd_config_show(config_path: Option<&Path>) -> Result<()> {
    let config = resolve_config(config_path)?;
    let toml_str = toml::to_string_pretty(&config)?;
    println!("{toml_str}");
    Ok(())
}

// ---------------------------------------------------------------------------
// CLI progress reporter
// ---------------------------------------------------------------------------

/// CLI progress reporter using an indicatif spinner.
struct CliProgress {
    spinner: ProgressBar,
}

impl CliProgress {
    fn new() -> Self {
        let spinner = ProgressBar::new_spinner();
        let style = ProgressStyle::with_template("{spinner:.cyan} {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner())
            .tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏"]);
        spinner.set_style(style);
        spinner.enable_steady_tick(std::time::Duration::from_millis(80));
        Self { spinner }
    }

    fn finish(&self) {
        self.spinner.finish_and_clear();
    }
}

impl ProgressReporter for CliProgress {
    fn phase(&self, name: &str) {
        self.spinner.set_message(name.to_string());
    }

    fn course_stored(&self, code: &str, current: usize, total: usize) {
        self.spinner
            .set_message(format!("Storing [{current}/{total}] {code}"));
    }

    fn major_stored(&self, label: &str, requirements: usize) {
        self.spinner
            .println(format!("  {label}: {requirements} requirement codes"));
    }
}
