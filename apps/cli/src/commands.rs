//! CLI command definitions, routing, and tracing setup.

use std::path::{Path, PathBuf};
use std::time::Duration;

use clap::{Parser, Subcommand};
use color_eyre::eyre::{Result, eyre};
use indicatif::{ProgressBar, ProgressStyle};
use tracing::info;

use autopress_core::schedule::{articles_on_day, skip_reason};
use autopress_core::{
    CategorySelector, CoverImages, CycleOutcome, CycleProgress, PublishingCycle, Scheduler,
    SilentProgress,
};
use autopress_images::{Unsplash, configured_generators};
use autopress_llm::{AnthropicClient, ClaudeGenerator, ClaudeStrategist};
use autopress_shared::{
    AppConfig, ArticleStatus, Category, CategoryId, Site, StockPhotoService, expand_home,
    init_config, load_config, load_config_from, validate_api_key,
};
use autopress_storage::{ArticleFilter, Storage};
use autopress_wordpress::WordPressFactory;

// ---------------------------------------------------------------------------
// CLI structure
// ---------------------------------------------------------------------------

/// Autopress: unattended blog publishing.
#[derive(Parser)]
#[command(
    name = "autopress",
    version,
    about = "Plan, write, illustrate and publish blog articles to WordPress on a schedule.",
    long_about = None,
)]
pub(crate) struct Cli {
    /// Log format: text (default) or json.
    #[arg(long, default_value = "text", global = true)]
    pub log_format: LogFormat,

    /// Verbosity level (-v, -vv, -vvv).
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Config file (defaults to ~/.autopress/autopress.toml).
    #[arg(long, global = true, env = "AUTOPRESS_CONFIG")]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

/// Log output format.
#[derive(Clone, Debug, clap::ValueEnum)]
pub(crate) enum LogFormat {
    Text,
    Json,
}

/// Top-level CLI subcommands.
#[derive(Subcommand)]
pub(crate) enum Command {
    /// Run the scheduler until Ctrl-C.
    Run,

    /// Run one scheduler tick over all enabled sites.
    Tick,

    /// Run one publishing cycle for a single site.
    Cycle {
        /// Site id from the config.
        #[arg(long)]
        site: String,
    },

    /// Publish every stored draft whose site has credentials.
    PublishPending,

    /// List stored articles, newest first.
    Articles {
        /// Only this site.
        #[arg(long)]
        site: Option<String>,

        /// Only this status: draft, published, or error.
        #[arg(long)]
        status: Option<String>,

        /// Maximum rows.
        #[arg(long, default_value = "20")]
        limit: u32,
    },

    /// Show run statistics and article counts.
    Stats,

    /// Score text against the category keyword table.
    Classify {
        #[arg(long)]
        title: String,

        #[arg(long, default_value = "")]
        body: String,

        /// Comma-separated tags.
        #[arg(long, default_value = "")]
        tags: String,

        /// Candidate category as `id:name` (repeatable). Defaults to the
        /// keyword table labels.
        #[arg(long = "category")]
        categories: Vec<String>,
    },

    /// List configured sites and whether each is eligible right now.
    Sites,

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
        0 => "autopress=info",
        1 => "autopress=debug",
        _ => "autopress=trace",
    };

    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(filter));

    match cli.log_format {
        LogFormat::Text => {
            fmt()
                .with_env_filter(env_filter)
                .with_target(false)
                .init();
        }
        LogFormat::Json => {
            fmt()
                .json()
                .with_env_filter(env_filter)
                .init();
        }
    }
}

// ---------------------------------------------------------------------------
// Command dispatch
// ---------------------------------------------------------------------------

/// Run the CLI command.
pub(crate) async fn run(cli: Cli) -> Result<()> {
    let config_path = cli.config;
    match cli.command {
        Command::Run => cmd_run(config_path.as_deref()).await,
        Command::Tick => cmd_tick(config_path.as_deref()).await,
        Command::Cycle { site } => cmd_cycle(config_path.as_deref(), &site).await,
        Command::PublishPending => cmd_publish_pending(config_path.as_deref()).await,
        Command::Articles {
            site,
            status,
            limit,
        } => cmd_articles(config_path.as_deref(), site, status.as_deref(), limit).await,
        Command::Stats => cmd_stats(config_path.as_deref()).await,
        Command::Classify {
            title,
            body,
            tags,
            categories,
        } => cmd_classify(config_path.as_deref(), &title, &body, &tags, &categories),
        Command::Sites => cmd_sites(config_path.as_deref()).await,
        Command::Config { action } => match action {
            ConfigAction::Init => cmd_config_init(),
            ConfigAction::Show => cmd_config_show(config_path.as_deref()),
        },
    }
}

fn read_config(path: Option<&Path>) -> Result<AppConfig> {
    let config = match path {
        Some(path) => load_config_from(path)?,
        None => load_config()?,
    };
    config.validate()?;
    Ok(config)
}

// ---------------------------------------------------------------------------
// Wiring
// ---------------------------------------------------------------------------

/// Build the publishing cycle with the real collaborators.
///
/// Fails fast on configuration problems before any network call.
async fn build_cycle(config: &AppConfig) -> Result<PublishingCycle> {
    validate_api_key(config)?;

    let storage = Storage::open(&expand_home(&config.defaults.database_path)).await?;
    let client = AnthropicClient::from_config(&config.anthropic)?;

    let image_dir = expand_home(&config.defaults.image_dir);
    let generators = configured_generators(&config.image_generation, &image_dir)?;
    let stock = Unsplash::from_config(&config.unsplash)?
        .map(|u| Box::new(u) as Box<dyn StockPhotoService>);
    if stock.is_none() {
        info!(env = %config.unsplash.access_key_env, "Unsplash key not set, stock photos disabled");
    }

    Ok(PublishingCycle::new(
        storage,
        Box::new(ClaudeStrategist::new(client.clone())),
        Box::new(ClaudeGenerator::new(client)),
        Box::new(WordPressFactory),
    )
    .with_images(CoverImages::new(generators, stock))
    .with_selector(CategorySelector::from_config(config))
    .with_duplicate_threshold(config.scoring.duplicate_threshold)
    .with_pending_interval(Duration::from_secs(config.defaults.pending_interval_secs)))
}

async fn build_scheduler(config: &AppConfig) -> Result<Scheduler> {
    let cycle = build_cycle(config).await?;
    let sites = config.resolve_sites()?;
    Ok(Scheduler::new(
        cycle,
        sites,
        config.automation.tick_interval(),
    ))
}

async fn open_readonly(config: &AppConfig) -> Result<Option<Storage>> {
    let path = expand_home(&config.defaults.database_path);
    if !path.exists() {
        println!("No database yet at {}", path.display());
        return Ok(None);
    }
    Ok(Some(Storage::open_readonly(&path).await?))
}

// ---------------------------------------------------------------------------
// Command handlers
// ---------------------------------------------------------------------------

async fn cmd_run(config_path: Option<&Path>) -> Result<()> {
    let config = read_config(config_path)?;
    let scheduler = build_scheduler(&config).await?;
    // Log lines replace the spinner for a long-running process.
    scheduler.run_forever(&SilentProgress).await;
    Ok(())
}

async fn cmd_tick(config_path: Option<&Path>) -> Result<()> {
    let config = read_config(config_path)?;
    let scheduler = build_scheduler(&config).await?;

    let progress = CliProgress::new();
    let outcomes = scheduler.tick(&progress).await;
    progress.finish();

    println!();
    for site in &outcomes {
        println!("  {:<16} {}", site.site_id, site.outcome);
    }
    println!();
    Ok(())
}

async fn cmd_cycle(config_path: Option<&Path>, site_id: &str) -> Result<()> {
    let config = read_config(config_path)?;
    let site = config.site(site_id)?;
    let cycle = build_cycle(&config).await?;

    info!(site = %site.id, "running single cycle");
    let progress = CliProgress::new();
    let outcome = cycle.run(&site, &progress).await;
    progress.finish();

    println!();
    println!("  Site:    {}", site.id);
    println!("  Outcome: {outcome}");
    if let CycleOutcome::Published { post, .. } = &outcome {
        println!("  Post:    #{} {}", post.id, post.link);
    }
    println!();

    if outcome.is_error() {
        return Err(eyre!("cycle for '{}' ended with an error", site.id));
    }
    Ok(())
}

async fn cmd_publish_pending(config_path: Option<&Path>) -> Result<()> {
    let config = read_config(config_path)?;
    let sites = config.resolve_sites()?;
    let cycle = build_cycle(&config).await?;

    let progress = CliProgress::new();
    let report = cycle.publish_pending(&sites, &progress).await?;
    progress.finish();

    println!();
    println!("  Published: {}", report.published);
    println!("  Failed:    {}", report.failed);
    println!("  Skipped:   {} (no credentials)", report.skipped);
    println!("  Orphaned:  {} (site removed, marked error)", report.orphaned);
    println!();
    Ok(())
}

async fn cmd_articles(
    config_path: Option<&Path>,
    site: Option<String>,
    status: Option<&str>,
    limit: u32,
) -> Result<()> {
    let config = read_config(config_path)?;
    let status = status.map(str::parse::<ArticleStatus>).transpose()?;
    let Some(storage) = open_readonly(&config).await? else {
        return Ok(());
    };

    let articles = storage
        .list_articles(&ArticleFilter {
            site_id: site,
            status,
            limit: Some(limit),
        })
        .await?;

    if articles.is_empty() {
        println!("No articles.");
        return Ok(());
    }
    for article in &articles {
        println!(
            "{}  {:<10} {:<9} {}  {}",
            article.created_at.with_timezone(&chrono::Local).format("%Y-%m-%d %H:%M"),
            article.site_id,
            article.status,
            article.title,
            article.post_url.as_deref().unwrap_or(""),
        );
    }
    Ok(())
}

async fn cmd_stats(config_path: Option<&Path>) -> Result<()> {
    let config = read_config(config_path)?;
    let Some(storage) = open_readonly(&config).await? else {
        return Ok(());
    };

    let stats = storage.load_run_stats().await?;
    println!();
    println!("  Generated: {}", stats.total_generated);
    println!("  Published: {}", stats.total_published);
    println!("  Errors:    {}", stats.errors);
    println!(
        "  Last run:  {}",
        stats
            .last_run
            .map(|t| t.with_timezone(&chrono::Local).to_rfc3339())
            .unwrap_or_else(|| "never".into())
    );

    let counts = storage.article_counts().await?;
    if !counts.is_empty() {
        println!();
        for (site, status, count) in counts {
            println!("  {site:<16} {status:<9} {count}");
        }
    }
    println!();
    Ok(())
}

fn cmd_classify(
    config_path: Option<&Path>,
    title: &str,
    body: &str,
    tags: &str,
    categories: &[String],
) -> Result<()> {
    let config = read_config(config_path)?;
    let selector = CategorySelector::from_config(&config);

    let tags: Vec<String> = tags
        .split(',')
        .map(|t| t.trim().to_string())
        .filter(|t| !t.is_empty())
        .collect();

    let candidates: Vec<Category> = if categories.is_empty() {
        config
            .categories
            .iter()
            .enumerate()
            .map(|(i, p)| Category {
                id: CategoryId(i as u64 + 1),
                name: p.label.clone(),
            })
            .collect()
    } else {
        categories
            .iter()
            .map(|c| parse_category(c))
            .collect::<Result<_>>()?
    };

    println!();
    for candidate in &candidates {
        println!(
            "  {:>4}  {:<28} score {}",
            candidate.id.0,
            candidate.name,
            selector.score(title, body, &tags, &candidate.name)
        );
    }

    let chosen = selector.select(title, body, &tags, &candidates);
    let chosen_name = chosen
        .and_then(|id| candidates.iter().find(|c| c.id == id))
        .map(|c| c.name.as_str())
        .unwrap_or("(none)");
    println!();
    println!("  Selected: {chosen_name}");

    println!();
    println!("  Theme relevance:");
    let text = format!("{title} {body}");
    for (label, relevance) in selector.theme_scores(&text) {
        println!("    {label:<28} {relevance:.2}");
    }
    println!();
    Ok(())
}

fn parse_category(raw: &str) -> Result<Category> {
    let (id, name) = raw
        .split_once(':')
        .ok_or_else(|| eyre!("invalid category '{raw}': expected id:name"))?;
    let id = id
        .trim()
        .parse::<u64>()
        .map_err(|e| eyre!("invalid category id in '{raw}': {e}"))?;
    Ok(Category {
        id: CategoryId(id),
        name: name.trim().to_string(),
    })
}

async fn cmd_sites(config_path: Option<&Path>) -> Result<()> {
    let config = read_config(config_path)?;
    let sites = config.resolve_sites()?;
    if sites.is_empty() {
        println!("No sites configured. Add [[sites]] entries to the config file.");
        return Ok(());
    }

    let storage = open_readonly(&config).await?;
    let now = chrono::Local::now().fixed_offset();

    println!();
    for site in &sites {
        let today = match &storage {
            Some(storage) => articles_on_day(&storage.site_articles(&site.id).await?, &now),
            None => 0,
        };
        let state = match skip_reason(site, today, chrono::Timelike::hour(&now)) {
            Some(reason) => reason.to_string(),
            None => "eligible".to_string(),
        };
        println!("  {:<16} {}", site.id, site.url);
        println!(
            "      hours {:02}-{:02}  quota {}/{}  auto-publish {}  credentials {}  image {:?}",
            site.operating_hours.start,
            site.operating_hours.end,
            today,
            site.daily_quota,
            yes_no(site.publishes_automatically()),
            yes_no(site.credentials.is_some()),
            site.image.service,
        );
        println!("      {state}");
    }
    println!();
    Ok(())
}

fn yes_no(value: bool) -> &'static str {
    if value { "yes" } else { "no" }
}

fn cmd_config_init() -> Result<()> {
    let path = init_config()?;
    println!("Config initialized at: {}", path.display());
    Ok(())
}

fn cmd_config_show(config_path: Option<&Path>) -> Result<()> {
    let config = read_config(config_path)?;
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
        spinner.set_style(
            ProgressStyle::with_template("{spinner:.cyan} {prefix:.bold} {msg}")
                .unwrap_or_else(|_| ProgressStyle::default_spinner())
                .tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏"]),
        );
        spinner.enable_steady_tick(Duration::from_millis(80));
        Self { spinner }
    }

    fn finish(&self) {
        self.spinner.finish_and_clear();
    }
}

impl CycleProgress for CliProgress {
    fn site_started(&self, site: &Site) {
        self.spinner.set_prefix(site.id.clone());
        self.spinner.set_message("starting");
    }

    fn phase(&self, name: &str) {
        self.spinner.set_message(name.to_string());
    }

    fn site_finished(&self, site: &Site, outcome: &CycleOutcome) {
        self.spinner.println(format!("  {:<16} {outcome}", site.id));
    }
}
