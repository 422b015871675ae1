//! CLI command definitions, routing, and tracing setup.

use std::io::Read;
use std::net::SocketAddr;
use std::path::PathBuf;

use clap::{Parser, Subcommand};
use color_eyre::eyre::{Result, WrapErr};
use indicatif::{ProgressBar, ProgressStyle};
use landingsync_core::{ProgressReporter, WebhookOutcome};
use landingsync_shared::{
    AppConfig, HeadingStyle, PageRequest, PageRunResult, init_config, load_config,
};
use tracing::info;

use crate::{runner, server};

// ---------------------------------------------------------------------------
// CLI structure
// ---------------------------------------------------------------------------

/// landingsync: location landing pages from a CRM deal to a live site.
#[derive(Parser)]
#[command(
    name = "landingsync",
    version,
    about = "Generate SEO location pages and publish them to a website builder.",
    long_about = None,
)]
pub(crate) struct Cli {
    /// Log format: text (default) or json.
    #[arg(long, default_value = "text", global = true)]
    pub log_format: LogFormat,

    /// Verbosity level (-v, -vv, -vvv).
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

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
    /// Generate pages for a site and publish them.
    Generate(GenerateArgs),

    /// Process a CRM webhook payload (from a file, or stdin).
    Webhook {
        /// Path to the JSON payload. Reads stdin when omitted.
        #[arg(long)]
        payload: Option<PathBuf>,
    },

    /// Serve the HTTP trigger endpoints.
    Serve {
        /// Address to listen on.
        #[arg(long, default_value = "127.0.0.1:8080")]
        bind: SocketAddr,
    },

    /// Configuration management.
    Config {
        /// Config subcommand.
        #[command(subcommand)]
        action: ConfigAction,
    },
}

/// Arguments of a direct run.
#[derive(clap::Args)]
pub(crate) struct GenerateArgs {
    /// Site code in the website builder.
    #[arg(long)]
    pub site: String,

    /// Service or industry the pages advertise.
    #[arg(long)]
    pub industry: String,

    /// City the generated locations surround, e.g. "Austin, TX".
    #[arg(long, default_value = "")]
    pub base_location: String,

    /// Number of pages (defaults to `defaults.default_num_pages`).
    #[arg(long)]
    pub pages: Option<usize>,

    /// Collection receiving the rows (defaults to `defaults.collection_name`).
    #[arg(long)]
    pub collection: Option<String>,

    /// Location that must be included; repeatable.
    #[arg(long = "priority")]
    pub priority: Vec<String>,

    /// Explicit location used instead of generation; repeatable.
    #[arg(long = "location")]
    pub locations: Vec<String>,

    /// Company name mentioned in fallback copy.
    #[arg(long)]
    pub company: Option<String>,

    /// Heading style: plain or best.
    #[arg(long)]
    pub heading_style: Option<HeadingStyle>,
}

impl GenerateArgs {
    fn into_request(self, config: &AppConfig) -> PageRequest {
        PageRequest {
            anchor_location: self.base_location,
            industry: self.industry,
            page_count: self.pages.unwrap_or(config.defaults.default_num_pages),
            site_id: self.site,
            collection_name: self
                .collection
                .unwrap_or_else(|| config.defaults.collection_name.clone()),
            priority_locations: self.priority,
            manual_locations: self.locations,
            company_name: self.company,
            heading_style: self.heading_style,
        }
    }
}

/// Config subcommands.
#[derive(Subcommand)]
pub(crate) enum ConfigAction {
    /// Write a default config file if none exists.
    Init,
    /// Print the effective configuration.
    Show,
}

// ---------------------------------------------------------------------------
// Tracing
// ---------------------------------------------------------------------------

/// Initialize tracing. `RUST_LOG` overrides the `-v` level.
pub(crate) fn init_tracing(cli: &Cli) {
    use tracing_subscriber::{EnvFilter, fmt};

    let filter = match cli.verbose {
        0 => "landingsync=info",
        1 => "landingsync=debug",
        _ => "landingsync=trace",
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
// Routing
// ---------------------------------------------------------------------------

pub(crate) async fn run(cli: Cli) -> Result<()> {
    match cli.command {
        Command::Generate(args) => cmd_generate(args).await,
        Command::Webhook { payload } => cmd_webhook(payload).await,
        Command::Serve { bind } => cmd_serve(bind).await,
        Command::Config { action } => match action {
            ConfigAction::Init => cmd_config_init(),
            ConfigAction::Show => cmd_config_show(),
        },
    }
}

async fn cmd_generate(args: GenerateArgs) -> Result<()> {
    let config = load_config()?;
    let request = args.into_request(&config);
    info!(site = %request.site_id, industry = %request.industry, "generate");

    let progress = CliProgress::new();
    let result = runner::run_generate(&config, &request, &progress).await;
    progress.finish();
    let result = result?;

    print_summary(&result);
    Ok(())
}

async fn cmd_webhook(payload: Option<PathBuf>) -> Result<()> {
    let body = match payload {
        Some(path) => std::fs::read_to_string(&path)
            .wrap_err_with(|| format!("reading payload {}", path.display()))?,
        None => {
            let mut buf = String::new();
            std::io::stdin()
                .read_to_string(&mut buf)
                .wrap_err("reading payload from stdin")?;
            buf
        }
    };

    let config = load_config()?;
    let progress = CliProgress::new();
    let outcome = runner::run_webhook(&config, &body, &progress).await;
    progress.finish();
    let outcome = outcome?;

    if let WebhookOutcome::Completed(result) = &outcome {
        print_summary(result);
    }
    println!("{}", serde_json::to_string_pretty(&outcome)?);
    Ok(())
}

async fn cmd_serve(bind: SocketAddr) -> Result<()> {
    let config = load_config()?;
    server::serve(config, bind).await
}

fn cmd_config_init() -> Result<()> {
    let path = init_config()?;
    println!("Config initialized at: {}", path.display());
    Ok(())
}

fn cmd_config_show() -> Result<()> {
    let config: AppConfig = load_config()?;
    let toml_str = toml::to_string_pretty(&config)?;
    println!("{toml_str}");
    Ok(())
}

fn print_summary(result: &PageRunResult) {
    println!();
    println!("  Run {} finished: {:?}", result.run_id, result.status);
    println!("  Site:      {}", result.site_id);
    println!(
        "  Pages:     {} created of {} attempted",
        result.pages_created, result.pages_attempted
    );
    println!(
        "  Published: {}",
        if result.site_published { "yes" } else { "no" }
    );
    for failed in &result.failed_batches {
        println!(
            "  Failed rows {}..{}: {}",
            failed.range.start, failed.range.end, failed.error
        );
    }
    println!();
}

// ---------------------------------------------------------------------------
// Progress
// ---------------------------------------------------------------------------

/// Spinner-based progress reporter for the terminal.
struct CliProgress {
    spinner: ProgressBar,
}

impl CliProgress {
    fn new() -> Self {
        let spinner = ProgressBar::new_spinner();
        if let Ok(style) = ProgressStyle::with_template("{spinner:.cyan} {msg}") {
            spinner.set_style(
                style.tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏"]),
            );
        }
        spinner.enable_steady_tick(std::time::Duration::from_millis(80));
        Self { spinner }
    }

    /// Clears the spinner; safe to call after `done`.
    fn finish(&self) {
        if !self.spinner.is_finished() {
            self.spinner.finish_and_clear();
        }
    }
}

impl ProgressReporter for CliProgress {
    fn phase(&self, name: &str) {
        self.spinner.set_message(name.to_string());
    }

    fn row_built(&self, heading: &str, current: usize, total: usize) {
        self.spinner
            .set_message(format!("Writing [{current}/{total}] {heading}"));
    }

    fn batch_sent(&self, index: usize, total: usize, accepted: bool) {
        let state = if accepted { "sent" } else { "failed" };
        self.spinner
            .set_message(format!("Batch [{index}/{total}] {state}"));
    }

    fn done(&self, _result: &PageRunResult) {
        self.spinner.finish_and_clear();
    }
}
