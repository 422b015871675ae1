//! Application configuration for landingsync.
//!
//! User config lives at `~/.landingsync/landingsync.toml`.
//! CLI flags override config file values, which override defaults.
//! Secrets never live in the file: it only names the environment variables
//! that hold them, and [`RunConfig::resolve`] reads those once per run.

use std::fmt;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use url::Url;

use crate::error::{LandingSyncError, Result};

/// Default configuration file name.
const CONFIG_FILE_NAME: &str = "landingsync.toml";

/// Default config directory name under the user's home.
const CONFIG_DIR_NAME: &str = ".landingsync";

// ---------------------------------------------------------------------------
// Config structs (matching landingsync.toml schema)
// ---------------------------------------------------------------------------

/// Top-level application config, deserialized from TOML.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    /// Content and page defaults.
    #[serde(default)]
    pub defaults: DefaultsConfig,

    /// Text-generation settings.
    #[serde(default)]
    pub openai: OpenAiConfig,

    /// CRM settings.
    #[serde(default)]
    pub hubspot: HubSpotConfig,

    /// Publishing-platform settings.
    #[serde(default)]
    pub duda: DudaConfig,

    /// Batch and pacing settings.
    #[serde(default)]
    pub publishing: PublishingConfig,
}

/// How page headings and identifiers are phrased.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HeadingStyle {
    /// `"{industry} in {location}"`, identifier is the location slug.
    #[default]
    Plain,
    /// `"Best {industry} in {location}"`, identifier `best-{industry}-{location}`.
    Best,
}

impl std::str::FromStr for HeadingStyle {
    type Err = LandingSyncError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "plain" => Ok(Self::Plain),
            "best" => Ok(Self::Best),
            other => Err(LandingSyncError::config(format!(
                "unknown heading style '{other}': expected 'plain' or 'best'"
            ))),
        }
    }
}

/// `[defaults]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DefaultsConfig {
    /// Writing tone passed to the text generator.
    #[serde(default = "default_content_tone")]
    pub content_tone: String,

    /// Requested paragraph length, in words the generator understands.
    #[serde(default = "default_content_length")]
    pub content_length: String,

    /// Page count used when a trigger does not specify one.
    #[serde(default = "default_num_pages")]
    pub default_num_pages: usize,

    /// Dynamic-content collection receiving the rows.
    #[serde(default = "default_collection_name")]
    pub collection_name: String,

    /// Heading style for direct runs.
    #[serde(default)]
    pub heading_style: HeadingStyle,
}

impl Default for DefaultsConfig {
    fn default() -> Self {
        Self {
            content_tone: default_content_tone(),
            content_length: default_content_length(),
            default_num_pages: default_num_pages(),
            collection_name: default_collection_name(),
            heading_style: HeadingStyle::default(),
        }
    }
}

fn default_content_tone() -> String {
    "professional".into()
}
fn default_content_length() -> String {
    "3-4 sentences".into()
}
fn default_num_pages() -> usize {
    10
}
fn default_collection_name() -> String {
    "Location".into()
}

/// `[openai]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OpenAiConfig {
    /// Name of the env var holding the API key (never store the key itself).
    #[serde(default = "default_openai_key_env")]
    pub api_key_env: String,

    /// Chat model used for locations and prose.
    #[serde(default = "default_model")]
    pub model: String,

    /// Base URL of the OpenAI-compatible API.
    #[serde(default = "default_openai_base_url")]
    pub base_url: String,
}

impl Default for OpenAiConfig {
    fn default() -> Self {
        Self {
            api_key_env: default_openai_key_env(),
            model: default_model(),
            base_url: default_openai_base_url(),
        }
    }
}

fn default_openai_key_env() -> String {
    "OPENAI_API_KEY".into()
}
fn default_model() -> String {
    "gpt-3.5-turbo".into()
}
fn default_openai_base_url() -> String {
    "https://api.openai.com/v1".into()
}

/// `[hubspot]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HubSpotConfig {
    /// Name of the env var holding the private-app token.
    #[serde(default = "default_hubspot_key_env")]
    pub api_key_env: String,

    /// Base URL of the CRM API.
    #[serde(default = "default_hubspot_base_url")]
    pub base_url: String,
}

impl Default for HubSpotConfig {
    fn default() -> Self {
        Self {
            api_key_env: default_hubspot_key_env(),
            base_url: default_hubspot_base_url(),
        }
    }
}

fn default_hubspot_key_env() -> String {
    "HUBSPOT_API_KEY".into()
}
fn default_hubspot_base_url() -> String {
    "https://api.hubapi.com".into()
}

/// Publishing-platform environment.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DudaEnvironment {
    #[default]
    Production,
    Sandbox,
}

impl DudaEnvironment {
    /// API root for this environment.
    pub fn api_base(self) -> &'static str {
        match self {
            Self::Production => "https://api.duda.co/api",
            Self::Sandbox => "https://api-sandbox.duda.co/api",
        }
    }
}

/// `[duda]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DudaConfig {
    /// Name of the env var holding the API user.
    #[serde(default = "default_duda_user_env")]
    pub api_user_env: String,

    /// Name of the env var holding the API password.
    #[serde(default = "default_duda_pass_env")]
    pub api_pass_env: String,

    /// Production or sandbox API.
    #[serde(default)]
    pub environment: DudaEnvironment,

    /// Explicit API root, overriding `environment`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub base_url: Option<String>,
}

impl Default for DudaConfig {
    fn default() -> Self {
        Self {
            api_user_env: default_duda_user_env(),
            api_pass_env: default_duda_pass_env(),
            environment: DudaEnvironment::default(),
            base_url: None,
        }
    }
}

fn default_duda_user_env() -> String {
    "DUDA_API_USER".into()
}
fn default_duda_pass_env() -> String {
    "DUDA_API_PASS".into()
}

/// What a 4xx answer to a row-creation batch means.
///
/// The platform may have created some rows before rejecting the request, and
/// its error body does not say which ones.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ClientErrorPolicy {
    /// Count the batch as possibly created (`rows_ambiguous`).
    #[default]
    AssumeCreated,
    /// Record the batch in `failed_batches` like a server error.
    TreatAsFailure,
}

/// `[publishing]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PublishingConfig {
    /// Maximum rows per create-rows call.
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,

    /// Pause between successive batch calls.
    #[serde(default = "default_batch_delay")]
    pub batch_delay_ms: u64,

    /// Pause between successive prose generations.
    #[serde(default = "default_content_delay")]
    pub content_delay_ms: u64,

    /// Interpretation of 4xx batch answers.
    #[serde(default)]
    pub client_error_policy: ClientErrorPolicy,
}

impl Default for PublishingConfig {
    fn default() -> Self {
        Self {
            batch_size: default_batch_size(),
            batch_delay_ms: default_batch_delay(),
            content_delay_ms: default_content_delay(),
            client_error_policy: ClientErrorPolicy::default(),
        }
    }
}

fn default_batch_size() -> usize {
    50
}
fn default_batch_delay() -> u64 {
    1000
}
fn default_content_delay() -> u64 {
    500
}

// ---------------------------------------------------------------------------
// Run config (resolved once per run)
// ---------------------------------------------------------------------------

/// A credential read from the environment. `Debug` never shows the value.
#[derive(Clone, PartialEq, Eq)]
pub struct Secret(String);

impl Secret {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    /// The raw credential, for building auth headers.
    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for Secret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("***")
    }
}

/// Runtime configuration for one triggering request.
///
/// Built once from [`AppConfig`] plus the environment and passed by value or
/// reference into every collaborator constructor.
#[derive(Debug, Clone)]
pub struct RunConfig {
    /// The file/default settings this run was resolved from.
    pub app: AppConfig,
    pub openai_api_key: Secret,
    pub openai_base_url: Url,
    /// Present only when the run needs the CRM.
    pub hubspot_api_key: Option<Secret>,
    pub hubspot_base_url: Url,
    pub duda_api_user: Secret,
    pub duda_api_pass: Secret,
    pub duda_base_url: Url,
}

impl RunConfig {
    /// Resolve credentials from the process environment.
    ///
    /// `needs_crm` adds the CRM token to the required set (webhook runs).
    pub fn resolve(app: &AppConfig, needs_crm: bool) -> Result<Self> {
        Self::resolve_with(app, needs_crm, |name| std::env::var(name).ok())
    }

    /// Resolve credentials through `lookup`, reporting every missing variable at once.
    pub fn resolve_with(
        app: &AppConfig,
        needs_crm: bool,
        lookup: impl Fn(&str) -> Option<String>,
    ) -> Result<Self> {
        let read = |var: &str| -> Option<Secret> {
            match lookup(var) {
                Some(value) if !value.trim().is_empty() => Some(Secret::new(value.trim())),
                _ => None,
            }
        };

        let openai = read(&app.openai.api_key_env);
        let hubspot = read(&app.hubspot.api_key_env);
        let duda_user = read(&app.duda.api_user_env);
        let duda_pass = read(&app.duda.api_pass_env);

        let mut missing: Vec<&str> = Vec::new();
        if openai.is_none() {
            missing.push(&app.openai.api_key_env);
        }
        if needs_crm && hubspot.is_none() {
            missing.push(&app.hubspot.api_key_env);
        }
        if duda_user.is_none() {
            missing.push(&app.duda.api_user_env);
        }
        if duda_pass.is_none() {
            missing.push(&app.duda.api_pass_env);
        }

        let (Some(openai_api_key), Some(duda_api_user), Some(duda_api_pass)) =
            (openai, duda_user, duda_pass)
        else {
            return Err(missing_error(&missing));
        };
        if !missing.is_empty() {
            return Err(missing_error(&missing));
        }

        let duda_base = app
            .duda
            .base_url
            .clone()
            .unwrap_or_else(|| app.duda.environment.api_base().to_string());

        Ok(Self {
            openai_api_key,
            openai_base_url: parse_base_url("openai.base_url", &app.openai.base_url)?,
            hubspot_api_key: hubspot,
            hubspot_base_url: parse_base_url("hubspot.base_url", &app.hubspot.base_url)?,
            duda_api_user,
            duda_api_pass,
            duda_base_url: parse_base_url("duda.base_url", &duda_base)?,
            app: app.clone(),
        })
    }

    /// The CRM token, or a config error for runs resolved without it.
    pub fn hubspot_api_key(&self) -> Result<&Secret> {
        self.hubspot_api_key.as_ref().ok_or_else(|| {
            LandingSyncError::config(format!(
                "CRM token not configured. Set the {} environment variable.",
                self.app.hubspot.api_key_env
            ))
        })
    }
}

fn missing_error(missing: &[&str]) -> LandingSyncError {
    LandingSyncError::config(format!(
        "missing required configuration: set the {} environment variable(s)",
        missing.join(", ")
    ))
}

fn parse_base_url(field: &str, raw: &str) -> Result<Url> {
    Url::parse(raw.trim_end_matches('/'))
        .map_err(|e| LandingSyncError::config(format!("invalid {field} '{raw}': {e}")))
}

// ---------------------------------------------------------------------------
// Config loading
// ---------------------------------------------------------------------------

/// Get the path to the config directory (`~/.landingsync/`).
pub fn config_dir() -> Result<PathBuf> {
    let home = dirs::home_dir()
        .ok_or_else(|| LandingSyncError::config("could not determine home directory"))?;
    Ok(home.join(CONFIG_DIR_NAME))
}

/// Get the path to the config file (`~/.landingsync/landingsync.toml`).
pub fn config_file_path() -> Result<PathBuf> {
    Ok(config_dir()?.join(CONFIG_FILE_NAME))
}

/// Load the application config from disk. Returns defaults if the file does not exist.
pub fn load_config() -> Result<AppConfig> {
    let path = config_file_path()?;

    if !path.exists() {
        tracing::debug!(?path, "config file not found, using defaults");
        return Ok(AppConfig::default());
    }

    load_config_from(&path)
}

/// Load the application config from a specific file path.
pub fn load_config_from(path: &Path) -> Result<AppConfig> {
    let content = std::fs::read_to_string(path).map_err(|e| LandingSyncError::io(path, e))?;

    toml::from_str(&content).map_err(|e| {
        LandingSyncError::config(format!("failed to parse {}: {e}", path.display()))
    })
}

/// Create the config directory and write a default config file.
/// Returns the path to the created file.
pub fn init_config() -> Result<PathBuf> {
    let dir = config_dir()?;
    std::fs::create_dir_all(&dir).map_err(|e| LandingSyncError::io(&dir, e))?;

    let path = dir.join(CONFIG_FILE_NAME);
    let config = AppConfig::default();
    let content =
        toml::to_string_pretty(&config).map_err(|e| LandingSyncError::config(e.to_string()))?;

    std::fs::write(&path, content).map_err(|e| LandingSyncError::io(&path, e))?;
    tracing::info!(?path, "created default config file");

    Ok(path)
}
