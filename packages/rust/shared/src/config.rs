//! Application configuration for Autopress.
//!
//! User config lives at `~/.autopress/autopress.toml`.
//! Per-site values in `[[sites]]` override the `[automation]` defaults.
//! Secrets never live in the file: it names the environment variables that hold them.

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{AutopressError, Result};
use crate::types::{CategoryProfile, CmsCredentials, ImageService, ImageSettings, OperatingWindow, Site};

/// Default configuration file name.
const CONFIG_FILE_NAME: &str = "autopress.toml";

/// Default config directory name under the user's home.
const CONFIG_DIR_NAME: &str = ".autopress";

// ---------------------------------------------------------------------------
// Config structs (matching autopress.toml schema)
// ---------------------------------------------------------------------------

/// Top-level application config, deserialized from TOML.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// Global paths and pacing.
    #[serde(default)]
    pub defaults: DefaultsConfig,

    /// Anthropic (Claude) settings.
    #[serde(default)]
    pub anthropic: AnthropicConfig,

    /// Unsplash stock photo settings.
    #[serde(default)]
    pub unsplash: UnsplashConfig,

    /// Generative image services.
    #[serde(default)]
    pub image_generation: ImageGenerationConfig,

    /// Automation defaults applied to every site.
    #[serde(default)]
    pub automation: AutomationConfig,

    /// Category selector weights and duplicate-topic threshold.
    #[serde(default)]
    pub scoring: ScoringConfig,

    /// Category keyword table.
    #[serde(default = "default_categories")]
    pub categories: Vec<CategoryProfile>,

    /// Managed sites, in scheduling order.
    #[serde(default)]
    pub sites: Vec<SiteEntry>,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            defaults: DefaultsConfig::default(),
            anthropic: AnthropicConfig::default(),
            unsplash: UnsplashConfig::default(),
            image_generation: ImageGenerationConfig::default(),
            automation: AutomationConfig::default(),
            scoring: ScoringConfig::default(),
            categories: default_categories(),
            sites: Vec::new(),
        }
    }
}

/// `[defaults]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DefaultsConfig {
    /// libSQL database file.
    #[serde(default = "default_database_path")]
    pub database_path: String,

    /// Directory for generated cover images.
    #[serde(default = "default_image_dir")]
    pub image_dir: String,

    /// Seconds to wait between posts when publishing pending drafts.
    #[serde(default = "default_pending_interval")]
    pub pending_interval_secs: u64,
}

impl Default for DefaultsConfig {
    fn default() -> Self {
        Self {
            database_path: default_database_path(),
            image_dir: default_image_dir(),
            pending_interval_secs: default_pending_interval(),
        }
    }
}

fn default_database_path() -> String {
    "~/.autopress/autopress.db".into()
}
fn default_image_dir() -> String {
    "~/.autopress/images".into()
}
fn default_pending_interval() -> u64 {
    30
}

/// `[anthropic]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnthropicConfig {
    /// Name of the env var holding the API key (never store the key itself).
    #[serde(default = "default_anthropic_key_env")]
    pub api_key_env: String,

    /// Model used for both strategy and article generation.
    #[serde(default = "default_anthropic_model")]
    pub model: String,

    /// Response token ceiling.
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,

    /// API base URL; overridden in tests.
    #[serde(default = "default_anthropic_base_url")]
    pub base_url: String,
}

impl Default for AnthropicConfig {
    fn default() -> Self {
        Self {
            api_key_env: default_anthropic_key_env(),
            model: default_anthropic_model(),
            max_tokens: default_max_tokens(),
            base_url: default_anthropic_base_url(),
        }
    }
}

fn default_anthropic_key_env() -> String {
    "ANTHROPIC_API_KEY".into()
}
fn default_anthropic_model() -> String {
    "claude-sonnet-4-20250514".into()
}
fn default_max_tokens() -> u32 {
    8000
}
fn default_anthropic_base_url() -> String {
    "https://api.anthropic.com".into()
}

/// `[unsplash]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UnsplashConfig {
    /// Name of the env var holding the access key.
    #[serde(default = "default_unsplash_key_env")]
    pub access_key_env: String,

    #[serde(default = "default_unsplash_base_url")]
    pub base_url: String,
}

impl Default for UnsplashConfig {
    fn default() -> Self {
        Self {
            access_key_env: default_unsplash_key_env(),
            base_url: default_unsplash_base_url(),
        }
    }
}

fn default_unsplash_key_env() -> String {
    "UNSPLASH_ACCESS_KEY".into()
}
fn default_unsplash_base_url() -> String {
    "https://api.unsplash.com".into()
}

/// `[image_generation]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImageGenerationConfig {
    #[serde(default = "default_openai_key_env")]
    pub openai_api_key_env: String,

    #[serde(default = "default_openai_model")]
    pub openai_model: String,

    #[serde(default = "default_openai_base_url")]
    pub openai_base_url: String,

    #[serde(default = "default_gemini_key_env")]
    pub gemini_api_key_env: String,

    #[serde(default = "default_gemini_model")]
    pub gemini_model: String,

    #[serde(default = "default_gemini_base_url")]
    pub gemini_base_url: String,
}

impl Default for ImageGenerationConfig {
    fn default() -> Self {
        Self {
            openai_api_key_env: default_openai_key_env(),
            openai_model: default_openai_model(),
            openai_base_url: default_openai_base_url(),
            gemini_api_key_env: default_gemini_key_env(),
            gemini_model: default_gemini_model(),
            gemini_base_url: default_gemini_base_url(),
        }
    }
}

fn default_openai_key_env() -> String {
    "OPENAI_API_KEY".into()
}
fn default_openai_model() -> String {
    "gpt-image-1".into()
}
fn default_openai_base_url() -> String {
    "https://api.openai.com".into()
}
fn default_gemini_key_env() -> String {
    "GEMINI_API_KEY".into()
}
fn default_gemini_model() -> String {
    "gemini-2.0-flash-preview-image-generation".into()
}
fn default_gemini_base_url() -> String {
    "https://generativelanguage.googleapis.com".into()
}

/// `[automation]` section: defaults for every site.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AutomationConfig {
    #[serde(default = "default_max_per_day")]
    pub max_articles_per_day: u32,

    /// Delay between sites, and the scheduler tick interval.
    #[serde(default = "default_min_interval")]
    pub min_interval_minutes: u64,

    #[serde(default = "default_start_hour")]
    pub operation_start_hour: u32,

    #[serde(default = "default_end_hour")]
    pub operation_end_hour: u32,

    #[serde(default = "default_true")]
    pub auto_publish: bool,

    #[serde(default)]
    pub require_approval: bool,

    /// Target article length in characters.
    #[serde(default = "default_article_length")]
    pub article_length: u32,
}

impl Default for AutomationConfig {
    fn default() -> Self {
        Self {
            max_articles_per_day: default_max_per_day(),
            min_interval_minutes: default_min_interval(),
            operation_start_hour: default_start_hour(),
            operation_end_hour: default_end_hour(),
            auto_publish: true,
            require_approval: false,
            article_length: default_article_length(),
        }
    }
}

impl AutomationConfig {
    /// Interval between scheduler ticks.
    pub fn tick_interval(&self) -> Duration {
        Duration::from_secs(self.min_interval_minutes * 60)
    }
}

fn default_true() -> bool {
    true
}
fn default_max_per_day() -> u32 {
    5
}
fn default_min_interval() -> u64 {
    120
}
fn default_start_hour() -> u32 {
    6
}
fn default_end_hour() -> u32 {
    23
}
fn default_article_length() -> u32 {
    7000
}

/// `[scoring]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScoringConfig {
    /// Multiplier for keyword hits in the title.
    #[serde(default = "default_title_weight")]
    pub title_weight: u32,

    /// Points per tag that equals a keyword.
    #[serde(default = "default_tag_weight")]
    pub tag_weight: u32,

    /// Jaccard similarity above which a suggested title is a duplicate.
    #[serde(default = "default_duplicate_threshold")]
    pub duplicate_threshold: f64,

    /// Category name fragment used when nothing scores.
    #[serde(default = "default_fallback_label")]
    pub fallback_label: String,
}

impl Default for ScoringConfig {
    fn default() -> Self {
        Self {
            title_weight: default_title_weight(),
            tag_weight: default_tag_weight(),
            duplicate_threshold: default_duplicate_threshold(),
            fallback_label: default_fallback_label(),
        }
    }
}

fn default_title_weight() -> u32 {
    3
}
fn default_tag_weight() -> u32 {
    5
}
fn default_duplicate_threshold() -> f64 {
    0.7
}
fn default_fallback_label() -> String {
    "ブログ".into()
}

fn profile(label: &str, keywords: &[&str]) -> CategoryProfile {
    CategoryProfile {
        label: label.into(),
        keywords: keywords.iter().map(|k| (*k).to_string()).collect(),
    }
}

/// The built-in side-business keyword table.
pub fn default_categories() -> Vec<CategoryProfile> {
    vec![
        profile(
            "ブログ・アフィリエイト副業",
            &[
                "ブログ", "アフィリエイト", "SEO", "記事", "執筆", "WordPress", "コンテンツ",
                "ライティング", "アドセンス", "ASP", "収益化",
            ],
        ),
        profile(
            "ネット副業・在宅ワーク",
            &[
                "在宅", "リモート", "オンライン", "ネット副業", "在宅ワーク", "テレワーク",
                "クラウドソーシング", "副業", "ネットビジネス",
            ],
        ),
        profile(
            "スキル販売・フリーランス",
            &[
                "スキル", "フリーランス", "ココナラ", "クラウドワークス", "ランサーズ",
                "スキルシェア", "個人事業", "独立", "フリーランサー",
            ],
        ),
        profile(
            "動画編集・コンテンツ制作",
            &[
                "動画", "YouTube", "編集", "コンテンツ", "制作", "クリエイター", "映像",
                "Premier", "After Effects", "動画編集",
            ],
        ),
        profile(
            "投資・資産運用",
            &[
                "投資", "資産運用", "株", "FX", "仮想通貨", "不動産", "NISA", "iDeCo", "積立",
                "配当",
            ],
        ),
        profile(
            "物販せどり副業",
            &[
                "せどり", "転売", "物販", "メルカリ", "ヤフオク", "Amazon", "仕入れ", "販売",
                "ネットショップ", "EC",
            ],
        ),
        profile(
            "副業の税金・確定申告",
            &[
                "税金", "確定申告", "税務", "節税", "経費", "控除", "税理士", "申告", "納税",
                "所得税",
            ],
        ),
    ]
}

/// `[[sites]]` entry. Unset automation fields fall back to `[automation]`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SiteEntry {
    /// Stable identifier; articles reference it.
    pub id: String,
    pub name: String,
    /// WordPress base URL.
    pub url: String,
    #[serde(default)]
    pub genre: String,
    #[serde(default)]
    pub target_audience: String,
    #[serde(default)]
    pub keywords_focus: Vec<String>,
    #[serde(default)]
    pub tone: String,

    /// WordPress user name.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
    /// Env var holding the WordPress application password.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub app_password_env: Option<String>,

    #[serde(default = "default_true")]
    pub enabled: bool,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_articles_per_day: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min_interval_minutes: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub operation_start_hour: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub operation_end_hour: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub auto_publish: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub require_approval: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub article_length: Option<u32>,

    #[serde(default)]
    pub image: SiteImageConfig,
}

/// `[sites.image]` sub-table.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SiteImageConfig {
    /// One of `none`, `auto`, `gpt_image`, `gemini_image`, `unsplash`.
    #[serde(default = "default_image_service")]
    pub service: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub style: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tone: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub instructions: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub quality: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub avoid_terms: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub size: Option<String>,
}

impl Default for SiteImageConfig {
    fn default() -> Self {
        Self {
            service: default_image_service(),
            style: None,
            tone: None,
            instructions: None,
            quality: None,
            avoid_terms: None,
            size: None,
        }
    }
}

fn default_image_service() -> String {
    "auto".into()
}

impl SiteImageConfig {
    fn resolve(&self) -> Result<ImageSettings> {
        let base = ImageSettings::default();
        Ok(ImageSettings {
            service: self.service.parse::<ImageService>()?,
            style: self.style.clone().unwrap_or(base.style),
            tone: self.tone.clone().unwrap_or(base.tone),
            instructions: self.instructions.clone().unwrap_or(base.instructions),
            quality: self.quality.clone().unwrap_or(base.quality),
            avoid_terms: self.avoid_terms.clone().unwrap_or(base.avoid_terms),
            size: self.size.clone().unwrap_or(base.size),
        })
    }
}

// ---------------------------------------------------------------------------
// Validation and site resolution
// ---------------------------------------------------------------------------

impl AppConfig {
    /// Check invariants that cannot be expressed in the TOML schema.
    pub fn validate(&self) -> Result<()> {
        for profile in &self.categories {
            if profile.label.trim().is_empty() {
                return Err(AutopressError::config("category label must not be empty"));
            }
            if profile.keywords.is_empty() || profile.keywords.iter().any(|k| k.trim().is_empty()) {
                return Err(AutopressError::config(format!(
                    "category '{}' needs at least one non-empty keyword",
                    profile.label
                )));
            }
        }

        let mut seen = HashSet::new();
        for entry in &self.sites {
            if entry.id.trim().is_empty() {
                return Err(AutopressError::config(format!(
                    "site '{}' has an empty id",
                    entry.name
                )));
            }
            if !seen.insert(entry.id.as_str()) {
                return Err(AutopressError::config(format!(
                    "duplicate site id '{}'",
                    entry.id
                )));
            }
            self.resolve_entry(entry, false)?;
        }
        Ok(())
    }

    /// Resolve every `[[sites]]` entry into runtime [`Site`] records, in order.
    ///
    /// Credentials are read from the environment. A missing password is an
    /// error for an enabled auto-publishing site; any other site resolves
    /// without credentials.
    pub fn resolve_sites(&self) -> Result<Vec<Site>> {
        self.sites
            .iter()
            .map(|entry| self.resolve_entry(entry, true))
            .collect()
    }

    /// Look up a single resolved site by id.
    pub fn site(&self, id: &str) -> Result<Site> {
        let entry = self
            .sites
            .iter()
            .find(|s| s.id == id)
            .ok_or_else(|| AutopressError::config(format!("no site with id '{id}'")))?;
        self.resolve_entry(entry, true)
    }

    fn resolve_entry(
        &self,
        entry: &SiteEntry,
        read_credentials: bool,
    ) -> Result<Site> {
        let auto = &self.automation;
        let daily_quota = entry.max_articles_per_day.unwrap_or(auto.max_articles_per_day);
        let auto_publish = entry.auto_publish.unwrap_or(auto.auto_publish);
        let start = entry.operation_start_hour.unwrap_or(auto.operation_start_hour);
        let end = entry.operation_end_hour.unwrap_or(auto.operation_end_hour);

        if daily_quota == 0 && auto_publish && entry.enabled {
            return Err(AutopressError::config(format!(
                "site '{}' has auto_publish enabled with a daily quota of 0",
                entry.id
            )));
        }
        if start > 23 || end > 23 {
            return Err(AutopressError::config(format!(
                "site '{}' operating hours must be within 0-23 (got {start}-{end})",
                entry.id
            )));
        }

        let credentials = match (&entry.username, &entry.app_password_env) {
            (Some(username), Some(var)) if read_credentials => match read_env(var) {
                Some(app_password) => Some(CmsCredentials {
                    username: username.clone(),
                    app_password,
                }),
                None if auto_publish && entry.enabled => {
                    return Err(AutopressError::config(format!(
                        "site '{}' publishes automatically but {var} is not set",
                        entry.id
                    )));
                }
                None => {
                    tracing::warn!(site = %entry.id, env = %var, "application password env var not set");
                    None
                }
            },
            _ => None,
        };

        Ok(Site {
            id: entry.id.clone(),
            name: entry.name.clone(),
            url: entry.url.trim_end_matches('/').to_string(),
            genre: entry.genre.clone(),
            target_audience: entry.target_audience.clone(),
            keywords_focus: entry.keywords_focus.clone(),
            daily_quota,
            min_interval: Duration::from_secs(
                entry.min_interval_minutes.unwrap_or(auto.min_interval_minutes) * 60,
            ),
            operating_hours: OperatingWindow { start, end },
            auto_publish,
            require_approval: entry.require_approval.unwrap_or(auto.require_approval),
            article_length: entry.article_length.unwrap_or(auto.article_length),
            tone: entry.tone.clone(),
            image: entry.image.resolve()?,
            credentials,
            enabled: entry.enabled,
        })
    }
}

fn read_env(var: &str) -> Option<String> {
    std::env::var(var).ok().filter(|v| !v.is_empty())
}

/// Expand a leading `~/` to the user's home directory.
pub fn expand_home(path: &str) -> PathBuf {
    match path.strip_prefix("~/") {
        Some(rest) => dirs::home_dir()
            .map(|home| home.join(rest))
            .unwrap_or_else(|| PathBuf::from(path)),
        None => PathBuf::from(path),
    }
}

// ---------------------------------------------------------------------------
// Config loading
// ---------------------------------------------------------------------------

/// Get the path to the config directory (`~/.autopress/`).
pub fn config_dir() -> Result<PathBuf> {
    let home = dirs::home_dir()
        .ok_or_else(|| AutopressError::config("could not determine home directory"))?;
    Ok(home.join(CONFIG_DIR_NAME))
}

/// Get the path to the config file (`~/.autopress/autopress.toml`).
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

/// Load and validate the application config from a specific file path.
pub fn load_config_from(path: &Path) -> Result<AppConfig> {
    let content = std::fs::read_to_string(path).map_err(|e| AutopressError::io(path, e))?;

    let config: AppConfig = toml::from_str(&content).map_err(|e| {
        AutopressError::config(format!("failed to parse {}: {e}", path.display()))
    })?;
    config.validate()?;
    Ok(config)
}

/// Create the config directory and write a default config file.
/// Returns the path to the created file.
pub fn init_config() -> Result<PathBuf> {
    let dir = config_dir()?;
    std::fs::create_dir_all(&dir).map_err(|e| AutopressError::io(&dir, e))?;

    let path = dir.join(CONFIG_FILE_NAME);
    let config = AppConfig::default();
    let content =
        toml::to_string_pretty(&config).map_err(|e| AutopressError::config(e.to_string()))?;

    std::fs::write(&path, content).map_err(|e| AutopressError::io(&path, e))?;
    tracing::info!(?path, "created default config file");

    Ok(path)
}

/// Check that the Anthropic API key env var is set and non-empty.
pub fn validate_api_key(config: &AppConfig) -> Result<()> {
    let var_name = &config.anthropic.api_key_env;
    match std::env::var(var_name) {
        Ok(val) if !val.is_empty() => Ok(()),
        _ => Err(AutopressError::config(format!(
            "Anthropic API key not found. Set the {var_name} environment variable.\n\
             Get a key at https://console.anthropic.com/settings/keys"
        ))),
    }
}
