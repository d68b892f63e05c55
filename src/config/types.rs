use crate::metrics::{ModelPricing, PricingTable, DEFAULT_MODEL};
use crate::url::{normalize_url, parse_base_domain};
use crate::ConfigError;
use serde::Deserialize;
use std::collections::BTreeMap;
use std::time::Duration;
use url::Url;

/// Main configuration structure for Sitemeter
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub crawl: CrawlConfig,

    #[serde(rename = "user-agent")]
    pub user_agent: UserAgentConfig,

    /// Login settings; absent for public sites
    #[serde(default)]
    pub auth: Option<AuthConfig>,

    #[serde(default)]
    pub evaluation: EvaluationConfig,

    /// Additional or overriding model prices, keyed by model id
    #[serde(default)]
    pub pricing: BTreeMap<String, ModelPricing>,

    pub output: OutputConfig,
}

/// Crawl bounds and pacing
#[derive(Debug, Clone, Deserialize)]
pub struct CrawlConfig {
    /// Where the crawl begins; defaults to the login URL when omitted
    #[serde(rename = "start-url", default)]
    pub start_url: Option<String>,

    /// Host (with optional port) the crawl is confined to
    #[serde(rename = "base-domain", default)]
    pub base_domain: Option<String>,

    /// Maximum number of pages to crawl
    #[serde(rename = "max-pages")]
    pub max_pages: u32,

    /// Maximum link depth from the start URL
    #[serde(rename = "max-depth", default = "default_max_depth")]
    pub max_depth: u32,

    /// URLs crawled first, in order, at depth 0
    #[serde(rename = "prescriptive-urls", default)]
    pub prescriptive_urls: Vec<String>,

    /// Upper bound on any single navigation (milliseconds)
    #[serde(rename = "navigation-timeout-ms", default = "default_navigation_timeout_ms")]
    pub navigation_timeout_ms: u64,

    /// Pause between consecutive fetches (milliseconds)
    #[serde(rename = "politeness-delay-ms", default = "default_politeness_delay_ms")]
    pub politeness_delay_ms: u64,
}

/// User agent identification configuration
#[derive(Debug, Clone, Deserialize)]
pub struct UserAgentConfig {
    /// Name of the crawler
    #[serde(rename = "crawler-name")]
    pub crawler_name: String,

    /// Version of the crawler
    #[serde(rename = "crawler-version")]
    pub crawler_version: String,

    /// URL with information about the crawler
    #[serde(rename = "contact-url")]
    pub contact_url: String,
}

impl UserAgentConfig {
    /// Formats the User-Agent header: `Name/Version (+ContactURL)`
    pub fn header_value(&self) -> String {
        format!(
            "{}/{} (+{})",
            self.crawler_name, self.crawler_version, self.contact_url
        )
    }
}

/// Login form settings
#[derive(Debug, Clone, Deserialize)]
pub struct AuthConfig {
    #[serde(rename = "requires-login", default = "default_true")]
    pub requires_login: bool,

    #[serde(rename = "login-url")]
    pub login_url: String,

    pub username: String,

    /// Inline password; prefer `password-env`
    #[serde(default)]
    pub password: Option<String>,

    /// Environment variable holding the password
    #[serde(rename = "password-env", default)]
    pub password_env: Option<String>,

    #[serde(rename = "username-selector")]
    pub username_selector: String,

    #[serde(rename = "password-selector")]
    pub password_selector: String,

    #[serde(rename = "submit-selector")]
    pub submit_selector: String,
}

impl AuthConfig {
    /// Resolves the password from the inline value or the environment
    ///
    /// # Returns
    ///
    /// * `Ok(String)` - The password
    /// * `Err(ConfigError::MissingSecret)` - The named variable is not set
    /// * `Err(ConfigError::Validation)` - Neither source is configured
    pub fn resolve_password(&self) -> Result<String, ConfigError> {
        if let Some(password) = &self.password {
            return Ok(password.clone());
        }

        match &self.password_env {
            Some(var) => {
                std::env::var(var).map_err(|_| ConfigError::MissingSecret(var.clone()))
            }
            None => Err(ConfigError::Validation(
                "auth requires either password or password-env".to_string(),
            )),
        }
    }
}

/// LLM evaluation settings
#[derive(Debug, Clone, Deserialize)]
pub struct EvaluationConfig {
    /// Model id; must be present in the pricing table
    #[serde(default = "default_model")]
    pub model: String,

    /// Base URL of an OpenAI-compatible API
    #[serde(rename = "api-base", default = "default_api_base")]
    pub api_base: String,

    /// Environment variable holding the API key
    #[serde(rename = "api-key-env", default = "default_api_key_env")]
    pub api_key_env: String,

    #[serde(rename = "max-output-tokens", default = "default_max_output_tokens")]
    pub max_output_tokens: u32,

    /// Page text beyond this many characters is not sent
    #[serde(rename = "max-content-chars", default = "default_max_content_chars")]
    pub max_content_chars: usize,

    /// Placeholder in heuristic prompts replaced by the site URL
    #[serde(rename = "site-placeholder", default = "default_site_placeholder")]
    pub site_placeholder: String,

    #[serde(default)]
    pub heuristics: Vec<HeuristicConfig>,
}

impl Default for EvaluationConfig {
    fn default() -> Self {
        Self {
            model: default_model(),
            api_base: default_api_base(),
            api_key_env: default_api_key_env(),
            max_output_tokens: default_max_output_tokens(),
            max_content_chars: default_max_content_chars(),
            site_placeholder: default_site_placeholder(),
            heuristics: Vec::new(),
        }
    }
}

/// One heuristic and the prompt used to evaluate it
#[derive(Debug, Clone, Deserialize)]
pub struct HeuristicConfig {
    pub name: String,
    pub prompt: String,
}

/// Output configuration
#[derive(Debug, Clone, Deserialize)]
pub struct OutputConfig {
    /// Client-facing evaluation report (markdown)
    #[serde(rename = "report-path")]
    pub report_path: String,

    /// Internal URL-level audit (markdown)
    #[serde(rename = "internal-markdown-path")]
    pub internal_markdown_path: String,

    /// Internal audit workbook (SQLite)
    #[serde(rename = "internal-database-path")]
    pub internal_database_path: String,

    /// Optional machine-readable metrics summary
    #[serde(rename = "summary-json-path", default)]
    pub summary_json_path: Option<String>,
}

impl Config {
    /// Returns the auth section when login is actually required
    pub fn login(&self) -> Option<&AuthConfig> {
        self.auth.as_ref().filter(|auth| auth.requires_login)
    }

    /// Resolves the crawl start URL, falling back to the login URL
    pub fn start_url(&self) -> Result<Url, ConfigError> {
        let raw = match (&self.crawl.start_url, self.login()) {
            (Some(start), _) => start.as_str(),
            (None, Some(auth)) => auth.login_url.as_str(),
            (None, None) => {
                return Err(ConfigError::Validation(
                    "crawl.start-url is required when login is not configured".to_string(),
                ))
            }
        };

        normalize_url(raw).map_err(|e| ConfigError::InvalidUrl(format!("{}: {}", raw, e)))
    }

    /// Resolves the base domain from `base-domain` or the start URL's host
    pub fn base_domain(&self) -> Result<String, ConfigError> {
        match &self.crawl.base_domain {
            Some(domain) => parse_base_domain(domain)
                .map_err(|e| ConfigError::Validation(format!("Invalid base-domain: {}", e))),
            None => {
                let start = self.start_url()?;
                crate::url::host_key(&start).ok_or_else(|| {
                    ConfigError::Validation(format!("Start URL {} has no host", start))
                })
            }
        }
    }

    /// Normalized prescriptive URLs with duplicates removed, in configured order
    pub fn prescriptive_urls(&self) -> Result<Vec<Url>, ConfigError> {
        let mut urls: Vec<Url> = Vec::new();
        for raw in &self.crawl.prescriptive_urls {
            let url = normalize_url(raw)
                .map_err(|e| ConfigError::InvalidUrl(format!("{}: {}", raw, e)))?;
            if !urls.contains(&url) {
                urls.push(url);
            }
        }
        Ok(urls)
    }

    pub fn navigation_timeout(&self) -> Duration {
        Duration::from_millis(self.crawl.navigation_timeout_ms)
    }

    pub fn politeness_delay(&self) -> Duration {
        Duration::from_millis(self.crawl.politeness_delay_ms)
    }

    /// Built-in prices merged with the `[pricing]` section
    pub fn pricing_table(&self) -> PricingTable {
        PricingTable::with_overrides(&self.pricing)
    }
}

fn default_max_depth() -> u32 {
    2
}

fn default_navigation_timeout_ms() -> u64 {
    120_000
}

fn default_politeness_delay_ms() -> u64 {
    300
}

fn default_true() -> bool {
    true
}

fn default_model() -> String {
    DEFAULT_MODEL.to_string()
}

fn default_api_base() -> String {
    "https://api.openai.com/v1".to_string()
}

fn default_api_key_env() -> String {
    "OPENAI_API_KEY".to_string()
}

fn default_max_output_tokens() -> u32 {
    4000
}

fn default_max_content_chars() -> usize {
    20_000
}

fn default_site_placeholder() -> String {
    "[Enter Website URL Here]".to_string()
}
