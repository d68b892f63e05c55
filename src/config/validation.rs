use crate::config::types::{AuthConfig, Config, EvaluationConfig, OutputConfig, UserAgentConfig};
use crate::url::is_same_site;
use crate::ConfigError;
use url::Url;

/// Validates the entire configuration
///
/// Every failure that would otherwise surface mid-crawl (missing selectors,
/// unresolvable secrets, an unknown model, off-domain prescriptive URLs) is
/// reported here, before any network access.
pub fn validate(config: &Config) -> Result<(), ConfigError> {
    validate_crawl_config(config)?;
    validate_user_agent_config(&config.user_agent)?;
    if let Some(auth) = config.login() {
        validate_auth_config(auth, &config.base_domain()?)?;
    }
    validate_evaluation_config(config, &config.evaluation)?;
    validate_output_config(&config.output)?;
    Ok(())
}

/// Validates crawl bounds, the start URL and prescriptive URLs
fn validate_crawl_config(config: &Config) -> Result<(), ConfigError> {
    let crawl = &config.crawl;

    if crawl.max_pages < 1 {
        return Err(ConfigError::Validation(format!(
            "max-pages must be >= 1, got {}",
            crawl.max_pages
        )));
    }

    if crawl.navigation_timeout_ms < 1 {
        return Err(ConfigError::Validation(
            "navigation-timeout-ms must be >= 1".to_string(),
        ));
    }

    // Both resolve or fail with a descriptive error
    let start_url = config.start_url()?;
    let base_domain = config.base_domain()?;

    if !is_same_site(&start_url, &base_domain) {
        return Err(ConfigError::Validation(format!(
            "Start URL {} is outside base domain {}",
            start_url, base_domain
        )));
    }

    for url in config.prescriptive_urls()? {
        if !is_same_site(&url, &base_domain) {
            return Err(ConfigError::Validation(format!(
                "Prescriptive URL {} is outside base domain {}",
                url, base_domain
            )));
        }
    }

    Ok(())
}

/// Validates user agent configuration
fn validate_user_agent_config(config: &UserAgentConfig) -> Result<(), ConfigError> {
    // Validate crawler name: non-empty, alphanumeric + hyphens only
    if config.crawler_name.is_empty() {
        return Err(ConfigError::Validation(
            "crawler-name cannot be empty".to_string(),
        ));
    }

    if !config
        .crawler_name
        .chars()
        .all(|c| c.is_alphanumeric() || c == '-')
    {
        return Err(ConfigError::Validation(format!(
            "crawler-name must contain only alphanumeric characters and hyphens, got '{}'",
            config.crawler_name
        )));
    }

    if config.crawler_version.is_empty() {
        return Err(ConfigError::Validation(
            "crawler-version cannot be empty".to_string(),
        ));
    }

    Url::parse(&config.contact_url)
        .map_err(|e| ConfigError::InvalidUrl(format!("Invalid contact-url: {}", e)))?;

    Ok(())
}

/// Validates login settings and resolves the password
fn validate_auth_config(auth: &AuthConfig, base_domain: &str) -> Result<(), ConfigError> {
    let login_url = Url::parse(&auth.login_url)
        .map_err(|e| ConfigError::InvalidUrl(format!("Invalid login-url: {}", e)))?;
    if !matches!(login_url.scheme(), "http" | "https") {
        return Err(ConfigError::InvalidUrl(format!(
            "login-url must be http or https, got {}",
            auth.login_url
        )));
    }
    if !is_same_site(&login_url, base_domain) {
        return Err(ConfigError::Validation(format!(
            "login-url {} is outside base domain {}",
            auth.login_url, base_domain
        )));
    }

    if auth.username.is_empty() {
        return Err(ConfigError::Validation(
            "auth.username cannot be empty".to_string(),
        ));
    }

    for (key, selector) in [
        ("username-selector", &auth.username_selector),
        ("password-selector", &auth.password_selector),
        ("submit-selector", &auth.submit_selector),
    ] {
        if selector.trim().is_empty() {
            return Err(ConfigError::Validation(format!(
                "auth.{} cannot be empty",
                key
            )));
        }
        if scraper::Selector::parse(selector).is_err() {
            return Err(ConfigError::Validation(format!(
                "auth.{} is not a valid CSS selector: '{}'",
                key, selector
            )));
        }
    }

    auth.resolve_password()?;

    Ok(())
}

/// Validates the evaluation model and heuristics
fn validate_evaluation_config(
    config: &Config,
    evaluation: &EvaluationConfig,
) -> Result<(), ConfigError> {
    let pricing = config.pricing_table();
    if !pricing.contains(&evaluation.model) {
        return Err(ConfigError::Validation(format!(
            "Unknown model '{}'; known models: {}",
            evaluation.model,
            pricing.models().collect::<Vec<_>>().join(", ")
        )));
    }

    for (model, price) in &config.pricing {
        if price.input_price_per_thousand < 0.0 || price.output_price_per_thousand < 0.0 {
            return Err(ConfigError::Validation(format!(
                "Prices for model '{}' must be non-negative",
                model
            )));
        }
    }

    Url::parse(&evaluation.api_base)
        .map_err(|e| ConfigError::InvalidUrl(format!("Invalid api-base: {}", e)))?;

    if evaluation.max_content_chars < 1 {
        return Err(ConfigError::Validation(
            "max-content-chars must be >= 1".to_string(),
        ));
    }

    for heuristic in &evaluation.heuristics {
        if heuristic.name.trim().is_empty() {
            return Err(ConfigError::Validation(
                "Heuristic name cannot be empty".to_string(),
            ));
        }
        if heuristic.prompt.trim().is_empty() {
            return Err(ConfigError::Validation(format!(
                "Heuristic '{}' has an empty prompt",
                heuristic.name
            )));
        }
    }

    Ok(())
}

/// Validates output configuration
fn validate_output_config(config: &OutputConfig) -> Result<(), ConfigError> {
    for (key, path) in [
        ("report-path", &config.report_path),
        ("internal-markdown-path", &config.internal_markdown_path),
        ("internal-database-path", &config.internal_database_path),
    ] {
        if path.is_empty() {
            return Err(ConfigError::Validation(format!("{} cannot be empty", key)));
        }
    }

    Ok(())
}
