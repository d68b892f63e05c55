//! Browsing session used by the crawler and the auth navigator
//!
//! A [`Browser`] holds one current document and one cookie jar. The crawler
//! only ever needs a handful of primitives: navigate, read the current URL
//! and HTML, fill a form field, click an element and query the document by
//! CSS selector. [`HttpBrowser`] implements them over `reqwest` with a
//! cookie store so a login performed once carries over to every later fetch.

use crate::config::UserAgentConfig;
use crate::crawler::parser::collapse_whitespace;
use reqwest::{header::CONTENT_TYPE, Client, Method, Response};
use scraper::{ElementRef, Html, Selector};
use std::collections::HashMap;
use std::time::Duration;
use thiserror::Error;
use url::Url;

/// Errors raised by a browsing session
///
/// All of these are recoverable: the crawler records them against the URL
/// being fetched and moves on.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum BrowserError {
    #[error("Navigation to {url} timed out")]
    Timeout { url: String },

    #[error("Network error for {url}: {message}")]
    Network { url: String, message: String },

    #[error("HTTP {status} for {url}")]
    HttpStatus { url: String, status: u16 },

    #[error("Expected HTML from {url}, got {content_type}")]
    NotHtml { url: String, content_type: String },

    #[error("Invalid selector: {0}")]
    Selector(String),

    #[error("No element matches {0}")]
    ElementNotFound(String),

    #[error("Element {0} is not inside a form")]
    NoForm(String),

    #[error("No page is loaded")]
    NoPage,
}

/// Navigation primitives over a single browsing session
#[allow(async_fn_in_trait)]
pub trait Browser {
    /// Navigates to `url` and waits for the document to load
    ///
    /// Fails for network errors, HTTP status >= 400 and non-HTML responses.
    async fn goto(&mut self, url: &Url) -> Result<(), BrowserError>;

    /// URL of the current document after redirects
    fn current_url(&self) -> Option<&Url>;

    /// HTML of the current document
    fn content(&self) -> Option<&str>;

    /// Sets the value of the form field matched by `selector`
    fn fill(&mut self, selector: &str, value: &str) -> Result<(), BrowserError>;

    /// Clicks the element matched by `selector` and waits for any navigation
    async fn click(&mut self, selector: &str) -> Result<(), BrowserError>;

    /// Returns true if the current document contains a match for `selector`
    fn has_element(&self, selector: &str) -> Result<bool, BrowserError> {
        let html = self.content().ok_or(BrowserError::NoPage)?;
        let selector = parse_selector(selector)?;
        Ok(Html::parse_document(html).select(&selector).next().is_some())
    }

    /// Trimmed text of the first element matching `selector`, if any
    fn element_text(&self, selector: &str) -> Result<Option<String>, BrowserError> {
        let html = self.content().ok_or(BrowserError::NoPage)?;
        let selector = parse_selector(selector)?;
        let document = Html::parse_document(html);
        Ok(document
            .select(&selector)
            .next()
            .map(|element| collapse_whitespace(&element.text().collect::<String>())))
    }
}

/// Navigates with an upper bound on the whole navigation
pub async fn goto_within<B: Browser>(
    browser: &mut B,
    url: &Url,
    timeout: Duration,
) -> Result<(), BrowserError> {
    match tokio::time::timeout(timeout, browser.goto(url)).await {
        Ok(result) => result,
        Err(_) => Err(BrowserError::Timeout {
            url: url.to_string(),
        }),
    }
}

/// Clicks with an upper bound on the resulting navigation
pub async fn click_within<B: Browser>(
    browser: &mut B,
    selector: &str,
    timeout: Duration,
) -> Result<(), BrowserError> {
    let outcome = tokio::time::timeout(timeout, browser.click(selector)).await;
    match outcome {
        Ok(result) => result,
        Err(_) => Err(BrowserError::Timeout {
            url: browser
                .current_url()
                .map(|url| url.to_string())
                .unwrap_or_else(|| selector.to_string()),
        }),
    }
}

/// Parses a CSS selector, mapping failures to [`BrowserError::Selector`]
pub fn parse_selector(selector: &str) -> Result<Selector, BrowserError> {
    Selector::parse(selector).map_err(|_| BrowserError::Selector(selector.to_string()))
}

/// Builds an HTTP client with a cookie store and the crawler's user agent
///
/// # Arguments
///
/// * `config` - The user agent configuration
/// * `timeout` - Upper bound on any single request, including the body
///
/// # Returns
///
/// * `Ok(Client)` - Successfully built HTTP client
/// * `Err(reqwest::Error)` - Failed to build client
pub fn build_http_client(
    config: &UserAgentConfig,
    timeout: Duration,
) -> Result<Client, reqwest::Error> {
    Client::builder()
        .user_agent(config.header_value())
        .timeout(timeout)
        .connect_timeout(timeout.min(Duration::from_secs(10)))
        .cookie_store(true)
        .gzip(true)
        .brotli(true)
        .build()
}

/// The document currently loaded in an [`HttpBrowser`]
#[derive(Debug, Clone)]
struct LoadedPage {
    url: Url,
    html: String,
}

/// A form submission derived from the current document
#[derive(Debug, Clone, PartialEq)]
struct Submission {
    method: Method,
    action: Url,
    fields: Vec<(String, String)>,
}

/// [`Browser`] backed by a cookie-keeping `reqwest` client
///
/// Forms are submitted the way a browser would without scripts: named
/// fields of the enclosing form are collected, filled values override the
/// document's defaults, and the request goes to the form's action with its
/// method.
pub struct HttpBrowser {
    client: Client,
    current: Option<LoadedPage>,
    /// Field name -> value set via `fill`, cleared on every navigation
    filled: HashMap<String, String>,
}

impl HttpBrowser {
    pub fn new(client: Client) -> Self {
        Self {
            client,
            current: None,
            filled: HashMap::new(),
        }
    }

    /// Builds a browser with a fresh cookie jar
    pub fn from_config(config: &UserAgentConfig, timeout: Duration) -> Result<Self, reqwest::Error> {
        Ok(Self::new(build_http_client(config, timeout)?))
    }

    /// Sends a request and loads the response as the current document
    ///
    /// With `strict`, error statuses fail the navigation after the page is
    /// loaded. Form posts are lenient: sites commonly re-render a rejected
    /// login with a 4xx status.
    async fn navigate(
        &mut self,
        method: Method,
        url: Url,
        form: Option<Vec<(String, String)>>,
        strict: bool,
    ) -> Result<(), BrowserError> {
        let mut request = self.client.request(method, url.clone());
        if let Some(fields) = &form {
            request = request.form(fields);
        }

        let response = request
            .send()
            .await
            .map_err(|e| classify_reqwest_error(url.as_str(), &e))?;

        self.load(response, strict).await
    }

    async fn load(&mut self, response: Response, strict: bool) -> Result<(), BrowserError> {
        let final_url = response.url().clone();
        let status = response.status();

        let content_type = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(|v| v.to_lowercase());

        if let Some(content_type) = &content_type {
            if !content_type.contains("text/html") && !content_type.contains("xhtml") {
                return Err(BrowserError::NotHtml {
                    url: final_url.to_string(),
                    content_type: content_type.clone(),
                });
            }
        }

        let html = response
            .text()
            .await
            .map_err(|e| classify_reqwest_error(final_url.as_str(), &e))?;

        tracing::debug!("Loaded {} ({})", final_url, status.as_u16());

        self.filled.clear();
        self.current = Some(LoadedPage {
            url: final_url.clone(),
            html,
        });

        if strict && (status.is_client_error() || status.is_server_error()) {
            return Err(BrowserError::HttpStatus {
                url: final_url.to_string(),
                status: status.as_u16(),
            });
        }

        Ok(())
    }
}

impl Browser for HttpBrowser {
    async fn goto(&mut self, url: &Url) -> Result<(), BrowserError> {
        self.navigate(Method::GET, url.clone(), None, true).await
    }

    fn current_url(&self) -> Option<&Url> {
        self.current.as_ref().map(|page| &page.url)
    }

    fn content(&self) -> Option<&str> {
        self.current.as_ref().map(|page| page.html.as_str())
    }

    fn fill(&mut self, selector: &str, value: &str) -> Result<(), BrowserError> {
        let page = self.current.as_ref().ok_or(BrowserError::NoPage)?;
        let parsed = parse_selector(selector)?;
        let document = Html::parse_document(&page.html);

        let element = document
            .select(&parsed)
            .next()
            .ok_or_else(|| BrowserError::ElementNotFound(selector.to_string()))?;

        // Unnamed fields never reach the server
        let name = element
            .value()
            .attr("name")
            .or_else(|| element.value().attr("id"))
            .ok_or_else(|| BrowserError::ElementNotFound(format!("{} (no name)", selector)))?
            .to_string();

        self.filled.insert(name, value.to_string());
        Ok(())
    }

    async fn click(&mut self, selector: &str) -> Result<(), BrowserError> {
        let page = self.current.as_ref().ok_or(BrowserError::NoPage)?;
        let submission = build_submission(page, selector, &self.filled)?;

        tracing::debug!(
            "Submitting {} {} with {} fields",
            submission.method,
            submission.action,
            submission.fields.len()
        );

        match submission.method {
            Method::GET => {
                let mut action = submission.action;
                if !submission.fields.is_empty() {
                    action
                        .query_pairs_mut()
                        .clear()
                        .extend_pairs(submission.fields.iter());
                }
                self.navigate(Method::GET, action, None, false).await
            }
            method => {
                self.navigate(method, submission.action, Some(submission.fields), false)
                    .await
            }
        }
    }
}

/// Resolves what clicking `selector` on `page` does
///
/// Links navigate to their target. Anything else submits its enclosing form.
fn build_submission(
    page: &LoadedPage,
    selector: &str,
    filled: &HashMap<String, String>,
) -> Result<Submission, BrowserError> {
    let parsed = parse_selector(selector)?;
    let document = Html::parse_document(&page.html);

    let element = document
        .select(&parsed)
        .next()
        .ok_or_else(|| BrowserError::ElementNotFound(selector.to_string()))?;

    if element.value().name() == "a" {
        if let Some(href) = element.value().attr("href") {
            let action = page
                .url
                .join(href)
                .map_err(|_| BrowserError::ElementNotFound(format!("{} (bad href)", selector)))?;
            return Ok(Submission {
                method: Method::GET,
                action,
                fields: Vec::new(),
            });
        }
    }

    let form = if element.value().name() == "form" {
        element
    } else {
        element
            .ancestors()
            .filter_map(ElementRef::wrap)
            .find(|ancestor| ancestor.value().name() == "form")
            .ok_or_else(|| BrowserError::NoForm(selector.to_string()))?
    };

    let action = match form.value().attr("action").map(str::trim) {
        Some(action) if !action.is_empty() => page
            .url
            .join(action)
            .map_err(|_| BrowserError::NoForm(format!("{} (bad action)", selector)))?,
        _ => page.url.clone(),
    };

    let method = match form.value().attr("method") {
        Some(m) if m.eq_ignore_ascii_case("post") => Method::POST,
        _ => Method::GET,
    };

    let mut fields = collect_form_fields(form, filled);

    // The clicked button contributes its own name/value pair
    if matches!(element.value().name(), "button" | "input") {
        if let Some(name) = element.value().attr("name") {
            let value = element.value().attr("value").unwrap_or_default();
            fields.push((name.to_string(), value.to_string()));
        }
    }

    Ok(Submission {
        method,
        action,
        fields,
    })
}

/// Collects the successful controls of a form in document order
fn collect_form_fields(form: ElementRef<'_>, filled: &HashMap<String, String>) -> Vec<(String, String)> {
    let mut fields = Vec::new();
    let Ok(controls) = Selector::parse("input, textarea, select") else {
        return fields;
    };

    for control in form.select(&controls) {
        let attrs = control.value();
        let name = match attrs.attr("name").or_else(|| attrs.attr("id")) {
            Some(name) if !name.is_empty() => name,
            _ => continue,
        };

        if attrs.attr("disabled").is_some() {
            continue;
        }

        let default_value = match attrs.name() {
            "textarea" => control.text().collect::<String>(),
            "select" => selected_option(control),
            _ => {
                let kind = attrs.attr("type").unwrap_or("text").to_ascii_lowercase();
                match kind.as_str() {
                    "submit" | "button" | "image" | "reset" | "file" => continue,
                    "checkbox" | "radio" => {
                        if attrs.attr("checked").is_none() {
                            continue;
                        }
                        attrs.attr("value").unwrap_or("on").to_string()
                    }
                    _ => attrs.attr("value").unwrap_or_default().to_string(),
                }
            }
        };

        let value = filled.get(name).cloned().unwrap_or(default_value);
        fields.push((name.to_string(), value));
    }

    fields
}

fn selected_option(select: ElementRef<'_>) -> String {
    let Ok(options) = Selector::parse("option") else {
        return String::new();
    };
    let mut first = None;
    for option in select.select(&options) {
        let value = option
            .value()
            .attr("value")
            .map(str::to_string)
            .unwrap_or_else(|| option.text().collect::<String>().trim().to_string());
        if option.value().attr("selected").is_some() {
            return value;
        }
        first.get_or_insert(value);
    }
    first.unwrap_or_default()
}

/// Maps a reqwest error onto the browser error taxonomy
fn classify_reqwest_error(url: &str, error: &reqwest::Error) -> BrowserError {
    if error.is_timeout() {
        BrowserError::Timeout {
            url: url.to_string(),
        }
    } else {
        BrowserError::Network {
            url: url.to_string(),
            message: error.to_string(),
        }
    }
}
