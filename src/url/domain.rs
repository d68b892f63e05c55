use crate::UrlError;
use url::Url;

/// Returns the host key of a URL: the lowercase host plus any non-default port
///
/// Two URLs belong to the same site exactly when their host keys are equal,
/// so `https://example.com/` and `https://example.com:443/a` match while
/// `https://shop.example.com/` does not.
///
/// # Examples
///
/// ```
/// use sitemeter::url::host_key;
/// use url::Url;
///
/// let url = Url::parse("http://Example.COM:8080/page").unwrap();
/// assert_eq!(host_key(&url), Some("example.com:8080".to_string()));
/// ```
pub fn host_key(url: &Url) -> Option<String> {
    let host = url.host_str()?.to_lowercase();
    Some(match url.port() {
        Some(port) => format!("{}:{}", host, port),
        None => host,
    })
}

/// Returns true if the URL's host key equals the given base domain
pub fn is_same_site(url: &Url, base_domain: &str) -> bool {
    host_key(url).is_some_and(|key| key.eq_ignore_ascii_case(base_domain))
}

/// Normalizes a configured base domain
///
/// Accepts either a bare host (`example.com`, `localhost:8080`) or a full URL,
/// and returns its host key.
pub fn parse_base_domain(value: &str) -> Result<String, UrlError> {
    let value = value.trim();
    if value.is_empty() {
        return Err(UrlError::MissingDomain);
    }

    let candidate = if value.contains("://") {
        value.to_string()
    } else {
        format!("https://{}/", value)
    };

    let url = Url::parse(&candidate).map_err(|e| UrlError::Parse(e.to_string()))?;
    host_key(&url).ok_or(UrlError::MissingDomain)
}
