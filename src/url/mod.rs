//! URL handling module for Sitemeter
//!
//! This module provides URL normalization and the host matching used to keep
//! a crawl on its base domain.

mod domain;
mod normalize;

// Re-export main functions
pub use domain::{host_key, is_same_site, parse_base_domain};
pub use normalize::normalize_url;
