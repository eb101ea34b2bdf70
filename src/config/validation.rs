use crate::cache::resource_key;
use crate::config::types::{Config, CrawlerConfig, LimitsConfig, RenderConfig, ResolvedResource, ResourceConfig};
use crate::crawler::CrawlTarget;
use crate::url::{is_private_host, normalize_url};
use crate::{ConfigError, ValidationError};
use std::collections::HashSet;
use url::Url;

/// Validates the entire configuration, including every resource
pub fn validate(config: &Config) -> Result<(), ConfigError> {
    validate_crawler_config(&config.crawler)?;
    validate_storage_config(config)?;
    validate_limits_config(&config.limits)?;
    validate_render_config(&config.render)?;
    resolve_resources(config)?;
    Ok(())
}

/// Validates and resolves every `[[resource]]` entry into a crawl target
///
/// Numeric fields are clamped into the configured limits. Two resources
/// may not share a resource key.
pub fn resolve_resources(config: &Config) -> Result<Vec<ResolvedResource>, ConfigError> {
    let mut keys = HashSet::new();
    let mut resolved = Vec::with_capacity(config.resources.len());

    for resource in &config.resources {
        let entry = resolve_resource(resource, &config.limits).map_err(|source| ConfigError::Resource {
            name: resource.name.clone(),
            source,
        })?;

        if !keys.insert(entry.key.clone()) {
            return Err(ConfigError::Validation(format!(
                "Resource '{}' maps to key '{}', which is already used",
                resource.name, entry.key
            )));
        }
        resolved.push(entry);
    }
    Ok(resolved)
}

/// Resolves a single resource against the limits
pub fn resolve_resource(resource: &ResourceConfig, limits: &LimitsConfig) -> Result<ResolvedResource, ValidationError> {
    let key = resource_key(&resource.name).ok_or_else(|| ValidationError::InvalidName(resource.name.clone()))?;
    let start_url = validate_website_url(&resource.url)?;

    let target = CrawlTarget {
        start_url,
        max_pages: clamp(resource.max_pages, limits.default_max_pages, 1, limits.max_pages_cap) as usize,
        max_depth: clamp(resource.max_depth, limits.default_max_depth, 0, limits.max_depth_cap) as u32,
        ttl_hours: clamp(resource.ttl_hours, limits.default_ttl_hours, 1, limits.max_ttl_hours),
    };

    Ok(ResolvedResource {
        name: resource.name.clone(),
        key,
        target,
    })
}

/// Checks that a website URL is HTTPS on a public host and normalizes it
///
/// # Examples
///
/// ```
/// use sitesnap::config::validate_website_url;
///
/// let url = validate_website_url("https://Example.com/docs/#intro").unwrap();
/// assert_eq!(url.as_str(), "https://example.com/docs");
///
/// assert!(validate_website_url("http://example.com/").is_err());
/// assert!(validate_website_url("https://localhost/").is_err());
/// ```
pub fn validate_website_url(input: &str) -> Result<Url, ValidationError> {
    let url = Url::parse(input.trim()).map_err(|source| ValidationError::Parse {
        url: input.to_string(),
        source,
    })?;

    if url.scheme() != "https" {
        return Err(ValidationError::NotHttps(input.to_string()));
    }
    let Some(host) = url.host_str() else {
        return Err(ValidationError::MissingHost(input.to_string()));
    };
    if is_private_host(&url) {
        return Err(ValidationError::PrivateHost(host.to_string()));
    }

    normalize_url(url.as_str(), None).ok_or_else(|| ValidationError::MissingHost(input.to_string()))
}

/// Applies the default when unset, then clamps into `[min, max]`
fn clamp(value: Option<i64>, default: u64, min: u64, max: u64) -> u64 {
    let max = max.max(min);
    match value {
        None => default.clamp(min, max),
        Some(v) if v < 0 => min,
        Some(v) => (v as u64).clamp(min, max),
    }
}

/// Validates crawler configuration
fn validate_crawler_config(config: &CrawlerConfig) -> Result<(), ConfigError> {
    if config.user_agent.trim().is_empty() {
        return Err(ConfigError::Validation("user-agent cannot be empty".to_string()));
    }

    // Robots agent token: non-empty, alphanumeric + hyphens/underscores only
    if config.robots_agent.is_empty()
        || !config
            .robots_agent
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
    {
        return Err(ConfigError::Validation(format!(
            "robots-agent must be a non-empty token of letters, digits, '-' or '_', got '{}'",
            config.robots_agent
        )));
    }

    for (name, secs) in [
        ("robots-timeout-secs", config.robots_timeout_secs),
        ("sitemap-timeout-secs", config.sitemap_timeout_secs),
        ("page-timeout-secs", config.page_timeout_secs),
    ] {
        if secs < 1 {
            return Err(ConfigError::Validation(format!("{} must be >= 1, got {}", name, secs)));
        }
    }

    Ok(())
}

/// Validates storage configuration
fn validate_storage_config(config: &Config) -> Result<(), ConfigError> {
    if config.storage.resources_dir.as_os_str().is_empty() {
        return Err(ConfigError::Validation("resources-dir cannot be empty".to_string()));
    }
    Ok(())
}

/// Validates the clamp bounds
fn validate_limits_config(limits: &LimitsConfig) -> Result<(), ConfigError> {
    if limits.max_pages_cap < 1 {
        return Err(ConfigError::Validation(format!(
            "max-pages-cap must be >= 1, got {}",
            limits.max_pages_cap
        )));
    }
    if limits.max_ttl_hours < 1 {
        return Err(ConfigError::Validation(format!(
            "max-ttl-hours must be >= 1, got {}",
            limits.max_ttl_hours
        )));
    }
    Ok(())
}

/// Validates the render command settings
fn validate_render_config(config: &RenderConfig) -> Result<(), ConfigError> {
    if config.command.first().is_some_and(|program| program.trim().is_empty()) {
        return Err(ConfigError::Validation("render command program cannot be empty".to_string()));
    }
    if !config.command.is_empty() && config.timeout_secs < 1 {
        return Err(ConfigError::Validation(format!(
            "render timeout-secs must be >= 1, got {}",
            config.timeout_secs
        )));
    }
    Ok(())
}
